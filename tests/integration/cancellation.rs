//! Integration tests for cancellation
//!
//! Dropping an `Execution` cancels exactly that invocation. The chain it belonged to
//! keeps its order and nothing overtakes a still running predecessor.

use super::test_utils::{Event, Recorder};
use aqueue::{AsyncQueue, LinkedQueue, QueueExt, RunConfig};
use std::time::Duration;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_cancelling_waiting_invocation_keeps_chain_order() {
    let queue = LinkedQueue::<&'static str>::new();
    let recorder = Recorder::new();

    let submit = |id: usize, ms: u64| {
        let recorder = recorder.clone();
        queue.execute(Some("k"), RunConfig::default(), move || async move {
            recorder.run(id, Duration::from_millis(ms)).await;
            anyhow::Ok(id)
        })
    };

    let a = submit(0, 100);
    let b = submit(1, 10);
    let c = submit(2, 10);

    tokio::time::sleep(Duration::from_millis(20)).await;
    drop(b);

    assert_eq!(a.await.unwrap(), 0);
    assert_eq!(c.await.unwrap(), 2);

    // B never ran, and C did not start until A had finished
    assert_eq!(recorder.start_order(), vec![0, 2]);
    assert_eq!(recorder.peak(), 1);
    let a_finished = recorder.time_of(Event::Finished(0)).unwrap();
    let c_started = recorder.time_of(Event::Started(2)).unwrap();
    assert!(c_started >= a_finished);

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(queue.pending_len(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_cancelling_last_waiter_still_cleans_up() {
    let queue = LinkedQueue::<u8>::new();

    let a = queue.execute(Some(1), RunConfig::default(), || async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        anyhow::Ok(())
    });
    let b = queue.execute(Some(1), RunConfig::default(), || async { anyhow::Ok(()) });

    drop(b);
    // The entry belongs to B, but A is still running under the key
    assert!(queue.is_pending(&1));

    a.await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!queue.is_pending(&1));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_cancelling_running_invocation_releases_successor() {
    let queue = LinkedQueue::<u8>::new();
    let recorder = Recorder::new();

    let tracker = recorder.clone();
    let running = queue.execute(Some(1), RunConfig::default(), move || async move {
        tracker.start(0);
        tokio::time::sleep(Duration::from_secs(10)).await;
        tracker.finish(0);
        anyhow::Ok(())
    });
    let tracker = recorder.clone();
    let successor = queue.execute(Some(1), RunConfig::default(), move || async move {
        tracker.run(1, Duration::from_millis(5)).await;
        anyhow::Ok(())
    });

    tokio::time::sleep(Duration::from_millis(20)).await;
    drop(running);

    tokio::time::timeout(Duration::from_secs(1), successor)
        .await
        .expect("successor should not wait for the cancelled invocation's sleep")
        .unwrap();
    assert_eq!(
        recorder.events(),
        vec![Event::Started(0), Event::Started(1), Event::Finished(1)]
    );
    assert_eq!(queue.pending_len(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_cancelling_one_key_leaves_other_keys_alone() {
    let queue = LinkedQueue::<u8>::new();

    let doomed = queue.execute(Some(1), RunConfig::default(), || async {
        tokio::time::sleep(Duration::from_secs(10)).await;
        anyhow::Ok(1)
    });
    let survivor = queue.execute(Some(2), RunConfig::default(), || async {
        tokio::time::sleep(Duration::from_millis(30)).await;
        anyhow::Ok(2)
    });

    drop(doomed);
    assert_eq!(survivor.await.unwrap(), 2);
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(queue.pending_len(), 0);
}

#[tokio::test]
async fn test_spawned_invocation_outlives_dropped_handle() {
    let queue = LinkedQueue::<u8>::new();
    let recorder = Recorder::new();

    let tracker = recorder.clone();
    let handle = queue
        .spawn(Some(1), RunConfig::default(), move || async move {
            tracker.run(0, Duration::from_millis(20)).await;
            anyhow::Ok(())
        })
        .unwrap();
    drop(handle);

    // Same key: only runs once the detached invocation is done
    queue
        .execute(Some(1), RunConfig::default(), || async { anyhow::Ok(()) })
        .await
        .unwrap();
    assert_eq!(recorder.events(), vec![Event::Started(0), Event::Finished(0)]);
}

#[tokio::test]
async fn test_aborting_spawned_invocation_cancels_it() {
    let queue = LinkedQueue::<u8>::new();
    let recorder = Recorder::new();

    let tracker = recorder.clone();
    let handle = queue
        .spawn(Some(1), RunConfig::default(), move || async move {
            tracker.run(0, Duration::from_secs(10)).await;
            anyhow::Ok(())
        })
        .unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    handle.abort();

    let joined = handle.await;
    assert!(joined.unwrap_err().is_cancelled());
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(recorder.events(), vec![Event::Started(0)]);
    assert_eq!(queue.pending_len(), 0);
}
