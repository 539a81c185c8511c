//! Integration tests for queue composition: fixed configuration, partial application and
//! sharing a queue between owners.

use aqueue::{AsyncQueue, ConcurrencyLimit, LinkedQueue, QueueExt, RunConfig};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone)]
struct Transfer {
    account: u32,
    amount: i64,
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_bound_executor_serializes_per_account() {
    let queue = LinkedQueue::<u32>::new();
    let balances = Arc::new(Mutex::new(std::collections::HashMap::<u32, i64>::new()));
    let ledger = Arc::clone(&balances);

    let transfers = queue.clone().bind(
        |transfer: &Transfer| Some(transfer.account),
        move |transfer: Transfer| {
            let ledger = Arc::clone(&ledger);
            async move {
                // Read-modify-write split by a suspension point
                let current = *ledger.lock().get(&transfer.account).unwrap_or(&0);
                tokio::time::sleep(Duration::from_millis(2)).await;
                let updated = current + transfer.amount;
                ledger.lock().insert(transfer.account, updated);
                anyhow::Ok(updated)
            }
        },
    );

    let executions: Vec<_> = (0..20)
        .map(|i| {
            transfers.execute(Transfer {
                account: i % 2,
                amount: 10,
            })
        })
        .collect();
    for execution in executions {
        execution.await.unwrap();
    }

    // No lost updates on either account
    let balances = balances.lock();
    assert_eq!(balances.get(&0), Some(&100));
    assert_eq!(balances.get(&1), Some(&100));
    assert_eq!(queue.pending_len(), 0);
}

#[tokio::test]
async fn test_bound_executor_clones_share_chain() {
    let queue = LinkedQueue::<u32>::new();
    let order = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&order);

    let transfers = queue.bind(
        |transfer: &Transfer| Some(transfer.account),
        move |transfer: Transfer| {
            let log = Arc::clone(&log);
            async move {
                tokio::time::sleep(Duration::from_millis(5)).await;
                log.lock().push(transfer.amount);
                anyhow::Ok(())
            }
        },
    );
    let other_owner = transfers.clone();

    let first = transfers.execute(Transfer {
        account: 1,
        amount: 1,
    });
    let second = other_owner.execute(Transfer {
        account: 1,
        amount: 2,
    });
    second.await.unwrap();
    first.await.unwrap();
    assert_eq!(*order.lock(), vec![1, 2]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_with_config_limit_spans_every_key() {
    let limit = ConcurrencyLimit::new(2);
    let queue = LinkedQueue::<usize>::new().with_config(RunConfig::new().with_limit(limit.clone()));
    let peak = Arc::new(Mutex::new(0usize));

    let executions: Vec<_> = (0..8)
        .map(|key| {
            let limit = limit.clone();
            let peak = Arc::clone(&peak);
            queue.execute(Some(key), RunConfig::default(), move || async move {
                let in_use = limit.permits() - limit.available();
                {
                    let mut peak = peak.lock();
                    *peak = (*peak).max(in_use);
                }
                tokio::time::sleep(Duration::from_millis(20)).await;
                anyhow::Ok(())
            })
        })
        .collect();
    for execution in executions {
        execution.await.unwrap();
    }

    assert!(*peak.lock() <= 2);
    assert_eq!(limit.available(), 2);
}

#[tokio::test]
async fn test_outer_wrapper_overrides_inner_wrapper() {
    let inner = RunConfig::new().with_max_parallelism(1).with_label("inner");
    let outer = RunConfig::new().with_max_parallelism(3);
    let inner_limit = inner.limit().cloned().unwrap();
    let outer_limit = outer.limit().cloned().unwrap();

    let queue = LinkedQueue::<u8>::new().with_config(inner).with_config(outer);

    let (inner_free, outer_free) = queue
        .execute(Some(1), RunConfig::default(), move || async move {
            anyhow::Ok((inner_limit.available(), outer_limit.available()))
        })
        .await
        .unwrap();

    // Only the outer limit was acquired
    assert_eq!(inner_free, 1);
    assert_eq!(outer_free, 2);
}

#[tokio::test]
async fn test_merged_configuration_is_right_biased() {
    let base = RunConfig::new().with_label("base").with_max_parallelism(2);
    let call = RunConfig::new().with_label("call");

    let merged = base.clone() + call;
    assert_eq!(merged.label(), Some("call"));
    assert!(merged.limit().unwrap().same_as(base.limit().unwrap()));

    let untouched = base.merge(&RunConfig::default());
    assert_eq!(untouched.label(), Some("base"));
}

#[tokio::test]
async fn test_arc_shared_queue_serializes_across_owners() {
    let queue = Arc::new(LinkedQueue::<&'static str>::new());
    let order = Arc::new(Mutex::new(Vec::new()));

    let owners: Vec<_> = (0..3)
        .map(|i| {
            let queue = Arc::clone(&queue);
            let order = Arc::clone(&order);
            queue.execute(Some("shared"), RunConfig::default(), move || async move {
                tokio::time::sleep(Duration::from_millis(5)).await;
                order.lock().push(i);
                anyhow::Ok(())
            })
        })
        .collect();
    for execution in owners {
        execution.await.unwrap();
    }
    assert_eq!(*order.lock(), vec![0, 1, 2]);
}

#[tokio::test]
async fn test_execute_request_through_reference() {
    let queue = LinkedQueue::<u32>::new();
    let by_ref = &queue;

    let doubled = by_ref
        .execute_request(21u32, Some(1), RunConfig::default(), |n| async move {
            anyhow::Ok(n * 2)
        })
        .await
        .unwrap();
    assert_eq!(doubled, 42);
}
