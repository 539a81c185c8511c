//! Pending Registry
//!
//! Tracks, per key, the handle of the most recently submitted invocation. A new
//! submission reads the previous handle and installs its own in one critical section,
//! which is what turns submission order into chain order.

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tracing::trace;

/// Identity of one invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InvocationId(u64);

impl InvocationId {
    pub fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        InvocationId(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

/// Awaitable completion of one invocation.
///
/// Resolves once the invocation has finished in any way (value, error, panic or
/// cancellation). Only this invocation's own signal is awaited; ordering behind the
/// predecessor is kept by [`Registration`], which never signals before it.
#[derive(Clone)]
pub(crate) struct PendingHandle {
    id: InvocationId,
    done: Shared<BoxFuture<'static, ()>>,
}

impl PendingHandle {
    fn new(id: InvocationId, finished: oneshot::Receiver<()>) -> Self {
        let done = async move {
            // The sender is only ever dropped, never used: closing is the signal.
            let _ = finished.await;
        }
        .boxed()
        .shared();
        Self { id, done }
    }

    pub(crate) fn id(&self) -> InvocationId {
        self.id
    }

    pub(crate) async fn wait(&self) {
        self.done.clone().await
    }
}

/// Map from key to the latest pending handle for that key
pub(crate) struct PendingRegistry<K> {
    pending: Mutex<HashMap<Arc<K>, PendingHandle>>,
}

impl<K> PendingRegistry<K>
where
    K: Eq + Hash + Send + Sync + 'static,
{
    pub(crate) fn new() -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Register a new invocation under `key`, capturing the handle it must wait for.
    ///
    /// `None` keys never enter the map and never get a predecessor.
    pub(crate) fn register(self: &Arc<Self>, key: Option<K>, runtime: Handle) -> Registration<K> {
        let id = InvocationId::next();
        let (signal, finished) = oneshot::channel();
        let key = key.map(Arc::new);

        let previous = match &key {
            Some(key) => {
                let mut pending = self.pending.lock();
                let previous = pending.get(key.as_ref()).cloned();
                pending.insert(Arc::clone(key), PendingHandle::new(id, finished));
                previous
            }
            None => None,
        };

        Registration {
            id,
            key,
            previous,
            registry: Arc::clone(self),
            runtime,
            signal: Some(signal),
        }
    }

    /// Remove the entry for `key` if it still belongs to `id`.
    fn finish(&self, key: &K, id: InvocationId) {
        let mut pending = self.pending.lock();
        let current = pending.get(key).map(PendingHandle::id);
        if current == Some(id) {
            pending.remove(key);
            trace!(invocation = id.as_u64(), "Removed registry entry");
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.pending.lock().len()
    }

    pub(crate) fn contains(&self, key: &K) -> bool {
        self.pending.lock().contains_key(key)
    }
}

/// One invocation's stake in the registry.
///
/// Dropping it completes the invocation: the registry entry is released (if still
/// current) and the pending handle is signalled. When it is dropped before the
/// predecessor finished, both are deferred until the predecessor resolves so that a
/// later submission can never start alongside a still running earlier one.
pub(crate) struct Registration<K>
where
    K: Eq + Hash + Send + Sync + 'static,
{
    id: InvocationId,
    key: Option<Arc<K>>,
    previous: Option<PendingHandle>,
    registry: Arc<PendingRegistry<K>>,
    runtime: Handle,
    signal: Option<oneshot::Sender<()>>,
}

impl<K> Registration<K>
where
    K: Eq + Hash + Send + Sync + 'static,
{
    pub(crate) fn id(&self) -> InvocationId {
        self.id
    }

    pub(crate) fn is_keyed(&self) -> bool {
        self.key.is_some()
    }

    pub(crate) fn has_predecessor(&self) -> bool {
        self.previous.is_some()
    }

    /// Suspend until the predecessor (if any) has completed in any way.
    pub(crate) async fn wait_predecessor(&mut self) {
        if let Some(previous) = &self.previous {
            previous.wait().await;
        }
        self.previous = None;
    }
}

impl<K> Drop for Registration<K>
where
    K: Eq + Hash + Send + Sync + 'static,
{
    fn drop(&mut self) {
        let signal = self.signal.take();
        let Some(key) = self.key.take() else {
            return;
        };
        match self.previous.take() {
            None => {
                self.registry.finish(&key, self.id);
                drop(signal);
            }
            Some(previous) => {
                let registry = Arc::clone(&self.registry);
                let id = self.id;
                trace!(
                    invocation = id.as_u64(),
                    "Released before predecessor finished, deferring cleanup"
                );
                self.runtime.spawn(async move {
                    previous.wait().await;
                    registry.finish(&key, id);
                    drop(signal);
                });
            }
        }
    }
}
