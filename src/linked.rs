//! Chaining Engine
//!
//! `LinkedQueue` joins invocations discriminated by key: every invocation keeps a
//! reference to the one submitted just before it under the same key and waits for it,
//! much like the links of a linked list. Invocations run as tokio tasks, so a waiting
//! invocation is a parked task and never holds a thread.

use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use tracing::{debug, debug_span, trace, Instrument};

use crate::error::QueueError;
use crate::execution::Execution;
use crate::queue::AsyncQueue;
use crate::registry::PendingRegistry;
use crate::run_config::RunConfig;

/// Default [`AsyncQueue`] implementation.
///
/// Cloning is cheap and clones share the same registry, so they serialize against each
/// other.
pub struct LinkedQueue<K> {
    registry: Arc<PendingRegistry<K>>,
}

impl<K> LinkedQueue<K>
where
    K: Eq + Hash + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            registry: Arc::new(PendingRegistry::new()),
        }
    }

    /// Number of keys that currently have a pending invocation
    pub fn pending_len(&self) -> usize {
        self.registry.len()
    }

    /// True while some invocation registered under `key` has not completed
    pub fn is_pending(&self, key: &K) -> bool {
        self.registry.contains(key)
    }
}

impl<K> Default for LinkedQueue<K>
where
    K: Eq + Hash + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K> Clone for LinkedQueue<K> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
        }
    }
}

impl<K> std::fmt::Debug for LinkedQueue<K>
where
    K: Eq + Hash + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkedQueue")
            .field("pending_keys", &self.pending_len())
            .finish()
    }
}

impl<K> AsyncQueue<K> for LinkedQueue<K>
where
    K: Eq + Hash + Send + Sync + 'static,
{
    fn execute<T, E, F, Fut>(&self, key: Option<K>, config: RunConfig, action: F) -> Execution<T>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Into<anyhow::Error> + 'static,
    {
        let runtime = match config.resolve_runtime() {
            Ok(runtime) => runtime,
            Err(err) => return Execution::failed(err),
        };

        let mut registration = self.registry.register(key, runtime.clone());
        let span = debug_span!(
            "queued_action",
            invocation = registration.id().as_u64(),
            label = config.label().unwrap_or_default(),
        );
        span.in_scope(|| {
            debug!(
                keyed = registration.is_keyed(),
                chained = registration.has_predecessor(),
                "Registered invocation"
            );
        });

        let limit = config.limit().cloned();
        let task = async move {
            if registration.has_predecessor() {
                trace!("Waiting for predecessor");
                registration.wait_predecessor().await;
            }

            let permit = match &limit {
                Some(limit) => Some(limit.acquire().await?),
                None => None,
            };

            trace!("Running action");
            let outcome = action().await.map_err(QueueError::action);

            drop(permit);
            drop(registration);
            debug!("Invocation completed");
            outcome
        }
        .instrument(span);

        Execution::spawned(runtime.spawn(task))
    }
}
