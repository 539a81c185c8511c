//! Execution Contract
//!
//! `AsyncQueue` is what every queue implementation satisfies; `QueueExt` layers the
//! typed, composed and spawned submission styles on top of it for any queue.

use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::bound::BoundExecutor;
use crate::error::QueueError;
use crate::execution::Execution;
use crate::run_config::RunConfig;
use crate::with_config::WithConfig;

/// Asynchronous queue with per-key serialization
pub trait AsyncQueue<K>: Send + Sync {
    /// Submit `action` under `key`.
    ///
    /// Actions submitted under the same `Some(key)` run one at a time in submission
    /// order. `None` places no constraint. `config` is merged over any configuration the
    /// queue itself carries.
    fn execute<T, E, F, Fut>(&self, key: Option<K>, config: RunConfig, action: F) -> Execution<T>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Into<anyhow::Error> + 'static;
}

impl<K, Q> AsyncQueue<K> for &Q
where
    Q: AsyncQueue<K> + ?Sized,
{
    fn execute<T, E, F, Fut>(&self, key: Option<K>, config: RunConfig, action: F) -> Execution<T>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Into<anyhow::Error> + 'static,
    {
        (**self).execute(key, config, action)
    }
}

impl<K, Q> AsyncQueue<K> for Arc<Q>
where
    Q: AsyncQueue<K> + ?Sized,
{
    fn execute<T, E, F, Fut>(&self, key: Option<K>, config: RunConfig, action: F) -> Execution<T>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Into<anyhow::Error> + 'static,
    {
        (**self).execute(key, config, action)
    }
}

/// Convenience submission styles available on every [`AsyncQueue`]
pub trait QueueExt<K>: AsyncQueue<K> {
    /// Submit an action that takes an explicit request value.
    fn execute_request<Req, T, E, A, Fut>(
        &self,
        request: Req,
        key: Option<K>,
        config: RunConfig,
        action: A,
    ) -> Execution<T>
    where
        Req: Send + 'static,
        A: FnOnce(Req) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Into<anyhow::Error> + 'static,
    {
        self.execute(key, config, move || action(request))
    }

    /// Submit and detach: the invocation keeps running if the returned handle is dropped,
    /// and is cancelled by [`JoinHandle::abort`].
    fn spawn<T, E, F, Fut>(
        &self,
        key: Option<K>,
        config: RunConfig,
        action: F,
    ) -> Result<JoinHandle<Result<T, QueueError>>, QueueError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Into<anyhow::Error> + 'static,
    {
        let runtime = config.resolve_runtime()?;
        let execution = self.execute(key, config, action);
        Ok(runtime.spawn(execution))
    }

    /// Wrap this queue so that `config` applies to every submission.
    ///
    /// Per-call configuration still wins where both set the same field.
    fn with_config(self, config: RunConfig) -> WithConfig<Self>
    where
        Self: Sized,
    {
        WithConfig::new(self, config)
    }

    /// Bind a key function and an action, leaving only the request to supply per call.
    fn bind<Req, T, E, KF, A, Fut>(self, key_fn: KF, action: A) -> BoundExecutor<Self, KF, A>
    where
        Self: Sized,
        KF: Fn(&Req) -> Option<K> + Send + Sync + 'static,
        A: Fn(Req) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        BoundExecutor::new(self, key_fn, action)
    }
}

impl<K, Q> QueueExt<K> for Q where Q: AsyncQueue<K> + ?Sized {}
