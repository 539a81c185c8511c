//! Partial-Application Wrapper
//!
//! A [`BoundExecutor`] fixes the key function, action and run configuration for a queue
//! so call sites only hand over the request.

use std::future::Future;
use std::sync::Arc;

use crate::execution::Execution;
use crate::queue::AsyncQueue;
use crate::run_config::RunConfig;

/// Queue plus key function plus action, submitted with a single request argument
pub struct BoundExecutor<Q, KF, A> {
    queue: Q,
    key_fn: Arc<KF>,
    action: Arc<A>,
    config: RunConfig,
}

impl<Q, KF, A> BoundExecutor<Q, KF, A> {
    pub fn new(queue: Q, key_fn: KF, action: A) -> Self {
        Self {
            queue,
            key_fn: Arc::new(key_fn),
            action: Arc::new(action),
            config: RunConfig::default(),
        }
    }

    /// Fix the run configuration used by every submission.
    pub fn with_config(mut self, config: RunConfig) -> Self {
        self.config = config;
        self
    }

    pub fn queue(&self) -> &Q {
        &self.queue
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Submit `request` under the key derived from it.
    pub fn execute<K, Req, T, E, Fut>(&self, request: Req) -> Execution<T>
    where
        Q: AsyncQueue<K>,
        KF: Fn(&Req) -> Option<K>,
        A: Fn(Req) -> Fut + Send + Sync + 'static,
        Req: Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Into<anyhow::Error> + 'static,
    {
        let key = (self.key_fn)(&request);
        self.submit(request, key, RunConfig::default())
    }

    /// Submit `request` under an explicit key instead of the derived one.
    pub fn execute_with_key<K, Req, T, E, Fut>(&self, request: Req, key: Option<K>) -> Execution<T>
    where
        Q: AsyncQueue<K>,
        A: Fn(Req) -> Fut + Send + Sync + 'static,
        Req: Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Into<anyhow::Error> + 'static,
    {
        self.submit(request, key, RunConfig::default())
    }

    /// Submit with an explicit key and a call-level configuration merged over the bound one.
    pub fn execute_with<K, Req, T, E, Fut>(
        &self,
        request: Req,
        key: Option<K>,
        config: RunConfig,
    ) -> Execution<T>
    where
        Q: AsyncQueue<K>,
        A: Fn(Req) -> Fut + Send + Sync + 'static,
        Req: Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Into<anyhow::Error> + 'static,
    {
        self.submit(request, key, config)
    }

    fn submit<K, Req, T, E, Fut>(&self, request: Req, key: Option<K>, config: RunConfig) -> Execution<T>
    where
        Q: AsyncQueue<K>,
        A: Fn(Req) -> Fut + Send + Sync + 'static,
        Req: Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Into<anyhow::Error> + 'static,
    {
        let action = Arc::clone(&self.action);
        self.queue
            .execute(key, self.config.merge(&config), move || (*action)(request))
    }
}

impl<Q, KF, A> Clone for BoundExecutor<Q, KF, A>
where
    Q: Clone,
{
    fn clone(&self) -> Self {
        Self {
            queue: self.queue.clone(),
            key_fn: Arc::clone(&self.key_fn),
            action: Arc::clone(&self.action),
            config: self.config.clone(),
        }
    }
}
