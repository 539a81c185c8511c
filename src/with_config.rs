//! Context Composition: a queue that always applies a fixed run configuration.

use std::future::Future;

use crate::execution::Execution;
use crate::queue::AsyncQueue;
use crate::run_config::RunConfig;

/// Queue wrapper that merges a fixed configuration under every call's configuration
#[derive(Debug, Clone)]
pub struct WithConfig<Q> {
    config: RunConfig,
    upstream: Q,
}

impl<Q> WithConfig<Q> {
    pub fn new(upstream: Q, config: RunConfig) -> Self {
        Self { config, upstream }
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn upstream(&self) -> &Q {
        &self.upstream
    }

    pub fn into_upstream(self) -> Q {
        self.upstream
    }
}

impl<K, Q> AsyncQueue<K> for WithConfig<Q>
where
    Q: AsyncQueue<K>,
{
    fn execute<T, E, F, Fut>(&self, key: Option<K>, config: RunConfig, action: F) -> Execution<T>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Into<anyhow::Error> + 'static,
    {
        self.upstream
            .execute(key, self.config.merge(&config), action)
    }
}
