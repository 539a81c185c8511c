//! Run Configuration
//!
//! Immutable descriptor of where and how a queued action runs: the tokio runtime it is
//! spawned on, an optional concurrency limit shared by every clone of the configuration,
//! and a label attached to the invocation's tracing span.
//!
//! Configurations compose with a right-biased merge: each field of the right-hand side
//! wins when it is set. The merge is associative and `RunConfig::default()` is its identity.

use std::borrow::Cow;
use std::fmt;
use std::ops::Add;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::error::QueueError;

/// Upper bound on the number of actions running at once under one configuration.
///
/// Clones share the same permits, so a limit placed on a queue with
/// [`crate::QueueExt::with_config`] bounds every invocation that goes through it.
#[derive(Clone)]
pub struct ConcurrencyLimit {
    permits: usize,
    semaphore: Arc<Semaphore>,
}

impl ConcurrencyLimit {
    pub fn new(permits: usize) -> Self {
        Self {
            permits,
            semaphore: Arc::new(Semaphore::new(permits)),
        }
    }

    pub fn permits(&self) -> usize {
        self.permits
    }

    /// Permits not currently held by a running action
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    pub(crate) async fn acquire(&self) -> Result<OwnedSemaphorePermit, QueueError> {
        // The semaphore is never closed, so a failure here only happens on teardown.
        Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| QueueError::Cancelled)
    }

    /// Two limits are the same when they share permits.
    pub fn same_as(&self, other: &ConcurrencyLimit) -> bool {
        Arc::ptr_eq(&self.semaphore, &other.semaphore)
    }
}

impl fmt::Debug for ConcurrencyLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConcurrencyLimit")
            .field("permits", &self.permits)
            .field("available", &self.available())
            .finish()
    }
}

/// Execution environment for a queued action
#[derive(Clone, Default)]
pub struct RunConfig {
    runtime: Option<Handle>,
    limit: Option<ConcurrencyLimit>,
    label: Option<Cow<'static, str>>,
}

impl RunConfig {
    /// The empty configuration: current runtime, no limit, no label.
    pub fn new() -> Self {
        Self::default()
    }

    /// Run actions on the given runtime instead of the caller's.
    pub fn on_runtime(mut self, handle: Handle) -> Self {
        self.runtime = Some(handle);
        self
    }

    /// Allow at most `permits` actions to run at once under this configuration.
    ///
    /// A value of zero would block every action forever and is clamped to one.
    pub fn with_max_parallelism(self, permits: usize) -> Self {
        self.with_limit(ConcurrencyLimit::new(permits.max(1)))
    }

    pub fn with_limit(mut self, limit: ConcurrencyLimit) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_label(mut self, label: impl Into<Cow<'static, str>>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn runtime(&self) -> Option<&Handle> {
        self.runtime.as_ref()
    }

    pub fn limit(&self) -> Option<&ConcurrencyLimit> {
        self.limit.as_ref()
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// True when no field is set
    pub fn is_empty(&self) -> bool {
        self.runtime.is_none() && self.limit.is_none() && self.label.is_none()
    }

    /// Compose with `other`, letting `other` win wherever it sets a field.
    pub fn merge(&self, other: &RunConfig) -> RunConfig {
        RunConfig {
            runtime: other.runtime.clone().or_else(|| self.runtime.clone()),
            limit: other.limit.clone().or_else(|| self.limit.clone()),
            label: other.label.clone().or_else(|| self.label.clone()),
        }
    }

    /// Runtime the action is spawned on: the configured one, else the caller's.
    pub(crate) fn resolve_runtime(&self) -> Result<Handle, QueueError> {
        match &self.runtime {
            Some(handle) => Ok(handle.clone()),
            None => Handle::try_current().map_err(|_| QueueError::NoRuntime),
        }
    }
}

impl Add for RunConfig {
    type Output = RunConfig;

    fn add(self, rhs: RunConfig) -> RunConfig {
        self.merge(&rhs)
    }
}

impl fmt::Debug for RunConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunConfig")
            .field("custom_runtime", &self.runtime.is_some())
            .field("limit", &self.limit)
            .field("label", &self.label)
            .finish()
    }
}
