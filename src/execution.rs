//! Awaitable result of a queued submission.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::task::JoinHandle;

use crate::error::QueueError;

/// Result of [`crate::AsyncQueue::execute`].
///
/// The invocation is already registered and spawned when this value is created; awaiting
/// it only collects the outcome. Dropping it before completion cancels that invocation and
/// nothing else: later submissions under the same key still run, in order.
#[must_use = "dropping an Execution cancels the invocation"]
pub struct Execution<T> {
    state: State<T>,
}

enum State<T> {
    Spawned(JoinHandle<Result<T, QueueError>>),
    Failed(Option<QueueError>),
}

impl<T> Execution<T> {
    pub(crate) fn spawned(handle: JoinHandle<Result<T, QueueError>>) -> Self {
        Self {
            state: State::Spawned(handle),
        }
    }

    /// An execution that never ran, resolving immediately to `err`.
    pub(crate) fn failed(err: QueueError) -> Self {
        Self {
            state: State::Failed(Some(err)),
        }
    }

    /// True once the outcome is available without waiting
    pub fn is_finished(&self) -> bool {
        match &self.state {
            State::Spawned(handle) => handle.is_finished(),
            State::Failed(_) => true,
        }
    }
}

impl<T> Future for Execution<T> {
    type Output = Result<T, QueueError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match &mut this.state {
            State::Spawned(handle) => Pin::new(handle).poll(cx).map(|joined| match joined {
                Ok(outcome) => outcome,
                Err(err) => Err(QueueError::from_join(err)),
            }),
            // Polling again after completion is a contract violation; report cancellation.
            State::Failed(err) => Poll::Ready(Err(err.take().unwrap_or(QueueError::Cancelled))),
        }
    }
}

impl<T> Drop for Execution<T> {
    fn drop(&mut self) {
        if let State::Spawned(handle) = &self.state {
            handle.abort();
        }
    }
}

impl<T> std::fmt::Debug for Execution<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Execution")
            .field("finished", &self.is_finished())
            .finish()
    }
}
