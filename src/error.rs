//! Error types for the keyed asynchronous queue.

use thiserror::Error;

/// Outcome errors of a queued invocation
#[derive(Debug, Error)]
pub enum QueueError {
    /// The action itself returned an error.
    #[error("Action failed: {0}")]
    Action(#[source] anyhow::Error),

    /// The action panicked; carries the panic message.
    #[error("Action panicked: {0}")]
    Panicked(String),

    /// The invocation was cancelled before it could deliver a result.
    #[error("Invocation cancelled")]
    Cancelled,

    /// `execute` ran outside a tokio runtime and the configuration named none.
    #[error("No tokio runtime available to run the action")]
    NoRuntime,
}

impl QueueError {
    /// True when the invocation ended through cancellation rather than failure
    pub fn is_cancelled(&self) -> bool {
        matches!(self, QueueError::Cancelled)
    }

    /// True when the action itself ran and failed, by error or by panic
    pub fn is_failure(&self) -> bool {
        matches!(self, QueueError::Action(_) | QueueError::Panicked(_))
    }

    /// Wrap any action error.
    pub fn action<E>(err: E) -> Self
    where
        E: Into<anyhow::Error>,
    {
        QueueError::Action(err.into())
    }

    pub(crate) fn from_join(err: tokio::task::JoinError) -> Self {
        if err.is_panic() {
            let payload = err.into_panic();
            let message = if let Some(message) = payload.downcast_ref::<&'static str>() {
                (*message).to_string()
            } else if let Some(message) = payload.downcast_ref::<String>() {
                message.clone()
            } else {
                "non-string panic payload".to_string()
            };
            QueueError::Panicked(message)
        } else {
            QueueError::Cancelled
        }
    }
}

/// Configuration and logging setup errors
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Logging error: {0}")]
    Logging(String),
}

impl From<config::ConfigError> for SetupError {
    fn from(err: config::ConfigError) -> Self {
        SetupError::Config(err.to_string())
    }
}
