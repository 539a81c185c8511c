//! AQueue: Keyed Asynchronous Serialization Queue
//!
//! Submit asynchronous actions under an optional key. Actions sharing a key run one at a
//! time in submission order; actions under different keys, or no key, run in parallel.
//! Waiting is done by suspended tokio tasks, never by blocked threads.

pub mod bound;
pub mod config;
pub mod error;
pub mod execution;
pub mod linked;
pub mod logging;
pub mod queue;
mod registry;
pub mod run_config;
pub mod stream;
pub mod with_config;

pub use bound::BoundExecutor;
pub use error::{QueueError, SetupError};
pub use execution::Execution;
pub use linked::LinkedQueue;
pub use queue::{AsyncQueue, QueueExt};
pub use run_config::{ConcurrencyLimit, RunConfig};
pub use stream::{MapThroughQueue, StreamQueueExt};
pub use with_config::WithConfig;
