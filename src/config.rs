//! Configuration System
//!
//! Layered configuration for applications embedding the queue: default run settings
//! applied to every submission and logging. Sources, lowest to highest precedence:
//! merge-policy defaults, the global config file, an explicit file, then
//! `AQUEUE__*` environment variables.

use crate::error::SetupError;
use crate::linked::LinkedQueue;
use crate::logging::LoggingConfig;
use crate::queue::QueueExt;
use crate::run_config::RunConfig;
use crate::with_config::WithConfig;
use serde::{Deserialize, Serialize};
use std::hash::Hash;
use std::path::Path;

mod merge;
mod sources;

pub use sources::global_file::global_config_path;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Run settings applied under every submission
    #[serde(default)]
    pub defaults: RunSettings,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Serializable subset of [`RunConfig`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSettings {
    /// Maximum number of actions running at once (unset: unbounded)
    #[serde(default)]
    pub max_parallelism: Option<usize>,

    /// Label attached to every invocation span
    #[serde(default)]
    pub label: Option<String>,
}

impl RunSettings {
    pub fn validate(&self) -> Result<(), String> {
        if self.max_parallelism == Some(0) {
            return Err("max_parallelism must be at least 1".to_string());
        }
        if matches!(&self.label, Some(label) if label.trim().is_empty()) {
            return Err("label cannot be empty".to_string());
        }
        Ok(())
    }

    /// Build the run configuration. Each call creates its own concurrency limit.
    pub fn to_run_config(&self) -> RunConfig {
        let mut config = RunConfig::new();
        if let Some(permits) = self.max_parallelism {
            config = config.with_max_parallelism(permits);
        }
        if let Some(label) = &self.label {
            config = config.with_label(label.clone());
        }
        config
    }
}

/// Configuration validation errors
#[derive(Debug, Clone)]
pub enum ValidationError {
    Defaults(String),
    Logging(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::Defaults(msg) => write!(f, "Defaults: {}", msg),
            ValidationError::Logging(msg) => write!(f, "Logging: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

impl QueueConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if let Err(e) = self.defaults.validate() {
            errors.push(ValidationError::Defaults(e));
        }
        if let Err(e) = self.logging.validate() {
            errors.push(ValidationError::Logging(e));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// A fresh queue carrying the configured defaults
    pub fn build_queue<K>(&self) -> WithConfig<LinkedQueue<K>>
    where
        K: Eq + Hash + Send + Sync + 'static,
    {
        LinkedQueue::new().with_config(self.defaults.to_run_config())
    }
}

/// Loads [`QueueConfig`] from its layered sources
pub struct ConfigLoader;

impl ConfigLoader {
    /// Defaults, global file, then environment.
    pub fn load() -> Result<QueueConfig, SetupError> {
        Self::load_layered(None)
    }

    /// Defaults, global file, `path` (required), then environment.
    pub fn load_with_file(path: &Path) -> Result<QueueConfig, SetupError> {
        Self::load_layered(Some(path))
    }

    /// Defaults and `path` only. Ignores the global file and the environment.
    pub fn load_from_file(path: &Path) -> Result<QueueConfig, SetupError> {
        let config: QueueConfig = merge::merge_policy::builder_with_defaults()?
            .add_source(config::File::from(path).required(true))
            .build()?
            .try_deserialize()?;
        Self::validated(config)
    }

    fn load_layered(path: Option<&Path>) -> Result<QueueConfig, SetupError> {
        let mut builder = merge::merge_policy::builder_with_defaults()?;
        builder = sources::global_file::add_to_builder(builder)?;
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        builder = sources::environment::add_to_builder(builder);

        let config: QueueConfig = builder.build()?.try_deserialize()?;
        Self::validated(config)
    }

    fn validated(config: QueueConfig) -> Result<QueueConfig, SetupError> {
        config.validate().map_err(|errors| {
            let error_msgs: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            SetupError::Config(format!(
                "Configuration validation failed:\n{}",
                error_msgs.join("\n")
            ))
        })?;
        Ok(config)
    }
}
