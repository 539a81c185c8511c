//! Logging System
//!
//! Structured logging via `tracing`. The queue itself only emits `debug`/`trace` events
//! and spans; this module installs a subscriber for applications that want to see them,
//! with configurable level, format and destination.

use crate::error::SetupError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Registry};

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error, off
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format: json, text (default: text)
    #[serde(default = "default_format")]
    pub format: String,

    /// Output destination: stdout, stderr, file
    #[serde(default = "default_output")]
    pub output: String,

    /// Log file path (if output is "file")
    #[serde(default = "default_log_file")]
    pub file: PathBuf,

    /// Enable colored output (text format only, stdout/stderr only)
    #[serde(default = "default_true")]
    pub color: bool,

    /// Module-specific log levels
    #[serde(default)]
    pub modules: HashMap<String, String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_format() -> String {
    "text".to_string()
}

fn default_output() -> String {
    "stdout".to_string()
}

fn default_log_file() -> PathBuf {
    PathBuf::from("aqueue.log")
}

fn default_true() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_format(),
            output: default_output(),
            file: default_log_file(),
            color: default_true(),
            modules: HashMap::new(),
        }
    }
}

impl LoggingConfig {
    /// Validate format and output names
    pub fn validate(&self) -> Result<(), String> {
        parse_format(&self.format)?;
        parse_output(&self.output)?;
        Ok(())
    }
}

/// Output encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Text,
    Json,
}

/// Output destination
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Output {
    Stdout,
    Stderr,
    File,
}

/// Initialize the logging system
///
/// Priority order (highest to lowest):
/// 1. Environment variables (AQUEUE_LOG, AQUEUE_LOG_FORMAT, AQUEUE_LOG_OUTPUT, AQUEUE_LOG_MODULES)
/// 2. The given configuration
/// 3. Defaults
///
/// Fails if a global subscriber is already installed.
pub fn init_logging(config: Option<&LoggingConfig>) -> Result<(), SetupError> {
    let filter = build_env_filter(config)?;
    let format = determine_format(config)?;
    let output = determine_output(config)?;
    let use_color = config.map(|c| c.color).unwrap_or(true);

    let writer = match output {
        Output::Stdout => BoxMakeWriter::new(std::io::stdout),
        Output::Stderr => BoxMakeWriter::new(std::io::stderr),
        Output::File => BoxMakeWriter::new(open_log_file(config)?),
    };
    // Escape codes only make sense on a terminal
    let ansi = use_color && output != Output::File;

    let layer = match format {
        Format::Json => fmt::layer()
            .json()
            .with_target(true)
            .with_timer(ChronoUtc::rfc_3339())
            .with_writer(writer)
            .boxed(),
        Format::Text => fmt::layer()
            .with_target(true)
            .with_timer(ChronoUtc::rfc_3339())
            .with_ansi(ansi)
            .with_writer(writer)
            .boxed(),
    };

    Registry::default()
        .with(filter)
        .with(layer)
        .try_init()
        .map_err(|e| SetupError::Logging(format!("Failed to install subscriber: {}", e)))
}

fn open_log_file(
    config: Option<&LoggingConfig>,
) -> Result<std::sync::Mutex<std::fs::File>, SetupError> {
    let log_file = config
        .map(|c| c.file.clone())
        .unwrap_or_else(default_log_file);

    if let Some(parent) = log_file.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| {
                SetupError::Logging(format!("Failed to create log directory: {}", e))
            })?;
        }
    }
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_file)
        .map_err(|e| {
            SetupError::Logging(format!("Failed to open log file {:?}: {}", log_file, e))
        })?;
    Ok(std::sync::Mutex::new(file))
}

/// Build environment filter from config or environment variables
fn build_env_filter(config: Option<&LoggingConfig>) -> Result<EnvFilter, SetupError> {
    if let Ok(filter) = EnvFilter::try_from_env("AQUEUE_LOG") {
        return Ok(filter);
    }

    let level = config.map(|c| c.level.as_str()).unwrap_or("info");

    if level == "off" {
        return Ok(EnvFilter::new("off"));
    }

    let mut filter = EnvFilter::new(level);

    if let Some(config) = config {
        for (module, module_level) in &config.modules {
            let directive = format!("{}={}", module, module_level);
            filter = filter.add_directive(
                directive
                    .parse()
                    .map_err(|e| SetupError::Logging(format!("Invalid log directive: {}", e)))?,
            );
        }
    }

    if let Ok(modules_str) = std::env::var("AQUEUE_LOG_MODULES") {
        for module_spec in modules_str.split(',') {
            let parts: Vec<&str> = module_spec.split('=').collect();
            if parts.len() == 2 {
                let directive = format!("{}={}", parts[0].trim(), parts[1].trim());
                filter = filter.add_directive(directive.parse().map_err(|e| {
                    SetupError::Logging(format!("Invalid log directive from env: {}", e))
                })?);
            }
        }
    }

    Ok(filter)
}

fn determine_format(config: Option<&LoggingConfig>) -> Result<Format, SetupError> {
    if let Ok(format) = std::env::var("AQUEUE_LOG_FORMAT") {
        return parse_format(&format).map_err(SetupError::Logging);
    }

    let format = config.map(|c| c.format.as_str()).unwrap_or("text");
    parse_format(format).map_err(SetupError::Logging)
}

fn determine_output(config: Option<&LoggingConfig>) -> Result<Output, SetupError> {
    if let Ok(output) = std::env::var("AQUEUE_LOG_OUTPUT") {
        return parse_output(&output).map_err(SetupError::Logging);
    }

    let output = config.map(|c| c.output.as_str()).unwrap_or("stdout");
    parse_output(output).map_err(SetupError::Logging)
}

fn parse_format(format: &str) -> Result<Format, String> {
    match format {
        "text" => Ok(Format::Text),
        "json" => Ok(Format::Json),
        _ => Err(format!(
            "Invalid log format: {} (must be 'json' or 'text')",
            format
        )),
    }
}

fn parse_output(output: &str) -> Result<Output, String> {
    match output {
        "stdout" => Ok(Output::Stdout),
        "stderr" => Ok(Output::Stderr),
        "file" => Ok(Output::File),
        _ => Err(format!(
            "Invalid log output: {} (must be 'stdout', 'stderr' or 'file')",
            output
        )),
    }
}
