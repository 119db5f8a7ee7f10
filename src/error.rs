//! Error types for stale-scan
//!
//! The scan engine itself never returns `Err`: unreadable entries are
//! recorded as data in the report (see [`crate::walker::ErrorLog`]). The
//! types here cover everything around the engine:
//! - Configuration and CLI validation
//! - Worker thread failures inside the fan-out
//! - Writing reports

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for the stale-scan application
#[derive(Error, Debug)]
pub enum StaleError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Worker/concurrency errors
    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),

    /// Report output errors
    #[error("Report error: {0}")]
    Report(#[from] ReportError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration and CLI errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Duration string did not parse
    #[error("Invalid duration '{value}'. Examples: 30d, 12h, 4w, 1y")]
    InvalidDuration { value: String },

    /// Size string did not parse
    #[error("Invalid size '{value}'. Examples: 500g, 1.5tb, 200gb, 750m")]
    InvalidSize { value: String },

    /// Size string had a unit we do not know
    #[error("Unknown size unit '{unit}'. Use B, KB, MB, GB, TB, PB, or KiB, MiB, GiB, TiB, PiB")]
    UnknownSizeUnit { unit: String },

    /// Scan root is missing or not a directory
    #[error("{} is not a directory", path.display())]
    NotADirectory { path: PathBuf },

    /// Invalid worker count
    #[error("Invalid worker count {count}: must be between 1 and {max}")]
    InvalidWorkerCount { count: usize, max: usize },

    /// Error sample limit of zero
    #[error("Invalid error limit {limit}: must be at least 1")]
    InvalidErrorLimit { limit: usize },

    /// Output path error
    #[error("Invalid output path '{}': {reason}", path.display())]
    InvalidOutputPath { path: PathBuf, reason: String },
}

/// Worker thread errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorkerError {
    /// A sub-walk panicked
    #[error("Worker panicked while scanning '{}': {message}", path.display())]
    Panicked { path: PathBuf, message: String },

    /// Worker thread could not be started
    #[error("Failed to spawn worker {id}: {reason}")]
    SpawnFailed { id: usize, reason: String },
}

/// Report output errors
#[derive(Error, Debug)]
pub enum ReportError {
    /// Failed to write the HTML report
    #[error("Failed to write HTML report '{}': {source}", path.display())]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result type alias for StaleError
pub type Result<T> = std::result::Result<T, StaleError>;

/// Result type alias for ConfigError
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

impl StaleError {
    /// Process exit code for this error
    ///
    /// A scan root that is not a directory is a usage error (2); everything
    /// else is a runtime failure (1).
    pub fn exit_code(&self) -> u8 {
        match self {
            StaleError::Config(ConfigError::NotADirectory { .. }) => 2,
            _ => 1,
        }
    }
}
