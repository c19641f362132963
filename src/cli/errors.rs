//! # CLI Errors

use std::path::PathBuf;

use thiserror::Error;

use crate::fairness::FairnessError;

/// Result type for CLI commands
pub type CliResult<T> = Result<T, CliError>;

/// CLI errors
#[derive(Debug, Error)]
pub enum CliError {
    #[error("{0}")]
    Fairness(#[from] FairnessError),

    #[error("Failed to read metrics file {path:?}: {message}")]
    MetricsRead { path: PathBuf, message: String },

    #[error("Invalid metrics JSON in {path:?}: {message}")]
    MetricsParse { path: PathBuf, message: String },

    #[error("Simulation needs a static or dynamic policy, configuration has '{0}'")]
    NothingToSimulate(String),

    #[error("Output error: {0}")]
    Output(String),
}

impl CliError {
    /// Stable identifier for scripts
    pub fn code(&self) -> &'static str {
        match self {
            CliError::Fairness(e) => e.error_code(),
            CliError::MetricsRead { .. } => "METRICS_READ",
            CliError::MetricsParse { .. } => "METRICS_PARSE",
            CliError::NothingToSimulate(_) => "NOTHING_TO_SIMULATE",
            CliError::Output(_) => "OUTPUT",
        }
    }
}
