//! Operator command line

pub mod args;
pub mod commands;
pub mod errors;

pub use commands::{run, run_command, MetricsSample};
pub use errors::{CliError, CliResult};
