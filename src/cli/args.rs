//! CLI argument definitions using clap
//!
//! Commands:
//! - rpc-fairness check --config <path>
//! - rpc-fairness simulate --config <path> --metrics <path> [--passes N]
//! - rpc-fairness defaults

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// rpc-fairness - Per-namespace handler fairness for federated RPC routers
#[derive(Parser, Debug)]
#[command(name = "rpc-fairness")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Validate a configuration file and print the initial allocation
    Check {
        /// Path to configuration file
        #[arg(long, default_value = "./fairness.toml")]
        config: PathBuf,
    },

    /// Replay a recorded metrics sample through manual refresh passes
    ///
    /// The background refresh loop is disabled; each pass feeds the
    /// sample once and then recomputes capacities.
    Simulate {
        /// Path to configuration file
        #[arg(long, default_value = "./fairness.toml")]
        config: PathBuf,

        /// JSON file with `rejected` and `accepted` per-bucket counts
        #[arg(long)]
        metrics: PathBuf,

        /// Number of refresh passes to run
        #[arg(long, default_value = "1")]
        passes: u32,
    },

    /// Print the default configuration as TOML
    Defaults,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
