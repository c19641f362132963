//! CLI command implementations
//!
//! Every command prints a single JSON (or TOML) document to stdout. The
//! controllers built here never start the background refresh loop.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::fairness::{
    new_controller, FairnessConfig, PolicyKind, RebalanceOutcome, RefreshInterval,
    RpcFairnessPolicyController,
};

use super::args::Command;
use super::errors::{CliError, CliResult};

/// Recorded per-bucket call counts, as the router's metrics pipeline
/// reports them
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricsSample {
    #[serde(default)]
    pub rejected: HashMap<String, u64>,
    #[serde(default)]
    pub accepted: HashMap<String, u64>,
}

impl MetricsSample {
    /// Load a sample from a JSON file
    pub fn load(path: &Path) -> CliResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| CliError::MetricsRead {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        serde_json::from_str(&content).map_err(|e| CliError::MetricsParse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }
}

/// Main CLI entry point
pub fn run() -> CliResult<()> {
    let cli = super::args::Cli::parse_args();
    run_command(cli.command)
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<()> {
    match cmd {
        Command::Check { config } => check(&config),
        Command::Simulate {
            config,
            metrics,
            passes,
        } => simulate(&config, &metrics, passes),
        Command::Defaults => defaults(),
    }
}

/// Validate a configuration file and print its initial allocation
pub fn check(config_path: &Path) -> CliResult<()> {
    let config = FairnessConfig::load(config_path)?;
    write_json(&check_report(&config)?)
}

/// Replay a metrics sample through `passes` manual refresh passes
pub fn simulate(config_path: &Path, metrics_path: &Path, passes: u32) -> CliResult<()> {
    let config = FairnessConfig::load(config_path)?;
    let sample = MetricsSample::load(metrics_path)?;
    write_json(&simulate_report(&config, &sample, passes)?)
}

/// Print the default configuration
pub fn defaults() -> CliResult<()> {
    let text = FairnessConfig::default().to_toml_string()?;
    print!("{}", text);
    Ok(())
}

/// Controller for offline use; the refresh loop is always off
fn offline_controller(config: &FairnessConfig) -> CliResult<Box<dyn RpcFairnessPolicyController>> {
    let mut offline = config.clone();
    offline.refresh_interval_secs = 0;
    Ok(new_controller(&offline)?)
}

/// Summary of a validated configuration
pub fn check_report(config: &FairnessConfig) -> CliResult<Value> {
    let controller = offline_controller(config)?;
    let refresh_interval_secs = match config.refresh_interval() {
        RefreshInterval::Every(period) => Some(period.as_secs()),
        RefreshInterval::Disabled => None,
    };

    Ok(json!({
        "policy": config.policy.to_string(),
        "handler_count": config.handler_count,
        "minimum_handlers_per_ns": config.minimum_handlers_per_ns,
        "refresh_interval_secs": refresh_interval_secs,
        "capacities": controller.capacities(),
    }))
}

/// Run the simulation and collect per-pass results
pub fn simulate_report(
    config: &FairnessConfig,
    sample: &MetricsSample,
    passes: u32,
) -> CliResult<Value> {
    if config.policy == PolicyKind::None {
        return Err(CliError::NothingToSimulate(config.policy.to_string()));
    }

    let controller = offline_controller(config)?;
    let mut results = Vec::with_capacity(passes as usize);
    for pass in 1..=passes {
        controller.set_metrics(&sample.rejected, &sample.accepted);
        let outcome = controller.refresh_permits_cap()?;
        let changes = match &outcome {
            RebalanceOutcome::Applied(changes) => json!(changes),
            RebalanceOutcome::Skipped => Value::Null,
        };
        tracing::debug!(pass, applied = outcome.is_applied(), "simulated refresh pass");

        results.push(json!({
            "pass": pass,
            "applied": outcome.is_applied(),
            "changes": changes,
            "capacities": controller.capacities(),
            "available": controller.available_permits(),
        }));
    }
    controller.shutdown();

    Ok(json!({
        "policy": config.policy.to_string(),
        "initial": offline_controller(config)?.available_permits(),
        "passes": results,
        "stats": controller.refresh_stats(),
    }))
}

fn write_json(value: &Value) -> CliResult<()> {
    let text = serde_json::to_string_pretty(value).map_err(|e| CliError::Output(e.to_string()))?;
    println!("{}", text);
    Ok(())
}
