//! # Fairness Configuration
//!
//! Router handler fairness settings, loaded from a TOML file.
//!
//! ```toml
//! policy = "dynamic"
//! handler_count = 40
//! monitor_namenodes = ["ns1.nn1", "ns1.nn2", "ns2.nn1"]
//! minimum_handlers_per_ns = 3
//! refresh_interval_secs = 10
//!
//! [static_handler_counts]
//! ns1 = 12
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::errors::{FairnessError, FairnessResult};
use super::scheduler::RefreshInterval;
use crate::config_validator::ConfigValidator;

/// Which controller variant the router runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyKind {
    /// Every call is admitted
    #[default]
    None,
    /// Fixed per-namespace allocation
    Static,
    /// Allocation follows observed demand
    Dynamic,
}

impl std::fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Static => write!(f, "static"),
            Self::Dynamic => write!(f, "dynamic"),
        }
    }
}

fn default_handler_count() -> u32 {
    10
}

fn default_minimum_handlers() -> u32 {
    1
}

fn default_refresh_interval_secs() -> u64 {
    10
}

/// Fairness configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FairnessConfig {
    /// Controller variant
    pub policy: PolicyKind,

    /// Total RPC handlers shared by all buckets
    pub handler_count: u32,

    /// Monitored `nameservice.namenode` entries; buckets are derived from the
    /// nameservice part
    pub monitor_namenodes: Vec<String>,

    /// Capacity floor per bucket for the dynamic policy
    pub minimum_handlers_per_ns: u32,

    /// Seconds between dynamic refresh passes (0 = manual refresh only)
    pub refresh_interval_secs: u64,

    /// Dedicated handlers per bucket for the static policy
    pub static_handler_counts: BTreeMap<String, u32>,
}

impl Default for FairnessConfig {
    fn default() -> Self {
        Self {
            policy: PolicyKind::default(),
            handler_count: default_handler_count(),
            monitor_namenodes: Vec::new(),
            minimum_handlers_per_ns: default_minimum_handlers(),
            refresh_interval_secs: default_refresh_interval_secs(),
            static_handler_counts: BTreeMap::new(),
        }
    }
}

impl FairnessConfig {
    /// Load and validate configuration from a TOML file
    pub fn load(path: &Path) -> FairnessResult<Self> {
        let text = fs::read_to_string(path).map_err(|e| FairnessError::ConfigRead {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let config: FairnessConfig =
            toml::from_str(&text).map_err(|e| FairnessError::ConfigParse {
                path: Some(path.to_path_buf()),
                message: e.to_string(),
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(text: &str) -> FairnessResult<Self> {
        let config: FairnessConfig =
            toml::from_str(text).map_err(|e| FairnessError::ConfigParse {
                path: None,
                message: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Render as TOML
    pub fn to_toml_string(&self) -> FairnessResult<String> {
        toml::to_string_pretty(self).map_err(|e| FairnessError::ConfigParse {
            path: None,
            message: e.to_string(),
        })
    }

    /// Field-level validation. The `none` policy ignores everything else.
    pub fn validate(&self) -> FairnessResult<()> {
        if self.policy == PolicyKind::None {
            return Ok(());
        }

        let mut v = ConfigValidator::new();
        v.validate_positive("handler_count", self.handler_count as u64)
            .validate_non_empty_list("monitor_namenodes", &self.monitor_namenodes)
            .validate_qualified_names("monitor_namenodes", &self.monitor_namenodes);

        if self.policy == PolicyKind::Static {
            for (bucket, count) in &self.static_handler_counts {
                v.validate_at_least(&format!("static_handler_counts.{}", bucket), *count as u64, 1);
            }
        }

        v.finish().map_err(FairnessError::ConfigInvalid)
    }

    /// Background refresh cadence for the dynamic policy
    pub fn refresh_interval(&self) -> RefreshInterval {
        RefreshInterval::from_secs(self.refresh_interval_secs)
    }

    /// Builder-style helper for code and tests that assemble configs directly
    pub fn dynamic(monitor_namenodes: &str, handler_count: u32, minimum: u32) -> Self {
        Self {
            policy: PolicyKind::Dynamic,
            handler_count,
            monitor_namenodes: super::bucket::parse_monitor_list(monitor_namenodes),
            minimum_handlers_per_ns: minimum,
            refresh_interval_secs: 0,
            ..Default::default()
        }
    }
}
