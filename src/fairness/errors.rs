//! # Fairness Errors
//!
//! Error types for building and refreshing fairness controllers.
//!
//! Admission denial is not an error: `acquire_permit` returns `false`.
//! Everything here is either a construction-time configuration problem or
//! an internal inconsistency seen by a rebalance pass.

use std::fmt;
use std::path::PathBuf;

use crate::config_validator::{format_validation_errors, ConfigValidationError};

/// Fairness error types
#[derive(Debug)]
pub enum FairnessError {
    /// No tenant could be derived from the monitored namenode list
    NoNameServices,

    /// Total handler count must be positive
    InvalidHandlerCount {
        handlers: u32,
    },

    /// Not enough handlers to give every bucket one slot
    InsufficientHandlers {
        handlers: u32,
        buckets: usize,
    },

    /// A monitored entry did not yield a usable namespace
    InvalidNameService {
        entry: String,
    },

    /// Static allocation references a bucket that is not configured
    UnknownStaticBucket {
        bucket: String,
    },

    /// Static allocation gives a bucket zero handlers
    InvalidStaticCount {
        bucket: String,
        count: u32,
    },

    /// Dedicated static handlers exceed the total
    StaticOverAllocation {
        assigned: u64,
        handlers: u32,
    },

    /// Dedicated static handlers leave nothing for the remaining buckets
    StaticRemainderExhausted {
        remaining: u64,
        unassigned: usize,
    },

    /// Refresh interval cannot drive a timer
    InvalidRefreshInterval {
        reason: String,
    },

    /// The operating system refused to start the refresh worker thread
    SchedulerSpawn {
        reason: String,
    },

    /// Rebalance pass found a bucket with no permit pool
    UnknownBucket {
        bucket: String,
    },

    /// Failed to read configuration file
    ConfigRead {
        path: PathBuf,
        message: String,
    },

    /// Failed to parse configuration file
    ConfigParse {
        path: Option<PathBuf>,
        message: String,
    },

    /// One or more configuration fields were rejected
    ConfigInvalid(Vec<ConfigValidationError>),
}

impl fmt::Display for FairnessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoNameServices => {
                write!(f, "No name services configured; at least one tenant is required")
            }
            Self::InvalidHandlerCount { handlers } => {
                write!(f, "Handler count must be positive, got {}", handlers)
            }
            Self::InsufficientHandlers { handlers, buckets } => {
                write!(
                    f,
                    "Not enough handlers: {} handlers for {} buckets. \
                     Increase handler_count or reduce monitored name services.",
                    handlers, buckets
                )
            }
            Self::InvalidNameService { entry } => {
                write!(f, "Invalid monitored name service entry '{}'", entry)
            }
            Self::UnknownStaticBucket { bucket } => {
                write!(f, "Static handler count given for unknown bucket '{}'", bucket)
            }
            Self::InvalidStaticCount { bucket, count } => {
                write!(
                    f,
                    "Static handler count for '{}' must be at least 1, got {}",
                    bucket, count
                )
            }
            Self::StaticOverAllocation { assigned, handlers } => {
                write!(
                    f,
                    "Static handler counts sum to {}, more than the {} available handlers",
                    assigned, handlers
                )
            }
            Self::StaticRemainderExhausted { remaining, unassigned } => {
                write!(
                    f,
                    "Only {} handlers left for {} buckets without a static count",
                    remaining, unassigned
                )
            }
            Self::InvalidRefreshInterval { reason } => {
                write!(f, "Invalid refresh interval: {}", reason)
            }
            Self::SchedulerSpawn { reason } => {
                write!(f, "Cannot spawn permit refresh worker: {}", reason)
            }
            Self::UnknownBucket { bucket } => {
                write!(f, "Bucket '{}' has no permit pool", bucket)
            }
            Self::ConfigRead { path, message } => {
                write!(f, "Failed to read {}: {}", path.display(), message)
            }
            Self::ConfigParse { path: Some(path), message } => {
                write!(f, "Failed to parse {}: {}", path.display(), message)
            }
            Self::ConfigParse { path: None, message } => {
                write!(f, "Failed to parse configuration: {}", message)
            }
            Self::ConfigInvalid(errors) => {
                write!(f, "Invalid fairness configuration:\n{}", format_validation_errors(errors))
            }
        }
    }
}

impl std::error::Error for FairnessError {}

/// Result type for fairness operations
pub type FairnessResult<T> = Result<T, FairnessError>;

impl FairnessError {
    /// Stable error code for operator tooling
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NoNameServices => "NO_NAME_SERVICES",
            Self::InvalidHandlerCount { .. } => "INVALID_HANDLER_COUNT",
            Self::InsufficientHandlers { .. } => "INSUFFICIENT_HANDLERS",
            Self::InvalidNameService { .. } => "INVALID_NAME_SERVICE",
            Self::UnknownStaticBucket { .. } => "UNKNOWN_STATIC_BUCKET",
            Self::InvalidStaticCount { .. } => "INVALID_STATIC_COUNT",
            Self::StaticOverAllocation { .. } => "STATIC_OVER_ALLOCATION",
            Self::StaticRemainderExhausted { .. } => "STATIC_REMAINDER_EXHAUSTED",
            Self::InvalidRefreshInterval { .. } => "INVALID_REFRESH_INTERVAL",
            Self::SchedulerSpawn { .. } => "SCHEDULER_SPAWN_FAILED",
            Self::UnknownBucket { .. } => "UNKNOWN_BUCKET",
            Self::ConfigRead { .. } => "CONFIG_READ_FAILED",
            Self::ConfigParse { .. } => "CONFIG_PARSE_FAILED",
            Self::ConfigInvalid(_) => "CONFIG_INVALID",
        }
    }

    /// Whether this error comes from the supplied configuration.
    ///
    /// `UnknownBucket` only surfaces from a refresh pass; `SchedulerSpawn`
    /// is an operating system resource failure.
    pub fn is_config_error(&self) -> bool {
        !matches!(self, Self::UnknownBucket { .. } | Self::SchedulerSpawn { .. })
    }
}
