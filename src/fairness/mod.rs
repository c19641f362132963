//! Per-Namespace Handler Fairness
//!
//! Admission control for a federated RPC router. The router owns a fixed
//! pool of `H` handlers shared by calls to many downstream nameservices;
//! each nameservice (plus the shared `concurrent` bucket) gets its own
//! permit pool so one busy tenant cannot starve the rest.
//!
//! # Policies
//!
//! - `none`: every call is admitted
//! - `static`: fixed per-bucket allocation from configuration
//! - `dynamic`: even split at start, then capacity follows observed demand
//!
//! # Concurrency
//!
//! Acquire and release are single atomic operations and never block.
//! Rebalancing resizes pools by delta, so permits held across a refresh
//! are returned to the right pool and no permit is created or lost.

mod bucket;
mod config;
mod controller;
mod demand;
mod dynamic_controller;
mod errors;
mod permit_pool;
mod rebalancer;
mod scheduler;
mod static_controller;

pub use bucket::{parse_monitor_list, BucketRegistry, CONCURRENT_NS};
pub use config::{FairnessConfig, PolicyKind};
pub use controller::{
    acquire_guard, new_controller, NoFairnessController, PermitGuard, RpcFairnessPolicyController,
};
pub use demand::{BucketDemand, DemandAccumulator, DemandSnapshot};
pub use dynamic_controller::DynamicFairnessController;
pub use errors::{FairnessError, FairnessResult};
pub use permit_pool::{BucketSlot, PermitPool, PermitTable};
pub use rebalancer::{
    CapacityChange, RebalanceOutcome, Rebalancer, RefreshStats, RefreshStatsSnapshot,
};
pub use scheduler::{RefreshInterval, RefreshScheduler};
pub use static_controller::{static_allocation, StaticFairnessController};
