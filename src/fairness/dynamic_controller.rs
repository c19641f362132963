//! # Dynamic Fairness Controller
//!
//! Starts every bucket at an even share of the handler pool and
//! periodically moves capacity toward buckets that see more traffic.
//!
//! Request threads touch only the per-bucket atomics in the permit table
//! and the demand accumulator. Refresh passes, manual or scheduled, go
//! through the same atomics.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use super::bucket::BucketRegistry;
use super::config::FairnessConfig;
use super::controller::RpcFairnessPolicyController;
use super::demand::{DemandAccumulator, DemandSnapshot};
use super::errors::FairnessResult;
use super::permit_pool::PermitTable;
use super::rebalancer::{RebalanceOutcome, Rebalancer, RefreshStats, RefreshStatsSnapshot};
use super::scheduler::{RefreshInterval, RefreshScheduler};

/// State shared between the controller and its refresh loop
#[derive(Debug)]
struct DynamicCore {
    table: PermitTable,
    demand: DemandAccumulator,
    rebalancer: Rebalancer,
    stats: RefreshStats,
}

impl DynamicCore {
    fn refresh(&self) -> FairnessResult<RebalanceOutcome> {
        let snapshot: DemandSnapshot = self.demand.snapshot_and_reset();
        let result = self.rebalancer.apply(&self.table, &snapshot);
        self.stats.record(&result);

        match &result {
            Ok(RebalanceOutcome::Applied(changes)) => {
                let moved = changes.iter().filter(|c| c.delta() != 0).count();
                tracing::info!(
                    total_weight = snapshot.total_weight() as u64,
                    buckets_changed = moved,
                    "permit capacities refreshed"
                );
            }
            Ok(RebalanceOutcome::Skipped) => {}
            Err(e) => {
                tracing::warn!(error = %e, "permit refresh stopped partway");
            }
        }
        result
    }
}

/// Demand-driven fairness controller
#[derive(Debug)]
pub struct DynamicFairnessController {
    core: Arc<DynamicCore>,
    scheduler: Mutex<Option<RefreshScheduler>>,
}

impl DynamicFairnessController {
    /// Build from configuration, using its refresh interval
    pub fn new(config: &FairnessConfig) -> FairnessResult<Self> {
        Self::with_refresh_interval(config, config.refresh_interval())
    }

    /// Build with an explicit refresh interval. An enabled interval starts
    /// a dedicated refresh worker thread.
    pub fn with_refresh_interval(
        config: &FairnessConfig,
        interval: RefreshInterval,
    ) -> FairnessResult<Self> {
        let registry = BucketRegistry::new(
            &config.monitor_namenodes,
            config.handler_count,
            config.minimum_handlers_per_ns,
        )?;
        let initial = registry.even_share();

        let core = Arc::new(DynamicCore {
            rebalancer: Rebalancer::for_registry(&registry),
            demand: DemandAccumulator::new(registry.clone()),
            table: PermitTable::new(registry, |_| initial),
            stats: RefreshStats::default(),
        });

        let scheduler = match interval {
            RefreshInterval::Disabled => None,
            RefreshInterval::Every(period) => {
                let pass_core = Arc::clone(&core);
                Some(RefreshScheduler::start(period, move || pass_core.refresh())?)
            }
        };

        tracing::info!(
            handlers = core.table.registry().handler_count(),
            buckets = core.table.registry().len(),
            minimum = core.table.registry().minimum_per_bucket(),
            initial,
            scheduled = scheduler.is_some(),
            "dynamic fairness controller initialised"
        );

        Ok(Self {
            core,
            scheduler: Mutex::new(scheduler),
        })
    }

    pub fn registry(&self) -> &BucketRegistry {
        self.core.table.registry()
    }

    /// Demand recorded since the last refresh pass
    pub fn pending_demand(&self) -> DemandSnapshot {
        self.core.demand.pending()
    }

    /// Whether the background refresh loop is running
    pub fn is_scheduled(&self) -> bool {
        self.scheduler
            .lock()
            .map(|s| s.as_ref().map(RefreshScheduler::is_running).unwrap_or(false))
            .unwrap_or(false)
    }
}

impl RpcFairnessPolicyController for DynamicFairnessController {
    fn acquire_permit(&self, bucket: &str) -> bool {
        self.core.table.try_acquire(bucket)
    }

    fn release_permit(&self, bucket: &str) {
        self.core.table.release(bucket);
    }

    fn shutdown(&self) {
        // A poisoned lock still holds a valid Option
        let mut guard = match self.scheduler.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(mut scheduler) = guard.take() {
            scheduler.shutdown();
        }
    }

    fn available_permits(&self) -> BTreeMap<String, i64> {
        self.core.table.available_snapshot()
    }

    fn capacities(&self) -> BTreeMap<String, i64> {
        self.core.table.capacity_snapshot()
    }

    fn set_metrics(&self, rejected: &HashMap<String, u64>, accepted: &HashMap<String, u64>) {
        self.core.demand.merge(rejected, accepted);
    }

    fn record_admission(&self, bucket: &str, admitted: bool) {
        self.core.demand.record(bucket, !admitted);
    }

    fn refresh_permits_cap(&self) -> FairnessResult<RebalanceOutcome> {
        self.core.refresh()
    }

    fn refresh_stats(&self) -> RefreshStatsSnapshot {
        self.core.stats.snapshot()
    }
}

impl Drop for DynamicFairnessController {
    fn drop(&mut self) {
        self.shutdown();
    }
}
