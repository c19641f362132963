//! # Rebalancer
//!
//! Proportional redistribution of handler capacity.
//!
//! For each bucket `b` with weight `w(b) = rejected + accepted` over the last
//! interval and total weight `W`:
//!
//! ```text
//! target(b) = max(m, floor(H * w(b) / W))
//! ```
//!
//! Targets are floored, never rounded, and are not renormalized: when
//! several buckets are lifted to the floor `m` the targets may sum to more
//! than `H`. A pass with `W == 0` changes nothing.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::bucket::BucketRegistry;
use super::demand::DemandSnapshot;
use super::errors::{FairnessError, FairnessResult};
use super::permit_pool::PermitTable;

/// Capacity change applied to one bucket
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CapacityChange {
    pub bucket: String,
    pub previous: i64,
    pub target: i64,
}

impl CapacityChange {
    pub fn delta(&self) -> i64 {
        self.target - self.previous
    }
}

/// Result of one rebalance pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RebalanceOutcome {
    /// No demand was observed; capacities were left alone
    Skipped,
    /// New capacities were applied, in registry order
    Applied(Vec<CapacityChange>),
}

impl RebalanceOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied(_))
    }
}

/// Capacity arithmetic for a fixed `H` and `m`
#[derive(Debug, Clone)]
pub struct Rebalancer {
    handler_count: u32,
    minimum_per_bucket: u32,
}

impl Rebalancer {
    pub fn new(handler_count: u32, minimum_per_bucket: u32) -> Self {
        Self {
            handler_count,
            minimum_per_bucket,
        }
    }

    pub fn for_registry(registry: &BucketRegistry) -> Self {
        Self::new(registry.handler_count(), registry.minimum_per_bucket())
    }

    /// Target capacity per bucket, or `None` when there is no demand signal.
    ///
    /// Pure function of the snapshot: the same weights always yield the
    /// same targets.
    pub fn targets(
        &self,
        registry: &BucketRegistry,
        snapshot: &DemandSnapshot,
    ) -> Option<BTreeMap<String, i64>> {
        let total = snapshot.total_weight();
        if total == 0 {
            return None;
        }

        let handlers = self.handler_count as u128;
        let floor = self.minimum_per_bucket as i64;
        let targets = registry
            .iter()
            .map(|bucket| {
                let weight = snapshot.get(bucket).weight() as u128;
                // weight <= total, so the share never exceeds H
                let share = (handlers * weight / total) as i64;
                (bucket.to_string(), share.max(floor))
            })
            .collect();
        Some(targets)
    }

    /// Compute targets from `snapshot` and resize every pool in `table`.
    ///
    /// Buckets are resized one at a time; if a bucket is missing from the
    /// table the pass stops there and earlier resizes stay applied.
    pub fn apply(
        &self,
        table: &PermitTable,
        snapshot: &DemandSnapshot,
    ) -> FairnessResult<RebalanceOutcome> {
        let registry = table.registry();
        let targets = match self.targets(registry, snapshot) {
            Some(targets) => targets,
            None => return Ok(RebalanceOutcome::Skipped),
        };

        let mut changes = Vec::with_capacity(targets.len());
        for bucket in registry.iter() {
            let target = targets[bucket];
            let slot = table.slot(bucket).ok_or_else(|| FairnessError::UnknownBucket {
                bucket: bucket.to_string(),
            })?;
            let previous = slot.resize_to(target);
            tracing::debug!(
                bucket,
                previous,
                target,
                available = slot.pool().available(),
                "resized permit pool"
            );
            changes.push(CapacityChange {
                bucket: bucket.to_string(),
                previous,
                target,
            });
        }
        Ok(RebalanceOutcome::Applied(changes))
    }
}

/// Pass counters, readable without locking
#[derive(Debug, Default)]
pub struct RefreshStats {
    applied: AtomicU64,
    skipped: AtomicU64,
    failed: AtomicU64,
    last_applied_millis: AtomicI64,
}

/// Point-in-time copy of [`RefreshStats`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RefreshStatsSnapshot {
    pub applied: u64,
    pub skipped: u64,
    pub failed: u64,
    pub last_applied_at: Option<DateTime<Utc>>,
}

impl RefreshStats {
    pub fn record(&self, result: &FairnessResult<RebalanceOutcome>) {
        match result {
            Ok(RebalanceOutcome::Applied(_)) => {
                self.applied.fetch_add(1, Ordering::Relaxed);
                self.last_applied_millis
                    .store(Utc::now().timestamp_millis(), Ordering::Relaxed);
            }
            Ok(RebalanceOutcome::Skipped) => {
                self.skipped.fetch_add(1, Ordering::Relaxed);
            }
            Err(_) => {
                self.failed.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub fn snapshot(&self) -> RefreshStatsSnapshot {
        let millis = self.last_applied_millis.load(Ordering::Relaxed);
        RefreshStatsSnapshot {
            applied: self.applied.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            last_applied_at: if millis == 0 {
                None
            } else {
                DateTime::from_timestamp_millis(millis)
            },
        }
    }
}
