//! # Demand Accumulator
//!
//! Per-bucket rejected/accepted call counters for the current refresh
//! interval. The serving path and the metrics pipeline add to them; a
//! rebalance pass drains them with `snapshot_and_reset`.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use super::bucket::BucketRegistry;

/// Counters for a single bucket
#[derive(Debug, Default)]
pub struct DemandCounters {
    rejected: AtomicU64,
    accepted: AtomicU64,
}

impl DemandCounters {
    fn add(&self, rejected: u64, accepted: u64) {
        if rejected > 0 {
            self.rejected.fetch_add(rejected, Ordering::Relaxed);
        }
        if accepted > 0 {
            self.accepted.fetch_add(accepted, Ordering::Relaxed);
        }
    }

    /// Each counter is swapped to zero on its own. An increment racing the
    /// reset lands in exactly one interval.
    fn take(&self) -> BucketDemand {
        BucketDemand {
            rejected: self.rejected.swap(0, Ordering::AcqRel),
            accepted: self.accepted.swap(0, Ordering::AcqRel),
        }
    }

    fn peek(&self) -> BucketDemand {
        BucketDemand {
            rejected: self.rejected.load(Ordering::Relaxed),
            accepted: self.accepted.load(Ordering::Relaxed),
        }
    }
}

/// Demand observed for one bucket over one interval
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketDemand {
    pub rejected: u64,
    pub accepted: u64,
}

impl BucketDemand {
    /// Rebalancing weight: every observed call, admitted or not
    pub fn weight(&self) -> u64 {
        self.rejected.saturating_add(self.accepted)
    }
}

/// Drained demand for all buckets
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DemandSnapshot {
    buckets: BTreeMap<String, BucketDemand>,
}

impl DemandSnapshot {
    pub fn get(&self, bucket: &str) -> BucketDemand {
        self.buckets.get(bucket).copied().unwrap_or_default()
    }

    pub fn total_weight(&self) -> u128 {
        self.buckets.values().map(|d| d.weight() as u128).sum()
    }
}

impl FromIterator<(String, BucketDemand)> for DemandSnapshot {
    fn from_iter<I: IntoIterator<Item = (String, BucketDemand)>>(iter: I) -> Self {
        Self {
            buckets: iter.into_iter().collect(),
        }
    }
}

/// Counters for every registered bucket
#[derive(Debug)]
pub struct DemandAccumulator {
    registry: BucketRegistry,
    counters: HashMap<String, DemandCounters>,
}

impl DemandAccumulator {
    pub fn new(registry: BucketRegistry) -> Self {
        let counters = registry
            .iter()
            .map(|bucket| (bucket.to_string(), DemandCounters::default()))
            .collect();
        Self { registry, counters }
    }

    fn counters_for(&self, bucket: &str) -> Option<&DemandCounters> {
        self.counters.get(self.registry.resolve(bucket))
    }

    /// Count one admission decision
    pub fn record(&self, bucket: &str, rejected: bool) {
        if let Some(counters) = self.counters_for(bucket) {
            if rejected {
                counters.add(1, 0);
            } else {
                counters.add(0, 1);
            }
        }
    }

    /// Merge externally collected counts. Buckets missing from either map
    /// contribute zero; unknown buckets are folded into the shared bucket.
    pub fn merge(&self, rejected: &HashMap<String, u64>, accepted: &HashMap<String, u64>) {
        for (bucket, count) in rejected {
            if let Some(counters) = self.counters_for(bucket) {
                counters.add(*count, 0);
            }
        }
        for (bucket, count) in accepted {
            if let Some(counters) = self.counters_for(bucket) {
                counters.add(0, *count);
            }
        }
    }

    /// Drain all counters into a snapshot
    pub fn snapshot_and_reset(&self) -> DemandSnapshot {
        self.counters
            .iter()
            .map(|(bucket, counters)| (bucket.clone(), counters.take()))
            .collect()
    }

    /// Read counters without draining them
    pub fn pending(&self) -> DemandSnapshot {
        self.counters
            .iter()
            .map(|(bucket, counters)| (bucket.clone(), counters.peek()))
            .collect()
    }
}
