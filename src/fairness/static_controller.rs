//! # Static Fairness Controller
//!
//! Fixed handler allocation per bucket. Buckets with an entry in
//! `static_handler_counts` get exactly that many permits; the rest share
//! whatever is left evenly.

use std::collections::BTreeMap;

use super::bucket::BucketRegistry;
use super::config::FairnessConfig;
use super::controller::RpcFairnessPolicyController;
use super::errors::{FairnessError, FairnessResult};
use super::permit_pool::PermitTable;

/// Compute the fixed allocation for every bucket in `registry`
pub fn static_allocation(
    registry: &BucketRegistry,
    dedicated: &BTreeMap<String, u32>,
) -> FairnessResult<BTreeMap<String, i64>> {
    let mut assigned: u64 = 0;
    for (bucket, count) in dedicated {
        if !registry.contains(bucket) {
            return Err(FairnessError::UnknownStaticBucket {
                bucket: bucket.clone(),
            });
        }
        if *count == 0 {
            return Err(FairnessError::InvalidStaticCount {
                bucket: bucket.clone(),
                count: *count,
            });
        }
        assigned += *count as u64;
    }

    let handlers = registry.handler_count();
    if assigned > handlers as u64 {
        return Err(FairnessError::StaticOverAllocation { assigned, handlers });
    }

    let unassigned = registry.iter().filter(|b| !dedicated.contains_key(*b)).count();
    let remaining = handlers as u64 - assigned;
    let share = if unassigned == 0 {
        0
    } else {
        remaining / unassigned as u64
    };
    if unassigned > 0 && share == 0 {
        return Err(FairnessError::StaticRemainderExhausted {
            remaining,
            unassigned,
        });
    }

    Ok(registry
        .iter()
        .map(|bucket| {
            let permits = dedicated.get(bucket).map(|c| *c as u64).unwrap_or(share);
            (bucket.to_string(), permits as i64)
        })
        .collect())
}

/// Controller with a fixed per-bucket allocation
#[derive(Debug)]
pub struct StaticFairnessController {
    table: PermitTable,
}

impl StaticFairnessController {
    pub fn new(config: &FairnessConfig) -> FairnessResult<Self> {
        let registry = BucketRegistry::new(
            &config.monitor_namenodes,
            config.handler_count,
            config.minimum_handlers_per_ns,
        )?;
        let allocation = static_allocation(&registry, &config.static_handler_counts)?;

        for (bucket, permits) in &allocation {
            tracing::info!(bucket = bucket.as_str(), permits, "static handler allocation");
        }

        let table = PermitTable::new(registry, |bucket| allocation[bucket]);
        Ok(Self { table })
    }
}

impl RpcFairnessPolicyController for StaticFairnessController {
    fn acquire_permit(&self, bucket: &str) -> bool {
        self.table.try_acquire(bucket)
    }

    fn release_permit(&self, bucket: &str) {
        self.table.release(bucket);
    }

    fn shutdown(&self) {}

    fn available_permits(&self) -> BTreeMap<String, i64> {
        self.table.available_snapshot()
    }

    fn capacities(&self) -> BTreeMap<String, i64> {
        self.table.capacity_snapshot()
    }
}
