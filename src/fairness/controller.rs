//! # Fairness Policy Controller
//!
//! The capability surface the router's dispatch path talks to. The router
//! calls `acquire_permit` before proxying a call and `release_permit` once
//! it completes; it never needs to know which policy is active.

use std::collections::{BTreeMap, HashMap};

use super::config::{FairnessConfig, PolicyKind};
use super::dynamic_controller::DynamicFairnessController;
use super::errors::FairnessResult;
use super::rebalancer::{RebalanceOutcome, RefreshStatsSnapshot};
use super::static_controller::StaticFairnessController;

/// Admission control over the router's handler pool
pub trait RpcFairnessPolicyController: Send + Sync {
    /// Try to take a handler permit for `bucket`. Never blocks; `false`
    /// means the call should be rejected.
    fn acquire_permit(&self, bucket: &str) -> bool;

    /// Give a permit back. Never fails, even without a matching acquire.
    fn release_permit(&self, bucket: &str);

    /// Stop any background work
    fn shutdown(&self);

    /// Available permits per bucket; values may be negative
    fn available_permits(&self) -> BTreeMap<String, i64>;

    /// Nominal capacity per bucket
    fn capacities(&self) -> BTreeMap<String, i64> {
        BTreeMap::new()
    }

    /// Available permits per bucket as a flat JSON object
    fn available_handler_on_per_ns(&self) -> String {
        serde_json::to_string(&self.available_permits()).unwrap_or_else(|_| "{}".to_string())
    }

    /// Feed rejected/accepted counts for the next refresh pass
    fn set_metrics(&self, _rejected: &HashMap<String, u64>, _accepted: &HashMap<String, u64>) {}

    /// Count one admission decision for the next refresh pass
    fn record_admission(&self, _bucket: &str, _admitted: bool) {}

    /// Run one refresh pass now
    fn refresh_permits_cap(&self) -> FairnessResult<RebalanceOutcome> {
        Ok(RebalanceOutcome::Skipped)
    }

    /// Refresh pass counters
    fn refresh_stats(&self) -> RefreshStatsSnapshot {
        RefreshStatsSnapshot::default()
    }
}

/// Build the controller selected by `config.policy`
pub fn new_controller(
    config: &FairnessConfig,
) -> FairnessResult<Box<dyn RpcFairnessPolicyController>> {
    config.validate()?;
    let controller: Box<dyn RpcFairnessPolicyController> = match config.policy {
        PolicyKind::None => Box::new(NoFairnessController),
        PolicyKind::Static => Box::new(StaticFairnessController::new(config)?),
        PolicyKind::Dynamic => Box::new(DynamicFairnessController::new(config)?),
    };
    tracing::info!(policy = %config.policy, "fairness policy controller ready");
    Ok(controller)
}

/// Controller that admits everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoFairnessController;

impl RpcFairnessPolicyController for NoFairnessController {
    fn acquire_permit(&self, _bucket: &str) -> bool {
        true
    }

    fn release_permit(&self, _bucket: &str) {}

    fn shutdown(&self) {}

    fn available_permits(&self) -> BTreeMap<String, i64> {
        BTreeMap::new()
    }
}

/// RAII guard for an acquired permit
pub struct PermitGuard<'a> {
    controller: &'a dyn RpcFairnessPolicyController,
    bucket: String,
}

impl<'a> PermitGuard<'a> {
    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

impl<'a> Drop for PermitGuard<'a> {
    fn drop(&mut self) {
        self.controller.release_permit(&self.bucket);
    }
}

/// Acquire a permit that is released when the guard drops
pub fn acquire_guard<'a>(
    controller: &'a dyn RpcFairnessPolicyController,
    bucket: &str,
) -> Option<PermitGuard<'a>> {
    if controller.acquire_permit(bucket) {
        Some(PermitGuard {
            controller,
            bucket: bucket.to_string(),
        })
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fairness::bucket::CONCURRENT_NS;

    #[test]
    fn test_no_controller_admits_everything() {
        let controller = new_controller(&FairnessConfig::default()).unwrap();
        for _ in 0..1000 {
            assert!(controller.acquire_permit("ns1"));
        }
        controller.release_permit("ns1");
        assert_eq!(controller.available_handler_on_per_ns(), "{}");
        assert_eq!(
            controller.refresh_permits_cap().unwrap(),
            RebalanceOutcome::Skipped
        );
    }

    #[test]
    fn test_factory_selects_policy() {
        let mut config = FairnessConfig::dynamic("ns1.nn1, ns2.nn1", 6, 1);
        let dynamic = new_controller(&config).unwrap();
        assert_eq!(dynamic.available_permits()["ns1"], 2);

        config.policy = PolicyKind::Static;
        config.static_handler_counts.insert("ns1".to_string(), 4);
        let fixed = new_controller(&config).unwrap();
        assert_eq!(fixed.available_permits()["ns1"], 4);
        assert_eq!(fixed.available_permits()[CONCURRENT_NS], 1);
    }

    #[test]
    fn test_factory_rejects_bad_config() {
        let config = FairnessConfig::dynamic("ns1.nn1, ns2.nn1", 2, 1);
        assert!(new_controller(&config).is_err());
    }

    #[test]
    fn test_guard_releases_on_drop() {
        let config = FairnessConfig::dynamic("ns1.nn1", 2, 1);
        let controller = new_controller(&config).unwrap();

        {
            let guard = acquire_guard(controller.as_ref(), "ns1").unwrap();
            assert_eq!(guard.bucket(), "ns1");
            assert!(acquire_guard(controller.as_ref(), "ns1").is_none());
        }
        assert_eq!(controller.available_permits()["ns1"], 1);
    }
}
