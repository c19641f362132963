//! End-to-end behaviour of the dynamic fairness controller, driven through
//! the public controller interface in both manual and scheduled refresh mode.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use rpc_fairness::fairness::{
    new_controller, DynamicFairnessController, FairnessConfig, RefreshInterval,
    RpcFairnessPolicyController, CONCURRENT_NS,
};

const MONITORS: &str = "ns1.nn1, ns1.nn2, ns2.nn1, ns2.nn2, ns3.nn1";
const BUCKETS: [&str; 4] = ["ns1", "ns2", "ns3", CONCURRENT_NS];

fn config(handlers: u32) -> FairnessConfig {
    FairnessConfig::dynamic(MONITORS, handlers, 3)
}

fn counts(entries: &[(&str, u64)]) -> HashMap<String, u64> {
    entries.iter().map(|(b, c)| (b.to_string(), *c)).collect()
}

/// Acquire until refused and return how many succeeded
fn drain(controller: &dyn RpcFairnessPolicyController, bucket: &str) -> usize {
    let mut taken = 0;
    while controller.acquire_permit(bucket) {
        taken += 1;
    }
    taken
}

fn release_n(controller: &dyn RpcFairnessPolicyController, bucket: &str, n: usize) {
    for _ in 0..n {
        controller.release_permit(bucket);
    }
}

/// H=20 with partial load: capacities move to 6/3/6/6
fn prepare_partial_load(controller: &dyn RpcFairnessPolicyController) {
    for bucket in BUCKETS {
        assert_eq!(drain(controller, bucket), 5, "bucket {}", bucket);
        release_n(controller, bucket, 5);
    }
    controller.set_metrics(
        &counts(&[("ns1", 10), ("ns2", 0), ("ns3", 10), (CONCURRENT_NS, 10)]),
        &HashMap::new(),
    );
}

fn assert_partial_load_result(controller: &dyn RpcFairnessPolicyController) {
    assert_eq!(drain(controller, "ns1"), 6);
    assert_eq!(drain(controller, "ns2"), 3);
    assert_eq!(drain(controller, "ns3"), 6);
    assert_eq!(drain(controller, CONCURRENT_NS), 6);
}

/// H=40 fully acquired, then shared demand collapses
fn prepare_overload(controller: &dyn RpcFairnessPolicyController) {
    for bucket in BUCKETS {
        assert_eq!(drain(controller, bucket), 10, "bucket {}", bucket);
    }
    controller.set_metrics(
        &counts(&[("ns1", 13), ("ns2", 13), ("ns3", 13), (CONCURRENT_NS, 1)]),
        &HashMap::new(),
    );
}

fn assert_overload_result(controller: &dyn RpcFairnessPolicyController) {
    let json: BTreeMap<String, i64> =
        serde_json::from_str(&controller.available_handler_on_per_ns()).unwrap();
    let expected: BTreeMap<String, i64> = [
        (CONCURRENT_NS.to_string(), -7),
        ("ns1".to_string(), 3),
        ("ns2".to_string(), 3),
        ("ns3".to_string(), 3),
    ]
    .into_iter()
    .collect();
    assert_eq!(json, expected);

    assert_eq!(drain(controller, "ns1"), 3);
    assert_eq!(drain(controller, "ns2"), 3);
    assert_eq!(drain(controller, "ns3"), 3);

    assert!(!controller.acquire_permit(CONCURRENT_NS));
    release_n(controller, CONCURRENT_NS, 7);
    assert!(!controller.acquire_permit(CONCURRENT_NS));
    controller.release_permit(CONCURRENT_NS);
    assert!(controller.acquire_permit(CONCURRENT_NS));
}

#[test]
fn test_initial_split_is_even() {
    let controller = new_controller(&config(20)).unwrap();
    for bucket in BUCKETS {
        assert_eq!(controller.available_permits()[bucket], 5);
    }
    let controller = new_controller(&config(40)).unwrap();
    for bucket in BUCKETS {
        assert_eq!(drain(controller.as_ref(), bucket), 10);
    }
}

#[test]
fn test_partial_load_manual_refresh() {
    let controller = new_controller(&config(20)).unwrap();
    prepare_partial_load(controller.as_ref());
    assert!(controller.refresh_permits_cap().unwrap().is_applied());

    let capacities = controller.capacities();
    assert_eq!(capacities["ns1"], 6);
    assert_eq!(capacities["ns2"], 3);
    assert_eq!(capacities["ns3"], 6);
    assert_eq!(capacities[CONCURRENT_NS], 6);
    assert_partial_load_result(controller.as_ref());
}

#[test]
fn test_overload_manual_refresh() {
    let controller = new_controller(&config(40)).unwrap();
    prepare_overload(controller.as_ref());
    assert!(controller.refresh_permits_cap().unwrap().is_applied());
    assert_overload_result(controller.as_ref());
}

#[test]
fn test_unchanged_metrics_converge() {
    let controller = new_controller(&config(20)).unwrap();
    let rejected = counts(&[("ns1", 10), ("ns3", 10), (CONCURRENT_NS, 10)]);

    controller.set_metrics(&rejected, &HashMap::new());
    controller.refresh_permits_cap().unwrap();
    let first = controller.available_permits();

    controller.set_metrics(&rejected, &HashMap::new());
    controller.refresh_permits_cap().unwrap();
    assert_eq!(controller.available_permits(), first);
}

#[test]
fn test_unknown_bucket_uses_shared_pool() {
    let controller = new_controller(&config(20)).unwrap();
    assert!(controller.acquire_permit("ns-unmonitored"));
    assert_eq!(controller.available_permits()[CONCURRENT_NS], 4);
    controller.release_permit("ns-unmonitored");
    assert_eq!(controller.available_permits()[CONCURRENT_NS], 5);
}

fn scheduled(handlers: u32) -> DynamicFairnessController {
    DynamicFairnessController::with_refresh_interval(
        &config(handlers),
        RefreshInterval::Every(Duration::from_millis(100)),
    )
    .unwrap()
}

#[tokio::test]
async fn test_partial_load_scheduled_refresh() {
    let controller = scheduled(20);
    assert!(controller.is_scheduled());
    prepare_partial_load(&controller);

    tokio::time::sleep(Duration::from_millis(350)).await;
    assert!(controller.refresh_stats().applied >= 1);
    assert_partial_load_result(&controller);
    controller.shutdown();
    assert!(!controller.is_scheduled());
}

#[tokio::test]
async fn test_overload_scheduled_refresh() {
    let controller = scheduled(40);
    prepare_overload(&controller);

    tokio::time::sleep(Duration::from_millis(350)).await;
    assert_eq!(controller.refresh_stats().applied, 1);
    assert_overload_result(&controller);
}

#[test]
fn test_concurrent_traffic_never_overshoots() {
    let controller: Arc<dyn RpcFairnessPolicyController> =
        Arc::from(new_controller(&config(40)).unwrap());
    let in_flight = Arc::new(AtomicI64::new(0));
    let peak = Arc::new(AtomicI64::new(0));

    let workers: Vec<_> = (0..8)
        .map(|_| {
            let controller = Arc::clone(&controller);
            let in_flight = Arc::clone(&in_flight);
            let peak = Arc::clone(&peak);
            thread::spawn(move || {
                for _ in 0..2000 {
                    if controller.acquire_permit("ns2") {
                        let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        in_flight.fetch_sub(1, Ordering::SeqCst);
                        controller.release_permit("ns2");
                    }
                    controller.record_admission("ns2", true);
                }
            })
        })
        .collect();

    for _ in 0..20 {
        controller.refresh_permits_cap().unwrap();
    }
    for worker in workers {
        worker.join().unwrap();
    }
    controller.refresh_permits_cap().unwrap();

    // ns2 had all the demand, so it ends with the whole pool
    assert!(peak.load(Ordering::SeqCst) <= 40);
    assert_eq!(controller.capacities()["ns2"], 40);
    assert_eq!(controller.available_permits()["ns2"], 40);
}

#[test]
fn test_concurrent_refresh_keeps_pools_balanced() {
    let controller: Arc<dyn RpcFairnessPolicyController> =
        Arc::from(new_controller(&config(40)).unwrap());

    let refreshers: Vec<_> = (0..6)
        .map(|i| {
            let controller = Arc::clone(&controller);
            thread::spawn(move || {
                for round in 0..200u64 {
                    let heavy = BUCKETS[(i + round as usize) % BUCKETS.len()];
                    controller.set_metrics(&counts(&[(heavy, 5 + round % 7)]), &HashMap::new());
                    controller.refresh_permits_cap().unwrap();
                }
            })
        })
        .collect();
    for refresher in refreshers {
        refresher.join().unwrap();
    }

    // Nothing is held, so every pool sits exactly at its capacity
    assert_eq!(controller.available_permits(), controller.capacities());

    controller.set_metrics(&counts(&[("ns1", 1)]), &HashMap::new());
    controller.refresh_permits_cap().unwrap();
    let capacities = controller.capacities();
    assert_eq!(capacities["ns1"], 40);
    assert_eq!(capacities["ns2"], 3);
    assert_eq!(controller.available_permits(), capacities);
}

#[test]
fn test_configured_interval_refreshes_without_runtime() {
    let mut config = config(20);
    config.refresh_interval_secs = 1;
    let controller = new_controller(&config).unwrap();
    prepare_partial_load(controller.as_ref());

    thread::sleep(Duration::from_millis(1500));
    assert_eq!(controller.refresh_stats().applied, 1);
    assert_partial_load_result(controller.as_ref());
    controller.shutdown();
}
