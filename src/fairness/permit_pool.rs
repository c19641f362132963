//! # Permit Pools
//!
//! A resizable, non-blocking counting semaphore per bucket.
//!
//! Availability is a signed counter. Shrinking a bucket below the permits
//! it has handed out drives the counter negative; acquisitions then fail
//! until enough releases (or a later grow) bring it back above zero. Held
//! permits are never revoked.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicI64, Ordering};

use super::bucket::BucketRegistry;

/// Signed counting semaphore with try-acquire only
#[derive(Debug)]
pub struct PermitPool {
    available: AtomicI64,
}

impl PermitPool {
    pub fn new(initial: i64) -> Self {
        Self {
            available: AtomicI64::new(initial),
        }
    }

    /// Take one permit if any is available. Never blocks.
    pub fn try_acquire(&self) -> bool {
        self.available
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |v| {
                if v > 0 {
                    Some(v - 1)
                } else {
                    None
                }
            })
            .is_ok()
    }

    /// Return one permit. Not paired with a prior acquire; always counts.
    pub fn release(&self) {
        self.available.fetch_add(1, Ordering::AcqRel);
    }

    /// Add `delta` to availability, which may go negative. Returns the new
    /// availability.
    pub fn resize_by(&self, delta: i64) -> i64 {
        self.available.fetch_add(delta, Ordering::AcqRel) + delta
    }

    /// Current availability, possibly negative
    pub fn available(&self) -> i64 {
        self.available.load(Ordering::Acquire)
    }
}

/// Permit pool plus the nominal capacity it was last sized to
#[derive(Debug)]
pub struct BucketSlot {
    pool: PermitPool,
    capacity: AtomicI64,
}

impl BucketSlot {
    fn new(capacity: i64) -> Self {
        Self {
            pool: PermitPool::new(capacity),
            capacity: AtomicI64::new(capacity),
        }
    }

    pub fn pool(&self) -> &PermitPool {
        &self.pool
    }

    pub fn capacity(&self) -> i64 {
        self.capacity.load(Ordering::Acquire)
    }

    /// Move the nominal capacity to `target` and shift availability by the
    /// difference. Returns the previous capacity.
    ///
    /// The previous value is swapped out atomically so two overlapping
    /// resizes each apply only their own step.
    pub fn resize_to(&self, target: i64) -> i64 {
        let previous = self.capacity.swap(target, Ordering::AcqRel);
        self.pool.resize_by(target - previous);
        previous
    }
}

/// One slot per registered bucket. The map is fixed at construction; only
/// the atomics inside each slot change afterwards.
#[derive(Debug)]
pub struct PermitTable {
    registry: BucketRegistry,
    slots: HashMap<String, BucketSlot>,
}

impl PermitTable {
    /// Build a table, sizing each bucket with `capacity_for(bucket)`.
    pub fn new(registry: BucketRegistry, capacity_for: impl Fn(&str) -> i64) -> Self {
        let slots = registry
            .iter()
            .map(|bucket| (bucket.to_string(), BucketSlot::new(capacity_for(bucket))))
            .collect();
        Self { registry, slots }
    }

    pub fn registry(&self) -> &BucketRegistry {
        &self.registry
    }

    /// Slot for an exact bucket name
    pub fn slot(&self, bucket: &str) -> Option<&BucketSlot> {
        self.slots.get(bucket)
    }

    /// Slot for a caller-supplied identifier, with shared-bucket fallback
    fn resolved_slot(&self, bucket: &str) -> Option<&BucketSlot> {
        let resolved = self.registry.resolve(bucket);
        if resolved != bucket {
            tracing::trace!(bucket, resolved, "unknown bucket, using shared bucket");
        }
        self.slots.get(resolved)
    }

    pub fn try_acquire(&self, bucket: &str) -> bool {
        self.resolved_slot(bucket)
            .map(|slot| slot.pool.try_acquire())
            .unwrap_or(false)
    }

    pub fn release(&self, bucket: &str) {
        if let Some(slot) = self.resolved_slot(bucket) {
            slot.pool.release();
        }
    }

    /// Available permits per bucket
    pub fn available_snapshot(&self) -> BTreeMap<String, i64> {
        self.slots
            .iter()
            .map(|(bucket, slot)| (bucket.clone(), slot.pool.available()))
            .collect()
    }

    /// Nominal capacity per bucket
    pub fn capacity_snapshot(&self) -> BTreeMap<String, i64> {
        self.slots
            .iter()
            .map(|(bucket, slot)| (bucket.clone(), slot.capacity()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fairness::bucket::{parse_monitor_list, CONCURRENT_NS};
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_acquire_until_empty() {
        let pool = PermitPool::new(3);
        assert!(pool.try_acquire());
        assert!(pool.try_acquire());
        assert!(pool.try_acquire());
        assert!(!pool.try_acquire());
        assert_eq!(pool.available(), 0);

        pool.release();
        assert!(pool.try_acquire());
        assert!(!pool.try_acquire());
    }

    #[test]
    fn test_release_above_capacity() {
        let pool = PermitPool::new(1);
        pool.release();
        pool.release();
        assert_eq!(pool.available(), 3);
    }

    #[test]
    fn test_negative_resize_requires_payback() {
        let pool = PermitPool::new(2);
        assert!(pool.try_acquire());
        assert!(pool.try_acquire());

        // Shrink by 3 while both permits are out
        assert_eq!(pool.resize_by(-3), -3);
        assert!(!pool.try_acquire());

        for _ in 0..3 {
            pool.release();
            assert!(!pool.try_acquire());
        }
        pool.release();
        assert!(pool.try_acquire());
    }

    #[test]
    fn test_slot_resize_to() {
        let slot = BucketSlot::new(10);
        assert_eq!(slot.resize_to(4), 10);
        assert_eq!(slot.capacity(), 4);
        assert_eq!(slot.pool().available(), 4);

        assert_eq!(slot.resize_to(6), 4);
        assert_eq!(slot.pool().available(), 6);
    }

    #[test]
    fn test_table_unknown_bucket_uses_shared() {
        let registry = BucketRegistry::new(&parse_monitor_list("ns1.nn1"), 4, 1).unwrap();
        let table = PermitTable::new(registry, |_| 2);

        assert!(table.try_acquire("nope"));
        assert!(table.try_acquire("other"));
        assert!(!table.try_acquire(CONCURRENT_NS));
        table.release("still-unknown");
        assert_eq!(table.available_snapshot()[CONCURRENT_NS], 1);
        assert_eq!(table.available_snapshot()["ns1"], 2);
    }

    #[test]
    fn test_concurrent_acquire_never_overshoots() {
        let pool = Arc::new(PermitPool::new(100));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let pool = Arc::clone(&pool);
                thread::spawn(move || (0..50).filter(|_| pool.try_acquire()).count())
            })
            .collect();

        let acquired: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(acquired, 100);
        assert_eq!(pool.available(), 0);
    }

    #[test]
    fn test_overlapping_resizes_converge() {
        let slot = Arc::new(BucketSlot::new(10));
        let handles: Vec<_> = (0..8i64)
            .map(|t| {
                let slot = Arc::clone(&slot);
                thread::spawn(move || {
                    for i in 0..500i64 {
                        slot.resize_to((t * 7 + i) % 40 - 5);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        // Whatever order the steps landed in, availability tracks capacity
        assert_eq!(slot.pool().available(), slot.capacity());
        slot.resize_to(9);
        assert_eq!(slot.capacity(), 9);
        assert_eq!(slot.pool().available(), 9);
    }
}
