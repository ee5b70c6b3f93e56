/*
    tracker.rs - Modification counters shared by index proxies

    Every (view, index address) pair owns a monotonically increasing counter.
    Index proxies bump it on each mutating call; iterators and streams capture
    it and compare it before yielding each element.

    Counters live here and not on the proxies, because several proxies may
    denote the same logical index (aliases) and must observe each other's
    changes.
*/

use crate::metrics::{names, record_counter, record_gauge};
use crate::storage::address::IndexAddress;
use crate::storage::errors::StorageResult;
use crate::storage::view::{View, ViewId};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

static GLOBAL_TRACKER: Lazy<Arc<ModificationTracker>> =
    Lazy::new(|| Arc::new(ModificationTracker::new()));

/// Registry of per-(view, address) modification counters
#[derive(Debug, Default)]
pub struct ModificationTracker {
    counters: RwLock<HashMap<ViewId, HashMap<IndexAddress, AtomicU64>>>,
}

impl ModificationTracker {
    /// Create an isolated tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide tracker
    pub fn global() -> Arc<ModificationTracker> {
        Arc::clone(&GLOBAL_TRACKER)
    }

    /// Record one modification of `address` through `view`
    ///
    /// Fails without touching any counter if the view is read-only or has
    /// been released. Returns the new counter value.
    pub fn notify_modified(&self, view: &View, address: &IndexAddress) -> StorageResult<u64> {
        view.check_can_modify()?;
        let view_id = view.id();

        // Fast path: the counter already exists.
        {
            let counters = self.counters.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(counter) = counters.get(&view_id).and_then(|m| m.get(address)) {
                let value = counter.fetch_add(1, Ordering::SeqCst) + 1;
                record_counter(names::TRACKER_NOTIFICATIONS, 1);
                return Ok(value);
            }
        }

        let mut counters = self.counters.write().unwrap_or_else(PoisonError::into_inner);
        let value = counters
            .entry(view_id)
            .or_default()
            .entry(address.clone())
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(1, Ordering::SeqCst)
            + 1;
        record_counter(names::TRACKER_NOTIFICATIONS, 1);
        record_gauge(names::TRACKED_VIEWS, counters.len() as f64);
        Ok(value)
    }

    /// Current counter value; 0 if the address was never modified in the view
    pub fn current_count(&self, view_id: ViewId, address: &IndexAddress) -> u64 {
        let counters = self.counters.read().unwrap_or_else(PoisonError::into_inner);
        counters
            .get(&view_id)
            .and_then(|m| m.get(address))
            .map_or(0, |counter| counter.load(Ordering::SeqCst))
    }

    /// Bump every counter known for a view
    ///
    /// Used when the whole view changes at once, e.g. a fork rolled back to a
    /// checkpoint.
    pub fn notify_view_modified(&self, view_id: ViewId) {
        let counters = self.counters.read().unwrap_or_else(PoisonError::into_inner);
        if let Some(per_view) = counters.get(&view_id) {
            for counter in per_view.values() {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    /// Drop all counters of a view that is no longer usable
    pub fn forget_view(&self, view_id: ViewId) {
        let mut counters = self.counters.write().unwrap_or_else(PoisonError::into_inner);
        if counters.remove(&view_id).is_some() {
            record_gauge(names::TRACKED_VIEWS, counters.len() as f64);
        }
    }

    /// Number of views with at least one counter
    pub fn tracked_views(&self) -> usize {
        self.counters.read().unwrap_or_else(PoisonError::into_inner).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::address::IndexType;
    use crate::storage::database::MemoryDb;
    use crate::storage::errors::StorageError;
    use std::thread;

    fn setup() -> (Arc<ModificationTracker>, MemoryDb) {
        let tracker = Arc::new(ModificationTracker::new());
        let db = MemoryDb::with_tracker(Arc::clone(&tracker));
        (tracker, db)
    }

    #[test]
    fn test_unknown_address_is_zero() {
        let (tracker, db) = setup();
        let fork = db.create_fork();
        let addr = IndexAddress::new(IndexType::List, "a");
        assert_eq!(tracker.current_count(fork.id(), &addr), 0);
    }

    #[test]
    fn test_notify_increments_by_one() {
        let (tracker, db) = setup();
        let fork = db.create_fork();
        let addr = IndexAddress::new(IndexType::List, "a");

        assert_eq!(tracker.notify_modified(&fork, &addr).unwrap(), 1);
        assert_eq!(tracker.notify_modified(&fork, &addr).unwrap(), 2);
        assert_eq!(tracker.current_count(fork.id(), &addr), 2);
    }

    #[test]
    fn test_counters_are_independent() {
        let (tracker, db) = setup();
        let fork1 = db.create_fork();
        let fork2 = db.create_fork();
        let a = IndexAddress::new(IndexType::List, "A");
        let b = IndexAddress::new(IndexType::List, "B");

        tracker.notify_modified(&fork1, &a).unwrap();

        assert_eq!(tracker.current_count(fork1.id(), &a), 1);
        assert_eq!(tracker.current_count(fork2.id(), &a), 0);
        assert_eq!(tracker.current_count(fork1.id(), &b), 0);
    }

    #[test]
    fn test_snapshot_is_rejected_before_counting() {
        let (tracker, db) = setup();
        let snapshot = db.create_snapshot();
        let addr = IndexAddress::new(IndexType::List, "a");

        let result = tracker.notify_modified(&snapshot, &addr);

        assert!(matches!(result, Err(StorageError::UnsupportedOperation(_))));
        assert_eq!(tracker.current_count(snapshot.id(), &addr), 0);
        assert_eq!(tracker.tracked_views(), 0);
    }

    #[test]
    fn test_view_wide_bump_and_forget() {
        let (tracker, db) = setup();
        let fork = db.create_fork();
        let a = IndexAddress::new(IndexType::List, "A");
        let b = IndexAddress::new(IndexType::Map, "B");
        tracker.notify_modified(&fork, &a).unwrap();
        tracker.notify_modified(&fork, &b).unwrap();

        tracker.notify_view_modified(fork.id());
        assert_eq!(tracker.current_count(fork.id(), &a), 2);
        assert_eq!(tracker.current_count(fork.id(), &b), 2);

        tracker.forget_view(fork.id());
        assert_eq!(tracker.current_count(fork.id(), &a), 0);
        assert_eq!(tracker.tracked_views(), 0);
    }

    #[test]
    fn test_concurrent_increments_are_not_lost() {
        let (tracker, db) = setup();
        let forks: Vec<View> = (0..4).map(|_| db.create_fork()).collect();
        let addr = IndexAddress::new(IndexType::List, "shared");

        thread::scope(|s| {
            for fork in &forks {
                for _ in 0..2 {
                    let tracker = &tracker;
                    let addr = &addr;
                    s.spawn(move || {
                        for _ in 0..500 {
                            tracker.notify_modified(fork, addr).unwrap();
                        }
                    });
                }
            }
        });

        for fork in &forks {
            assert_eq!(tracker.current_count(fork.id(), &addr), 1000);
        }
    }
}
