//! Metrics for views, trackers, traversals and transactions
//!
//! Recording goes through the `metrics` facade; with no recorder installed
//! every call is a no-op.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use std::time::Instant;

/// Metric names
pub mod names {
    pub const VIEWS_CREATED: &str = "storage.views.created";
    pub const VIEWS_MERGED: &str = "storage.views.merged";
    pub const VIEWS_RELEASED: &str = "storage.views.released";
    pub const MERGE_DURATION: &str = "storage.merge.duration_ms";
    pub const TRACKED_VIEWS: &str = "tracker.views.tracked";
    pub const TRACKER_NOTIFICATIONS: &str = "tracker.notifications";
    pub const CURSORS_INVALIDATED: &str = "indices.cursors.invalidated";
    pub const TX_EXECUTED: &str = "transactions.executed";
    pub const TX_ROLLED_BACK: &str = "transactions.rolled_back";
    pub const TX_DURATION: &str = "transactions.duration_ms";
}

/// Initialize metrics with descriptions
pub fn init_metrics() {
    // Storage metrics
    describe_counter!(names::VIEWS_CREATED, "Number of snapshots and forks created");
    describe_counter!(names::VIEWS_MERGED, "Number of forks merged into the database");
    describe_counter!(names::VIEWS_RELEASED, "Number of views explicitly released");
    describe_histogram!(names::MERGE_DURATION, "Fork merge duration in milliseconds");

    // Tracker metrics
    describe_gauge!(names::TRACKED_VIEWS, "Number of views with modification counters");
    describe_counter!(names::TRACKER_NOTIFICATIONS, "Number of recorded index modifications");
    describe_counter!(
        names::CURSORS_INVALIDATED,
        "Number of iterators and streams failed by a concurrent modification"
    );

    // Transaction metrics
    describe_counter!(names::TX_EXECUTED, "Number of transactions executed successfully");
    describe_counter!(names::TX_ROLLED_BACK, "Number of failed transactions rolled back");
    describe_histogram!(names::TX_DURATION, "Transaction execution duration in milliseconds");
}

/// Record a counter metric
pub fn record_counter(name: &'static str, value: u64) {
    counter!(name).increment(value);
}

/// Record a gauge metric
pub fn record_gauge(name: &'static str, value: f64) {
    gauge!(name).set(value);
}

/// Record a histogram metric
pub fn record_histogram(name: &'static str, value: f64) {
    histogram!(name).record(value);
}

/// Timer for measuring operation duration
pub struct Timer {
    name: &'static str,
    start: Instant,
}

impl Timer {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            start: Instant::now(),
        }
    }

    /// Stop the timer and record the duration in milliseconds
    pub fn stop(self) {
        record_histogram(self.name, self.start.elapsed().as_secs_f64() * 1000.0);
    }
}
