//! Reclaimer metrics
//!
//! Thread-safe counters describing reclaimer activity.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Thread-safe metrics for the reclaimer
#[derive(Debug, Clone)]
pub struct ReclaimMetrics {
    inner: Arc<MetricsInner>,
}

#[derive(Debug)]
struct MetricsInner {
    /// Number of sweeps run
    ticks: AtomicU64,
    /// Entries found due across all sweeps
    entries_due: AtomicUsize,
    /// Entries physically deleted and removed from the registry
    entries_reclaimed: AtomicUsize,
    /// Physical deletes that returned an error
    delete_failures: AtomicUsize,
    /// Physical deletes that exceeded the timeout
    delete_timeouts: AtomicUsize,
    /// Due entries skipped because they are still backing off
    backoff_deferrals: AtomicUsize,
    /// Due entries that were undropped or claimed between snapshot and reclaim
    lost_races: AtomicUsize,
}

impl Default for ReclaimMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ReclaimMetrics {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MetricsInner {
                ticks: AtomicU64::new(0),
                entries_due: AtomicUsize::new(0),
                entries_reclaimed: AtomicUsize::new(0),
                delete_failures: AtomicUsize::new(0),
                delete_timeouts: AtomicUsize::new(0),
                backoff_deferrals: AtomicUsize::new(0),
                lost_races: AtomicUsize::new(0),
            }),
        }
    }

    pub fn record_tick(&self) {
        self.inner.ticks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_due(&self, count: usize) {
        self.inner.entries_due.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_reclaimed(&self) {
        self.inner.entries_reclaimed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_delete_failure(&self) {
        self.inner.delete_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_delete_timeout(&self) {
        self.inner.delete_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_backoff_deferral(&self) {
        self.inner.backoff_deferrals.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_lost_race(&self) {
        self.inner.lost_races.fetch_add(1, Ordering::Relaxed);
    }

    pub fn ticks(&self) -> u64 {
        self.inner.ticks.load(Ordering::Relaxed)
    }

    pub fn entries_due(&self) -> usize {
        self.inner.entries_due.load(Ordering::Relaxed)
    }

    pub fn entries_reclaimed(&self) -> usize {
        self.inner.entries_reclaimed.load(Ordering::Relaxed)
    }

    pub fn delete_failures(&self) -> usize {
        self.inner.delete_failures.load(Ordering::Relaxed)
    }

    pub fn delete_timeouts(&self) -> usize {
        self.inner.delete_timeouts.load(Ordering::Relaxed)
    }

    pub fn backoff_deferrals(&self) -> usize {
        self.inner.backoff_deferrals.load(Ordering::Relaxed)
    }

    pub fn lost_races(&self) -> usize {
        self.inner.lost_races.load(Ordering::Relaxed)
    }

    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            ticks: self.ticks(),
            entries_due: self.entries_due(),
            entries_reclaimed: self.entries_reclaimed(),
            delete_failures: self.delete_failures(),
            delete_timeouts: self.delete_timeouts(),
            backoff_deferrals: self.backoff_deferrals(),
            lost_races: self.lost_races(),
        }
    }
}

/// Point-in-time view of [`ReclaimMetrics`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsSummary {
    pub ticks: u64,
    pub entries_due: usize,
    pub entries_reclaimed: usize,
    pub delete_failures: usize,
    pub delete_timeouts: usize,
    pub backoff_deferrals: usize,
    pub lost_races: usize,
}

impl MetricsSummary {
    pub fn log(&self) {
        tracing::info!(
            ticks = self.ticks,
            entries_due = self.entries_due,
            entries_reclaimed = self.entries_reclaimed,
            delete_failures = self.delete_failures,
            delete_timeouts = self.delete_timeouts,
            backoff_deferrals = self.backoff_deferrals,
            lost_races = self.lost_races,
            "Reclaimer metrics summary"
        );
    }
}
