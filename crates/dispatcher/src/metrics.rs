//! Registry metrics for observability

use std::sync::atomic::{AtomicU64, Ordering};

use contracts::DispatchReport;

/// Counters for one sink registry
#[derive(Debug, Default)]
pub struct RegistryMetrics {
    /// Dispatch passes
    frames_dispatched: AtomicU64,
    /// Successful per-sink deliveries
    deliveries: AtomicU64,
    /// Failed per-sink deliveries (error or panic)
    failures: AtomicU64,
    /// Dead sink references removed from the registry
    pruned_sinks: AtomicU64,
}

impl RegistryMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one dispatch pass into the counters
    pub fn record_pass(&self, report: &DispatchReport) {
        self.frames_dispatched.fetch_add(1, Ordering::Relaxed);
        self.deliveries
            .fetch_add(report.delivered as u64, Ordering::Relaxed);
        self.failures
            .fetch_add(report.failed as u64, Ordering::Relaxed);
    }

    pub fn add_pruned(&self, count: u64) {
        self.pruned_sinks.fetch_add(count, Ordering::Relaxed);
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            frames_dispatched: self.frames_dispatched.load(Ordering::Relaxed),
            deliveries: self.deliveries.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            pruned_sinks: self.pruned_sinks.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of registry metrics (for reporting)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub frames_dispatched: u64,
    pub deliveries: u64,
    pub failures: u64,
    pub pruned_sinks: u64,
}
