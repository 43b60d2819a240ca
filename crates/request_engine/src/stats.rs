//! In-process request counters for one source

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use observability::{RunningStats, StatsSummary};

#[derive(Debug, Default)]
pub struct SourceStats {
    issued: AtomicU64,
    evicted: AtomicU64,
    completed: AtomicU64,
    /// Pending entries removed by a later completion
    superseded: AtomicU64,
    rejected: AtomicU64,
    producer_failures: AtomicU64,
    /// Completions whose caller timestamp differed from the issue time
    timestamp_overrides: AtomicU64,
    latency_ms: Mutex<RunningStats>,
}

impl SourceStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_issued(&self, evicted: bool) {
        self.issued.fetch_add(1, Ordering::Relaxed);
        if evicted {
            self.evicted.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_completed(&self, superseded: usize, overridden: bool, latency_ms: f64) {
        self.completed.fetch_add(1, Ordering::Relaxed);
        self.superseded
            .fetch_add(superseded as u64, Ordering::Relaxed);
        if overridden {
            self.timestamp_overrides.fetch_add(1, Ordering::Relaxed);
        }
        self.latency_ms
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(latency_ms);
    }

    pub(crate) fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_producer_failure(&self) {
        self.producer_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> SourceStatsSnapshot {
        let latency = self
            .latency_ms
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        SourceStatsSnapshot {
            issued: self.issued.load(Ordering::Relaxed),
            evicted: self.evicted.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            superseded: self.superseded.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            producer_failures: self.producer_failures.load(Ordering::Relaxed),
            timestamp_overrides: self.timestamp_overrides.load(Ordering::Relaxed),
            latency_ms: StatsSummary::from(&*latency),
        }
    }
}

/// Point-in-time copy of [`SourceStats`]
#[derive(Debug, Clone, Default)]
pub struct SourceStatsSnapshot {
    pub issued: u64,
    pub evicted: u64,
    pub completed: u64,
    pub superseded: u64,
    pub rejected: u64,
    pub producer_failures: u64,
    pub timestamp_overrides: u64,
    pub latency_ms: StatsSummary,
}

impl std::fmt::Display for SourceStatsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Requests issued: {}", self.issued)?;
        writeln!(f, "Requests evicted: {}", self.evicted)?;
        writeln!(
            f,
            "Requests completed: {} (superseded {})",
            self.completed, self.superseded
        )?;
        writeln!(f, "Completions rejected: {}", self.rejected)?;
        writeln!(f, "Producer failures: {}", self.producer_failures)?;
        writeln!(f, "Timestamp overrides: {}", self.timestamp_overrides)?;
        writeln!(f, "Completion latency (ms): {}", self.latency_ms)
    }
}
