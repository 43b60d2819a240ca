//! Producer metrics

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Counters shared by the built-in producers
#[derive(Debug, Default)]
pub struct ProducerMetrics {
    /// Frame requests received from the source
    pub requests_received: AtomicU64,

    /// Requests answered with a frame
    pub frames_produced: AtomicU64,

    /// Requests that could not be answered or queued
    pub requests_dropped: AtomicU64,

    /// Current queue length (deferred producer only)
    pub queue_len: AtomicUsize,
}

impl ProducerMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_received(&self) {
        self.requests_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_produced(&self) {
        self.frames_produced.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped(&self) {
        self.requests_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn update_queue_len(&self, len: usize) {
        self.queue_len.store(len, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests_received: self.requests_received.load(Ordering::Relaxed),
            frames_produced: self.frames_produced.load(Ordering::Relaxed),
            requests_dropped: self.requests_dropped.load(Ordering::Relaxed),
            queue_len: self.queue_len.load(Ordering::Relaxed),
        }
    }
}

/// Metrics snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub requests_received: u64,
    pub frames_produced: u64,
    pub requests_dropped: u64,
    pub queue_len: usize,
}
