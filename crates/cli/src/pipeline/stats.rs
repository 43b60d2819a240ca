//! Run statistics and the in-process stats sink.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use contracts::{AudioFrame, AudioSink, ContractError};
use dispatcher::MetricsSnapshot;
use observability::{FrameMetricsAggregator, MetricsSummary};
use request_engine::{clock, SourceStatsSnapshot};
use tokio::sync::Notify;

/// Sink that aggregates frame metrics for the end-of-run report
#[derive(Debug, Default)]
pub struct StatsSink {
    aggregator: Mutex<FrameMetricsAggregator>,
    frames: AtomicU64,
    progress: Notify,
}

impl StatsSink {
    pub const NAME: &'static str = "__run_stats";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn frame_count(&self) -> u64 {
        self.frames.load(Ordering::Acquire)
    }

    /// Resolves once at least `target` frames were seen.
    pub async fn wait_for(&self, target: u64) {
        while self.frame_count() < target {
            self.progress.notified().await;
        }
    }

    pub fn summary(&self) -> MetricsSummary {
        self.aggregator
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .summary()
    }
}

impl AudioSink for StatsSink {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn on_data(&self, frame: &AudioFrame, timestamp_ms: i64) -> Result<(), ContractError> {
        {
            let mut aggregator = self.aggregator.lock().unwrap_or_else(PoisonError::into_inner);
            aggregator.update(frame, timestamp_ms);
            aggregator.record_latency((clock::now_ms() - timestamp_ms).max(0) as f64);
        }
        self.frames.fetch_add(1, Ordering::AcqRel);
        self.progress.notify_one();
        Ok(())
    }
}

/// Statistics from a pipeline run
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    /// Frames seen by the stats sink
    pub frames_dispatched: u64,

    /// Frames forwarded by the local track (if any)
    pub track_frames: Option<u64>,

    /// Total duration of the run
    pub duration: Duration,

    /// Configured sinks (the stats sink excluded)
    pub active_sinks: usize,

    pub source: SourceStatsSnapshot,

    pub registry: MetricsSnapshot,

    pub frame_metrics: MetricsSummary,
}

impl PipelineStats {
    /// Dispatched frames per second
    pub fn fps(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.frames_dispatched as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Share of issued requests that were completed, as a percentage
    pub fn completion_rate(&self) -> f64 {
        if self.source.issued > 0 {
            (self.source.completed as f64 / self.source.issued as f64) * 100.0
        } else {
            0.0
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n=== Run Statistics ===\n");

        println!("Overview");
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   ├─ Frames dispatched: {}", self.frames_dispatched);
        println!("   ├─ FPS: {:.2}", self.fps());
        println!("   ├─ Completion rate: {:.2}%", self.completion_rate());
        if let Some(track_frames) = self.track_frames {
            println!("   ├─ Track frames: {}", track_frames);
        }
        println!("   └─ Active sinks: {}", self.active_sinks);

        println!("\nRequest Engine");
        for line in self.source.to_string().lines() {
            println!("   {}", line);
        }

        println!("\nDispatch");
        println!("   ├─ Passes: {}", self.registry.frames_dispatched);
        println!("   ├─ Deliveries: {}", self.registry.deliveries);
        println!("   ├─ Failures: {}", self.registry.failures);
        println!("   └─ Pruned sinks: {}", self.registry.pruned_sinks);

        println!("\n{}", self.frame_metrics);
    }
}
