//! LogSink - logs frame summaries via tracing

use std::sync::atomic::{AtomicU64, Ordering};

use contracts::{AudioFrame, AudioSink, ContractError};
use tracing::{debug, info};

/// Sink that logs frame summaries for debugging
pub struct LogSink {
    name: String,
    frames: AtomicU64,
    /// Emit an info-level summary every N frames (debug for the rest)
    summary_every: u64,
}

impl LogSink {
    /// Create a new LogSink with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            frames: AtomicU64::new(0),
            summary_every: 100,
        }
    }

    pub fn with_summary_every(mut self, every: u64) -> Self {
        self.summary_every = every.max(1);
        self
    }

    /// Frames seen so far
    pub fn frame_count(&self) -> u64 {
        self.frames.load(Ordering::Relaxed)
    }
}

impl AudioSink for LogSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn on_data(&self, frame: &AudioFrame, timestamp_ms: i64) -> Result<(), ContractError> {
        let count = self.frames.fetch_add(1, Ordering::Relaxed) + 1;

        if count.is_multiple_of(self.summary_every) {
            info!(
                sink = %self.name,
                frames = count,
                timestamp_ms,
                sample_rate_hz = frame.sample_rate_hz,
                channels = frame.channel_count,
                "AudioFrame progress"
            );
        } else {
            debug!(
                sink = %self.name,
                timestamp_ms,
                bytes = frame.data.len(),
                samples = frame.sample_count,
                bits = frame.bits_per_sample,
                "AudioFrame received"
            );
        }
        Ok(())
    }
}
