//! Sine wave producer
//!
//! Answers every request synchronously with a 16-bit PCM sine frame. Phase
//! carries over between frames so consecutive frames join without clicks.

use std::f64::consts::TAU;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use contracts::{AudioFrame, ContractError, FrameProducer, FrameRequest, SineConfig};
use tracing::trace;

use crate::metrics::ProducerMetrics;

/// Sine wave frame producer
pub struct SineProducer {
    config: SineConfig,
    /// Per-channel samples emitted so far
    position: AtomicU64,
    metrics: Arc<ProducerMetrics>,
}

impl SineProducer {
    /// # Errors
    /// `InvalidParameter` when the sample rate, channel count or frame size
    /// is zero.
    pub fn new(config: SineConfig) -> Result<Self, ContractError> {
        if config.sample_rate_hz == 0 || config.channel_count == 0 || config.samples_per_frame == 0
        {
            return Err(ContractError::invalid_parameter(
                "sine producer needs a non-zero sample rate, channel count and frame size",
            ));
        }
        Ok(Self {
            config,
            position: AtomicU64::new(0),
            metrics: Arc::new(ProducerMetrics::new()),
        })
    }

    pub fn with_metrics(mut self, metrics: Arc<ProducerMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn metrics(&self) -> &Arc<ProducerMetrics> {
        &self.metrics
    }

    /// Render the next frame and advance the phase.
    pub fn next_frame(&self) -> AudioFrame {
        let samples = self.config.samples_per_frame;
        let channels = self.config.channel_count as usize;
        let start = self.position.fetch_add(samples as u64, Ordering::Relaxed);

        let rate = self.config.sample_rate_hz as f64;
        let scale = self.config.amplitude.clamp(0.0, 1.0) * i16::MAX as f64;
        let mut pcm: Vec<i16> = Vec::with_capacity(samples as usize * channels);
        for n in 0..samples as u64 {
            let t = (start + n) as f64 / rate;
            let value = (scale * (TAU * self.config.frequency_hz * t).sin()).round() as i16;
            pcm.extend(std::iter::repeat_n(value, channels));
        }

        AudioFrame::new(
            Bytes::copy_from_slice(bytemuck::cast_slice(&pcm)),
            16,
            self.config.sample_rate_hz,
            self.config.channel_count,
            samples,
        )
    }
}

impl FrameProducer for SineProducer {
    fn frame_requested(&self, request: &FrameRequest) -> Result<(), ContractError> {
        self.metrics.record_received();
        let frame = self.next_frame();
        let report = request.complete(&frame).inspect_err(|_| {
            self.metrics.record_dropped();
        })?;
        self.metrics.record_produced();
        trace!(
            request_id = request.request_id,
            delivered = report.delivered,
            "Sine frame completed"
        );
        Ok(())
    }
}
