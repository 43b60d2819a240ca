//! Pipeline runner - wires producer, source, track and sinks together.

use std::future::{pending, Future};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use contracts::{AdapterConfig, AudioFrame, AudioSink};
use source_factory::FactoryCell;
use tracing::{info, trace, warn};

use super::stats::{PipelineStats, StatsSink};
use crate::error::CliError;

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Loaded and validated adapter configuration
    pub adapter: AdapterConfig,

    /// Stop after this many dispatched frames (None = unlimited)
    pub max_frames: Option<u64>,

    /// Run duration (None = until shutdown)
    pub duration: Option<Duration>,

    /// Metrics server port (None = disabled)
    pub metrics_port: Option<u16>,
}

/// Runs one external audio source end to end
pub struct Pipeline {
    config: PipelineConfig,
    factories: FactoryCell,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            factories: FactoryCell::new(),
        }
    }

    /// Run until the frame limit, the duration or `shutdown` resolves,
    /// then stop the source and collect statistics.
    pub async fn run(self, shutdown: impl Future<Output = ()>) -> Result<PipelineStats> {
        let start_time = Instant::now();
        let adapter = &self.config.adapter;

        if let Some(port) = self.config.metrics_port {
            observability::init_metrics_only(port)?;
            info!("Metrics endpoint available on port {}", port);
        }

        let producer = producers::build_producer(&adapter.producer)
            .map_err(|e| CliError::pipeline_setup(format!("producer: {e}")))?;

        if adapter.sinks.is_empty() {
            warn!("No sinks configured - frames only reach the run statistics");
        }
        let sinks = dispatcher::build_sinks(&adapter.sinks)
            .map_err(|e| CliError::pipeline_setup(e.to_string()))?;
        let stats_sink = Arc::new(StatsSink::new());

        let factory = self.factories.acquire();
        let handle = factory
            .create_source_with_config(producer, &adapter.source)
            .context("Failed to create source")?;
        let source = factory.source(handle)?;

        // The registry only holds weak references; `sinks` and `stats_sink`
        // stay alive for the whole run
        for sink in &sinks {
            source.add_sink(sink);
        }
        let stats_dyn: Arc<dyn AudioSink> = stats_sink.clone();
        source.add_sink(&stats_dyn);

        let track = match &adapter.track {
            Some(track_config) => {
                let track = factory
                    .create_audio_track(handle, &track_config.name)
                    .context("Failed to create local track")?;
                track.set_enabled(track_config.enabled);
                track.register_frame_callback(Some(Arc::new(|frame: &AudioFrame, timestamp_ms: i64| {
                    trace!(
                        timestamp_ms,
                        samples = frame.sample_count,
                        "Track frame"
                    );
                })));
                Some(track)
            }
            None => None,
        };

        factory
            .finish_creation(handle)
            .context("Failed to start source")?;

        info!(
            source = %source.name(),
            interval_ms = adapter.source.request_interval_ms,
            sinks = sinks.len(),
            track = track.is_some(),
            max_frames = ?self.config.max_frames,
            "Source running"
        );

        let frame_limit = async {
            match self.config.max_frames {
                Some(max) => stats_sink.wait_for(max).await,
                None => pending().await,
            }
        };
        let deadline = async {
            match self.config.duration {
                Some(duration) => tokio::time::sleep(duration).await,
                None => pending().await,
            }
        };

        tokio::select! {
            _ = frame_limit => {
                info!(frames = stats_sink.frame_count(), "Reached max frames limit");
            }
            _ = deadline => {
                info!("Run duration elapsed");
            }
            _ = shutdown => {
                warn!("Received shutdown signal, stopping source...");
            }
        }

        // Shutdown
        info!("Shutting down source...");
        factory.remove_ref(handle)?;
        let track_frames = track.as_ref().map(|track| track.frame_count());
        drop(track);

        for sink in &sinks {
            if let Err(e) = sink.flush() {
                warn!(sink = sink.name(), error = %e, "Flush failed");
            }
        }

        let stats = PipelineStats {
            frames_dispatched: stats_sink.frame_count(),
            track_frames,
            duration: start_time.elapsed(),
            active_sinks: sinks.len(),
            source: source.stats(),
            registry: source.registry().metrics(),
            frame_metrics: stats_sink.summary(),
        };

        info!(
            duration_secs = stats.duration.as_secs_f64(),
            fps = format!("{:.2}", stats.fps()),
            "Pipeline shutdown complete"
        );

        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{
        ProducerConfig, SineConfig, SinkConfig, SinkType, SourceConfig, TimerKind, TrackConfig,
    };
    use std::collections::HashMap;

    fn adapter(dir: &std::path::Path) -> AdapterConfig {
        let mut params = HashMap::new();
        params.insert(
            "path".to_string(),
            dir.join("capture.bin").display().to_string(),
        );
        params.insert("format".to_string(), "frames".to_string());

        AdapterConfig {
            source: SourceConfig {
                name: "cli_test".to_string(),
                first_request_delay_ms: 0,
                request_interval_ms: 5,
                timer: TimerKind::Runtime,
                ..Default::default()
            },
            producer: ProducerConfig::Sine(SineConfig {
                samples_per_frame: 80,
                sample_rate_hz: 8_000,
                ..Default::default()
            }),
            track: Some(TrackConfig {
                name: String::new(),
                enabled: true,
            }),
            sinks: vec![SinkConfig {
                name: "capture".to_string(),
                sink_type: SinkType::File,
                params,
            }],
            ..Default::default()
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_run_until_frame_limit() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = Pipeline::new(PipelineConfig {
            adapter: adapter(dir.path()),
            max_frames: Some(5),
            duration: Some(Duration::from_secs(10)),
            metrics_port: None,
        });

        let stats = pipeline.run(pending()).await.unwrap();

        assert!(stats.frames_dispatched >= 5);
        assert!(stats.source.completed >= 5);
        assert_eq!(stats.active_sinks, 1);
        assert!(stats.track_frames.unwrap() >= 5);
        assert_eq!(stats.registry.failures, 0);

        let frames = dispatcher::read_capture(&dir.path().join("capture.bin")).unwrap();
        assert!(frames.len() >= 5);
        assert!(frames
            .windows(2)
            .all(|pair| pair[0].timestamp_ms <= pair[1].timestamp_ms));
    }

    #[tokio::test]
    async fn test_shutdown_signal_stops_run() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = adapter(dir.path());
        config.source.request_interval_ms = 1_000;
        config.source.first_request_delay_ms = 1_000;

        let pipeline = Pipeline::new(PipelineConfig {
            adapter: config,
            max_frames: None,
            duration: None,
            metrics_port: None,
        });

        let stats = pipeline.run(async {}).await.unwrap();
        assert_eq!(stats.frames_dispatched, 0);
        assert_eq!(stats.source.issued, 0);
    }
}
