//! AdapterConfig - Config Loader output
//!
//! Describes one external audio source: scheduling cadence, ledger bound,
//! tick source, frame producer, optional local track and output sinks.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use validator::Validate;

/// Default bound on outstanding frame requests
pub const MAX_PENDING_REQUEST_COUNT: usize = 64;

/// Config version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// Complete adapter configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct AdapterConfig {
    #[serde(default)]
    pub version: ConfigVersion,

    /// Request engine settings
    #[serde(default)]
    #[validate(nested)]
    pub source: SourceConfig,

    /// Frame producer
    #[serde(default)]
    pub producer: ProducerConfig,

    /// Local track fed by the source (optional)
    #[serde(default)]
    #[validate(nested)]
    pub track: Option<TrackConfig>,

    /// Output routing
    #[serde(default)]
    #[validate(nested)]
    pub sinks: Vec<SinkConfig>,
}

/// Request engine settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct SourceConfig {
    /// Friendly name used in logs and metrics
    #[validate(length(min = 1, max = 128))]
    pub name: String,

    /// Delay before the first frame request
    #[validate(range(max = 10_000))]
    pub first_request_delay_ms: u64,

    /// Period between frame requests
    #[validate(range(min = 1, max = 10_000))]
    pub request_interval_ms: u64,

    /// Ledger capacity; the oldest request is evicted beyond this
    #[validate(range(min = 1, max = 4096))]
    pub max_pending_requests: usize,

    /// Tick source selection
    pub timer: TimerKind,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            name: crate::SourceName::DEFAULT.to_string(),
            first_request_delay_ms: 10,
            request_interval_ms: 30,
            max_pending_requests: MAX_PENDING_REQUEST_COUNT,
            timer: TimerKind::Auto,
        }
    }
}

impl SourceConfig {
    pub fn first_request_delay(&self) -> Duration {
        Duration::from_millis(self.first_request_delay_ms)
    }

    pub fn request_interval(&self) -> Duration {
        Duration::from_millis(self.request_interval_ms)
    }
}

/// Which tick source drives the scheduler
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerKind {
    /// Runtime timer when a tokio runtime is available, else a thread
    #[default]
    Auto,
    /// Dedicated OS thread
    Thread,
    /// Task on the ambient tokio runtime
    Runtime,
}

/// Frame producer selection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProducerConfig {
    /// Synthetic sine tone
    Sine(SineConfig),
    /// Frames captured earlier by a framed file sink
    Replay(ReplayConfig),
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self::Sine(SineConfig::default())
    }
}

/// Sine tone producer settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct SineConfig {
    /// Tone frequency
    #[validate(range(min = 1.0, max = 20_000.0))]
    pub frequency_hz: f64,

    #[validate(range(min = 8_000, max = 192_000))]
    pub sample_rate_hz: u32,

    #[validate(range(min = 1, max = 8))]
    pub channel_count: u32,

    /// Samples per channel in each frame
    #[validate(range(min = 1, max = 48_000))]
    pub samples_per_frame: u32,

    /// Peak amplitude (0..=1 of full scale)
    #[validate(range(min = 0.0, max = 1.0))]
    pub amplitude: f64,
}

impl Default for SineConfig {
    fn default() -> Self {
        Self {
            frequency_hz: 100.0,
            sample_rate_hz: 48_000,
            channel_count: 1,
            samples_per_frame: 480,
            amplitude: 0.5,
        }
    }
}

/// Replay producer settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayConfig {
    /// Framed capture written by `FileSink` with `format = "frames"`
    pub path: PathBuf,

    /// Restart from the first frame when the capture is exhausted
    #[serde(default = "default_loop_playback")]
    pub loop_playback: bool,
}

fn default_loop_playback() -> bool {
    true
}

/// Local track settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct TrackConfig {
    /// Track name; empty means `external_track`
    #[serde(default)]
    #[validate(length(max = 128))]
    pub name: String,

    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

/// Sink output configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SinkConfig {
    /// Sink name
    #[validate(length(min = 1, max = 128))]
    pub name: String,

    /// Sink type
    pub sink_type: SinkType,

    /// Type-specific parameters
    #[serde(default)]
    pub params: HashMap<String, String>,
}

/// Sink type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkType {
    /// Frame summaries through tracing
    Log,
    /// Raw PCM or framed capture on disk
    File,
}
