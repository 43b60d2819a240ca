//! Local audio track fed by an external source

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use contracts::{AudioFrame, AudioSink, ContractError};
use request_engine::ExternalAudioSource;
use tracing::debug;

use crate::factory::GlobalFactory;

/// Receives every frame the track forwards
pub type FrameCallback = Arc<dyn Fn(&AudioFrame, i64) + Send + Sync>;

/// Track registered as a sink of its source.
///
/// Frames reach the callback only while the track is enabled. The track
/// keeps its source and the factory alive.
pub struct LocalAudioTrack {
    name: String,
    source: Arc<ExternalAudioSource>,
    _factory: Arc<GlobalFactory>,
    enabled: AtomicBool,
    callback: Mutex<Option<FrameCallback>>,
    frames: AtomicU64,
}

impl LocalAudioTrack {
    pub const DEFAULT_NAME: &'static str = "external_track";

    pub(crate) fn new(
        name: &str,
        source: Arc<ExternalAudioSource>,
        factory: Arc<GlobalFactory>,
    ) -> Self {
        Self {
            name: name.to_string(),
            source,
            _factory: factory,
            enabled: AtomicBool::new(true),
            callback: Mutex::new(None),
            frames: AtomicU64::new(0),
        }
    }

    pub fn source(&self) -> &Arc<ExternalAudioSource> {
        &self.source
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub fn set_enabled(&self, enabled: bool) {
        if self.enabled.swap(enabled, Ordering::AcqRel) != enabled {
            debug!(track = %self.name, enabled, "Track toggled");
        }
    }

    /// Install or clear the frame callback.
    pub fn register_frame_callback(&self, callback: Option<FrameCallback>) {
        *self.callback() = callback;
    }

    /// Frames forwarded to the callback so far
    pub fn frame_count(&self) -> u64 {
        self.frames.load(Ordering::Relaxed)
    }

    fn callback(&self) -> MutexGuard<'_, Option<FrameCallback>> {
        self.callback.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for LocalAudioTrack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalAudioTrack")
            .field("name", &self.name)
            .field("source", self.source.name())
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

impl AudioSink for LocalAudioTrack {
    fn name(&self) -> &str {
        &self.name
    }

    fn on_data(&self, frame: &AudioFrame, timestamp_ms: i64) -> Result<(), ContractError> {
        if !self.is_enabled() {
            return Ok(());
        }
        // Clone out so the callback runs without the lock
        let callback = self.callback().clone();
        if let Some(callback) = callback {
            callback(frame, timestamp_ms);
            self.frames.fetch_add(1, Ordering::Relaxed);
        }
        Ok(())
    }
}
