//! GlobalFactory 核心实现
//!
//! 以句柄表管理外部音频源的创建、引用计数与关闭。

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use contracts::{
    AudioFrame, AudioSink, DispatchReport, FrameProducer, RequestId, SourceConfig,
};
use request_engine::ExternalAudioSource;
use slab::Slab;
use tracing::{debug, info, instrument, warn};

use crate::error::{FactoryError, Result};
use crate::handle::SourceHandle;
use crate::track::LocalAudioTrack;

struct Slot {
    generation: u64,
    refcount: u32,
    source: Arc<ExternalAudioSource>,
}

/// Source factory
///
/// Owns every source created through it. Callers hold [`SourceHandle`]s
/// with explicit reference counts; the source shuts down and its slot is
/// freed when the count reaches zero.
pub struct GlobalFactory {
    slots: Mutex<Slab<Slot>>,
    next_generation: AtomicU64,
}

impl Default for GlobalFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl GlobalFactory {
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(Slab::new()),
            next_generation: AtomicU64::new(1),
        }
    }

    fn slots(&self) -> MutexGuard<'_, Slab<Slot>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Create a source with default scheduling. Reference count starts at 1.
    pub fn create_source(
        &self,
        producer: Arc<dyn FrameProducer>,
        name: &str,
    ) -> Result<SourceHandle> {
        let config = SourceConfig {
            name: name.to_string(),
            ..SourceConfig::default()
        };
        self.create_source_with_config(producer, &config)
    }

    #[instrument(
        name = "factory_create_source",
        skip(self, producer, config),
        fields(source = %config.name)
    )]
    pub fn create_source_with_config(
        &self,
        producer: Arc<dyn FrameProducer>,
        config: &SourceConfig,
    ) -> Result<SourceHandle> {
        let source = Arc::new(ExternalAudioSource::with_config(producer, config)?);
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);

        let index = self.slots().insert(Slot {
            generation,
            refcount: 1,
            source,
        });
        let handle = SourceHandle { index, generation };
        debug!(%handle, "Source registered");
        Ok(handle)
    }

    /// Resolve a handle to its source.
    pub fn source(&self, handle: SourceHandle) -> Result<Arc<ExternalAudioSource>> {
        self.slots()
            .get(handle.index)
            .filter(|slot| slot.generation == handle.generation)
            .map(|slot| slot.source.clone())
            .ok_or(FactoryError::InvalidHandle { handle })
    }

    /// Go live and start requesting frames.
    pub fn finish_creation(&self, handle: SourceHandle) -> Result<()> {
        self.source(handle)?.finish_creation()?;
        Ok(())
    }

    pub fn complete_request(
        &self,
        handle: SourceHandle,
        request_id: RequestId,
        timestamp_ms: i64,
        frame: &AudioFrame,
    ) -> Result<DispatchReport> {
        let source = self.source(handle)?;
        Ok(source.complete_request(request_id, timestamp_ms, frame)?)
    }

    /// Stop the source for good. The handle stays valid until released.
    pub fn shutdown(&self, handle: SourceHandle) -> Result<()> {
        self.source(handle)?.shutdown();
        Ok(())
    }

    /// Returns the new reference count.
    pub fn add_ref(&self, handle: SourceHandle) -> Result<u32> {
        let mut slots = self.slots();
        let slot = slots
            .get_mut(handle.index)
            .filter(|slot| slot.generation == handle.generation)
            .ok_or(FactoryError::InvalidHandle { handle })?;
        slot.refcount += 1;
        Ok(slot.refcount)
    }

    /// Returns the new reference count. At zero the source is shut down and
    /// the handle becomes stale.
    pub fn remove_ref(&self, handle: SourceHandle) -> Result<u32> {
        let released = {
            let mut slots = self.slots();
            let slot = slots
                .get_mut(handle.index)
                .filter(|slot| slot.generation == handle.generation)
                .ok_or(FactoryError::InvalidHandle { handle })?;
            slot.refcount -= 1;
            if slot.refcount > 0 {
                return Ok(slot.refcount);
            }
            slots.remove(handle.index)
        };

        // Outside the table lock: stopping waits for an in-flight tick
        released.source.shutdown();
        debug!(%handle, "Source released");
        Ok(0)
    }

    /// Create a local track fed by the source at `handle`.
    ///
    /// An empty name falls back to `"external_track"`.
    #[instrument(name = "factory_create_track", skip(self))]
    pub fn create_audio_track(
        self: &Arc<Self>,
        handle: SourceHandle,
        name: &str,
    ) -> Result<Arc<LocalAudioTrack>> {
        let source = self.source(handle)?;
        let track_name = if name.trim().is_empty() {
            LocalAudioTrack::DEFAULT_NAME
        } else {
            name
        };

        if source.state().is_terminal() {
            warn!(source = %source.name(), track = track_name, "Source already ended");
            return Err(FactoryError::track_creation(track_name, "source has ended"));
        }

        let track = Arc::new(LocalAudioTrack::new(track_name, source.clone(), self.clone()));
        let sink: Arc<dyn AudioSink> = track.clone();
        source.add_sink(&sink);

        info!(source = %source.name(), track = track_name, "Local audio track created");
        Ok(track)
    }

    /// Number of sources currently held
    pub fn source_count(&self) -> usize {
        self.slots().len()
    }
}

impl Drop for GlobalFactory {
    fn drop(&mut self) {
        let slots = std::mem::take(&mut *self.slots());
        if !slots.is_empty() {
            debug!(count = slots.len(), "Factory dropped with live sources");
        }
        for (_, slot) in slots {
            slot.source.shutdown();
        }
    }
}
