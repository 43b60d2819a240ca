//! Consumer traits - Dispatcher output interface
//!
//! Sinks receive every completed frame; observers receive lifecycle and
//! volume notifications. All callbacks run synchronously on the thread that
//! completed the request, so they must not block for long.

use serde::{Deserialize, Serialize};

use crate::{AudioFrame, ContractError, SourceState};

/// Receiver of raw audio data
pub trait AudioSink: Send + Sync {
    /// Sink name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Consume one frame.
    ///
    /// `timestamp_ms` is the issue time of the request the frame completed.
    ///
    /// # Errors
    /// A failed delivery is logged and counted by the dispatcher; it does not
    /// affect delivery to other sinks.
    fn on_data(&self, frame: &AudioFrame, timestamp_ms: i64) -> Result<(), ContractError>;

    /// Flush buffered output (if any)
    fn flush(&self) -> Result<(), ContractError> {
        Ok(())
    }
}

/// Generic state-change observer
pub trait StateObserver: Send + Sync {
    fn on_changed(&self, state: SourceState);
}

/// Volume-change observer
pub trait VolumeObserver: Send + Sync {
    fn on_set_volume(&self, volume: f64);
}

/// Outcome of one dispatch pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchReport {
    /// Effective frame timestamp (request issue time)
    pub timestamp_ms: i64,
    /// Sinks that accepted the frame
    pub delivered: usize,
    /// Sinks that returned an error or panicked
    pub failed: usize,
}

impl DispatchReport {
    pub fn all_delivered(&self) -> bool {
        self.failed == 0
    }
}
