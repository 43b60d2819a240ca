//! AudioFrame - the unit handed from producers to sinks
//!
//! Raw interleaved PCM plus the format metadata sinks need to interpret it.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::ContractError;

/// Raw audio frame
///
/// `data` holds `sample_count` samples per channel, interleaved across
/// `channel_count` channels, each `bits_per_sample` wide.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioFrame {
    /// Sample buffer (cheap to clone)
    pub data: Bytes,

    /// Bits per sample (8, 16, 24 or 32)
    pub bits_per_sample: u32,

    /// Sampling rate in Hz
    pub sample_rate_hz: u32,

    /// Number of interleaved channels
    pub channel_count: u32,

    /// Samples per channel
    pub sample_count: u32,
}

impl AudioFrame {
    pub fn new(
        data: impl Into<Bytes>,
        bits_per_sample: u32,
        sample_rate_hz: u32,
        channel_count: u32,
        sample_count: u32,
    ) -> Self {
        Self {
            data: data.into(),
            bits_per_sample,
            sample_rate_hz,
            channel_count,
            sample_count,
        }
    }

    /// Byte length implied by the format fields
    pub fn expected_len(&self) -> usize {
        let bytes_per_sample = (self.bits_per_sample as usize).div_ceil(8);
        self.sample_count as usize * self.channel_count as usize * bytes_per_sample
    }

    /// Playback duration of the frame in milliseconds
    pub fn duration_ms(&self) -> f64 {
        if self.sample_rate_hz == 0 {
            return 0.0;
        }
        self.sample_count as f64 * 1000.0 / self.sample_rate_hz as f64
    }

    /// Check that the format is usable and the buffer covers it.
    ///
    /// # Errors
    /// `ContractError::InvalidFrame` naming the first offending field.
    pub fn validate(&self) -> Result<(), ContractError> {
        if !matches!(self.bits_per_sample, 8 | 16 | 24 | 32) {
            return Err(ContractError::invalid_frame(format!(
                "unsupported bits_per_sample {}",
                self.bits_per_sample
            )));
        }
        if self.sample_rate_hz == 0 {
            return Err(ContractError::invalid_frame("sample_rate_hz must be > 0"));
        }
        if self.channel_count == 0 {
            return Err(ContractError::invalid_frame("channel_count must be > 0"));
        }
        if self.sample_count == 0 {
            return Err(ContractError::invalid_frame("sample_count must be > 0"));
        }
        let expected = self.expected_len();
        if self.data.len() < expected {
            return Err(ContractError::invalid_frame(format!(
                "buffer holds {} bytes, format needs {}",
                self.data.len(),
                expected
            )));
        }
        Ok(())
    }
}
