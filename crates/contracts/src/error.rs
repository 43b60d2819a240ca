//! Layered error definitions
//!
//! Categorized by source: config / request / handle / producer / sink / timer.
//! Every error maps onto a [`ResultCode`], the status surface seen by callers
//! of the lifecycle API.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Status code returned across the lifecycle API boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultCode {
    Success,
    /// Missing/invalid argument, invalid frame, unknown or stale request id.
    InvalidParameter,
    /// Handle does not refer to a live source.
    InvalidNativeHandle,
    /// Failure inside a collaborator (track creation, timer, producer, sink).
    UnknownError,
}

impl ResultCode {
    pub fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }
}

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Request Errors =====
    /// Generic invalid argument
    #[error("invalid parameter: {message}")]
    InvalidParameter { message: String },

    /// Completion for a request id that is not pending
    #[error("request {request_id} is not pending on source '{source_name}'")]
    UnknownRequest { source_name: String, request_id: u32 },

    /// Frame failed format validation
    #[error("invalid audio frame: {message}")]
    InvalidFrame { message: String },

    // ===== Handle Errors =====
    /// Handle does not refer to a live object
    #[error("invalid native handle: {message}")]
    InvalidHandle { message: String },

    /// Source reached the terminal state
    #[error("source '{source_name}' has ended")]
    SourceEnded { source_name: String },

    // ===== Collaborator Errors =====
    /// Producer failed to service a frame request
    #[error("producer for '{source_name}' failed request {request_id}: {message}")]
    Producer {
        source_name: String,
        request_id: u32,
        message: String,
    },

    /// Sink write error
    #[error("sink '{sink_name}' write error: {message}")]
    SinkWrite { sink_name: String, message: String },

    /// Tick source failure
    #[error("timer error: {message}")]
    Timer { message: String },

    /// Local track could not be created
    #[error("track creation failed for '{track_name}': {message}")]
    TrackCreation { track_name: String, message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Status code surfaced to lifecycle API callers
    pub fn code(&self) -> ResultCode {
        match self {
            Self::ConfigParse { .. }
            | Self::ConfigValidation { .. }
            | Self::InvalidParameter { .. }
            | Self::UnknownRequest { .. }
            | Self::InvalidFrame { .. } => ResultCode::InvalidParameter,
            Self::InvalidHandle { .. } | Self::SourceEnded { .. } => {
                ResultCode::InvalidNativeHandle
            }
            Self::Producer { .. }
            | Self::SinkWrite { .. }
            | Self::Timer { .. }
            | Self::TrackCreation { .. }
            | Self::Io(_)
            | Self::Other(_) => ResultCode::UnknownError,
        }
    }

    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn invalid_parameter(message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            message: message.into(),
        }
    }

    pub fn unknown_request(source_name: impl Into<String>, request_id: u32) -> Self {
        Self::UnknownRequest {
            source_name: source_name.into(),
            request_id,
        }
    }

    pub fn invalid_frame(message: impl Into<String>) -> Self {
        Self::InvalidFrame {
            message: message.into(),
        }
    }

    pub fn invalid_handle(message: impl Into<String>) -> Self {
        Self::InvalidHandle {
            message: message.into(),
        }
    }

    pub fn source_ended(source_name: impl Into<String>) -> Self {
        Self::SourceEnded {
            source_name: source_name.into(),
        }
    }

    pub fn producer(
        source_name: impl Into<String>,
        request_id: u32,
        message: impl Into<String>,
    ) -> Self {
        Self::Producer {
            source_name: source_name.into(),
            request_id,
            message: message.into(),
        }
    }

    /// Create sink write error
    pub fn sink_write(sink_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkWrite {
            sink_name: sink_name.into(),
            message: message.into(),
        }
    }

    pub fn timer(message: impl Into<String>) -> Self {
        Self::Timer {
            message: message.into(),
        }
    }

    pub fn track_creation(track_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::TrackCreation {
            track_name: track_name.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ContractError::unknown_request("src", 3).code(),
            ResultCode::InvalidParameter
        );
        assert_eq!(
            ContractError::invalid_frame("empty").code(),
            ResultCode::InvalidParameter
        );
        assert_eq!(
            ContractError::invalid_handle("stale").code(),
            ResultCode::InvalidNativeHandle
        );
        assert_eq!(
            ContractError::source_ended("src").code(),
            ResultCode::InvalidNativeHandle
        );
        assert_eq!(
            ContractError::track_creation("t", "no engine").code(),
            ResultCode::UnknownError
        );
    }

    #[test]
    fn test_display_carries_context() {
        let err = ContractError::unknown_request("synthetic", 42);
        assert_eq!(
            err.to_string(),
            "request 42 is not pending on source 'synthetic'"
        );
    }
}
