//! Dispatcher error types

use thiserror::Error;

/// Dispatcher-specific errors
#[derive(Debug, Error)]
pub enum DispatcherError {
    /// Sink creation error
    #[error("failed to create sink '{name}': {message}")]
    SinkCreation { name: String, message: String },

    /// Capture stream is not in the framed format
    #[error("invalid capture: {message}")]
    InvalidCapture { message: String },

    /// Capture encoding/decoding failure
    #[error("capture codec error: {0}")]
    Codec(#[from] bincode::Error),

    /// Sink write error (from contract)
    #[error("sink error: {0}")]
    Contract(#[from] contracts::ContractError),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl DispatcherError {
    /// Create a sink creation error
    pub fn sink_creation(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkCreation {
            name: name.into(),
            message: message.into(),
        }
    }

    pub fn invalid_capture(message: impl Into<String>) -> Self {
        Self::InvalidCapture {
            message: message.into(),
        }
    }
}
