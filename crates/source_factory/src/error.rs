//! Source Factory error types

use contracts::{ContractError, ResultCode};
use thiserror::Error;

use crate::SourceHandle;

/// Source Factory specific error
#[derive(Debug, Error)]
pub enum FactoryError {
    /// Handle does not refer to a live source
    #[error("invalid source handle {handle}")]
    InvalidHandle { handle: SourceHandle },

    /// Track could not be created
    #[error("failed to create track '{track_name}': {message}")]
    TrackCreation { track_name: String, message: String },

    /// Wrapped ContractError
    #[error(transparent)]
    Contract(#[from] ContractError),
}

impl FactoryError {
    pub fn track_creation(track_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::TrackCreation {
            track_name: track_name.into(),
            message: message.into(),
        }
    }

    /// Status reported to callers of the lifecycle API
    pub fn code(&self) -> ResultCode {
        match self {
            Self::InvalidHandle { .. } => ResultCode::InvalidNativeHandle,
            Self::TrackCreation { .. } => ResultCode::UnknownError,
            Self::Contract(e) => e.code(),
        }
    }
}

/// Result alias
pub type Result<T> = std::result::Result<T, FactoryError>;
