//! Error types for CLI operations.

use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Configuration rejected after a CLI override
    #[error("Configuration validation failed: {message}")]
    ConfigValidation { message: String },

    /// Source, producer or sink setup failed
    #[error("Pipeline setup failed: {message}")]
    PipelineSetup { message: String },
}

impl CliError {
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    pub fn config_validation(message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            message: message.into(),
        }
    }

    pub fn pipeline_setup(message: impl Into<String>) -> Self {
        Self::PipelineSetup {
            message: message.into(),
        }
    }
}
