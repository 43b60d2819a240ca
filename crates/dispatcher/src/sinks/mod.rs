//! Sink implementations
//!
//! Contains LogSink and FileSink, plus construction from `SinkConfig`.

mod file;
mod log;

use std::sync::Arc;

use contracts::{AudioSink, SinkConfig, SinkType};
use tracing::instrument;

use crate::error::DispatcherError;

pub use self::file::{FileFormat, FileSink, FileSinkConfig};
pub use self::log::LogSink;

/// Create a sink from configuration
#[instrument(
    name = "dispatcher_build_sink",
    skip(config),
    fields(sink = %config.name, sink_type = ?config.sink_type)
)]
pub fn build_sink(config: &SinkConfig) -> Result<Arc<dyn AudioSink>, DispatcherError> {
    match config.sink_type {
        SinkType::Log => Ok(Arc::new(LogSink::new(&config.name))),
        SinkType::File => {
            let sink = FileSink::from_params(&config.name, &config.params)
                .map_err(|e| DispatcherError::sink_creation(&config.name, e.to_string()))?;
            Ok(Arc::new(sink))
        }
    }
}

/// Create every configured sink, failing on the first error
pub fn build_sinks(configs: &[SinkConfig]) -> Result<Vec<Arc<dyn AudioSink>>, DispatcherError> {
    configs.iter().map(build_sink).collect()
}
