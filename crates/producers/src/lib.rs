//! # Producers
//!
//! Built-in frame producers for the external audio source.
//!
//! - [`SineProducer`]: synthetic sine frames, answered synchronously
//! - [`CallbackProducer`]: wraps a closure
//! - [`DeferredProducer`]: queues requests for asynchronous completion
//! - [`ReplayProducer`]: replays a framed capture written by `FileSink`
//!
//! ## Usage Example
//!
//! ```ignore
//! use producers::deferred;
//!
//! let (producer, queue) = deferred(16);
//! let source = ExternalAudioSource::new(Arc::new(producer), "deferred")?;
//! source.start_capture()?;
//!
//! tokio::spawn(async move {
//!     while let Some(request) = queue.recv().await {
//!         let _ = request.complete(&render_frame());
//!     }
//! });
//! ```

mod callback;
mod deferred;
mod error;
mod metrics;
mod replay;
mod sine;

use std::sync::Arc;

use contracts::{FrameProducer, ProducerConfig};

// Re-exports
pub use callback::CallbackProducer;
pub use deferred::{deferred, DeferredProducer, RequestQueue};
pub use error::{ProducerError, Result};
pub use metrics::{MetricsSnapshot, ProducerMetrics};
pub use replay::ReplayProducer;
pub use sine::SineProducer;

/// Build the producer described by a config section.
pub fn build_producer(config: &ProducerConfig) -> Result<Arc<dyn FrameProducer>> {
    Ok(match config {
        ProducerConfig::Sine(sine) => Arc::new(SineProducer::new(sine.clone())?),
        ProducerConfig::Replay(replay) => Arc::new(ReplayProducer::from_config(replay)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{ReplayConfig, SineConfig};

    #[test]
    fn test_build_sine() {
        assert!(build_producer(&ProducerConfig::Sine(SineConfig::default())).is_ok());
    }

    #[test]
    fn test_build_replay_missing_file() {
        let config = ProducerConfig::Replay(ReplayConfig {
            path: "/nonexistent/capture.bin".into(),
            loop_playback: true,
        });
        assert!(matches!(
            build_producer(&config),
            Err(ProducerError::Replay { .. })
        ));
    }
}
