//! FrameProducer trait - pull-model frame source
//!
//! The engine calls [`FrameProducer::frame_requested`] once per tick with a
//! [`FrameRequest`]. The producer answers, right away or later and from any
//! thread, by completing the request with a frame.
//!
//! # Example
//!
//! ```ignore
//! struct Silence;
//!
//! impl FrameProducer for Silence {
//!     fn frame_requested(&self, request: &FrameRequest) -> Result<(), ContractError> {
//!         let frame = AudioFrame::new(vec![0u8; 960], 16, 48_000, 1, 480);
//!         request.complete(&frame).map(|_| ())
//!     }
//! }
//! ```

use std::fmt;
use std::sync::{Arc, Weak};

use crate::{AudioFrame, ContractError, DispatchReport, SourceName};

/// Request identifier (monotonic, wraps at `u32::MAX`)
pub type RequestId = u32;

/// Completion side of a source, as seen by a request
pub trait RequestCompleter: Send + Sync {
    /// Complete a pending request and dispatch `frame`.
    fn complete_request(
        &self,
        request_id: RequestId,
        timestamp_ms: i64,
        frame: &AudioFrame,
    ) -> Result<DispatchReport, ContractError>;
}

/// A single frame request issued by a source
///
/// Holds a weak back-reference to the issuing source: a request parked in a
/// queue never keeps a source alive.
#[derive(Clone)]
pub struct FrameRequest {
    source: Weak<dyn RequestCompleter>,
    source_name: SourceName,
    /// Issue time in milliseconds
    pub timestamp_ms: i64,
    /// Unique (within the pending ledger) request identifier
    pub request_id: RequestId,
}

impl FrameRequest {
    pub fn new(
        source: Weak<dyn RequestCompleter>,
        source_name: SourceName,
        timestamp_ms: i64,
        request_id: RequestId,
    ) -> Self {
        Self {
            source,
            source_name,
            timestamp_ms,
            request_id,
        }
    }

    /// Name of the source that issued this request
    pub fn source_name(&self) -> &SourceName {
        &self.source_name
    }

    /// Complete this request with `frame`.
    ///
    /// # Errors
    /// - `InvalidHandle` when the source no longer exists
    /// - whatever the source's completion path reports (stale id, bad frame)
    pub fn complete(&self, frame: &AudioFrame) -> Result<DispatchReport, ContractError> {
        let source = self.source.upgrade().ok_or_else(|| {
            ContractError::invalid_handle(format!("source '{}' was released", self.source_name))
        })?;
        source.complete_request(self.request_id, self.timestamp_ms, frame)
    }
}

impl fmt::Debug for FrameRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameRequest")
            .field("source", &self.source_name)
            .field("timestamp_ms", &self.timestamp_ms)
            .field("request_id", &self.request_id)
            .finish()
    }
}

/// External producer of audio frames
pub trait FrameProducer: Send + Sync {
    /// Called synchronously on the tick context for every new request.
    ///
    /// # Errors
    /// Errors are logged and counted by the scheduler; they are never retried.
    fn frame_requested(&self, request: &FrameRequest) -> Result<(), ContractError>;
}

impl<P: FrameProducer + ?Sized> FrameProducer for Arc<P> {
    fn frame_requested(&self, request: &FrameRequest) -> Result<(), ContractError> {
        (**self).frame_requested(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Recorder {
        seen: Mutex<Vec<(RequestId, i64)>>,
    }

    impl RequestCompleter for Recorder {
        fn complete_request(
            &self,
            request_id: RequestId,
            timestamp_ms: i64,
            _frame: &AudioFrame,
        ) -> Result<DispatchReport, ContractError> {
            self.seen.lock().unwrap().push((request_id, timestamp_ms));
            Ok(DispatchReport {
                timestamp_ms,
                delivered: 1,
                failed: 0,
            })
        }
    }

    fn frame() -> AudioFrame {
        AudioFrame::new(vec![0u8; 4], 16, 8_000, 1, 2)
    }

    #[test]
    fn test_complete_forwards_id_and_timestamp() {
        let recorder = Arc::new(Recorder {
            seen: Mutex::new(Vec::new()),
        });
        let completer: Arc<dyn RequestCompleter> = recorder.clone();
        let request = FrameRequest::new(Arc::downgrade(&completer), "src".into(), 1234, 7);

        let report = request.complete(&frame()).unwrap();
        assert_eq!(report.timestamp_ms, 1234);
        assert_eq!(*recorder.seen.lock().unwrap(), vec![(7, 1234)]);
    }

    #[test]
    fn test_complete_after_source_dropped() {
        let completer: Arc<dyn RequestCompleter> = Arc::new(Recorder {
            seen: Mutex::new(Vec::new()),
        });
        let request = FrameRequest::new(Arc::downgrade(&completer), "gone".into(), 0, 1);
        drop(completer);

        let err = request.complete(&frame()).unwrap_err();
        assert_eq!(err.code(), crate::ResultCode::InvalidNativeHandle);
    }
}
