//! Replay producer
//!
//! Answers requests with frames previously captured by a `FileSink` in
//! `frames` mode. Captured timestamps are ignored; the source stamps every
//! replayed frame with its own request time.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use contracts::{AudioFrame, ContractError, FrameProducer, FrameRequest, ReplayConfig};
use dispatcher::read_capture;
use tracing::{debug, info};

use crate::error::{ProducerError, Result};
use crate::metrics::ProducerMetrics;

pub struct ReplayProducer {
    frames: Vec<AudioFrame>,
    cursor: AtomicUsize,
    loop_playback: bool,
    metrics: Arc<ProducerMetrics>,
}

impl ReplayProducer {
    /// Load every frame of the capture at `path`.
    pub fn open(path: &Path, loop_playback: bool) -> Result<Self> {
        let frames: Vec<AudioFrame> = read_capture(path)
            .map_err(|source| ProducerError::Replay {
                path: path.to_path_buf(),
                source,
            })?
            .into_iter()
            .map(|record| record.frame)
            .collect();

        if frames.is_empty() {
            return Err(ProducerError::EmptyCapture {
                path: path.to_path_buf(),
            });
        }

        info!(path = %path.display(), frames = frames.len(), loop_playback, "Capture loaded");
        Ok(Self::from_frames(frames, loop_playback))
    }

    pub fn from_config(config: &ReplayConfig) -> Result<Self> {
        Self::open(&config.path, config.loop_playback)
    }

    pub fn from_frames(frames: Vec<AudioFrame>, loop_playback: bool) -> Self {
        Self {
            frames,
            cursor: AtomicUsize::new(0),
            loop_playback,
            metrics: Arc::new(ProducerMetrics::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn metrics(&self) -> &Arc<ProducerMetrics> {
        &self.metrics
    }

    fn next_frame(&self) -> Option<&AudioFrame> {
        if self.frames.is_empty() {
            return None;
        }
        let index = self.cursor.fetch_add(1, Ordering::Relaxed);
        if self.loop_playback {
            self.frames.get(index % self.frames.len())
        } else {
            self.frames.get(index)
        }
    }
}

impl FrameProducer for ReplayProducer {
    fn frame_requested(&self, request: &FrameRequest) -> std::result::Result<(), ContractError> {
        self.metrics.record_received();
        let Some(frame) = self.next_frame() else {
            self.metrics.record_dropped();
            debug!(request_id = request.request_id, "Capture exhausted");
            return Err(ContractError::producer(
                request.source_name().as_str(),
                request.request_id,
                "capture exhausted",
            ));
        };

        request.complete(frame).inspect_err(|_| {
            self.metrics.record_dropped();
        })?;
        self.metrics.record_produced();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{DispatchReport, RequestCompleter, RequestId};
    use dispatcher::CaptureWriter;
    use std::fs::File;
    use std::io::BufWriter;
    use std::sync::Mutex;
    use tempfile::tempdir;

    #[derive(Default)]
    struct Recorder {
        frames: Mutex<Vec<AudioFrame>>,
    }

    impl RequestCompleter for Recorder {
        fn complete_request(
            &self,
            _request_id: RequestId,
            timestamp_ms: i64,
            frame: &AudioFrame,
        ) -> std::result::Result<DispatchReport, ContractError> {
            self.frames.lock().unwrap().push(frame.clone());
            Ok(DispatchReport {
                timestamp_ms,
                delivered: 1,
                failed: 0,
            })
        }
    }

    fn frame(seed: u8) -> AudioFrame {
        AudioFrame::new(vec![seed; 4], 16, 8_000, 1, 2)
    }

    fn drive(producer: &ReplayProducer, recorder: &Arc<Recorder>, count: u32) -> usize {
        let completer: Arc<dyn RequestCompleter> = recorder.clone();
        (0..count)
            .filter(|id| {
                let request = FrameRequest::new(Arc::downgrade(&completer), "replay".into(), 0, *id);
                producer.frame_requested(&request).is_ok()
            })
            .count()
    }

    #[test]
    fn test_replays_capture_in_order() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("capture.bin");
        {
            let mut writer = CaptureWriter::new(BufWriter::new(File::create(&path).unwrap())).unwrap();
            writer.write_frame(0, &frame(1)).unwrap();
            writer.write_frame(30, &frame(2)).unwrap();
            writer.flush().unwrap();
        }

        let producer = ReplayProducer::open(&path, false).unwrap();
        assert_eq!(producer.len(), 2);

        let recorder = Arc::new(Recorder::default());
        assert_eq!(drive(&producer, &recorder, 3), 2);
        assert_eq!(*recorder.frames.lock().unwrap(), vec![frame(1), frame(2)]);
        assert_eq!(producer.metrics().snapshot().requests_dropped, 1);
    }

    #[test]
    fn test_loop_playback_wraps() {
        let producer = ReplayProducer::from_frames(vec![frame(1), frame(2)], true);
        let recorder = Arc::new(Recorder::default());

        assert_eq!(drive(&producer, &recorder, 5), 5);
        let seeds: Vec<u8> = recorder
            .frames
            .lock()
            .unwrap()
            .iter()
            .map(|f| f.data[0])
            .collect();
        assert_eq!(seeds, vec![1, 2, 1, 2, 1]);
    }

    #[test]
    fn test_empty_capture_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.bin");
        {
            let mut writer = CaptureWriter::new(File::create(&path).unwrap()).unwrap();
            writer.flush().unwrap();
        }

        let err = ReplayProducer::open(&path, true).err().unwrap();
        assert!(matches!(err, ProducerError::EmptyCapture { .. }));
    }

    #[test]
    fn test_missing_file() {
        let err = ReplayProducer::open(Path::new("/nonexistent/capture.bin"), true)
            .err()
            .unwrap();
        assert!(matches!(err, ProducerError::Replay { .. }));
    }

    #[test]
    fn test_foreign_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        std::fs::write(&path, b"RIFF\x24\x00\x00\x00WAVEfmt \x10\x00\x00\x00").unwrap();

        let err = ReplayProducer::open(&path, false).err().unwrap();
        assert!(matches!(err, ProducerError::Replay { .. }));
    }
}
