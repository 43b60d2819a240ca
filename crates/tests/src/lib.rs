//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 合约与状态码测试
//! - 请求账本 / 完成匹配 / 生命周期的跨 crate 行为
//! - 端到端测试（生产者 -> 外部音频源 -> sinks -> 捕获回放）

#[cfg(test)]
mod support {
    use std::sync::{Arc, Mutex};
    use std::time::{Duration, Instant};

    use contracts::{
        AudioFrame, AudioSink, ContractError, FrameRequest, SourceConfig, TimerKind,
    };
    use producers::CallbackProducer;

    pub fn frame(seed: u8) -> AudioFrame {
        AudioFrame::new(vec![seed; 160], 16, 8_000, 1, 80)
    }

    /// Source config whose schedule never fires during a test
    pub fn manual_config(name: &str) -> SourceConfig {
        SourceConfig {
            name: name.to_string(),
            first_request_delay_ms: 60_000,
            request_interval_ms: 60_000,
            timer: TimerKind::Thread,
            ..SourceConfig::default()
        }
    }

    /// Producer that parks requests for the test to complete
    pub fn parking_producer() -> (Arc<CallbackProducer>, Arc<Mutex<Vec<FrameRequest>>>) {
        let parked = Arc::new(Mutex::new(Vec::new()));
        let sink = parked.clone();
        let producer = CallbackProducer::new(move |request: &FrameRequest| {
            sink.lock().unwrap().push(request.clone());
            Ok(())
        });
        (Arc::new(producer), parked)
    }

    /// Sink that appends `(label, timestamp)` to a shared journal
    pub struct JournalSink {
        pub label: &'static str,
        pub journal: Arc<Mutex<Vec<(&'static str, i64)>>>,
    }

    impl AudioSink for JournalSink {
        fn name(&self) -> &str {
            self.label
        }

        fn on_data(&self, _frame: &AudioFrame, timestamp_ms: i64) -> Result<(), ContractError> {
            self.journal.lock().unwrap().push((self.label, timestamp_ms));
            Ok(())
        }
    }

    pub fn journal_sink(
        label: &'static str,
        journal: &Arc<Mutex<Vec<(&'static str, i64)>>>,
    ) -> Arc<dyn AudioSink> {
        Arc::new(JournalSink {
            label,
            journal: journal.clone(),
        })
    }

    /// Poll `condition` until it holds or `timeout` elapses.
    pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(2));
        }
        condition()
    }
}

#[cfg(test)]
mod contract_tests {
    use contracts::{AudioFrame, ContractError, ResultCode, MAX_PENDING_REQUEST_COUNT};

    #[test]
    fn test_contracts_compile() {
        let _ = contracts::ConfigVersion::V1;
        assert_eq!(MAX_PENDING_REQUEST_COUNT, 64);
    }

    #[test]
    fn test_error_taxonomy() {
        assert_eq!(
            ContractError::unknown_request("src", 3).code(),
            ResultCode::InvalidParameter
        );
        assert_eq!(
            ContractError::invalid_handle("gone").code(),
            ResultCode::InvalidNativeHandle
        );
        assert_eq!(
            ContractError::track_creation("t", "boom").code(),
            ResultCode::UnknownError
        );
    }

    #[test]
    fn test_truncated_frame_rejected() {
        let frame = AudioFrame::new(vec![0u8; 10], 16, 8_000, 2, 80);
        assert_eq!(frame.validate().unwrap_err().code(), ResultCode::InvalidParameter);
    }
}

/// Properties every source must hold, exercised through the public API
#[cfg(test)]
mod property_tests {
    use std::collections::HashSet;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use contracts::{AudioSink, ResultCode, SourceState, MAX_PENDING_REQUEST_COUNT};
    use request_engine::ExternalAudioSource;

    use crate::support::*;

    #[test]
    fn test_ledger_bound_and_unique_ids() {
        let (producer, parked) = parking_producer();
        let source =
            ExternalAudioSource::with_config(producer, &manual_config("bound")).unwrap();
        source.start_capture().unwrap();

        for _ in 0..(MAX_PENDING_REQUEST_COUNT * 3 + 7) {
            source.request_frame();
            let ids = source.pending_ids();
            assert!(ids.len() <= MAX_PENDING_REQUEST_COUNT);
            let unique: HashSet<_> = ids.iter().collect();
            assert_eq!(unique.len(), ids.len());
        }

        assert_eq!(source.pending_len(), MAX_PENDING_REQUEST_COUNT);
        assert_eq!(parked.lock().unwrap().len(), MAX_PENDING_REQUEST_COUNT * 3 + 7);
        assert_eq!(
            source.stats().evicted,
            (MAX_PENDING_REQUEST_COUNT * 2 + 7) as u64
        );
    }

    #[test]
    fn test_cumulative_completion() {
        let (producer, parked) = parking_producer();
        let source =
            ExternalAudioSource::with_config(producer, &manual_config("cumulative")).unwrap();
        source.start_capture().unwrap();

        for _ in 0..5 {
            source.request_frame();
        }
        let requests = parked.lock().unwrap().clone();
        let ids: Vec<_> = requests.iter().map(|r| r.request_id).collect();

        // Completing the third request drops the first two with it
        requests[2].complete(&frame(1)).unwrap();
        assert_eq!(source.pending_ids(), ids[3..].to_vec());

        // Older ids are gone for good
        for request in &requests[..3] {
            let err = request.complete(&frame(1)).unwrap_err();
            assert_eq!(err.code(), ResultCode::InvalidParameter);
        }
        assert_eq!(source.stats().superseded, 2);
    }

    #[test]
    fn test_stale_rejection_causes_no_dispatch() {
        let (producer, parked) = parking_producer();
        let source =
            ExternalAudioSource::with_config(producer, &manual_config("stale")).unwrap();
        let journal = Arc::new(Mutex::new(Vec::new()));
        let sink = journal_sink("only", &journal);
        source.add_sink(&sink);
        source.start_capture().unwrap();

        // Never issued
        let err = source.complete_request(4_000, 0, &frame(0)).unwrap_err();
        assert_eq!(err.code(), ResultCode::InvalidParameter);

        // Evicted
        for _ in 0..=MAX_PENDING_REQUEST_COUNT {
            source.request_frame();
        }
        let first = parked.lock().unwrap()[0].clone();
        assert_eq!(
            first.complete(&frame(0)).unwrap_err().code(),
            ResultCode::InvalidParameter
        );

        assert!(journal.lock().unwrap().is_empty());
        assert_eq!(source.stats().rejected, 2);
    }

    #[test]
    fn test_timestamp_authority() {
        let (producer, parked) = parking_producer();
        let source =
            ExternalAudioSource::with_config(producer, &manual_config("authority")).unwrap();
        let journal = Arc::new(Mutex::new(Vec::new()));
        let sink = journal_sink("clock", &journal);
        source.add_sink(&sink);
        source.start_capture().unwrap();

        source.request_frame();
        let request = parked.lock().unwrap()[0].clone();

        let forged = request.timestamp_ms + 12_345;
        let report = source
            .complete_request(request.request_id, forged, &frame(3))
            .unwrap();

        assert_eq!(report.timestamp_ms, request.timestamp_ms);
        assert_eq!(
            journal.lock().unwrap().as_slice(),
            &[("clock", request.timestamp_ms)]
        );
        assert_eq!(source.stats().timestamp_overrides, 1);
    }

    #[test]
    fn test_terminal_state() {
        let (producer, parked) = parking_producer();
        let config = contracts::SourceConfig {
            first_request_delay_ms: 0,
            request_interval_ms: 2,
            ..manual_config("terminal")
        };
        let source = ExternalAudioSource::with_config(producer, &config).unwrap();
        source.start_capture().unwrap();

        assert!(wait_until(Duration::from_secs(2), || parked.lock().unwrap().len() >= 3));
        source.shutdown();
        assert_eq!(source.state(), SourceState::Ended);
        assert_eq!(source.pending_len(), 0);

        // Stop is synchronous: nothing fires afterwards
        let seen = parked.lock().unwrap().len();
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(parked.lock().unwrap().len(), seen);

        let last = parked.lock().unwrap().last().cloned().unwrap();
        assert!(last.complete(&frame(0)).is_err());
        assert!(source.start_capture().is_err());
        assert!(!source.stop_capture());
    }

    #[test]
    fn test_fan_out_order() {
        let (producer, parked) = parking_producer();
        let source =
            ExternalAudioSource::with_config(producer, &manual_config("fan_out")).unwrap();
        let journal = Arc::new(Mutex::new(Vec::new()));
        let sinks: Vec<Arc<dyn AudioSink>> = ["s1", "s2", "s3"]
            .into_iter()
            .map(|label| journal_sink(label, &journal))
            .collect();
        for sink in &sinks {
            source.add_sink(sink);
        }
        source.start_capture().unwrap();

        source.request_frame();
        let request = parked.lock().unwrap()[0].clone();
        let report = request.complete(&frame(9)).unwrap();

        assert_eq!(report.delivered, 3);
        let labels: Vec<_> = journal.lock().unwrap().iter().map(|(l, _)| *l).collect();
        assert_eq!(labels, vec!["s1", "s2", "s3"]);
    }
}

/// Walkthroughs through the handle-based factory API
#[cfg(test)]
mod scenario_tests {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use contracts::{ResultCode, SourceConfig, SourceState, TimerKind, MAX_PENDING_REQUEST_COUNT};
    use source_factory::{FactoryCell, GlobalFactory};

    use crate::support::*;

    #[test]
    fn test_single_tick_completion() {
        let factory = Arc::new(GlobalFactory::new());
        let (producer, parked) = parking_producer();
        let config = SourceConfig {
            name: "single_tick".to_string(),
            first_request_delay_ms: 0,
            request_interval_ms: 60_000,
            timer: TimerKind::Thread,
            ..SourceConfig::default()
        };
        let handle = factory.create_source_with_config(producer, &config).unwrap();
        let source = factory.source(handle).unwrap();

        let journal = Arc::new(Mutex::new(Vec::new()));
        let a = journal_sink("a", &journal);
        let b = journal_sink("b", &journal);
        source.add_sink(&a);
        source.add_sink(&b);

        factory.finish_creation(handle).unwrap();
        assert!(wait_until(Duration::from_secs(2), || !parked.lock().unwrap().is_empty()));

        let request = parked.lock().unwrap()[0].clone();
        let report = factory
            .complete_request(handle, request.request_id, request.timestamp_ms, &frame(1))
            .unwrap();

        assert!(report.all_delivered());
        assert_eq!(source.pending_len(), 0);
        assert_eq!(
            journal.lock().unwrap().as_slice(),
            &[("a", request.timestamp_ms), ("b", request.timestamp_ms)]
        );
        factory.remove_ref(handle).unwrap();
    }

    #[test]
    fn test_full_ledger_evicts_oldest() {
        let factory = Arc::new(GlobalFactory::new());
        let (producer, parked) = parking_producer();
        let handle = factory
            .create_source_with_config(producer, &manual_config("full"))
            .unwrap();
        factory.finish_creation(handle).unwrap();
        let source = factory.source(handle).unwrap();

        for _ in 0..MAX_PENDING_REQUEST_COUNT {
            source.request_frame();
        }
        let oldest = source.pending_ids()[0];
        assert_eq!(source.pending_len(), MAX_PENDING_REQUEST_COUNT);

        source.request_frame();
        let newest = parked.lock().unwrap().last().unwrap().request_id;
        let ids = source.pending_ids();
        assert_eq!(ids.len(), MAX_PENDING_REQUEST_COUNT);
        assert!(!ids.contains(&oldest));
        assert!(ids.contains(&newest));
    }

    #[test]
    fn test_double_completion() {
        let factory = Arc::new(GlobalFactory::new());
        let (producer, parked) = parking_producer();
        let handle = factory
            .create_source_with_config(producer, &manual_config("double"))
            .unwrap();
        factory.finish_creation(handle).unwrap();
        factory.source(handle).unwrap().request_frame();

        let request = parked.lock().unwrap()[0].clone();
        assert!(factory
            .complete_request(handle, request.request_id, 0, &frame(2))
            .is_ok());
        let err = factory
            .complete_request(handle, request.request_id, 0, &frame(2))
            .unwrap_err();
        assert_eq!(err.code(), ResultCode::InvalidParameter);
    }

    #[test]
    fn test_release_shuts_down_and_invalidates_handle() {
        let cell = FactoryCell::new();
        let factory = cell.acquire();
        let (producer, _parked) = parking_producer();
        let handle = factory
            .create_source_with_config(producer, &manual_config("refcount"))
            .unwrap();
        factory.finish_creation(handle).unwrap();
        let source = factory.source(handle).unwrap();

        assert_eq!(factory.add_ref(handle).unwrap(), 2);
        assert_eq!(factory.remove_ref(handle).unwrap(), 1);
        assert_eq!(source.state(), SourceState::Live);
        assert_eq!(factory.remove_ref(handle).unwrap(), 0);
        assert_eq!(source.state(), SourceState::Ended);

        let err = factory.finish_creation(handle).unwrap_err();
        assert_eq!(err.code(), ResultCode::InvalidNativeHandle);

        // Last release tears the shared factory down
        drop(factory);
        assert!(cell.get().is_none());
    }

    #[test]
    fn test_track_receives_dispatched_frames() {
        let factory = Arc::new(GlobalFactory::new());
        let (producer, parked) = parking_producer();
        let handle = factory
            .create_source_with_config(producer, &manual_config("track"))
            .unwrap();
        let track = factory.create_audio_track(handle, "").unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        track.register_frame_callback(Some(Arc::new(move |frame: &contracts::AudioFrame, ts: i64| {
            sink.lock().unwrap().push((frame.sample_count, ts));
        })));
        factory.finish_creation(handle).unwrap();

        let source = factory.source(handle).unwrap();
        source.request_frame();
        let request = parked.lock().unwrap()[0].clone();
        request.complete(&frame(4)).unwrap();

        assert_eq!(track.frame_count(), 1);
        assert_eq!(seen.lock().unwrap().as_slice(), &[(80, request.timestamp_ms)]);
    }
}

/// Full data flow with real producers and sinks
#[cfg(test)]
mod e2e_tests {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use contracts::{
        AudioFrame, AudioSink, ProducerConfig, ReplayConfig, SinkConfig, SinkType, SourceConfig,
        TimerKind,
    };
    use request_engine::ExternalAudioSource;

    use crate::support::*;

    /// Deferred producer answered from a tokio task -> file capture -> replay
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_deferred_capture_and_replay() {
        let dir = tempfile::tempdir().unwrap();
        let capture_path = dir.path().join("capture.bin");

        let mut params = HashMap::new();
        params.insert("path".to_string(), capture_path.display().to_string());
        params.insert("format".to_string(), "frames".to_string());
        let sinks = dispatcher::build_sinks(&[SinkConfig {
            name: "capture".to_string(),
            sink_type: SinkType::File,
            params,
        }])
        .unwrap();

        let (producer, queue) = producers::deferred(16);
        let config = SourceConfig {
            name: "deferred_e2e".to_string(),
            first_request_delay_ms: 0,
            request_interval_ms: 5,
            timer: TimerKind::Runtime,
            ..SourceConfig::default()
        };
        let source = ExternalAudioSource::with_config(Arc::new(producer), &config).unwrap();
        source.add_sink(&sinks[0]);
        source.start_capture().unwrap();

        let target = 6u8;
        let worker = tokio::spawn(async move {
            let mut answered = 0u8;
            while let Some(request) = queue.recv().await {
                if request.complete(&frame(answered)).is_ok() {
                    queue.mark_produced();
                    answered += 1;
                    if answered == target {
                        break;
                    }
                }
            }
            answered
        });

        let answered = tokio::time::timeout(Duration::from_secs(5), worker)
            .await
            .expect("worker timed out")
            .unwrap();
        source.shutdown();
        sinks[0].flush().unwrap();
        drop(sinks);

        assert_eq!(answered, target);
        let stats = source.stats();
        assert_eq!(stats.completed, target as u64);

        let captured = dispatcher::read_capture(&capture_path).unwrap();
        assert_eq!(captured.len(), target as usize);
        assert!(captured
            .windows(2)
            .all(|pair| pair[0].timestamp_ms <= pair[1].timestamp_ms));

        // Replay the capture into a fresh source
        let replay = producers::build_producer(&ProducerConfig::Replay(ReplayConfig {
            path: capture_path.clone(),
            loop_playback: false,
        }))
        .unwrap();
        let replayed = ExternalAudioSource::with_config(replay, &manual_config("replay")).unwrap();
        let collected: Arc<Mutex<Vec<AudioFrame>>> = Arc::new(Mutex::new(Vec::new()));
        let collector: Arc<dyn AudioSink> = Arc::new(Collector(collected.clone()));
        replayed.add_sink(&collector);
        replayed.start_capture().unwrap();

        for _ in 0..target {
            replayed.request_frame();
        }
        // Capture exhausted: counted as a producer failure, schedule continues
        replayed.request_frame();

        let frames = collected.lock().unwrap().clone();
        let originals: Vec<_> = captured.into_iter().map(|c| c.frame).collect();
        assert_eq!(frames, originals);
        assert_eq!(replayed.stats().producer_failures, 1);
    }

    struct Collector(Arc<Mutex<Vec<AudioFrame>>>);

    impl AudioSink for Collector {
        fn name(&self) -> &str {
            "collector"
        }

        fn on_data(
            &self,
            frame: &AudioFrame,
            _timestamp_ms: i64,
        ) -> Result<(), contracts::ContractError> {
            self.0.lock().unwrap().push(frame.clone());
            Ok(())
        }
    }

    /// Config text -> loader -> producer + sinks -> running source
    #[test]
    fn test_config_driven_source() {
        let toml = r#"
[source]
name = "from_config"
first_request_delay_ms = 0
request_interval_ms = 3
timer = "thread"

[producer]
kind = "sine"
frequency_hz = 440.0
sample_rate_hz = 16000
samples_per_frame = 160

[[sinks]]
name = "log"
sink_type = "log"
"#;
        let adapter =
            config_loader::ConfigLoader::load_from_str(toml, config_loader::ConfigFormat::Toml)
                .unwrap();
        let producer = producers::build_producer(&adapter.producer).unwrap();
        let sinks = dispatcher::build_sinks(&adapter.sinks).unwrap();

        let source = ExternalAudioSource::with_config(producer, &adapter.source).unwrap();
        for sink in &sinks {
            source.add_sink(sink);
        }
        let journal = Arc::new(Mutex::new(Vec::new()));
        let probe = journal_sink("probe", &journal);
        source.add_sink(&probe);
        source.start_capture().unwrap();

        assert!(wait_until(Duration::from_secs(2), || journal.lock().unwrap().len() >= 3));
        source.shutdown();

        let stats = source.stats();
        assert!(stats.completed >= 3);
        assert_eq!(stats.rejected, 0);
        // Sine producer answers synchronously
        assert_eq!(source.pending_len(), 0);
        assert_eq!(source.registry().metrics().failures, 0);
    }
}
