//! External audio source: scheduler, completion matcher and lifecycle.
//!
//! ```text
//! tick ──▶ ledger.issue ──▶ producer.frame_requested(request)
//!                                   │ (now or later, any thread)
//!                                   ▼
//!          complete_request ──▶ ledger.complete ──▶ registry.dispatch
//! ```
//!
//! The ledger lock is never held while the producer or a sink runs, so a
//! producer may complete synchronously from inside `frame_requested`.

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, Weak};
use std::thread::{self, ThreadId};
use std::time::Duration;

use contracts::{
    AudioFrame, AudioSink, ContractError, DispatchReport, FrameProducer, FrameRequest,
    RequestCompleter, RequestId, SourceConfig, SourceName, SourceState, StateCell,
    StateObserver, VolumeObserver,
};
use dispatcher::SinkRegistry;
use tracing::{debug, error, info, instrument, trace, warn};

use crate::clock;
use crate::ledger::RequestLedger;
use crate::stats::{SourceStats, SourceStatsSnapshot};
use crate::timer::{build_tick_source, TickCallback, TickSource};

/// Orders state notifications across threads. Re-entrant for the thread
/// already notifying, so an observer may stop the source.
#[derive(Default)]
struct NotifyGate {
    owner: Mutex<Option<ThreadId>>,
    free: Condvar,
}

impl NotifyGate {
    fn enter(&self) -> NotifyGuard<'_> {
        let me = thread::current().id();
        let mut owner = self.owner.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            match *owner {
                None => {
                    *owner = Some(me);
                    return NotifyGuard { gate: Some(self) };
                }
                Some(id) if id == me => return NotifyGuard { gate: None },
                Some(_) => {
                    owner = self.free.wait(owner).unwrap_or_else(PoisonError::into_inner);
                }
            }
        }
    }
}

struct NotifyGuard<'a> {
    gate: Option<&'a NotifyGate>,
}

impl Drop for NotifyGuard<'_> {
    fn drop(&mut self) {
        if let Some(gate) = self.gate {
            *gate.owner.lock().unwrap_or_else(PoisonError::into_inner) = None;
            gate.free.notify_all();
        }
    }
}

struct SourceCore {
    name: SourceName,
    ledger: Mutex<RequestLedger>,
    state: StateCell,
    notify: NotifyGate,
    registry: Arc<SinkRegistry>,
    producer: Arc<dyn FrameProducer>,
    stats: SourceStats,
}

impl SourceCore {
    fn ledger(&self) -> MutexGuard<'_, RequestLedger> {
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn tick(&self, this: &Weak<SourceCore>) {
        let now = clock::now_ms();
        let (issued, depth) = {
            let mut ledger = self.ledger();
            if self.state.load() != SourceState::Live {
                return;
            }
            let issued = ledger.issue(now);
            (issued, ledger.len())
        };
        let request_id = issued.entry.request_id;

        self.stats.record_issued(issued.evicted.is_some());
        observability::record_request_issued(&self.name, depth);
        if let Some(evicted) = issued.evicted {
            debug!(
                source = %self.name,
                request_id = evicted.request_id,
                issued_at_ms = evicted.issued_at_ms,
                "Ledger full, evicted oldest request"
            );
            observability::record_request_evicted(&self.name);
        }
        trace!(source = %self.name, request_id, timestamp_ms = now, "Frame requested");

        let completer: Weak<dyn RequestCompleter> = this.clone();
        let request = FrameRequest::new(completer, self.name.clone(), now, request_id);

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            self.producer.frame_requested(&request)
        }));
        let failure = match outcome {
            Ok(Ok(())) => return,
            Ok(Err(e)) => e.to_string(),
            Err(payload) => panic_message(payload.as_ref()),
        };
        warn!(source = %self.name, request_id, error = %failure, "Producer failed frame request");
        self.stats.record_producer_failure();
        observability::record_producer_failure(&self.name);
    }

    fn reject(&self, reason: &'static str, error: ContractError) -> ContractError {
        debug!(source = %self.name, reason, error = %error, "Completion rejected");
        self.stats.record_rejected();
        observability::record_completion_rejected(&self.name, reason);
        error
    }

    fn transition(&self, state: SourceState) {
        info!(source = %self.name, %state, "Source state changed");
        observability::record_state_transition(&self.name, state);
        self.registry.notify_state_changed(state);
    }
}

impl RequestCompleter for SourceCore {
    fn complete_request(
        &self,
        request_id: RequestId,
        timestamp_ms: i64,
        frame: &AudioFrame,
    ) -> Result<DispatchReport, ContractError> {
        if let Err(e) = frame.validate() {
            return Err(self.reject("invalid_frame", e));
        }

        let completed = {
            let mut ledger = self.ledger();
            if self.state.load().is_terminal() {
                let message = format!("source '{}' has ended", self.name);
                return Err(self.reject("ended", ContractError::invalid_parameter(message)));
            }
            match ledger.complete(request_id) {
                Some(completed) => completed,
                None => {
                    let error = ContractError::unknown_request(self.name.as_str(), request_id);
                    return Err(self.reject("unknown_request", error));
                }
            }
        };

        let issued_at_ms = completed.entry.issued_at_ms;
        let overridden = timestamp_ms != issued_at_ms;
        if overridden {
            debug!(
                source = %self.name,
                request_id,
                caller_timestamp_ms = timestamp_ms,
                issued_at_ms,
                "Using issue timestamp for completed frame"
            );
        }
        if completed.superseded > 0 {
            trace!(
                source = %self.name,
                request_id,
                superseded = completed.superseded,
                "Older pending requests dropped"
            );
        }

        let latency_ms = (clock::now_ms() - issued_at_ms).max(0) as f64;
        self.stats
            .record_completed(completed.superseded, overridden, latency_ms);
        observability::record_request_completed(&self.name, latency_ms);

        Ok(self.registry.dispatch(frame, issued_at_ms))
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {s}")
    } else {
        "panicked".to_string()
    }
}

/// Pull-model audio source.
///
/// Starts in [`SourceState::Initializing`]. `start_capture` makes it live
/// and starts the request schedule; `stop_capture`/`shutdown` end it for
/// good. Dropping the source shuts it down.
pub struct ExternalAudioSource {
    core: Arc<SourceCore>,
    timer: Box<dyn TickSource>,
    first_delay: Duration,
    interval: Duration,
}

impl std::fmt::Debug for ExternalAudioSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExternalAudioSource")
            .field("name", &self.core.name)
            .field("state", &self.core.state.load())
            .field("interval", &self.interval)
            .finish()
    }
}

impl ExternalAudioSource {
    /// Create a source with default scheduling.
    pub fn new(producer: Arc<dyn FrameProducer>, name: &str) -> Result<Self, ContractError> {
        let config = SourceConfig {
            name: name.to_string(),
            ..SourceConfig::default()
        };
        Self::with_config(producer, &config)
    }

    /// Create a source from `config`. An empty name falls back to
    /// `"external_audio_source"`.
    ///
    /// # Errors
    /// `InvalidParameter` for a zero interval, `Timer` when the runtime
    /// timer is requested outside a tokio runtime.
    pub fn with_config(
        producer: Arc<dyn FrameProducer>,
        config: &SourceConfig,
    ) -> Result<Self, ContractError> {
        if config.request_interval_ms == 0 {
            return Err(ContractError::invalid_parameter(
                "request_interval_ms must be positive",
            ));
        }
        let name = SourceName::or_default_to(&config.name, SourceName::DEFAULT);
        let timer = build_tick_source(config.timer, &name)?;

        let core = Arc::new(SourceCore {
            name,
            ledger: Mutex::new(RequestLedger::new(config.max_pending_requests)),
            state: StateCell::new(SourceState::Initializing),
            notify: NotifyGate::default(),
            registry: Arc::new(SinkRegistry::new()),
            producer,
            stats: SourceStats::new(),
        });

        debug!(source = %core.name, timer = ?config.timer, "Source created");
        Ok(Self {
            core,
            timer,
            first_delay: config.first_request_delay(),
            interval: config.request_interval(),
        })
    }

    pub fn name(&self) -> &SourceName {
        &self.core.name
    }

    pub fn state(&self) -> SourceState {
        self.core.state.load()
    }

    /// Always local
    pub fn remote(&self) -> bool {
        false
    }

    /// Clear the ledger, go live and (re)start the request schedule.
    ///
    /// # Errors
    /// `SourceEnded` once the source was stopped, `Timer` when the tick
    /// source cannot start.
    #[instrument(name = "source_start", skip(self), fields(source = %self.core.name))]
    pub fn start_capture(&self) -> Result<(), ContractError> {
        {
            let mut ledger = self.core.ledger();
            if self.core.state.load().is_terminal() {
                return Err(ContractError::source_ended(self.core.name.as_str()));
            }
            ledger.clear();
            self.core.state.swap(SourceState::Live);
        }

        let weak = Arc::downgrade(&self.core);
        let callback: TickCallback = Arc::new(move || {
            if let Some(core) = weak.upgrade() {
                core.tick(&weak);
            }
        });
        if let Err(e) = self.timer.start(self.first_delay, self.interval, callback) {
            error!(error = %e, "Failed to start request timer");
            return Err(e);
        }

        // A stop landing after this check waits for the Live notification
        let notify = self.core.notify.enter();
        if self.core.state.load().is_terminal() {
            drop(notify);
            self.timer.stop();
            return Err(ContractError::source_ended(self.core.name.as_str()));
        }
        self.core.transition(SourceState::Live);
        Ok(())
    }

    /// Same as [`start_capture`](Self::start_capture); called once the
    /// owner finished wiring the source.
    pub fn finish_creation(&self) -> Result<(), ContractError> {
        self.start_capture()
    }

    /// Stop the schedule, drop pending requests and end the source.
    ///
    /// Returns `false` if it had already ended. Blocks until no tick is
    /// running, unless called from inside a tick.
    #[instrument(name = "source_stop", skip(self), fields(source = %self.core.name))]
    pub fn stop_capture(&self) -> bool {
        {
            let mut ledger = self.core.ledger();
            if self.core.state.load().is_terminal() {
                return false;
            }
            ledger.clear();
            self.core.state.swap(SourceState::Ended);
        }
        self.timer.stop();
        let _notify = self.core.notify.enter();
        self.core.transition(SourceState::Ended);
        true
    }

    /// Irreversible stop.
    pub fn shutdown(&self) {
        self.stop_capture();
    }

    /// Match a completion against the ledger and dispatch the frame.
    ///
    /// The issue timestamp of the request is authoritative; `timestamp_ms`
    /// is only compared against it.
    ///
    /// # Errors
    /// `InvalidParameter` class for an invalid frame, an id that is not
    /// pending, or an ended source.
    pub fn complete_request(
        &self,
        request_id: RequestId,
        timestamp_ms: i64,
        frame: &AudioFrame,
    ) -> Result<DispatchReport, ContractError> {
        self.core.complete_request(request_id, timestamp_ms, frame)
    }

    /// Issue one request right away, outside the schedule. No-op unless live.
    pub fn request_frame(&self) {
        self.core.tick(&Arc::downgrade(&self.core));
    }

    pub fn add_sink(&self, sink: &Arc<dyn AudioSink>) -> bool {
        self.core.registry.add_sink(sink)
    }

    pub fn remove_sink(&self, sink: &Arc<dyn AudioSink>) -> bool {
        self.core.registry.remove_sink(sink)
    }

    pub fn register_observer(&self, observer: &Arc<dyn StateObserver>) {
        self.core.registry.register_observer(observer);
    }

    pub fn unregister_observer(&self, observer: &Arc<dyn StateObserver>) {
        self.core.registry.unregister_observer(observer);
    }

    pub fn register_audio_observer(&self, observer: &Arc<dyn VolumeObserver>) {
        self.core.registry.register_audio_observer(observer);
    }

    pub fn unregister_audio_observer(&self, observer: &Arc<dyn VolumeObserver>) {
        self.core.registry.unregister_audio_observer(observer);
    }

    /// Forward a volume change to audio observers.
    pub fn set_volume(&self, volume: f64) {
        self.core.registry.set_volume(volume);
    }

    pub fn registry(&self) -> &Arc<SinkRegistry> {
        &self.core.registry
    }

    pub fn pending_len(&self) -> usize {
        self.core.ledger().len()
    }

    pub fn pending_ids(&self) -> Vec<RequestId> {
        self.core.ledger().pending_ids()
    }

    pub fn stats(&self) -> SourceStatsSnapshot {
        self.core.stats.snapshot()
    }
}

impl Drop for ExternalAudioSource {
    fn drop(&mut self) {
        self.shutdown();
    }
}
