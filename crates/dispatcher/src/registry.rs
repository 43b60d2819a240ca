//! SinkRegistry - fan-out of completed frames to registered consumers
//!
//! The registry holds non-owning (`Weak`) references: registering a consumer
//! never extends its lifetime, and a consumer dropped by its owner simply
//! stops receiving data. Data sinks and observers live behind separate
//! locks; dispatch holds the sink lock for the whole pass, so a sink removed
//! by `remove_sink` is never called once that call has returned.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tracing::{debug, error, trace};

use contracts::{
    AudioFrame, AudioSink, DispatchReport, SourceState, StateObserver, VolumeObserver,
};

use crate::metrics::{MetricsSnapshot, RegistryMetrics};

struct SinkEntry {
    /// Cached so failures can be reported after the sink is gone
    name: String,
    sink: Weak<dyn AudioSink>,
}

#[derive(Default)]
struct ObserverLists {
    state: Vec<Weak<dyn StateObserver>>,
    volume: Vec<Weak<dyn VolumeObserver>>,
}

/// Thread-safe set of frame consumers
#[derive(Default)]
pub struct SinkRegistry {
    sinks: Mutex<Vec<SinkEntry>>,
    observers: Mutex<ObserverLists>,
    metrics: RegistryMetrics,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

impl SinkRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a data sink.
    ///
    /// Returns `false` if the sink was already registered.
    pub fn add_sink(&self, sink: &Arc<dyn AudioSink>) -> bool {
        let weak = Arc::downgrade(sink);
        let mut sinks = lock(&self.sinks);
        if sinks.iter().any(|e| Weak::ptr_eq(&e.sink, &weak)) {
            return false;
        }
        debug!(sink = %sink.name(), "Sink added");
        sinks.push(SinkEntry {
            name: sink.name().to_string(),
            sink: weak,
        });
        true
    }

    /// Unregister a data sink. Removing an absent sink is a no-op.
    pub fn remove_sink(&self, sink: &Arc<dyn AudioSink>) -> bool {
        let weak = Arc::downgrade(sink);
        let mut sinks = lock(&self.sinks);
        let before = sinks.len();
        sinks.retain(|e| !Weak::ptr_eq(&e.sink, &weak));
        let removed = sinks.len() != before;
        if removed {
            debug!(sink = %sink.name(), "Sink removed");
        }
        removed
    }

    pub fn register_observer(&self, observer: &Arc<dyn StateObserver>) {
        let weak = Arc::downgrade(observer);
        let mut observers = lock(&self.observers);
        if !observers.state.iter().any(|o| Weak::ptr_eq(o, &weak)) {
            observers.state.push(weak);
        }
    }

    pub fn unregister_observer(&self, observer: &Arc<dyn StateObserver>) {
        let weak = Arc::downgrade(observer);
        lock(&self.observers)
            .state
            .retain(|o| !Weak::ptr_eq(o, &weak));
    }

    pub fn register_audio_observer(&self, observer: &Arc<dyn VolumeObserver>) {
        let weak = Arc::downgrade(observer);
        let mut observers = lock(&self.observers);
        if !observers.volume.iter().any(|o| Weak::ptr_eq(o, &weak)) {
            observers.volume.push(weak);
        }
    }

    pub fn unregister_audio_observer(&self, observer: &Arc<dyn VolumeObserver>) {
        let weak = Arc::downgrade(observer);
        lock(&self.observers)
            .volume
            .retain(|o| !Weak::ptr_eq(o, &weak));
    }

    /// Number of live registered sinks
    pub fn sink_count(&self) -> usize {
        lock(&self.sinks)
            .iter()
            .filter(|e| e.sink.strong_count() > 0)
            .count()
    }

    /// Deliver `frame` to every live sink, in registration order.
    ///
    /// Each delivery is isolated: an error or a panic from one sink is logged
    /// and counted, and the pass continues with the next sink. Sinks must not
    /// call back into the registry from `on_data`.
    pub fn dispatch(&self, frame: &AudioFrame, timestamp_ms: i64) -> DispatchReport {
        let mut report = DispatchReport {
            timestamp_ms,
            ..Default::default()
        };

        let mut sinks = lock(&self.sinks);

        let before = sinks.len();
        sinks.retain(|e| e.sink.strong_count() > 0);
        let pruned = before - sinks.len();
        if pruned > 0 {
            self.metrics.add_pruned(pruned as u64);
            trace!(pruned, "Dropped sinks pruned");
        }

        for entry in sinks.iter() {
            let Some(sink) = entry.sink.upgrade() else {
                continue;
            };

            let outcome =
                panic::catch_unwind(AssertUnwindSafe(|| sink.on_data(frame, timestamp_ms)));

            match outcome {
                Ok(Ok(())) => {
                    report.delivered += 1;
                    observability::record_frame_dispatched(&entry.name, true);
                }
                Ok(Err(e)) => {
                    report.failed += 1;
                    observability::record_frame_dispatched(&entry.name, false);
                    error!(sink = %entry.name, timestamp_ms, error = %e, "Sink delivery failed");
                }
                Err(payload) => {
                    report.failed += 1;
                    observability::record_frame_dispatched(&entry.name, false);
                    error!(
                        sink = %entry.name,
                        timestamp_ms,
                        panic = %panic_message(payload.as_ref()),
                        "Sink panicked during delivery"
                    );
                }
            }
        }
        drop(sinks);

        self.metrics.record_pass(&report);
        report
    }

    /// Forward a volume change to every audio observer.
    pub fn set_volume(&self, volume: f64) {
        let observers: Vec<_> = lock(&self.observers)
            .volume
            .iter()
            .filter_map(Weak::upgrade)
            .collect();
        for observer in observers {
            observer.on_set_volume(volume);
        }
        debug!(volume, "Volume forwarded");
    }

    /// Forward a lifecycle transition to every state observer.
    ///
    /// Observers are called without the registry lock held and may
    /// register or unregister from inside the callback.
    pub fn notify_state_changed(&self, state: SourceState) {
        let observers: Vec<_> = lock(&self.observers)
            .state
            .iter()
            .filter_map(Weak::upgrade)
            .collect();
        for observer in observers {
            observer.on_changed(state);
        }
    }

    /// Counters accumulated over every dispatch pass
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}
