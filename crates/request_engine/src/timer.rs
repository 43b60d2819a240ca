//! Tick sources driving the request scheduler.
//!
//! Two implementations of [`TickSource`]:
//! - [`ThreadTimer`]: a dedicated OS thread sleeping on a condvar
//! - [`RuntimeTimer`]: a task on a tokio runtime
//!
//! Both schedule with a fixed delay anchored at the start of the previous
//! tick and never run two ticks of the same timer at once. `stop` returns
//! only once no tick is executing and none will fire, except when called
//! from inside a tick, where it marks the timer stopped and returns.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};

use contracts::{ContractError, TimerKind};
use tokio::runtime::Handle;
use tracing::{debug, warn};

/// Work executed on every tick
pub type TickCallback = Arc<dyn Fn() + Send + Sync>;

pub trait TickSource: Send + Sync {
    /// Start ticking. A running schedule is stopped first.
    fn start(
        &self,
        first_delay: Duration,
        interval: Duration,
        callback: TickCallback,
    ) -> Result<(), ContractError>;

    /// Stop ticking and wait for an in-flight tick to finish.
    fn stop(&self);

    fn is_running(&self) -> bool;
}

/// Build the tick source selected by `kind`.
///
/// `Auto` picks the runtime timer when the calling thread is inside a tokio
/// runtime, the thread timer otherwise.
pub fn build_tick_source(
    kind: TimerKind,
    name: &str,
) -> Result<Box<dyn TickSource>, ContractError> {
    match kind {
        TimerKind::Thread => Ok(Box::new(ThreadTimer::new(name))),
        TimerKind::Runtime => {
            let handle = Handle::try_current()
                .map_err(|e| ContractError::timer(format!("no tokio runtime: {e}")))?;
            Ok(Box::new(RuntimeTimer::new(handle)))
        }
        TimerKind::Auto => Ok(match Handle::try_current() {
            Ok(handle) => Box::new(RuntimeTimer::new(handle)),
            Err(_) => Box::new(ThreadTimer::new(name)),
        }),
    }
}

#[derive(Debug, Default)]
struct GateState {
    active: bool,
    ticking_on: Option<ThreadId>,
}

/// Shared between a timer and its tick loop.
#[derive(Debug, Default)]
struct TickGate {
    state: Mutex<GateState>,
    /// Signalled when a tick ends
    idle: Condvar,
    /// Signalled when the gate closes
    wake: Condvar,
}

impl TickGate {
    fn open() -> Arc<Self> {
        let gate = Self::default();
        gate.lock().active = true;
        Arc::new(gate)
    }

    fn lock(&self) -> MutexGuard<'_, GateState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_active(&self) -> bool {
        self.lock().active
    }

    /// Claim the tick for the current thread. `None` once closed.
    fn begin_tick(&self) -> Option<TickGuard<'_>> {
        let mut state = self.lock();
        if !state.active {
            return None;
        }
        state.ticking_on = Some(thread::current().id());
        Some(TickGuard { gate: self })
    }

    /// Sleep until `deadline`. Returns `false` if the gate closed meanwhile.
    fn sleep_until(&self, deadline: Instant) -> bool {
        let mut state = self.lock();
        loop {
            if !state.active {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            state = self
                .wake
                .wait_timeout(state, deadline - now)
                .map(|(guard, _)| guard)
                .unwrap_or_else(|e| e.into_inner().0);
        }
    }

    /// Stop future ticks and wait out the current one.
    fn close(&self) {
        let me = thread::current().id();
        let mut state = self.lock();
        state.active = false;
        self.wake.notify_all();

        while let Some(owner) = state.ticking_on {
            if owner == me {
                // Stopped from inside the tick
                break;
            }
            state = self.idle.wait(state).unwrap_or_else(PoisonError::into_inner);
        }
    }
}

/// Ends the tick on drop, also when the callback unwinds.
struct TickGuard<'a> {
    gate: &'a TickGate,
}

impl Drop for TickGuard<'_> {
    fn drop(&mut self) {
        self.gate.lock().ticking_on = None;
        self.gate.idle.notify_all();
    }
}

fn run_tick(gate: &TickGate, callback: &TickCallback) -> bool {
    match gate.begin_tick() {
        Some(_guard) => {
            callback();
            true
        }
        None => false,
    }
}

// ============================================================================
// ThreadTimer
// ============================================================================

struct ThreadRun {
    gate: Arc<TickGate>,
    thread: JoinHandle<()>,
}

/// Timer backed by a dedicated thread
pub struct ThreadTimer {
    name: String,
    run: Mutex<Option<ThreadRun>>,
}

impl ThreadTimer {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            run: Mutex::new(None),
        }
    }

    fn run(&self) -> MutexGuard<'_, Option<ThreadRun>> {
        self.run.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl TickSource for ThreadTimer {
    fn start(
        &self,
        first_delay: Duration,
        interval: Duration,
        callback: TickCallback,
    ) -> Result<(), ContractError> {
        // Held until the run is stored, so a tick stopping the timer sees it
        let mut run = loop {
            self.stop();
            let run = self.run();
            if run.is_none() {
                break run;
            }
        };
        let gate = TickGate::open();
        let loop_gate = gate.clone();
        let thread = thread::Builder::new()
            .name(format!("{}-ticker", self.name))
            .spawn(move || {
                let mut next = Instant::now() + first_delay;
                while loop_gate.sleep_until(next) {
                    let started = Instant::now();
                    if !run_tick(&loop_gate, &callback) {
                        break;
                    }
                    next = started + interval;
                }
            })
            .map_err(|e| ContractError::timer(format!("failed to spawn timer thread: {e}")))?;

        debug!(timer = %self.name, ?first_delay, ?interval, "Thread timer started");
        *run = Some(ThreadRun { gate, thread });
        Ok(())
    }

    fn stop(&self) {
        let Some(run) = self.run().take() else {
            return;
        };
        run.gate.close();

        if run.thread.thread().id() == thread::current().id() {
            // Detached: the loop exits after the current tick
            return;
        }
        if run.thread.join().is_err() {
            warn!(timer = %self.name, "Timer thread panicked");
        }
        debug!(timer = %self.name, "Thread timer stopped");
    }

    fn is_running(&self) -> bool {
        self.run().as_ref().is_some_and(|run| run.gate.is_active())
    }
}

impl Drop for ThreadTimer {
    fn drop(&mut self) {
        self.stop();
    }
}

// ============================================================================
// RuntimeTimer
// ============================================================================

struct TaskRun {
    gate: Arc<TickGate>,
    task: tokio::task::JoinHandle<()>,
}

/// Timer backed by a tokio task
pub struct RuntimeTimer {
    handle: Handle,
    run: Mutex<Option<TaskRun>>,
}

impl RuntimeTimer {
    pub fn new(handle: Handle) -> Self {
        Self {
            handle,
            run: Mutex::new(None),
        }
    }

    fn run(&self) -> MutexGuard<'_, Option<TaskRun>> {
        self.run.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl TickSource for RuntimeTimer {
    fn start(
        &self,
        first_delay: Duration,
        interval: Duration,
        callback: TickCallback,
    ) -> Result<(), ContractError> {
        let mut run = loop {
            self.stop();
            let run = self.run();
            if run.is_none() {
                break run;
            }
        };
        let gate = TickGate::open();
        let loop_gate = gate.clone();
        let task = self.handle.spawn(async move {
            let mut next = tokio::time::Instant::now() + first_delay;
            loop {
                tokio::time::sleep_until(next).await;
                let started = tokio::time::Instant::now();
                if !run_tick(&loop_gate, &callback) {
                    break;
                }
                next = started + interval;
            }
        });

        debug!(?first_delay, ?interval, "Runtime timer started");
        *run = Some(TaskRun { gate, task });
        Ok(())
    }

    fn stop(&self) {
        let Some(run) = self.run().take() else {
            return;
        };
        run.gate.close();
        run.task.abort();
        debug!("Runtime timer stopped");
    }

    fn is_running(&self) -> bool {
        self.run().as_ref().is_some_and(|run| run.gate.is_active())
    }
}

impl Drop for RuntimeTimer {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter() -> (Arc<AtomicUsize>, TickCallback) {
        let count = Arc::new(AtomicUsize::new(0));
        let cb_count = count.clone();
        let callback: TickCallback = Arc::new(move || {
            cb_count.fetch_add(1, Ordering::SeqCst);
        });
        (count, callback)
    }

    #[test]
    fn test_thread_timer_ticks_until_stopped() {
        let timer = ThreadTimer::new("test");
        let (count, callback) = counter();

        timer
            .start(Duration::from_millis(1), Duration::from_millis(5), callback)
            .unwrap();
        assert!(timer.is_running());
        thread::sleep(Duration::from_millis(60));
        timer.stop();
        assert!(!timer.is_running());

        let after_stop = count.load(Ordering::SeqCst);
        assert!(after_stop >= 2, "expected several ticks, got {after_stop}");
        thread::sleep(Duration::from_millis(30));
        assert_eq!(count.load(Ordering::SeqCst), after_stop);
    }

    #[test]
    fn test_thread_timer_first_delay() {
        let timer = ThreadTimer::new("delay");
        let (count, callback) = counter();

        timer
            .start(Duration::from_millis(500), Duration::from_millis(5), callback)
            .unwrap();
        thread::sleep(Duration::from_millis(20));
        timer.stop();
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_stop_waits_for_in_flight_tick() {
        let timer = ThreadTimer::new("slow");
        let finished = Arc::new(AtomicUsize::new(0));
        let started = Arc::new(AtomicUsize::new(0));
        let (f, s) = (finished.clone(), started.clone());
        let callback: TickCallback = Arc::new(move || {
            s.fetch_add(1, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(40));
            f.fetch_add(1, Ordering::SeqCst);
        });

        timer
            .start(Duration::ZERO, Duration::from_millis(1), callback)
            .unwrap();
        while started.load(Ordering::SeqCst) == 0 {
            thread::sleep(Duration::from_millis(1));
        }
        timer.stop();

        assert_eq!(
            started.load(Ordering::SeqCst),
            finished.load(Ordering::SeqCst)
        );
    }

    #[test]
    fn test_stop_from_inside_tick() {
        let timer = Arc::new(ThreadTimer::new("reentrant"));
        let count = Arc::new(AtomicUsize::new(0));
        let weak = Arc::downgrade(&timer);
        let cb_count = count.clone();
        let callback: TickCallback = Arc::new(move || {
            cb_count.fetch_add(1, Ordering::SeqCst);
            if let Some(timer) = weak.upgrade() {
                timer.stop();
            }
        });

        timer
            .start(Duration::ZERO, Duration::from_millis(1), callback)
            .unwrap();
        thread::sleep(Duration::from_millis(40));

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(!timer.is_running());
    }

    #[test]
    fn test_restart_replaces_schedule() {
        let timer = ThreadTimer::new("restart");
        let (first, first_cb) = counter();
        let (second, second_cb) = counter();

        timer
            .start(Duration::ZERO, Duration::from_millis(2), first_cb)
            .unwrap();
        thread::sleep(Duration::from_millis(10));
        timer
            .start(Duration::ZERO, Duration::from_millis(2), second_cb)
            .unwrap();
        let frozen = first.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(20));
        timer.stop();

        assert_eq!(first.load(Ordering::SeqCst), frozen);
        assert!(second.load(Ordering::SeqCst) >= 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_runtime_timer_ticks() {
        let timer = RuntimeTimer::new(Handle::current());
        let (count, callback) = counter();

        timer
            .start(Duration::from_millis(1), Duration::from_millis(5), callback)
            .unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;
        timer.stop();

        let after_stop = count.load(Ordering::SeqCst);
        assert!(after_stop >= 2, "expected several ticks, got {after_stop}");
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(count.load(Ordering::SeqCst), after_stop);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_runtime_stop_waits_for_in_flight_tick() {
        let timer = Arc::new(RuntimeTimer::new(Handle::current()));
        let finished = Arc::new(AtomicUsize::new(0));
        let started = Arc::new(AtomicUsize::new(0));
        let (f, s) = (finished.clone(), started.clone());
        let callback: TickCallback = Arc::new(move || {
            s.fetch_add(1, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(40));
            f.fetch_add(1, Ordering::SeqCst);
        });

        timer
            .start(Duration::ZERO, Duration::from_millis(1), callback)
            .unwrap();
        while started.load(Ordering::SeqCst) == 0 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        let stopper = timer.clone();
        tokio::task::spawn_blocking(move || stopper.stop())
            .await
            .unwrap();

        let ticks = started.load(Ordering::SeqCst);
        assert_eq!(ticks, finished.load(Ordering::SeqCst));
        assert!(!timer.is_running());
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(started.load(Ordering::SeqCst), ticks);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_runtime_stop_from_inside_tick() {
        let timer = Arc::new(RuntimeTimer::new(Handle::current()));
        let count = Arc::new(AtomicUsize::new(0));
        let weak = Arc::downgrade(&timer);
        let cb_count = count.clone();
        let callback: TickCallback = Arc::new(move || {
            cb_count.fetch_add(1, Ordering::SeqCst);
            if let Some(timer) = weak.upgrade() {
                timer.stop();
            }
        });

        timer
            .start(Duration::ZERO, Duration::from_millis(1), callback)
            .unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(!timer.is_running());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_runtime_restart_replaces_schedule() {
        let timer = RuntimeTimer::new(Handle::current());
        let (first, first_cb) = counter();
        let (second, second_cb) = counter();

        timer
            .start(Duration::ZERO, Duration::from_millis(2), first_cb)
            .unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        timer
            .start(Duration::ZERO, Duration::from_millis(2), second_cb)
            .unwrap();
        assert!(timer.is_running());
        let frozen = first.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        timer.stop();

        assert!(frozen >= 1);
        assert_eq!(first.load(Ordering::SeqCst), frozen);
        assert!(second.load(Ordering::SeqCst) >= 1);
    }

    #[test]
    fn test_auto_without_runtime_uses_thread() {
        let timer = build_tick_source(TimerKind::Auto, "auto").unwrap();
        let (count, callback) = counter();
        timer
            .start(Duration::ZERO, Duration::from_millis(5), callback)
            .unwrap();
        thread::sleep(Duration::from_millis(20));
        timer.stop();
        assert!(count.load(Ordering::SeqCst) >= 1);
    }

    #[test]
    fn test_runtime_kind_requires_runtime() {
        let err = build_tick_source(TimerKind::Runtime, "rt").err().unwrap();
        assert!(matches!(err, ContractError::Timer { .. }));
    }
}
