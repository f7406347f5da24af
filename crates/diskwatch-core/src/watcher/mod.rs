//! Disk event watcher: owns the run-loop thread.
//!
//! # Lifecycle
//!
//! `Stopped -> Starting -> Running -> Stopping -> Stopped`
//!
//! [`DiskEventWatcher::start`] spawns one named thread that performs every
//! native call: it creates the session, publishes its run loop, registers the
//! three callbacks, schedules the session and runs the loop. When the loop
//! exits the same thread unregisters, unschedules and releases, in that order.
//!
//! # Cancellation
//!
//! [`DiskEventWatcher::stop`] sets a stop flag, signals the published run
//! loop and waits for the thread to finish. The signal is repeated every
//! [`SIGNAL_INTERVAL`] because a stop sent before the loop starts running is
//! lost. After [`WatcherConfig::join_timeout`] the thread is detached with a
//! warning.
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError};
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

mod dispatch;
pub mod exit_hook;

pub use exit_hook::{is_shutting_down, registered_hooks, run_exit_hooks, HookId};

use crate::error::WatcherError;
use crate::filter::FilterChain;
use crate::listener::DiskEventListener;
use crate::native::{CallbackKind, DiskArbitration, RawCallback, RunLoop};
use dispatch::Dispatcher;

/// How often `stop()` re-signals the run loop while waiting.
pub const SIGNAL_INTERVAL: Duration = Duration::from_millis(100);

/// Default upper bound on how long `stop()` waits for the run-loop thread.
pub const DEFAULT_JOIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Default name of the run-loop thread.
pub const DEFAULT_THREAD_NAME: &str = "diskwatch-runloop";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WatcherState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

impl fmt::Display for WatcherState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Stopped => "stopped",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopping => "stopping",
        })
    }
}

/// Tunables for a [`DiskEventWatcher`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatcherConfig {
    /// How long `stop()` waits before detaching the run-loop thread.
    pub join_timeout: Duration,
    pub thread_name: String,
    /// Register a process-exit hook while running.
    pub install_exit_hook: bool,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            join_timeout: DEFAULT_JOIN_TIMEOUT,
            thread_name: DEFAULT_THREAD_NAME.to_owned(),
            install_exit_hook: true,
        }
    }
}

// ─── Shared state ───────────────────────────────────────────────────────────

/// Written by the run-loop thread, read by `stop()`.
struct WorkerControl<R> {
    run_loop: Mutex<Option<R>>,
    stop_requested: AtomicBool,
}

impl<R: RunLoop> WorkerControl<R> {
    fn signal(&self) {
        if let Some(run_loop) = self.run_loop.lock().as_ref() {
            run_loop.stop();
        }
    }

    fn stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::SeqCst)
    }
}

struct Worker<R> {
    thread: JoinHandle<()>,
    control: Arc<WorkerControl<R>>,
    /// Disconnects when the thread has finished its teardown.
    finished: Receiver<()>,
}

struct Lifecycle<R> {
    state: WatcherState,
    worker: Option<Worker<R>>,
    exit_hook: Option<HookId>,
}

struct Shared<B: DiskArbitration> {
    backend: B,
    dispatcher: Arc<Dispatcher>,
    config: WatcherConfig,
    lifecycle: Mutex<Lifecycle<B::RunLoop>>,
}

// ─── Public handle ──────────────────────────────────────────────────────────

/// Watches disk lifecycle events and forwards them to a listener.
///
/// Dropping the watcher stops it.
pub struct DiskEventWatcher<B: DiskArbitration> {
    shared: Arc<Shared<B>>,
}

impl<B: DiskArbitration> DiskEventWatcher<B> {
    pub fn new(
        backend: B,
        listener: impl DiskEventListener,
        filters: FilterChain,
        config: WatcherConfig,
    ) -> Self {
        Self::from_boxed(backend, Box::new(listener), filters, config)
    }

    pub(crate) fn from_boxed(
        backend: B,
        listener: Box<dyn DiskEventListener>,
        filters: FilterChain,
        config: WatcherConfig,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                backend,
                dispatcher: Arc::new(Dispatcher::new(listener, filters)),
                config,
                lifecycle: Mutex::new(Lifecycle {
                    state: WatcherState::Stopped,
                    worker: None,
                    exit_hook: None,
                }),
            }),
        }
    }

    /// Spawn the run-loop thread. Returns without waiting for it.
    ///
    /// Fails with [`WatcherError::NotStopped`] unless the watcher is stopped.
    pub fn start(&self) -> Result<(), WatcherError> {
        Shared::start(&self.shared)
    }

    /// Stop watching and tear down the native session.
    ///
    /// Idempotent, callable from any thread and from inside a listener. When
    /// called on the run-loop thread it only signals the loop: the state stays
    /// `Stopping` until teardown finishes after the current listener call
    /// returns.
    ///
    /// A call made while another caller is already stopping returns at once,
    /// possibly before that caller has finished tearing down.
    pub fn stop(&self) {
        self.shared.stop();
    }

    pub fn state(&self) -> WatcherState {
        self.shared.lifecycle.lock().state
    }

    /// A handle that can stop this watcher without owning it, for example
    /// from inside a listener.
    pub fn stop_handle(&self) -> StopHandle<B> {
        StopHandle {
            shared: Arc::downgrade(&self.shared),
        }
    }
}

impl<B: DiskArbitration> Drop for DiskEventWatcher<B> {
    fn drop(&mut self) {
        self.shared.stop();
    }
}

impl<B: DiskArbitration> fmt::Debug for DiskEventWatcher<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiskEventWatcher")
            .field("state", &self.state())
            .field("config", &self.shared.config)
            .finish()
    }
}

/// Weak stop-only handle returned by [`DiskEventWatcher::stop_handle`].
pub struct StopHandle<B: DiskArbitration> {
    shared: Weak<Shared<B>>,
}

impl<B: DiskArbitration> StopHandle<B> {
    /// Stop the watcher if it still exists.
    pub fn stop(&self) {
        if let Some(shared) = self.shared.upgrade() {
            shared.stop();
        }
    }
}

impl<B: DiskArbitration> Clone for StopHandle<B> {
    fn clone(&self) -> Self {
        Self {
            shared: Weak::clone(&self.shared),
        }
    }
}

// ─── Start / stop ───────────────────────────────────────────────────────────

impl<B: DiskArbitration> Shared<B> {
    fn start(this: &Arc<Self>) -> Result<(), WatcherError> {
        let mut lifecycle = this.lifecycle.lock();
        if lifecycle.state != WatcherState::Stopped {
            return Err(WatcherError::NotStopped(lifecycle.state));
        }
        lifecycle.state = WatcherState::Starting;

        let control = Arc::new(WorkerControl {
            run_loop: Mutex::new(None),
            stop_requested: AtomicBool::new(false),
        });
        let (done_tx, finished) = bounded::<()>(0);

        let shared = Arc::clone(this);
        let worker_control = Arc::clone(&control);
        let spawned = thread::Builder::new()
            .name(this.config.thread_name.clone())
            .spawn(move || {
                let _done = done_tx;
                shared.run_worker(&worker_control);
                shared.worker_exited(&worker_control);
            });

        let thread = match spawned {
            Ok(thread) => thread,
            Err(e) => {
                lifecycle.state = WatcherState::Stopped;
                return Err(WatcherError::Spawn(e));
            }
        };

        lifecycle.worker = Some(Worker {
            thread,
            control,
            finished,
        });

        if this.config.install_exit_hook {
            let weak = Arc::downgrade(this);
            lifecycle.exit_hook = Some(exit_hook::register(Box::new(move || {
                if let Some(shared) = weak.upgrade() {
                    shared.stop();
                }
            })));
        }

        info!("Watcher: started");
        Ok(())
    }

    fn stop(&self) {
        let (worker, hook) = {
            let mut lifecycle = self.lifecycle.lock();
            match lifecycle.state {
                WatcherState::Stopped | WatcherState::Stopping => return,
                WatcherState::Starting | WatcherState::Running => {}
            }
            lifecycle.state = WatcherState::Stopping;
            (lifecycle.worker.take(), lifecycle.exit_hook.take())
        };

        // A hook that already ran is no longer registered; removing it is a no-op.
        if let Some(id) = hook {
            exit_hook::unregister(id);
        }

        if let Some(worker) = worker {
            if let Some(worker) = self.halt(worker) {
                // On the run-loop thread: the worker moves to `Stopped` itself
                // once teardown is done.
                self.lifecycle.lock().worker = Some(worker);
                return;
            }
        }

        self.lifecycle.lock().state = WatcherState::Stopped;
        info!("Watcher: stopped");
    }

    /// Signal the run loop until the worker finishes, then join it.
    ///
    /// On the run-loop thread itself nothing can be joined, so the worker is
    /// handed back still running.
    fn halt(&self, worker: Worker<B::RunLoop>) -> Option<Worker<B::RunLoop>> {
        worker.control.stop_requested.store(true, Ordering::SeqCst);

        if worker.thread.thread().id() == thread::current().id() {
            worker.control.signal();
            debug!("Watcher: stop requested from the run-loop thread, not joining");
            return Some(worker);
        }

        let deadline = Instant::now() + self.config.join_timeout;
        loop {
            worker.control.signal();
            let now = Instant::now();
            if now >= deadline {
                warn!(
                    "Watcher: run-loop thread did not finish within {:?}, detaching it",
                    self.config.join_timeout
                );
                return None;
            }
            match worker.finished.recv_timeout(SIGNAL_INTERVAL.min(deadline - now)) {
                Err(RecvTimeoutError::Timeout) => continue,
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        if worker.thread.join().is_err() {
            error!("Watcher: run-loop thread panicked");
        }
        None
    }

    fn mark_running(&self) {
        let mut lifecycle = self.lifecycle.lock();
        if lifecycle.state == WatcherState::Starting {
            lifecycle.state = WatcherState::Running;
        }
    }

    /// The worker thread is about to end. If no other thread took it over
    /// for joining, return to `Stopped` here. That happens after a setup
    /// failure and after a stop requested from a listener.
    fn worker_exited(&self, control: &Arc<WorkerControl<B::RunLoop>>) {
        let hook = {
            let mut lifecycle = self.lifecycle.lock();
            let ours = lifecycle
                .worker
                .as_ref()
                .is_some_and(|w| Arc::ptr_eq(&w.control, control));
            if !ours {
                return;
            }
            // Dropping our own JoinHandle detaches; the thread is ending.
            lifecycle.worker = None;
            lifecycle.state = WatcherState::Stopped;
            lifecycle.exit_hook.take()
        };
        if let Some(id) = hook {
            exit_hook::unregister(id);
        }
        if control.stop_requested() {
            info!("Watcher: stopped");
        } else {
            warn!("Watcher: run-loop thread exited without a stop request");
        }
    }

    // ─── Run-loop thread ────────────────────────────────────────────────────

    fn run_worker(&self, control: &WorkerControl<B::RunLoop>) {
        let backend = &self.backend;

        let session = match backend.create_session() {
            Ok(session) => session,
            Err(e) => {
                error!("Watcher: {e}");
                return;
            }
        };

        let run_loop = backend.current_run_loop();
        *control.run_loop.lock() = Some(run_loop.clone());

        let mut registrations = Vec::with_capacity(CallbackKind::ALL.len());
        let mut registered_all = true;
        for kind in CallbackKind::ALL {
            match backend.register_callback(&session, kind, self.callback(kind)) {
                Ok(registration) => registrations.push(registration),
                Err(e) => {
                    error!("Watcher: {e}");
                    registered_all = false;
                    break;
                }
            }
        }

        let scheduled = registered_all
            && match backend.schedule(&session, &run_loop) {
                Ok(()) => true,
                Err(e) => {
                    error!("Watcher: {e}");
                    false
                }
            };

        if scheduled {
            self.mark_running();
            if control.stop_requested() {
                debug!("Watcher: stop requested before the run loop started");
            } else {
                debug!("Watcher: run loop running");
                backend.run(&run_loop);
                debug!("Watcher: run loop exited");
            }
        }

        // Teardown: each step is attempted even if an earlier one failed.
        for registration in registrations {
            if let Err(e) = backend.unregister_callback(&session, registration) {
                error!("Watcher: {e}");
            }
        }
        if scheduled {
            if let Err(e) = backend.unschedule(&session, &run_loop) {
                error!("Watcher: {e}");
            }
        }
        if let Err(e) = backend.release_session(session) {
            error!("Watcher: {e}");
        }

        *control.run_loop.lock() = None;
    }

    fn callback(&self, kind: CallbackKind) -> RawCallback<B::Disk> {
        let dispatcher = Arc::clone(&self.dispatcher);
        Arc::new(move |disk: &B::Disk| dispatcher.deliver(kind, disk))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::memory::{Faults, MemoryArbitration, NativeCall};

    struct Silent;
    impl DiskEventListener for Silent {}

    fn watcher(da: &MemoryArbitration) -> DiskEventWatcher<MemoryArbitration> {
        let config = WatcherConfig {
            install_exit_hook: false,
            ..WatcherConfig::default()
        };
        DiskEventWatcher::new(da.clone(), Silent, FilterChain::new(), config)
    }

    fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        false
    }

    #[test]
    fn state_display() {
        assert_eq!(WatcherState::Stopped.to_string(), "stopped");
        assert_eq!(WatcherState::Stopping.to_string(), "stopping");
    }

    #[test]
    fn default_config() {
        let config = WatcherConfig::default();
        assert_eq!(config.join_timeout, Duration::from_secs(5));
        assert_eq!(config.thread_name, "diskwatch-runloop");
        assert!(config.install_exit_hook);
    }

    #[test]
    fn stop_before_start_is_a_no_op() {
        let da = MemoryArbitration::new();
        let w = watcher(&da);
        w.stop();
        w.stop();
        assert_eq!(w.state(), WatcherState::Stopped);
        assert!(da.calls().is_empty());
    }

    #[test]
    fn start_twice_is_rejected() {
        let da = MemoryArbitration::new();
        let w = watcher(&da);
        w.start().unwrap();
        let err = w.start().unwrap_err();
        assert!(matches!(
            err,
            WatcherError::NotStopped(WatcherState::Starting | WatcherState::Running)
        ));
        w.stop();
        assert_eq!(w.state(), WatcherState::Stopped);
    }

    #[test]
    fn stop_right_after_start_tears_everything_down() {
        let da = MemoryArbitration::new();
        let w = watcher(&da);
        w.start().unwrap();
        w.stop();
        assert_eq!(w.state(), WatcherState::Stopped);
        assert_eq!(da.live_sessions(), 0);
        assert_eq!(da.live_registrations(), 0);
        assert_eq!(da.calls().last(), Some(&NativeCall::Release));
    }

    #[test]
    fn failed_session_returns_to_stopped() {
        let da = MemoryArbitration::new();
        da.set_faults(Faults {
            create_session: true,
            ..Faults::default()
        });
        let w = watcher(&da);
        w.start().unwrap();
        assert!(wait_for(|| w.state() == WatcherState::Stopped));
        assert_eq!(da.calls(), [NativeCall::CreateSession]);

        da.set_faults(Faults::default());
        w.start().unwrap();
        assert!(wait_for(|| w.state() == WatcherState::Running));
        w.stop();
        assert_eq!(da.live_sessions(), 0);
    }

    #[test]
    fn failed_registration_releases_what_was_set_up() {
        let da = MemoryArbitration::new();
        da.set_faults(Faults {
            register: Some(CallbackKind::Disappeared),
            ..Faults::default()
        });
        let w = watcher(&da);
        w.start().unwrap();
        assert!(wait_for(|| w.state() == WatcherState::Stopped));
        assert_eq!(
            da.calls(),
            [
                NativeCall::CreateSession,
                NativeCall::CurrentRunLoop,
                NativeCall::Register(CallbackKind::Appeared),
                NativeCall::Register(CallbackKind::Disappeared),
                NativeCall::Unregister(CallbackKind::Appeared),
                NativeCall::Release,
            ]
        );
        assert_eq!(da.live_registrations(), 0);
        assert_eq!(da.live_sessions(), 0);
    }

    #[test]
    fn drop_stops_the_watcher() {
        let da = MemoryArbitration::new();
        {
            let w = watcher(&da);
            w.start().unwrap();
            assert!(wait_for(|| w.state() == WatcherState::Running));
        }
        assert_eq!(da.live_sessions(), 0);
    }

    #[test]
    fn stop_handle_outliving_the_watcher_is_harmless() {
        let da = MemoryArbitration::new();
        let w = watcher(&da);
        let handle = w.stop_handle();
        w.start().unwrap();
        handle.clone().stop();
        assert_eq!(w.state(), WatcherState::Stopped);
        drop(w);
        handle.stop();
    }
}
