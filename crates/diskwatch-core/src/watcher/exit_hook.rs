//! Process-exit teardown hooks.
//!
//! A running watcher registers a hook here so its native session is torn
//! down even when the host exits without stopping it. Hooks run once, either
//! from the C runtime's `atexit` (installed on first use on unix) or when the
//! host calls [`run_exit_hooks`] itself, typically from a Ctrl+C handler
//! before calling `std::process::exit`.
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, error};

/// Identifies a registered hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HookId(u64);

pub(crate) type Hook = Box<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct Registry {
    next_id: u64,
    hooks: BTreeMap<HookId, Hook>,
    #[cfg_attr(not(unix), allow(dead_code))]
    process_hook_installed: bool,
}

impl Registry {
    fn register(&mut self, hook: Hook) -> HookId {
        self.next_id += 1;
        let id = HookId(self.next_id);
        self.hooks.insert(id, hook);
        id
    }

    fn unregister(&mut self, id: HookId) -> bool {
        self.hooks.remove(&id).is_some()
    }

    fn drain(&mut self) -> Vec<Hook> {
        std::mem::take(&mut self.hooks).into_values().collect()
    }
}

static REGISTRY: Lazy<Mutex<Registry>> = Lazy::new(|| Mutex::new(Registry::default()));
static SHUTTING_DOWN: AtomicBool = AtomicBool::new(false);

/// Add a hook to run at process exit.
pub(crate) fn register(hook: Hook) -> HookId {
    let mut registry = REGISTRY.lock();
    install_process_hook(&mut registry);
    registry.register(hook)
}

/// Remove a hook. Returns `false` if it already ran or was never registered.
pub(crate) fn unregister(id: HookId) -> bool {
    REGISTRY.lock().unregister(id)
}

/// Number of hooks waiting to run.
pub fn registered_hooks() -> usize {
    REGISTRY.lock().hooks.len()
}

/// True once [`run_exit_hooks`] has started.
pub fn is_shutting_down() -> bool {
    SHUTTING_DOWN.load(Ordering::SeqCst)
}

/// Stop every watcher that is still running.
///
/// Marks the process as shutting down, then runs each registered hook once.
/// Safe to call more than once and from any thread; later calls only run
/// hooks registered since the previous one.
pub fn run_exit_hooks() {
    SHUTTING_DOWN.store(true, Ordering::SeqCst);
    // Taken out under the lock, run without it: a hook stops a watcher, and
    // stopping may touch the registry.
    let hooks = REGISTRY.lock().drain();
    if !hooks.is_empty() {
        debug!("running {} exit hook(s)", hooks.len());
    }
    run_all(hooks);
}

fn run_all(hooks: Vec<Hook>) {
    for hook in hooks {
        if catch_unwind(AssertUnwindSafe(|| hook())).is_err() {
            error!("exit hook panicked");
        }
    }
}

#[cfg(unix)]
fn install_process_hook(registry: &mut Registry) {
    if registry.process_hook_installed {
        return;
    }
    extern "C" fn on_process_exit() {
        // Unwinding out of an `extern "C"` function aborts.
        let _ = catch_unwind(run_exit_hooks);
    }
    if unsafe { libc::atexit(on_process_exit) } == 0 {
        registry.process_hook_installed = true;
    } else {
        error!("failed to install the process exit hook");
    }
}

#[cfg(not(unix))]
fn install_process_hook(_registry: &mut Registry) {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    fn counting(counter: &Arc<AtomicUsize>) -> Hook {
        let counter = Arc::clone(counter);
        Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn unregistered_hooks_do_not_run() {
        let hits = Arc::new(AtomicUsize::new(0));
        let mut registry = Registry::default();
        let a = registry.register(counting(&hits));
        let b = registry.register(counting(&hits));
        assert_ne!(a, b);

        assert!(registry.unregister(a));
        assert!(!registry.unregister(a));

        run_all(registry.drain());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(!registry.unregister(b));
    }

    #[test]
    fn drained_hooks_run_once() {
        let hits = Arc::new(AtomicUsize::new(0));
        let mut registry = Registry::default();
        registry.register(counting(&hits));
        run_all(registry.drain());
        run_all(registry.drain());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn panicking_hook_does_not_stop_the_others() {
        let hits = Arc::new(AtomicUsize::new(0));
        let mut registry = Registry::default();
        registry.register(Box::new(|| panic!("teardown failed")));
        registry.register(counting(&hits));
        run_all(registry.drain());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn global_registry_round_trip() {
        // Does not call `run_exit_hooks`: that would mark the whole test
        // process as shutting down.
        let id = register(Box::new(|| {}));
        assert!(registered_hooks() >= 1);
        assert!(unregister(id));
        assert!(!unregister(id));
    }
}
