//! Process-exit hook behaviour.
//!
//! Kept apart from the other integration tests: `run_exit_hooks` marks the
//! whole process as shutting down and stops every watcher in it.
use diskwatch_core::native::memory::{MemoryArbitration, NativeCall};
use diskwatch_core::watcher::is_shutting_down;
use diskwatch_core::{run_exit_hooks, DiskEventListener, DiskEventManager, WatcherState};
use std::thread;
use std::time::{Duration, Instant};

struct Silent;
impl DiskEventListener for Silent {}

fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while !condition() {
        assert!(Instant::now() < deadline, "condition not reached in time");
        thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn exit_hooks_stop_running_watchers_once() {
    let hooked = MemoryArbitration::new();
    let unhooked = MemoryArbitration::new();

    let with_hook = DiskEventManager::builder()
        .listener(Silent)
        .build_with(hooked.clone())
        .unwrap();
    let without_hook = DiskEventManager::builder()
        .listener(Silent)
        .exit_hook(false)
        .build_with(unhooked.clone())
        .unwrap();

    with_hook.start().unwrap();
    without_hook.start().unwrap();
    wait_until(|| with_hook.state() == WatcherState::Running);
    wait_until(|| without_hook.state() == WatcherState::Running);

    assert!(!is_shutting_down());
    run_exit_hooks();
    assert!(is_shutting_down());

    assert_eq!(with_hook.state(), WatcherState::Stopped);
    assert_eq!(hooked.live_sessions(), 0);
    assert_eq!(without_hook.state(), WatcherState::Running);

    // Hooks run once; a later explicit stop is a no-op.
    run_exit_hooks();
    with_hook.stop();
    let releases = hooked
        .calls()
        .iter()
        .filter(|c| **c == NativeCall::Release)
        .count();
    assert_eq!(releases, 1);

    without_hook.stop();
    assert_eq!(unhooked.live_sessions(), 0);
}
