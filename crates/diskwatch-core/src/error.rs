//! Error types shared across the crate.
//!
//! Only [`WatcherError`] and [`ConfigError`] ever reach the caller. The other
//! two are consumed inside the run-loop thread, where every failure is turned
//! into a log line and a dropped event.
use thiserror::Error;

use crate::native::{CallbackKind, DescriptionKey};
use crate::watcher::WatcherState;

/// Errors returned by [`crate::DiskEventWatcher::start`].
#[derive(Debug, Error)]
pub enum WatcherError {
    /// `start()` is only valid from [`WatcherState::Stopped`].
    #[error("watcher is {0}, it must be stopped before it can start")]
    NotStopped(WatcherState),

    /// The OS refused to create the run-loop thread.
    #[error("failed to spawn the run-loop thread")]
    Spawn(#[source] std::io::Error),
}

/// Errors raised while building a [`crate::DiskEventManager`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("a listener must be set before building the disk event manager")]
    MissingListener,
}

/// Failures reported by a native disk-subsystem backend.
#[derive(Debug, Error)]
pub enum NativeError {
    #[error("the disk arbitration session could not be created")]
    SessionUnavailable,

    #[error("failed to register the {0} callback")]
    Register(CallbackKind),

    #[error("failed to unregister the {0} callback")]
    Unregister(CallbackKind),

    #[error("failed to schedule the session on the run loop")]
    Schedule,

    #[error("failed to unschedule the session from the run loop")]
    Unschedule,

    #[error("failed to release the session")]
    Release,
}

/// A property bag that could not be read at all.
///
/// A value of the wrong type is not an error: getters report it as absent.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PropertyError {
    #[error("property {key} could not be read: {reason}")]
    Unreadable { key: DescriptionKey, reason: String },
}
