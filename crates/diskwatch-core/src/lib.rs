//! diskwatch core: disk lifecycle events from macOS DiskArbitration.
//!
//! This crate contains the whole watcher with zero CLI dependencies.
//!
//! # Modules
//!
//! - [`model`] : Immutable disk snapshots, size formatting and event values.
//! - [`native`] : The native disk-subsystem seam, the macOS backend and an
//!   in-memory backend.
//! - [`mapper`] : Builds a [`DiskInfo`] from a native disk handle.
//! - [`filter`] : Composable predicates deciding which disks reach the listener.
//! - [`listener`] : The five-slot listener trait and a channel-backed listener.
//! - [`watcher`] : The run-loop thread, mount-state tracking and shutdown hooks.
//! - [`manager`] : Builder-style entry point tying the pieces together.
pub mod error;
pub mod filter;
pub mod listener;
pub mod manager;
pub mod mapper;
pub mod model;
pub mod native;
pub mod watcher;

pub use error::{ConfigError, NativeError, PropertyError, WatcherError};
pub use filter::{DiskFilter, Filter, FilterChain};
pub use listener::{ChannelListener, DiskEventListener};
pub use manager::{DiskEventManager, DiskEventManagerBuilder};
pub use model::{BusInfo, DeviceInfo, DiskEvent, DiskEventKind, DiskInfo, MediaInfo, VolumeInfo};
pub use watcher::{run_exit_hooks, DiskEventWatcher, StopHandle, WatcherConfig, WatcherState};
