//! Builder-style entry point.
//!
//! ```ignore
//! let (listener, events) = ChannelListener::bounded(256);
//! let manager = DiskEventManager::builder()
//!     .listener(listener)
//!     .usb_only()
//!     .build()?;
//! manager.start()?;
//! for event in events.iter() {
//!     println!("{} {}", event.kind(), event.disk().bsd_name);
//! }
//! ```
use std::fmt;
use std::time::Duration;

use crate::error::{ConfigError, WatcherError};
use crate::filter::{DiskFilter, Filter, FilterChain};
use crate::listener::DiskEventListener;
use crate::native::DiskArbitration;
use crate::watcher::{DiskEventWatcher, WatcherConfig, WatcherState};

#[cfg(target_os = "macos")]
use crate::native::NativeArbitration;

/// A configured watcher. Dropping the manager stops it.
///
/// The backend is erased here so callers can hold a manager without naming
/// its type.
#[derive(Debug)]
pub struct DiskEventManager {
    watcher: Box<dyn Control>,
}

/// Backend-independent view of a [`DiskEventWatcher`].
trait Control: Send + Sync + fmt::Debug {
    fn start(&self) -> Result<(), WatcherError>;
    fn stop(&self);
    fn state(&self) -> WatcherState;
}

impl<B: DiskArbitration> Control for DiskEventWatcher<B> {
    fn start(&self) -> Result<(), WatcherError> {
        DiskEventWatcher::start(self)
    }

    fn stop(&self) {
        DiskEventWatcher::stop(self);
    }

    fn state(&self) -> WatcherState {
        DiskEventWatcher::state(self)
    }
}

impl DiskEventManager {
    pub fn builder() -> DiskEventManagerBuilder {
        DiskEventManagerBuilder::default()
    }

    /// Spawn the run-loop thread. See [`DiskEventWatcher::start`].
    pub fn start(&self) -> Result<(), WatcherError> {
        self.watcher.start()
    }

    pub fn stop(&self) {
        self.watcher.stop();
    }

    pub fn state(&self) -> WatcherState {
        self.watcher.state()
    }
}

/// Collects a listener, filters and tunables.
#[derive(Default)]
pub struct DiskEventManagerBuilder {
    listener: Option<Box<dyn DiskEventListener>>,
    filters: FilterChain,
    config: WatcherConfig,
}

impl DiskEventManagerBuilder {
    /// Required.
    pub fn listener(mut self, listener: impl DiskEventListener) -> Self {
        self.listener = Some(Box::new(listener));
        self
    }

    /// Add a filter. Filters are ANDed in the order added.
    pub fn filter(mut self, filter: impl DiskFilter + 'static) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn external_only(self) -> Self {
        self.filter(Filter::ExternalOnly)
    }

    pub fn usb_only(self) -> Self {
        self.filter(Filter::UsbOnly)
    }

    pub fn removable_only(self) -> Self {
        self.filter(Filter::RemovableOnly)
    }

    pub fn ejectable_only(self) -> Self {
        self.filter(Filter::EjectableOnly)
    }

    pub fn writable_only(self) -> Self {
        self.filter(Filter::WritableOnly)
    }

    pub fn min_size(self, bytes: u64) -> Self {
        self.filter(Filter::MinSize(bytes))
    }

    pub fn max_size(self, bytes: u64) -> Self {
        self.filter(Filter::MaxSize(bytes))
    }

    pub fn protocol(self, protocol: impl Into<String>) -> Self {
        self.filter(Filter::Protocol(protocol.into()))
    }

    pub fn volume_kind(self, kind: impl Into<String>) -> Self {
        self.filter(Filter::VolumeKind(kind.into()))
    }

    pub fn join_timeout(mut self, timeout: Duration) -> Self {
        self.config.join_timeout = timeout;
        self
    }

    pub fn thread_name(mut self, name: impl Into<String>) -> Self {
        self.config.thread_name = name.into();
        self
    }

    /// Whether a running watcher registers a process-exit hook. On by default.
    pub fn exit_hook(mut self, install: bool) -> Self {
        self.config.install_exit_hook = install;
        self
    }

    /// Build on the DiskArbitration framework.
    #[cfg(target_os = "macos")]
    pub fn build(self) -> Result<DiskEventManager, ConfigError> {
        self.build_with(NativeArbitration::default())
    }

    /// Build on any backend. No native resource is touched until `start()`.
    pub fn build_with<B: DiskArbitration>(
        self,
        backend: B,
    ) -> Result<DiskEventManager, ConfigError> {
        let listener = self.listener.ok_or(ConfigError::MissingListener)?;
        let watcher = DiskEventWatcher::from_boxed(backend, listener, self.filters, self.config);
        Ok(DiskEventManager {
            watcher: Box::new(watcher),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listener::ChannelListener;
    use crate::native::memory::MemoryArbitration;

    #[test]
    fn missing_listener_is_a_config_error() {
        let da = MemoryArbitration::new();
        let err = DiskEventManager::builder()
            .usb_only()
            .build_with(da.clone())
            .unwrap_err();
        assert_eq!(err, ConfigError::MissingListener);
        assert!(da.calls().is_empty());
    }

    #[test]
    fn builder_collects_filters_and_config() {
        let (listener, _rx) = ChannelListener::bounded(4);
        let builder = DiskEventManager::builder()
            .listener(listener)
            .external_only()
            .min_size(1 << 30)
            .protocol("USB")
            .join_timeout(Duration::from_millis(250))
            .thread_name("disk-test")
            .exit_hook(false);

        assert_eq!(builder.filters.len(), 3);
        assert_eq!(builder.config.join_timeout, Duration::from_millis(250));
        assert_eq!(builder.config.thread_name, "disk-test");
        assert!(!builder.config.install_exit_hook);

        let manager = builder.build_with(MemoryArbitration::new()).unwrap();
        assert_eq!(manager.state(), WatcherState::Stopped);
    }
}
