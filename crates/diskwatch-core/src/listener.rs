//! Listener interface and a channel-backed implementation.
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use tracing::warn;

use crate::model::{DiskEvent, DiskInfo};

/// Receives disk events on the watcher's run-loop thread.
///
/// Calls are strictly serialized and arrive in the order the native
/// subsystem raised them. Every method defaults to a no-op, so implement
/// only what you need.
///
/// Implementations must not panic. A panic is caught before it can reach
/// the native callback machinery and logged, but the rest of the listener
/// calls for that native event (for example the `description_changed` that
/// would have followed `mounted`) are skipped.
pub trait DiskEventListener: Send + 'static {
    fn on_disk_appeared(&mut self, _disk: &DiskInfo) {}

    fn on_disk_disappeared(&mut self, _disk: &DiskInfo) {}

    fn on_disk_description_changed(&mut self, _disk: &DiskInfo) {}

    /// A volume gained a mount point.
    fn on_disk_mounted(&mut self, _disk: &DiskInfo) {}

    /// A volume lost its mount point, or disappeared while mounted.
    fn on_disk_unmounted(&mut self, _disk: &DiskInfo) {}
}

/// Default capacity of [`ChannelListener::bounded`] queues.
pub const EVENT_CHANNEL_CAPACITY: usize = 1_024;

/// Forwards every listener call as a [`DiskEvent`] to a channel.
///
/// The run-loop thread never blocks on a slow consumer: when the channel is
/// full the event is dropped with a warning.
pub struct ChannelListener {
    tx: Sender<DiskEvent>,
}

impl ChannelListener {
    pub fn new(tx: Sender<DiskEvent>) -> Self {
        Self { tx }
    }

    /// A listener plus the receiving end of a fresh bounded channel.
    pub fn bounded(capacity: usize) -> (Self, Receiver<DiskEvent>) {
        let (tx, rx) = bounded(capacity);
        (Self { tx }, rx)
    }

    fn forward(&self, event: DiskEvent) {
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                warn!(
                    "event channel full, dropping {} for {}",
                    event.kind(),
                    event.disk().bsd_name
                );
            }
            // Receiver gone; nobody is listening any more.
            Err(TrySendError::Disconnected(_)) => {}
        }
    }
}

impl DiskEventListener for ChannelListener {
    fn on_disk_appeared(&mut self, disk: &DiskInfo) {
        self.forward(DiskEvent::Appeared(disk.clone()));
    }

    fn on_disk_disappeared(&mut self, disk: &DiskInfo) {
        self.forward(DiskEvent::Disappeared(disk.clone()));
    }

    fn on_disk_description_changed(&mut self, disk: &DiskInfo) {
        self.forward(DiskEvent::DescriptionChanged(disk.clone()));
    }

    fn on_disk_mounted(&mut self, disk: &DiskInfo) {
        self.forward(DiskEvent::Mounted(disk.clone()));
    }

    fn on_disk_unmounted(&mut self, disk: &DiskInfo) {
        self.forward(DiskEvent::Unmounted(disk.clone()));
    }
}
