//! Raw-callback translation and mount-state tracking.
//!
//! Runs on the run-loop thread only. Each raw notification is mapped to a
//! snapshot, passed through the filter chain, then turned into one or more
//! listener calls. The mount-state set records which BSD names currently
//! have a mount point, so mount and unmount can be told apart from plain
//! description changes.
use compact_str::CompactString;
use parking_lot::Mutex;
use std::any::Any;
use std::collections::HashSet;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::{debug, error, warn};

use crate::filter::FilterChain;
use crate::listener::DiskEventListener;
use crate::mapper::map_disk;
use crate::model::DiskInfo;
use crate::native::{CallbackKind, DiskHandle};

struct DispatchState {
    listener: Box<dyn DiskEventListener>,
    mounted: HashSet<CompactString>,
}

pub(crate) struct Dispatcher {
    filters: FilterChain,
    state: Mutex<DispatchState>,
}

impl Dispatcher {
    pub(crate) fn new(listener: Box<dyn DiskEventListener>, filters: FilterChain) -> Self {
        Self {
            filters,
            state: Mutex::new(DispatchState {
                listener,
                mounted: HashSet::new(),
            }),
        }
    }

    /// Entry point for a raw callback. Never unwinds.
    pub(crate) fn deliver<D: DiskHandle>(&self, kind: CallbackKind, disk: &D) {
        let outcome = catch_unwind(AssertUnwindSafe(|| self.dispatch(kind, disk)));
        if let Err(panic) = outcome {
            error!(
                "Watcher: listener panicked while handling {kind}: {}",
                panic_message(panic.as_ref())
            );
        }
    }

    fn dispatch<D: DiskHandle>(&self, kind: CallbackKind, disk: &D) {
        let Some(info) = self.snapshot(kind, disk) else {
            return;
        };

        let mut state = self.state.lock();
        let DispatchState { listener, mounted } = &mut *state;

        match kind {
            CallbackKind::Appeared => listener.on_disk_appeared(&info),
            CallbackKind::Disappeared => {
                if mounted.remove(info.bsd_name.as_str()) {
                    listener.on_disk_unmounted(&info);
                }
                listener.on_disk_disappeared(&info);
            }
            CallbackKind::DescriptionChanged => {
                let name = info.bsd_name.as_str();
                match (info.is_mounted(), mounted.contains(name)) {
                    (true, false) => {
                        mounted.insert(CompactString::from(name));
                        listener.on_disk_mounted(&info);
                    }
                    (false, true) => {
                        mounted.remove(name);
                        listener.on_disk_unmounted(&info);
                    }
                    _ => {}
                }
                listener.on_disk_description_changed(&info);
            }
        }
    }

    /// Map and filter. `None` means the event is dropped.
    fn snapshot<D: DiskHandle>(&self, kind: CallbackKind, disk: &D) -> Option<DiskInfo> {
        let info = match map_disk(disk) {
            Ok(Some(info)) => info,
            Ok(None) => {
                debug!("Watcher: dropping {kind} event for a disk without a BSD name");
                return None;
            }
            Err(e) => {
                warn!("Watcher: dropping {kind} event: {e}");
                return None;
            }
        };

        if !self.filters.accepts(&info) {
            debug!("Watcher: {} filtered out of {kind}", info.bsd_name);
            return None;
        }
        Some(info)
    }

    #[cfg(test)]
    fn tracks_mounted(&self, bsd_name: &str) -> bool {
        self.state.lock().mounted.contains(bsd_name)
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else {
        "<non-string panic payload>"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::Filter;
    use crate::listener::ChannelListener;
    use crate::model::{DiskEvent, DiskEventKind};
    use crate::native::memory::{MemoryDisk, PropertyValue};
    use crate::native::DescriptionKey;
    use crossbeam_channel::Receiver;

    use crate::model::DiskEventKind as K;
    use crate::native::CallbackKind::{Appeared, DescriptionChanged, Disappeared};

    fn dispatcher(filters: FilterChain) -> (Dispatcher, Receiver<DiskEvent>) {
        let (listener, rx) = ChannelListener::bounded(64);
        (Dispatcher::new(Box::new(listener), filters), rx)
    }

    fn kinds(rx: &Receiver<DiskEvent>) -> Vec<DiskEventKind> {
        rx.try_iter().map(|e| e.kind()).collect()
    }

    fn usb(name: &str) -> MemoryDisk {
        MemoryDisk::new(name).with(
            DescriptionKey::DeviceProtocol,
            PropertyValue::String("USB".into()),
        )
    }

    #[test]
    fn full_lifecycle_sequence() {
        let (d, rx) = dispatcher(FilterChain::new());
        let disk = MemoryDisk::new("disk4");
        let mounted = disk.clone().mounted_at(Some("/Volumes/X"));

        d.deliver(Appeared, &disk);
        d.deliver(DescriptionChanged, &mounted);
        d.deliver(DescriptionChanged, &mounted);
        d.deliver(Disappeared, &mounted);

        assert_eq!(
            kinds(&rx),
            [
                K::Appeared,
                K::Mounted,
                K::DescriptionChanged,
                K::DescriptionChanged,
                K::Unmounted,
                K::Disappeared
            ]
        );
        assert!(!d.tracks_mounted("disk4"));
    }

    #[test]
    fn unmount_through_description_change() {
        let (d, rx) = dispatcher(FilterChain::new());
        let disk = MemoryDisk::new("disk5");

        d.deliver(DescriptionChanged, &disk.clone().mounted_at(Some("/Volumes/Y")));
        assert!(d.tracks_mounted("disk5"));
        d.deliver(DescriptionChanged, &disk.clone().mounted_at(None));
        assert!(!d.tracks_mounted("disk5"));
        // Still unmounted: no second `Unmounted`.
        d.deliver(DescriptionChanged, &disk.clone().mounted_at(None));
        d.deliver(Disappeared, &disk);

        assert_eq!(
            kinds(&rx),
            [
                K::Mounted,
                K::DescriptionChanged,
                K::Unmounted,
                K::DescriptionChanged,
                K::DescriptionChanged,
                K::Disappeared
            ]
        );
    }

    #[test]
    fn change_without_mount_point_is_plain_description_change() {
        let (d, rx) = dispatcher(FilterChain::new());
        d.deliver(DescriptionChanged, &MemoryDisk::new("disk6"));
        assert_eq!(kinds(&rx), [K::DescriptionChanged]);
    }

    #[test]
    fn usb_filter_drops_other_disks_entirely() {
        let (d, rx) = dispatcher(FilterChain::new().with(Filter::UsbOnly));
        let sata = MemoryDisk::new("disk0")
            .with(DescriptionKey::DeviceProtocol, PropertyValue::String("SATA".into()));

        d.deliver(Appeared, &sata);
        d.deliver(DescriptionChanged, &sata.clone().mounted_at(Some("/")));
        d.deliver(Appeared, &usb("disk4"));

        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind(), K::Appeared);
        assert_eq!(events[0].disk().bsd_name, "disk4");
        // Rejected disks never enter the mount-state set.
        assert!(!d.tracks_mounted("disk0"));
    }

    #[test]
    fn unnamed_and_unreadable_disks_are_dropped() {
        let (d, rx) = dispatcher(FilterChain::new());
        d.deliver(Appeared, &MemoryDisk::unnamed());

        let broken = MemoryDisk::new("disk7")
            .with(DescriptionKey::MediaSize, PropertyValue::Fault("gone".into()));
        d.deliver(Appeared, &broken);
        assert_eq!(broken.releases(), 1);

        assert!(kinds(&rx).is_empty());
    }

    #[test]
    fn missing_description_still_reaches_listener() {
        let (d, rx) = dispatcher(FilterChain::new());
        d.deliver(Appeared, &MemoryDisk::new("disk8").without_description());
        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!(events, [DiskEvent::Appeared(DiskInfo::new("disk8"))]);
    }

    #[test]
    fn listener_panic_is_contained() {
        struct Fragile {
            seen: crossbeam_channel::Sender<String>,
        }
        impl DiskEventListener for Fragile {
            fn on_disk_appeared(&mut self, disk: &DiskInfo) {
                if disk.bsd_name == "disk9" {
                    panic!("boom");
                }
                let _ = self.seen.send(disk.bsd_name.clone());
            }
            fn on_disk_mounted(&mut self, _disk: &DiskInfo) {
                panic!("mount handler failed");
            }
            fn on_disk_description_changed(&mut self, disk: &DiskInfo) {
                let _ = self.seen.send(format!("changed {}", disk.bsd_name));
            }
        }

        let (tx, rx) = crossbeam_channel::unbounded();
        let d = Dispatcher::new(Box::new(Fragile { seen: tx }), FilterChain::new());

        d.deliver(Appeared, &MemoryDisk::new("disk9"));
        d.deliver(Appeared, &MemoryDisk::new("disk10"));
        // The mount is recorded before the listener panics; the trailing
        // description change of the same raw event is skipped.
        let mounted = MemoryDisk::new("disk10").mounted_at(Some("/Volumes/Z"));
        d.deliver(DescriptionChanged, &mounted);
        d.deliver(DescriptionChanged, &mounted);

        let seen: Vec<_> = rx.try_iter().collect();
        assert_eq!(seen, ["disk10", "changed disk10"]);
        assert!(d.tracks_mounted("disk10"));
    }

    #[test]
    fn panic_message_handles_both_payload_types() {
        let s: Box<dyn Any + Send> = Box::new("static");
        let owned: Box<dyn Any + Send> = Box::new(String::from("owned"));
        let other: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(s.as_ref()), "static");
        assert_eq!(panic_message(owned.as_ref()), "owned");
        assert_eq!(panic_message(other.as_ref()), "<non-string panic payload>");
    }
}
