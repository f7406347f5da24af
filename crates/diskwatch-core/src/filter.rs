//! Filter chain: which disks reach the listener.
//!
//! A chain is an ordered AND of predicates, evaluated with short-circuit.
//! An empty chain accepts every disk.
use std::fmt;

use crate::model::DiskInfo;

/// A predicate over a disk snapshot.
pub trait DiskFilter: Send + Sync {
    fn accepts(&self, disk: &DiskInfo) -> bool;
}

impl<F> DiskFilter for F
where
    F: Fn(&DiskInfo) -> bool + Send + Sync,
{
    fn accepts(&self, disk: &DiskInfo) -> bool {
        self(disk)
    }
}

/// Built-in filters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    /// Not an internal drive.
    ExternalOnly,
    /// Protocol is USB, case-insensitive.
    UsbOnly,
    RemovableOnly,
    EjectableOnly,
    WritableOnly,
    /// At least this many bytes. Disks of unknown size never match.
    MinSize(u64),
    /// At most this many bytes. Disks of unknown size never match.
    MaxSize(u64),
    /// Device protocol, case-insensitive (e.g. `"SATA"`).
    Protocol(String),
    /// Filesystem kind, case-insensitive (e.g. `"exfat"`, `"apfs"`).
    VolumeKind(String),
}

impl DiskFilter for Filter {
    fn accepts(&self, disk: &DiskInfo) -> bool {
        match self {
            Self::ExternalOnly => disk.is_external(),
            Self::UsbOnly => disk.is_usb(),
            Self::RemovableOnly => disk.media.removable,
            Self::EjectableOnly => disk.media.ejectable,
            Self::WritableOnly => disk.media.writable,
            Self::MinSize(min) => disk.media.size.is_some_and(|size| size >= *min),
            Self::MaxSize(max) => disk.media.size.is_some_and(|size| size <= *max),
            Self::Protocol(protocol) => disk.has_protocol(protocol),
            Self::VolumeKind(kind) => disk.has_volume_kind(kind),
        }
    }
}

/// Ordered set of filters. Immutable once handed to a watcher.
#[derive(Default)]
pub struct FilterChain {
    filters: Vec<Box<dyn DiskFilter>>,
}

impl FilterChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a filter.
    pub fn push(&mut self, filter: impl DiskFilter + 'static) {
        self.filters.push(Box::new(filter));
    }

    /// Builder-style [`FilterChain::push`].
    pub fn with(mut self, filter: impl DiskFilter + 'static) -> Self {
        self.push(filter);
        self
    }

    /// True iff every filter accepts `disk`.
    pub fn accepts(&self, disk: &DiskInfo) -> bool {
        self.filters.iter().all(|f| f.accepts(disk))
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

impl fmt::Debug for FilterChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterChain")
            .field("len", &self.filters.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn disk(protocol: &str, size: Option<u64>) -> DiskInfo {
        let mut info = DiskInfo::new("disk4");
        info.device.protocol = Some(protocol.into());
        info.media.size = size;
        info
    }

    #[test]
    fn empty_chain_accepts_everything() {
        let chain = FilterChain::new();
        assert!(chain.is_empty());
        assert!(chain.accepts(&DiskInfo::new("disk0")));
        assert!(chain.accepts(&disk("SATA", None)));
    }

    #[test]
    fn usb_filter_is_case_insensitive() {
        let chain = FilterChain::new().with(Filter::UsbOnly);
        assert!(!chain.accepts(&disk("SATA", None)));
        assert!(chain.accepts(&disk("usb", None)));
        assert!(chain.accepts(&disk("USB", None)));
        assert!(!chain.accepts(&DiskInfo::new("disk5")));
    }

    #[test]
    fn size_bounds_reject_unknown_size() {
        for filter in [Filter::MinSize(0), Filter::MaxSize(u64::MAX)] {
            assert!(!filter.accepts(&disk("USB", None)), "{filter:?}");
        }
        assert!(Filter::MinSize(1024).accepts(&disk("USB", Some(1024))));
        assert!(!Filter::MinSize(1025).accepts(&disk("USB", Some(1024))));
        assert!(Filter::MaxSize(1024).accepts(&disk("USB", Some(1024))));
        assert!(!Filter::MaxSize(1023).accepts(&disk("USB", Some(1024))));
    }

    #[test]
    fn flag_filters_follow_media_and_device_flags() {
        let mut info = DiskInfo::new("disk4");
        assert!(Filter::ExternalOnly.accepts(&info));
        assert!(!Filter::RemovableOnly.accepts(&info));
        assert!(!Filter::EjectableOnly.accepts(&info));
        assert!(!Filter::WritableOnly.accepts(&info));

        info.device.internal = true;
        info.media.removable = true;
        info.media.ejectable = true;
        info.media.writable = true;
        assert!(!Filter::ExternalOnly.accepts(&info));
        assert!(Filter::RemovableOnly.accepts(&info));
        assert!(Filter::EjectableOnly.accepts(&info));
        assert!(Filter::WritableOnly.accepts(&info));
    }

    #[test]
    fn protocol_and_volume_kind_ignore_case() {
        let mut info = disk("Thunderbolt", None);
        info.volume.kind = Some("APFS".into());
        assert!(Filter::Protocol("thunderbolt".into()).accepts(&info));
        assert!(!Filter::Protocol("usb".into()).accepts(&info));
        assert!(Filter::VolumeKind("apfs".into()).accepts(&info));
        assert!(!Filter::VolumeKind("exfat".into()).accepts(&info));
    }

    #[test]
    fn chain_rejects_if_any_filter_rejects() {
        let chain = FilterChain::new()
            .with(Filter::UsbOnly)
            .with(Filter::MinSize(1_000))
            .with(|d: &DiskInfo| d.bsd_name.starts_with("disk"));
        assert_eq!(chain.len(), 3);
        assert!(chain.accepts(&disk("USB", Some(2_000))));
        assert!(!chain.accepts(&disk("USB", Some(10))));
        assert!(!chain.accepts(&disk("SATA", Some(2_000))));
    }

    #[test]
    fn chain_short_circuits() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let chain = FilterChain::new()
            .with(Filter::UsbOnly)
            .with(move |_: &DiskInfo| {
                counter.fetch_add(1, Ordering::SeqCst);
                true
            });
        assert!(!chain.accepts(&disk("SATA", None)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(chain.accepts(&disk("USB", None)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
