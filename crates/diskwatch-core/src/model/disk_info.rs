//! Disk snapshot: one disk's volume, device, media and bus attributes at the
//! moment a native event was raised.
//!
//! Every optional attribute is `None` when DiskArbitration did not report
//! it. The handful of plain `bool` flags have no meaningful "unknown" state
//! and read as `false` when the key is missing.
use serde::Serialize;
use std::path::PathBuf;

use super::size;

/// Immutable description of a single disk or partition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiskInfo {
    /// BSD device name, e.g. `disk4` or `disk4s1`. Always present.
    pub bsd_name: String,
    pub volume: VolumeInfo,
    pub device: DeviceInfo,
    pub media: MediaInfo,
    pub bus: BusInfo,
}

/// Filesystem-level attributes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VolumeInfo {
    /// Mount point. `None` while the volume is not mounted.
    pub path: Option<PathBuf>,
    pub name: Option<String>,
    /// Filesystem kind, e.g. `apfs`, `msdos`, `exfat`.
    pub kind: Option<String>,
    pub uuid: Option<String>,
    pub mountable: Option<bool>,
    pub network: Option<bool>,
    pub volume_type: Option<String>,
}

/// Physical device attributes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeviceInfo {
    /// Transport protocol, e.g. `USB`, `SATA`, `PCI-Express`.
    pub protocol: Option<String>,
    pub model: Option<String>,
    pub vendor: Option<String>,
    pub revision: Option<String>,
    pub unit: Option<u64>,
    pub internal: bool,
    pub guid: Option<String>,
    pub path: Option<String>,
    pub tdm_locked: Option<bool>,
}

/// Media (IOMedia) attributes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MediaInfo {
    pub removable: bool,
    /// Size in bytes.
    pub size: Option<u64>,
    pub block_size: Option<u64>,
    pub writable: bool,
    /// True for the whole-disk node (`disk4`), false for slices (`disk4s1`).
    pub whole: bool,
    pub ejectable: bool,
    pub leaf: bool,
    pub media_type: Option<String>,
    /// Partition scheme or partition type, e.g. `GUID_partition_scheme`.
    pub content: Option<String>,
    pub uuid: Option<String>,
    pub bsd_major: Option<i32>,
    pub bsd_minor: Option<i32>,
    pub bsd_name: Option<String>,
    pub bsd_unit: Option<i32>,
    /// Bundle identifier of the media icon's owning kext.
    pub icon: Option<String>,
    pub kind: Option<String>,
    pub name: Option<String>,
    pub path: Option<String>,
    pub encrypted: Option<bool>,
    pub encryption_detail: Option<i32>,
}

/// Bus the device hangs off.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BusInfo {
    pub name: Option<String>,
    pub path: Option<String>,
}

impl DiskInfo {
    /// Minimal snapshot carrying only the BSD name.
    pub fn new(bsd_name: impl Into<String>) -> Self {
        Self {
            bsd_name: bsd_name.into(),
            volume: VolumeInfo::default(),
            device: DeviceInfo::default(),
            media: MediaInfo::default(),
            bus: BusInfo::default(),
        }
    }

    /// Not an internal drive.
    pub fn is_external(&self) -> bool {
        !self.device.internal
    }

    /// Attached over USB (case-insensitive protocol match).
    pub fn is_usb(&self) -> bool {
        self.has_protocol("USB")
    }

    /// True when the snapshot carries a mount point.
    pub fn is_mounted(&self) -> bool {
        self.volume.path.is_some()
    }

    /// Case-insensitive comparison against the device protocol.
    pub fn has_protocol(&self, protocol: &str) -> bool {
        self.device
            .protocol
            .as_deref()
            .is_some_and(|p| p.eq_ignore_ascii_case(protocol))
    }

    /// Case-insensitive comparison against the volume's filesystem kind.
    pub fn has_volume_kind(&self, kind: &str) -> bool {
        self.volume
            .kind
            .as_deref()
            .is_some_and(|k| k.eq_ignore_ascii_case(kind))
    }

    /// Media size as a human-readable string, `"Unknown"` when not reported.
    pub fn formatted_size(&self) -> String {
        size::format_optional_size(self.media.size)
    }
}
