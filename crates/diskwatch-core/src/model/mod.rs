//! Data model for disk snapshots and the events that carry them.
pub mod disk_info;
pub mod event;
pub mod size;

pub use disk_info::{BusInfo, DeviceInfo, DiskInfo, MediaInfo, VolumeInfo};
pub use event::{DiskEvent, DiskEventKind};
