//! Disk info mapper: turns a native disk handle into a [`DiskInfo`].
//!
//! One property read per known key, grouped the way the snapshot is. The
//! description copy is owned by [`map_disk`] and released by `Drop`, so it
//! goes away exactly once whether mapping succeeds, returns early through
//! `?`, or unwinds.
use crate::error::PropertyError;
use crate::model::{BusInfo, DeviceInfo, DiskInfo, MediaInfo, VolumeInfo};
use crate::native::{DescriptionKey as Key, DiskHandle, PropertyBag};

/// Map `disk` to a snapshot.
///
/// - `Ok(None)` when the disk has no BSD name; nothing can be attributed to it.
/// - A minimal snapshot when the description cannot be copied.
/// - `Err` when any property read fails. No partial snapshot is returned.
pub fn map_disk<D: DiskHandle>(disk: &D) -> Result<Option<DiskInfo>, PropertyError> {
    let Some(bsd_name) = disk.bsd_name() else {
        return Ok(None);
    };

    let Some(description) = disk.copy_description() else {
        return Ok(Some(DiskInfo::new(bsd_name)));
    };

    Ok(Some(DiskInfo {
        bsd_name,
        volume: volume_info(&description)?,
        device: device_info(&description)?,
        media: media_info(&description)?,
        bus: bus_info(&description)?,
    }))
}

fn volume_info(bag: &impl PropertyBag) -> Result<VolumeInfo, PropertyError> {
    Ok(VolumeInfo {
        path: bag.path_from_url(Key::VolumePath)?,
        name: bag.string(Key::VolumeName)?,
        kind: bag.string(Key::VolumeKind)?,
        uuid: bag.uuid_string(Key::VolumeUuid)?,
        mountable: bag.boolean(Key::VolumeMountable)?,
        network: bag.boolean(Key::VolumeNetwork)?,
        volume_type: bag.string(Key::VolumeType)?,
    })
}

fn device_info(bag: &impl PropertyBag) -> Result<DeviceInfo, PropertyError> {
    Ok(DeviceInfo {
        protocol: bag.string(Key::DeviceProtocol)?,
        model: bag.string(Key::DeviceModel)?,
        vendor: bag.string(Key::DeviceVendor)?,
        revision: bag.string(Key::DeviceRevision)?,
        unit: unsigned(bag.int64(Key::DeviceUnit)?),
        internal: bag.flag(Key::DeviceInternal)?,
        guid: bag.uuid_string(Key::DeviceGuid)?,
        path: bag.string(Key::DevicePath)?,
        tdm_locked: bag.boolean(Key::DeviceTdmLocked)?,
    })
}

fn media_info(bag: &impl PropertyBag) -> Result<MediaInfo, PropertyError> {
    Ok(MediaInfo {
        removable: bag.flag(Key::MediaRemovable)?,
        size: unsigned(bag.int64(Key::MediaSize)?),
        block_size: unsigned(bag.int64(Key::MediaBlockSize)?),
        writable: bag.flag(Key::MediaWritable)?,
        whole: bag.flag(Key::MediaWhole)?,
        ejectable: bag.flag(Key::MediaEjectable)?,
        leaf: bag.flag(Key::MediaLeaf)?,
        media_type: bag.string(Key::MediaType)?,
        content: bag.string(Key::MediaContent)?,
        uuid: bag.uuid_string(Key::MediaUuid)?,
        bsd_major: bag.int32(Key::MediaBsdMajor)?,
        bsd_minor: bag.int32(Key::MediaBsdMinor)?,
        bsd_name: bag.string(Key::MediaBsdName)?,
        bsd_unit: bag.int32(Key::MediaBsdUnit)?,
        icon: bag.bundle_identifier(Key::MediaIcon)?,
        kind: bag.string(Key::MediaKind)?,
        name: bag.string(Key::MediaName)?,
        path: bag.string(Key::MediaPath)?,
        encrypted: bag.boolean(Key::MediaEncrypted)?,
        encryption_detail: bag.int32(Key::MediaEncryptionDetail)?,
    })
}

fn bus_info(bag: &impl PropertyBag) -> Result<BusInfo, PropertyError> {
    Ok(BusInfo {
        name: bag.string(Key::BusName)?,
        path: bag.string(Key::BusPath)?,
    })
}

/// Sizes and unit numbers are never negative; treat a negative value as absent.
fn unsigned(value: Option<i64>) -> Option<u64> {
    value.and_then(|v| u64::try_from(v).ok())
}
