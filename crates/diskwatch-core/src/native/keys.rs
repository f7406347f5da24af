//! Property keys of a DiskArbitration disk description.
//!
//! The Rust side names every key by a [`DescriptionKey`] variant. Each native
//! backend decides how a variant is resolved; the macOS backend looks up the
//! framework constant named by [`DescriptionKey::symbol`].
use std::fmt;

/// One entry of the disk description dictionary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DescriptionKey {
    // Volume
    VolumePath,
    VolumeName,
    VolumeKind,
    VolumeUuid,
    VolumeMountable,
    VolumeNetwork,
    VolumeType,

    // Device
    DeviceProtocol,
    DeviceInternal,
    DeviceModel,
    DeviceVendor,
    DeviceRevision,
    DeviceUnit,
    DeviceGuid,
    DevicePath,
    DeviceTdmLocked,

    // Media
    MediaRemovable,
    MediaSize,
    MediaBlockSize,
    MediaWritable,
    MediaWhole,
    MediaEjectable,
    MediaLeaf,
    MediaType,
    MediaContent,
    MediaUuid,
    MediaBsdMajor,
    MediaBsdMinor,
    MediaBsdName,
    MediaBsdUnit,
    MediaIcon,
    MediaKind,
    MediaName,
    MediaPath,
    MediaEncrypted,
    MediaEncryptionDetail,

    // Bus
    BusName,
    BusPath,
}

impl DescriptionKey {
    /// Number of known keys.
    pub const COUNT: usize = 38;

    /// Every key, in declaration order. `ALL[k.index()] == k`.
    pub const ALL: [DescriptionKey; Self::COUNT] = [
        Self::VolumePath,
        Self::VolumeName,
        Self::VolumeKind,
        Self::VolumeUuid,
        Self::VolumeMountable,
        Self::VolumeNetwork,
        Self::VolumeType,
        Self::DeviceProtocol,
        Self::DeviceInternal,
        Self::DeviceModel,
        Self::DeviceVendor,
        Self::DeviceRevision,
        Self::DeviceUnit,
        Self::DeviceGuid,
        Self::DevicePath,
        Self::DeviceTdmLocked,
        Self::MediaRemovable,
        Self::MediaSize,
        Self::MediaBlockSize,
        Self::MediaWritable,
        Self::MediaWhole,
        Self::MediaEjectable,
        Self::MediaLeaf,
        Self::MediaType,
        Self::MediaContent,
        Self::MediaUuid,
        Self::MediaBsdMajor,
        Self::MediaBsdMinor,
        Self::MediaBsdName,
        Self::MediaBsdUnit,
        Self::MediaIcon,
        Self::MediaKind,
        Self::MediaName,
        Self::MediaPath,
        Self::MediaEncrypted,
        Self::MediaEncryptionDetail,
        Self::BusName,
        Self::BusPath,
    ];

    /// Position of this key in [`DescriptionKey::ALL`].
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Name of the framework constant, e.g. `kDADiskDescriptionVolumePathKey`.
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::VolumePath => "kDADiskDescriptionVolumePathKey",
            Self::VolumeName => "kDADiskDescriptionVolumeNameKey",
            Self::VolumeKind => "kDADiskDescriptionVolumeKindKey",
            Self::VolumeUuid => "kDADiskDescriptionVolumeUUIDKey",
            Self::VolumeMountable => "kDADiskDescriptionVolumeMountableKey",
            Self::VolumeNetwork => "kDADiskDescriptionVolumeNetworkKey",
            Self::VolumeType => "kDADiskDescriptionVolumeTypeKey",
            Self::DeviceProtocol => "kDADiskDescriptionDeviceProtocolKey",
            Self::DeviceInternal => "kDADiskDescriptionDeviceInternalKey",
            Self::DeviceModel => "kDADiskDescriptionDeviceModelKey",
            Self::DeviceVendor => "kDADiskDescriptionDeviceVendorKey",
            Self::DeviceRevision => "kDADiskDescriptionDeviceRevisionKey",
            Self::DeviceUnit => "kDADiskDescriptionDeviceUnitKey",
            Self::DeviceGuid => "kDADiskDescriptionDeviceGUIDKey",
            Self::DevicePath => "kDADiskDescriptionDevicePathKey",
            Self::DeviceTdmLocked => "kDADiskDescriptionDeviceTDMLockedKey",
            Self::MediaRemovable => "kDADiskDescriptionMediaRemovableKey",
            Self::MediaSize => "kDADiskDescriptionMediaSizeKey",
            Self::MediaBlockSize => "kDADiskDescriptionMediaBlockSizeKey",
            Self::MediaWritable => "kDADiskDescriptionMediaWritableKey",
            Self::MediaWhole => "kDADiskDescriptionMediaWholeKey",
            Self::MediaEjectable => "kDADiskDescriptionMediaEjectableKey",
            Self::MediaLeaf => "kDADiskDescriptionMediaLeafKey",
            Self::MediaType => "kDADiskDescriptionMediaTypeKey",
            Self::MediaContent => "kDADiskDescriptionMediaContentKey",
            Self::MediaUuid => "kDADiskDescriptionMediaUUIDKey",
            Self::MediaBsdMajor => "kDADiskDescriptionMediaBSDMajorKey",
            Self::MediaBsdMinor => "kDADiskDescriptionMediaBSDMinorKey",
            Self::MediaBsdName => "kDADiskDescriptionMediaBSDNameKey",
            Self::MediaBsdUnit => "kDADiskDescriptionMediaBSDUnitKey",
            Self::MediaIcon => "kDADiskDescriptionMediaIconKey",
            Self::MediaKind => "kDADiskDescriptionMediaKindKey",
            Self::MediaName => "kDADiskDescriptionMediaNameKey",
            Self::MediaPath => "kDADiskDescriptionMediaPathKey",
            Self::MediaEncrypted => "kDADiskDescriptionMediaEncryptedKey",
            Self::MediaEncryptionDetail => "kDADiskDescriptionMediaEncryptionDetailKey",
            Self::BusName => "kDADiskDescriptionBusNameKey",
            Self::BusPath => "kDADiskDescriptionBusPathKey",
        }
    }
}

impl fmt::Display for DescriptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn all_is_indexed_by_discriminant() {
        for (i, key) in DescriptionKey::ALL.iter().enumerate() {
            assert_eq!(key.index(), i, "{key} out of place");
        }
    }

    #[test]
    fn symbols_are_unique_framework_names() {
        let symbols: HashSet<_> = DescriptionKey::ALL.iter().map(|k| k.symbol()).collect();
        assert_eq!(symbols.len(), DescriptionKey::COUNT);
        assert!(symbols
            .iter()
            .all(|s| s.starts_with("kDADiskDescription") && s.ends_with("Key")));
        assert_eq!(
            DescriptionKey::MediaBsdMajor.to_string(),
            "kDADiskDescriptionMediaBSDMajorKey"
        );
    }
}
