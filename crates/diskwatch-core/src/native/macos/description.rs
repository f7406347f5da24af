//! Typed reads from a `DADiskCopyDescription` dictionary.
use core_foundation::base::{CFType, TCFType};
use core_foundation::boolean::CFBoolean;
use core_foundation::dictionary::CFDictionary;
use core_foundation::number::CFNumber;
use core_foundation::string::CFString;
use core_foundation::url::CFURL;
use core_foundation::uuid::CFUUID;
use core_foundation_sys::base::{kCFAllocatorDefault, CFGetTypeID, CFTypeRef};
use core_foundation_sys::dictionary::{CFDictionaryGetTypeID, CFDictionaryRef};
use core_foundation_sys::string::CFStringRef;
use once_cell::sync::Lazy;
use std::os::raw::c_void;
use std::path::PathBuf;
use tracing::debug;

use super::ffi;
use crate::error::PropertyError;
use crate::native::{DescriptionKey, PropertyBag};

/// Framework key constants, indexed by [`DescriptionKey::index`].
struct KeyTable([CFStringRef; DescriptionKey::COUNT]);

// The constants are immutable CFStrings owned by the framework for the
// lifetime of the process.
unsafe impl Send for KeyTable {}
unsafe impl Sync for KeyTable {}

static KEYS: Lazy<KeyTable> =
    Lazy::new(|| KeyTable(DescriptionKey::ALL.map(|key| unsafe { resolve(key) })));

unsafe fn resolve(key: DescriptionKey) -> CFStringRef {
    use DescriptionKey::*;
    match key {
        VolumePath => ffi::kDADiskDescriptionVolumePathKey,
        VolumeName => ffi::kDADiskDescriptionVolumeNameKey,
        VolumeKind => ffi::kDADiskDescriptionVolumeKindKey,
        VolumeUuid => ffi::kDADiskDescriptionVolumeUUIDKey,
        VolumeMountable => ffi::kDADiskDescriptionVolumeMountableKey,
        VolumeNetwork => ffi::kDADiskDescriptionVolumeNetworkKey,
        VolumeType => ffi::kDADiskDescriptionVolumeTypeKey,
        DeviceProtocol => ffi::kDADiskDescriptionDeviceProtocolKey,
        DeviceInternal => ffi::kDADiskDescriptionDeviceInternalKey,
        DeviceModel => ffi::kDADiskDescriptionDeviceModelKey,
        DeviceVendor => ffi::kDADiskDescriptionDeviceVendorKey,
        DeviceRevision => ffi::kDADiskDescriptionDeviceRevisionKey,
        DeviceUnit => ffi::kDADiskDescriptionDeviceUnitKey,
        DeviceGuid => ffi::kDADiskDescriptionDeviceGUIDKey,
        DevicePath => ffi::kDADiskDescriptionDevicePathKey,
        DeviceTdmLocked => ffi::kDADiskDescriptionDeviceTDMLockedKey,
        MediaRemovable => ffi::kDADiskDescriptionMediaRemovableKey,
        MediaSize => ffi::kDADiskDescriptionMediaSizeKey,
        MediaBlockSize => ffi::kDADiskDescriptionMediaBlockSizeKey,
        MediaWritable => ffi::kDADiskDescriptionMediaWritableKey,
        MediaWhole => ffi::kDADiskDescriptionMediaWholeKey,
        MediaEjectable => ffi::kDADiskDescriptionMediaEjectableKey,
        MediaLeaf => ffi::kDADiskDescriptionMediaLeafKey,
        MediaType => ffi::kDADiskDescriptionMediaTypeKey,
        MediaContent => ffi::kDADiskDescriptionMediaContentKey,
        MediaUuid => ffi::kDADiskDescriptionMediaUUIDKey,
        MediaBsdMajor => ffi::kDADiskDescriptionMediaBSDMajorKey,
        MediaBsdMinor => ffi::kDADiskDescriptionMediaBSDMinorKey,
        MediaBsdName => ffi::kDADiskDescriptionMediaBSDNameKey,
        MediaBsdUnit => ffi::kDADiskDescriptionMediaBSDUnitKey,
        MediaIcon => ffi::kDADiskDescriptionMediaIconKey,
        MediaKind => ffi::kDADiskDescriptionMediaKindKey,
        MediaName => ffi::kDADiskDescriptionMediaNameKey,
        MediaPath => ffi::kDADiskDescriptionMediaPathKey,
        MediaEncrypted => ffi::kDADiskDescriptionMediaEncryptedKey,
        MediaEncryptionDetail => ffi::kDADiskDescriptionMediaEncryptionDetailKey,
        BusName => ffi::kDADiskDescriptionBusNameKey,
        BusPath => ffi::kDADiskDescriptionBusPathKey,
    }
}

fn key_ref(key: DescriptionKey) -> CFStringRef {
    KEYS.0[key.index()]
}

/// An owned disk description. Released when dropped.
pub struct CfDescription {
    dict: CFDictionary,
}

impl CfDescription {
    /// Take ownership of a dictionary returned by a `Copy` function.
    ///
    /// # Safety
    /// `dict` must be a valid, non-null `CFDictionaryRef` the caller owns.
    pub(super) unsafe fn from_copy(dict: CFDictionaryRef) -> Self {
        Self {
            dict: CFDictionary::wrap_under_create_rule(dict),
        }
    }

    fn value(&self, key: DescriptionKey) -> Option<CFType> {
        let key = key_ref(key);
        if key.is_null() {
            return None;
        }
        self.dict
            .find(key as *const c_void)
            .map(|value| unsafe { CFType::wrap_under_get_rule(*value as CFTypeRef) })
    }

    fn typed<T>(
        &self,
        key: DescriptionKey,
        expected: &str,
        convert: impl FnOnce(&CFType) -> Option<T>,
    ) -> Option<T> {
        let value = self.value(key)?;
        let converted = convert(&value);
        if converted.is_none() {
            debug!("{key} is not {expected} (type id {})", value.type_of());
        }
        converted
    }
}

impl PropertyBag for CfDescription {
    fn string(&self, key: DescriptionKey) -> Result<Option<String>, PropertyError> {
        Ok(self.typed(key, "a CFString", |v| {
            v.downcast::<CFString>().map(|s| s.to_string())
        }))
    }

    fn boolean(&self, key: DescriptionKey) -> Result<Option<bool>, PropertyError> {
        Ok(self.typed(key, "a CFBoolean", |v| v.downcast::<CFBoolean>().map(bool::from)))
    }

    fn int32(&self, key: DescriptionKey) -> Result<Option<i32>, PropertyError> {
        Ok(self.typed(key, "a 32-bit CFNumber", |v| {
            v.downcast::<CFNumber>().and_then(|n| n.to_i32())
        }))
    }

    fn int64(&self, key: DescriptionKey) -> Result<Option<i64>, PropertyError> {
        Ok(self.typed(key, "a CFNumber", |v| {
            v.downcast::<CFNumber>().and_then(|n| n.to_i64())
        }))
    }

    fn uuid_string(&self, key: DescriptionKey) -> Result<Option<String>, PropertyError> {
        Ok(self.typed(key, "a CFUUID", |v| {
            let uuid = v.downcast::<CFUUID>()?;
            let string = unsafe {
                ffi::CFUUIDCreateString(kCFAllocatorDefault, uuid.as_concrete_TypeRef())
            };
            if string.is_null() {
                return None;
            }
            let string = unsafe { CFString::wrap_under_create_rule(string) };
            Some(string.to_string())
        }))
    }

    fn path_from_url(&self, key: DescriptionKey) -> Result<Option<PathBuf>, PropertyError> {
        Ok(self.typed(key, "a file CFURL", |v| {
            v.downcast::<CFURL>().and_then(|url| url.to_path())
        }))
    }

    fn bundle_identifier(&self, key: DescriptionKey) -> Result<Option<String>, PropertyError> {
        Ok(self.typed(key, "an icon CFDictionary", |v| {
            let raw = v.as_CFTypeRef();
            if unsafe { CFGetTypeID(raw) != CFDictionaryGetTypeID() } {
                return None;
            }
            let icon: CFDictionary =
                unsafe { CFDictionary::wrap_under_get_rule(raw as CFDictionaryRef) };
            let bundle_key = CFString::from_static_string("CFBundleIdentifier");
            let id = icon.find(bundle_key.as_concrete_TypeRef() as *const c_void)?;
            let id = unsafe { CFType::wrap_under_get_rule(*id as CFTypeRef) };
            id.downcast::<CFString>().map(|s| s.to_string())
        }))
    }
}
