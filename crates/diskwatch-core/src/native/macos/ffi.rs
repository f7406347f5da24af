//! Raw bindings to the parts of DiskArbitration.framework the watcher uses.
#![allow(non_upper_case_globals, non_snake_case, non_camel_case_types)]

use core_foundation_sys::array::CFArrayRef;
use core_foundation_sys::base::CFAllocatorRef;
use core_foundation_sys::dictionary::CFDictionaryRef;
use core_foundation_sys::runloop::CFRunLoopRef;
use core_foundation_sys::string::CFStringRef;
use core_foundation_sys::uuid::CFUUIDRef;
use std::os::raw::{c_char, c_void};

#[repr(C)]
pub struct __DASession {
    _private: [u8; 0],
}
pub type DASessionRef = *mut __DASession;

#[repr(C)]
pub struct __DADisk {
    _private: [u8; 0],
}
pub type DADiskRef = *mut __DADisk;

pub type DADiskAppearedCallback = extern "C" fn(disk: DADiskRef, context: *mut c_void);
pub type DADiskDisappearedCallback = extern "C" fn(disk: DADiskRef, context: *mut c_void);
pub type DADiskDescriptionChangedCallback =
    extern "C" fn(disk: DADiskRef, keys: CFArrayRef, context: *mut c_void);

#[link(name = "DiskArbitration", kind = "framework")]
extern "C" {
    pub fn DASessionCreate(allocator: CFAllocatorRef) -> DASessionRef;

    pub fn DASessionScheduleWithRunLoop(
        session: DASessionRef,
        runLoop: CFRunLoopRef,
        runLoopMode: CFStringRef,
    );
    pub fn DASessionUnscheduleFromRunLoop(
        session: DASessionRef,
        runLoop: CFRunLoopRef,
        runLoopMode: CFStringRef,
    );

    pub fn DARegisterDiskAppearedCallback(
        session: DASessionRef,
        match_: CFDictionaryRef,
        callback: DADiskAppearedCallback,
        context: *mut c_void,
    );
    pub fn DARegisterDiskDisappearedCallback(
        session: DASessionRef,
        match_: CFDictionaryRef,
        callback: DADiskDisappearedCallback,
        context: *mut c_void,
    );
    pub fn DARegisterDiskDescriptionChangedCallback(
        session: DASessionRef,
        match_: CFDictionaryRef,
        watch: CFArrayRef,
        callback: DADiskDescriptionChangedCallback,
        context: *mut c_void,
    );
    pub fn DAUnregisterCallback(session: DASessionRef, callback: *mut c_void, context: *mut c_void);

    pub fn DADiskGetBSDName(disk: DADiskRef) -> *const c_char;
    pub fn DADiskCopyDescription(disk: DADiskRef) -> CFDictionaryRef;

    pub static kDADiskDescriptionVolumePathKey: CFStringRef;
    pub static kDADiskDescriptionVolumeNameKey: CFStringRef;
    pub static kDADiskDescriptionVolumeKindKey: CFStringRef;
    pub static kDADiskDescriptionVolumeUUIDKey: CFStringRef;
    pub static kDADiskDescriptionVolumeMountableKey: CFStringRef;
    pub static kDADiskDescriptionVolumeNetworkKey: CFStringRef;
    pub static kDADiskDescriptionVolumeTypeKey: CFStringRef;

    pub static kDADiskDescriptionDeviceProtocolKey: CFStringRef;
    pub static kDADiskDescriptionDeviceInternalKey: CFStringRef;
    pub static kDADiskDescriptionDeviceModelKey: CFStringRef;
    pub static kDADiskDescriptionDeviceVendorKey: CFStringRef;
    pub static kDADiskDescriptionDeviceRevisionKey: CFStringRef;
    pub static kDADiskDescriptionDeviceUnitKey: CFStringRef;
    pub static kDADiskDescriptionDeviceGUIDKey: CFStringRef;
    pub static kDADiskDescriptionDevicePathKey: CFStringRef;
    pub static kDADiskDescriptionDeviceTDMLockedKey: CFStringRef;

    pub static kDADiskDescriptionMediaRemovableKey: CFStringRef;
    pub static kDADiskDescriptionMediaSizeKey: CFStringRef;
    pub static kDADiskDescriptionMediaBlockSizeKey: CFStringRef;
    pub static kDADiskDescriptionMediaWritableKey: CFStringRef;
    pub static kDADiskDescriptionMediaWholeKey: CFStringRef;
    pub static kDADiskDescriptionMediaEjectableKey: CFStringRef;
    pub static kDADiskDescriptionMediaLeafKey: CFStringRef;
    pub static kDADiskDescriptionMediaTypeKey: CFStringRef;
    pub static kDADiskDescriptionMediaContentKey: CFStringRef;
    pub static kDADiskDescriptionMediaUUIDKey: CFStringRef;
    pub static kDADiskDescriptionMediaBSDMajorKey: CFStringRef;
    pub static kDADiskDescriptionMediaBSDMinorKey: CFStringRef;
    pub static kDADiskDescriptionMediaBSDNameKey: CFStringRef;
    pub static kDADiskDescriptionMediaBSDUnitKey: CFStringRef;
    pub static kDADiskDescriptionMediaIconKey: CFStringRef;
    pub static kDADiskDescriptionMediaKindKey: CFStringRef;
    pub static kDADiskDescriptionMediaNameKey: CFStringRef;
    pub static kDADiskDescriptionMediaPathKey: CFStringRef;
    pub static kDADiskDescriptionMediaEncryptedKey: CFStringRef;
    pub static kDADiskDescriptionMediaEncryptionDetailKey: CFStringRef;

    pub static kDADiskDescriptionBusNameKey: CFStringRef;
    pub static kDADiskDescriptionBusPathKey: CFStringRef;
}

#[link(name = "CoreFoundation", kind = "framework")]
extern "C" {
    pub fn CFUUIDCreateString(alloc: CFAllocatorRef, uuid: CFUUIDRef) -> CFStringRef;
}
