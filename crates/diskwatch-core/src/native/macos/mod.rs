//! DiskArbitration.framework backend.
//!
//! Sessions, registrations and disks are thin wrappers over the framework's
//! references. All of them are created and destroyed on the watcher's
//! run-loop thread; only [`MacRunLoop`] crosses threads, because
//! `CFRunLoopStop` may be called from anywhere.
use core_foundation::base::TCFType;
use core_foundation::runloop::{kCFRunLoopDefaultMode, CFRunLoop};
use core_foundation_sys::array::CFArrayRef;
use core_foundation_sys::base::{kCFAllocatorDefault, CFRelease};
use std::ffi::CStr;
use std::os::raw::c_void;
use std::ptr;

mod description;
mod ffi;

pub use description::CfDescription;

use super::{CallbackKind, DiskArbitration, DiskHandle, RawCallback, RunLoop};
use crate::error::NativeError;

/// The DiskArbitration framework.
#[derive(Debug, Default, Clone, Copy)]
pub struct MacDiskArbitration;

/// A disk passed to a callback. Borrowed from the framework for the duration
/// of the call.
pub struct MacDisk(ffi::DADiskRef);

impl DiskHandle for MacDisk {
    type Description = CfDescription;

    fn bsd_name(&self) -> Option<String> {
        let name = unsafe { ffi::DADiskGetBSDName(self.0) };
        if name.is_null() {
            return None;
        }
        let name = unsafe { CStr::from_ptr(name) };
        Some(name.to_string_lossy().into_owned())
    }

    fn copy_description(&self) -> Option<CfDescription> {
        let dict = unsafe { ffi::DADiskCopyDescription(self.0) };
        if dict.is_null() {
            return None;
        }
        Some(unsafe { CfDescription::from_copy(dict) })
    }
}

/// An owned `DASessionRef`, released on drop.
pub struct MacSession(ffi::DASessionRef);

impl Drop for MacSession {
    fn drop(&mut self) {
        unsafe { CFRelease(self.0 as *const c_void) };
    }
}

/// The run loop of the thread that created it.
#[derive(Clone)]
pub struct MacRunLoop(CFRunLoop);

// CFRunLoop is thread-safe for stop/wake-up; the watcher never runs it from
// any thread but its own.
unsafe impl Send for MacRunLoop {}
unsafe impl Sync for MacRunLoop {}

impl RunLoop for MacRunLoop {
    fn stop(&self) {
        self.0.stop();
    }
}

/// A live callback registration. Owns the boxed callback passed as context.
pub struct MacRegistration {
    kind: CallbackKind,
    function: *mut c_void,
    context: *mut RawCallback<MacDisk>,
}

extern "C" fn disk_appeared(disk: ffi::DADiskRef, context: *mut c_void) {
    deliver(disk, context);
}

extern "C" fn disk_disappeared(disk: ffi::DADiskRef, context: *mut c_void) {
    deliver(disk, context);
}

extern "C" fn disk_description_changed(
    disk: ffi::DADiskRef,
    _keys: CFArrayRef,
    context: *mut c_void,
) {
    deliver(disk, context);
}

fn deliver(disk: ffi::DADiskRef, context: *mut c_void) {
    if disk.is_null() || context.is_null() {
        return;
    }
    // The context outlives the registration; see `unregister_callback`.
    let callback = unsafe { &*(context as *const RawCallback<MacDisk>) };
    callback(&MacDisk(disk));
}

impl DiskArbitration for MacDiskArbitration {
    type Disk = MacDisk;
    type Session = MacSession;
    type RunLoop = MacRunLoop;
    type Registration = MacRegistration;

    fn create_session(&self) -> Result<MacSession, NativeError> {
        let session = unsafe { ffi::DASessionCreate(kCFAllocatorDefault) };
        if session.is_null() {
            return Err(NativeError::SessionUnavailable);
        }
        Ok(MacSession(session))
    }

    fn current_run_loop(&self) -> MacRunLoop {
        MacRunLoop(CFRunLoop::get_current())
    }

    fn register_callback(
        &self,
        session: &MacSession,
        kind: CallbackKind,
        callback: RawCallback<MacDisk>,
    ) -> Result<MacRegistration, NativeError> {
        let context = Box::into_raw(Box::new(callback));
        let function = unsafe {
            match kind {
                CallbackKind::Appeared => {
                    ffi::DARegisterDiskAppearedCallback(
                        session.0,
                        ptr::null(),
                        disk_appeared,
                        context as *mut c_void,
                    );
                    disk_appeared as *mut c_void
                }
                CallbackKind::Disappeared => {
                    ffi::DARegisterDiskDisappearedCallback(
                        session.0,
                        ptr::null(),
                        disk_disappeared,
                        context as *mut c_void,
                    );
                    disk_disappeared as *mut c_void
                }
                CallbackKind::DescriptionChanged => {
                    ffi::DARegisterDiskDescriptionChangedCallback(
                        session.0,
                        ptr::null(),
                        ptr::null(),
                        disk_description_changed,
                        context as *mut c_void,
                    );
                    disk_description_changed as *mut c_void
                }
            }
        };
        Ok(MacRegistration {
            kind,
            function,
            context,
        })
    }

    fn unregister_callback(
        &self,
        session: &MacSession,
        registration: MacRegistration,
    ) -> Result<(), NativeError> {
        unsafe {
            ffi::DAUnregisterCallback(
                session.0,
                registration.function,
                registration.context as *mut c_void,
            );
            // The framework no longer holds the context.
            drop(Box::from_raw(registration.context));
        }
        tracing::trace!("unregistered {} callback", registration.kind);
        Ok(())
    }

    fn schedule(&self, session: &MacSession, run_loop: &MacRunLoop) -> Result<(), NativeError> {
        unsafe {
            ffi::DASessionScheduleWithRunLoop(
                session.0,
                run_loop.0.as_concrete_TypeRef(),
                kCFRunLoopDefaultMode,
            );
        }
        Ok(())
    }

    fn unschedule(&self, session: &MacSession, run_loop: &MacRunLoop) -> Result<(), NativeError> {
        unsafe {
            ffi::DASessionUnscheduleFromRunLoop(
                session.0,
                run_loop.0.as_concrete_TypeRef(),
                kCFRunLoopDefaultMode,
            );
        }
        Ok(())
    }

    fn release_session(&self, session: MacSession) -> Result<(), NativeError> {
        drop(session);
        Ok(())
    }

    fn run(&self, _run_loop: &MacRunLoop) {
        CFRunLoop::run_current();
    }
}
