//! The native disk-subsystem seam.
//!
//! [`DiskArbitration`] is everything the watcher needs from the OS: a
//! session, three callback registrations, and a per-thread run loop that
//! delivers them. [`DiskHandle`] and [`PropertyBag`] are the read side used
//! by the mapper.
//!
//! Two backends ship with the crate:
//!
//! - [`macos::MacDiskArbitration`] : the real framework (macOS only).
//! - [`memory::MemoryArbitration`] : an in-process disk bus with the same
//!   session and run-loop contract, for tests and simulations.
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::{NativeError, PropertyError};

pub mod keys;
pub mod memory;

#[cfg(target_os = "macos")]
pub mod macos;

pub use keys::DescriptionKey;

/// The backend used by [`crate::DiskEventManager::build`].
#[cfg(target_os = "macos")]
pub type NativeArbitration = macos::MacDiskArbitration;

/// The three raw notifications the native subsystem raises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallbackKind {
    Appeared,
    Disappeared,
    DescriptionChanged,
}

impl CallbackKind {
    /// Registration order. Teardown unregisters in the same order.
    pub const ALL: [CallbackKind; 3] = [
        CallbackKind::Appeared,
        CallbackKind::Disappeared,
        CallbackKind::DescriptionChanged,
    ];
}

impl fmt::Display for CallbackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Appeared => "disk-appeared",
            Self::Disappeared => "disk-disappeared",
            Self::DescriptionChanged => "description-changed",
        })
    }
}

/// Callback invoked on the run-loop thread with the disk that changed.
pub type RawCallback<D> = Arc<dyn Fn(&D) + Send + Sync>;

/// Typed read access to a disk description.
///
/// Every getter checks the stored value's type. A missing key or a value of
/// another type reads as `Ok(None)`; `Err` means the bag itself is unusable.
/// The bag is released when dropped.
pub trait PropertyBag {
    fn string(&self, key: DescriptionKey) -> Result<Option<String>, PropertyError>;

    fn boolean(&self, key: DescriptionKey) -> Result<Option<bool>, PropertyError>;

    /// A boolean with no "unknown" state: missing reads as `false`.
    fn flag(&self, key: DescriptionKey) -> Result<bool, PropertyError> {
        Ok(self.boolean(key)?.unwrap_or(false))
    }

    fn int32(&self, key: DescriptionKey) -> Result<Option<i32>, PropertyError>;

    fn int64(&self, key: DescriptionKey) -> Result<Option<i64>, PropertyError>;

    /// A UUID value rendered in its canonical string form.
    fn uuid_string(&self, key: DescriptionKey) -> Result<Option<String>, PropertyError>;

    /// A file URL converted to a POSIX path.
    fn path_from_url(&self, key: DescriptionKey) -> Result<Option<PathBuf>, PropertyError>;

    /// The `CFBundleIdentifier` entry of a nested dictionary value.
    fn bundle_identifier(&self, key: DescriptionKey) -> Result<Option<String>, PropertyError>;
}

/// A native disk object as handed to a raw callback.
pub trait DiskHandle {
    type Description: PropertyBag;

    /// BSD device name, `None` for disks without a device node.
    fn bsd_name(&self) -> Option<String>;

    /// An independently owned copy of the disk's description.
    fn copy_description(&self) -> Option<Self::Description>;
}

/// A handle to a thread's run loop that any thread may stop.
pub trait RunLoop: Clone + Send + Sync + 'static {
    /// Make the loop's current `run` return. Safe to call repeatedly.
    fn stop(&self);
}

/// A native disk-notification subsystem.
///
/// Apart from [`RunLoop::stop`], every method is called on the watcher's
/// run-loop thread, in the order: `create_session`, `current_run_loop`,
/// `register_callback` (x3), `schedule`, `run`, `unregister_callback` (x3),
/// `unschedule`, `release_session`.
pub trait DiskArbitration: Send + Sync + 'static {
    type Disk: DiskHandle + 'static;
    type Session;
    type RunLoop: RunLoop;
    type Registration;

    fn create_session(&self) -> Result<Self::Session, NativeError>;

    /// The run loop of the calling thread.
    fn current_run_loop(&self) -> Self::RunLoop;

    /// Register `callback` for every disk. The registration owns the callback
    /// until it is handed back to [`DiskArbitration::unregister_callback`].
    fn register_callback(
        &self,
        session: &Self::Session,
        kind: CallbackKind,
        callback: RawCallback<Self::Disk>,
    ) -> Result<Self::Registration, NativeError>;

    fn unregister_callback(
        &self,
        session: &Self::Session,
        registration: Self::Registration,
    ) -> Result<(), NativeError>;

    /// Attach the session to `run_loop` in its default mode. Callbacks never
    /// fire for an unscheduled session.
    fn schedule(&self, session: &Self::Session, run_loop: &Self::RunLoop)
        -> Result<(), NativeError>;

    fn unschedule(
        &self,
        session: &Self::Session,
        run_loop: &Self::RunLoop,
    ) -> Result<(), NativeError>;

    fn release_session(&self, session: Self::Session) -> Result<(), NativeError>;

    /// Block running `run_loop` until [`RunLoop::stop`] is called.
    fn run(&self, run_loop: &Self::RunLoop);
}
