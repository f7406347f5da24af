//! In-memory disk subsystem.
//!
//! [`MemoryArbitration`] behaves like DiskArbitration as far as the watcher
//! can tell: callbacks only fire for sessions scheduled on the running loop,
//! every call is made from the run-loop thread, and a stopped loop makes
//! `run` return. Disk events are raised through a shared bus and queue up
//! until a loop picks them up.
//!
//! Every native call is journalled together with the calling thread, and
//! individual steps can be made to fail, so lifecycle and teardown ordering
//! can be checked without real hardware.
use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, ThreadId};
use tracing::debug;

use super::{
    CallbackKind, DescriptionKey, DiskArbitration, DiskHandle, PropertyBag, RawCallback, RunLoop,
};
use crate::error::{NativeError, PropertyError};

// ─── Disks and descriptions ─────────────────────────────────────────────────

/// A typed value stored in a [`MemoryDisk`] description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyValue {
    String(String),
    Bool(bool),
    Number(i64),
    Uuid(String),
    /// A file URL, read back through [`PropertyBag::path_from_url`].
    Url(PathBuf),
    /// An icon dictionary holding only its `CFBundleIdentifier`.
    Icon(String),
    /// A value whose read fails outright.
    Fault(String),
}

/// A simulated disk object.
#[derive(Debug, Clone)]
pub struct MemoryDisk {
    bsd_name: Option<String>,
    description: Option<Arc<BTreeMap<DescriptionKey, PropertyValue>>>,
    copies: Arc<AtomicUsize>,
    releases: Arc<AtomicUsize>,
}

impl MemoryDisk {
    /// A disk with a BSD name and an empty description.
    pub fn new(bsd_name: impl Into<String>) -> Self {
        Self {
            bsd_name: Some(bsd_name.into()),
            description: Some(Arc::new(BTreeMap::new())),
            copies: Arc::new(AtomicUsize::new(0)),
            releases: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// A disk whose BSD name cannot be read.
    pub fn unnamed() -> Self {
        Self {
            bsd_name: None,
            ..Self::new("")
        }
    }

    /// Make [`DiskHandle::copy_description`] return `None`.
    pub fn without_description(mut self) -> Self {
        self.description = None;
        self
    }

    /// Set one description value. Later copies see it; earlier ones do not.
    pub fn with(mut self, key: DescriptionKey, value: PropertyValue) -> Self {
        let mut values = self
            .description
            .as_deref()
            .cloned()
            .unwrap_or_default();
        values.insert(key, value);
        self.description = Some(Arc::new(values));
        self
    }

    /// Remove one description value.
    pub fn without(mut self, key: DescriptionKey) -> Self {
        if let Some(values) = self.description.as_deref() {
            let mut values = values.clone();
            values.remove(&key);
            self.description = Some(Arc::new(values));
        }
        self
    }

    /// Shorthand for setting or clearing the volume mount point.
    pub fn mounted_at(self, path: Option<&str>) -> Self {
        match path {
            Some(path) => self.with(DescriptionKey::VolumePath, PropertyValue::Url(path.into())),
            None => self.without(DescriptionKey::VolumePath),
        }
    }

    /// Number of description copies handed out so far.
    pub fn copies(&self) -> usize {
        self.copies.load(Ordering::SeqCst)
    }

    /// Number of description copies released so far.
    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }
}

impl DiskHandle for MemoryDisk {
    type Description = MemoryDescription;

    fn bsd_name(&self) -> Option<String> {
        self.bsd_name.clone()
    }

    fn copy_description(&self) -> Option<MemoryDescription> {
        let values = Arc::clone(self.description.as_ref()?);
        self.copies.fetch_add(1, Ordering::SeqCst);
        Some(MemoryDescription {
            values,
            releases: Arc::clone(&self.releases),
        })
    }
}

/// An owned description copy. Dropping it counts as a release.
#[derive(Debug)]
pub struct MemoryDescription {
    values: Arc<BTreeMap<DescriptionKey, PropertyValue>>,
    releases: Arc<AtomicUsize>,
}

impl Drop for MemoryDescription {
    fn drop(&mut self) {
        self.releases.fetch_add(1, Ordering::SeqCst);
    }
}

impl MemoryDescription {
    fn read<T>(
        &self,
        key: DescriptionKey,
        expected: &str,
        convert: impl FnOnce(&PropertyValue) -> Option<T>,
    ) -> Result<Option<T>, PropertyError> {
        match self.values.get(&key) {
            None => Ok(None),
            Some(PropertyValue::Fault(reason)) => Err(PropertyError::Unreadable {
                key,
                reason: reason.clone(),
            }),
            Some(value) => {
                let converted = convert(value);
                if converted.is_none() {
                    debug!("{key} holds {value:?}, expected {expected}");
                }
                Ok(converted)
            }
        }
    }
}

impl PropertyBag for MemoryDescription {
    fn string(&self, key: DescriptionKey) -> Result<Option<String>, PropertyError> {
        self.read(key, "a string", |v| match v {
            PropertyValue::String(s) => Some(s.clone()),
            _ => None,
        })
    }

    fn boolean(&self, key: DescriptionKey) -> Result<Option<bool>, PropertyError> {
        self.read(key, "a boolean", |v| match v {
            PropertyValue::Bool(b) => Some(*b),
            _ => None,
        })
    }

    fn int32(&self, key: DescriptionKey) -> Result<Option<i32>, PropertyError> {
        self.read(key, "a 32-bit number", |v| match v {
            PropertyValue::Number(n) => i32::try_from(*n).ok(),
            _ => None,
        })
    }

    fn int64(&self, key: DescriptionKey) -> Result<Option<i64>, PropertyError> {
        self.read(key, "a number", |v| match v {
            PropertyValue::Number(n) => Some(*n),
            _ => None,
        })
    }

    fn uuid_string(&self, key: DescriptionKey) -> Result<Option<String>, PropertyError> {
        self.read(key, "a UUID", |v| match v {
            PropertyValue::Uuid(s) => Some(s.clone()),
            _ => None,
        })
    }

    fn path_from_url(&self, key: DescriptionKey) -> Result<Option<PathBuf>, PropertyError> {
        self.read(key, "a file URL", |v| match v {
            PropertyValue::Url(p) => Some(p.clone()),
            _ => None,
        })
    }

    fn bundle_identifier(&self, key: DescriptionKey) -> Result<Option<String>, PropertyError> {
        self.read(key, "an icon dictionary", |v| match v {
            PropertyValue::Icon(id) => Some(id.clone()),
            _ => None,
        })
    }
}

// ─── Sessions and run loops ─────────────────────────────────────────────────

/// A journalled native call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeCall {
    CreateSession,
    CurrentRunLoop,
    Register(CallbackKind),
    Schedule,
    Run,
    Unregister(CallbackKind),
    Unschedule,
    Release,
}

/// Steps that should fail on their next invocations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Faults {
    pub create_session: bool,
    pub register: Option<CallbackKind>,
    pub schedule: bool,
    pub unregister: Option<CallbackKind>,
    pub unschedule: bool,
    pub release: bool,
}

enum BusMessage {
    Event(CallbackKind, MemoryDisk),
    Stop(u64),
}

struct Inner {
    bus_tx: Sender<BusMessage>,
    bus_rx: Receiver<BusMessage>,
    journal: Mutex<Vec<(NativeCall, ThreadId)>>,
    faults: Mutex<Faults>,
    next_id: AtomicU64,
    live_sessions: AtomicUsize,
    live_registrations: AtomicUsize,
}

/// In-memory disk subsystem. Clones share the same bus and journal.
#[derive(Clone)]
pub struct MemoryArbitration {
    inner: Arc<Inner>,
}

impl Default for MemoryArbitration {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryArbitration {
    pub fn new() -> Self {
        let (bus_tx, bus_rx) = unbounded();
        Self {
            inner: Arc::new(Inner {
                bus_tx,
                bus_rx,
                journal: Mutex::new(Vec::new()),
                faults: Mutex::new(Faults::default()),
                next_id: AtomicU64::new(1),
                live_sessions: AtomicUsize::new(0),
                live_registrations: AtomicUsize::new(0),
            }),
        }
    }

    /// Replace the fault plan.
    pub fn set_faults(&self, faults: Faults) {
        *self.inner.faults.lock() = faults;
    }

    /// Queue a raw event for the next running loop.
    pub fn raise(&self, kind: CallbackKind, disk: MemoryDisk) {
        let _ = self.inner.bus_tx.send(BusMessage::Event(kind, disk));
    }

    pub fn disk_appeared(&self, disk: MemoryDisk) {
        self.raise(CallbackKind::Appeared, disk);
    }

    pub fn disk_disappeared(&self, disk: MemoryDisk) {
        self.raise(CallbackKind::Disappeared, disk);
    }

    pub fn description_changed(&self, disk: MemoryDisk) {
        self.raise(CallbackKind::DescriptionChanged, disk);
    }

    /// Every native call so far, in order.
    pub fn calls(&self) -> Vec<NativeCall> {
        self.inner.journal.lock().iter().map(|(call, _)| *call).collect()
    }

    /// The thread each journalled call was made from.
    pub fn call_threads(&self) -> Vec<ThreadId> {
        self.inner.journal.lock().iter().map(|(_, t)| *t).collect()
    }

    /// Sessions created and not yet released.
    pub fn live_sessions(&self) -> usize {
        self.inner.live_sessions.load(Ordering::SeqCst)
    }

    /// Callbacks registered and not yet unregistered.
    pub fn live_registrations(&self) -> usize {
        self.inner.live_registrations.load(Ordering::SeqCst)
    }

    fn record(&self, call: NativeCall) {
        self.inner
            .journal
            .lock()
            .push((call, thread::current().id()));
    }

    fn next_id(&self) -> u64 {
        self.inner.next_id.fetch_add(1, Ordering::Relaxed)
    }
}

type Registered = (u64, CallbackKind, RawCallback<MemoryDisk>);

struct SessionState {
    callbacks: Mutex<Vec<Registered>>,
}

/// A session on the in-memory bus.
pub struct MemorySession {
    state: Arc<SessionState>,
}

/// Proof of one callback registration.
pub struct MemoryRegistration {
    id: u64,
    kind: CallbackKind,
}

/// A run loop on the in-memory bus.
#[derive(Clone)]
pub struct MemoryRunLoop {
    id: u64,
    tx: Sender<BusMessage>,
    scheduled: Arc<Mutex<Vec<Arc<SessionState>>>>,
}

impl RunLoop for MemoryRunLoop {
    fn stop(&self) {
        let _ = self.tx.send(BusMessage::Stop(self.id));
    }
}

impl DiskArbitration for MemoryArbitration {
    type Disk = MemoryDisk;
    type Session = MemorySession;
    type RunLoop = MemoryRunLoop;
    type Registration = MemoryRegistration;

    fn create_session(&self) -> Result<MemorySession, NativeError> {
        self.record(NativeCall::CreateSession);
        if self.inner.faults.lock().create_session {
            return Err(NativeError::SessionUnavailable);
        }
        self.inner.live_sessions.fetch_add(1, Ordering::SeqCst);
        Ok(MemorySession {
            state: Arc::new(SessionState {
                callbacks: Mutex::new(Vec::new()),
            }),
        })
    }

    fn current_run_loop(&self) -> MemoryRunLoop {
        self.record(NativeCall::CurrentRunLoop);
        MemoryRunLoop {
            id: self.next_id(),
            tx: self.inner.bus_tx.clone(),
            scheduled: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn register_callback(
        &self,
        session: &MemorySession,
        kind: CallbackKind,
        callback: RawCallback<MemoryDisk>,
    ) -> Result<MemoryRegistration, NativeError> {
        self.record(NativeCall::Register(kind));
        if self.inner.faults.lock().register == Some(kind) {
            return Err(NativeError::Register(kind));
        }
        let id = self.next_id();
        session.state.callbacks.lock().push((id, kind, callback));
        self.inner.live_registrations.fetch_add(1, Ordering::SeqCst);
        Ok(MemoryRegistration { id, kind })
    }

    fn unregister_callback(
        &self,
        session: &MemorySession,
        registration: MemoryRegistration,
    ) -> Result<(), NativeError> {
        self.record(NativeCall::Unregister(registration.kind));
        if self.inner.faults.lock().unregister == Some(registration.kind) {
            return Err(NativeError::Unregister(registration.kind));
        }
        session
            .state
            .callbacks
            .lock()
            .retain(|(id, _, _)| *id != registration.id);
        self.inner.live_registrations.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }

    fn schedule(
        &self,
        session: &MemorySession,
        run_loop: &MemoryRunLoop,
    ) -> Result<(), NativeError> {
        self.record(NativeCall::Schedule);
        if self.inner.faults.lock().schedule {
            return Err(NativeError::Schedule);
        }
        run_loop.scheduled.lock().push(Arc::clone(&session.state));
        Ok(())
    }

    fn unschedule(
        &self,
        session: &MemorySession,
        run_loop: &MemoryRunLoop,
    ) -> Result<(), NativeError> {
        self.record(NativeCall::Unschedule);
        if self.inner.faults.lock().unschedule {
            return Err(NativeError::Unschedule);
        }
        run_loop
            .scheduled
            .lock()
            .retain(|s| !Arc::ptr_eq(s, &session.state));
        Ok(())
    }

    fn release_session(&self, session: MemorySession) -> Result<(), NativeError> {
        self.record(NativeCall::Release);
        if self.inner.faults.lock().release {
            return Err(NativeError::Release);
        }
        drop(session);
        self.inner.live_sessions.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }

    fn run(&self, run_loop: &MemoryRunLoop) {
        self.record(NativeCall::Run);
        while let Ok(message) = self.inner.bus_rx.recv() {
            match message {
                BusMessage::Stop(id) if id == run_loop.id => break,
                // Left over from a loop that has already exited.
                BusMessage::Stop(_) => continue,
                BusMessage::Event(kind, disk) => {
                    let callbacks: Vec<RawCallback<MemoryDisk>> = run_loop
                        .scheduled
                        .lock()
                        .iter()
                        .flat_map(|session| {
                            session
                                .callbacks
                                .lock()
                                .iter()
                                .filter(|(_, k, _)| *k == kind)
                                .map(|(_, _, cb)| Arc::clone(cb))
                                .collect::<Vec<_>>()
                        })
                        .collect();
                    for callback in callbacks {
                        callback(&disk);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn description_copies_are_released_on_drop() {
        let disk = MemoryDisk::new("disk2");
        {
            let _a = disk.copy_description().unwrap();
            let _b = disk.copy_description().unwrap();
            assert_eq!(disk.copies(), 2);
            assert_eq!(disk.releases(), 0);
        }
        assert_eq!(disk.releases(), 2);
        assert!(disk.clone().without_description().copy_description().is_none());
    }

    #[test]
    fn getters_treat_type_mismatch_as_absent() {
        let disk = MemoryDisk::new("disk2")
            .with(DescriptionKey::VolumeName, PropertyValue::Number(7))
            .with(DescriptionKey::MediaSize, PropertyValue::Number(1 << 40))
            .with(DescriptionKey::MediaRemovable, PropertyValue::Bool(true));
        let bag = disk.copy_description().unwrap();

        assert_eq!(bag.string(DescriptionKey::VolumeName).unwrap(), None);
        assert_eq!(bag.int64(DescriptionKey::MediaSize).unwrap(), Some(1 << 40));
        // Too wide for 32 bits.
        assert_eq!(bag.int32(DescriptionKey::MediaSize).unwrap(), None);
        assert!(bag.flag(DescriptionKey::MediaRemovable).unwrap());
        assert!(!bag.flag(DescriptionKey::MediaWritable).unwrap());
        assert_eq!(bag.boolean(DescriptionKey::MediaWritable).unwrap(), None);
    }

    #[test]
    fn faulty_value_is_an_error() {
        let disk = MemoryDisk::new("disk2")
            .with(DescriptionKey::BusName, PropertyValue::Fault("gone".into()));
        let bag = disk.copy_description().unwrap();
        assert_eq!(
            bag.string(DescriptionKey::BusName),
            Err(PropertyError::Unreadable {
                key: DescriptionKey::BusName,
                reason: "gone".into()
            })
        );
    }

    #[test]
    fn callbacks_fire_only_for_scheduled_sessions() {
        let da = MemoryArbitration::new();
        let session = da.create_session().unwrap();
        let run_loop = da.current_run_loop();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let registration = da
            .register_callback(
                &session,
                CallbackKind::Appeared,
                Arc::new(move |_: &MemoryDisk| {
                    counter.fetch_add(1, Ordering::SeqCst);
                }),
            )
            .unwrap();

        // Not scheduled yet: the event is consumed without a callback.
        da.disk_appeared(MemoryDisk::new("disk3"));
        run_loop.stop();
        da.run(&run_loop);
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        da.schedule(&session, &run_loop).unwrap();
        da.disk_appeared(MemoryDisk::new("disk3"));
        da.disk_disappeared(MemoryDisk::new("disk3"));
        run_loop.stop();
        da.run(&run_loop);
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        da.unregister_callback(&session, registration).unwrap();
        da.unschedule(&session, &run_loop).unwrap();
        da.release_session(session).unwrap();
        assert_eq!(da.live_registrations(), 0);
        assert_eq!(da.live_sessions(), 0);
    }

    #[test]
    fn stale_stop_does_not_end_a_newer_loop() {
        let da = MemoryArbitration::new();
        let old = da.current_run_loop();
        let new = da.current_run_loop();
        old.stop();
        new.stop();
        // Returns on `new`'s stop, skipping the stale one.
        da.run(&new);
        assert!(da.calls().contains(&NativeCall::Run));
    }
}
