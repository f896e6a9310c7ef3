// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory state for one run.

use parking_lot::Mutex;
use rig_adapters::TargetSession;
use rig_core::{ArtifactRecord, RunManifest};
use rig_profile::Profile;
use rig_storage::{EventStream, RunStorage, StorageError};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

/// Handle to a live collector worker: its stop signal and running flag.
///
/// `running == true` implies the stop signal is unset and the worker
/// task is alive. The handle stays in the map after a stop so the
/// collector can be restarted under the same name.
pub(crate) struct CollectorHandle {
    stop: watch::Sender<bool>,
    running: Arc<AtomicBool>,
}

impl CollectorHandle {
    pub(crate) fn new(stop: watch::Sender<bool>, running: Arc<AtomicBool>) -> Self {
        Self { stop, running }
    }

    /// Signal the worker to stop; does not wait for it to exit.
    fn signal_stop(&self) {
        let _ = self.stop.send(true);
        self.running.store(false, Ordering::SeqCst);
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

/// Context for an active (or reloaded) run.
///
/// Binds the run's storage, cached manifest, resolved profile, event
/// stream, optional target session, parameter map, and collector
/// handles. The manifest is persisted after every mutation.
pub struct RunContext {
    run_id: String,
    storage: RunStorage,
    profile: Profile,
    events: Arc<EventStream>,
    manifest: Mutex<RunManifest>,
    parameters: Mutex<HashMap<String, String>>,
    session: Mutex<Option<Arc<dyn TargetSession>>>,
    collectors: Mutex<HashMap<String, CollectorHandle>>,
    is_running: AtomicBool,
    is_paused: AtomicBool,
}

impl RunContext {
    pub(crate) fn new(
        run_id: impl Into<String>,
        storage: RunStorage,
        manifest: RunManifest,
        profile: Profile,
        events: Arc<EventStream>,
    ) -> Self {
        let parameters = manifest.parameters.clone();
        Self {
            run_id: run_id.into(),
            storage,
            profile,
            events,
            manifest: Mutex::new(manifest),
            parameters: Mutex::new(parameters),
            session: Mutex::new(None),
            collectors: Mutex::new(HashMap::new()),
            is_running: AtomicBool::new(false),
            is_paused: AtomicBool::new(false),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    pub fn storage(&self) -> &RunStorage {
        &self.storage
    }

    pub fn events(&self) -> &EventStream {
        &self.events
    }

    pub(crate) fn events_arc(&self) -> Arc<EventStream> {
        Arc::clone(&self.events)
    }

    /// Snapshot of the cached manifest.
    pub fn manifest(&self) -> RunManifest {
        self.manifest.lock().clone()
    }

    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::SeqCst)
    }

    pub fn is_paused(&self) -> bool {
        self.is_paused.load(Ordering::SeqCst)
    }

    pub(crate) fn set_running(&self, running: bool) {
        self.is_running.store(running, Ordering::SeqCst);
    }

    pub(crate) fn set_paused(&self, paused: bool) {
        self.is_paused.store(paused, Ordering::SeqCst);
    }

    /// Current parameter map.
    pub fn parameters(&self) -> HashMap<String, String> {
        self.parameters.lock().clone()
    }

    pub fn session(&self) -> Option<Arc<dyn TargetSession>> {
        self.session.lock().clone()
    }

    pub(crate) fn set_session(&self, session: Option<Arc<dyn TargetSession>>) {
        *self.session.lock() = session;
    }

    /// Mutate the cached manifest and persist it.
    pub(crate) fn update_manifest<F>(&self, mutate: F) -> Result<(), StorageError>
    where
        F: FnOnce(&mut RunManifest),
    {
        let mut manifest = self.manifest.lock();
        mutate(&mut manifest);
        self.storage.save_manifest(&manifest)
    }

    /// Set a parameter in the live map and mirror it into the manifest.
    pub(crate) fn set_parameter(&self, name: &str, value: &str) -> Result<(), StorageError> {
        self.parameters
            .lock()
            .insert(name.to_string(), value.to_string());
        self.update_manifest(|manifest| {
            manifest
                .parameters
                .insert(name.to_string(), value.to_string());
        })
    }

    /// Record a pulled artifact in the manifest.
    pub(crate) fn push_artifact(&self, record: ArtifactRecord) -> Result<(), StorageError> {
        self.update_manifest(|manifest| manifest.artifacts.push(record))
    }

    pub(crate) fn collector_running(&self, name: &str) -> bool {
        self.collectors
            .lock()
            .get(name)
            .is_some_and(CollectorHandle::is_running)
    }

    pub(crate) fn insert_collector(&self, name: &str, handle: CollectorHandle) {
        self.collectors.lock().insert(name.to_string(), handle);
    }

    /// Signal one collector. Returns true if it was running.
    pub(crate) fn signal_collector(&self, name: &str) -> bool {
        let collectors = self.collectors.lock();
        match collectors.get(name) {
            Some(handle) if handle.is_running() => {
                handle.signal_stop();
                true
            }
            _ => false,
        }
    }

    /// Signal every running collector, returning their names.
    pub(crate) fn signal_all_collectors(&self) -> Vec<String> {
        let collectors = self.collectors.lock();
        let mut stopped = Vec::new();
        for (name, handle) in collectors.iter() {
            if handle.is_running() {
                handle.signal_stop();
                stopped.push(name.clone());
            }
        }
        stopped
    }
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod tests;
