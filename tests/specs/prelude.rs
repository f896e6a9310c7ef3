//! Shared helpers for engine specs.

use rig_adapters::{FakeScript, FakeSessionFactory};
use rig_core::{Event, EventType};
use rig_engine::Engine;
use rig_profile::ProfileStore;
use rig_storage::StorageManager;
use std::sync::Arc;
use tempfile::TempDir;

pub struct Rig {
    // Keeps the temp tree alive for the test's duration
    pub tmp: TempDir,
    pub engine: Engine,
    pub script: FakeScript,
}

/// Build an engine over temp dirs with one profile installed.
pub fn rig_with_profile(name: &str, yaml: &str) -> Rig {
    let tmp = TempDir::new().unwrap();
    let profiles = ProfileStore::new(tmp.path().join("profiles")).unwrap();
    std::fs::write(profiles.dir().join(format!("{name}.yaml")), yaml).unwrap();
    let storage = StorageManager::new(tmp.path().join("runs")).unwrap();

    let factory = FakeSessionFactory::new();
    let script = factory.script.clone();
    let engine = Engine::new(storage, profiles, Arc::new(factory));

    Rig {
        tmp,
        engine,
        script,
    }
}

/// Event type tags in stream order.
pub fn event_types(events: &[Event]) -> Vec<&'static str> {
    events.iter().map(|e| e.event_type.as_str()).collect()
}

/// Sequence number of the first event of the given type.
pub fn seq_of(events: &[Event], event_type: EventType) -> u64 {
    events
        .iter()
        .find(|e| e.event_type == event_type)
        .map(|e| e.seq)
        .unwrap_or_else(|| panic!("no {event_type} event in stream"))
}

/// All events of one type.
pub fn of_type(events: &[Event], event_type: EventType) -> Vec<Event> {
    events
        .iter()
        .filter(|e| e.event_type == event_type)
        .cloned()
        .collect()
}
