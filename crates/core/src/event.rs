// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event types for the per-run event stream.
//!
//! Every action against a run is recorded as one immutable event: a
//! sequence number, a UTC timestamp, a type tag, and a free-form data
//! payload. Events are persisted one JSON object per line in
//! `events.jsonl`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed set of event type tags.
///
/// The `stage_*` and `action_*` variants (and `command_output`, `edit`,
/// `error`) are part of the on-disk vocabulary but no engine path emits
/// them today; they are kept so existing logs and future writers stay
/// readable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    // -- run lifecycle --
    RunCreated,
    RunStarted,
    RunPaused,
    RunResumed,
    RunCompleted,
    RunInterrupted,

    // -- stage lifecycle --
    StageStarted,
    StageCompleted,

    // -- action execution --
    ActionStarted,
    ActionCompleted,
    ActionFailed,

    // -- command execution --
    CommandStarted,
    CommandOutput,
    CommandCompleted,
    CommandFailed,

    // -- artifacts --
    ArtifactPullStarted,
    ArtifactPulled,
    ArtifactPullFailed,

    // -- background collectors --
    CollectorStarted,
    CollectorStopped,
    CollectorOutput,
    CollectorError,

    // -- connection --
    ConnectionEstablished,
    ConnectionLost,
    ConnectionRetry,

    // -- operator interactions --
    Note,
    Edit,
    ParameterSet,

    // -- errors --
    Error,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::RunCreated => "run_created",
            EventType::RunStarted => "run_started",
            EventType::RunPaused => "run_paused",
            EventType::RunResumed => "run_resumed",
            EventType::RunCompleted => "run_completed",
            EventType::RunInterrupted => "run_interrupted",
            EventType::StageStarted => "stage_started",
            EventType::StageCompleted => "stage_completed",
            EventType::ActionStarted => "action_started",
            EventType::ActionCompleted => "action_completed",
            EventType::ActionFailed => "action_failed",
            EventType::CommandStarted => "command_started",
            EventType::CommandOutput => "command_output",
            EventType::CommandCompleted => "command_completed",
            EventType::CommandFailed => "command_failed",
            EventType::ArtifactPullStarted => "artifact_pull_started",
            EventType::ArtifactPulled => "artifact_pulled",
            EventType::ArtifactPullFailed => "artifact_pull_failed",
            EventType::CollectorStarted => "collector_started",
            EventType::CollectorStopped => "collector_stopped",
            EventType::CollectorOutput => "collector_output",
            EventType::CollectorError => "collector_error",
            EventType::ConnectionEstablished => "connection_established",
            EventType::ConnectionLost => "connection_lost",
            EventType::ConnectionRetry => "connection_retry",
            EventType::Note => "note",
            EventType::Edit => "edit",
            EventType::ParameterSet => "parameter_set",
            EventType::Error => "error",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single immutable event in a run's stream.
///
/// `seq` starts at 1 and increases by exactly one per append; the pair
/// `(run, seq)` identifies an event forever.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub seq: u64,
    pub timestamp: String,
    pub event_type: EventType,
    pub data: serde_json::Value,
}

impl Event {
    pub fn to_json_line(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json_line(line: &str) -> serde_json::Result<Self> {
        serde_json::from_str(line)
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
