// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Run manifest and status types.
//!
//! The manifest is the JSON summary of a run (`manifest.json` in the run
//! directory); the engine mutates it under its per-run lock and rewrites
//! the whole file after every committed change.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Lifecycle state of a run.
///
/// Transitions are driven by the engine: `created → running ⇄ paused`,
/// any state may move to `interrupted` or `failed`, and a run ends in
/// `completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Created,
    Running,
    Paused,
    Interrupted,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Created => "created",
            RunStatus::Running => "running",
            RunStatus::Paused => "paused",
            RunStatus::Interrupted => "interrupted",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A file pulled from the target into the run's `artifacts/` directory.
///
/// `local_path` is relative to the run directory (e.g. `artifacts/x.log`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRecord {
    pub remote_path: String,
    pub local_path: String,
    /// Name of the command whose definition produced this artifact.
    pub command: String,
}

/// Manifest for a run, stored as `manifest.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunManifest {
    pub run_id: String,
    pub name: String,
    pub profile_name: String,
    pub status: RunStatus,
    pub created_at: String,
    #[serde(default)]
    pub started_at: Option<String>,
    #[serde(default)]
    pub completed_at: Option<String>,
    #[serde(default)]
    pub parameters: HashMap<String, String>,
    #[serde(default)]
    pub artifacts: Vec<ArtifactRecord>,
    #[serde(default)]
    pub notes: String,
}

impl RunManifest {
    /// Build a fresh manifest in the `created` state.
    pub fn new(
        run_id: impl Into<String>,
        name: impl Into<String>,
        profile_name: impl Into<String>,
        created_at: impl Into<String>,
        parameters: HashMap<String, String>,
    ) -> Self {
        Self {
            run_id: run_id.into(),
            name: name.into(),
            profile_name: profile_name.into(),
            status: RunStatus::Created,
            created_at: created_at.into(),
            started_at: None,
            completed_at: None,
            parameters,
            artifacts: Vec::new(),
            notes: String::new(),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

/// Summary row for run listings, derived from the manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: String,
    pub name: String,
    pub profile_name: String,
    pub status: RunStatus,
    pub created_at: String,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
}

impl From<&RunManifest> for RunSummary {
    fn from(manifest: &RunManifest) -> Self {
        Self {
            run_id: manifest.run_id.clone(),
            name: manifest.name.clone(),
            profile_name: manifest.profile_name.clone(),
            status: manifest.status,
            created_at: manifest.created_at.clone(),
            started_at: manifest.started_at.clone(),
            completed_at: manifest.completed_at.clone(),
        }
    }
}

#[cfg(test)]
#[path = "run_tests.rs"]
mod tests;
