// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runs-directory manager: run id generation, creation, listing, deletion.

use crate::error::StorageError;
use crate::run_dir::RunStorage;
use rig_core::{RunManifest, RunSummary};
use std::fs;
use std::path::{Path, PathBuf};

/// Manages all run directories under one runs root.
#[derive(Debug, Clone)]
pub struct StorageManager {
    runs_dir: PathBuf,
}

impl StorageManager {
    /// Open a manager, creating the runs directory if needed.
    pub fn new(runs_dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let runs_dir = runs_dir.into();
        fs::create_dir_all(&runs_dir)?;
        Ok(Self { runs_dir })
    }

    pub fn runs_dir(&self) -> &Path {
        &self.runs_dir
    }

    /// Generate a run id from the local clock, `YYYY-MM-DD_HHMMSS`,
    /// optionally suffixed with a sanitized operator-supplied name.
    ///
    /// The local clock is used deliberately so directory names read in
    /// the operator's timezone; event timestamps inside the run are UTC.
    pub fn generate_run_id(&self, name: Option<&str>) -> String {
        let timestamp = chrono::Local::now().format("%Y-%m-%d_%H%M%S").to_string();
        match name {
            Some(name) if !name.is_empty() => format!("{timestamp}_{}", sanitize_name(name)),
            _ => timestamp,
        }
    }

    /// Create and initialize a new run directory.
    pub fn create_run(
        &self,
        run_id: &str,
        manifest: &RunManifest,
        profile_yaml: &str,
    ) -> Result<RunStorage, StorageError> {
        let storage = RunStorage::new(self.runs_dir.join(run_id));
        storage.initialize(manifest, profile_yaml)?;
        Ok(storage)
    }

    /// Storage handle for an existing run, if its directory exists.
    pub fn get_run(&self, run_id: &str) -> Option<RunStorage> {
        let run_dir = self.runs_dir.join(run_id);
        run_dir.is_dir().then(|| RunStorage::new(run_dir))
    }

    /// Summary rows for every subdirectory with a readable manifest,
    /// newest `created_at` first.
    pub fn list_runs(&self) -> Result<Vec<RunSummary>, StorageError> {
        let mut runs = Vec::new();
        for entry in fs::read_dir(&self.runs_dir)? {
            let path = entry?.path();
            if !path.is_dir() {
                continue;
            }
            match RunStorage::new(&path).load_manifest() {
                Ok(manifest) => runs.push(RunSummary::from(&manifest)),
                Err(e) => tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "skipping run directory with unreadable manifest",
                ),
            }
        }
        runs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(runs)
    }

    /// Recursively delete a run directory. Returns false if it did not exist.
    pub fn delete_run(&self, run_id: &str) -> Result<bool, StorageError> {
        let run_dir = self.runs_dir.join(run_id);
        if !run_dir.exists() {
            return Ok(false);
        }
        fs::remove_dir_all(&run_dir)?;
        Ok(true)
    }
}

/// Replace every character outside `[A-Za-z0-9_-]` with `-` and cap at 50.
fn sanitize_name(name: &str) -> String {
    let mut safe: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '-'
            }
        })
        .collect();
    safe.truncate(50);
    safe
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
