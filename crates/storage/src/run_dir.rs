// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-run directory layout, manifest persistence, and archival.

use crate::error::StorageError;
use rig_core::RunManifest;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Storage for a single run directory.
#[derive(Debug, Clone)]
pub struct RunStorage {
    run_dir: PathBuf,
}

impl RunStorage {
    pub fn new(run_dir: impl Into<PathBuf>) -> Self {
        Self {
            run_dir: run_dir.into(),
        }
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.run_dir.join("manifest.json")
    }

    pub fn events_path(&self) -> PathBuf {
        self.run_dir.join("events.jsonl")
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.run_dir.join("profile_snapshot.yaml")
    }

    pub fn artifacts_dir(&self) -> PathBuf {
        self.run_dir.join("artifacts")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.run_dir.join("logs")
    }

    /// Create the directory tree, write the manifest and profile
    /// snapshot, and touch the events file.
    pub fn initialize(
        &self,
        manifest: &RunManifest,
        profile_yaml: &str,
    ) -> Result<(), StorageError> {
        fs::create_dir_all(&self.run_dir)?;
        fs::create_dir_all(self.artifacts_dir())?;
        fs::create_dir_all(self.logs_dir())?;

        self.save_manifest(manifest)?;
        fs::write(self.snapshot_path(), profile_yaml)?;

        OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.events_path())?;

        Ok(())
    }

    pub fn save_manifest(&self, manifest: &RunManifest) -> Result<(), StorageError> {
        fs::write(self.manifest_path(), manifest.to_json()?)?;
        Ok(())
    }

    pub fn load_manifest(&self) -> Result<RunManifest, StorageError> {
        let path = self.manifest_path();
        if !path.exists() {
            return Err(StorageError::ManifestMissing(self.run_dir.clone()));
        }
        Ok(RunManifest::from_json(&fs::read_to_string(path)?)?)
    }

    /// Copy a pulled file into `artifacts/` under the remote file's
    /// base-name, appending `_1`, `_2`, … before the extension on
    /// collision. Returns the path relative to the run directory.
    pub fn add_artifact(
        &self,
        local_path: &Path,
        original_remote_path: &str,
    ) -> Result<String, StorageError> {
        let filename = original_remote_path
            .rsplit('/')
            .next()
            .filter(|name| !name.is_empty())
            .unwrap_or("artifact");

        let artifacts_dir = self.artifacts_dir();
        let mut dest = artifacts_dir.join(filename);
        let mut counter = 1;
        while dest.exists() {
            dest = artifacts_dir.join(numbered_name(filename, counter));
            counter += 1;
        }

        fs::copy(local_path, &dest)?;

        let relative = dest
            .strip_prefix(&self.run_dir)
            .unwrap_or(&dest)
            .to_string_lossy()
            .into_owned();
        Ok(relative)
    }

    /// Absolute path for a manifest-relative artifact path.
    pub fn artifact_path(&self, relative: &str) -> PathBuf {
        self.run_dir.join(relative)
    }

    /// Zip the whole run directory next to it, archive root = run_id.
    /// Returns the archive path.
    pub fn create_archive(&self) -> Result<PathBuf, StorageError> {
        let run_id = self
            .run_dir
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("run")
            .to_string();
        let parent = self
            .run_dir
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let archive_path = parent.join(format!("{run_id}.zip"));

        let file = File::create(&archive_path)?;
        let mut writer = ZipWriter::new(file);
        let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
        add_dir_entries(&mut writer, &self.run_dir, Path::new(&run_id), options)?;
        writer.finish()?;

        Ok(archive_path)
    }
}

/// Insert `_{counter}` before the extension: `x.log` → `x_1.log`.
fn numbered_name(filename: &str, counter: u32) -> String {
    match filename.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{stem}_{counter}.{ext}"),
        _ => format!("{filename}_{counter}"),
    }
}

fn add_dir_entries(
    writer: &mut ZipWriter<File>,
    dir: &Path,
    prefix: &Path,
    options: FileOptions,
) -> Result<(), StorageError> {
    let mut entries: Vec<_> = fs::read_dir(dir)?.collect::<Result<_, _>>()?;
    entries.sort_by_key(|entry| entry.file_name());

    for entry in entries {
        let path = entry.path();
        let name = prefix.join(entry.file_name());
        let name_str = name.to_string_lossy().replace('\\', "/");

        if path.is_dir() {
            writer.add_directory(format!("{name_str}/"), options)?;
            add_dir_entries(writer, &path, &name, options)?;
        } else {
            writer.start_file(name_str, options)?;
            let mut src = File::open(&path)?;
            io::copy(&mut src, writer)?;
        }
    }

    Ok(())
}

#[cfg(test)]
#[path = "run_dir_tests.rs"]
mod tests;
