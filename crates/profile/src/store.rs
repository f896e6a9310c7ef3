// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Directory-scoped profile store.

use crate::profile::{Profile, ProfileError};
use std::fs;
use std::path::{Path, PathBuf};

const EXTENSIONS: [&str; 2] = ["yaml", "yml"];

/// Store over a directory of `<name>.yaml` / `<name>.yml` files.
#[derive(Debug, Clone)]
pub struct ProfileStore {
    dir: PathBuf,
}

impl ProfileStore {
    /// Open a store, creating the directory if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, ProfileError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Profile base-names, sorted.
    pub fn list(&self) -> Result<Vec<String>, ProfileError> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            let is_profile = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| EXTENSIONS.contains(&ext));
            if !is_profile {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                names.push(stem.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    /// Load a profile by base-name, trying `.yaml` then `.yml`.
    pub fn load(&self, name: &str) -> Result<Profile, ProfileError> {
        for ext in EXTENSIONS {
            let path = self.dir.join(format!("{name}.{ext}"));
            if path.exists() {
                return Profile::from_file(&path);
            }
        }
        Err(ProfileError::NotFound(name.to_string()))
    }

    /// Write a profile as `<name>.yaml`, returning the path.
    pub fn save(&self, profile: &Profile) -> Result<PathBuf, ProfileError> {
        let path = self.dir.join(format!("{}.yaml", profile.name));
        fs::write(&path, profile.to_yaml()?)?;
        tracing::info!(profile = %profile.name, path = %path.display(), "profile saved");
        Ok(path)
    }

    /// Delete a profile by base-name. Returns false if no file existed.
    pub fn delete(&self, name: &str) -> Result<bool, ProfileError> {
        for ext in EXTENSIONS {
            let path = self.dir.join(format!("{name}.{ext}"));
            if path.exists() {
                fs::remove_file(&path)?;
                return Ok(true);
            }
        }
        Ok(false)
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
