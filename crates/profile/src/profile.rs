// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Profile definitions parsed from YAML.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors from profile loading and saving
#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("profile not found: {0}")]
    NotFound(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("profile {0}: connection.host is missing or empty")]
    MissingHost(String),
}

/// Where a command or collector executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunLocation {
    /// The controller machine running this orchestrator.
    Host,
    /// The remote device, reached over the run's SSH session.
    Target,
}

impl RunLocation {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunLocation::Host => "host",
            RunLocation::Target => "target",
        }
    }
}

fn host() -> RunLocation {
    RunLocation::Host
}

fn target() -> RunLocation {
    RunLocation::Target
}

fn command_timeout() -> u64 {
    60
}

fn collector_interval() -> u64 {
    60
}

fn collector_timeout() -> u64 {
    10
}

fn ssh_port() -> u16 {
    22
}

fn ssh_user() -> String {
    "root".to_string()
}

fn connect_timeout() -> u64 {
    30
}

/// A named command from a profile.
///
/// `command` is a shell template; `{param}` placeholders are substituted
/// from the run's parameter map at execution time. `artifacts` lists
/// remote-path templates to pull back after a target command finishes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandDef {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub command: String,
    #[serde(default = "host")]
    pub run: RunLocation,
    #[serde(default)]
    pub artifacts: Vec<String>,
    /// Wall-clock limit in seconds for one execution.
    #[serde(default = "command_timeout")]
    pub timeout: u64,
}

/// A periodic background collector from a profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectorDef {
    #[serde(default)]
    pub command: String,
    #[serde(default = "target")]
    pub run: RunLocation,
    /// Seconds between iteration completions.
    #[serde(default = "collector_interval")]
    pub interval: u64,
    /// Per-invocation wall-clock limit in seconds.
    #[serde(default = "collector_timeout")]
    pub timeout: u64,
}

/// SSH connection parameters for a target.
///
/// The password is accepted on load but never written back: saved
/// profiles and run snapshots carry `key_file` only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    #[serde(default)]
    pub host: String,
    #[serde(default = "ssh_port")]
    pub port: u16,
    #[serde(default = "ssh_user")]
    pub user: String,
    #[serde(default)]
    pub key_file: Option<String>,
    #[serde(default, skip_serializing)]
    pub password: Option<String>,
    /// Connect timeout in seconds.
    #[serde(default = "connect_timeout")]
    pub timeout: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: ssh_port(),
            user: ssh_user(),
            key_file: None,
            password: None,
            timeout: connect_timeout(),
        }
    }
}

/// A complete target profile, immutable after load.
///
/// Unknown YAML keys are ignored so newer profiles load on older
/// controllers; the only hard requirement is a non-empty
/// `connection.host`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub connection: ConnectionConfig,
    #[serde(default)]
    pub commands: IndexMap<String, CommandDef>,
    #[serde(default)]
    pub background_collectors: IndexMap<String, CollectorDef>,
    /// File this profile was loaded from; empty for unsaved profiles.
    #[serde(skip)]
    pub path: PathBuf,
}

impl Profile {
    /// Parse a profile from YAML text.
    ///
    /// `fallback_name` (usually the file stem) is used when the document
    /// has no `name` key.
    pub fn from_yaml(text: &str, fallback_name: &str) -> Result<Self, ProfileError> {
        let mut profile: Profile = serde_yaml::from_str(text)?;
        if profile.name.is_empty() {
            profile.name = fallback_name.to_string();
        }
        if profile.connection.host.trim().is_empty() {
            return Err(ProfileError::MissingHost(profile.name));
        }
        Ok(profile)
    }

    /// Load a profile from a YAML file.
    pub fn from_file(path: &Path) -> Result<Self, ProfileError> {
        let text = std::fs::read_to_string(path)?;
        let fallback = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or_default();
        let mut profile = Self::from_yaml(&text, fallback)?;
        profile.path = path.to_path_buf();
        Ok(profile)
    }

    /// Serialize back to YAML (passwords excluded).
    pub fn to_yaml(&self) -> Result<String, ProfileError> {
        Ok(serde_yaml::to_string(self)?)
    }
}

#[cfg(test)]
#[path = "profile_tests.rs"]
mod tests;
