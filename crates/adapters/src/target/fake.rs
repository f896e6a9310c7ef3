// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake target session for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{SessionError, SessionFactory, SessionHooks, TargetConfig, TargetSession};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use rig_core::CommandResult;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Recorded session call
#[derive(Debug, Clone, PartialEq)]
pub enum TargetCall {
    ConnectAttempt,
    Execute { command: String },
    Download { remote: String, local: PathBuf },
    Upload { local: PathBuf, remote: String },
    FileExists { remote: String },
    Disconnect,
}

/// Canned result for one command string
#[derive(Debug, Clone)]
pub struct ScriptedResult {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl Default for ScriptedResult {
    fn default() -> Self {
        Self {
            exit_code: 0,
            stdout: String::new(),
            stderr: String::new(),
        }
    }
}

struct ScriptState {
    connected: bool,
    /// One pending simulated transport loss, consumed by the next operation.
    drop_pending: bool,
    /// Budget of connect attempts that fail before one succeeds.
    connect_failures: u32,
    results: HashMap<String, ScriptedResult>,
    remote_files: HashMap<String, Vec<u8>>,
    uploads: HashMap<String, Vec<u8>>,
    calls: Vec<TargetCall>,
}

/// Shared script driving every [`FakeTarget`] a [`FakeSessionFactory`]
/// opens. Tests configure it up front and inspect calls afterwards.
#[derive(Clone)]
pub struct FakeScript {
    inner: Arc<Mutex<ScriptState>>,
}

impl Default for FakeScript {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(ScriptState {
                connected: false,
                drop_pending: false,
                connect_failures: 0,
                results: HashMap::new(),
                remote_files: HashMap::new(),
                uploads: HashMap::new(),
                calls: Vec::new(),
            })),
        }
    }
}

impl FakeScript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the result for one exact command string.
    pub fn set_result(&self, command: &str, exit_code: i32, stdout: &str, stderr: &str) {
        self.inner.lock().results.insert(
            command.to_string(),
            ScriptedResult {
                exit_code,
                stdout: stdout.to_string(),
                stderr: stderr.to_string(),
            },
        );
    }

    /// Place a file on the fake target's filesystem.
    pub fn add_remote_file(&self, path: &str, bytes: &[u8]) {
        self.inner
            .lock()
            .remote_files
            .insert(path.to_string(), bytes.to_vec());
    }

    /// Make the next `n` connect attempts fail.
    pub fn fail_next_connects(&self, n: u32) {
        self.inner.lock().connect_failures = n;
    }

    /// Simulate the transport dying before the next operation.
    pub fn drop_connection(&self) {
        self.inner.lock().drop_pending = true;
    }

    pub fn is_connected(&self) -> bool {
        self.inner.lock().connected
    }

    /// Everything uploaded to the fake target, by remote path.
    pub fn uploads(&self) -> HashMap<String, Vec<u8>> {
        self.inner.lock().uploads.clone()
    }

    /// All recorded calls, in order.
    pub fn calls(&self) -> Vec<TargetCall> {
        self.inner.lock().calls.clone()
    }

    /// Just the executed command strings, in order.
    pub fn executed_commands(&self) -> Vec<String> {
        self.inner
            .lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                TargetCall::Execute { command } => Some(command.clone()),
                _ => None,
            })
            .collect()
    }
}

/// Scripted in-memory target session.
pub struct FakeTarget {
    config: TargetConfig,
    hooks: SessionHooks,
    script: FakeScript,
}

impl FakeTarget {
    pub fn new(config: TargetConfig, hooks: SessionHooks, script: FakeScript) -> Self {
        Self {
            config,
            hooks,
            script,
        }
    }

    fn record(&self, call: TargetCall) {
        self.script.inner.lock().calls.push(call);
    }

    /// Mirror the real session's liveness check + retry protocol.
    fn ensure_connected(&self) -> Result<(), SessionError> {
        {
            let mut state = self.script.inner.lock();
            if state.connected {
                if !state.drop_pending {
                    return Ok(());
                }
                state.drop_pending = false;
                state.connected = false;
                drop(state);
                self.hooks.disconnected("Connection lost");
            }
        }
        self.connect_with_retries()
    }

    fn connect_with_retries(&self) -> Result<(), SessionError> {
        let mut last_error = String::from("no connection attempts configured");

        for attempt in 1..=self.config.retry_attempts {
            self.record(TargetCall::ConnectAttempt);
            let failed = {
                let mut state = self.script.inner.lock();
                if state.connect_failures > 0 {
                    state.connect_failures -= 1;
                    true
                } else {
                    state.connected = true;
                    false
                }
            };

            if !failed {
                self.hooks.connected();
                return Ok(());
            }

            last_error = "simulated connect failure".to_string();
            if attempt < self.config.retry_attempts {
                self.hooks.retrying(attempt, &last_error);
            } else {
                let reason = format!("failed after {attempt} attempts: {last_error}");
                self.hooks.disconnected(&reason);
                return Err(SessionError::ConnectFailed(reason));
            }
        }

        Err(SessionError::ConnectFailed(last_error))
    }
}

#[async_trait]
impl TargetSession for FakeTarget {
    async fn is_connected(&self) -> bool {
        let state = self.script.inner.lock();
        state.connected && !state.drop_pending
    }

    async fn connect(&self) -> Result<(), SessionError> {
        self.ensure_connected()
    }

    async fn execute(&self, command: &str, _timeout: Duration) -> CommandResult {
        let started_at = Utc::now();
        self.record(TargetCall::Execute {
            command: command.to_string(),
        });

        if self.ensure_connected().is_err() {
            return CommandResult::failure(command, "Connection failed", started_at);
        }

        let scripted = {
            let state = self.script.inner.lock();
            state.results.get(command).cloned().unwrap_or_default()
        };

        CommandResult {
            command: command.to_string(),
            exit_code: scripted.exit_code,
            stdout: scripted.stdout,
            stderr: scripted.stderr,
            started_at,
            finished_at: Utc::now(),
        }
    }

    async fn download(&self, remote: &str, local: &Path) -> Result<(), SessionError> {
        self.record(TargetCall::Download {
            remote: remote.to_string(),
            local: local.to_path_buf(),
        });
        self.ensure_connected()?;

        let bytes = {
            let state = self.script.inner.lock();
            state.remote_files.get(remote).cloned()
        };
        let Some(bytes) = bytes else {
            return Err(SessionError::RemoteNotFound(remote.to_string()));
        };

        if let Some(parent) = local.parent() {
            std::fs::create_dir_all(parent).map_err(|e| SessionError::Transfer(e.to_string()))?;
        }
        std::fs::write(local, bytes).map_err(|e| SessionError::Transfer(e.to_string()))?;
        Ok(())
    }

    async fn upload(&self, local: &Path, remote: &str) -> Result<(), SessionError> {
        self.record(TargetCall::Upload {
            local: local.to_path_buf(),
            remote: remote.to_string(),
        });
        self.ensure_connected()?;

        let bytes = std::fs::read(local).map_err(|e| SessionError::Transfer(e.to_string()))?;
        self.script
            .inner
            .lock()
            .uploads
            .insert(remote.to_string(), bytes);
        Ok(())
    }

    async fn file_exists(&self, remote: &str) -> bool {
        self.record(TargetCall::FileExists {
            remote: remote.to_string(),
        });
        if self.ensure_connected().is_err() {
            return false;
        }
        self.script.inner.lock().remote_files.contains_key(remote)
    }

    async fn disconnect(&self) {
        self.record(TargetCall::Disconnect);
        self.script.inner.lock().connected = false;
    }
}

/// Factory handing every opened session the same shared script.
#[derive(Clone, Default)]
pub struct FakeSessionFactory {
    pub script: FakeScript,
}

impl FakeSessionFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_script(script: FakeScript) -> Self {
        Self { script }
    }
}

impl SessionFactory for FakeSessionFactory {
    fn open(&self, config: TargetConfig, hooks: SessionHooks) -> Arc<dyn TargetSession> {
        Arc::new(FakeTarget::new(config, hooks, self.script.clone()))
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
