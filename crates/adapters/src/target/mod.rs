// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Target session adapters

mod ssh;

pub use ssh::{SshSession, SshSessionFactory};

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeScript, FakeSessionFactory, FakeTarget, ScriptedResult, TargetCall};

use async_trait::async_trait;
use rig_core::CommandResult;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Errors from target session operations
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("connection failed: {0}")]
    ConnectFailed(String),
    #[error("remote file not found: {0}")]
    RemoteNotFound(String),
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("transfer failed: {0}")]
    Transfer(String),
    #[error("ssh error: {0}")]
    Protocol(String),
}

/// Connection parameters plus the session's retry policy.
#[derive(Debug, Clone)]
pub struct TargetConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    /// Private key path; `~` is expanded. Takes precedence over password.
    pub key_file: Option<String>,
    pub password: Option<String>,
    pub connect_timeout: Duration,
    pub retry_attempts: u32,
    pub retry_delay: Duration,
}

impl TargetConfig {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: 22,
            user: "root".to_string(),
            key_file: None,
            password: None,
            connect_timeout: Duration::from_secs(30),
            retry_attempts: 3,
            retry_delay: Duration::from_secs(5),
        }
    }
}

type ConnectFn = Box<dyn Fn() + Send + Sync>;
type DisconnectFn = Box<dyn Fn(&str) + Send + Sync>;
type RetryFn = Box<dyn Fn(u32, &str) + Send + Sync>;

/// Callbacks fired by a session as its connection state changes.
///
/// All three are optional and invoked synchronously on the calling task;
/// they must not block.
#[derive(Default)]
pub struct SessionHooks {
    pub on_connect: Option<ConnectFn>,
    pub on_disconnect: Option<DisconnectFn>,
    pub on_retry: Option<RetryFn>,
}

impl SessionHooks {
    pub(crate) fn connected(&self) {
        if let Some(hook) = &self.on_connect {
            hook();
        }
    }

    pub(crate) fn disconnected(&self, reason: &str) {
        if let Some(hook) = &self.on_disconnect {
            hook(reason);
        }
    }

    pub(crate) fn retrying(&self, attempt: u32, error: &str) {
        if let Some(hook) = &self.on_retry {
            hook(attempt, error);
        }
    }
}

/// One logical connection to a target.
///
/// Implementations serialize all operations internally so a reconnect
/// can never interleave with a command, and report command-level
/// failures through [`CommandResult`] (exit code −1) rather than errors.
#[async_trait]
pub trait TargetSession: Send + Sync {
    async fn is_connected(&self) -> bool;

    /// Establish the connection, retrying per the config. No-op when the
    /// transport is already live.
    async fn connect(&self) -> Result<(), SessionError>;

    /// Run a command on the target with a wall-clock timeout.
    async fn execute(&self, command: &str, timeout: Duration) -> CommandResult;

    /// Fetch a remote file over SFTP, creating local parent directories.
    async fn download(&self, remote: &str, local: &Path) -> Result<(), SessionError>;

    /// Send a local file to the target over SFTP.
    async fn upload(&self, local: &Path, remote: &str) -> Result<(), SessionError>;

    async fn file_exists(&self, remote: &str) -> bool;

    /// Best-effort close; the session can be reconnected afterwards.
    async fn disconnect(&self);
}

/// Builds sessions for the engine, one per started run.
pub trait SessionFactory: Send + Sync {
    fn open(&self, config: TargetConfig, hooks: SessionHooks) -> Arc<dyn TargetSession>;
}
