// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the engine

use rig_profile::ProfileError;
use rig_storage::StorageError;
use thiserror::Error;

/// Errors from engine operations.
///
/// Expected failure modes come back as variants, never panics. Command
/// failures on a healthy run are not errors at all: they are recorded in
/// the event stream and returned inside `CommandOutcome`.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("run not found: {0}")]
    RunNotFound(String),
    #[error("run not active: {0}")]
    RunNotActive(String),
    #[error("command not found: {0}")]
    CommandNotFound(String),
    #[error("collector not found: {0}")]
    CollectorNotFound(String),
    #[error("connection failed for run: {0}")]
    ConnectionFailed(String),
    #[error("profile error: {0}")]
    Profile(#[from] ProfileError),
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}
