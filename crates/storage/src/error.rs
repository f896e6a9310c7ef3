// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the storage layer

use std::path::PathBuf;
use thiserror::Error;

/// Errors from run storage and the event stream
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("manifest missing in {}", .0.display())]
    ManifestMissing(PathBuf),
    #[error("archive error: {0}")]
    Zip(#[from] zip::result::ZipError),
}
