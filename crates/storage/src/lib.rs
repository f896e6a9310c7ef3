// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! rig-storage: on-disk layout for runs
//!
//! Each run owns one directory under the runs root:
//!
//! ```text
//! runs/<run_id>/
//!   manifest.json          # RunManifest
//!   events.jsonl           # one Event per line, append-only
//!   profile_snapshot.yaml  # verbatim profile at run creation
//!   artifacts/             # files pulled from the target, flat
//!   logs/                  # reserved
//! ```

mod error;
mod manager;
mod run_dir;
mod stream;

pub use error::StorageError;
pub use manager::StorageManager;
pub use run_dir::RunStorage;
pub use stream::EventStream;
