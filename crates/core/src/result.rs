// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Command execution results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of one host or target command execution.
///
/// Failures that never produced an exit status (connection loss, spawn
/// errors, timeouts) use exit code `-1` with the reason in `stderr`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandResult {
    /// The command string actually executed (after parameter substitution).
    pub command: String,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl CommandResult {
    /// Wall-clock duration in seconds.
    pub fn duration(&self) -> f64 {
        let elapsed = self.finished_at - self.started_at;
        elapsed.num_microseconds().unwrap_or(i64::MAX) as f64 / 1_000_000.0
    }

    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// A result for a command that never ran or died mid-flight.
    pub fn failure(
        command: impl Into<String>,
        stderr: impl Into<String>,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            command: command.into(),
            exit_code: -1,
            stdout: String::new(),
            stderr: stderr.into(),
            started_at,
            finished_at: Utc::now(),
        }
    }
}

#[cfg(test)]
#[path = "result_tests.rs"]
mod tests;
