// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Host-side command execution.

use chrono::Utc;
use rig_core::CommandResult;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// Run a command on the controller through `sh -c` with a wall-clock
/// timeout. Never errors: spawn failures and timeouts come back as exit
/// code −1 with the reason in stderr.
pub(crate) async fn execute_host_command(command: &str, timeout: Duration) -> CommandResult {
    let started_at = Utc::now();

    let child = Command::new("sh")
        .arg("-c")
        .arg(command)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn();

    let child = match child {
        Ok(child) => child,
        Err(e) => return CommandResult::failure(command, e.to_string(), started_at),
    };

    match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(Ok(output)) => CommandResult {
            command: command.to_string(),
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            started_at,
            finished_at: Utc::now(),
        },
        Ok(Err(e)) => CommandResult::failure(command, e.to_string(), started_at),
        // Dropping the wait future kills the child (kill_on_drop)
        Err(_) => CommandResult::failure(
            command,
            format!("Command timed out after {}s", timeout.as_secs()),
            started_at,
        ),
    }
}

#[cfg(test)]
#[path = "host_tests.rs"]
mod tests;
