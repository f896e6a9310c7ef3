// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Subscriber notifications.
//!
//! The engine fans these out over a `tokio::sync::broadcast` channel so
//! a UI layer can push live updates. Send failures (no subscribers, or a
//! lagging subscriber) are ignored; a subscriber can never block or
//! break the engine.

use rig_core::RunStatus;

/// Connection state change, mirroring the session hooks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connected,
    Disconnected { reason: String },
    Retrying { attempt: u32 },
}

/// One live update from the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    RunStatus {
        run_id: String,
        status: RunStatus,
    },
    Connection {
        run_id: String,
        status: ConnectionStatus,
    },
    CommandStarted {
        run_id: String,
        command_name: String,
    },
    CommandFinished {
        run_id: String,
        command_name: String,
        success: bool,
        exit_code: i32,
    },
    CollectorOutput {
        run_id: String,
        collector: String,
        output: String,
        success: bool,
    },
    CollectorStatus {
        run_id: String,
        collector: String,
        running: bool,
    },
}
