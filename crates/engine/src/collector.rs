// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Background collector worker.
//!
//! One spawned task per started collector. The loop executes the
//! collector command, records the outcome as an event, notifies
//! subscribers, then waits out the interval. The wait is interruptible:
//! a stop signal wakes the worker promptly, so stopping costs at most
//! the iteration already in flight, followed by one `collector_stopped`.

use crate::context::RunContext;
use crate::host;
use crate::notify::Notification;
use chrono::Utc;
use rig_adapters::TargetSession;
use rig_core::{CommandResult, EventType};
use rig_profile::{substitute, CollectorDef, RunLocation};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};

pub(crate) async fn run_collector(
    ctx: Arc<RunContext>,
    name: String,
    def: CollectorDef,
    mut stop: watch::Receiver<bool>,
    notify: broadcast::Sender<Notification>,
) {
    let started = ctx.events().append(
        EventType::CollectorStarted,
        json!({
            "collector": name,
            "run_location": def.run.as_str(),
        }),
    );
    if let Err(e) = started {
        tracing::error!(collector = %name, error = %e, "failed to record collector start");
        return;
    }

    let timeout = Duration::from_secs(def.timeout);

    while !*stop.borrow() {
        let params = ctx.parameters();
        let command = substitute(&def.command, &params);

        let result = match def.run {
            RunLocation::Target => match ctx.session() {
                Some(session) => session.execute(&command, timeout).await,
                None => CommandResult::failure(command.as_str(), "no target session", Utc::now()),
            },
            RunLocation::Host => host::execute_host_command(&command, timeout).await,
        };

        let appended = if result.success() {
            ctx.events().append(
                EventType::CollectorOutput,
                json!({
                    "collector": name,
                    "stdout": result.stdout,
                    "stderr": result.stderr,
                }),
            )
        } else {
            let error = if result.stderr.is_empty() {
                "Command failed".to_string()
            } else {
                result.stderr.clone()
            };
            ctx.events().append(
                EventType::CollectorError,
                json!({
                    "collector": name,
                    "error": error,
                }),
            )
        };
        if let Err(e) = appended {
            tracing::warn!(collector = %name, error = %e, "failed to record collector iteration");
        }

        let _ = notify.send(Notification::CollectorOutput {
            run_id: ctx.run_id().to_string(),
            collector: name.clone(),
            output: result.stdout.clone(),
            success: result.success(),
        });

        tokio::select! {
            _ = tokio::time::sleep(Duration::from_secs(def.interval)) => {}
            changed = stop.changed() => {
                // Sender gone means the run context was torn down
                if changed.is_err() {
                    break;
                }
            }
        }
    }

    if let Err(e) = ctx
        .events()
        .append(EventType::CollectorStopped, json!({"collector": name}))
    {
        tracing::warn!(collector = %name, error = %e, "failed to record collector stop");
    }
}
