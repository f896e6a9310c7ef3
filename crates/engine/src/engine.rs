// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The run supervisor.

use crate::collector;
use crate::context::{CollectorHandle, RunContext};
use crate::error::EngineError;
use crate::host;
use crate::notify::{ConnectionStatus, Notification};
use parking_lot::Mutex;
use rig_adapters::{SessionFactory, SessionHooks, TargetConfig, TargetSession};
use rig_core::{utc_now, ArtifactRecord, Event, EventType, RunManifest, RunStatus, RunSummary};
use rig_profile::{substitute, ConnectionConfig, ProfileStore, RunLocation};
use rig_storage::{EventStream, StorageManager};
use serde_json::json;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};

/// Capacity of the subscriber broadcast channel; slow subscribers lag
/// rather than block the engine.
const NOTIFY_CAPACITY: usize = 256;

/// Result of `execute_command`: outputs plus any pulled artifacts.
#[derive(Debug, Clone)]
pub struct CommandOutcome {
    pub success: bool,
    pub command_name: String,
    pub run_location: RunLocation,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    /// Seconds of wall-clock time the command took.
    pub duration: f64,
    pub artifacts: Vec<ArtifactRecord>,
    /// Set when the command never ran (e.g. SSH connect failure).
    pub error: Option<String>,
}

impl CommandOutcome {
    fn connection_failure(command_name: &str, run_location: RunLocation) -> Self {
        Self {
            success: false,
            command_name: command_name.to_string(),
            run_location,
            exit_code: -1,
            stdout: String::new(),
            stderr: String::new(),
            duration: 0.0,
            artifacts: Vec::new(),
            error: Some("SSH connection failed".to_string()),
        }
    }
}

/// Central supervisor for runs.
///
/// Holds the active-run map, builds target sessions through the injected
/// factory, and fans notifications out to subscribers. All state for a
/// run lives in its [`RunContext`]; nothing here is process-global.
pub struct Engine {
    storage: StorageManager,
    profiles: ProfileStore,
    sessions: Arc<dyn SessionFactory>,
    runs: Mutex<HashMap<String, Arc<RunContext>>>,
    notify_tx: broadcast::Sender<Notification>,
}

impl Engine {
    pub fn new(
        storage: StorageManager,
        profiles: ProfileStore,
        sessions: Arc<dyn SessionFactory>,
    ) -> Self {
        let (notify_tx, _) = broadcast::channel(NOTIFY_CAPACITY);
        Self {
            storage,
            profiles,
            sessions,
            runs: Mutex::new(HashMap::new()),
            notify_tx,
        }
    }

    pub fn profiles(&self) -> &ProfileStore {
        &self.profiles
    }

    pub fn storage(&self) -> &StorageManager {
        &self.storage
    }

    /// Subscribe to live engine notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.notify_tx.subscribe()
    }

    fn notify(&self, notification: Notification) {
        // No subscribers is fine
        let _ = self.notify_tx.send(notification);
    }

    fn active(&self, run_id: &str) -> Option<Arc<RunContext>> {
        self.runs.lock().get(run_id).cloned()
    }

    /// Summary rows for all runs on disk, newest first.
    pub fn list_runs(&self) -> Result<Vec<RunSummary>, EngineError> {
        Ok(self.storage.list_runs()?)
    }

    /// Create a run against a profile: directory, manifest, profile
    /// snapshot, and the `run_created` event. The run is not started and
    /// not registered as active.
    pub fn create_run(
        &self,
        profile_name: &str,
        name: Option<&str>,
        parameters: Option<HashMap<String, String>>,
    ) -> Result<String, EngineError> {
        let profile = self.profiles.load(profile_name)?;
        let run_id = self.storage.generate_run_id(name);
        let parameters = parameters.unwrap_or_default();

        let manifest = RunManifest::new(
            &run_id,
            name.unwrap_or(&run_id),
            profile_name,
            utc_now(),
            parameters.clone(),
        );

        let run_storage = self
            .storage
            .create_run(&run_id, &manifest, &profile.to_yaml()?)?;

        let events = EventStream::open(run_storage.events_path())?;
        events.append(
            EventType::RunCreated,
            json!({
                "run_id": run_id,
                "profile_name": profile_name,
                "parameters": parameters,
            }),
        )?;

        tracing::info!(run_id, profile = profile_name, "run created");
        Ok(run_id)
    }

    /// Active context for a run, or one reconstructed from disk with no
    /// session and `is_running == false`.
    pub fn get_run(&self, run_id: &str) -> Result<Arc<RunContext>, EngineError> {
        if let Some(ctx) = self.active(run_id) {
            return Ok(ctx);
        }

        let run_storage = self
            .storage
            .get_run(run_id)
            .ok_or_else(|| EngineError::RunNotFound(run_id.to_string()))?;
        let manifest = run_storage.load_manifest()?;
        let profile = self.profiles.load(&manifest.profile_name)?;
        let events = Arc::new(EventStream::open(run_storage.events_path())?);

        Ok(Arc::new(RunContext::new(
            run_id,
            run_storage,
            manifest,
            profile,
            events,
        )))
    }

    /// Start or resume a run. Idempotent while running.
    ///
    /// Builds the run's SSH session (connection itself is deferred to the
    /// first target-bound operation) and registers the run as active.
    pub fn start_run(&self, run_id: &str) -> Result<(), EngineError> {
        let ctx = self.get_run(run_id)?;
        if ctx.is_running() {
            return Ok(());
        }

        let hooks = self.connection_hooks(run_id, &ctx);
        let session = self
            .sessions
            .open(target_config(&ctx.profile().connection), hooks);
        ctx.set_session(Some(session));

        let was_paused = ctx.manifest().status == RunStatus::Paused;
        ctx.update_manifest(|manifest| {
            manifest.status = RunStatus::Running;
            if manifest.started_at.is_none() {
                manifest.started_at = Some(utc_now());
            }
        })?;

        if was_paused {
            ctx.events().append(EventType::RunResumed, json!({}))?;
        } else {
            ctx.events().append(EventType::RunStarted, json!({}))?;
        }

        ctx.set_running(true);
        ctx.set_paused(false);
        self.runs.lock().insert(run_id.to_string(), Arc::clone(&ctx));

        tracing::info!(run_id, resumed = was_paused, "run started");
        self.notify(Notification::RunStatus {
            run_id: run_id.to_string(),
            status: RunStatus::Running,
        });
        Ok(())
    }

    /// Pause a running run: collectors are signalled to stop, the SSH
    /// session is left in place for resume.
    pub fn pause_run(&self, run_id: &str) -> Result<(), EngineError> {
        let ctx = self
            .active(run_id)
            .filter(|ctx| ctx.is_running())
            .ok_or_else(|| EngineError::RunNotActive(run_id.to_string()))?;

        self.stop_all_collectors(&ctx);

        ctx.set_running(false);
        ctx.set_paused(true);
        ctx.update_manifest(|manifest| manifest.status = RunStatus::Paused)?;
        ctx.events().append(EventType::RunPaused, json!({}))?;

        tracing::info!(run_id, "run paused");
        self.notify(Notification::RunStatus {
            run_id: run_id.to_string(),
            status: RunStatus::Paused,
        });
        Ok(())
    }

    /// Complete a run: stop collectors, disconnect, stamp
    /// `completed_at`, drop from the active map. Idempotent.
    pub async fn complete_run(&self, run_id: &str) -> Result<(), EngineError> {
        let ctx = match self.active(run_id) {
            Some(ctx) => ctx,
            None => self.get_run(run_id)?,
        };

        if ctx.manifest().status == RunStatus::Completed {
            self.runs.lock().remove(run_id);
            return Ok(());
        }

        self.finish_run(&ctx, RunStatus::Completed, EventType::RunCompleted, json!({}))
            .await?;

        tracing::info!(run_id, "run completed");
        self.notify(Notification::RunStatus {
            run_id: run_id.to_string(),
            status: RunStatus::Completed,
        });
        Ok(())
    }

    /// Abort a run on an external signal: same teardown as completion
    /// but the run lands in `interrupted`.
    pub async fn interrupt_run(
        &self,
        run_id: &str,
        reason: Option<&str>,
    ) -> Result<(), EngineError> {
        let ctx = match self.active(run_id) {
            Some(ctx) => ctx,
            None => self.get_run(run_id)?,
        };

        let data = match reason {
            Some(reason) => json!({"reason": reason}),
            None => json!({}),
        };
        self.finish_run(&ctx, RunStatus::Interrupted, EventType::RunInterrupted, data)
            .await?;

        tracing::warn!(run_id, reason, "run interrupted");
        self.notify(Notification::RunStatus {
            run_id: run_id.to_string(),
            status: RunStatus::Interrupted,
        });
        Ok(())
    }

    /// Shared teardown for terminal transitions.
    async fn finish_run(
        &self,
        ctx: &Arc<RunContext>,
        status: RunStatus,
        event_type: EventType,
        data: serde_json::Value,
    ) -> Result<(), EngineError> {
        self.stop_all_collectors(ctx);
        if let Some(session) = ctx.session() {
            session.disconnect().await;
        }

        ctx.set_running(false);
        ctx.set_paused(false);
        ctx.update_manifest(|manifest| {
            manifest.status = status;
            if status == RunStatus::Completed {
                manifest.completed_at = Some(utc_now());
            }
        })?;
        ctx.events().append(event_type, data)?;

        self.runs.lock().remove(ctx.run_id());
        Ok(())
    }

    /// Set a run parameter; works whether or not the run is active.
    pub fn set_parameter(
        &self,
        run_id: &str,
        name: &str,
        value: &str,
    ) -> Result<(), EngineError> {
        let ctx = self.get_run(run_id)?;
        ctx.set_parameter(name, value)?;
        ctx.events().append(
            EventType::ParameterSet,
            json!({"name": name, "value": value}),
        )?;
        Ok(())
    }

    /// Execute a named command on the host or the target, pulling any
    /// declared artifacts afterwards.
    ///
    /// A non-zero exit is not an `Err`: it is recorded as
    /// `command_failed` and returned with `success == false`.
    pub async fn execute_command(
        &self,
        run_id: &str,
        command_name: &str,
    ) -> Result<CommandOutcome, EngineError> {
        let ctx = self
            .active(run_id)
            .filter(|ctx| ctx.is_running())
            .ok_or_else(|| EngineError::RunNotActive(run_id.to_string()))?;

        let Some(cmd_def) = ctx.profile().commands.get(command_name).cloned() else {
            return Err(EngineError::CommandNotFound(command_name.to_string()));
        };

        ctx.events().append(
            EventType::CommandStarted,
            json!({
                "command_name": command_name,
                "run_location": cmd_def.run.as_str(),
                "description": cmd_def.description,
            }),
        )?;
        self.notify(Notification::CommandStarted {
            run_id: run_id.to_string(),
            command_name: command_name.to_string(),
        });

        let params = ctx.parameters();
        let command = substitute(&cmd_def.command, &params);
        let timeout = Duration::from_secs(cmd_def.timeout);

        let result = match cmd_def.run {
            RunLocation::Target => {
                let Some(session) = ctx.session() else {
                    return Err(EngineError::RunNotActive(run_id.to_string()));
                };
                if !session.is_connected().await && session.connect().await.is_err() {
                    ctx.events().append(
                        EventType::CommandFailed,
                        json!({
                            "command_name": command_name,
                            "error": "SSH connection failed",
                        }),
                    )?;
                    return Ok(CommandOutcome::connection_failure(command_name, cmd_def.run));
                }
                session.execute(&command, timeout).await
            }
            RunLocation::Host => host::execute_host_command(&command, timeout).await,
        };

        let success = result.success();
        let duration = result.duration();
        let payload = json!({
            "command_name": command_name,
            "command": command,
            "run_location": cmd_def.run.as_str(),
            "exit_code": result.exit_code,
            "stdout": result.stdout,
            "stderr": result.stderr,
            "duration": duration,
        });
        if success {
            ctx.events().append(EventType::CommandCompleted, payload)?;
        } else {
            ctx.events().append(EventType::CommandFailed, payload)?;
        }
        self.notify(Notification::CommandFinished {
            run_id: run_id.to_string(),
            command_name: command_name.to_string(),
            success,
            exit_code: result.exit_code,
        });

        let mut artifacts = Vec::new();
        if cmd_def.run == RunLocation::Target && !cmd_def.artifacts.is_empty() {
            if let Some(session) = ctx.session() {
                for template in &cmd_def.artifacts {
                    let remote_path = substitute(template, &params);
                    if let Some(record) = self
                        .pull_artifact(&ctx, &session, &remote_path, command_name)
                        .await?
                    {
                        artifacts.push(record);
                    }
                }
            }
        }

        Ok(CommandOutcome {
            success,
            command_name: command_name.to_string(),
            run_location: cmd_def.run,
            exit_code: result.exit_code,
            stdout: result.stdout,
            stderr: result.stderr,
            duration,
            artifacts,
            error: None,
        })
    }

    /// Pull one artifact into the run's `artifacts/` directory.
    ///
    /// A failed pull is recorded and isolated: it returns `Ok(None)` so
    /// later artifacts in the declaration order still transfer.
    async fn pull_artifact(
        &self,
        ctx: &Arc<RunContext>,
        session: &Arc<dyn TargetSession>,
        remote_path: &str,
        command_name: &str,
    ) -> Result<Option<ArtifactRecord>, EngineError> {
        ctx.events().append(
            EventType::ArtifactPullStarted,
            json!({"remote_path": remote_path}),
        )?;

        let basename = remote_path
            .rsplit('/')
            .next()
            .filter(|name| !name.is_empty())
            .unwrap_or("artifact");
        let temp_path = ctx.storage().artifacts_dir().join(format!("_temp_{basename}"));

        match session.download(remote_path, &temp_path).await {
            Ok(()) => {
                let local_path = ctx.storage().add_artifact(&temp_path, remote_path)?;
                if let Err(e) = std::fs::remove_file(&temp_path) {
                    tracing::warn!(
                        path = %temp_path.display(),
                        error = %e,
                        "failed to remove artifact scratch file",
                    );
                }

                let record = ArtifactRecord {
                    remote_path: remote_path.to_string(),
                    local_path,
                    command: command_name.to_string(),
                };
                ctx.push_artifact(record.clone())?;
                ctx.events().append(
                    EventType::ArtifactPulled,
                    json!({
                        "remote_path": record.remote_path,
                        "local_path": record.local_path,
                        "command": record.command,
                    }),
                )?;
                Ok(Some(record))
            }
            Err(e) => {
                tracing::warn!(remote_path, error = %e, "artifact pull failed");
                ctx.events().append(
                    EventType::ArtifactPullFailed,
                    json!({
                        "remote_path": remote_path,
                        "error": e.to_string(),
                    }),
                )?;
                Ok(None)
            }
        }
    }

    /// Start a background collector. No-op success if it is already
    /// running; for target collectors the SSH session is connected
    /// eagerly so a dead target fails fast.
    pub async fn start_collector(
        &self,
        run_id: &str,
        collector_name: &str,
    ) -> Result<(), EngineError> {
        let ctx = self
            .active(run_id)
            .filter(|ctx| ctx.is_running())
            .ok_or_else(|| EngineError::RunNotActive(run_id.to_string()))?;

        if ctx.collector_running(collector_name) {
            return Ok(());
        }

        let Some(def) = ctx
            .profile()
            .background_collectors
            .get(collector_name)
            .cloned()
        else {
            return Err(EngineError::CollectorNotFound(collector_name.to_string()));
        };

        if def.run == RunLocation::Target {
            let Some(session) = ctx.session() else {
                return Err(EngineError::RunNotActive(run_id.to_string()));
            };
            if !session.is_connected().await && session.connect().await.is_err() {
                return Err(EngineError::ConnectionFailed(run_id.to_string()));
            }
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        let running = Arc::new(AtomicBool::new(true));
        ctx.insert_collector(collector_name, CollectorHandle::new(stop_tx, running));

        tokio::spawn(collector::run_collector(
            Arc::clone(&ctx),
            collector_name.to_string(),
            def,
            stop_rx,
            self.notify_tx.clone(),
        ));

        tracing::info!(run_id, collector = collector_name, "collector started");
        self.notify(Notification::CollectorStatus {
            run_id: run_id.to_string(),
            collector: collector_name.to_string(),
            running: true,
        });
        Ok(())
    }

    /// Signal a collector to stop without waiting for its worker to
    /// exit. Idempotent for known collectors.
    pub fn stop_collector(&self, run_id: &str, collector_name: &str) -> Result<(), EngineError> {
        let ctx = self
            .active(run_id)
            .ok_or_else(|| EngineError::RunNotActive(run_id.to_string()))?;

        if ctx.signal_collector(collector_name) {
            tracing::info!(run_id, collector = collector_name, "collector stopping");
            self.notify(Notification::CollectorStatus {
                run_id: run_id.to_string(),
                collector: collector_name.to_string(),
                running: false,
            });
            return Ok(());
        }

        if ctx
            .profile()
            .background_collectors
            .contains_key(collector_name)
        {
            // Known collector that is not running: nothing to do
            return Ok(());
        }
        Err(EngineError::CollectorNotFound(collector_name.to_string()))
    }

    fn stop_all_collectors(&self, ctx: &RunContext) {
        for name in ctx.signal_all_collectors() {
            self.notify(Notification::CollectorStatus {
                run_id: ctx.run_id().to_string(),
                collector: name,
                running: false,
            });
        }
    }

    /// Append an operator note to the run's event stream.
    pub fn add_note(&self, run_id: &str, text: &str) -> Result<(), EngineError> {
        let ctx = self.get_run(run_id)?;
        ctx.events().append(EventType::Note, json!({"text": text}))?;
        Ok(())
    }

    /// Events with `seq > after_seq`, ascending.
    pub fn get_events(&self, run_id: &str, after_seq: u64) -> Result<Vec<Event>, EngineError> {
        let ctx = self.get_run(run_id)?;
        Ok(ctx.events().events_after(after_seq)?)
    }

    /// Zip the run directory; returns the archive path.
    pub fn export_run(&self, run_id: &str) -> Result<PathBuf, EngineError> {
        let run_storage = self
            .storage
            .get_run(run_id)
            .ok_or_else(|| EngineError::RunNotFound(run_id.to_string()))?;
        Ok(run_storage.create_archive()?)
    }

    /// Tear down any active resources, then remove the run directory.
    pub async fn delete_run(&self, run_id: &str) -> Result<(), EngineError> {
        let ctx = self.runs.lock().remove(run_id);
        if let Some(ctx) = ctx {
            self.stop_all_collectors(&ctx);
            if let Some(session) = ctx.session() {
                session.disconnect().await;
            }
        }

        if !self.storage.delete_run(run_id)? {
            return Err(EngineError::RunNotFound(run_id.to_string()));
        }
        tracing::info!(run_id, "run deleted");
        Ok(())
    }

    /// Wire a session's connection callbacks to the run's event stream
    /// and the subscriber channel.
    fn connection_hooks(&self, run_id: &str, ctx: &Arc<RunContext>) -> SessionHooks {
        let host = ctx.profile().connection.host.clone();
        let events = ctx.events_arc();
        let notify = self.notify_tx.clone();
        let id = run_id.to_string();

        let on_connect = {
            let events = Arc::clone(&events);
            let notify = notify.clone();
            let id = id.clone();
            Box::new(move || {
                if let Err(e) =
                    events.append(EventType::ConnectionEstablished, json!({"host": host}))
                {
                    tracing::error!(run_id = %id, error = %e, "failed to record connection event");
                }
                let _ = notify.send(Notification::Connection {
                    run_id: id.clone(),
                    status: ConnectionStatus::Connected,
                });
            }) as Box<dyn Fn() + Send + Sync>
        };

        let on_disconnect = {
            let events = Arc::clone(&events);
            let notify = notify.clone();
            let id = id.clone();
            Box::new(move |reason: &str| {
                if let Err(e) = events.append(EventType::ConnectionLost, json!({"reason": reason}))
                {
                    tracing::error!(run_id = %id, error = %e, "failed to record connection event");
                }
                let _ = notify.send(Notification::Connection {
                    run_id: id.clone(),
                    status: ConnectionStatus::Disconnected {
                        reason: reason.to_string(),
                    },
                });
            }) as Box<dyn Fn(&str) + Send + Sync>
        };

        let on_retry = {
            Box::new(move |attempt: u32, error: &str| {
                if let Err(e) = events.append(
                    EventType::ConnectionRetry,
                    json!({"attempt": attempt, "error": error}),
                ) {
                    tracing::error!(run_id = %id, error = %e, "failed to record connection event");
                }
                let _ = notify.send(Notification::Connection {
                    run_id: id.clone(),
                    status: ConnectionStatus::Retrying { attempt },
                });
            }) as Box<dyn Fn(u32, &str) + Send + Sync>
        };

        SessionHooks {
            on_connect: Some(on_connect),
            on_disconnect: Some(on_disconnect),
            on_retry: Some(on_retry),
        }
    }
}

fn target_config(connection: &ConnectionConfig) -> TargetConfig {
    let mut config = TargetConfig::new(connection.host.clone());
    config.port = connection.port;
    config.user = connection.user.clone();
    config.key_file = connection.key_file.clone();
    config.password = connection.password.clone();
    config.connect_timeout = Duration::from_secs(connection.timeout);
    config
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
