// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! SSH target session with automatic reconnection.

use super::{SessionError, SessionFactory, SessionHooks, TargetConfig, TargetSession};
use async_trait::async_trait;
use chrono::Utc;
use rig_core::CommandResult;
use russh::client::{self, Handle};
use russh::{ChannelMsg, Disconnect};
use russh_sftp::client::SftpSession;
use russh_sftp::protocol::StatusCode;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

struct ClientHandler;

#[async_trait]
impl client::Handler for ClientHandler {
    type Error = russh::Error;

    // Field targets get reimaged constantly; host keys are accepted as presented.
    async fn check_server_key(
        &mut self,
        _server_public_key: &russh_keys::key::PublicKey,
    ) -> Result<bool, Self::Error> {
        Ok(true)
    }
}

struct Transport {
    handle: Handle<ClientHandler>,
    /// SFTP subchannel, opened on first file operation.
    sftp: Option<SftpSession>,
}

/// SSH session over russh with a lazy SFTP subchannel.
///
/// Every operation goes through one session-wide lock: liveness check,
/// transparent reconnect, then the operation itself. Command failures
/// surface as `CommandResult` with exit code −1; transfer failures as
/// `SessionError`.
pub struct SshSession {
    config: TargetConfig,
    hooks: SessionHooks,
    transport: Mutex<Option<Transport>>,
}

impl SshSession {
    pub fn new(config: TargetConfig, hooks: SessionHooks) -> Self {
        Self {
            config,
            hooks,
            transport: Mutex::new(None),
        }
    }

    /// Verify the transport is live, reconnecting if it died.
    async fn ensure_connected(
        &self,
        slot: &mut Option<Transport>,
    ) -> Result<(), SessionError> {
        match slot.as_ref() {
            Some(transport) if !transport.handle.is_closed() => Ok(()),
            Some(_) => {
                self.hooks.disconnected("Connection lost");
                *slot = None;
                self.connect_locked(slot).await
            }
            None => self.connect_locked(slot).await,
        }
    }

    /// Retry-loop connect; fires hooks per the connect protocol.
    async fn connect_locked(&self, slot: &mut Option<Transport>) -> Result<(), SessionError> {
        let mut last_error = String::from("no connection attempts configured");

        for attempt in 1..=self.config.retry_attempts {
            match self.try_connect().await {
                Ok(handle) => {
                    *slot = Some(Transport { handle, sftp: None });
                    self.hooks.connected();
                    return Ok(());
                }
                Err(error) => {
                    tracing::warn!(
                        host = %self.config.host,
                        attempt,
                        error = %error,
                        "ssh connect attempt failed",
                    );
                    last_error = error;
                    if attempt < self.config.retry_attempts {
                        self.hooks.retrying(attempt, &last_error);
                        tokio::time::sleep(self.config.retry_delay).await;
                    } else {
                        let reason =
                            format!("failed after {attempt} attempts: {last_error}");
                        self.hooks.disconnected(&reason);
                        return Err(SessionError::ConnectFailed(reason));
                    }
                }
            }
        }

        Err(SessionError::ConnectFailed(last_error))
    }

    /// One connection + authentication attempt.
    async fn try_connect(&self) -> Result<Handle<ClientHandler>, String> {
        let ssh_config = Arc::new(client::Config::default());
        let address = (self.config.host.as_str(), self.config.port);

        let connecting = client::connect(ssh_config, address, ClientHandler);
        let mut handle = match tokio::time::timeout(self.config.connect_timeout, connecting).await
        {
            Ok(Ok(handle)) => handle,
            Ok(Err(e)) => return Err(e.to_string()),
            Err(_) => {
                return Err(format!(
                    "connect timed out after {}s",
                    self.config.connect_timeout.as_secs()
                ))
            }
        };

        let authenticated = if let Some(key_file) = &self.config.key_file {
            let key_path = expand_tilde(key_file);
            let key =
                russh_keys::load_secret_key(&key_path, None).map_err(|e| e.to_string())?;
            handle
                .authenticate_publickey(&self.config.user, Arc::new(key))
                .await
                .map_err(|e| e.to_string())?
        } else if let Some(password) = &self.config.password {
            handle
                .authenticate_password(&self.config.user, password)
                .await
                .map_err(|e| e.to_string())?
        } else {
            // No explicit credentials: try the usual key locations
            let mut authenticated = false;
            for candidate in default_key_paths() {
                if !candidate.exists() {
                    continue;
                }
                let Ok(key) = russh_keys::load_secret_key(&candidate, None) else {
                    continue;
                };
                if handle
                    .authenticate_publickey(&self.config.user, Arc::new(key))
                    .await
                    .map_err(|e| e.to_string())?
                {
                    authenticated = true;
                    break;
                }
            }
            authenticated
        };

        if !authenticated {
            return Err(format!(
                "authentication failed for {}@{}",
                self.config.user, self.config.host
            ));
        }

        Ok(handle)
    }

    /// Open the SFTP subchannel on first use.
    async fn sftp_handle<'a>(
        slot: &'a mut Option<Transport>,
    ) -> Result<&'a SftpSession, SessionError> {
        let Some(transport) = slot.as_mut() else {
            return Err(SessionError::ConnectFailed("not connected".to_string()));
        };

        if transport.sftp.is_none() {
            let mut channel = transport
                .handle
                .channel_open_session()
                .await
                .map_err(|e| SessionError::Protocol(e.to_string()))?;
            channel
                .request_subsystem(true, "sftp")
                .await
                .map_err(|e| SessionError::Protocol(e.to_string()))?;
            let sftp = SftpSession::new(channel.into_stream())
                .await
                .map_err(|e| SessionError::Protocol(e.to_string()))?;
            transport.sftp = Some(sftp);
        }

        match &transport.sftp {
            Some(sftp) => Ok(sftp),
            None => Err(SessionError::Protocol("sftp subsystem unavailable".to_string())),
        }
    }
}

#[async_trait]
impl TargetSession for SshSession {
    async fn is_connected(&self) -> bool {
        let slot = self.transport.lock().await;
        slot.as_ref().is_some_and(|t| !t.handle.is_closed())
    }

    async fn connect(&self) -> Result<(), SessionError> {
        let mut slot = self.transport.lock().await;
        match slot.as_ref() {
            Some(transport) if !transport.handle.is_closed() => Ok(()),
            _ => {
                *slot = None;
                self.connect_locked(&mut slot).await
            }
        }
    }

    async fn execute(&self, command: &str, timeout: Duration) -> CommandResult {
        let started_at = Utc::now();
        let mut slot = self.transport.lock().await;

        if self.ensure_connected(&mut slot).await.is_err() {
            return CommandResult::failure(command, "Connection failed", started_at);
        }

        let outcome = {
            let Some(transport) = slot.as_ref() else {
                return CommandResult::failure(command, "Connection failed", started_at);
            };
            tokio::time::timeout(timeout, run_remote(&transport.handle, command)).await
        };

        match outcome {
            Ok(Ok((exit_code, stdout, stderr))) => CommandResult {
                command: command.to_string(),
                exit_code,
                stdout,
                stderr,
                started_at,
                finished_at: Utc::now(),
            },
            Ok(Err(e)) => {
                // Transport is suspect; drop it so the next op reconnects
                *slot = None;
                CommandResult::failure(command, e.to_string(), started_at)
            }
            Err(_) => {
                // The channel was abandoned mid-command
                *slot = None;
                CommandResult::failure(
                    command,
                    format!("Command timed out after {}s", timeout.as_secs()),
                    started_at,
                )
            }
        }
    }

    async fn download(&self, remote: &str, local: &Path) -> Result<(), SessionError> {
        let mut slot = self.transport.lock().await;
        self.ensure_connected(&mut slot).await?;

        if let Some(parent) = local.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| SessionError::Transfer(e.to_string()))?;
        }

        let sftp = Self::sftp_handle(&mut slot).await?;
        let mut remote_file = sftp
            .open(remote)
            .await
            .map_err(|e| map_sftp_error(e, remote))?;
        let mut local_file = tokio::fs::File::create(local)
            .await
            .map_err(|e| SessionError::Transfer(e.to_string()))?;
        tokio::io::copy(&mut remote_file, &mut local_file)
            .await
            .map_err(|e| SessionError::Transfer(e.to_string()))?;
        local_file
            .flush()
            .await
            .map_err(|e| SessionError::Transfer(e.to_string()))?;

        Ok(())
    }

    async fn upload(&self, local: &Path, remote: &str) -> Result<(), SessionError> {
        let mut slot = self.transport.lock().await;
        self.ensure_connected(&mut slot).await?;

        let sftp = Self::sftp_handle(&mut slot).await?;
        let mut local_file = tokio::fs::File::open(local)
            .await
            .map_err(|e| SessionError::Transfer(e.to_string()))?;
        let mut remote_file = sftp
            .create(remote)
            .await
            .map_err(|e| map_sftp_error(e, remote))?;
        tokio::io::copy(&mut local_file, &mut remote_file)
            .await
            .map_err(|e| SessionError::Transfer(e.to_string()))?;
        remote_file
            .shutdown()
            .await
            .map_err(|e| SessionError::Transfer(e.to_string()))?;

        Ok(())
    }

    async fn file_exists(&self, remote: &str) -> bool {
        let mut slot = self.transport.lock().await;
        if self.ensure_connected(&mut slot).await.is_err() {
            return false;
        }
        match Self::sftp_handle(&mut slot).await {
            Ok(sftp) => sftp.metadata(remote).await.is_ok(),
            Err(_) => false,
        }
    }

    async fn disconnect(&self) {
        let mut slot = self.transport.lock().await;
        if let Some(transport) = slot.take() {
            let _ = transport
                .handle
                .disconnect(Disconnect::ByApplication, "", "English")
                .await;
        }
    }
}

/// Run one command over a fresh channel, collecting output and exit status.
async fn run_remote(
    handle: &Handle<ClientHandler>,
    command: &str,
) -> Result<(i32, String, String), russh::Error> {
    let mut channel = handle.channel_open_session().await?;
    channel.exec(true, command).await?;

    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    let mut exit_code = None;

    while let Some(msg) = channel.wait().await {
        match msg {
            ChannelMsg::Data { ref data } => stdout.extend_from_slice(data),
            ChannelMsg::ExtendedData { ref data, ext: 1 } => stderr.extend_from_slice(data),
            ChannelMsg::ExitStatus { exit_status } => exit_code = Some(exit_status as i32),
            _ => {}
        }
    }

    Ok((
        exit_code.unwrap_or(-1),
        String::from_utf8_lossy(&stdout).into_owned(),
        String::from_utf8_lossy(&stderr).into_owned(),
    ))
}

fn map_sftp_error(error: russh_sftp::client::error::Error, remote: &str) -> SessionError {
    use russh_sftp::client::error::Error as SftpError;
    match &error {
        SftpError::Status(status) => match status.status_code {
            StatusCode::NoSuchFile => SessionError::RemoteNotFound(remote.to_string()),
            StatusCode::PermissionDenied => SessionError::PermissionDenied(remote.to_string()),
            _ => SessionError::Transfer(error.to_string()),
        },
        _ => SessionError::Transfer(error.to_string()),
    }
}

fn expand_tilde(path: &str) -> PathBuf {
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    } else if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

fn default_key_paths() -> Vec<PathBuf> {
    let Some(home) = dirs::home_dir() else {
        return Vec::new();
    };
    ["id_ed25519", "id_rsa", "id_ecdsa"]
        .iter()
        .map(|name| home.join(".ssh").join(name))
        .collect()
}

/// Production factory: one [`SshSession`] per started run.
#[derive(Debug, Clone, Default)]
pub struct SshSessionFactory;

impl SshSessionFactory {
    pub fn new() -> Self {
        Self
    }
}

impl SessionFactory for SshSessionFactory {
    fn open(&self, config: TargetConfig, hooks: SessionHooks) -> Arc<dyn TargetSession> {
        Arc::new(SshSession::new(config, hooks))
    }
}

#[cfg(test)]
#[path = "ssh_tests.rs"]
mod tests;
