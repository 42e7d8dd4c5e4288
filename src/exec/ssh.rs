// ABOUTME: SSH implementation of the executor boundary using russh.
// ABOUTME: Agent/key auth, known_hosts verification, exec, and upload via remote cat.

use super::error::{ExecError, Result};
use super::{CommandOutput, Connector, Executor};
use crate::config::ProjectConfig;
use crate::inventory::HostTarget;
use async_trait::async_trait;
use russh::client::{self, Config, Handle};
use russh::keys::agent::client::AgentClient;
use russh::keys::known_hosts::{check_known_hosts, learn_known_hosts};
use russh::keys::{load_secret_key, ssh_key, PrivateKeyWithHashAlg};
use russh::{ChannelMsg, Disconnect};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UnixStream;

/// Connects to hosts over SSH, one session per host pipeline.
pub struct SshConnector {
    key_path: Option<PathBuf>,
    trust_on_first_use: bool,
    command_timeout: Duration,
}

impl SshConnector {
    pub fn from_config(config: &ProjectConfig) -> Self {
        Self {
            key_path: config.ssh_key.clone(),
            trust_on_first_use: config.trust_first_connection,
            command_timeout: config.command_timeout,
        }
    }
}

#[async_trait]
impl Connector for SshConnector {
    async fn connect(&self, target: &HostTarget) -> Result<Box<dyn Executor>> {
        let session = Session::connect(
            target,
            self.key_path.as_deref(),
            self.trust_on_first_use,
            self.command_timeout,
        )
        .await?;
        Ok(Box::new(session))
    }
}

/// SSH client handler verifying server keys against known_hosts.
struct HostKeyHandler {
    host: String,
    port: u16,
    trust_on_first_use: bool,
}

impl client::Handler for HostKeyHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &ssh_key::PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        match check_known_hosts(&self.host, self.port, server_public_key) {
            Ok(true) => Ok(true),
            Ok(false) if self.trust_on_first_use => {
                tracing::warn!(
                    host = %self.host,
                    port = self.port,
                    "trust-on-first-use: accepting unknown host key"
                );
                if let Err(e) = learn_known_hosts(&self.host, self.port, server_public_key) {
                    tracing::warn!("failed to save host key to known_hosts: {}", e);
                }
                Ok(true)
            }
            Ok(false) => Ok(false),
            Err(russh::keys::Error::KeyChanged { .. }) => Ok(false),
            Err(_) => Ok(self.trust_on_first_use),
        }
    }
}

/// Authentication method resolved from configuration and environment.
enum AuthMethod {
    Agent(AgentClient<UnixStream>),
    KeyFile(Arc<ssh_key::PrivateKey>),
}

/// An established SSH session to one host.
struct Session {
    handle: Handle<HostKeyHandler>,
    command_timeout: Duration,
}

impl Session {
    async fn connect(
        target: &HostTarget,
        key_path: Option<&Path>,
        trust_on_first_use: bool,
        command_timeout: Duration,
    ) -> Result<Self> {
        let auth_method = resolve_auth_method(key_path).await?;

        let russh_config = Config {
            inactivity_timeout: Some(Duration::from_secs(30)),
            ..Default::default()
        };

        let handler = HostKeyHandler {
            host: target.ssh_host.clone(),
            port: target.ssh_port,
            trust_on_first_use,
        };

        let mut handle = client::connect(
            Arc::new(russh_config),
            (target.ssh_host.as_str(), target.ssh_port),
            handler,
        )
        .await
        .map_err(|e| {
            ExecError::Connection(format!(
                "{}:{}: {}",
                target.ssh_host, target.ssh_port, e
            ))
        })?;

        if !authenticate(&mut handle, &target.ssh_user, auth_method).await? {
            return Err(ExecError::AuthenticationFailed);
        }

        Ok(Self {
            handle,
            command_timeout,
        })
    }

    async fn exec_inner(&self, command: &str) -> Result<CommandOutput> {
        let mut channel = self
            .handle
            .channel_open_session()
            .await
            .map_err(|e| ExecError::CommandFailed(format!("failed to open channel: {}", e)))?;

        channel
            .exec(true, command)
            .await
            .map_err(|e| ExecError::CommandFailed(format!("failed to exec command: {}", e)))?;

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let mut exit_code = 0u32;
        let mut got_exit_status = false;
        let mut got_eof = false;

        loop {
            match channel.wait().await {
                Some(ChannelMsg::Data { data }) => {
                    stdout.extend_from_slice(&data);
                }
                Some(ChannelMsg::ExtendedData { data, ext }) => {
                    if ext == 1 {
                        stderr.extend_from_slice(&data);
                    }
                }
                Some(ChannelMsg::ExitStatus { exit_status }) => {
                    exit_code = exit_status;
                    got_exit_status = true;
                    if got_eof {
                        break;
                    }
                }
                Some(ChannelMsg::Eof) => {
                    got_eof = true;
                    if got_exit_status {
                        break;
                    }
                }
                Some(ChannelMsg::Close) => break,
                Some(_) => {}
                None => break,
            }
        }

        // A channel that closes without an exit status means the transport
        // died mid-command; the caller must not treat that as exit 0.
        if !got_exit_status {
            return Err(ExecError::ChannelClosed);
        }

        Ok(CommandOutput {
            exit_code,
            stdout: String::from_utf8_lossy(&stdout).to_string(),
            stderr: String::from_utf8_lossy(&stderr).to_string(),
        })
    }
}

#[async_trait]
impl Executor for Session {
    async fn exec(&self, command: &str) -> Result<CommandOutput> {
        match tokio::time::timeout(self.command_timeout, self.exec_inner(command)).await {
            Ok(result) => result,
            Err(_) => Err(ExecError::CommandTimeout(self.command_timeout)),
        }
    }

    async fn upload(&self, local: &Path, remote: &str) -> Result<()> {
        // Streamed, not buffered: artifact bundles can be large.
        let file = tokio::fs::File::open(local).await?;

        let mut channel = self
            .handle
            .channel_open_session()
            .await
            .map_err(|e| ExecError::Transfer(format!("failed to open channel: {}", e)))?;

        let dir = remote.rsplit_once('/').map(|(d, _)| d).unwrap_or(".");
        let command = format!("mkdir -p '{dir}' && cat > '{remote}'");
        channel
            .exec(true, command.as_str())
            .await
            .map_err(|e| ExecError::Transfer(format!("failed to start transfer: {}", e)))?;

        channel
            .data(file)
            .await
            .map_err(|e| ExecError::Transfer(format!("failed to send data: {}", e)))?;
        channel
            .eof()
            .await
            .map_err(|e| ExecError::Transfer(format!("failed to finish transfer: {}", e)))?;

        let mut exit_code = None;
        loop {
            match channel.wait().await {
                Some(ChannelMsg::ExitStatus { exit_status }) => {
                    exit_code = Some(exit_status);
                }
                Some(ChannelMsg::Close) | None => break,
                Some(_) => {}
            }
        }

        match exit_code {
            Some(0) => Ok(()),
            Some(code) => Err(ExecError::Transfer(format!(
                "remote write to '{remote}' exited with {code}"
            ))),
            None => Err(ExecError::ChannelClosed),
        }
    }

    async fn close(&self) -> Result<()> {
        self.handle
            .disconnect(Disconnect::ByApplication, "", "en")
            .await
            .map_err(ExecError::Protocol)
    }
}

/// Resolve which authentication method to use: explicit key, then SSH agent,
/// then default key locations.
async fn resolve_auth_method(key_path: Option<&Path>) -> Result<AuthMethod> {
    if let Some(key_path) = key_path {
        let key = load_secret_key(key_path, None).map_err(|e| ExecError::KeyLoadFailed {
            path: key_path.to_path_buf(),
            reason: e.to_string(),
        })?;
        return Ok(AuthMethod::KeyFile(Arc::new(key)));
    }

    if let Ok(agent) = AgentClient::connect_env().await {
        return Ok(AuthMethod::Agent(agent));
    }

    let home = std::env::var("HOME").map_err(|_| {
        ExecError::AgentUnavailable("SSH agent not available and HOME not set".to_string())
    })?;

    let default_keys = [
        format!("{}/.ssh/id_ed25519", home),
        format!("{}/.ssh/id_rsa", home),
        format!("{}/.ssh/id_ecdsa", home),
    ];

    for key_path in &default_keys {
        if let Ok(key) = load_secret_key(key_path, None) {
            return Ok(AuthMethod::KeyFile(Arc::new(key)));
        }
    }

    Err(ExecError::AgentUnavailable(
        "SSH agent not available and no default keys found".to_string(),
    ))
}

async fn authenticate(
    handle: &mut Handle<HostKeyHandler>,
    user: &str,
    auth_method: AuthMethod,
) -> Result<bool> {
    match auth_method {
        AuthMethod::Agent(mut agent) => {
            let keys = agent.request_identities().await.map_err(|e| {
                ExecError::AgentUnavailable(format!("failed to list agent keys: {}", e))
            })?;

            if keys.is_empty() {
                return Err(ExecError::AgentUnavailable(
                    "no keys in SSH agent".to_string(),
                ));
            }

            for key in &keys {
                match handle
                    .authenticate_publickey_with(user, key.clone(), None, &mut agent)
                    .await
                {
                    Ok(result) if result.success() => return Ok(true),
                    _ => continue,
                }
            }
            Ok(false)
        }
        AuthMethod::KeyFile(key) => {
            let hash_alg = handle
                .best_supported_rsa_hash()
                .await
                .map_err(ExecError::Protocol)?
                .flatten();

            let result = handle
                .authenticate_publickey(user, PrivateKeyWithHashAlg::new(key, hash_alg))
                .await
                .map_err(ExecError::Protocol)?;

            Ok(result.success())
        }
    }
}
