// ABOUTME: SSH session management using russh.
// ABOUTME: Handles password authentication, command execution, and file transfer over exec channels.

use super::error::{Error, Result};
use russh::client::{self, Config, Handle};
use russh::keys::known_hosts;
use russh::keys::ssh_key::PublicKey;
use russh::{ChannelMsg, Disconnect};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// How unknown and changed host keys are treated.
#[derive(Debug, Clone, Default)]
pub struct HostKeyPolicy {
    /// Accept and record a key the first time a host is seen.
    pub trust_first_connection: bool,
    /// known_hosts file; `None` means `~/.ssh/known_hosts`.
    pub known_hosts: Option<PathBuf>,
}

impl HostKeyPolicy {
    fn is_known(&self, host: &str, port: u16, key: &PublicKey) -> std::result::Result<bool, russh::keys::Error> {
        match &self.known_hosts {
            Some(path) => known_hosts::check_known_hosts_path(host, port, key, path),
            None => known_hosts::check_known_hosts(host, port, key),
        }
    }

    fn remember(&self, host: &str, port: u16, key: &PublicKey) {
        let learned = match &self.known_hosts {
            Some(path) => known_hosts::learn_known_hosts_path(host, port, key, path),
            None => known_hosts::learn_known_hosts(host, port, key),
        };
        if let Err(e) = learned {
            tracing::warn!("could not record host key for {host}:{port}: {e}");
        }
    }

    fn accepts(&self, host: &str, port: u16, key: &PublicKey) -> bool {
        match self.is_known(host, port, key) {
            Ok(true) => true,
            Ok(false) if self.trust_first_connection => {
                tracing::warn!("accepting unknown host key for {host}:{port} on first connection");
                self.remember(host, port, key);
                true
            }
            Ok(false) => false,
            Err(russh::keys::Error::KeyChanged { .. }) => {
                tracing::error!("host key for {host}:{port} has changed");
                false
            }
            Err(_) => self.trust_first_connection,
        }
    }
}

/// Everything needed to open one SSH session to a PPM host.
#[derive(Clone)]
pub struct SessionConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    password: String,
    pub host_keys: HostKeyPolicy,
    pub inactivity_timeout: Duration,
    pub keepalive_interval: Duration,
}

impl std::fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("host_keys", &self.host_keys)
            .finish()
    }
}

impl SessionConfig {
    pub fn new(
        host: impl Into<String>,
        port: u16,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            user: user.into(),
            password: password.into(),
            host_keys: HostKeyPolicy::default(),
            inactivity_timeout: Duration::from_secs(300),
            keepalive_interval: Duration::from_secs(30),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Exit status and captured text of a remote command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_code: u32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Quote a value for a POSIX shell command line.
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

pub(crate) struct SshHandler {
    host: String,
    port: u16,
    policy: HostKeyPolicy,
}

impl client::Handler for SshHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        Ok(self.policy.accepts(&self.host, self.port, server_public_key))
    }
}

/// Raw result of one exec channel.
struct ChannelResult {
    exit_code: u32,
    stdout: Vec<u8>,
    stderr: Vec<u8>,
}

impl ChannelResult {
    fn into_output(self) -> CommandOutput {
        CommandOutput {
            exit_code: self.exit_code,
            stdout: String::from_utf8_lossy(&self.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&self.stderr).into_owned(),
        }
    }

    fn transfer_error(&self, what: &str) -> Error {
        Error::Transfer(format!(
            "{what} exited with {}: {}",
            self.exit_code,
            String::from_utf8_lossy(&self.stderr).trim()
        ))
    }
}

/// An authenticated SSH session.
pub struct Session {
    config: SessionConfig,
    handle: Arc<Handle<SshHandler>>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session").field("config", &self.config).finish_non_exhaustive()
    }
}

impl Session {
    /// Connect and authenticate with the configured password.
    pub async fn connect(config: SessionConfig) -> Result<Self> {
        let russh_config = Arc::new(Config {
            inactivity_timeout: Some(config.inactivity_timeout),
            keepalive_interval: Some(config.keepalive_interval),
            ..Default::default()
        });
        let handler = SshHandler {
            host: config.host.clone(),
            port: config.port,
            policy: config.host_keys.clone(),
        };

        let mut handle = client::connect(russh_config, (config.host.as_str(), config.port), handler)
            .await
            .map_err(|e| match e.to_string() {
                msg if msg.contains("Connection refused") => {
                    Error::Connection(format!("connection refused to {}", config.endpoint()))
                }
                msg => Error::Connection(format!("{}: {msg}", config.endpoint())),
            })?;

        let auth = handle
            .authenticate_password(&config.user, &config.password)
            .await?;
        if !auth.success() {
            return Err(Error::AuthenticationFailed {
                user: config.user.clone(),
                host: config.host.clone(),
            });
        }

        tracing::debug!("connected to {}@{}", config.user, config.endpoint());
        Ok(Self {
            config,
            handle: Arc::new(handle),
        })
    }

    pub fn host(&self) -> &str {
        &self.config.host
    }

    /// Open an exec channel for `command`, feed it `stdin` when given, and drain it.
    async fn run(&self, command: &str, stdin: Option<&[u8]>) -> Result<ChannelResult> {
        let mut channel = self
            .handle
            .channel_open_session()
            .await
            .map_err(|e| Error::CommandFailed(format!("failed to open channel: {e}")))?;
        channel
            .exec(true, command)
            .await
            .map_err(|e| Error::CommandFailed(format!("failed to start `{command}`: {e}")))?;

        if let Some(bytes) = stdin {
            channel
                .data(bytes)
                .await
                .map_err(|e| Error::Transfer(format!("writing to `{command}` failed: {e}")))?;
            channel
                .eof()
                .await
                .map_err(|e| Error::Transfer(format!("closing `{command}` input failed: {e}")))?;
        }

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let mut exit_code = None;
        let mut eof = false;
        while let Some(msg) = channel.wait().await {
            match msg {
                ChannelMsg::Data { data } => stdout.extend_from_slice(&data),
                ChannelMsg::ExtendedData { data, ext: 1 } => stderr.extend_from_slice(&data),
                ChannelMsg::ExitStatus { exit_status } => exit_code = Some(exit_status),
                ChannelMsg::Eof => eof = true,
                ChannelMsg::Close => break,
                _ => {}
            }
            if eof && exit_code.is_some() {
                break;
            }
        }

        let exit_code = exit_code.ok_or(Error::ChannelClosed)?;
        Ok(ChannelResult {
            exit_code,
            stdout,
            stderr,
        })
    }

    /// Execute a command on the remote host.
    pub async fn exec(&self, command: &str) -> Result<CommandOutput> {
        Ok(self.run(command, None).await?.into_output())
    }

    /// Copy a local file to `remote` by streaming it into `cat` on the host.
    pub async fn upload(&self, local: &Path, remote: &str) -> Result<()> {
        let bytes = tokio::fs::read(local).await?;
        let result = self
            .run(&format!("cat > {}", shell_quote(remote)), Some(&bytes))
            .await?;
        if result.exit_code != 0 {
            return Err(result.transfer_error(&format!("upload to {remote}")));
        }
        tracing::debug!("uploaded {} bytes to {}:{remote}", bytes.len(), self.config.host);
        Ok(())
    }

    /// Copy `remote` from the host into a local file.
    pub async fn download(&self, remote: &str, local: &Path) -> Result<()> {
        let result = self.run(&format!("cat {}", shell_quote(remote)), None).await?;
        if result.exit_code != 0 {
            return Err(result.transfer_error(&format!("download of {remote}")));
        }
        tokio::fs::write(local, &result.stdout).await?;
        tracing::debug!(
            "downloaded {} bytes from {}:{remote}",
            result.stdout.len(),
            self.config.host
        );
        Ok(())
    }

    pub async fn disconnect(&self) -> Result<()> {
        self.handle
            .disconnect(Disconnect::ByApplication, "", "en")
            .await?;
        Ok(())
    }
}
