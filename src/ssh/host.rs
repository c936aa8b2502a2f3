// ABOUTME: Capability traits over a connected remote host and the factory that opens one.
// ABOUTME: Executors and storage backends depend on these rather than on russh directly.

use super::client::{CommandOutput, Session};
use super::error::{Error, Result};
use crate::config::{ServerConfig, SshSettings};
use crate::credentials::Credentials;
use async_trait::async_trait;
use std::path::Path;

/// A connected host that can run commands and move files.
#[async_trait]
pub trait RemoteHost: Send + Sync {
    fn host(&self) -> &str;

    async fn exec(&self, command: &str) -> Result<CommandOutput>;

    async fn upload(&self, local: &Path, remote: &str) -> Result<()>;

    async fn download(&self, remote: &str, local: &Path) -> Result<()>;

    async fn disconnect(&self) -> Result<()>;

    /// Run a command and fail on non-zero exit. `label` stands in for the
    /// command in errors and logs, so commands carrying secrets stay out of both.
    async fn exec_checked(&self, command: &str, label: &str) -> Result<CommandOutput> {
        tracing::debug!("{}: running {label}", self.host());
        let output = self.exec(command).await?;
        if !output.success() {
            return Err(Error::NonZeroExit {
                label: label.to_string(),
                host: self.host().to_string(),
                exit_code: output.exit_code,
                stderr: output.stderr.trim().to_string(),
            });
        }
        Ok(output)
    }
}

#[async_trait]
impl RemoteHost for Session {
    fn host(&self) -> &str {
        Session::host(self)
    }

    async fn exec(&self, command: &str) -> Result<CommandOutput> {
        Session::exec(self, command).await
    }

    async fn upload(&self, local: &Path, remote: &str) -> Result<()> {
        Session::upload(self, local, remote).await
    }

    async fn download(&self, remote: &str, local: &Path) -> Result<()> {
        Session::download(self, remote, local).await
    }

    async fn disconnect(&self) -> Result<()> {
        Session::disconnect(self).await
    }
}

/// Opens authenticated sessions to servers.
#[async_trait]
pub trait HostConnector: Send + Sync {
    async fn connect(
        &self,
        server: &ServerConfig,
        credentials: &Credentials,
        settings: &SshSettings,
    ) -> Result<Box<dyn RemoteHost>>;
}

/// Connector backed by real SSH sessions.
#[derive(Debug, Default, Clone, Copy)]
pub struct SshConnector;

#[async_trait]
impl HostConnector for SshConnector {
    async fn connect(
        &self,
        server: &ServerConfig,
        credentials: &Credentials,
        settings: &SshSettings,
    ) -> Result<Box<dyn RemoteHost>> {
        let config = server
            .ssh_session_config(&credentials.username, credentials.password(), settings)
            .ok_or_else(|| {
                Error::Connection(format!("server '{}' has no ssh_host configured", server.name))
            })?;
        let session = Session::connect(config).await?;
        Ok(Box::new(session))
    }
}
