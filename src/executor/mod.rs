// ABOUTME: kMigrator execution against a server, locally (mock scripts) or over SSH.
// ABOUTME: One factory picks the implementation so orchestration code never branches on mode.

mod error;
mod local;
mod remote;

pub use error::{ExecutorError, Result};
pub use local::LocalExecutor;
pub use remote::RemoteExecutor;

use crate::bom::{I18nMode, RefdataMode};
use crate::config::{Layout, ServerConfig, SshSettings, StorageKind};
use crate::credentials::CredentialResolver;
use crate::diagnostics::Diagnostics;
use crate::ssh::HostConnector;
use crate::storage::{BundleHandle, StorageBackend};
use crate::types::{FlagString, RunId};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// Marker kMigrator prints before the path of the bundle it wrote.
pub const BUNDLE_SAVED_MARKER: &str = "Bundle saved to:";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    Local,
    Remote,
}

impl ExecutionMode {
    /// Remote only when the server has an SSH host and bundles go to non-local storage.
    pub fn select(server: &ServerConfig, storage: StorageKind) -> Self {
        if server.ssh_host.is_some() && storage != StorageKind::Local {
            ExecutionMode::Remote
        } else {
            ExecutionMode::Local
        }
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionMode::Local => f.write_str("local"),
            ExecutionMode::Remote => f.write_str("remote"),
        }
    }
}

/// Extract one entity from a server.
#[derive(Debug, Clone, Copy)]
pub struct ExtractRequest<'a> {
    pub script: &'a str,
    pub url: &'a str,
    pub entity_id: &'a str,
    pub reference_code: Option<&'a str>,
    pub server: &'a ServerConfig,
}

/// Import one bundle into a server.
#[derive(Debug, Clone, Copy)]
pub struct ImportRequest<'a> {
    pub script: &'a str,
    pub url: &'a str,
    pub bundle: &'a BundleHandle,
    pub flags: &'a FlagString,
    pub i18n: I18nMode,
    pub refdata: RefdataMode,
    pub server: &'a ServerConfig,
}

#[async_trait]
pub trait Executor: Send + Sync {
    fn mode(&self) -> ExecutionMode;

    async fn extract(&self, request: &ExtractRequest<'_>) -> Result<BundleHandle>;

    async fn import_bundle(&self, request: &ImportRequest<'_>) -> Result<()>;
}

/// Everything an executor may need, shared across the run.
#[derive(Clone)]
pub struct ExecutorDeps {
    pub layout: Layout,
    pub credentials: CredentialResolver,
    pub run_id: RunId,
    pub storage: Arc<dyn StorageBackend>,
    pub connector: Arc<dyn HostConnector>,
    pub ssh: SshSettings,
    pub diagnostics: Arc<Diagnostics>,
}

/// Build the executor for a server under the active storage backend.
pub fn create_executor(server: &ServerConfig, deps: &ExecutorDeps) -> Box<dyn Executor> {
    let mode = ExecutionMode::select(server, deps.storage.kind());
    tracing::debug!("executor for {}: {mode}", server.name);
    match mode {
        ExecutionMode::Local => Box::new(LocalExecutor::new(
            deps.layout.clone(),
            deps.credentials.clone(),
        )),
        ExecutionMode::Remote => Box::new(RemoteExecutor::new(deps.clone())),
    }
}

/// Path printed after the bundle marker, if any line carries it.
pub(crate) fn parse_bundle_path(stdout: &str) -> Option<&str> {
    stdout
        .lines()
        .find_map(|line| line.split_once(BUNDLE_SAVED_MARKER))
        .map(|(_, path)| path.trim())
        .filter(|path| !path.is_empty())
}
