// ABOUTME: Deployment configuration types and loading for config/deployment-config.yaml.
// ABOUTME: Handles YAML parsing, the local override layer, and workspace path layout.

mod deserialize;
mod layout;
mod overlay;
mod server;

pub use deserialize::{deserialize_scalar_string, deserialize_scalar_string_option};
pub use layout::{Layout, ROLLBACK_MANIFEST_FILE};
pub use overlay::{
    ConfigOverlay, DeploymentOverlay, KMigratorOverlay, S3Overlay, ServerOverlay, SshOverlay,
};
pub use server::{EnvVarNames, ServerConfig};

use crate::context::RunContext;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct DeploymentConfig {
    pub servers: HashMap<String, ServerConfig>,

    pub kmigrator: KMigratorConfig,

    #[serde(default)]
    pub deployment: DeploymentSettings,

    #[serde(default)]
    pub s3: Option<S3Config>,

    #[serde(default)]
    pub default_credentials: DefaultCredentials,

    #[serde(default)]
    pub ssh: SshSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct KMigratorConfig {
    pub extract_script: String,
    pub import_script: String,
}

/// Which storage backend holds bundles and snapshots.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    #[default]
    Local,
    S3,
}

impl StorageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageKind::Local => "local",
            StorageKind::S3 => "s3",
        }
    }
}

impl fmt::Display for StorageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeploymentSettings {
    #[serde(default)]
    pub storage_backend: StorageKind,
    #[serde(default = "default_archive_dir")]
    pub archive_dir: String,
    #[serde(default = "default_bundle_dir")]
    pub bundle_dir: String,
}

impl Default for DeploymentSettings {
    fn default() -> Self {
        Self {
            storage_backend: StorageKind::Local,
            archive_dir: default_archive_dir(),
            bundle_dir: default_bundle_dir(),
        }
    }
}

fn default_archive_dir() -> String {
    "archives".to_string()
}

fn default_bundle_dir() -> String {
    "bundles".to_string()
}

/// S3-compatible object storage (AWS or MinIO via `endpoint_url`).
#[derive(Debug, Clone, Deserialize)]
pub struct S3Config {
    pub bucket_name: String,
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default)]
    pub endpoint_url: Option<String>,
    #[serde(default = "default_prefix")]
    pub prefix: String,
    #[serde(default = "default_access_key_env")]
    pub access_key_env: String,
    #[serde(default = "default_secret_key_env")]
    pub secret_key_env: String,
    /// AWS CLI executable used for transfers.
    #[serde(default = "default_cli")]
    pub cli: String,
}

pub(crate) fn default_region() -> String {
    "us-east-1".to_string()
}

pub(crate) fn default_prefix() -> String {
    "bundles/".to_string()
}

pub(crate) fn default_access_key_env() -> String {
    "AWS_ACCESS_KEY_ID".to_string()
}

pub(crate) fn default_secret_key_env() -> String {
    "AWS_SECRET_ACCESS_KEY".to_string()
}

pub(crate) fn default_cli() -> String {
    "aws".to_string()
}

/// Credential variable names applied to servers that do not declare their own.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DefaultCredentials {
    #[serde(default)]
    pub ssh_username: Option<String>,
    #[serde(default)]
    pub ssh_password: Option<String>,
    #[serde(default)]
    pub ppm_username: Option<String>,
    #[serde(default)]
    pub ppm_password: Option<String>,
}

impl DefaultCredentials {
    pub(crate) fn merge(&mut self, overlay: DefaultCredentials) {
        if overlay.ssh_username.is_some() {
            self.ssh_username = overlay.ssh_username;
        }
        if overlay.ssh_password.is_some() {
            self.ssh_password = overlay.ssh_password;
        }
        if overlay.ppm_username.is_some() {
            self.ppm_username = overlay.ppm_username;
        }
        if overlay.ppm_password.is_some() {
            self.ppm_password = overlay.ppm_password;
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SshSettings {
    #[serde(default = "default_inactivity_timeout", with = "humantime_serde")]
    pub inactivity_timeout: Duration,
    #[serde(default = "default_keepalive_interval", with = "humantime_serde")]
    pub keepalive_interval: Duration,
}

impl Default for SshSettings {
    fn default() -> Self {
        Self {
            inactivity_timeout: default_inactivity_timeout(),
            keepalive_interval: default_keepalive_interval(),
        }
    }
}

fn default_inactivity_timeout() -> Duration {
    Duration::from_secs(300)
}

fn default_keepalive_interval() -> Duration {
    Duration::from_secs(30)
}

impl DeploymentConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let mut config: DeploymentConfig = serde_yaml::from_str(yaml)?;
        config.name_servers();
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::ConfigNotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Load the base config and, when `DEPLOYMENT_ENV=local`, layer the local overrides on top.
    pub fn load(layout: &Layout, ctx: &RunContext) -> Result<Self> {
        let base = Self::from_file(&layout.config_file())?;
        if !ctx.uses_local_overrides() {
            return Ok(base);
        }

        let override_path = layout.local_override_file();
        if !override_path.exists() {
            tracing::debug!(
                "DEPLOYMENT_ENV=local but {} does not exist",
                override_path.display()
            );
            return Ok(base);
        }

        tracing::info!("applying local overrides from {}", override_path.display());
        let overlay = ConfigOverlay::from_file(&override_path)?;
        base.merge(overlay)
    }

    pub(crate) fn name_servers(&mut self) {
        for (name, server) in self.servers.iter_mut() {
            server.name = name.clone();
        }
    }

    pub fn server(&self, name: &str) -> Result<&ServerConfig> {
        self.servers
            .get(name)
            .ok_or_else(|| Error::UnknownServer(name.to_string()))
    }

    /// Server name to environment type, as consumed by governance rules.
    pub fn env_types(&self) -> HashMap<String, String> {
        self.servers
            .iter()
            .map(|(name, server)| (name.clone(), server.env_type.clone()))
            .collect()
    }

    pub fn storage_kind(&self) -> StorageKind {
        self.deployment.storage_backend
    }

    pub fn s3(&self) -> Result<&S3Config> {
        self.s3.as_ref().ok_or_else(|| {
            Error::InvalidConfig("storage_backend is s3 but no s3 section is configured".to_string())
        })
    }

    /// Raw `ci_vault_configs` value for a server.
    pub fn vault_config(&self, server: &str) -> Result<&str> {
        self.server(server)?
            .ci_vault_configs
            .as_deref()
            .ok_or_else(|| {
                Error::InvalidConfig(format!("no ci_vault_configs defined for server '{server}'"))
            })
    }
}
