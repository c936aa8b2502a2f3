// ABOUTME: Partial configuration layered over the base deployment config.
// ABOUTME: Merge is pure: override wins, nested sections and servers merge field by field.

use super::server::{default_port, default_trust_first_connection};
use super::{
    DefaultCredentials, DeploymentConfig, EnvVarNames, KMigratorConfig, S3Config, ServerConfig,
    StorageKind, default_access_key_env, default_cli, default_prefix, default_region,
    default_secret_key_env,
};
use crate::error::{Error, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Every field optional; absent fields leave the base value untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigOverlay {
    #[serde(default)]
    pub servers: HashMap<String, ServerOverlay>,
    #[serde(default)]
    pub kmigrator: Option<KMigratorOverlay>,
    #[serde(default)]
    pub deployment: Option<DeploymentOverlay>,
    #[serde(default)]
    pub s3: Option<S3Overlay>,
    #[serde(default)]
    pub default_credentials: Option<DefaultCredentials>,
    #[serde(default)]
    pub ssh: Option<SshOverlay>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerOverlay {
    pub url: Option<String>,
    pub env_type: Option<String>,
    pub ssh_host: Option<String>,
    pub ssh_port: Option<u16>,
    pub ssh_env_vars: Option<EnvVarNames>,
    pub ppm_api_env_vars: Option<EnvVarNames>,
    pub ci_vault_configs: Option<String>,
    pub trust_first_connection: Option<bool>,
    pub known_hosts: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct KMigratorOverlay {
    pub extract_script: Option<String>,
    pub import_script: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeploymentOverlay {
    pub storage_backend: Option<StorageKind>,
    pub archive_dir: Option<String>,
    pub bundle_dir: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct S3Overlay {
    pub bucket_name: Option<String>,
    pub region: Option<String>,
    pub endpoint_url: Option<String>,
    pub prefix: Option<String>,
    pub access_key_env: Option<String>,
    pub secret_key_env: Option<String>,
    pub cli: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SshOverlay {
    #[serde(default, with = "humantime_serde")]
    pub inactivity_timeout: Option<Duration>,
    #[serde(default, with = "humantime_serde")]
    pub keepalive_interval: Option<Duration>,
}

impl ConfigOverlay {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        // An empty override file parses as null.
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(yaml).map_err(Error::from)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }
}

fn set<T>(target: &mut T, value: Option<T>) {
    if let Some(v) = value {
        *target = v;
    }
}

impl ServerConfig {
    fn merge(&mut self, overlay: ServerOverlay) {
        set(&mut self.url, overlay.url);
        set(&mut self.env_type, overlay.env_type);
        if overlay.ssh_host.is_some() {
            self.ssh_host = overlay.ssh_host;
        }
        set(&mut self.ssh_port, overlay.ssh_port);
        if let Some(names) = overlay.ssh_env_vars {
            self.ssh_env_vars.merge(names);
        }
        if let Some(names) = overlay.ppm_api_env_vars {
            self.ppm_api_env_vars.merge(names);
        }
        if overlay.ci_vault_configs.is_some() {
            self.ci_vault_configs = overlay.ci_vault_configs;
        }
        set(&mut self.trust_first_connection, overlay.trust_first_connection);
        if overlay.known_hosts.is_some() {
            self.known_hosts = overlay.known_hosts;
        }
    }

    fn from_overlay(name: &str, overlay: ServerOverlay) -> Result<Self> {
        let missing = |field: &str| {
            Error::InvalidConfig(format!(
                "override adds server '{name}' without required field '{field}'"
            ))
        };
        Ok(ServerConfig {
            name: name.to_string(),
            url: overlay.url.ok_or_else(|| missing("url"))?,
            env_type: overlay.env_type.ok_or_else(|| missing("env_type"))?,
            ssh_host: overlay.ssh_host,
            ssh_port: overlay.ssh_port.unwrap_or_else(default_port),
            ssh_env_vars: overlay.ssh_env_vars.unwrap_or_default(),
            ppm_api_env_vars: overlay.ppm_api_env_vars.unwrap_or_default(),
            ci_vault_configs: overlay.ci_vault_configs,
            trust_first_connection: overlay
                .trust_first_connection
                .unwrap_or_else(default_trust_first_connection),
            known_hosts: overlay.known_hosts,
        })
    }
}

impl S3Config {
    fn merge(&mut self, overlay: S3Overlay) {
        set(&mut self.bucket_name, overlay.bucket_name);
        set(&mut self.region, overlay.region);
        if overlay.endpoint_url.is_some() {
            self.endpoint_url = overlay.endpoint_url;
        }
        set(&mut self.prefix, overlay.prefix);
        set(&mut self.access_key_env, overlay.access_key_env);
        set(&mut self.secret_key_env, overlay.secret_key_env);
        set(&mut self.cli, overlay.cli);
    }

    fn from_overlay(overlay: S3Overlay) -> Result<Self> {
        let bucket_name = overlay.bucket_name.ok_or_else(|| {
            Error::InvalidConfig("override adds an s3 section without bucket_name".to_string())
        })?;
        Ok(S3Config {
            bucket_name,
            region: overlay.region.unwrap_or_else(default_region),
            endpoint_url: overlay.endpoint_url,
            prefix: overlay.prefix.unwrap_or_else(default_prefix),
            access_key_env: overlay.access_key_env.unwrap_or_else(default_access_key_env),
            secret_key_env: overlay.secret_key_env.unwrap_or_else(default_secret_key_env),
            cli: overlay.cli.unwrap_or_else(default_cli),
        })
    }
}

impl KMigratorConfig {
    fn merge(&mut self, overlay: KMigratorOverlay) {
        set(&mut self.extract_script, overlay.extract_script);
        set(&mut self.import_script, overlay.import_script);
    }
}

impl DeploymentConfig {
    /// Layer an overlay on top of this config, returning the merged result.
    pub fn merge(mut self, overlay: ConfigOverlay) -> Result<Self> {
        for (name, server_overlay) in overlay.servers {
            match self.servers.get_mut(&name) {
                Some(existing) => existing.merge(server_overlay),
                None => {
                    let server = ServerConfig::from_overlay(&name, server_overlay)?;
                    self.servers.insert(name, server);
                }
            }
        }

        if let Some(kmigrator) = overlay.kmigrator {
            self.kmigrator.merge(kmigrator);
        }

        if let Some(deployment) = overlay.deployment {
            set(&mut self.deployment.storage_backend, deployment.storage_backend);
            set(&mut self.deployment.archive_dir, deployment.archive_dir);
            set(&mut self.deployment.bundle_dir, deployment.bundle_dir);
        }

        if let Some(s3) = overlay.s3 {
            match self.s3.as_mut() {
                Some(existing) => existing.merge(s3),
                None => self.s3 = Some(S3Config::from_overlay(s3)?),
            }
        }

        if let Some(defaults) = overlay.default_credentials {
            self.default_credentials.merge(defaults);
        }

        if let Some(ssh) = overlay.ssh {
            set(&mut self.ssh.inactivity_timeout, ssh.inactivity_timeout);
            set(&mut self.ssh.keepalive_interval, ssh.keepalive_interval);
        }

        Ok(self)
    }
}
