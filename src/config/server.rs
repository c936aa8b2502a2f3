// ABOUTME: Per-server configuration: application URL, environment type, and SSH access.
// ABOUTME: Credentials are referenced by environment variable name, never stored inline.

use crate::ssh::{HostKeyPolicy, SessionConfig};
use serde::Deserialize;
use std::path::PathBuf;

use super::SshSettings;

/// Names of the environment variables holding one class of credentials.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct EnvVarNames {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

impl EnvVarNames {
    /// Fill unset names from fallbacks without touching names already declared.
    pub fn or_defaults(&self, username: Option<&str>, password: Option<&str>) -> EnvVarNames {
        EnvVarNames {
            username: self.username.clone().or_else(|| username.map(str::to_string)),
            password: self.password.clone().or_else(|| password.map(str::to_string)),
        }
    }

    pub(crate) fn merge(&mut self, overlay: EnvVarNames) {
        if overlay.username.is_some() {
            self.username = overlay.username;
        }
        if overlay.password.is_some() {
            self.password = overlay.password;
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Map key this server was declared under.
    #[serde(skip)]
    pub name: String,
    pub url: String,
    pub env_type: String,
    #[serde(default)]
    pub ssh_host: Option<String>,
    #[serde(default = "default_port")]
    pub ssh_port: u16,
    #[serde(default)]
    pub ssh_env_vars: EnvVarNames,
    #[serde(default)]
    pub ppm_api_env_vars: EnvVarNames,
    #[serde(default)]
    pub ci_vault_configs: Option<String>,
    #[serde(default = "default_trust_first_connection")]
    pub trust_first_connection: bool,
    #[serde(default)]
    pub known_hosts: Option<PathBuf>,
}

pub(crate) fn default_port() -> u16 {
    22
}

pub(crate) fn default_trust_first_connection() -> bool {
    true
}

impl ServerConfig {
    /// SSH session settings for this server, when it declares an `ssh_host`.
    pub fn ssh_session_config(
        &self,
        user: &str,
        password: &str,
        settings: &SshSettings,
    ) -> Option<SessionConfig> {
        let host = self.ssh_host.as_deref()?;
        let mut config = SessionConfig::new(host, self.ssh_port, user, password);
        config.host_keys = HostKeyPolicy {
            trust_first_connection: self.trust_first_connection,
            known_hosts: self.known_hosts.clone(),
        };
        config.inactivity_timeout = settings.inactivity_timeout;
        config.keepalive_interval = settings.keepalive_interval;
        Some(config)
    }
}
