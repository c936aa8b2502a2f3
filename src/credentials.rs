// ABOUTME: Resolves SSH and PPM application credentials for a server.
// ABOUTME: Servers name the environment variables to read; there are no implicit fallbacks.

use crate::config::{DefaultCredentials, EnvVarNames, ServerConfig};
use crate::context::RunContext;
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// The two credential classes a server can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialClass {
    /// Login for the SSH host running kMigrator.
    Ssh,
    /// PPM service account passed to kMigrator.
    Application,
}

impl CredentialClass {
    /// Config key declaring this class's variable names.
    pub fn config_key(&self) -> &'static str {
        match self {
            CredentialClass::Ssh => "ssh_env_vars",
            CredentialClass::Application => "ppm_api_env_vars",
        }
    }
}

impl fmt::Display for CredentialClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialClass::Ssh => f.write_str("SSH"),
            CredentialClass::Application => f.write_str("PPM"),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CredentialError {
    #[error("{class} credential environment variable names not configured for server '{server}'")]
    NamesNotConfigured {
        server: String,
        class: CredentialClass,
    },

    #[error("{class} credentials for server '{server}' not set in environment: {}", .missing.join(", "))]
    ValuesMissing {
        server: String,
        class: CredentialClass,
        missing: Vec<String>,
    },
}

impl CredentialError {
    pub fn hint(&self) -> String {
        match self {
            CredentialError::NamesNotConfigured { server, class } => format!(
                "add to config/deployment-config.yaml:\n  servers:\n    {server}:\n      {}:\n        username: 'PPM_SERVICE_ACCOUNT_USER'\n        password: 'PPM_SERVICE_ACCOUNT_PASSWORD'",
                class.config_key()
            ),
            CredentialError::ValuesMissing { missing, .. } => {
                let exports: Vec<String> = missing
                    .iter()
                    .map(|var| format!("  export {var}='...'"))
                    .collect();
                format!("set them with:\n{}", exports.join("\n"))
            }
        }
    }
}

/// A resolved username/password pair. The password never appears in Debug output.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Reads credentials through the variable names each server declares.
#[derive(Debug, Clone)]
pub struct CredentialResolver {
    vars: HashMap<String, String>,
    defaults: DefaultCredentials,
}

impl CredentialResolver {
    pub fn new(ctx: &RunContext, defaults: &DefaultCredentials) -> Self {
        Self {
            vars: ctx.vars().clone(),
            defaults: defaults.clone(),
        }
    }

    pub fn ssh(&self, server: &ServerConfig) -> Result<Credentials, CredentialError> {
        self.resolve(server, CredentialClass::Ssh)
    }

    pub fn application(&self, server: &ServerConfig) -> Result<Credentials, CredentialError> {
        self.resolve(server, CredentialClass::Application)
    }

    /// Variable names in effect for a server, after applying configured defaults.
    pub fn names(&self, server: &ServerConfig, class: CredentialClass) -> EnvVarNames {
        match class {
            CredentialClass::Ssh => server.ssh_env_vars.or_defaults(
                self.defaults.ssh_username.as_deref(),
                self.defaults.ssh_password.as_deref(),
            ),
            CredentialClass::Application => server.ppm_api_env_vars.or_defaults(
                self.defaults.ppm_username.as_deref(),
                self.defaults.ppm_password.as_deref(),
            ),
        }
    }

    pub fn resolve(
        &self,
        server: &ServerConfig,
        class: CredentialClass,
    ) -> Result<Credentials, CredentialError> {
        let names = self.names(server, class);
        let (Some(username_var), Some(password_var)) = (names.username, names.password) else {
            return Err(CredentialError::NamesNotConfigured {
                server: server.name.clone(),
                class,
            });
        };

        let lookup = |var: &str| self.vars.get(var).filter(|v| !v.is_empty()).cloned();
        match (lookup(&username_var), lookup(&password_var)) {
            (Some(username), Some(password)) => {
                tracing::debug!(
                    "{class} credentials for {} loaded from {username_var}/{password_var}",
                    server.name
                );
                Ok(Credentials::new(username, password))
            }
            (username, password) => {
                let mut missing = Vec::new();
                if username.is_none() {
                    missing.push(username_var);
                }
                if password.is_none() {
                    missing.push(password_var);
                }
                Err(CredentialError::ValuesMissing {
                    server: server.name.clone(),
                    class,
                    missing,
                })
            }
        }
    }
}
