// ABOUTME: Application-wide error types for ppmdeploy.
// ABOUTME: Unifies module errors and classifies them for reporting at the CLI boundary.

use crate::archive::ArchiveError;
use crate::credentials::CredentialError;
use crate::executor::ExecutorError;
use crate::flags::FlagError;
use crate::rollback::RollbackError;
use crate::storage::StorageError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration file not found: {0}")]
    ConfigNotFound(PathBuf),

    #[error("server '{0}' not found in configuration")]
    UnknownServer(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("BOM validation failed with {} error(s)", .0.len())]
    Validation(Vec<String>),

    #[error("deployment metadata not found: {0}")]
    MetadataNotFound(PathBuf),

    #[error("invalid deployment state: {0}")]
    InvalidState(String),

    #[error(transparent)]
    Credentials(#[from] CredentialError),

    #[error(transparent)]
    Flags(#[from] FlagError),

    #[error(transparent)]
    Executor(#[from] ExecutorError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error(transparent)]
    Rollback(#[from] RollbackError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Broad failure classes, used to shape what the CLI tells the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad or missing configuration; raised before any side effect.
    Configuration,
    /// BOM rejected by schema or governance rules.
    Validation,
    /// A command, transfer, or file operation failed.
    Transport,
    /// Reconstructed artifacts do not match the environment being targeted.
    Consistency,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::ConfigNotFound(_)
            | Error::UnknownServer(_)
            | Error::InvalidConfig(_)
            | Error::Credentials(_)
            | Error::Flags(_)
            | Error::Yaml(_) => ErrorKind::Configuration,
            Error::Validation(_) => ErrorKind::Validation,
            Error::MetadataNotFound(_) | Error::InvalidState(_) => ErrorKind::Configuration,
            Error::Executor(e) => e.kind(),
            Error::Storage(e) => e.kind(),
            Error::Archive(_) | Error::Io(_) => ErrorKind::Transport,
            Error::Rollback(e) => e.kind(),
        }
    }

    /// Remediation text to print after the error, when there is something useful to say.
    pub fn hint(&self) -> Option<String> {
        match self {
            Error::ConfigNotFound(_) => {
                Some("run from the repository root or pass --root".to_string())
            }
            Error::MetadataNotFound(_) => {
                Some("run the extract phase first for this deployment type".to_string())
            }
            Error::Validation(_) => {
                Some("fix the errors in the BOM file before proceeding".to_string())
            }
            Error::Credentials(e) => Some(e.hint()),
            Error::Executor(ExecutorError::Credentials(e)) => Some(e.hint()),
            Error::Rollback(e) => e.hint(),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
