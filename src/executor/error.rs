// ABOUTME: Executor error types.
// ABOUTME: Command failures carry a label instead of the command line, which holds credentials.

use crate::credentials::CredentialError;
use crate::error::ErrorKind;
use crate::storage::StorageError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error(transparent)]
    Credentials(#[from] CredentialError),

    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{operation} failed ({status}): {stderr}")]
    CommandFailed {
        operation: String,
        status: String,
        stderr: String,
    },

    #[error(
        "no bundle found for entity {entity_id}: no 'Bundle saved to:' line in output and nothing matches {pattern}"
    )]
    BundleNotFound { entity_id: String, pattern: String },

    #[error("bundle file {} does not exist", .0.display())]
    BundleMissing(PathBuf),

    #[error("remote {operation} on {host} failed: {source}")]
    Remote {
        operation: String,
        host: String,
        #[source]
        source: crate::ssh::Error,
    },

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("I/O error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ExecutorError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ExecutorError::Credentials(_) => ErrorKind::Configuration,
            ExecutorError::Storage(e) => e.kind(),
            _ => ErrorKind::Transport,
        }
    }
}

pub type Result<T> = std::result::Result<T, ExecutorError>;
