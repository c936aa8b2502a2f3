// ABOUTME: Rollback to a past deployment by replaying its archive into the target server.
// ABOUTME: Archives are resolved from pipeline artifacts, a storage snapshot, or the local workspace.

mod gitlab;
mod replay;
mod resolver;
mod sources;

pub use gitlab::{ArtifactStore, GitLabClient, Job, select_archive_job};
pub use replay::{ReplayRequest, RollbackSummary, replay};
pub use resolver::{RollbackResolver, verify_target};
pub use sources::{
    LocalArchiveSource, PipelineArtifactSource, ResolvedArchive, RollbackSource, SnapshotSource,
};

use crate::archive::ArchiveError;
use crate::error::ErrorKind;
use crate::executor::ExecutorError;
use crate::storage::StorageError;
use crate::types::RunIdError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RollbackError {
    #[error("BOM has no rollback_pipeline_id")]
    MissingReference,

    #[error("invalid rollback_pipeline_id: {0}")]
    InvalidReference(#[from] RunIdError),

    #[error("ROLLBACK_MANIFEST.yaml not found at {}", .0.display())]
    LocalManifestMissing(PathBuf),

    #[error("{what} not found at {}", .path.display())]
    NotFound { what: String, path: PathBuf },

    #[error("GitLab API unavailable: {0}")]
    GitLabUnavailable(String),

    #[error("GitLab {operation} failed: {message}")]
    GitLab { operation: String, message: String },

    #[error("no successful archive job found in pipeline {0}")]
    NoArchiveJob(String),

    #[error("failed to retrieve rollback snapshot from {location}: {reason}")]
    Snapshot { location: String, reason: String },

    #[error("rollback manifest is missing {0}")]
    ManifestIncomplete(&'static str),

    #[error(
        "target server mismatch: the rollback archive was for '{manifest_target}', but the BOM targets '{bom_target}'"
    )]
    TargetMismatch {
        manifest_target: String,
        bom_target: String,
    },

    #[error("no rollback source configured")]
    NoSources,

    #[error("I/O error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Executor(#[from] ExecutorError),
}

impl RollbackError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RollbackError::TargetMismatch { .. } => ErrorKind::Consistency,
            RollbackError::MissingReference
            | RollbackError::InvalidReference(_)
            | RollbackError::LocalManifestMissing(_)
            | RollbackError::NoSources => ErrorKind::Configuration,
            RollbackError::Storage(e) => e.kind(),
            RollbackError::Executor(e) => e.kind(),
            _ => ErrorKind::Transport,
        }
    }

    pub fn hint(&self) -> Option<String> {
        match self {
            RollbackError::MissingReference => Some(
                "set rollback_pipeline_id to the pipeline that deployed the state to restore, or 'local'"
                    .to_string(),
            ),
            RollbackError::LocalManifestMissing(_) => {
                Some("run the deploy command first to generate local artifacts".to_string())
            }
            RollbackError::Snapshot { .. } => Some(
                "possible causes: missing snapshot, incorrect pipeline id, or deleted objects"
                    .to_string(),
            ),
            RollbackError::TargetMismatch { .. } => Some(
                "check the BOM's target_server and rollback_pipeline_id; archives are never replayed into a different server"
                    .to_string(),
            ),
            RollbackError::Executor(ExecutorError::Credentials(e)) => Some(e.hint()),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, RollbackError>;

pub(crate) fn io_error(path: &std::path::Path) -> impl FnOnce(std::io::Error) -> RollbackError + use<> {
    let path = path.to_path_buf();
    move |source| RollbackError::Io { path, source }
}
