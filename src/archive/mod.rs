// ABOUTME: Deployment archives, evidence packages, rollback manifests and durable snapshots.
// ABOUTME: Everything rollback needs to reconstruct a past deployment is produced here.

mod evidence;
mod manifest;
mod package;
mod snapshot;

pub use evidence::{EvidenceMetadata, create_evidence};
pub use manifest::{
    DeploymentSummary, GitContext, MANIFEST_VERSION, ROLLBACK_SOURCE, RollbackManifest,
};
pub use package::{
    ARCHIVE_MANIFEST_ENTRY, ArchiveManifest, ExtractedArchive, FLAGS_ENTRY, archive_name,
    create_archive, extract_archive, read_archive_manifest, unzip_into,
};
pub use snapshot::{
    SNAPSHOT_MANIFEST_FILE, SnapshotContents, SnapshotManifest, SnapshotRequest, create_snapshot,
};

use crate::storage::StorageError;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("I/O error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("zip error in {}: {source}", .path.display())]
    Zip {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("{} is missing {entry}", .archive.display())]
    MissingEntry { archive: PathBuf, entry: String },

    #[error("invalid {what}: {reason}")]
    Invalid { what: String, reason: String },

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

pub type Result<T> = std::result::Result<T, ArchiveError>;

pub(crate) fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> ArchiveError + use<> {
    let path = path.to_path_buf();
    move |source| ArchiveError::Io { path, source }
}

pub(crate) fn zip_error(
    path: &Path,
) -> impl FnOnce(zip::result::ZipError) -> ArchiveError + use<> {
    let path = path.to_path_buf();
    move |source| ArchiveError::Zip { path, source }
}
