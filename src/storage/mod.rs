// ABOUTME: Storage backends holding bundles, archives and snapshots.
// ABOUTME: Local passthrough for mock runs, S3-compatible object storage for real deployments.

mod error;
mod local;
mod s3;

pub use error::{Result, StorageError};
pub use local::LocalStorage;
pub use s3::S3Storage;

use crate::config::{DeploymentConfig, Layout, StorageKind};
use crate::context::RunContext;
use crate::ssh::RemoteHost;
use crate::types::RunId;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Where a bundle's durable copy lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum BundleStorage {
    /// Only the local file exists.
    Local,
    /// Object in an S3-compatible bucket.
    S3 {
        bucket: String,
        key: String,
        url: String,
    },
}

impl BundleStorage {
    pub fn kind(&self) -> StorageKind {
        match self {
            BundleStorage::Local => StorageKind::Local,
            BundleStorage::S3 { .. } => StorageKind::S3,
        }
    }
}

/// A bundle produced by extract and consumed by import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleHandle {
    pub bundle_filename: String,
    /// Local copy, relative to the workspace root unless absolute.
    pub local_path: PathBuf,
    pub storage: BundleStorage,
}

/// Result of probing a storage key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectMetadata {
    Absent,
    Present {
        size: u64,
        modified: Option<DateTime<Utc>>,
    },
}

impl ObjectMetadata {
    pub fn exists(&self) -> bool {
        matches!(self, ObjectMetadata::Present { .. })
    }
}

#[async_trait]
pub trait StorageBackend: Send + Sync {
    fn kind(&self) -> StorageKind;

    /// Whether objects outlive the workspace (snapshots are only taken on durable storage).
    fn is_durable(&self) -> bool {
        self.kind() != StorageKind::Local
    }

    /// Key under which a run's bundle is stored.
    fn bundle_key(&self, run_id: &RunId, filename: &str) -> String;

    /// Addressable location of a key, as recorded in manifests.
    fn object_url(&self, key: &str) -> String;

    /// Inverse of [`StorageBackend::object_url`].
    fn key_from_url(&self, url: &str) -> Result<String>;

    /// Record a bundle already fetched to `local` under `key`, returning its handle.
    async fn store_bundle(&self, local: &Path, key: &str) -> Result<BundleStorage>;

    /// Place a stored bundle at `remote_path` on a remote host.
    async fn download_to_server(
        &self,
        host: &dyn RemoteHost,
        bundle: &BundleHandle,
        remote_path: &str,
    ) -> Result<()>;

    /// Store a local file, returning its URL.
    async fn upload_file(&self, local: &Path, key: &str) -> Result<String>;

    /// Fetch a stored object into a local file.
    async fn download_file(&self, key: &str, local: &Path) -> Result<()>;

    /// Existence, size and modification time of a key. A missing key is `Absent`, not an error.
    async fn get_metadata(&self, key: &str) -> Result<ObjectMetadata>;
}

/// Build the backend selected by `deployment.storage_backend`.
pub fn create_storage(
    config: &DeploymentConfig,
    layout: &Layout,
    ctx: &RunContext,
) -> crate::error::Result<Arc<dyn StorageBackend>> {
    let backend: Arc<dyn StorageBackend> = match config.storage_kind() {
        StorageKind::Local => Arc::new(LocalStorage::new(layout.clone())),
        StorageKind::S3 => Arc::new(S3Storage::new(config.s3()?, ctx, layout.transfer_dir())?),
    };
    tracing::debug!("using {} storage backend", backend.kind());
    Ok(backend)
}

/// Temp directory for a single transfer, removed when dropped.
pub(crate) fn transfer_tempdir(transfer_dir: &Path, prefix: &str) -> Result<tempfile::TempDir> {
    std::fs::create_dir_all(transfer_dir).map_err(|source| StorageError::Io {
        path: transfer_dir.to_path_buf(),
        source,
    })?;
    tempfile::Builder::new()
        .prefix(prefix)
        .tempdir_in(transfer_dir)
        .map_err(|source| StorageError::Io {
            path: transfer_dir.to_path_buf(),
            source,
        })
}
