// ABOUTME: The places a past deployment's archive can be recovered from.
// ABOUTME: Each source yields the rollback manifest plus a local path to the archive it names.

use super::{ArtifactStore, Result, RollbackError, io_error};
use crate::archive::{RollbackManifest, unzip_into};
use crate::config::{Layout, ROLLBACK_MANIFEST_FILE};
use crate::storage::StorageBackend;
use crate::types::RunId;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A rollback manifest and the archive it describes, available locally.
#[derive(Debug, Clone)]
pub struct ResolvedArchive {
    pub manifest: RollbackManifest,
    pub archive_path: PathBuf,
    pub source: &'static str,
}

#[async_trait]
pub trait RollbackSource: Send + Sync {
    fn name(&self) -> &'static str;

    /// Recover the manifest and archive, staging files under `workdir`.
    async fn fetch(&self, workdir: &Path) -> Result<ResolvedArchive>;
}

/// Archives left in the workspace by an earlier `deploy`.
pub struct LocalArchiveSource {
    layout: Layout,
}

impl LocalArchiveSource {
    pub fn new(layout: Layout) -> Self {
        Self { layout }
    }
}

#[async_trait]
impl RollbackSource for LocalArchiveSource {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn fetch(&self, workdir: &Path) -> Result<ResolvedArchive> {
        let manifest_path = self.layout.rollback_manifest_file();
        if !manifest_path.exists() {
            return Err(RollbackError::LocalManifestMissing(manifest_path));
        }
        let manifest = RollbackManifest::load(&manifest_path)?;

        let archive = self.layout.resolve(&manifest.rollback_bundle_path);
        if !archive.exists() {
            return Err(RollbackError::NotFound {
                what: "local archive".to_string(),
                path: archive,
            });
        }

        tokio::fs::create_dir_all(workdir)
            .await
            .map_err(io_error(workdir))?;
        let staged = workdir.join(manifest.archive_filename());
        tokio::fs::copy(&archive, &staged)
            .await
            .map_err(io_error(&staged))?;

        Ok(ResolvedArchive {
            manifest,
            archive_path: staged,
            source: self.name(),
        })
    }
}

/// Artifacts of the pipeline run that performed the deployment.
pub struct PipelineArtifactSource {
    store: std::result::Result<Arc<dyn ArtifactStore>, String>,
    pipeline: RunId,
    archive_dir: String,
}

impl PipelineArtifactSource {
    /// `store` is `Err` with the reason when no artifact API is reachable.
    pub fn new(
        store: std::result::Result<Arc<dyn ArtifactStore>, String>,
        pipeline: RunId,
        layout: &Layout,
    ) -> Self {
        Self {
            store,
            pipeline,
            archive_dir: layout.archive_dir_name().to_string(),
        }
    }
}

#[async_trait]
impl RollbackSource for PipelineArtifactSource {
    fn name(&self) -> &'static str {
        "gitlab"
    }

    async fn fetch(&self, workdir: &Path) -> Result<ResolvedArchive> {
        let store = self
            .store
            .as_ref()
            .map_err(|reason| RollbackError::GitLabUnavailable(reason.clone()))?;

        let zip = store
            .download_archive_artifacts(&self.pipeline, workdir)
            .await?;
        unzip_into(&zip, workdir)?;
        if let Err(e) = tokio::fs::remove_file(&zip).await {
            tracing::debug!("could not remove {}: {e}", zip.display());
        }

        let manifest_path = workdir.join(&self.archive_dir).join(ROLLBACK_MANIFEST_FILE);
        if !manifest_path.exists() {
            return Err(RollbackError::NotFound {
                what: "ROLLBACK_MANIFEST.yaml in pipeline artifacts".to_string(),
                path: manifest_path,
            });
        }
        let manifest = RollbackManifest::load(&manifest_path)?;

        let archive_path = workdir.join(&manifest.rollback_bundle_path);
        if !archive_path.exists() {
            return Err(RollbackError::NotFound {
                what: "archive in pipeline artifacts".to_string(),
                path: archive_path,
            });
        }
        tracing::info!("using archive from pipeline artifacts: {}", manifest.archive_filename());

        Ok(ResolvedArchive {
            manifest,
            archive_path,
            source: self.name(),
        })
    }
}

/// Snapshot uploaded to durable storage under `snapshots/<run id>/`.
pub struct SnapshotSource {
    storage: Arc<dyn StorageBackend>,
    pipeline: RunId,
}

impl SnapshotSource {
    pub fn new(storage: Arc<dyn StorageBackend>, pipeline: RunId) -> Self {
        Self { storage, pipeline }
    }

    pub fn manifest_key(&self) -> String {
        format!("snapshots/{}/archives/{ROLLBACK_MANIFEST_FILE}", self.pipeline)
    }

    /// Fetch, remembering the last location attempted so failures can name it.
    async fn fetch_from(&self, workdir: &Path, location: &mut String) -> Result<ResolvedArchive> {
        let manifest_key = self.manifest_key();
        *location = self.storage.object_url(&manifest_key);

        let manifest_path = workdir.join(ROLLBACK_MANIFEST_FILE);
        self.storage
            .download_file(&manifest_key, &manifest_path)
            .await?;
        let manifest = RollbackManifest::load(&manifest_path)?;

        let archive_url = manifest
            .s3_archive_url
            .clone()
            .ok_or(RollbackError::ManifestIncomplete("s3_archive_url"))?;
        *location = archive_url.clone();
        let archive_key = self.storage.key_from_url(&archive_url)?;
        let archive_path = workdir.join(manifest.archive_filename());
        self.storage.download_file(&archive_key, &archive_path).await?;
        tracing::info!("downloaded archive from {archive_url}");

        Ok(ResolvedArchive {
            manifest,
            archive_path,
            source: self.name(),
        })
    }
}

#[async_trait]
impl RollbackSource for SnapshotSource {
    fn name(&self) -> &'static str {
        "s3"
    }

    async fn fetch(&self, workdir: &Path) -> Result<ResolvedArchive> {
        let mut location = String::new();
        let result = self.fetch_from(workdir, &mut location).await;
        result.map_err(|e| RollbackError::Snapshot {
            location,
            reason: e.to_string(),
        })
    }
}
