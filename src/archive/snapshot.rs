// ABOUTME: Complete deployment snapshot mirrored to durable storage under snapshots/<run id>/.
// ABOUTME: Staged locally first; the staging directory is removed after the upload, even a failed one.

use super::{DeploymentSummary, GitContext, Result, RollbackManifest, io_error};
use crate::config::{Layout, ROLLBACK_MANIFEST_FILE};
use crate::context::RunContext;
use crate::storage::StorageBackend;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const SNAPSHOT_MANIFEST_FILE: &str = "SNAPSHOT_MANIFEST.yaml";
const SNAPSHOT_NOTE: &str = "Job logs available in GitLab pipeline history";

/// Inputs for one snapshot.
pub struct SnapshotRequest<'a> {
    pub layout: &'a Layout,
    pub ctx: &'a RunContext,
    pub storage: &'a dyn StorageBackend,
    pub summary: &'a DeploymentSummary,
    pub bundles: &'a [PathBuf],
    pub metadata_file: &'a Path,
    pub bom_file: &'a Path,
    pub archive_path: &'a Path,
    pub evidence_path: &'a Path,
}

/// File names per snapshot section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotContents {
    pub bundles: Vec<String>,
    pub metadata: Vec<String>,
    pub archives: Vec<String>,
    pub evidence: Vec<String>,
    pub bom: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotManifest {
    pub snapshot_version: String,
    pub created_at: DateTime<Utc>,
    pub pipeline_id: String,
    pub deployment_type: String,
    pub snapshot_contents: SnapshotContents,
    pub note: String,
    pub git_context: GitContext,
    pub deployment_metadata: DeploymentSummary,
}

fn name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Copy `source` into `dir`, returning the copied file name. Missing sources are skipped.
fn stage(source: &Path, dir: &Path) -> Result<Option<String>> {
    if !source.is_file() {
        tracing::debug!("not in snapshot (missing): {}", source.display());
        return Ok(None);
    }
    std::fs::create_dir_all(dir).map_err(io_error(dir))?;
    let name = name_of(source);
    let dest = dir.join(&name);
    std::fs::copy(source, &dest).map_err(io_error(&dest))?;
    Ok(Some(name))
}

/// Every file below `dir`, relative to `dir`, in sorted order.
fn walk(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut pending = vec![dir.to_path_buf()];
    while let Some(current) = pending.pop() {
        for entry in std::fs::read_dir(&current).map_err(io_error(&current))? {
            let path = entry.map_err(io_error(&current))?.path();
            if path.is_dir() {
                pending.push(path);
            } else if let Ok(relative) = path.strip_prefix(dir) {
                files.push(relative.to_path_buf());
            }
        }
    }
    files.sort();
    Ok(files)
}

fn object_key(prefix: &str, relative: &Path) -> String {
    let parts: Vec<_> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    format!("{prefix}{}", parts.join("/"))
}

fn remove_staging(staging: &Path) {
    if let Err(e) = std::fs::remove_dir_all(staging) {
        tracing::warn!("failed to remove {}: {e}", staging.display());
    }
}

/// Copy every snapshot section into `staging` and write the snapshot manifest.
fn stage_snapshot(req: &SnapshotRequest<'_>, staging: &Path, snapshot_url: &str) -> Result<()> {
    let run_id = &req.ctx.run_id;
    std::fs::create_dir_all(staging).map_err(io_error(staging))?;
    let mut contents = SnapshotContents::default();

    let bundle_dir = staging.join("bundles");
    for bundle in req.bundles {
        if let Some(name) = stage(&req.layout.resolve(bundle), &bundle_dir)? {
            contents.bundles.push(name);
        }
    }
    if let Some(name) = stage(req.metadata_file, &bundle_dir)? {
        contents.metadata.push(name);
    }

    let archive_dir = staging.join("archives");
    if let Some(name) = stage(req.archive_path, &archive_dir)? {
        contents.archives.push(name);
    }
    // The snapshot copy of the rollback manifest already points at the snapshot itself.
    let rollback_manifest = req.layout.rollback_manifest_file();
    if rollback_manifest.is_file() {
        std::fs::create_dir_all(&archive_dir).map_err(io_error(&archive_dir))?;
        RollbackManifest::load(&rollback_manifest)?
            .with_snapshot(snapshot_url)
            .write(&archive_dir.join(ROLLBACK_MANIFEST_FILE))?;
        contents.archives.push(ROLLBACK_MANIFEST_FILE.to_string());
    }

    if let Some(name) = stage(req.evidence_path, &staging.join("evidence"))? {
        contents.evidence.push(name);
    }

    let bom_dest = staging.join("bom.yaml");
    std::fs::copy(req.bom_file, &bom_dest).map_err(io_error(&bom_dest))?;
    contents.bom.push("bom.yaml".to_string());

    let manifest = SnapshotManifest {
        snapshot_version: "1.0.0".to_string(),
        created_at: Utc::now(),
        pipeline_id: run_id.to_string(),
        deployment_type: req.summary.deployment_type.to_string(),
        snapshot_contents: contents,
        note: SNAPSHOT_NOTE.to_string(),
        git_context: GitContext::from_context(req.ctx),
        deployment_metadata: req.summary.clone(),
    };
    let manifest_path = staging.join(SNAPSHOT_MANIFEST_FILE);
    std::fs::write(&manifest_path, serde_yaml::to_string(&manifest)?)
        .map_err(io_error(&manifest_path))?;
    Ok(())
}

async fn upload_snapshot(storage: &dyn StorageBackend, staging: &Path, prefix: &str) -> Result<()> {
    let files = walk(staging)?;
    tracing::info!("uploading {} snapshot files to {prefix}", files.len());
    for relative in &files {
        storage
            .upload_file(&staging.join(relative), &object_key(prefix, relative))
            .await?;
    }
    Ok(())
}

/// Stage and upload a complete snapshot. Returns the snapshot URL, or `None` when the
/// backend is not durable.
///
/// A non-durable backend keeps the staged copy. Otherwise the staging directory is
/// removed whether staging or upload succeeded.
pub async fn create_snapshot(req: &SnapshotRequest<'_>) -> Result<Option<String>> {
    let staging = req.layout.snapshot_dir(&req.ctx.run_id);
    if staging.exists() {
        std::fs::remove_dir_all(&staging).map_err(io_error(&staging))?;
    }

    let prefix = format!("snapshots/{}/", req.ctx.run_id);
    let snapshot_url = req.storage.object_url(&prefix);

    if let Err(e) = stage_snapshot(req, &staging, &snapshot_url) {
        remove_staging(&staging);
        return Err(e);
    }

    if !req.storage.is_durable() {
        tracing::info!(
            "{} storage is not durable, snapshot kept at {}",
            req.storage.kind(),
            staging.display()
        );
        return Ok(None);
    }

    let uploaded = upload_snapshot(req.storage, &staging, &prefix).await;
    remove_staging(&staging);
    uploaded.map(|()| Some(snapshot_url))
}
