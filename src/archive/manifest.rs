// ABOUTME: External rollback manifest written next to each deployment archive.
// ABOUTME: Records the primary archive path, the optional durable snapshot, and run provenance.

use super::{Result, io_error};
use crate::bom::DeploymentKind;
use crate::config::{Layout, StorageKind};
use crate::context::RunContext;
use crate::types::FlagString;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const MANIFEST_VERSION: &str = "2.0.0";
pub const ROLLBACK_SOURCE: &str = "gitlab";

/// Subset of the deployment metadata a rollback needs to check and replay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentSummary {
    pub deployment_type: DeploymentKind,
    pub profile: String,
    pub target_server: String,
    pub bom_version: String,
    #[serde(default)]
    pub change_request: Option<String>,
    pub flags: FlagString,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitContext {
    pub commit_sha: String,
    pub pipeline_id: String,
    pub branch: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit_message: Option<String>,
}

impl GitContext {
    pub fn from_context(ctx: &RunContext) -> Self {
        Self {
            commit_sha: ctx.commit_sha.clone(),
            pipeline_id: ctx.run_id.to_string(),
            branch: ctx.branch_or_unknown().to_string(),
            commit_message: Some(ctx.commit_message.clone()).filter(|m| !m.is_empty()),
        }
    }
}

/// `archives/ROLLBACK_MANIFEST.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollbackManifest {
    pub rollback_source: String,
    /// Archive path inside the pipeline artifacts.
    pub rollback_bundle_path: String,
    pub s3_snapshot_url: Option<String>,
    pub s3_archive_url: Option<String>,
    pub storage_backend: StorageKind,
    pub deployment_metadata: DeploymentSummary,
    pub git_context: GitContext,
    pub manifest_version: String,
    pub created_at: DateTime<Utc>,
}

impl RollbackManifest {
    /// Manifest for a freshly created archive, with no snapshot recorded yet.
    pub fn new(
        layout: &Layout,
        archive_filename: &str,
        storage_backend: StorageKind,
        deployment_metadata: DeploymentSummary,
        git_context: GitContext,
    ) -> Self {
        Self {
            rollback_source: ROLLBACK_SOURCE.to_string(),
            rollback_bundle_path: format!("{}/{archive_filename}", layout.archive_dir_name()),
            s3_snapshot_url: None,
            s3_archive_url: None,
            storage_backend,
            deployment_metadata,
            git_context,
            manifest_version: MANIFEST_VERSION.to_string(),
            created_at: Utc::now(),
        }
    }

    /// Record the snapshot prefix and the archive's location beneath it.
    pub fn with_snapshot(mut self, snapshot_url: &str) -> Self {
        let base = snapshot_url.trim_end_matches('/');
        self.s3_archive_url = Some(format!("{base}/archives/{}", self.archive_filename()));
        self.s3_snapshot_url = Some(format!("{base}/"));
        self
    }

    pub fn archive_filename(&self) -> &str {
        self.rollback_bundle_path
            .rsplit('/')
            .next()
            .unwrap_or(&self.rollback_bundle_path)
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_error(parent))?;
        }
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml).map_err(io_error(path))?;
        tracing::debug!("wrote rollback manifest {}", path.display());
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(io_error(path))?;
        Ok(serde_yaml::from_str(&content)?)
    }
}
