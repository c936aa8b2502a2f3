// ABOUTME: Deployment metadata handed from extract to import and archive.
// ABOUTME: Stored as <bundle_dir>/<type>-metadata.yaml and removed with the bundles after archive.

use crate::archive::DeploymentSummary;
use crate::bom::{DeploymentKind, I18nMode, RefdataMode};
use crate::config::{Layout, StorageKind};
use crate::error::{Error, Result};
use crate::storage::BundleHandle;
use crate::types::{FlagString, RunId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentMetadata {
    pub deployment_type: DeploymentKind,
    pub profile: String,
    pub source_server: String,
    pub target_server: String,
    pub flags: FlagString,
    /// In extraction order; import and archive preserve it.
    pub bundles: Vec<BundleHandle>,
    pub storage_mode: StorageKind,
    pub bom_file: PathBuf,
    pub bom_version: String,
    #[serde(default)]
    pub change_request: Option<String>,
    pub entities_count: usize,
    pub extracted_at: DateTime<Utc>,
    #[serde(default)]
    pub imported_at: Option<DateTime<Utc>>,
    pub i18n_mode: I18nMode,
    pub refdata_mode: RefdataMode,
    pub run_id: RunId,
}

impl DeploymentMetadata {
    pub fn path(layout: &Layout, kind: DeploymentKind) -> PathBuf {
        layout.metadata_file(kind.as_str())
    }

    pub fn save(&self, layout: &Layout) -> Result<PathBuf> {
        let path = Self::path(layout, self.deployment_type);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, serde_yaml::to_string(self)?)?;
        tracing::debug!("saved deployment metadata to {}", path.display());
        Ok(path)
    }

    pub fn load(layout: &Layout, kind: DeploymentKind) -> Result<Self> {
        Self::load_from(&Self::path(layout, kind))
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::MetadataNotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&content)?)
    }

    /// Local bundle paths in extraction order.
    pub fn bundle_paths(&self) -> Vec<PathBuf> {
        self.bundles.iter().map(|b| b.local_path.clone()).collect()
    }
}

impl From<&DeploymentMetadata> for DeploymentSummary {
    fn from(metadata: &DeploymentMetadata) -> Self {
        DeploymentSummary {
            deployment_type: metadata.deployment_type,
            profile: metadata.profile.clone(),
            target_server: metadata.target_server.clone(),
            bom_version: metadata.bom_version.clone(),
            change_request: metadata.change_request.clone(),
            flags: metadata.flags.clone(),
        }
    }
}
