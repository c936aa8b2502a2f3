// ABOUTME: Workspace path layout rooted at the repository checkout.
// ABOUTME: Single place that knows where configs, bundles, archives, and snapshots live.

use super::DeploymentSettings;
use crate::types::RunId;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "config/deployment-config.yaml";
pub const LOCAL_OVERRIDE_FILE: &str = "config/deployment-config.local.yaml";
pub const RULES_FILE: &str = "config/rules.yaml";
pub const FLAG_SCHEMA_FILE: &str = "config/flag-schema.yaml";
pub const ROLLBACK_MANIFEST_FILE: &str = "ROLLBACK_MANIFEST.yaml";

#[derive(Debug, Clone)]
pub struct Layout {
    root: PathBuf,
    archive_dir: String,
    bundle_dir: String,
}

impl Layout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let defaults = DeploymentSettings::default();
        Self {
            root: root.into(),
            archive_dir: defaults.archive_dir,
            bundle_dir: defaults.bundle_dir,
        }
    }

    /// Apply the configured archive and bundle directory names.
    pub fn with_settings(mut self, settings: &DeploymentSettings) -> Self {
        self.archive_dir = settings.archive_dir.clone();
        self.bundle_dir = settings.bundle_dir.clone();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a path that may be relative to the workspace root.
    pub fn resolve(&self, path: impl AsRef<Path>) -> PathBuf {
        let path = path.as_ref();
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    pub fn config_file(&self) -> PathBuf {
        self.root.join(CONFIG_FILE)
    }

    pub fn local_override_file(&self) -> PathBuf {
        self.root.join(LOCAL_OVERRIDE_FILE)
    }

    pub fn rules_file(&self) -> PathBuf {
        self.root.join(RULES_FILE)
    }

    pub fn flag_schema_file(&self) -> PathBuf {
        self.root.join(FLAG_SCHEMA_FILE)
    }

    pub fn profile_file(&self, name: &str) -> PathBuf {
        self.root.join("profiles").join(format!("{name}.yaml"))
    }

    pub fn bundle_dir(&self) -> PathBuf {
        self.root.join(&self.bundle_dir)
    }

    pub fn bundle_dir_name(&self) -> &str {
        &self.bundle_dir
    }

    pub fn metadata_file(&self, deployment_type: &str) -> PathBuf {
        self.bundle_dir()
            .join(format!("{deployment_type}-metadata.yaml"))
    }

    pub fn archive_dir(&self) -> PathBuf {
        self.root.join(&self.archive_dir)
    }

    pub fn archive_dir_name(&self) -> &str {
        &self.archive_dir
    }

    pub fn rollback_manifest_file(&self) -> PathBuf {
        self.archive_dir().join(ROLLBACK_MANIFEST_FILE)
    }

    pub fn evidence_dir(&self) -> PathBuf {
        self.root.join("evidence")
    }

    pub fn snapshot_dir(&self, run_id: &RunId) -> PathBuf {
        self.root.join("snapshot-temp").join(run_id.as_str())
    }

    pub fn rollback_workdir(&self) -> PathBuf {
        self.root.join("rollback-temp")
    }

    pub fn transfer_dir(&self) -> PathBuf {
        self.root.join("temp_bundles")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_follow_configured_directories() {
        let settings = DeploymentSettings {
            archive_dir: "out/archives".to_string(),
            bundle_dir: "work".to_string(),
            ..Default::default()
        };
        let layout = Layout::new("/repo").with_settings(&settings);
        assert_eq!(
            layout.metadata_file("functional"),
            PathBuf::from("/repo/work/functional-metadata.yaml")
        );
        assert_eq!(
            layout.rollback_manifest_file(),
            PathBuf::from("/repo/out/archives/ROLLBACK_MANIFEST.yaml")
        );
    }

    #[test]
    fn resolve_keeps_absolute_paths() {
        let layout = Layout::new("/repo");
        assert_eq!(layout.resolve("/tmp/x.xml"), PathBuf::from("/tmp/x.xml"));
        assert_eq!(layout.resolve("boms/f.yaml"), PathBuf::from("/repo/boms/f.yaml"));
    }
}
