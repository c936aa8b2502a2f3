// ABOUTME: Ordered rollback source strategies driven by a single fallback loop.
// ABOUTME: Earlier failures fall through to the next source; the last failure is returned.

use super::{
    ArtifactStore, LocalArchiveSource, PipelineArtifactSource, ResolvedArchive, Result,
    RollbackError, RollbackSource, SnapshotSource,
};
use crate::archive::RollbackManifest;
use crate::config::Layout;
use crate::storage::StorageBackend;
use crate::types::RollbackReference;
use std::path::Path;
use std::sync::Arc;

pub struct RollbackResolver {
    sources: Vec<Box<dyn RollbackSource>>,
}

impl RollbackResolver {
    pub fn new(sources: Vec<Box<dyn RollbackSource>>) -> Self {
        Self { sources }
    }

    /// `local` uses only the workspace; a pipeline id tries its artifacts, then its snapshot.
    pub fn for_reference(
        reference: &RollbackReference,
        layout: &Layout,
        storage: Arc<dyn StorageBackend>,
        artifacts: std::result::Result<Arc<dyn ArtifactStore>, String>,
    ) -> Self {
        let sources: Vec<Box<dyn RollbackSource>> = match reference {
            RollbackReference::Local => vec![Box::new(LocalArchiveSource::new(layout.clone()))],
            RollbackReference::Pipeline(run_id) => vec![
                Box::new(PipelineArtifactSource::new(artifacts, run_id.clone(), layout)),
                Box::new(SnapshotSource::new(storage, run_id.clone())),
            ],
        };
        Self::new(sources)
    }

    pub fn source_names(&self) -> Vec<&'static str> {
        self.sources.iter().map(|s| s.name()).collect()
    }

    pub async fn resolve(&self, workdir: &Path) -> Result<ResolvedArchive> {
        let mut failure: Option<(&'static str, RollbackError)> = None;
        for source in &self.sources {
            if let Some((previous, e)) = failure.take() {
                tracing::warn!("{previous} rollback source unavailable ({e}), trying {}", source.name());
            }
            tracing::info!("attempting rollback from {}", source.name());
            match source.fetch(workdir).await {
                Ok(resolved) => return Ok(resolved),
                Err(e) => failure = Some((source.name(), e)),
            }
        }
        Err(failure.map(|(_, e)| e).unwrap_or(RollbackError::NoSources))
    }
}

/// The archive must have been made for the server being rolled back.
pub fn verify_target(manifest: &RollbackManifest, bom_target: &str) -> Result<()> {
    let manifest_target = &manifest.deployment_metadata.target_server;
    if manifest_target != bom_target {
        return Err(RollbackError::TargetMismatch {
            manifest_target: manifest_target.clone(),
            bom_target: bom_target.to_string(),
        });
    }
    Ok(())
}
