// ABOUTME: Phase transitions: import consumes an extracted deployment, archive an imported one.
// ABOUTME: Each method consumes self and returns the deployment in its next phase.

use super::Deployment;
use super::orchestrator::Orchestrator;
use super::state::{Archived, Extracted, Imported};
use crate::archive::{
    DeploymentSummary, GitContext, RollbackManifest, SnapshotRequest, create_archive,
    create_evidence, create_snapshot,
};
use crate::diagnostics::Warning;
use crate::error::Result;
use crate::executor::{ImportRequest, create_executor};

// =============================================================================
// Extracted -> Imported
// =============================================================================

impl Deployment<Extracted> {
    /// Import every extracted bundle into the target server, in extraction order.
    #[must_use = "deployment state must be used"]
    pub async fn import(mut self, orchestrator: &Orchestrator) -> Result<Deployment<Imported>> {
        let config = orchestrator.config();
        let target = config.server(&self.metadata.target_server)?;
        let executor = create_executor(target, &orchestrator.executor_deps());

        tracing::info!(
            "importing {} bundle(s) into {} ({} execution, flags {})",
            self.metadata.bundles.len(),
            target.name,
            executor.mode(),
            self.metadata.flags
        );
        for bundle in &self.metadata.bundles {
            executor
                .import_bundle(&ImportRequest {
                    script: &config.kmigrator.import_script,
                    url: &target.url,
                    bundle,
                    flags: &self.metadata.flags,
                    i18n: self.metadata.i18n_mode,
                    refdata: self.metadata.refdata_mode,
                    server: target,
                })
                .await?;
        }

        self.metadata.imported_at = Some(chrono::Utc::now());
        self.metadata.save(orchestrator.layout())?;
        Ok(self.transition(Imported))
    }
}

// =============================================================================
// Imported -> Archived
// =============================================================================

impl Deployment<Imported> {
    /// Archive bundles, write evidence and the rollback manifest, snapshot to durable
    /// storage, then remove the bundle directory.
    ///
    /// A failed snapshot is recorded as a warning; the archive stays the rollback source.
    #[must_use = "deployment state must be used"]
    pub async fn archive(self, orchestrator: &Orchestrator) -> Result<Deployment<Archived>> {
        let layout = orchestrator.layout();
        let ctx = orchestrator.context();
        let storage = orchestrator.storage();
        let bundles = self.metadata.bundle_paths();

        let archive_path = create_archive(
            layout,
            &self.bom,
            &self.bom_file,
            &bundles,
            &self.metadata.flags,
        )?;
        let evidence_path = create_evidence(layout, ctx, &self.bom, &self.bom_file, &archive_path)?;

        let archive_filename = archive_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let summary = DeploymentSummary::from(&self.metadata);
        let manifest_path = layout.rollback_manifest_file();
        let manifest = RollbackManifest::new(
            layout,
            &archive_filename,
            storage.kind(),
            summary.clone(),
            GitContext::from_context(ctx),
        );
        manifest.write(&manifest_path)?;

        let metadata_file = super::DeploymentMetadata::path(layout, self.metadata.deployment_type);
        let request = SnapshotRequest {
            layout,
            ctx,
            storage: storage.as_ref(),
            summary: &summary,
            bundles: &bundles,
            metadata_file: &metadata_file,
            bom_file: &self.bom_file,
            archive_path: &archive_path,
            evidence_path: &evidence_path,
        };
        let snapshot_url = match create_snapshot(&request).await {
            Ok(Some(url)) => {
                manifest.with_snapshot(&url).write(&manifest_path)?;
                tracing::info!("snapshot uploaded to {url}");
                Some(url)
            }
            Ok(None) => None,
            Err(e) => {
                orchestrator.diagnostics().warn(Warning::snapshot_failed(format!(
                    "snapshot upload failed, pipeline artifacts remain the only rollback source: {e}"
                )));
                None
            }
        };

        let bundle_dir = layout.bundle_dir();
        if bundle_dir.exists()
            && let Err(e) = std::fs::remove_dir_all(&bundle_dir)
        {
            orchestrator.diagnostics().warn(Warning::temp_cleanup(format!(
                "failed to remove {}: {e}",
                bundle_dir.display()
            )));
        }

        Ok(self.transition(Archived {
            archive_path,
            evidence_path,
            manifest_path,
            snapshot_url,
        }))
    }
}
