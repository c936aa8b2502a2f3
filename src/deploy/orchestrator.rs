// ABOUTME: Runs the extract, import and archive phases, and rollbacks, for one BOM.
// ABOUTME: Holds the run-wide context, configuration, storage backend and diagnostics.

use super::Deployment;
use super::metadata::DeploymentMetadata;
use super::state::{Archived, Extracted, Imported};
use crate::bom::{Bom, BomErrors, DeploymentKind, RefdataMode};
use crate::config::{DeploymentConfig, Layout};
use crate::context::RunContext;
use crate::credentials::CredentialResolver;
use crate::diagnostics::{Diagnostics, Warning};
use crate::error::{Error, Result};
use crate::executor::{ExecutorDeps, ExtractRequest, create_executor};
use crate::flags::{FlagSchema, Profile, compile};
use crate::governance::{Governance, RulesConfig};
use crate::rollback::{
    ArtifactStore, GitLabClient, ReplayRequest, RollbackError, RollbackResolver, RollbackSummary,
    replay, verify_target,
};
use crate::ssh::{HostConnector, SshConnector};
use crate::storage::{StorageBackend, create_storage};
use std::path::Path;
use std::sync::Arc;

/// Load a BOM and check it matches the requested deployment type.
pub fn load_bom(path: &Path, kind: DeploymentKind) -> Result<Bom> {
    let bom = Bom::load(path).map_err(|BomErrors(errors)| Error::Validation(errors))?;
    if bom.kind() != kind {
        return Err(Error::Validation(vec![format!(
            "BOM is a {} deployment but --type {kind} was requested",
            bom.kind()
        )]));
    }
    Ok(bom)
}

/// Prerequisite checks run before a deployment: governance, server entries, credentials.
pub fn validate(
    ctx: &RunContext,
    config: &DeploymentConfig,
    layout: &Layout,
    bom_file: &Path,
    branch: Option<&str>,
) -> Result<Bom> {
    let rules = RulesConfig::load(&layout.rules_file())?;
    let governance = Governance {
        layout,
        env_types: config.env_types(),
        rules: &rules,
    };
    let bom = Bom::load(bom_file).map_err(|BomErrors(errors)| Error::Validation(errors))?;
    governance.validate(&bom, branch).into_result()?;

    let source = config.server(&bom.source_server)?;
    let target = config.server(&bom.target_server)?;

    let credentials = CredentialResolver::new(ctx, &config.default_credentials);
    credentials.application(source)?;
    credentials.application(target)?;
    Ok(bom)
}

pub struct Orchestrator {
    ctx: RunContext,
    config: DeploymentConfig,
    layout: Layout,
    storage: Arc<dyn StorageBackend>,
    connector: Arc<dyn HostConnector>,
    artifacts: std::result::Result<Arc<dyn ArtifactStore>, String>,
    diagnostics: Arc<Diagnostics>,
}

impl Orchestrator {
    /// Build from loaded configuration; constructs the configured storage backend.
    pub fn new(ctx: RunContext, config: DeploymentConfig, layout: Layout) -> Result<Self> {
        let layout = layout.with_settings(&config.deployment);
        let storage = create_storage(&config, &layout, &ctx)?;
        let artifacts = ctx
            .gitlab()
            .map(|access| Arc::new(GitLabClient::new(access.clone())) as Arc<dyn ArtifactStore>)
            .map_err(str::to_string);
        Ok(Self {
            ctx,
            config,
            layout,
            storage,
            connector: Arc::new(SshConnector),
            artifacts,
            diagnostics: Arc::new(Diagnostics::default()),
        })
    }

    pub fn with_connector(mut self, connector: Arc<dyn HostConnector>) -> Self {
        self.connector = connector;
        self
    }

    pub fn with_storage(mut self, storage: Arc<dyn StorageBackend>) -> Self {
        self.storage = storage;
        self
    }

    pub fn with_artifact_store(mut self, store: Arc<dyn ArtifactStore>) -> Self {
        self.artifacts = Ok(store);
        self
    }

    pub fn context(&self) -> &RunContext {
        &self.ctx
    }

    pub fn config(&self) -> &DeploymentConfig {
        &self.config
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn storage(&self) -> &Arc<dyn StorageBackend> {
        &self.storage
    }

    pub fn diagnostics(&self) -> &Arc<Diagnostics> {
        &self.diagnostics
    }

    pub(crate) fn executor_deps(&self) -> ExecutorDeps {
        ExecutorDeps {
            layout: self.layout.clone(),
            credentials: CredentialResolver::new(&self.ctx, &self.config.default_credentials),
            run_id: self.ctx.run_id.clone(),
            storage: self.storage.clone(),
            connector: self.connector.clone(),
            ssh: self.config.ssh.clone(),
            diagnostics: self.diagnostics.clone(),
        }
    }

    pub fn validate(&self, bom_file: &Path, branch: Option<&str>) -> Result<Bom> {
        validate(&self.ctx, &self.config, &self.layout, bom_file, branch)
    }

    /// Extract every entity from the source server and record deployment metadata.
    pub async fn extract(
        &self,
        bom_file: &Path,
        kind: DeploymentKind,
    ) -> Result<Deployment<Extracted>> {
        let bom = load_bom(bom_file, kind)?;
        let source = self.config.server(&bom.source_server)?;
        self.config.server(&bom.target_server)?;

        let profile = Profile::load(&self.layout, &bom.profile)?;
        let schema = FlagSchema::load(&self.layout.flag_schema_file())?;
        let flags = compile(&profile, &schema)?;

        let entities: Vec<(String, Option<String>)> = match kind {
            DeploymentKind::Functional => bom
                .entities()
                .map(|e| (e.entity_id.clone(), Some(e.reference_code.clone())))
                .collect(),
            DeploymentKind::Baseline => profile
                .entities
                .iter()
                .map(|e| (e.id.clone(), None))
                .collect(),
        };
        if entities.is_empty() {
            return Err(Error::InvalidState(format!(
                "nothing to extract: {} lists no entities",
                match kind {
                    DeploymentKind::Functional => format!("BOM {}", bom_file.display()),
                    DeploymentKind::Baseline => format!("profile '{}'", bom.profile),
                }
            )));
        }

        let bundle_dir = self.layout.bundle_dir();
        std::fs::create_dir_all(&bundle_dir)?;

        let executor = create_executor(source, &self.executor_deps());
        tracing::info!(
            "extracting {} {kind} entit{} from {} ({} execution, {} storage, flags {flags})",
            entities.len(),
            if entities.len() == 1 { "y" } else { "ies" },
            source.name,
            executor.mode(),
            self.storage.kind()
        );

        let mut bundles = Vec::with_capacity(entities.len());
        for (entity_id, reference_code) in &entities {
            let bundle = executor
                .extract(&ExtractRequest {
                    script: &self.config.kmigrator.extract_script,
                    url: &source.url,
                    entity_id,
                    reference_code: reference_code.as_deref(),
                    server: source,
                })
                .await?;
            bundles.push(bundle);
        }

        let metadata = DeploymentMetadata {
            deployment_type: kind,
            profile: bom.profile.clone(),
            source_server: bom.source_server.clone(),
            target_server: bom.target_server.clone(),
            flags,
            bundles,
            storage_mode: self.storage.kind(),
            bom_file: bom_file.to_path_buf(),
            bom_version: bom.version.clone(),
            change_request: bom.change_request.clone(),
            entities_count: entities.len(),
            extracted_at: chrono::Utc::now(),
            imported_at: None,
            i18n_mode: kind.i18n_mode(),
            refdata_mode: RefdataMode::NoChange,
            run_id: self.ctx.run_id.clone(),
        };
        metadata.save(&self.layout)?;

        Ok(Deployment::new(bom, bom_file.to_path_buf(), metadata, Extracted))
    }

    fn resume(&self, bom_file: &Path, kind: DeploymentKind) -> Result<(Bom, DeploymentMetadata)> {
        let bom = load_bom(bom_file, kind)?;
        let metadata = DeploymentMetadata::load(&self.layout, kind)?;
        if metadata.target_server != bom.target_server {
            return Err(Error::InvalidState(format!(
                "metadata targets '{}' but the BOM targets '{}'",
                metadata.target_server, bom.target_server
            )));
        }
        Ok((bom, metadata))
    }

    /// Pick up an extracted deployment from its metadata.
    pub fn resume_extracted(
        &self,
        bom_file: &Path,
        kind: DeploymentKind,
    ) -> Result<Deployment<Extracted>> {
        let (bom, metadata) = self.resume(bom_file, kind)?;
        Ok(Deployment::new(bom, bom_file.to_path_buf(), metadata, Extracted))
    }

    /// Pick up an imported deployment; the metadata must record a completed import.
    pub fn resume_imported(
        &self,
        bom_file: &Path,
        kind: DeploymentKind,
    ) -> Result<Deployment<Imported>> {
        let (bom, metadata) = self.resume(bom_file, kind)?;
        if metadata.imported_at.is_none() {
            return Err(Error::InvalidState(format!(
                "{kind} bundles have not been imported yet; run the import phase first"
            )));
        }
        Ok(Deployment::new(bom, bom_file.to_path_buf(), metadata, Imported))
    }

    pub async fn import(
        &self,
        bom_file: &Path,
        kind: DeploymentKind,
    ) -> Result<Deployment<Imported>> {
        self.resume_extracted(bom_file, kind)?.import(self).await
    }

    pub async fn archive(
        &self,
        bom_file: &Path,
        kind: DeploymentKind,
    ) -> Result<Deployment<Archived>> {
        self.resume_imported(bom_file, kind)?.archive(self).await
    }

    /// Validate, then extract, import and archive in one run.
    pub async fn deploy(
        &self,
        bom_file: &Path,
        kind: DeploymentKind,
    ) -> Result<Deployment<Archived>> {
        self.validate(bom_file, self.ctx.branch.as_deref())?;
        self.extract(bom_file, kind)
            .await?
            .import(self)
            .await?
            .archive(self)
            .await
    }

    /// Restore the deployment named by the BOM's `rollback_pipeline_id`.
    pub async fn rollback(&self, bom_file: &Path, kind: DeploymentKind) -> Result<RollbackSummary> {
        let bom = load_bom(bom_file, kind)?;
        let reference = bom
            .rollback_reference()
            .ok_or(RollbackError::MissingReference)?
            .map_err(RollbackError::from)?;
        let target = self.config.server(&bom.target_server)?;
        tracing::info!("rolling back {} to pipeline {reference}", target.name);

        let workdir = self.layout.rollback_workdir();
        if workdir.exists() {
            std::fs::remove_dir_all(&workdir)?;
        }
        std::fs::create_dir_all(&workdir)?;

        let resolver = RollbackResolver::for_reference(
            &reference,
            &self.layout,
            self.storage.clone(),
            self.artifacts.clone(),
        );
        let result = self.replay_from(&resolver, &workdir, &bom, kind).await;
        self.remove_workdir(&workdir);
        result
    }

    async fn replay_from(
        &self,
        resolver: &RollbackResolver,
        workdir: &Path,
        bom: &Bom,
        kind: DeploymentKind,
    ) -> Result<RollbackSummary> {
        let resolved = resolver.resolve(workdir).await?;
        verify_target(&resolved.manifest, &bom.target_server)?;

        let target = self.config.server(&bom.target_server)?;
        let executor = create_executor(target, &self.executor_deps());
        let summary = replay(&ReplayRequest {
            resolved: &resolved,
            executor: executor.as_ref(),
            import_script: &self.config.kmigrator.import_script,
            target,
            kind,
            workdir,
        })
        .await?;
        Ok(summary)
    }

    fn remove_workdir(&self, workdir: &Path) {
        if let Err(e) = std::fs::remove_dir_all(workdir) {
            self.diagnostics.warn(Warning::temp_cleanup(format!(
                "failed to remove {}: {e}",
                workdir.display()
            )));
        }
    }
}
