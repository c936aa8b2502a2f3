// ABOUTME: Replays a resolved archive into the target server with the flags it was archived with.
// ABOUTME: Extraction and bundle enumeration do not depend on which source supplied the archive.

use super::{ResolvedArchive, Result, io_error};
use crate::archive::extract_archive;
use crate::bom::{DeploymentKind, RefdataMode};
use crate::config::ServerConfig;
use crate::executor::{Executor, ImportRequest};
use crate::storage::{BundleHandle, BundleStorage};
use crate::types::FlagString;
use std::path::{Path, PathBuf};

const EXTRACT_DIR: &str = "deployment-extract";

pub struct ReplayRequest<'a> {
    pub resolved: &'a ResolvedArchive,
    pub executor: &'a dyn Executor,
    pub import_script: &'a str,
    pub target: &'a ServerConfig,
    pub kind: DeploymentKind,
    pub workdir: &'a Path,
}

/// What a rollback put back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollbackSummary {
    pub source: &'static str,
    pub archive: PathBuf,
    pub target_server: String,
    pub flags: FlagString,
    pub bundles: Vec<String>,
}

pub async fn replay(req: &ReplayRequest<'_>) -> Result<RollbackSummary> {
    let extract_dir = req.workdir.join(EXTRACT_DIR);
    if extract_dir.exists() {
        tokio::fs::remove_dir_all(&extract_dir)
            .await
            .map_err(io_error(&extract_dir))?;
    }
    let extracted = extract_archive(&req.resolved.archive_path, &extract_dir)?;
    tracing::info!(
        "replaying {} bundle(s) from {} with original flags {}",
        extracted.bundles.len(),
        req.resolved.source,
        extracted.flags
    );

    let mut bundles = Vec::with_capacity(extracted.bundles.len());
    for path in &extracted.bundles {
        let bundle = BundleHandle {
            bundle_filename: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            local_path: path.clone(),
            storage: BundleStorage::Local,
        };
        req.executor
            .import_bundle(&ImportRequest {
                script: req.import_script,
                url: &req.target.url,
                bundle: &bundle,
                flags: &extracted.flags,
                i18n: req.kind.i18n_mode(),
                refdata: RefdataMode::NoChange,
                server: req.target,
            })
            .await?;
        bundles.push(bundle.bundle_filename);
    }

    Ok(RollbackSummary {
        source: req.resolved.source,
        archive: req.resolved.archive_path.clone(),
        target_server: req.target.name.clone(),
        flags: extracted.flags,
        bundles,
    })
}
