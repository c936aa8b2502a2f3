// ABOUTME: Extract, import, archive and deploy command implementations.
// ABOUTME: Each phase resumes from the metadata the previous phase left in the workspace.

use super::emit_warnings;
use ppmdeploy::bom::DeploymentKind;
use ppmdeploy::deploy::{Archived, Deployment, Orchestrator};
use ppmdeploy::error::Result;
use ppmdeploy::output::Output;
use std::fmt;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Extract,
    Import,
    Archive,
    Deploy,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Phase::Extract => "extract",
            Phase::Import => "import",
            Phase::Archive => "archive",
            Phase::Deploy => "deploy",
        })
    }
}

/// Run one pipeline phase (or all of them, for `deploy`) against a BOM.
pub async fn run_phase(
    phase: Phase,
    orchestrator: &Orchestrator,
    bom_file: &Path,
    kind: DeploymentKind,
    mut output: Output,
) -> Result<()> {
    output.start_timer();
    output.progress(&format!(
        "Running {phase} for {kind} BOM {} (run {})",
        bom_file.display(),
        orchestrator.context().run_id
    ));

    let result = match phase {
        Phase::Extract => orchestrator.extract(bom_file, kind).await.map(|deployment| {
            let metadata = deployment.metadata();
            output.progress(&format!(
                "  ✓ Extracted {} bundle(s) from {} with flags {}",
                metadata.bundles.len(),
                metadata.source_server,
                metadata.flags
            ));
            format!("Extraction complete: {} entities", metadata.entities_count)
        }),
        Phase::Import => orchestrator.import(bom_file, kind).await.map(|deployment| {
            let metadata = deployment.metadata();
            format!(
                "Import complete: {} bundle(s) into {}",
                metadata.bundles.len(),
                metadata.target_server
            )
        }),
        Phase::Archive => orchestrator.archive(bom_file, kind).await.map(|deployment| {
            print_rollback_info(&deployment, &output);
            "Archive complete".to_string()
        }),
        Phase::Deploy => orchestrator.deploy(bom_file, kind).await.map(|deployment| {
            print_rollback_info(&deployment, &output);
            format!(
                "Deployment complete: {} -> {}",
                deployment.metadata().source_server,
                deployment.metadata().target_server
            )
        }),
    };

    emit_warnings(orchestrator.diagnostics(), &output);
    output.success(&result?);
    Ok(())
}

/// What an operator needs to roll this deployment back later.
fn print_rollback_info(deployment: &Deployment<Archived>, output: &Output) {
    let metadata = deployment.metadata();
    output.progress("Rollback information:");
    output.detail("archive", &deployment.archive_path().display().to_string());
    output.detail("evidence", &deployment.evidence_path().display().to_string());
    output.detail("manifest", &deployment.manifest_path().display().to_string());
    match deployment.snapshot_url() {
        Some(url) => output.detail("snapshot", url),
        None => output.detail("snapshot", "none (pipeline artifacts only)"),
    }
    // `local` replays from this workspace on the next rollback
    output.detail("rollback_pipeline_id", metadata.run_id.as_str());
}
