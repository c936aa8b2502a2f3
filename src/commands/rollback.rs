// ABOUTME: Rollback command implementation.
// ABOUTME: Restores the target server from the archive of the pipeline a BOM names.

use super::emit_warnings;
use ppmdeploy::bom::DeploymentKind;
use ppmdeploy::deploy::Orchestrator;
use ppmdeploy::error::Result;
use ppmdeploy::output::Output;
use std::path::Path;

pub async fn rollback(
    orchestrator: &Orchestrator,
    bom_file: &Path,
    kind: DeploymentKind,
    mut output: Output,
) -> Result<()> {
    output.start_timer();
    output.progress(&format!("Rolling back {kind} deployment from {}", bom_file.display()));

    let result = orchestrator.rollback(bom_file, kind).await;
    emit_warnings(orchestrator.diagnostics(), &output);
    let summary = result?;

    output.detail("source", summary.source);
    output.detail("archive", &summary.archive.display().to_string());
    output.detail("flags", summary.flags.as_str());
    for bundle in &summary.bundles {
        output.progress(&format!("  ✓ {bundle}"));
    }
    output.success(&format!(
        "Rollback complete: {} bundle(s) restored on {}",
        summary.bundles.len(),
        summary.target_server
    ));
    Ok(())
}
