// ABOUTME: Validate command implementation.
// ABOUTME: Runs governance, server and credential checks without touching any server.

use ppmdeploy::config::{DeploymentConfig, Layout};
use ppmdeploy::context::RunContext;
use ppmdeploy::deploy;
use ppmdeploy::error::Result;
use ppmdeploy::output::Output;
use std::path::Path;

pub fn validate(
    ctx: &RunContext,
    layout: &Layout,
    bom_file: &Path,
    branch: Option<&str>,
    mut output: Output,
) -> Result<()> {
    output.start_timer();
    let branch = branch.or(ctx.branch.as_deref());
    output.progress(&format!(
        "Validating {} (branch: {})",
        bom_file.display(),
        branch.unwrap_or("unknown")
    ));

    let config = DeploymentConfig::load(layout, ctx)?;
    let bom = deploy::validate(ctx, &config, layout, bom_file, branch)?;

    output.detail("profile", &bom.profile);
    output.detail("category", bom.kind().as_str());
    output.detail("route", &format!("{} -> {}", bom.source_server, bom.target_server));
    output.success("BOM validation passed");
    Ok(())
}
