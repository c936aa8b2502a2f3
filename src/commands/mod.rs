// ABOUTME: Command module aggregator for the ppmdeploy CLI.
// ABOUTME: Re-exports phase, rollback, validate and lookup command handlers.

mod deploy;
mod info;
mod rollback;
mod validate;

pub use deploy::{Phase, run_phase};
pub use info::{print_flags, print_vault_config};
pub use rollback::rollback;
pub use validate::validate;

use ppmdeploy::config::{DeploymentConfig, Layout};
use ppmdeploy::context::RunContext;
use ppmdeploy::deploy::Orchestrator;
use ppmdeploy::diagnostics::Diagnostics;
use ppmdeploy::error::Result;
use ppmdeploy::output::Output;

/// Load configuration for the workspace and build the orchestrator for this run.
pub fn orchestrator(layout: Layout, ctx: RunContext) -> Result<Orchestrator> {
    let config = DeploymentConfig::load(&layout, &ctx)?;
    Orchestrator::new(ctx, config, layout)
}

fn emit_warnings(diagnostics: &Diagnostics, output: &Output) {
    for warning in diagnostics.warnings() {
        output.warning(&warning.message);
    }
}
