// ABOUTME: Lookup commands used by pipeline scripts.
// ABOUTME: Prints a profile's compiled flag string or a server's Vault configuration.

use ppmdeploy::config::{DeploymentConfig, Layout};
use ppmdeploy::context::RunContext;
use ppmdeploy::error::Result;
use ppmdeploy::flags::compile_profile;
use ppmdeploy::output::Output;

pub fn print_flags(layout: &Layout, profile: &str, output: &Output) -> Result<()> {
    let flags = compile_profile(layout, profile)?;
    output.value(flags.as_str());
    Ok(())
}

pub fn print_vault_config(
    ctx: &RunContext,
    layout: &Layout,
    server: &str,
    output: &Output,
) -> Result<()> {
    let config = DeploymentConfig::load(layout, ctx)?;
    output.value(config.vault_config(server)?);
    Ok(())
}
