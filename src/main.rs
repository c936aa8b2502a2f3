// ABOUTME: Entry point for the ppmdeploy CLI application.
// ABOUTME: Parses arguments and dispatches to appropriate command handlers.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};
use commands::Phase;
use ppmdeploy::config::Layout;
use ppmdeploy::context::RunContext;
use ppmdeploy::error::Result;
use ppmdeploy::output::{Output, OutputMode};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing subscriber based on verbose flag
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();

    let mode = if cli.json {
        OutputMode::Json
    } else if cli.quiet {
        OutputMode::Quiet
    } else {
        OutputMode::Normal
    };

    if let Err(e) = run(cli, mode).await {
        let output = Output::new(mode);
        output.error(&e.to_string());
        if let ppmdeploy::error::Error::Validation(errors) = &e {
            for error in errors {
                eprintln!("  - {error}");
            }
        }
        if let Some(hint) = e.hint() {
            eprintln!("Hint: {hint}");
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli, mode: OutputMode) -> Result<()> {
    let root = match cli.root {
        Some(root) => root,
        None => std::env::current_dir()?,
    };
    let layout = Layout::new(root);
    let ctx = RunContext::from_env();
    let output = Output::new(mode);

    let (phase, args) = match cli.command {
        Commands::Extract(args) => (Phase::Extract, args),
        Commands::Import(args) => (Phase::Import, args),
        Commands::Archive(args) => (Phase::Archive, args),
        Commands::Deploy(args) => (Phase::Deploy, args),
        Commands::Rollback(args) => {
            let orchestrator = commands::orchestrator(layout, ctx)?;
            return commands::rollback(&orchestrator, &args.bom, args.kind.into(), output).await;
        }
        Commands::Validate { bom, branch } => {
            return commands::validate(&ctx, &layout, &bom, branch.as_deref(), output);
        }
        Commands::Flags { profile } => {
            return commands::print_flags(&layout, &profile, &output);
        }
        Commands::VaultConfig { server } => {
            return commands::print_vault_config(&ctx, &layout, &server, &output);
        }
    };

    let orchestrator = commands::orchestrator(layout, ctx)?;
    commands::run_phase(phase, &orchestrator, &args.bom, args.kind.into(), output).await
}
