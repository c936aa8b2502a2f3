// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Defines all subcommands and their arguments.

use clap::{Args, Parser, Subcommand, ValueEnum};
use ppmdeploy::bom::DeploymentKind;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "ppmdeploy")]
#[command(about = "BOM-driven PPM configuration deployment with archive-based rollback")]
#[command(version)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only print final results (for CI)
    #[arg(short, long, global = true, conflicts_with = "json")]
    pub quiet: bool,

    /// Print JSON lines instead of text
    #[arg(long, global = true)]
    pub json: bool,

    /// Repository root holding config/, profiles/ and the artifact directories
    #[arg(long, global = true, value_name = "DIR")]
    pub root: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum TypeArg {
    Baseline,
    Functional,
}

impl From<TypeArg> for DeploymentKind {
    fn from(value: TypeArg) -> Self {
        match value {
            TypeArg::Baseline => DeploymentKind::Baseline,
            TypeArg::Functional => DeploymentKind::Functional,
        }
    }
}

#[derive(Args, Clone, Debug)]
pub struct PhaseArgs {
    /// BOM file (e.g. boms/functional.yaml)
    #[arg(long, value_name = "FILE")]
    pub bom: PathBuf,

    /// Deployment type
    #[arg(long = "type", value_enum, value_name = "TYPE")]
    pub kind: TypeArg,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Extract entities from the source server and record deployment metadata
    Extract(PhaseArgs),

    /// Import extracted bundles into the target server
    Import(PhaseArgs),

    /// Archive bundles, write evidence and the rollback manifest, snapshot to storage
    Archive(PhaseArgs),

    /// Validate, extract, import and archive in one run
    Deploy(PhaseArgs),

    /// Replay the archive of the pipeline named by rollback_pipeline_id
    Rollback(PhaseArgs),

    /// Check a BOM against governance rules, server config and credentials
    Validate {
        #[arg(long, value_name = "FILE")]
        bom: PathBuf,

        /// Branch for branch/environment rules (defaults to CI_COMMIT_BRANCH)
        #[arg(long)]
        branch: Option<String>,
    },

    /// Print the compiled kMigrator flag string of a profile
    Flags {
        #[arg(long)]
        profile: String,
    },

    /// Print the CI Vault configuration of a server
    VaultConfig {
        #[arg(long)]
        server: String,
    },
}
