// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Defines all subcommands and their arguments.

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "caravel")]
#[command(about = "Fleet deployment orchestrator with a pluggable module pipeline")]
#[command(version)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only print the final per-host summary
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Emit the invocation report as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args)]
pub struct TargetArgs {
    /// Environment to act on (inventory/<env>.yml)
    #[arg(short, long)]
    pub env: String,

    /// Comma-separated host name filter
    #[arg(long)]
    pub hosts: Option<String>,

    /// Maximum number of hosts handled concurrently
    #[arg(long, default_value_t = caravel::engine::DEFAULT_HOST_LIMIT)]
    pub limit: usize,
}

/// What source state to build the deploy artifact from.
#[derive(Args)]
#[group(required = true, multiple = false)]
pub struct DeploySource {
    /// Deploy the local working tree, uncommitted changes included
    #[arg(long)]
    pub local: bool,

    /// Deploy the latest committed revision
    #[arg(long)]
    pub latest: bool,

    /// Deploy a named release tag
    #[arg(long, value_name = "TAG")]
    pub release: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Configure hosts of an environment for deployment
    Configure {
        #[command(flatten)]
        target: TargetArgs,
    },

    /// Build an artifact and deploy it to an environment
    Deploy {
        #[command(flatten)]
        target: TargetArgs,

        #[command(flatten)]
        source: DeploySource,
    },

    /// Verify deployed state without changing anything
    Verify {
        #[command(flatten)]
        target: TargetArgs,
    },

    /// Renew certificates on an environment's hosts
    SyncCerts {
        #[command(flatten)]
        target: TargetArgs,
    },
}
