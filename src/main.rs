// ABOUTME: Entry point for the caravel CLI application.
// ABOUTME: Parses arguments and dispatches to appropriate command handlers.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};
use caravel::error::Result;
use caravel::output::{Output, OutputMode};
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
        .with_target(true)
        .init();

    let mode = if cli.json {
        OutputMode::Json
    } else if cli.quiet {
        OutputMode::Quiet
    } else {
        OutputMode::Normal
    };
    let output = Output::new(mode);

    let code = match run(cli, &output).await {
        Ok(code) => code,
        Err(e) => {
            output.error(&e.to_string());
            e.exit_code()
        }
    };

    std::process::exit(code);
}

async fn run(cli: Cli, output: &Output) -> Result<i32> {
    match cli.command {
        Commands::Configure { target } => commands::configure(&target, output).await,
        Commands::Deploy { target, source } => commands::deploy(&target, &source, output).await,
        Commands::Verify { target } => commands::verify(&target, output).await,
        Commands::SyncCerts { target } => commands::sync_certs(&target, output).await,
    }
}
