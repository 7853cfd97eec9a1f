// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "hieval", version, about = "Parallel eval runner for AI coding agents.")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Run evals for a model against selected prompts.
    Run(hieval::run::RunArgs),
    /// Re-run existing eval folders in place.
    Resume(hieval::resume::ResumeArgs),
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let outcome = match cli.command {
        Commands::Run(args) => hieval::run::run(args).await,
        Commands::Resume(args) => hieval::resume::run(args).await,
    };
    if let Err(e) = outcome {
        error!("fatal: {e:#}");
        std::process::exit(1);
    }
}
