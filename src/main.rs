//! Skiff - OCI image push tool
//!
//! CLI entry point that dispatches to subcommands.

use clap::Parser;
use console::style;
use skiff::cli::{Cli, Commands};
use skiff::config::ConfigManager;
use skiff::error::SkiffResult;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> SkiffResult<()> {
    let cli = Cli::parse();

    // Initialize logging: 0 = warn (spinners only), 1 = info, 2+ = debug
    let filter = match cli.verbose {
        0 => EnvFilter::new("skiff=warn"),
        1 => EnvFilter::new("skiff=info"),
        _ => EnvFilter::new("skiff=debug"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();

    // Load configuration
    let config_manager = if let Some(ref path) = cli.config {
        ConfigManager::with_path(path.clone())
    } else {
        ConfigManager::new()
    };

    let config = config_manager.load().await?;
    debug!("Storage root: {}", config.storage.root.display());

    // Dispatch to command
    match cli.command {
        Commands::Push(args) => skiff::cli::commands::push(args, &config).await,
        Commands::Config(args) => skiff::cli::commands::config(args, &config, &config_manager).await,
    }
}
