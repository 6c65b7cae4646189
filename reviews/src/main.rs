mod app;
mod config;

use clap::{Parser, Subcommand};
use config::Config;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(about = "Restaurant review ingestion and ranking")]
struct Cli {
    /// Path to the YAML config file
    #[arg(long, short, default_value = "reviews.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Serve the admin endpoints and monitor dependencies until ctrl-c
    Run,
    /// Classify a piece of text once and print the result
    Classify { text: String },
    /// Print the top restaurants from the ranking cache
    Leaderboard {
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Print a restaurant's rank
    Rank { restaurant_id: u64 },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match Config::from_file(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}: {e}", cli.config.display());
            return ExitCode::FAILURE;
        }
    };

    let _sentry = app::init_logging(&config.logging);
    if let Some(metrics) = &config.metrics
        && let Err(e) = app::init_metrics(metrics)
    {
        tracing::warn!(error = %e, "Continuing without metrics");
    }

    let result = match cli.command {
        CliCommand::Run => app::run(config).await,
        CliCommand::Classify { text } => app::classify(config, &text).await,
        CliCommand::Leaderboard { limit } => app::leaderboard(config, limit).await,
        CliCommand::Rank { restaurant_id } => app::rank(config, restaurant_id).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Command failed");
            ExitCode::FAILURE
        }
    }
}
