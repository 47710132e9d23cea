//! quizsmith command-line entry point.

mod cli;
mod commands;
mod config;
mod error;

use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = cli::Cli::parse();

    let config = match config::CliConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}", error::CliError::Config(e.to_string()));
            return ExitCode::FAILURE;
        }
    };
    tracing::debug!(settings = %config.settings_path.display(), "loaded configuration");

    match commands::run(cli, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(report) => {
            eprintln!("error: {}", report.current_context());
            ExitCode::FAILURE
        }
    }
}
