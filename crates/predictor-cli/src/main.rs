//! Housing Price Predictor CLI
//!
//! Trains the price model from a CSV, prices single records and inspects
//! published model artifacts.

mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{inspect, predict, train};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Housing Price Predictor CLI
#[derive(Parser)]
#[command(name = "hpp")]
#[command(author, version, about = "CLI for the Housing Price Predictor", long_about = None)]
pub struct Cli {
    /// Settings file (defaults to ~/.config/hpp/config.toml when present)
    #[arg(long, env = "PREDICTOR_CONFIG_FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(long, short, default_value = "table", global = true)]
    pub format: output::OutputFormat,

    /// Enable verbose logging
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Train, cross-validate and publish a model if it is accurate enough
    Train(train::TrainArgs),

    /// Predict the median house value of one record
    Predict(predict::PredictArgs),

    /// Show metadata and metrics of a model artifact
    Inspect {
        /// Model artifact (defaults to the configured model_path)
        #[arg(long)]
        model: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "info" } else { "warn" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with(fmt::layer().compact().with_writer(std::io::stderr))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            output::print_error(&format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let settings = config::load_settings(cli.config.as_deref())?;

    match cli.command {
        Commands::Train(args) => train::run(args, settings, cli.format).await,
        Commands::Predict(args) => predict::run(args, settings, cli.format),
        Commands::Inspect { model } => inspect::run(model, settings, cli.format),
    }
}
