//! `hpp train`: run the training pipeline locally

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use predictor_lib::{Describe, Settings, TrainingDecision, TrainingOrchestrator, TrainingOutcome};
use std::path::PathBuf;
use std::sync::Arc;
use tabled::Tabled;

use crate::output::{
    color_r_squared, format_bytes, print_info, print_json, print_rows, print_success,
    print_warning, FieldRow, OutputFormat,
};

#[derive(Args, Debug, Default)]
pub struct TrainArgs {
    /// Training CSV (defaults to the configured data_path)
    #[arg(long)]
    pub data: Option<PathBuf>,

    /// Where to publish the model (defaults to the configured model_path)
    #[arg(long)]
    pub model: Option<PathBuf>,

    /// Boosting iterations
    #[arg(long)]
    pub iterations: Option<usize>,

    /// Cross-validation folds
    #[arg(long)]
    pub folds: Option<usize>,

    /// Minimum mean R² required to publish
    #[arg(long)]
    pub threshold: Option<f64>,

    /// Seed for row subsampling
    #[arg(long)]
    pub seed: Option<u64>,
}

impl TrainArgs {
    fn apply(self, settings: &mut Settings) {
        if let Some(data) = self.data {
            settings.data_path = data;
        }
        if let Some(model) = self.model {
            settings.model_path = model;
        }
        let training = &mut settings.training;
        training.iterations = self.iterations.unwrap_or(training.iterations);
        training.fold_count = self.folds.unwrap_or(training.fold_count);
        training.acceptance_threshold = self.threshold.unwrap_or(training.acceptance_threshold);
        training.seed = self.seed.unwrap_or(training.seed);
    }
}

/// Row for the per-fold table
#[derive(Tabled)]
struct FoldRow {
    #[tabled(rename = "Fold")]
    fold: usize,
    #[tabled(rename = "Train")]
    train: usize,
    #[tabled(rename = "Test")]
    test: usize,
    #[tabled(rename = "MAE")]
    mae: String,
    #[tabled(rename = "RMSE")]
    rmse: String,
    #[tabled(rename = "R²")]
    r_squared: String,
}

/// Train, evaluate and publish when accurate enough
///
/// Rejection is reported but is not an error. Ctrl-C cancels at the next
/// phase boundary.
pub async fn run(args: TrainArgs, mut settings: Settings, format: OutputFormat) -> Result<()> {
    args.apply(&mut settings);
    settings
        .training
        .validate()
        .context("Invalid training configuration")?;

    let orchestrator = Arc::new(TrainingOrchestrator::new(
        settings.training.clone(),
        &settings.model_path,
    ));
    let mut handle = orchestrator
        .spawn(settings.data_path.clone())
        .context("Could not start training")?;

    let cancel = handle.cancellation();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    while let Some(message) = handle.progress.recv().await {
        match format {
            OutputFormat::Table => println!("  {}", message.dimmed()),
            OutputFormat::Json => eprintln!("{}", message),
        }
    }
    let result = handle.wait().await;
    interrupt.abort();
    let outcome = result.context("Training failed")?;

    match format {
        OutputFormat::Json => print_json(&outcome)?,
        OutputFormat::Table => print_outcome(&outcome, settings.training.acceptance_threshold),
    }
    Ok(())
}

fn print_outcome(outcome: &TrainingOutcome, threshold: f64) {
    println!();
    print_info(&format!(
        "Cross-validation over {} rows ({:.1}s)",
        outcome.rows,
        outcome.duration.as_secs_f64()
    ));
    let folds = outcome
        .report
        .folds
        .iter()
        .map(|f| FoldRow {
            fold: f.index + 1,
            train: f.train_size,
            test: f.test_size,
            mae: format!("{:.2}", f.metrics.mean_absolute_error),
            rmse: format!("{:.2}", f.metrics.root_mean_squared_error),
            r_squared: color_r_squared(f.metrics.r_squared, threshold),
        })
        .collect();
    print_rows::<FoldRow>(folds);
    print_rows(
        outcome
            .report
            .aggregate
            .describe()
            .into_iter()
            .map(FieldRow::from)
            .collect(),
    );

    match &outcome.decision {
        TrainingDecision::Accepted {
            artifact_path,
            artifact_bytes,
        } => print_success(&format!(
            "Model {} published to {} ({})",
            outcome.model_version.cyan(),
            artifact_path.display(),
            format_bytes(*artifact_bytes)
        )),
        TrainingDecision::Rejected {
            r_squared,
            threshold,
        } => print_warning(&format!(
            "Model rejected: mean R² {} is below {}; existing artifact left untouched",
            color_r_squared(*r_squared, *threshold),
            threshold
        )),
    }
}
