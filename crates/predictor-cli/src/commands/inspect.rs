//! `hpp inspect`: show what a model artifact contains

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use predictor_lib::{ArtifactInfo, Describe, ModelPersister, Settings};
use serde::Serialize;
use std::path::PathBuf;

use crate::output::{
    format_bytes, print_info, print_json, print_rows, print_warning, FieldRow, OutputFormat,
};

/// Envelope metadata plus what the decoded model reports about itself
#[derive(Debug, Serialize)]
struct ArtifactSummary {
    #[serde(flatten)]
    info: ArtifactInfo,
    trained_at: DateTime<Utc>,
    training_rows: usize,
    iterations: usize,
    seed: u64,
    trees: usize,
    categories: Vec<String>,
    feature_names: Vec<String>,
}

pub fn run(model: Option<PathBuf>, settings: Settings, format: OutputFormat) -> Result<()> {
    let path = model.unwrap_or(settings.model_path);
    let persister = ModelPersister::new();

    let info = persister
        .inspect(&path)
        .with_context(|| format!("Cannot read artifact {}", path.display()))?;
    let model = persister
        .load(&path)
        .with_context(|| format!("Artifact {} failed verification", path.display()))?;

    let metadata = model.metadata();
    let summary = ArtifactSummary {
        info,
        trained_at: metadata.trained_at,
        training_rows: metadata.training_rows,
        iterations: metadata.iterations,
        seed: metadata.seed,
        trees: model.regressor().n_trees(),
        categories: model.encoder().categories().to_vec(),
        feature_names: model.encoder().feature_names(),
    };

    match format {
        OutputFormat::Json => print_json(&summary)?,
        OutputFormat::Table => print_summary(&summary),
    }
    Ok(())
}

fn print_summary(summary: &ArtifactSummary) {
    let info = &summary.info;
    print_rows(vec![
        FieldRow::new("Path", info.path.display().to_string()),
        FieldRow::new("Size", format_bytes(info.size_bytes)),
        FieldRow::new("Model Version", info.model_version.clone()),
        FieldRow::new("Format Version", info.format_version.to_string()),
        FieldRow::new("Feature Schema", info.feature_schema_version.to_string()),
        FieldRow::new("Created", info.created_at.to_rfc3339()),
        FieldRow::new("Trained", summary.trained_at.to_rfc3339()),
        FieldRow::new("Training Rows", summary.training_rows.to_string()),
        FieldRow::new(
            "Trees",
            format!("{} of {}", summary.trees, summary.iterations),
        ),
        FieldRow::new("Seed", summary.seed.to_string()),
        FieldRow::new("Categories", summary.categories.join(", ")),
        FieldRow::new("Checksum", info.checksum.clone()),
    ]);

    match &info.metrics {
        Some(metrics) => {
            print_info("Cross-validated metrics recorded at publish time");
            print_rows(
                metrics
                    .describe()
                    .into_iter()
                    .map(FieldRow::from)
                    .collect(),
            );
        }
        None => print_warning("No metrics recorded in this artifact"),
    }
}
