//! `hpp predict`: price a single record with the published model

use anyhow::{bail, Context, Result};
use clap::Args;
use predictor_lib::{
    Describe, HousingRecord, ModelPersister, PredictionResult, PredictionService, Settings,
};
use serde_json::json;
use std::path::PathBuf;

use crate::output::{format_price, print_json, print_rows, print_success, FieldRow, OutputFormat};

#[derive(Args, Debug)]
pub struct PredictArgs {
    /// Model artifact (defaults to the configured model_path)
    #[arg(long)]
    pub model: Option<PathBuf>,

    /// Record as a JSON object instead of individual flags
    #[arg(long, conflicts_with = "ocean_proximity")]
    pub json: Option<String>,

    #[command(flatten)]
    pub record: RecordArgs,
}

/// Record fields as flags; all are required unless `--json` is given
#[derive(Args, Debug, Default)]
pub struct RecordArgs {
    #[arg(long)]
    pub ocean_proximity: Option<String>,
    #[arg(long, allow_negative_numbers = true)]
    pub longitude: Option<f64>,
    #[arg(long, allow_negative_numbers = true)]
    pub latitude: Option<f64>,
    #[arg(long)]
    pub housing_median_age: Option<f64>,
    #[arg(long)]
    pub total_rooms: Option<f64>,
    #[arg(long)]
    pub total_bedrooms: Option<f64>,
    #[arg(long)]
    pub population: Option<f64>,
    #[arg(long)]
    pub households: Option<f64>,
    #[arg(long)]
    pub median_income: Option<f64>,
}

impl RecordArgs {
    pub fn into_record(self) -> Result<HousingRecord> {
        let mut missing = Vec::new();
        let ocean_proximity = self.ocean_proximity.unwrap_or_else(|| {
            missing.push("--ocean-proximity");
            String::new()
        });
        let mut require = |value: Option<f64>, flag: &'static str| {
            value.unwrap_or_else(|| {
                missing.push(flag);
                0.0
            })
        };

        let record = HousingRecord {
            ocean_proximity,
            longitude: require(self.longitude, "--longitude"),
            latitude: require(self.latitude, "--latitude"),
            housing_median_age: require(self.housing_median_age, "--housing-median-age"),
            total_rooms: require(self.total_rooms, "--total-rooms"),
            total_bedrooms: require(self.total_bedrooms, "--total-bedrooms"),
            population: require(self.population, "--population"),
            households: require(self.households, "--households"),
            median_income: require(self.median_income, "--median-income"),
            median_house_value: 0.0,
        };

        if !missing.is_empty() {
            bail!("Missing record fields: {}", missing.join(", "));
        }
        Ok(record)
    }
}

pub fn run(args: PredictArgs, settings: Settings, format: OutputFormat) -> Result<()> {
    let record = match args.json {
        Some(text) => {
            serde_json::from_str::<HousingRecord>(&text).context("Invalid --json record")?
        }
        None => args.record.into_record()?,
    };
    let model_path = args.model.unwrap_or(settings.model_path);

    let service = PredictionService::open(ModelPersister::new(), &model_path);
    let result = service.predict(&record);

    match format {
        OutputFormat::Json => print_json(&json!({ "record": record, "result": result }))?,
        OutputFormat::Table => {
            // The label is not an input at prediction time
            let rows: Vec<FieldRow> = record
                .describe()
                .into_iter()
                .filter(|f| f.name != "median_house_value")
                .map(FieldRow::from)
                .collect();
            print_rows(rows);
            if let PredictionResult::Price {
                value,
                model_version,
            } = &result
            {
                print_success(&format!(
                    "Predicted median house value: {} (model {})",
                    format_price(*value),
                    model_version
                ));
            }
        }
    }

    if let PredictionResult::Unavailable { reason } = result {
        bail!("Prediction unavailable: {}", reason);
    }
    Ok(())
}
