//! Model training on a fully encoded dataset

use crate::boosting::{BoostingParams, GradientBoostedRegressor};
use crate::config::TrainingConfig;
use crate::encoder::FeatureEncoder;
use crate::error::{EncodingError, TrainingError};
use crate::models::{FeatureVector, HousingRecord};
use crate::persistence::compute_checksum;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info};

/// Records encoded with a frozen encoder, plus their labels
#[derive(Debug, Clone)]
pub struct EncodedDataset {
    pub encoder: FeatureEncoder,
    pub rows: Vec<FeatureVector>,
    pub labels: Vec<f64>,
}

impl EncodedDataset {
    /// Freeze an encoder on `records` and encode all of them
    pub fn from_records(
        records: &[HousingRecord],
        config: &TrainingConfig,
    ) -> Result<Self, EncodingError> {
        let encoder = FeatureEncoder::fit(records, config.unknown_category);
        let rows = if records.is_empty() {
            Vec::new()
        } else {
            encoder.encode_all(records)?
        };
        let labels = records.iter().map(|r| r.median_house_value).collect();
        Ok(Self {
            encoder,
            rows,
            labels,
        })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Descriptive information carried with a trained model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub version: String,
    pub trained_at: DateTime<Utc>,
    pub training_rows: usize,
    pub iterations: usize,
    pub seed: u64,
}

/// Fitted ensemble together with the encoder it was fitted against
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedModel {
    encoder: FeatureEncoder,
    regressor: GradientBoostedRegressor,
    metadata: ModelMetadata,
}

impl TrainedModel {
    pub fn encoder(&self) -> &FeatureEncoder {
        &self.encoder
    }

    pub fn regressor(&self) -> &GradientBoostedRegressor {
        &self.regressor
    }

    pub fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }

    pub fn version(&self) -> &str {
        &self.metadata.version
    }

    /// Predict from an already encoded row
    pub fn predict_encoded(&self, features: &FeatureVector) -> f64 {
        self.regressor.predict(&features.values)
    }

    /// Encode a record with the frozen encoder and predict its price
    pub fn predict(&self, record: &HousingRecord) -> Result<f64, EncodingError> {
        let features = self.encoder.encode(record)?;
        Ok(self.predict_encoded(&features))
    }

    /// Encoder and ensemble agree on the vector layout
    pub(crate) fn is_consistent(&self) -> bool {
        self.encoder.vector_len() == self.regressor.n_features() && self.regressor.is_well_formed()
    }
}

/// Fits models with a fixed algorithm configuration
#[derive(Debug, Clone)]
pub struct ModelTrainer {
    config: TrainingConfig,
}

impl ModelTrainer {
    pub fn new(config: TrainingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Full retrain on every row; deterministic for identical inputs and seed
    pub fn fit(
        &self,
        encoder: &FeatureEncoder,
        rows: &[FeatureVector],
        labels: &[f64],
    ) -> Result<TrainedModel, TrainingError> {
        let start = Instant::now();
        let regressor = self.fit_regressor(rows, labels)?;
        let trained_at = Utc::now();

        let metadata = ModelMetadata {
            version: format!(
                "v{}-{}",
                trained_at.format("%Y%m%d.%H%M%S%.3f"),
                fingerprint(encoder, &regressor)
            ),
            trained_at,
            training_rows: rows.len(),
            iterations: self.config.iterations,
            seed: self.config.seed,
        };

        info!(
            rows = rows.len(),
            trees = regressor.n_trees(),
            version = %metadata.version,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Model fitted"
        );

        Ok(TrainedModel {
            encoder: encoder.clone(),
            regressor,
            metadata,
        })
    }

    /// Fit the ensemble only; used for cross-validation folds
    pub fn fit_regressor(
        &self,
        rows: &[FeatureVector],
        labels: &[f64],
    ) -> Result<GradientBoostedRegressor, TrainingError> {
        validate_training_set(rows, labels)?;
        debug!(rows = rows.len(), "Fitting gradient-boosted ensemble");
        Ok(GradientBoostedRegressor::fit(
            rows,
            labels,
            &BoostingParams::from(&self.config),
        ))
    }

    pub fn fit_dataset(&self, dataset: &EncodedDataset) -> Result<TrainedModel, TrainingError> {
        self.fit(&dataset.encoder, &dataset.rows, &dataset.labels)
    }
}

/// Short content hash so models fitted in the same instant stay distinct
fn fingerprint(encoder: &FeatureEncoder, regressor: &GradientBoostedRegressor) -> String {
    match bincode::serialize(&(encoder, regressor)) {
        Ok(bytes) => compute_checksum(&bytes)[..8].to_string(),
        Err(_) => "unhashed".to_string(),
    }
}

/// Reject empty, ragged or mislabelled training sets
pub fn validate_training_set(rows: &[FeatureVector], labels: &[f64]) -> Result<(), TrainingError> {
    if rows.is_empty() {
        return Err(TrainingError::EmptyDataset);
    }
    if rows.len() != labels.len() {
        return Err(TrainingError::LengthMismatch {
            rows: rows.len(),
            labels: labels.len(),
        });
    }
    let expected = rows[0].len();
    if let Some((row, r)) = rows.iter().enumerate().find(|(_, r)| r.len() != expected) {
        return Err(TrainingError::RaggedRow {
            row,
            expected,
            found: r.len(),
        });
    }
    if let Some(row) = labels.iter().position(|y| !y.is_finite()) {
        return Err(TrainingError::NonFiniteLabel(row));
    }
    Ok(())
}
