//! Training configuration and pipeline settings

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Boosting iterations per fit
pub const DEFAULT_ITERATIONS: usize = 200;

/// Seed for row subsampling
pub const DEFAULT_SEED: u64 = 1;

/// Folds used by cross-validation
pub const DEFAULT_FOLD_COUNT: usize = 5;

/// Minimum mean cross-validated R² for a model to be published
pub const DEFAULT_ACCEPTANCE_THRESHOLD: f64 = 0.7;

/// Environment prefix for settings overrides
pub const ENV_PREFIX: &str = "PREDICTOR";

/// What the encoder does with a category it never saw while fitting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownCategoryPolicy {
    /// Fail encoding for the record
    #[default]
    Reject,
    /// Encode with an all-zero one-hot block
    ZeroFill,
}

/// Algorithm hyperparameters and the quality gate for one training run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub iterations: usize,
    pub seed: u64,
    pub fold_count: usize,
    pub acceptance_threshold: f64,
    pub learning_rate: f64,
    pub max_depth: usize,
    pub min_samples_leaf: usize,
    pub max_bins: usize,
    /// Fraction of rows drawn for each tree
    pub subsample: f64,
    pub unknown_category: UnknownCategoryPolicy,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            iterations: DEFAULT_ITERATIONS,
            seed: DEFAULT_SEED,
            fold_count: DEFAULT_FOLD_COUNT,
            acceptance_threshold: DEFAULT_ACCEPTANCE_THRESHOLD,
            learning_rate: 0.1,
            max_depth: 6,
            min_samples_leaf: 20,
            max_bins: 255,
            subsample: 0.8,
            unknown_category: UnknownCategoryPolicy::Reject,
        }
    }
}

impl TrainingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |field, message: &str| ConfigError::Invalid {
            field,
            message: message.to_string(),
        };

        if self.iterations == 0 {
            return Err(invalid("iterations", "must be at least 1"));
        }
        if self.fold_count < 2 {
            return Err(invalid("fold_count", "must be at least 2"));
        }
        if !self.acceptance_threshold.is_finite() {
            return Err(invalid("acceptance_threshold", "must be finite"));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(invalid("learning_rate", "must be positive"));
        }
        if self.max_depth == 0 {
            return Err(invalid("max_depth", "must be at least 1"));
        }
        if self.min_samples_leaf == 0 {
            return Err(invalid("min_samples_leaf", "must be at least 1"));
        }
        if !(2..=u16::MAX as usize).contains(&self.max_bins) {
            return Err(invalid("max_bins", "must be between 2 and 65535"));
        }
        if !(self.subsample > 0.0 && self.subsample <= 1.0) {
            return Err(invalid("subsample", "must be in (0, 1]"));
        }
        Ok(())
    }
}

/// Pipeline settings: file locations plus the training configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Training CSV location
    pub data_path: PathBuf,
    /// Persisted model artifact location
    pub model_path: PathBuf,
    pub training: TrainingConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from("data/housing.csv"),
            model_path: PathBuf::from("data/TrainedModel.bin"),
            training: TrainingConfig::default(),
        }
    }
}

impl Settings {
    /// Load settings from an optional file and `PREDICTOR_*` environment variables
    ///
    /// Nested keys use a double underscore, e.g. `PREDICTOR_TRAINING__ITERATIONS`.
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        let settings: Settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| ConfigError::Source(e.to_string()))?;

        settings.training.validate()?;
        Ok(settings)
    }
}
