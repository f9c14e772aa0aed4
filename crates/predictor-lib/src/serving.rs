//! Prediction service over the persisted model
//!
//! The active model sits behind a read-write lock that is only held long
//! enough to clone or replace an `Arc`. Predictions run on their own clone,
//! so a concurrent `reload` never exposes a partially swapped model.

use crate::error::ModelLoadError;
use crate::models::{HousingRecord, PredictionResult};
use crate::observability::{PipelineMetrics, StructuredLogger};
use crate::persistence::ModelPersister;
use crate::trainer::TrainedModel;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;

/// Whether the service can answer predictions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ServiceStatus {
    Ready {
        model_version: String,
        loaded_at: DateTime<Utc>,
    },
    Degraded {
        reason: String,
    },
}

impl ServiceStatus {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready { .. })
    }
}

/// Service counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ServingStats {
    pub predictions_served: u64,
    pub predictions_unavailable: u64,
    pub reloads: u64,
    pub failed_reloads: u64,
}

#[derive(Default)]
struct ServingState {
    model: Option<Arc<TrainedModel>>,
    loaded_at: Option<DateTime<Utc>>,
    /// Most recent load failure, kept even while an older model serves
    last_error: Option<String>,
}

/// Answers single-record predictions from the artifact at a fixed path
pub struct PredictionService {
    persister: ModelPersister,
    path: PathBuf,
    state: RwLock<ServingState>,
    served: AtomicU64,
    unavailable: AtomicU64,
    reloads: AtomicU64,
    failed_reloads: AtomicU64,
    logger: StructuredLogger,
    metrics: PipelineMetrics,
}

impl PredictionService {
    /// Create the service and attempt the first load
    ///
    /// A failed load leaves the service degraded rather than failing
    /// construction.
    pub fn open(persister: ModelPersister, path: impl Into<PathBuf>) -> Self {
        let service = Self {
            persister,
            path: path.into(),
            state: RwLock::new(ServingState::default()),
            served: AtomicU64::new(0),
            unavailable: AtomicU64::new(0),
            reloads: AtomicU64::new(0),
            failed_reloads: AtomicU64::new(0),
            logger: StructuredLogger::new("prediction_service"),
            metrics: PipelineMetrics::new(),
        };
        let _ = service.reload();
        service
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Model currently answering predictions, if any
    pub fn current_model(&self) -> Option<Arc<TrainedModel>> {
        self.read_state().model.clone()
    }

    pub fn status(&self) -> ServiceStatus {
        let state = self.read_state();
        match (&state.model, state.loaded_at) {
            (Some(model), Some(loaded_at)) => ServiceStatus::Ready {
                model_version: model.version().to_string(),
                loaded_at,
            },
            _ => ServiceStatus::Degraded {
                reason: state
                    .last_error
                    .clone()
                    .unwrap_or_else(|| "no model loaded".to_string()),
            },
        }
    }

    /// Last load failure, if the most recent load attempt failed
    pub fn last_error(&self) -> Option<String> {
        self.read_state().last_error.clone()
    }

    /// Predict the price of one record; never fails
    pub fn predict(&self, record: &HousingRecord) -> PredictionResult {
        let start = Instant::now();
        // Model and reason must come from the same snapshot
        let (model, last_error) = {
            let state = self.read_state();
            (state.model.clone(), state.last_error.clone())
        };
        let result = match model {
            None => PredictionResult::unavailable(format!(
                "model unavailable: {}",
                last_error.unwrap_or_else(|| "no model loaded".to_string())
            )),
            Some(model) => match model.predict(record) {
                Ok(value) if value.is_finite() => PredictionResult::Price {
                    value,
                    model_version: model.version().to_string(),
                },
                Ok(_) => PredictionResult::unavailable("model produced a non-finite price"),
                Err(e) => PredictionResult::unavailable(format!("invalid input: {}", e)),
            },
        };

        let elapsed = start.elapsed();
        self.metrics
            .record_prediction(result.is_available(), elapsed.as_secs_f64());
        match &result {
            PredictionResult::Price {
                value,
                model_version,
            } => {
                self.served.fetch_add(1, Ordering::Relaxed);
                self.logger.log_prediction_served(
                    model_version,
                    *value,
                    elapsed.as_micros() as u64,
                );
            }
            PredictionResult::Unavailable { .. } => {
                self.unavailable.fetch_add(1, Ordering::Relaxed);
            }
        }
        result
    }

    /// Load the artifact again and swap it in on success
    ///
    /// On failure the previously loaded model, if any, keeps serving.
    pub fn reload(&self) -> Result<(), ModelLoadError> {
        match self.persister.load(&self.path) {
            Ok(model) => {
                let model = Arc::new(model);
                let version = model.version().to_string();
                {
                    let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
                    state.model = Some(model);
                    state.loaded_at = Some(Utc::now());
                    state.last_error = None;
                }
                self.reloads.fetch_add(1, Ordering::Relaxed);
                self.metrics.set_model_version(&version);
                self.logger
                    .log_model_loaded(&version, &self.path.display().to_string());
                Ok(())
            }
            Err(e) => {
                let keeping = {
                    let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
                    state.last_error = Some(e.to_string());
                    state.model.as_ref().map(|m| m.version().to_string())
                };
                self.failed_reloads.fetch_add(1, Ordering::Relaxed);
                self.logger.log_model_load_failed(
                    &self.path.display().to_string(),
                    &e.to_string(),
                    keeping.as_deref(),
                );
                Err(e)
            }
        }
    }

    pub fn stats(&self) -> ServingStats {
        ServingStats {
            predictions_served: self.served.load(Ordering::Relaxed),
            predictions_unavailable: self.unavailable.load(Ordering::Relaxed),
            reloads: self.reloads.load(Ordering::Relaxed),
            failed_reloads: self.failed_reloads.load(Ordering::Relaxed),
        }
    }

    fn read_state(&self) -> std::sync::RwLockReadGuard<'_, ServingState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }
}
