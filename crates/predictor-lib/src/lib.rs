//! Housing price prediction pipeline
//!
//! This crate provides the core functionality for:
//! - Loading and one-hot encoding the housing CSV
//! - Gradient-boosted regression trees and k-fold cross-validation
//! - A training orchestrator with an accuracy gate before publishing
//! - Atomic, checksummed model artifacts
//! - A prediction service that degrades instead of failing
//! - Health checks and observability

pub mod boosting;
pub mod config;
pub mod dataset;
pub mod describe;
pub mod encoder;
pub mod error;
pub mod evaluation;
pub mod health;
pub mod models;
pub mod observability;
pub mod orchestrator;
pub mod persistence;
pub mod serving;
pub mod trainer;

pub use config::{Settings, TrainingConfig, UnknownCategoryPolicy};
pub use describe::{Describe, FieldValue};
pub use encoder::{FeatureEncoder, FEATURE_SCHEMA_VERSION};
pub use error::{
    ConfigError, DataLoadError, EncodingError, ModelLoadError, PersistError, PipelineError,
    TrainingError,
};
pub use evaluation::{cross_validate, CrossValidationReport, FoldResult};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{PipelineMetrics, StructuredLogger};
pub use orchestrator::{
    AcceptanceGate, CancellationFlag, ChannelProgress, NoProgress, ProgressSink,
    TrainingDecision, TrainingHandle, TrainingOrchestrator, TrainingOutcome, TrainingPhase,
    Verdict,
};
pub use persistence::{ArtifactInfo, ModelPersister};
pub use serving::{PredictionService, ServiceStatus, ServingStats};
pub use trainer::{EncodedDataset, ModelMetadata, ModelTrainer, TrainedModel};
