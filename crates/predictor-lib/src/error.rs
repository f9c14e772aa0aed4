//! Error taxonomy for the training and serving pipeline

use std::path::PathBuf;
use thiserror::Error;

/// Failure reading the training CSV
#[derive(Debug, Error)]
pub enum DataLoadError {
    #[error("training file not found: {0}")]
    NotFound(PathBuf),

    #[error("failed to read training file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("header mismatch: expected {expected:?}, found {found:?}")]
    SchemaMismatch {
        expected: Vec<String>,
        found: Vec<String>,
    },

    #[error("row {row}: {message}")]
    InvalidRow { row: usize, message: String },

    #[error("row {row}: field {field} is not finite")]
    NonFinite { row: usize, field: &'static str },
}

/// Failure mapping a record onto the frozen feature layout
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EncodingError {
    #[error("unknown ocean_proximity category {category:?}, known: {known:?}")]
    UnknownCategory { category: String, known: Vec<String> },

    #[error("field {0} is not finite")]
    NonFinite(&'static str),

    #[error("encoder has not been fitted")]
    NotFitted,
}

/// Malformed input to the model trainer
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TrainingError {
    #[error("cannot train on an empty dataset")]
    EmptyDataset,

    #[error("feature rows ({rows}) and labels ({labels}) differ in length")]
    LengthMismatch { rows: usize, labels: usize },

    #[error("row {row} has {found} features, expected {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("{folds} folds requested but only {rows} rows available")]
    TooFewRows { rows: usize, folds: usize },

    #[error("label at row {0} is not finite")]
    NonFiniteLabel(usize),
}

/// Failure reading a persisted model artifact
#[derive(Debug, Error)]
pub enum ModelLoadError {
    #[error("model artifact not found: {0}")]
    NotFound(PathBuf),

    #[error("failed to read model artifact {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("model artifact is truncated or corrupt: {0}")]
    Corrupt(String),

    #[error("not a model artifact (bad magic bytes)")]
    BadMagic,

    #[error("unsupported artifact format version {found}, expected {expected}")]
    UnsupportedFormat { found: u32, expected: u32 },

    #[error("artifact feature schema version {found} is incompatible with encoder version {expected}")]
    SchemaIncompatible { found: u32, expected: u32 },

    #[error("checksum mismatch: recorded {recorded}, computed {computed}")]
    ChecksumMismatch { recorded: String, computed: String },
}

/// Failure writing a model artifact
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("failed to serialize model: {0}")]
    Serialize(String),

    #[error("failed to write model artifact {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Invalid configuration values
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("invalid value for {field}: {message}")]
    Invalid { field: &'static str, message: String },

    #[error("failed to load settings: {0}")]
    Source(String),
}

/// Terminal failure of a training run
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    DataLoad(#[from] DataLoadError),

    #[error(transparent)]
    Encoding(#[from] EncodingError),

    #[error(transparent)]
    Training(#[from] TrainingError),

    #[error(transparent)]
    Persist(#[from] PersistError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("training run cancelled")]
    Cancelled,

    #[error("a training run is already active for {0}")]
    TrainingInProgress(PathBuf),

    #[error("training task aborted: {0}")]
    Aborted(String),
}

impl PipelineError {
    /// Short machine-readable kind, used for metrics labels
    pub fn kind(&self) -> &'static str {
        match self {
            Self::DataLoad(_) => "data_load",
            Self::Encoding(_) => "encoding",
            Self::Training(_) => "training",
            Self::Persist(_) => "persist",
            Self::Config(_) => "config",
            Self::Cancelled => "cancelled",
            Self::TrainingInProgress(_) => "in_progress",
            Self::Aborted(_) => "aborted",
        }
    }
}
