//! HTTP service hosting the housing price prediction service and background
//! training runs

pub mod api;
pub mod config;
pub mod jobs;

pub use api::{create_router, serve, sync_health, AppState};
pub use config::ServerConfig;
pub use jobs::{start_training, JobState, TrainingStatus};
