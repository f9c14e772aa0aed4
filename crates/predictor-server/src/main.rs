//! Housing price prediction server
//!
//! Serves predictions from the persisted model and retrains it on request.

use anyhow::{Context, Result};
use predictor_lib::{
    health::{components, HealthRegistry},
    observability::{PipelineMetrics, StructuredLogger},
    ModelPersister, PredictionService, TrainingOrchestrator,
};
use predictor_server::{api, ServerConfig};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Optional config file location
const CONFIG_FILE_ENV: &str = "PREDICTOR_CONFIG_FILE";

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    let config_file = std::env::var_os(CONFIG_FILE_ENV).map(PathBuf::from);
    let config = ServerConfig::load(config_file.as_deref()).context("Invalid configuration")?;
    info!(
        api_port = config.api_port,
        model_path = %config.settings.model_path.display(),
        data_path = %config.settings.data_path.display(),
        "Server configured"
    );

    let health_registry = HealthRegistry::new();
    health_registry.register(components::PREDICTION_SERVICE).await;
    health_registry.register(components::TRAINER).await;

    let metrics = PipelineMetrics::new();
    let logger = StructuredLogger::new("server");
    logger.log_startup(SERVER_VERSION);

    let service = Arc::new(PredictionService::open(
        ModelPersister::new(),
        &config.settings.model_path,
    ));
    let trainer = Arc::new(TrainingOrchestrator::new(
        config.settings.training.clone(),
        &config.settings.model_path,
    ));

    let app_state = Arc::new(api::AppState::new(
        health_registry,
        metrics,
        service,
        trainer,
        config.settings.data_path.clone(),
    ));
    api::sync_health(&app_state).await;

    tokio::select! {
        result = api::serve(config.api_port, app_state) => {
            result.context("API server stopped")?;
        }
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for shutdown signal")?;
            logger.log_shutdown("SIGINT received");
        }
    }

    info!("Shutting down");
    Ok(())
}
