//! HTTP API for predictions, training, health checks and Prometheus metrics

use crate::jobs::{start_training, TrainingStatus};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use predictor_lib::{
    health::{components, ComponentStatus, HealthRegistry},
    observability::PipelineMetrics,
    HousingRecord, PipelineError, PredictionResult, PredictionService, ServiceStatus,
    TrainingOrchestrator,
};
use prometheus::{Encoder, TextEncoder};
use serde_json::json;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::info;

/// Shared application state
pub struct AppState {
    pub health_registry: HealthRegistry,
    pub metrics: PipelineMetrics,
    pub service: Arc<PredictionService>,
    pub trainer: Arc<TrainingOrchestrator>,
    /// Training CSV used by `POST /train`
    pub data_path: PathBuf,
    training: Mutex<TrainingStatus>,
}

impl AppState {
    pub fn new(
        health_registry: HealthRegistry,
        metrics: PipelineMetrics,
        service: Arc<PredictionService>,
        trainer: Arc<TrainingOrchestrator>,
        data_path: PathBuf,
    ) -> Self {
        Self {
            health_registry,
            metrics,
            service,
            trainer,
            data_path,
            training: Mutex::new(TrainingStatus::default()),
        }
    }

    pub fn training_status(&self) -> MutexGuard<'_, TrainingStatus> {
        self.training.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Mirror the prediction service state into the health registry
pub async fn sync_health(state: &AppState) {
    match state.service.status() {
        ServiceStatus::Ready { .. } => {
            state
                .health_registry
                .set_healthy(components::PREDICTION_SERVICE)
                .await;
            state.health_registry.set_ready(true, None).await;
        }
        ServiceStatus::Degraded { reason } => {
            state
                .health_registry
                .set_degraded(components::PREDICTION_SERVICE, reason.clone())
                .await;
            state
                .health_registry
                .set_ready(false, Some(format!("no model loaded: {}", reason)))
                .await;
        }
    }
}

/// Health check response - returns 200 if healthy, 503 if unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy => StatusCode::OK,
        ComponentStatus::Degraded => StatusCode::OK, // Still operational
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

/// Readiness check response - returns 200 once a model is loaded
async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

/// Prometheus metrics endpoint
async fn metrics() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain; charset=utf-8")],
            e.to_string().into_bytes(),
        );
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
}

/// Always 200; problems are reported inside the result
async fn predict(
    State(state): State<Arc<AppState>>,
    body: Result<Json<serde_json::Value>, JsonRejection>,
) -> Json<PredictionResult> {
    let record = body
        .map_err(|rejection| rejection.body_text())
        .and_then(|Json(value)| {
            serde_json::from_value::<HousingRecord>(value).map_err(|e| e.to_string())
        });
    let result = match record {
        Ok(record) => state.service.predict(&record),
        Err(reason) => PredictionResult::unavailable(format!("invalid request: {}", reason)),
    };
    Json(result)
}

async fn reload(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let result = state.service.reload();
    sync_health(&state).await;

    match result {
        Ok(()) => (StatusCode::OK, Json(json!({ "status": state.service.status() }))),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "error": e.to_string(),
                "status": state.service.status(),
            })),
        ),
    }
}

async fn train(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match start_training(&state) {
        Ok(()) => (
            StatusCode::ACCEPTED,
            Json(json!({ "state": "running", "data_path": state.data_path })),
        ),
        Err(e @ PipelineError::TrainingInProgress(_)) => {
            (StatusCode::CONFLICT, Json(json!({ "error": e.to_string() })))
        }
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": e.to_string() })),
        ),
    }
}

async fn train_status(State(state): State<Arc<AppState>>) -> Json<TrainingStatus> {
    Json(state.training_status().clone())
}

async fn cancel_training(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    if state.training_status().cancel() {
        (StatusCode::ACCEPTED, Json(json!({ "state": "cancelling" })))
    } else {
        (
            StatusCode::CONFLICT,
            Json(json!({ "error": "no training run in progress" })),
        )
    }
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .route("/predict", post(predict))
        .route("/reload", post(reload))
        .route("/train", post(train))
        .route("/train/status", get(train_status))
        .route("/train/cancel", post(cancel_training))
        .with_state(state)
}

/// Start the API server
pub async fn serve(port: u16, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
