//! Integration tests for the prediction server API

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use predictor_lib::{
    health::{components, HealthRegistry},
    observability::PipelineMetrics,
    ModelPersister, PredictionService, TrainingConfig, TrainingOrchestrator,
};
use predictor_server::{create_router, sync_health, AppState};
use serde_json::{json, Value};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;

const HEADER: &str = "ocean_proximity,longitude,latitude,housing_median_age,total_rooms,\
total_bedrooms,population,households,median_income,median_house_value";

fn write_training_csv(dir: &Path, rows: usize) -> PathBuf {
    let categories = [
        ("NEAR_BAY", 60_000.0),
        ("INLAND", -40_000.0),
        ("NEAR_OCEAN", 45_000.0),
        ("<1H_OCEAN", 20_000.0),
    ];
    let mut csv = format!("{}\n", HEADER);
    for i in 0..rows {
        let (category, offset) = categories[i % 4];
        let income = 0.5 + ((i * 37) % 95) as f64 / 10.0;
        let rooms = 500.0 + ((i * 53) % 400) as f64 * 10.0;
        let price = 120_000.0 + 30_000.0 * income + offset;
        writeln!(
            csv,
            "{},{:.2},{:.2},{},{},{},{},{},{:.4},{:.0}",
            category,
            -122.0 + (i % 9) as f64 * 0.5,
            34.0 + (i % 7) as f64 * 0.4,
            5 + i % 45,
            rooms,
            rooms * 0.2,
            rooms * 0.8,
            rooms * 0.3,
            income,
            price
        )
        .unwrap();
    }
    let path = dir.join("housing.csv");
    std::fs::write(&path, csv).unwrap();
    path
}

fn record() -> Value {
    json!({
        "ocean_proximity": "NEAR_BAY",
        "longitude": -122.23,
        "latitude": 37.88,
        "housing_median_age": 41.0,
        "total_rooms": 880.0,
        "total_bedrooms": 129.0,
        "population": 322.0,
        "households": 126.0,
        "median_income": 8.3252
    })
}

struct TestApp {
    _dir: TempDir,
    state: Arc<AppState>,
    model_path: PathBuf,
}

async fn setup_test_app(rows: usize) -> TestApp {
    let dir = TempDir::new().unwrap();
    let data_path = write_training_csv(dir.path(), rows);
    let model_path = dir.path().join("TrainedModel.bin");

    let health_registry = HealthRegistry::new();
    health_registry.register(components::PREDICTION_SERVICE).await;
    health_registry.register(components::TRAINER).await;

    let config = TrainingConfig {
        iterations: 50,
        min_samples_leaf: 5,
        ..Default::default()
    };
    let service = Arc::new(PredictionService::open(ModelPersister::new(), &model_path));
    let trainer = Arc::new(TrainingOrchestrator::new(config, &model_path));
    let state = Arc::new(AppState::new(
        health_registry,
        PipelineMetrics::new(),
        service,
        trainer,
        data_path,
    ));
    sync_health(&state).await;

    TestApp {
        _dir: dir,
        state,
        model_path,
    }
}

async fn send(state: &Arc<AppState>, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => request
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = create_router(state.clone()).oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

async fn wait_for_training(state: &Arc<AppState>) -> Value {
    for _ in 0..600 {
        let (_, status) = send(state, "GET", "/train/status", None).await;
        if status["state"] != "running" {
            return status;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("training did not finish");
}

#[tokio::test]
async fn test_healthz_ok_but_not_ready_without_model() {
    let app = setup_test_app(40).await;

    let (status, health) = send(&app.state, "GET", "/healthz", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["status"], "degraded");
    assert_eq!(
        health["components"][components::PREDICTION_SERVICE]["status"],
        "degraded"
    );

    let (status, readiness) = send(&app.state, "GET", "/readyz", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(readiness["ready"], false);
}

#[tokio::test]
async fn test_predict_without_model_is_unavailable() {
    let app = setup_test_app(40).await;

    let (status, result) = send(&app.state, "POST", "/predict", Some(record())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(result["status"], "unavailable");
    assert!(result["reason"].as_str().unwrap().contains("not found"));
}

#[tokio::test]
async fn test_predict_with_malformed_record_is_unavailable() {
    let app = setup_test_app(40).await;

    let (status, result) = send(
        &app.state,
        "POST",
        "/predict",
        Some(json!({ "ocean_proximity": "INLAND" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(result["status"], "unavailable");
    assert!(result["reason"]
        .as_str()
        .unwrap()
        .starts_with("invalid request"));
}

#[tokio::test]
async fn test_predict_with_unparseable_body_is_unavailable() {
    let app = setup_test_app(40).await;

    let cases = [
        (Some("application/json"), "{not json"),
        (None, r#"{"ocean_proximity":"INLAND"}"#),
    ];
    for (content_type, body) in cases {
        let mut request = Request::builder().method("POST").uri("/predict");
        if let Some(content_type) = content_type {
            request = request.header("content-type", content_type);
        }
        let request = request.body(Body::from(body)).unwrap();

        let response = create_router(app.state.clone())
            .oneshot(request)
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK, "body {:?}", body);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let result: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(result["status"], "unavailable");
        assert!(result["reason"]
            .as_str()
            .unwrap()
            .starts_with("invalid request"));
    }
}

#[tokio::test]
async fn test_reload_picks_up_new_artifact() {
    let app = setup_test_app(200).await;

    let (status, body) = send(&app.state, "POST", "/reload", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body["error"].is_string());

    let outcome = app
        .state
        .trainer
        .run(
            &app.state.data_path,
            &predictor_lib::NoProgress,
            &predictor_lib::CancellationFlag::new(),
        )
        .unwrap();
    assert!(outcome.decision.is_accepted());
    assert!(app.model_path.exists());

    let (status, body) = send(&app.state, "POST", "/reload", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"]["state"], "ready");

    let (status, _) = send(&app.state, "GET", "/readyz", None).await;
    assert_eq!(status, StatusCode::OK);

    let (_, result) = send(&app.state, "POST", "/predict", Some(record())).await;
    assert_eq!(result["status"], "price");
    assert!(result["value"].as_f64().unwrap() > 0.0);
    assert_eq!(result["model_version"], outcome.model_version.as_str());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_train_endpoint_runs_in_background_and_reloads() {
    let app = setup_test_app(800).await;

    let (status, body) = send(&app.state, "POST", "/train", None).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["state"], "running");

    let (status, _) = send(&app.state, "POST", "/train", None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let finished = wait_for_training(&app.state).await;
    assert_eq!(finished["state"], "completed", "{}", finished);
    assert_eq!(finished["outcome"]["decision"]["decision"], "accepted");
    let progress: Vec<&str> = finished["progress"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(Value::as_str)
        .collect();
    assert!(progress.contains(&"Training model..."));
    assert_eq!(progress.last(), Some(&"End of process"));

    let (status, _) = send(&app.state, "GET", "/readyz", None).await;
    assert_eq!(status, StatusCode::OK);

    let (_, result) = send(&app.state, "POST", "/predict", Some(record())).await;
    assert_eq!(result["status"], "price");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_failed_training_marks_trainer_degraded() {
    let app = setup_test_app(40).await;
    std::fs::remove_file(&app.state.data_path).unwrap();

    let (status, _) = send(&app.state, "POST", "/train", None).await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let finished = wait_for_training(&app.state).await;
    assert_eq!(finished["state"], "failed");
    assert!(finished["error"].as_str().unwrap().contains("not found"));
    assert!(finished["progress"]
        .as_array()
        .unwrap()
        .iter()
        .any(|m| m.as_str().unwrap_or_default().starts_with("Training failed:")));

    let (_, health) = send(&app.state, "GET", "/healthz", None).await;
    assert_eq!(health["components"][components::TRAINER]["status"], "degraded");
    assert!(!app.model_path.exists());
}

#[tokio::test]
async fn test_cancel_without_running_job_conflicts() {
    let app = setup_test_app(40).await;

    let (status, _) = send(&app.state, "POST", "/train/cancel", None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = send(&app.state, "GET", "/train/status", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "idle");
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let app = setup_test_app(40).await;
    send(&app.state, "POST", "/predict", Some(record())).await;

    let response = create_router(app.state.clone())
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("housing_predictor_predictions_total"));
}
