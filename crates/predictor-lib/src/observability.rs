//! Observability infrastructure for the pipeline
//!
//! Provides:
//! - Prometheus metrics (training runs, training duration, cross-validated R²,
//!   predictions served, prediction latency, loaded model version)
//! - Structured JSON-friendly logging with tracing

use prometheus::{
    register_gauge, register_gauge_vec, register_histogram, register_int_counter_vec, Gauge,
    GaugeVec, Histogram, IntCounterVec,
};
use std::sync::OnceLock;
use tracing::{debug, info, warn};

/// Buckets for prediction latency (seconds)
const PREDICTION_BUCKETS: &[f64] = &[
    0.00001, 0.00005, 0.0001, 0.00025, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.05,
];

/// Buckets for training run duration (seconds)
const TRAINING_BUCKETS: &[f64] = &[0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0, 300.0, 900.0];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<PipelineMetricsInner> = OnceLock::new();

struct PipelineMetricsInner {
    training_runs: IntCounterVec,
    training_duration_seconds: Histogram,
    cross_validated_r_squared: Gauge,
    predictions: IntCounterVec,
    prediction_latency_seconds: Histogram,
    model_info: GaugeVec,
}

impl PipelineMetricsInner {
    fn new() -> Self {
        Self {
            training_runs: register_int_counter_vec!(
                "housing_predictor_training_runs_total",
                "Training runs by terminal outcome",
                &["outcome"]
            )
            .expect("Failed to register training_runs_total"),

            training_duration_seconds: register_histogram!(
                "housing_predictor_training_duration_seconds",
                "Wall time of complete training runs",
                TRAINING_BUCKETS.to_vec()
            )
            .expect("Failed to register training_duration_seconds"),

            cross_validated_r_squared: register_gauge!(
                "housing_predictor_cross_validated_r_squared",
                "Mean R-squared of the most recent cross-validation"
            )
            .expect("Failed to register cross_validated_r_squared"),

            predictions: register_int_counter_vec!(
                "housing_predictor_predictions_total",
                "Prediction requests by result",
                &["result"]
            )
            .expect("Failed to register predictions_total"),

            prediction_latency_seconds: register_histogram!(
                "housing_predictor_prediction_latency_seconds",
                "Time spent encoding and scoring a single record",
                PREDICTION_BUCKETS.to_vec()
            )
            .expect("Failed to register prediction_latency_seconds"),

            model_info: register_gauge_vec!(
                "housing_predictor_model_info",
                "Currently loaded model version",
                &["version"]
            )
            .expect("Failed to register model_info"),
        }
    }
}

/// Lightweight handle to the process-wide Prometheus metrics
#[derive(Clone)]
pub struct PipelineMetrics {
    _private: (),
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(PipelineMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &PipelineMetricsInner {
        GLOBAL_METRICS.get_or_init(PipelineMetricsInner::new)
    }

    /// Record a finished run; `outcome` is `accepted`, `rejected` or an error kind
    pub fn record_training_run(&self, outcome: &str, duration_secs: f64) {
        self.inner()
            .training_runs
            .with_label_values(&[outcome])
            .inc();
        self.inner().training_duration_seconds.observe(duration_secs);
    }

    pub fn set_cross_validated_r_squared(&self, r_squared: f64) {
        self.inner().cross_validated_r_squared.set(r_squared);
    }

    pub fn record_prediction(&self, available: bool, duration_secs: f64) {
        let label = if available { "price" } else { "unavailable" };
        self.inner().predictions.with_label_values(&[label]).inc();
        self.inner().prediction_latency_seconds.observe(duration_secs);
    }

    pub fn set_model_version(&self, version: &str) {
        self.inner().model_info.reset();
        self.inner()
            .model_info
            .with_label_values(&[version])
            .set(1.0);
    }

    pub fn clear_model_version(&self) {
        self.inner().model_info.reset();
    }
}

/// Structured logger for pipeline events
#[derive(Clone)]
pub struct StructuredLogger {
    component: String,
}

impl StructuredLogger {
    pub fn new(component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
        }
    }

    pub fn log_training_started(&self, source: &str, artifact: &str) {
        info!(
            event = "training_started",
            component = %self.component,
            source = %source,
            artifact = %artifact,
            "Training run started"
        );
    }

    pub fn log_phase(&self, phase: &str, elapsed_ms: u64) {
        info!(
            event = "phase_completed",
            component = %self.component,
            phase = %phase,
            elapsed_ms = elapsed_ms,
            "Training phase completed"
        );
    }

    pub fn log_decision(&self, accepted: bool, r_squared: f64, threshold: f64) {
        if accepted {
            info!(
                event = "model_accepted",
                component = %self.component,
                r_squared = r_squared,
                threshold = threshold,
                "Model meets the acceptance threshold"
            );
        } else {
            warn!(
                event = "model_rejected",
                component = %self.component,
                r_squared = r_squared,
                threshold = threshold,
                "Model below acceptance threshold, keeping existing artifact"
            );
        }
    }

    pub fn log_training_failed(&self, kind: &str, error: &str) {
        warn!(
            event = "training_failed",
            component = %self.component,
            kind = %kind,
            error = %error,
            "Training run failed"
        );
    }

    pub fn log_model_loaded(&self, version: &str, path: &str) {
        info!(
            event = "model_loaded",
            component = %self.component,
            model_version = %version,
            path = %path,
            "Model loaded for serving"
        );
    }

    pub fn log_model_load_failed(&self, path: &str, error: &str, keeping: Option<&str>) {
        warn!(
            event = "model_reload_failed",
            component = %self.component,
            path = %path,
            error = %error,
            keeping_version = ?keeping,
            "Model load failed"
        );
    }

    pub fn log_prediction_served(&self, model_version: &str, value: f64, latency_us: u64) {
        debug!(
            event = "prediction_served",
            component = %self.component,
            model_version = %model_version,
            value = value,
            latency_us = latency_us,
            "Prediction served"
        );
    }

    pub fn log_startup(&self, version: &str) {
        info!(
            event = "service_started",
            component = %self.component,
            service_version = %version,
            "Housing price predictor started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "service_shutdown",
            component = %self.component,
            reason = %reason,
            "Housing price predictor shutting down"
        );
    }
}
