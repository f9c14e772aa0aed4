//! Background training jobs started over HTTP

use crate::api::{sync_health, AppState};
use chrono::{DateTime, Utc};
use predictor_lib::health::components;
use predictor_lib::{CancellationFlag, PipelineError, TrainingOutcome};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    #[default]
    Idle,
    Running,
    /// Reached DONE, whether the model was accepted or rejected
    Completed,
    Failed,
}

/// Snapshot served by `GET /train/status`
#[derive(Debug, Clone, Default, Serialize)]
pub struct TrainingStatus {
    pub state: JobState,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub progress: Vec<String>,
    pub outcome: Option<TrainingOutcome>,
    pub error: Option<String>,
    #[serde(skip)]
    cancel: Option<CancellationFlag>,
}

impl TrainingStatus {
    pub fn is_running(&self) -> bool {
        self.state == JobState::Running
    }

    /// Request cancellation of the running job; false if none is running
    pub fn cancel(&self) -> bool {
        match (&self.cancel, self.is_running()) {
            (Some(flag), true) => {
                flag.cancel();
                true
            }
            _ => false,
        }
    }
}

/// Start a run against the configured data file
///
/// Fails with `TrainingInProgress` when a run already holds the artifact.
pub fn start_training(state: &Arc<AppState>) -> Result<(), PipelineError> {
    let mut handle = state.trainer.spawn(state.data_path.clone())?;

    {
        let mut status = state.training_status();
        *status = TrainingStatus {
            state: JobState::Running,
            started_at: Some(Utc::now()),
            cancel: Some(handle.cancellation()),
            ..Default::default()
        };
    }
    info!(data = %state.data_path.display(), "Training job started");

    let state = Arc::clone(state);
    tokio::spawn(async move {
        while let Some(message) = handle.progress.recv().await {
            state.training_status().progress.push(message);
        }

        match handle.wait().await {
            Ok(outcome) => {
                if outcome.decision.is_accepted() {
                    if let Err(e) = state.service.reload() {
                        warn!(error = %e, "Reload after accepted training run failed");
                    }
                    sync_health(&state).await;
                }
                state.health_registry.set_healthy(components::TRAINER).await;

                let mut status = state.training_status();
                status.state = JobState::Completed;
                status.finished_at = Some(Utc::now());
                status.outcome = Some(outcome);
            }
            Err(e) => {
                let message = format!("last run failed: {}", e);
                match e {
                    PipelineError::Aborted(_) => {
                        state
                            .health_registry
                            .set_unhealthy(components::TRAINER, message)
                            .await
                    }
                    _ => {
                        state
                            .health_registry
                            .set_degraded(components::TRAINER, message)
                            .await
                    }
                }

                let mut status = state.training_status();
                status.state = JobState::Failed;
                status.finished_at = Some(Utc::now());
                status.error = Some(e.to_string());
            }
        }
    });

    Ok(())
}
