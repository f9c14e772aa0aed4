//! Training run state machine
//!
//! `LOAD → ENCODE → TRAIN → EVALUATE → {ACCEPT → PERSIST, REJECT} → DONE`
//!
//! Cancellation is checked before each phase. Only the PERSIST phase writes
//! to disk, so a run that fails, is rejected, or is cancelled leaves any
//! existing artifact untouched.

use super::progress::{CancellationFlag, ChannelProgress, ProgressSink};
use crate::config::TrainingConfig;
use crate::dataset;
use crate::error::PipelineError;
use crate::evaluation::{cross_validate, CrossValidationReport};
use crate::models::AggregateMetrics;
use crate::observability::{PipelineMetrics, StructuredLogger};
use crate::persistence::ModelPersister;
use crate::trainer::{EncodedDataset, ModelTrainer};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Artifact paths with a run in flight, process-wide
static ACTIVE_RUNS: OnceLock<Mutex<HashSet<PathBuf>>> = OnceLock::new();

fn active_runs() -> MutexGuard<'static, HashSet<PathBuf>> {
    ACTIVE_RUNS
        .get_or_init(Default::default)
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
}

/// One key per file however the path is spelled
///
/// The directory is canonicalized when it exists; otherwise `.` and `..` are
/// resolved lexically.
fn registry_key(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|dir| dir.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };
    let normalized = normalize_lexically(&absolute);
    if let (Some(dir), Some(name)) = (normalized.parent(), normalized.file_name()) {
        if let Ok(dir) = fs::canonicalize(dir) {
            return dir.join(name);
        }
    }
    normalized
}

fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Exclusive claim on an artifact path, released on drop
#[derive(Debug)]
struct RunLock {
    key: PathBuf,
}

impl RunLock {
    fn acquire(artifact_path: &Path) -> Result<Self, PipelineError> {
        let key = registry_key(artifact_path);
        if !active_runs().insert(key.clone()) {
            return Err(PipelineError::TrainingInProgress(
                artifact_path.to_path_buf(),
            ));
        }
        Ok(Self { key })
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        active_runs().remove(&self.key);
    }
}

/// Stages of a training run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrainingPhase {
    Load,
    Encode,
    Train,
    Evaluate,
    Accept,
    Reject,
    Persist,
    Done,
}

impl TrainingPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Load => "load",
            Self::Encode => "encode",
            Self::Train => "train",
            Self::Evaluate => "evaluate",
            Self::Accept => "accept",
            Self::Reject => "reject",
            Self::Persist => "persist",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for TrainingPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of the quality gate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Accept,
    Reject,
}

/// Publish only models whose mean cross-validated R² reaches the threshold
pub struct AcceptanceGate;

impl AcceptanceGate {
    /// NaN never passes
    pub fn decide(r_squared: f64, threshold: f64) -> Verdict {
        if r_squared >= threshold {
            Verdict::Accept
        } else {
            Verdict::Reject
        }
    }
}

/// What a completed run did with its model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum TrainingDecision {
    Accepted {
        artifact_path: PathBuf,
        artifact_bytes: u64,
    },
    Rejected {
        r_squared: f64,
        threshold: f64,
    },
}

impl TrainingDecision {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }
}

/// Terminal state of a run that reached DONE
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingOutcome {
    pub decision: TrainingDecision,
    pub report: CrossValidationReport,
    pub rows: usize,
    pub model_version: String,
    pub duration: Duration,
}

/// Background run started with [`TrainingOrchestrator::spawn`]
///
/// `progress` closes once the run finishes; drain it, then `wait`.
pub struct TrainingHandle {
    pub progress: mpsc::UnboundedReceiver<String>,
    cancel: CancellationFlag,
    join: JoinHandle<Result<TrainingOutcome, PipelineError>>,
}

impl TrainingHandle {
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation(&self) -> CancellationFlag {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    pub async fn wait(self) -> Result<TrainingOutcome, PipelineError> {
        self.join
            .await
            .map_err(|e| PipelineError::Aborted(e.to_string()))?
    }
}

/// Sequences one training run against a fixed artifact path
pub struct TrainingOrchestrator {
    config: TrainingConfig,
    artifact_path: PathBuf,
    persister: ModelPersister,
    logger: StructuredLogger,
    metrics: PipelineMetrics,
}

impl TrainingOrchestrator {
    pub fn new(config: TrainingConfig, artifact_path: impl Into<PathBuf>) -> Self {
        Self {
            config,
            artifact_path: artifact_path.into(),
            persister: ModelPersister::new(),
            logger: StructuredLogger::new("trainer"),
            metrics: PipelineMetrics::new(),
        }
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    pub fn artifact_path(&self) -> &Path {
        &self.artifact_path
    }

    /// Whether any run currently holds this orchestrator's artifact path
    pub fn is_running(&self) -> bool {
        active_runs().contains(&registry_key(&self.artifact_path))
    }

    /// Run to completion on the current thread
    ///
    /// Rejection is a normal outcome; errors are reported through `progress`
    /// before being returned.
    pub fn run(
        &self,
        source: &Path,
        progress: &dyn ProgressSink,
        cancel: &CancellationFlag,
    ) -> Result<TrainingOutcome, PipelineError> {
        let started = Instant::now();
        let _lock = match RunLock::acquire(&self.artifact_path) {
            Ok(lock) => lock,
            Err(err) => {
                self.report_failure(&err, progress, started);
                return Err(err);
            }
        };
        self.run_locked(source, progress, cancel, started)
    }

    /// Run on the blocking pool; fails immediately if the path is busy
    pub fn spawn(self: &Arc<Self>, source: PathBuf) -> Result<TrainingHandle, PipelineError> {
        let lock = RunLock::acquire(&self.artifact_path)?;
        let (sink, progress) = ChannelProgress::channel();
        let cancel = CancellationFlag::new();

        let orchestrator = Arc::clone(self);
        let flag = cancel.clone();
        let join = tokio::task::spawn_blocking(move || {
            let _lock = lock;
            orchestrator.run_locked(&source, &sink, &flag, Instant::now())
        });

        Ok(TrainingHandle {
            progress,
            cancel,
            join,
        })
    }

    fn run_locked(
        &self,
        source: &Path,
        progress: &dyn ProgressSink,
        cancel: &CancellationFlag,
        started: Instant,
    ) -> Result<TrainingOutcome, PipelineError> {
        self.logger.log_training_started(
            &source.display().to_string(),
            &self.artifact_path.display().to_string(),
        );

        match self.execute(source, progress, cancel, started) {
            Ok(outcome) => {
                let label = if outcome.decision.is_accepted() {
                    "accepted"
                } else {
                    "rejected"
                };
                self.metrics
                    .record_training_run(label, outcome.duration.as_secs_f64());
                Ok(outcome)
            }
            Err(err) => {
                self.report_failure(&err, progress, started);
                Err(err)
            }
        }
    }

    fn execute(
        &self,
        source: &Path,
        progress: &dyn ProgressSink,
        cancel: &CancellationFlag,
        started: Instant,
    ) -> Result<TrainingOutcome, PipelineError> {
        self.config.validate()?;
        let say = |message: &str| notify(progress, message);

        let phase = self.enter(TrainingPhase::Load, cancel)?;
        if let Ok(meta) = fs::metadata(source) {
            say(&format!(
                "Processing file: {} | {} Bytes",
                file_label(source),
                group_thousands(meta.len())
            ));
        }
        say("Loading data...");
        let records = dataset::load_records(source)?;
        say(&format!("Loaded {} records", group_thousands(records.len() as u64)));
        self.finish(phase);

        let phase = self.enter(TrainingPhase::Encode, cancel)?;
        say("Building pipeline...");
        let encoded = EncodedDataset::from_records(&records, &self.config)?;
        drop(records);
        say(&format!(
            "Encoded {} rows into {} features",
            group_thousands(encoded.len() as u64),
            encoded.encoder.vector_len()
        ));
        self.finish(phase);

        let phase = self.enter(TrainingPhase::Train, cancel)?;
        say("Training model...");
        let model = ModelTrainer::new(self.config.clone()).fit_dataset(&encoded)?;
        say(&format!(
            "Trained model {} with {} trees",
            model.version(),
            model.regressor().n_trees()
        ));
        self.finish(phase);

        let phase = self.enter(TrainingPhase::Evaluate, cancel)?;
        say("Evaluating model...");
        say(&format!(
            "Cross-validating over {} folds to estimate accuracy",
            self.config.fold_count
        ));
        let report = cross_validate(&encoded.rows, &encoded.labels, &self.config)?;
        for line in metrics_report(&report.aggregate) {
            say(&line);
        }
        self.metrics
            .set_cross_validated_r_squared(report.aggregate.r_squared);
        self.finish(phase);

        say("Conclusion");
        let r_squared = report.aggregate.r_squared;
        let threshold = self.config.acceptance_threshold;
        let decision = match AcceptanceGate::decide(r_squared, threshold) {
            Verdict::Reject => {
                let phase = self.enter(TrainingPhase::Reject, cancel)?;
                self.logger.log_decision(false, r_squared, threshold);
                say(&format!(
                    "The trained model has low accuracy, less than {}, and will not be published.",
                    threshold
                ));
                self.finish(phase);
                TrainingDecision::Rejected {
                    r_squared,
                    threshold,
                }
            }
            Verdict::Accept => {
                let phase = self.enter(TrainingPhase::Accept, cancel)?;
                self.logger.log_decision(true, r_squared, threshold);
                say("The trained model has acceptable accuracy and will be published.");
                self.finish(phase);

                let phase = self.enter(TrainingPhase::Persist, cancel)?;
                say("Saving the model...");
                let artifact_bytes =
                    self.persister
                        .save(&model, Some(&report.aggregate), &self.artifact_path)?;
                say(&format!(
                    "Model file was published as {} | {} Bytes",
                    file_label(&self.artifact_path),
                    group_thousands(artifact_bytes)
                ));
                self.finish(phase);
                TrainingDecision::Accepted {
                    artifact_path: self.artifact_path.clone(),
                    artifact_bytes,
                }
            }
        };

        say("End of process");
        self.logger.log_phase(TrainingPhase::Done.as_str(), 0);

        Ok(TrainingOutcome {
            decision,
            report,
            rows: encoded.len(),
            model_version: model.version().to_string(),
            duration: started.elapsed(),
        })
    }

    fn enter(
        &self,
        phase: TrainingPhase,
        cancel: &CancellationFlag,
    ) -> Result<(TrainingPhase, Instant), PipelineError> {
        if cancel.is_cancelled() {
            debug!(phase = %phase, "Cancellation observed");
            return Err(PipelineError::Cancelled);
        }
        Ok((phase, Instant::now()))
    }

    fn finish(&self, (phase, since): (TrainingPhase, Instant)) {
        self.logger
            .log_phase(phase.as_str(), since.elapsed().as_millis() as u64);
    }

    fn report_failure(&self, err: &PipelineError, progress: &dyn ProgressSink, started: Instant) {
        self.logger
            .log_training_failed(err.kind(), &err.to_string());
        self.metrics
            .record_training_run(err.kind(), started.elapsed().as_secs_f64());
        notify(progress, &format!("Training failed: {}", err));
    }
}

fn notify(progress: &dyn ProgressSink, message: &str) {
    if let Err(e) = progress.notify(message) {
        warn!(error = %e, message = %message, "Progress notification failed");
    }
}

fn metrics_report(metrics: &AggregateMetrics) -> Vec<String> {
    vec![
        "Metrics for regression model (mean over folds)".to_string(),
        format!("  Loss function:       {}", format_metric(metrics.loss)),
        format!("  R2 score:            {}", format_metric(metrics.r_squared)),
        format!(
            "  Mean absolute error: {}",
            format_metric(metrics.mean_absolute_error)
        ),
        format!(
            "  Mean squared error:  {}",
            format_metric(metrics.mean_squared_error)
        ),
        format!(
            "  RMS error:           {}",
            format_metric(metrics.root_mean_squared_error)
        ),
    ]
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Up to three decimals, trailing zeros dropped
fn format_metric(value: f64) -> String {
    let fixed = format!("{:.3}", value);
    let trimmed = if fixed.contains('.') {
        fixed.trim_end_matches('0').trim_end_matches('.')
    } else {
        fixed.as_str()
    };
    if trimmed == "-0" {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}
