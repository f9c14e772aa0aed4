//! K-fold cross-validation
//!
//! Folds are contiguous and unshuffled: fold `i` takes `n / k` rows, plus one
//! for each of the first `n % k` folds. The estimate reuses the training data,
//! so it is in-sample with respect to the published model.

use super::metrics::evaluate;
use crate::config::TrainingConfig;
use crate::error::TrainingError;
use crate::models::{AggregateMetrics, EvaluationMetrics, FeatureVector};
use crate::trainer::{validate_training_set, ModelTrainer};
use serde::{Deserialize, Serialize};
use std::ops::Range;
use tracing::debug;

/// Metrics for one held-out fold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoldResult {
    pub index: usize,
    pub train_size: usize,
    pub test_size: usize,
    pub metrics: EvaluationMetrics,
}

/// Per-fold results and their mean
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossValidationReport {
    pub folds: Vec<FoldResult>,
    pub aggregate: AggregateMetrics,
}

/// Held-out row ranges for `n_rows` split into `fold_count` folds
pub fn fold_ranges(n_rows: usize, fold_count: usize) -> Vec<Range<usize>> {
    let base = n_rows / fold_count;
    let remainder = n_rows % fold_count;
    let mut start = 0;
    (0..fold_count)
        .map(|i| {
            let len = base + usize::from(i < remainder);
            let range = start..start + len;
            start += len;
            range
        })
        .collect()
}

/// Train on all-but-one fold, evaluate on the held-out fold, for each fold
pub fn cross_validate(
    rows: &[FeatureVector],
    labels: &[f64],
    config: &TrainingConfig,
) -> Result<CrossValidationReport, TrainingError> {
    validate_training_set(rows, labels)?;
    if rows.len() < config.fold_count {
        return Err(TrainingError::TooFewRows {
            rows: rows.len(),
            folds: config.fold_count,
        });
    }

    let trainer = ModelTrainer::new(config.clone());
    let mut folds = Vec::with_capacity(config.fold_count);

    for (index, test) in fold_ranges(rows.len(), config.fold_count)
        .into_iter()
        .enumerate()
    {
        let train_rows: Vec<FeatureVector> = rows[..test.start]
            .iter()
            .chain(&rows[test.end..])
            .cloned()
            .collect();
        let train_labels: Vec<f64> = labels[..test.start]
            .iter()
            .chain(&labels[test.end..])
            .copied()
            .collect();

        let model = trainer.fit_regressor(&train_rows, &train_labels)?;
        let predictions: Vec<f64> = rows[test.clone()]
            .iter()
            .map(|r| model.predict(&r.values))
            .collect();
        let metrics = evaluate(&predictions, &labels[test.clone()]);

        debug!(
            fold = index,
            train_size = train_rows.len(),
            test_size = test.len(),
            r_squared = metrics.r_squared,
            "Fold evaluated"
        );

        folds.push(FoldResult {
            index,
            train_size: train_rows.len(),
            test_size: test.len(),
            metrics,
        });
    }

    let per_fold: Vec<EvaluationMetrics> = folds.iter().map(|f| f.metrics).collect();
    Ok(CrossValidationReport {
        aggregate: AggregateMetrics::mean_of(&per_fold),
        folds,
    })
}
