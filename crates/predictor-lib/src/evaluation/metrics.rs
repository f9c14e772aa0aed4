//! Regression accuracy metrics

use crate::models::{AggregateMetrics, EvaluationMetrics};

/// Compute metrics for predictions against the true labels
///
/// R² is `1 - SS_res / SS_tot`; when the labels have no variance it is
/// reported as 0.
pub fn evaluate(predictions: &[f64], labels: &[f64]) -> EvaluationMetrics {
    debug_assert_eq!(predictions.len(), labels.len());
    let n = labels.len();
    if n == 0 {
        return EvaluationMetrics::default();
    }
    let n_f = n as f64;

    let mean = labels.iter().sum::<f64>() / n_f;
    let (abs_sum, sq_sum) = predictions
        .iter()
        .zip(labels)
        .fold((0.0, 0.0), |(abs, sq), (p, y)| {
            let err = p - y;
            (abs + err.abs(), sq + err * err)
        });
    let ss_tot: f64 = labels.iter().map(|y| (y - mean).powi(2)).sum();

    let mse = sq_sum / n_f;
    let r_squared = if ss_tot == 0.0 {
        0.0
    } else {
        1.0 - sq_sum / ss_tot
    };

    EvaluationMetrics {
        mean_absolute_error: abs_sum / n_f,
        mean_squared_error: mse,
        root_mean_squared_error: mse.sqrt(),
        loss: mse,
        r_squared,
    }
}

impl AggregateMetrics {
    /// Arithmetic mean of every field across folds
    pub fn mean_of(folds: &[EvaluationMetrics]) -> Self {
        if folds.is_empty() {
            return Self::default();
        }
        let n = folds.len() as f64;
        let avg = |f: fn(&EvaluationMetrics) -> f64| folds.iter().map(f).sum::<f64>() / n;
        Self {
            mean_absolute_error: avg(|m| m.mean_absolute_error),
            mean_squared_error: avg(|m| m.mean_squared_error),
            root_mean_squared_error: avg(|m| m.root_mean_squared_error),
            loss: avg(|m| m.loss),
            r_squared: avg(|m| m.r_squared),
        }
    }
}
