//! Gradient-boosted regression trees
//!
//! Squared-error boosting over histogram-binned features:
//! - the ensemble starts from the label mean
//! - each iteration fits a depth-wise tree to the current residuals on a
//!   seeded row subsample
//! - leaf values are shrunk by the learning rate before being added

mod binning;
mod tree;

pub use tree::{RegressionTree, TreeNode};

use crate::config::TrainingConfig;
use crate::models::FeatureVector;
use binning::FeatureBins;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::trace;
use tree::{TreeBuilder, TreeParams};

/// Algorithm parameters extracted from a [`TrainingConfig`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoostingParams {
    pub iterations: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    pub min_samples_leaf: usize,
    pub max_bins: usize,
    pub subsample: f64,
    pub seed: u64,
}

impl From<&TrainingConfig> for BoostingParams {
    fn from(config: &TrainingConfig) -> Self {
        Self {
            iterations: config.iterations,
            learning_rate: config.learning_rate,
            max_depth: config.max_depth,
            min_samples_leaf: config.min_samples_leaf,
            max_bins: config.max_bins,
            subsample: config.subsample,
            seed: config.seed,
        }
    }
}

/// Fitted tree ensemble
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientBoostedRegressor {
    base_score: f64,
    trees: Vec<RegressionTree>,
    n_features: usize,
    /// Predictions are clamped to the label range seen while fitting
    label_min: f64,
    label_max: f64,
}

impl GradientBoostedRegressor {
    /// Fit the ensemble. Callers validate that `rows` is non-empty, rectangular
    /// and the same length as `labels`.
    pub fn fit(rows: &[FeatureVector], labels: &[f64], params: &BoostingParams) -> Self {
        let n_rows = rows.len();
        let n_features = rows.first().map(FeatureVector::len).unwrap_or(0);
        let base_score = labels.iter().sum::<f64>() / n_rows.max(1) as f64;
        let label_min = labels.iter().copied().fold(f64::INFINITY, f64::min);
        let label_max = labels.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        let bins = FeatureBins::fit(rows, n_features, params.max_bins);
        let binned = bins.bin_rows(rows);
        let tree_params = TreeParams {
            max_depth: params.max_depth,
            min_samples_leaf: params.min_samples_leaf,
            shrinkage: params.learning_rate,
        };

        let mut rng = StdRng::seed_from_u64(params.seed);
        let mut predictions = vec![base_score; n_rows];
        let mut residuals = vec![0.0; n_rows];
        let mut trees = Vec::with_capacity(params.iterations);

        for iteration in 0..params.iterations {
            for ((res, label), pred) in residuals.iter_mut().zip(labels).zip(&predictions) {
                *res = label - pred;
            }

            let sample = sample_rows(n_rows, params.subsample, &mut rng);
            let tree = TreeBuilder::new(&bins, &binned, &residuals, tree_params).build(sample);

            for (pred, row) in predictions.iter_mut().zip(rows) {
                *pred += tree.predict(&row.values);
            }
            trace!(iteration, leaves = tree.n_leaves(), "Boosting iteration complete");
            trees.push(tree);
        }

        Self {
            base_score,
            trees,
            n_features,
            label_min,
            label_max,
        }
    }

    /// Predict one encoded row
    pub fn predict(&self, features: &[f64]) -> f64 {
        let raw = self.base_score
            + self
                .trees
                .iter()
                .map(|t| t.predict(features))
                .sum::<f64>();
        raw.clamp(self.label_min, self.label_max)
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn trees(&self) -> &[RegressionTree] {
        &self.trees
    }

    pub fn label_range(&self) -> (f64, f64) {
        (self.label_min, self.label_max)
    }

    /// Structural sanity check for deserialized ensembles
    pub(crate) fn is_well_formed(&self) -> bool {
        self.base_score.is_finite()
            && self.label_min <= self.label_max
            && self.trees.iter().all(|t| t.is_well_formed(self.n_features))
    }
}

/// Rows drawn for one tree; falls back to all rows if the draw is empty
fn sample_rows(n_rows: usize, subsample: f64, rng: &mut StdRng) -> Vec<usize> {
    if subsample >= 1.0 {
        return (0..n_rows).collect();
    }
    let sample: Vec<usize> = (0..n_rows).filter(|_| rng.gen::<f64>() < subsample).collect();
    if sample.is_empty() {
        (0..n_rows).collect()
    } else {
        sample
    }
}
