//! Depth-wise regression trees fitted on binned features

use super::binning::{BinnedColumns, FeatureBins};
use serde::{Deserialize, Serialize};

/// Minimum variance reduction for a split to be kept
const MIN_SPLIT_GAIN: f64 = 1e-12;

/// A node in the flattened tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TreeNode {
    /// Rows with `features[feature] <= threshold` go to `left`
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf { value: f64 },
}

/// Regression tree stored as an arena, root at index 0
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    nodes: Vec<TreeNode>,
}

impl RegressionTree {
    pub fn predict(&self, features: &[f64]) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                TreeNode::Leaf { value } => return *value,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if features[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }

    pub fn n_leaves(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, TreeNode::Leaf { .. }))
            .count()
    }

    pub fn depth(&self) -> usize {
        fn depth_of(nodes: &[TreeNode], idx: usize) -> usize {
            match &nodes[idx] {
                TreeNode::Leaf { .. } => 0,
                TreeNode::Split { left, right, .. } => {
                    1 + depth_of(nodes, *left).max(depth_of(nodes, *right))
                }
            }
        }
        depth_of(&self.nodes, 0)
    }

    /// Splits read existing features and point forward to existing nodes, so
    /// `predict` always terminates without indexing out of bounds
    pub(crate) fn is_well_formed(&self, n_features: usize) -> bool {
        let n_nodes = self.nodes.len();
        n_nodes > 0
            && self.nodes.iter().enumerate().all(|(idx, node)| match node {
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    *feature < n_features
                        && !threshold.is_nan()
                        && (idx + 1..n_nodes).contains(left)
                        && (idx + 1..n_nodes).contains(right)
                }
                TreeNode::Leaf { value } => value.is_finite(),
            })
    }
}

/// Growth limits for one tree
#[derive(Debug, Clone, Copy)]
pub(crate) struct TreeParams {
    pub max_depth: usize,
    pub min_samples_leaf: usize,
    /// Multiplier applied to every leaf value
    pub shrinkage: f64,
}

struct BestSplit {
    feature: usize,
    bin: usize,
    gain: f64,
}

/// Fits a tree to `targets` over the given subset of rows
pub(crate) struct TreeBuilder<'a> {
    bins: &'a FeatureBins,
    binned: &'a BinnedColumns,
    targets: &'a [f64],
    params: TreeParams,
    nodes: Vec<TreeNode>,
}

impl<'a> TreeBuilder<'a> {
    pub fn new(
        bins: &'a FeatureBins,
        binned: &'a BinnedColumns,
        targets: &'a [f64],
        params: TreeParams,
    ) -> Self {
        Self {
            bins,
            binned,
            targets,
            params,
            nodes: Vec::new(),
        }
    }

    pub fn build(mut self, rows: Vec<usize>) -> RegressionTree {
        self.grow(rows, 0);
        RegressionTree { nodes: self.nodes }
    }

    fn grow(&mut self, rows: Vec<usize>, depth: usize) -> usize {
        let idx = self.nodes.len();
        let sum: f64 = rows.iter().map(|&r| self.targets[r]).sum();
        let leaf_value = if rows.is_empty() {
            0.0
        } else {
            self.params.shrinkage * sum / rows.len() as f64
        };
        self.nodes.push(TreeNode::Leaf { value: leaf_value });

        if depth >= self.params.max_depth || rows.len() < 2 * self.params.min_samples_leaf {
            return idx;
        }
        let Some(best) = self.best_split(&rows, sum) else {
            return idx;
        };

        let column = self.binned.column(best.feature);
        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
            .into_iter()
            .partition(|&r| (column[r] as usize) <= best.bin);

        let left = self.grow(left_rows, depth + 1);
        let right = self.grow(right_rows, depth + 1);
        self.nodes[idx] = TreeNode::Split {
            feature: best.feature,
            threshold: self.bins.threshold(best.feature, best.bin),
            left,
            right,
        };
        idx
    }

    /// Split maximising `sL²/nL + sR²/nR - s²/n`
    fn best_split(&self, rows: &[usize], sum: f64) -> Option<BestSplit> {
        let n = rows.len();
        let parent_score = sum * sum / n as f64;
        let min_leaf = self.params.min_samples_leaf;
        let mut best: Option<BestSplit> = None;

        for feature in 0..self.bins.n_features() {
            let n_bins = self.bins.n_bins(feature);
            if n_bins < 2 {
                continue;
            }
            let column = self.binned.column(feature);
            let mut hist_sum = vec![0.0; n_bins];
            let mut hist_count = vec![0usize; n_bins];
            for &r in rows {
                let b = column[r] as usize;
                hist_sum[b] += self.targets[r];
                hist_count[b] += 1;
            }

            let mut left_sum = 0.0;
            let mut left_count = 0;
            for bin in 0..n_bins - 1 {
                left_sum += hist_sum[bin];
                left_count += hist_count[bin];
                let right_count = n - left_count;
                if left_count < min_leaf {
                    continue;
                }
                if right_count < min_leaf {
                    break;
                }
                let right_sum = sum - left_sum;
                let gain = left_sum * left_sum / left_count as f64
                    + right_sum * right_sum / right_count as f64
                    - parent_score;
                if gain > MIN_SPLIT_GAIN && best.as_ref().map_or(true, |b| gain > b.gain) {
                    best = Some(BestSplit { feature, bin, gain });
                }
            }
        }

        best
    }
}
