//! Feature quantisation for histogram-based split finding

use crate::models::FeatureVector;

/// Per-feature cut points learned from training rows
///
/// A value `v` falls into bin `k` where `k` is the number of cut points
/// strictly below `v`, so every value in bins `0..=k` satisfies
/// `v <= cut_points[k]`.
#[derive(Debug, Clone)]
pub(crate) struct FeatureBins {
    cut_points: Vec<Vec<f64>>,
}

impl FeatureBins {
    pub fn fit(rows: &[FeatureVector], n_features: usize, max_bins: usize) -> Self {
        let cut_points = (0..n_features)
            .map(|f| {
                let mut values: Vec<f64> = rows.iter().map(|r| r.values[f]).collect();
                values.sort_by(f64::total_cmp);
                values.dedup();
                cut_points_for(&values, max_bins)
            })
            .collect();
        Self { cut_points }
    }

    pub fn n_features(&self) -> usize {
        self.cut_points.len()
    }

    pub fn n_bins(&self, feature: usize) -> usize {
        self.cut_points[feature].len() + 1
    }

    /// Raw threshold separating bins `..=bin` from the rest
    pub fn threshold(&self, feature: usize, bin: usize) -> f64 {
        self.cut_points[feature][bin]
    }

    pub fn bin_of(&self, feature: usize, value: f64) -> u16 {
        self.cut_points[feature].partition_point(|t| *t < value) as u16
    }

    /// Column-major bin indices for every row
    pub fn bin_rows(&self, rows: &[FeatureVector]) -> BinnedColumns {
        let columns = (0..self.n_features())
            .map(|f| rows.iter().map(|r| self.bin_of(f, r.values[f])).collect())
            .collect();
        BinnedColumns { columns }
    }
}

/// Bin indices stored per feature column
#[derive(Debug, Clone)]
pub(crate) struct BinnedColumns {
    columns: Vec<Vec<u16>>,
}

impl BinnedColumns {
    pub fn column(&self, feature: usize) -> &[u16] {
        &self.columns[feature]
    }
}

/// Midpoints between distinct values, thinned to at most `max_bins - 1` cuts
fn cut_points_for(distinct: &[f64], max_bins: usize) -> Vec<f64> {
    if distinct.len() < 2 {
        return Vec::new();
    }
    let midpoint = |i: usize| distinct[i - 1] + (distinct[i] - distinct[i - 1]) / 2.0;

    if distinct.len() <= max_bins {
        return (1..distinct.len()).map(midpoint).collect();
    }

    let mut cuts: Vec<f64> = (1..max_bins)
        .map(|k| (k * distinct.len() / max_bins).max(1))
        .map(midpoint)
        .collect();
    cuts.dedup();
    cuts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(values: &[f64]) -> Vec<FeatureVector> {
        values
            .iter()
            .map(|v| FeatureVector { values: vec![*v] })
            .collect()
    }

    #[test]
    fn test_midpoints_for_few_values() {
        let bins = FeatureBins::fit(&rows(&[3.0, 1.0, 2.0, 2.0]), 1, 255);
        assert_eq!(bins.n_bins(0), 3);
        assert_eq!(bins.threshold(0, 0), 1.5);
        assert_eq!(bins.threshold(0, 1), 2.5);
    }

    #[test]
    fn test_bin_assignment_matches_threshold() {
        let data: Vec<f64> = (0..100).map(|i| i as f64 * 0.5).collect();
        let bins = FeatureBins::fit(&rows(&data), 1, 8);
        assert!(bins.n_bins(0) <= 8);
        for v in &data {
            let b = bins.bin_of(0, *v) as usize;
            for k in 0..bins.n_bins(0) - 1 {
                assert_eq!(b <= k, *v <= bins.threshold(0, k));
            }
        }
    }

    #[test]
    fn test_constant_feature_has_single_bin() {
        let bins = FeatureBins::fit(&rows(&[7.0, 7.0, 7.0]), 1, 255);
        assert_eq!(bins.n_bins(0), 1);
        let binned = bins.bin_rows(&rows(&[7.0, 7.0]));
        assert_eq!(binned.column(0), &[0, 0]);
    }
}
