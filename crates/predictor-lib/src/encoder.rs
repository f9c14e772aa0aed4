//! Feature encoding for housing records
//!
//! The one-hot layout of `ocean_proximity` is derived once from the training
//! records (categories sorted lexicographically) and frozen. The encoder is
//! serialized inside every trained model so inference uses the identical
//! layout.

use crate::config::UnknownCategoryPolicy;
use crate::error::EncodingError;
use crate::models::{FeatureVector, HousingRecord, NUMERIC_FEATURES};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Version of the encoded layout; bumped whenever the vector layout changes
pub const FEATURE_SCHEMA_VERSION: u32 = 1;

/// Frozen mapping from records to fixed-length feature vectors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureEncoder {
    categories: Vec<String>,
    policy: UnknownCategoryPolicy,
}

impl FeatureEncoder {
    /// Freeze the category set from the training records
    pub fn fit(records: &[HousingRecord], policy: UnknownCategoryPolicy) -> Self {
        let categories: BTreeSet<&str> = records
            .iter()
            .map(|r| r.ocean_proximity.as_str())
            .collect();
        Self::with_categories(categories, policy)
    }

    /// Build an encoder over an explicit category set
    pub fn with_categories<I, S>(categories: I, policy: UnknownCategoryPolicy) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let set: BTreeSet<String> = categories
            .into_iter()
            .map(|c| c.as_ref().to_string())
            .collect();
        Self {
            categories: set.into_iter().collect(),
            policy,
        }
    }

    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    pub fn policy(&self) -> UnknownCategoryPolicy {
        self.policy
    }

    /// Length of every vector this encoder produces
    pub fn vector_len(&self) -> usize {
        self.categories.len() + NUMERIC_FEATURES.len()
    }

    /// Names of the encoded columns, in vector order
    pub fn feature_names(&self) -> Vec<String> {
        self.categories
            .iter()
            .map(|c| format!("ocean_proximity={}", c))
            .chain(NUMERIC_FEATURES.iter().map(|n| n.to_string()))
            .collect()
    }

    /// Encode one record
    pub fn encode(&self, record: &HousingRecord) -> Result<FeatureVector, EncodingError> {
        if self.categories.is_empty() {
            return Err(EncodingError::NotFitted);
        }

        let mut values = vec![0.0; self.vector_len()];
        match self
            .categories
            .binary_search_by(|c| c.as_str().cmp(record.ocean_proximity.as_str()))
        {
            Ok(idx) => values[idx] = 1.0,
            Err(_) if self.policy == UnknownCategoryPolicy::ZeroFill => {}
            Err(_) => {
                return Err(EncodingError::UnknownCategory {
                    category: record.ocean_proximity.clone(),
                    known: self.categories.clone(),
                })
            }
        }

        let offset = self.categories.len();
        for (slot, (name, value)) in values[offset..]
            .iter_mut()
            .zip(NUMERIC_FEATURES.iter().zip(record.numeric_features()))
        {
            if !value.is_finite() {
                return Err(EncodingError::NonFinite(*name));
            }
            *slot = value;
        }

        Ok(FeatureVector { values })
    }

    /// Encode a batch, failing on the first bad record
    pub fn encode_all(
        &self,
        records: &[HousingRecord],
    ) -> Result<Vec<FeatureVector>, EncodingError> {
        records.iter().map(|r| self.encode(r)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(category: &str) -> HousingRecord {
        HousingRecord {
            ocean_proximity: category.to_string(),
            longitude: -122.0,
            latitude: 37.0,
            housing_median_age: 30.0,
            total_rooms: 1000.0,
            total_bedrooms: 200.0,
            population: 600.0,
            households: 190.0,
            median_income: 4.0,
            median_house_value: 200_000.0,
        }
    }

    #[test]
    fn test_categories_sorted_and_deduplicated() {
        let records = vec![record("NEAR_BAY"), record("INLAND"), record("NEAR_BAY")];
        let encoder = FeatureEncoder::fit(&records, UnknownCategoryPolicy::Reject);
        assert_eq!(encoder.categories(), &["INLAND", "NEAR_BAY"]);
        assert_eq!(encoder.vector_len(), 2 + NUMERIC_FEATURES.len());
    }

    #[test]
    fn test_one_hot_position() {
        let encoder =
            FeatureEncoder::with_categories(["NEAR_BAY", "INLAND"], UnknownCategoryPolicy::Reject);
        let v = encoder.encode(&record("NEAR_BAY")).unwrap();
        assert_eq!(&v.values[..2], &[0.0, 1.0]);
        assert_eq!(v.values[2], -122.0);
        assert_eq!(v.values[v.len() - 1], 4.0);
    }

    #[test]
    fn test_unknown_category_rejected() {
        let encoder =
            FeatureEncoder::with_categories(["NEAR_BAY", "INLAND"], UnknownCategoryPolicy::Reject);
        let err = encoder.encode(&record("ISLAND")).unwrap_err();
        assert_eq!(
            err,
            EncodingError::UnknownCategory {
                category: "ISLAND".to_string(),
                known: vec!["INLAND".to_string(), "NEAR_BAY".to_string()],
            }
        );
        // Deterministic on repeat
        assert_eq!(encoder.encode(&record("ISLAND")).unwrap_err(), err);
    }

    #[test]
    fn test_unknown_category_zero_fill() {
        let encoder = FeatureEncoder::with_categories(
            ["NEAR_BAY", "INLAND"],
            UnknownCategoryPolicy::ZeroFill,
        );
        let v = encoder.encode(&record("ISLAND")).unwrap();
        assert_eq!(&v.values[..2], &[0.0, 0.0]);
        assert_eq!(v.len(), encoder.vector_len());
    }

    #[test]
    fn test_constant_length_across_records() {
        let records = vec![record("NEAR_BAY"), record("INLAND"), record("ISLAND")];
        let encoder = FeatureEncoder::fit(&records, UnknownCategoryPolicy::Reject);
        let encoded = encoder.encode_all(&records).unwrap();
        assert!(encoded.iter().all(|v| v.len() == encoder.vector_len()));
        assert!(encoded
            .iter()
            .all(|v| v.values[..3].iter().filter(|x| **x == 1.0).count() == 1));
    }

    #[test]
    fn test_non_finite_rejected() {
        let encoder =
            FeatureEncoder::with_categories(["INLAND"], UnknownCategoryPolicy::Reject);
        let mut r = record("INLAND");
        r.median_income = f64::NAN;
        assert_eq!(
            encoder.encode(&r).unwrap_err(),
            EncodingError::NonFinite("median_income")
        );
    }

    #[test]
    fn test_unfitted_encoder() {
        let encoder = FeatureEncoder::fit(&[], UnknownCategoryPolicy::Reject);
        assert_eq!(
            encoder.encode(&record("INLAND")).unwrap_err(),
            EncodingError::NotFitted
        );
    }

    #[test]
    fn test_feature_names_follow_layout() {
        let encoder =
            FeatureEncoder::with_categories(["INLAND", "ISLAND"], UnknownCategoryPolicy::Reject);
        let names = encoder.feature_names();
        assert_eq!(names[0], "ocean_proximity=INLAND");
        assert_eq!(names[2], "longitude");
        assert_eq!(names.len(), encoder.vector_len());
    }
}
