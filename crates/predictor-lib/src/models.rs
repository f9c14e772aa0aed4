//! Core data models for the housing price pipeline

use serde::{Deserialize, Serialize};

/// Column order of the training CSV, label last
pub const CSV_COLUMNS: [&str; 10] = [
    "ocean_proximity",
    "longitude",
    "latitude",
    "housing_median_age",
    "total_rooms",
    "total_bedrooms",
    "population",
    "households",
    "median_income",
    "median_house_value",
];

/// Numeric feature columns in the order they follow the one-hot block
pub const NUMERIC_FEATURES: [&str; 8] = [
    "longitude",
    "latitude",
    "housing_median_age",
    "total_rooms",
    "total_bedrooms",
    "population",
    "households",
    "median_income",
];

/// One observation of the housing dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HousingRecord {
    pub ocean_proximity: String,
    pub longitude: f64,
    pub latitude: f64,
    pub housing_median_age: f64,
    pub total_rooms: f64,
    pub total_bedrooms: f64,
    pub population: f64,
    pub households: f64,
    pub median_income: f64,
    /// Label; ignored at prediction time
    #[serde(default)]
    pub median_house_value: f64,
}

impl HousingRecord {
    /// Numeric features in `NUMERIC_FEATURES` order
    pub fn numeric_features(&self) -> [f64; 8] {
        [
            self.longitude,
            self.latitude,
            self.housing_median_age,
            self.total_rooms,
            self.total_bedrooms,
            self.population,
            self.households,
            self.median_income,
        ]
    }

    /// Name of the first non-finite numeric field, label included
    pub fn first_non_finite(&self) -> Option<&'static str> {
        NUMERIC_FEATURES
            .iter()
            .zip(self.numeric_features())
            .find(|(_, v)| !v.is_finite())
            .map(|(name, _)| *name)
            .or_else(|| {
                (!self.median_house_value.is_finite()).then_some("median_house_value")
            })
    }
}

/// Fixed-length encoded feature vector: one-hot block followed by numeric fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub values: Vec<f64>,
}

impl FeatureVector {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }
}

/// Accuracy metrics for one evaluated fold
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EvaluationMetrics {
    pub mean_absolute_error: f64,
    pub mean_squared_error: f64,
    pub root_mean_squared_error: f64,
    /// Squared-error loss averaged over the evaluated rows
    pub loss: f64,
    /// Can be negative for a fit worse than the mean baseline
    pub r_squared: f64,
}

/// Arithmetic mean of each metric across folds
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AggregateMetrics {
    pub mean_absolute_error: f64,
    pub mean_squared_error: f64,
    pub root_mean_squared_error: f64,
    pub loss: f64,
    pub r_squared: f64,
}

/// Outcome of a single prediction request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PredictionResult {
    Price { value: f64, model_version: String },
    Unavailable { reason: String },
}

impl PredictionResult {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }

    pub fn price(&self) -> Option<f64> {
        match self {
            Self::Price { value, .. } => Some(*value),
            Self::Unavailable { .. } => None,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Self::Price { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> HousingRecord {
        HousingRecord {
            ocean_proximity: "NEAR_BAY".to_string(),
            longitude: -122.23,
            latitude: 37.88,
            housing_median_age: 41.0,
            total_rooms: 880.0,
            total_bedrooms: 129.0,
            population: 322.0,
            households: 126.0,
            median_income: 8.3252,
            median_house_value: 452_600.0,
        }
    }

    #[test]
    fn test_numeric_feature_order() {
        let features = record().numeric_features();
        assert_eq!(features[0], -122.23);
        assert_eq!(features[7], 8.3252);
        assert_eq!(features.len(), NUMERIC_FEATURES.len());
    }

    #[test]
    fn test_first_non_finite() {
        let mut r = record();
        assert_eq!(r.first_non_finite(), None);
        r.population = f64::NAN;
        assert_eq!(r.first_non_finite(), Some("population"));

        let mut r = record();
        r.median_house_value = f64::INFINITY;
        assert_eq!(r.first_non_finite(), Some("median_house_value"));
    }

    #[test]
    fn test_prediction_result_serialization() {
        let result = PredictionResult::Price {
            value: 1.5,
            model_version: "abc".to_string(),
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["status"], "price");
        assert_eq!(json["value"], 1.5);

        let json = serde_json::to_value(PredictionResult::unavailable("no model")).unwrap();
        assert_eq!(json["status"], "unavailable");
        assert_eq!(json["reason"], "no model");
    }

    #[test]
    fn test_record_label_defaults_when_absent() {
        let json = r#"{"ocean_proximity":"INLAND","longitude":-121.0,"latitude":38.0,
            "housing_median_age":10.0,"total_rooms":1000.0,"total_bedrooms":200.0,
            "population":500.0,"households":180.0,"median_income":3.5}"#;
        let r: HousingRecord = serde_json::from_str(json).unwrap();
        assert_eq!(r.median_house_value, 0.0);
        assert_eq!(r.ocean_proximity, "INLAND");
    }
}
