//! Name/value descriptions of records for display
//!
//! Each describable type declares a static field table; there is no runtime
//! introspection. Floats render with two decimals.

use crate::models::{AggregateMetrics, EvaluationMetrics, HousingRecord};
use serde::Serialize;

/// One row of a type's field table
pub struct FieldSpec<T: 'static> {
    pub name: &'static str,
    pub label: &'static str,
    pub format: fn(&T) -> String,
}

/// A rendered field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldValue {
    pub name: &'static str,
    pub label: &'static str,
    pub value: String,
}

pub trait Describe: Sized + 'static {
    const FIELDS: &'static [FieldSpec<Self>];

    fn describe(&self) -> Vec<FieldValue> {
        Self::FIELDS
            .iter()
            .map(|field| FieldValue {
                name: field.name,
                label: field.label,
                value: (field.format)(self),
            })
            .collect()
    }

    /// `Label: value` lines
    fn describe_text(&self) -> String {
        self.describe()
            .iter()
            .map(|f| format!("{}: {}", f.label, f.value))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn two_decimals(value: f64) -> String {
    format!("{:.2}", value)
}

impl Describe for HousingRecord {
    const FIELDS: &'static [FieldSpec<Self>] = &[
        FieldSpec {
            name: "ocean_proximity",
            label: "Ocean Proximity",
            format: |r: &HousingRecord| r.ocean_proximity.clone(),
        },
        FieldSpec {
            name: "longitude",
            label: "Longitude",
            format: |r: &HousingRecord| two_decimals(r.longitude),
        },
        FieldSpec {
            name: "latitude",
            label: "Latitude",
            format: |r: &HousingRecord| two_decimals(r.latitude),
        },
        FieldSpec {
            name: "housing_median_age",
            label: "Housing Median Age",
            format: |r: &HousingRecord| two_decimals(r.housing_median_age),
        },
        FieldSpec {
            name: "total_rooms",
            label: "Total Rooms",
            format: |r: &HousingRecord| two_decimals(r.total_rooms),
        },
        FieldSpec {
            name: "total_bedrooms",
            label: "Total Bedrooms",
            format: |r: &HousingRecord| two_decimals(r.total_bedrooms),
        },
        FieldSpec {
            name: "population",
            label: "Population",
            format: |r: &HousingRecord| two_decimals(r.population),
        },
        FieldSpec {
            name: "households",
            label: "Households",
            format: |r: &HousingRecord| two_decimals(r.households),
        },
        FieldSpec {
            name: "median_income",
            label: "Median Income",
            format: |r: &HousingRecord| two_decimals(r.median_income),
        },
        FieldSpec {
            name: "median_house_value",
            label: "Median House Value",
            format: |r: &HousingRecord| two_decimals(r.median_house_value),
        },
    ];
}

// Both metric types share field names, so they share a table layout.
macro_rules! describe_metrics {
    ($ty:ty) => {
        impl Describe for $ty {
            const FIELDS: &'static [FieldSpec<Self>] = &[
                FieldSpec {
                    name: "mean_absolute_error",
                    label: "Mean Absolute Error",
                    format: |m: &$ty| two_decimals(m.mean_absolute_error),
                },
                FieldSpec {
                    name: "mean_squared_error",
                    label: "Mean Squared Error",
                    format: |m: &$ty| two_decimals(m.mean_squared_error),
                },
                FieldSpec {
                    name: "root_mean_squared_error",
                    label: "Root Mean Squared Error",
                    format: |m: &$ty| two_decimals(m.root_mean_squared_error),
                },
                FieldSpec {
                    name: "loss",
                    label: "Loss",
                    format: |m: &$ty| two_decimals(m.loss),
                },
                FieldSpec {
                    name: "r_squared",
                    label: "R Squared",
                    format: |m: &$ty| two_decimals(m.r_squared),
                },
            ];
        }
    };
}

describe_metrics!(EvaluationMetrics);
describe_metrics!(AggregateMetrics);
