//! Model evaluation: accuracy metrics and cross-validation

mod cross_validation;
mod metrics;

pub use cross_validation::{cross_validate, fold_ranges, CrossValidationReport, FoldResult};
pub use metrics::evaluate;
