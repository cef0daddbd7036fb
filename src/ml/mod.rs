//! Regression-based forecasting: member growth, churn and revenue.
//!
//! This module provides:
//! - [`Regressor`]: the capability every model must offer (fit / predict /
//!   feature importances); any conforming regressor can be swapped in
//! - [`RandomForestRegressor`]: the default bagged regression-tree ensemble
//! - [`StandardScaler`]: zero-mean / unit-variance feature scaling
//! - [`prepare_time_series_data`] / [`roll_forward`]: lookback windowing
//! - [`MlForecaster`]: training plus the data-sufficiency fallback policy
//!
//! # Architecture
//!
//! ```text
//! ClubData -> monthly rows -> lookback windows -> Regressor::fit
//!   -> roll window forward over future months -> Regressor::predict
//!   (too little data / failure -> closed-form compounding fallback)
//! ```

mod forecaster;
mod forest;
mod scaler;
mod window;

pub use forecaster::{
    fallback_growth, fallback_revenue, ChurnReport, ChurnScore, FeatureImportance,
    GrowthForecast, MlForecaster, RevenuePrediction,
};
pub use forest::RandomForestRegressor;
pub use scaler::StandardScaler;
pub use window::{future_month_ends, prepare_time_series_data, roll_forward, windowed_feature_names};

use crate::error::Result;

/// A trainable regressor treated as a black box.
///
/// Rows of `features` must all have the same length; `predict` must be given
/// rows of the length the model was fitted on.
pub trait Regressor {
    /// Train on `features` (one row per example) against `target`.
    fn fit(&mut self, features: &[Vec<f64>], target: &[f64]) -> Result<()>;

    /// One prediction per row.
    fn predict(&self, features: &[Vec<f64>]) -> Result<Vec<f64>>;

    /// Relative importance per feature column, summing to 1 (or all zero).
    fn feature_importances(&self) -> Vec<f64>;
}
