//! Regression models
//!
//! - Random forest: bagged CART trees over the full matchup vector
//! - Ridge: L2-penalised least squares over the reduced vector

pub mod forest;
pub mod ridge;

pub use forest::RandomForest;
pub use ridge::RidgeRegression;

use crate::Result;

/// A model fitted on feature rows against a numeric target
pub trait Regressor: Sized {
    /// Hyperparameters
    type Params: Clone;

    /// Display name of the estimator built on this model
    const NAME: &'static str;

    fn fit(x: &[Vec<f64>], y: &[f64], params: &Self::Params) -> Result<Self>;

    fn predict(&self, row: &[f64]) -> f64;
}

/// Shared shape checks for `Regressor::fit`
pub(crate) fn check_training_data(x: &[Vec<f64>], y: &[f64]) -> Result<usize> {
    use crate::HoopsError;

    if x.is_empty() {
        return Err(HoopsError::Training("no training rows".to_string()));
    }
    if x.len() != y.len() {
        return Err(HoopsError::Training(format!(
            "{} rows but {} targets",
            x.len(),
            y.len()
        )));
    }
    let dim = x[0].len();
    if dim == 0 || x.iter().any(|row| row.len() != dim) {
        return Err(HoopsError::Training("ragged feature rows".to_string()));
    }
    if x.iter().flatten().chain(y).any(|v| !v.is_finite()) {
        return Err(HoopsError::Training("non-finite training value".to_string()));
    }
    Ok(dim)
}
