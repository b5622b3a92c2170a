//! Ridge regression
//!
//! Closed-form L2-penalised least squares with an unpenalised intercept:
//! features and target are centred, then (XᵀX + αI)w = Xᵀy is solved by
//! Cholesky factorisation.

use crate::model::{check_training_data, Regressor};
use crate::{HoopsError, Result, RidgeConfig};
use nalgebra::{DMatrix, DVector};

#[derive(Debug, Clone)]
pub struct RidgeRegression {
    coefficients: Vec<f64>,
    intercept: f64,
}

impl RidgeRegression {
    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }
}

impl Regressor for RidgeRegression {
    type Params = RidgeConfig;

    const NAME: &'static str = "Ridge Regression NBA";

    fn fit(x: &[Vec<f64>], y: &[f64], params: &RidgeConfig) -> Result<Self> {
        let dim = check_training_data(x, y)?;
        let n = x.len() as f64;

        let x_mean: Vec<f64> = (0..dim)
            .map(|j| x.iter().map(|row| row[j]).sum::<f64>() / n)
            .collect();
        let y_mean = y.iter().sum::<f64>() / n;

        // Normal equations on centred data
        let mut gram = DMatrix::<f64>::zeros(dim, dim);
        let mut rhs = DVector::<f64>::zeros(dim);
        for (row, &target) in x.iter().zip(y) {
            let centred = DVector::from_iterator(dim, row.iter().zip(&x_mean).map(|(v, m)| v - m));
            gram.ger(1.0, &centred, &centred, 1.0);
            rhs.axpy(target - y_mean, &centred, 1.0);
        }
        for a in 0..dim {
            gram[(a, a)] += params.alpha;
        }

        let singular = || HoopsError::Training("singular system in ridge fit".to_string());
        let solution = gram.cholesky().ok_or_else(singular)?.solve(&rhs);
        if solution.iter().any(|w| !w.is_finite()) {
            return Err(singular());
        }

        let coefficients: Vec<f64> = solution.iter().copied().collect();
        let intercept = y_mean
            - coefficients
                .iter()
                .zip(&x_mean)
                .map(|(w, m)| w * m)
                .sum::<f64>();

        Ok(RidgeRegression {
            coefficients,
            intercept,
        })
    }

    fn predict(&self, row: &[f64]) -> f64 {
        self.intercept
            + self
                .coefficients
                .iter()
                .zip(row)
                .map(|(w, v)| w * v)
                .sum::<f64>()
    }
}
