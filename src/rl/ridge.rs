//! Ridge regression with an unpenalised intercept.
//!
//! Columns and targets are centred, the normal equations
//! `(XᵀX + αI) β = Xᵀy` are solved by Cholesky (LU if that fails), and the
//! intercept is recovered from the means.

use nalgebra::{DMatrix, DVector};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum RidgeError {
    #[error("no samples")]
    Empty,

    #[error("sample {row} has {found} features, expected {expected}")]
    DimensionMismatch { row: usize, expected: usize, found: usize },

    #[error("non-finite value in features or targets")]
    NonFinite,

    #[error("normal equations are singular")]
    Singular,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RidgeFit {
    pub coef: Vec<f64>,
    pub intercept: f64,
}

impl RidgeFit {
    pub fn predict(&self, x: &[f64]) -> f64 {
        super::basis::dot(&self.coef, x) + self.intercept
    }
}

pub fn fit_ridge(x: &[Vec<f64>], y: &[f64], alpha: f64) -> Result<RidgeFit, RidgeError> {
    let n = x.len();
    if n == 0 || y.len() != n {
        return Err(RidgeError::Empty);
    }
    let p = x[0].len();
    for (row, features) in x.iter().enumerate() {
        if features.len() != p {
            return Err(RidgeError::DimensionMismatch {
                row,
                expected: p,
                found: features.len(),
            });
        }
    }
    if x.iter().flatten().chain(y).any(|v| !v.is_finite()) {
        return Err(RidgeError::NonFinite);
    }

    let mut xm = DMatrix::from_fn(n, p, |i, j| x[i][j]);
    let x_mean: Vec<f64> = (0..p).map(|j| xm.column(j).mean()).collect();
    for (j, mean) in x_mean.iter().enumerate() {
        xm.column_mut(j).add_scalar_mut(-mean);
    }
    let y_mean = y.iter().sum::<f64>() / n as f64;
    let yv = DVector::from_iterator(n, y.iter().map(|v| v - y_mean));

    let xt = xm.transpose();
    let mut gram = &xt * &xm;
    for i in 0..p {
        gram[(i, i)] += alpha;
    }
    let rhs = &xt * yv;

    let beta = match gram.clone().cholesky() {
        Some(chol) => chol.solve(&rhs),
        None => gram.lu().solve(&rhs).ok_or(RidgeError::Singular)?,
    };
    if beta.iter().any(|v| !v.is_finite()) {
        return Err(RidgeError::Singular);
    }

    let coef: Vec<f64> = beta.iter().copied().collect();
    let intercept = y_mean - super::basis::dot(&coef, &x_mean);
    Ok(RidgeFit { coef, intercept })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recovers_linear_relation() {
        let x: Vec<Vec<f64>> = (0..20)
            .map(|i| vec![i as f64, ((i * 7) % 5) as f64])
            .collect();
        let y: Vec<f64> = x.iter().map(|r| 3.0 * r[0] - 2.0 * r[1] + 1.0).collect();
        let fit = fit_ridge(&x, &y, 1e-9).unwrap();
        assert!((fit.coef[0] - 3.0).abs() < 1e-6);
        assert!((fit.coef[1] + 2.0).abs() < 1e-6);
        assert!((fit.intercept - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_penalty_handles_collinear_columns() {
        let x: Vec<Vec<f64>> = (0..5).map(|i| vec![i as f64, 2.0 * i as f64]).collect();
        let y: Vec<f64> = (0..5).map(|i| i as f64).collect();
        let fit = fit_ridge(&x, &y, 0.01).unwrap();
        assert!(fit.coef.iter().all(|c| c.is_finite()));
        assert!((fit.predict(&[2.0, 4.0]) - 2.0).abs() < 1e-2);
    }

    #[test]
    fn test_rejects_non_finite() {
        let x = vec![vec![1.0], vec![f64::NAN]];
        assert_eq!(fit_ridge(&x, &[1.0, 2.0], 0.01), Err(RidgeError::NonFinite));
    }

    #[test]
    fn test_rejects_ragged_rows() {
        let x = vec![vec![1.0, 2.0], vec![1.0]];
        assert!(matches!(
            fit_ridge(&x, &[1.0, 2.0], 0.01),
            Err(RidgeError::DimensionMismatch { row: 1, .. })
        ));
    }
}
