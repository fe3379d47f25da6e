//! Ordinary least squares for a single explanatory variable.
//!
//! The fit solves the normal equations `β = (XᵗX)⁻¹ Xᵗy` on a design matrix
//! with a constant column, inverting `XᵗX` by Gauss-Jordan elimination.

use ndarray::{concatenate, Array1, Array2, Axis};
use statrs::statistics::Statistics;

use crate::error::{Error, Result};

/// Fitted line `y = intercept + slope * x`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegressionResult {
    pub intercept: f64,
    pub slope: f64,
}

impl RegressionResult {
    pub fn evaluate_at(&self, x: f64) -> f64 {
        self.intercept + self.slope * x
    }

    /// Coefficient of determination over `samples`, `None` when `y` is constant.
    pub fn r_squared(&self, samples: &[(f64, f64)]) -> Option<f64> {
        if samples.is_empty() {
            return None;
        }
        let y_mean = samples.iter().map(|&(_, y)| y).mean();
        let ss_tot: f64 = samples.iter().map(|&(_, y)| (y - y_mean).powi(2)).sum();
        if ss_tot == 0.0 {
            return None;
        }
        let ss_res: f64 = samples
            .iter()
            .map(|&(x, y)| (y - self.evaluate_at(x)).powi(2))
            .sum();
        Some(1.0 - ss_res / ss_tot)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RegressionEngine;

impl RegressionEngine {
    pub fn new() -> Self {
        Self
    }

    /// Least-squares line through `samples`.
    ///
    /// Fails with [`Error::SingularMatrix`] when fewer than two distinct x
    /// values are present.
    pub fn fit(&self, samples: &[(f64, f64)]) -> Result<RegressionResult> {
        check_finite(samples)?;
        if !has_distinct_x(samples) {
            return Err(Error::SingularMatrix);
        }

        // Centring keeps XᵗX well conditioned when x sits far from zero.
        let n = samples.len();
        let x_mean = samples.iter().map(|&(x, _)| x).sum::<f64>() / n as f64;
        let x = Array2::from_shape_vec(
            (n, 1),
            samples.iter().map(|&(x, _)| x - x_mean).collect(),
        )
        .map_err(|_| Error::SingularMatrix)?;
        let y = Array1::from_iter(samples.iter().map(|&(_, y)| y));

        let ones = Array2::<f64>::ones((n, 1));
        let design = concatenate(Axis(1), &[ones.view(), x.view()])
            .map_err(|_| Error::SingularMatrix)?;

        let xt = design.t();
        let xtx = xt.dot(&design);
        let xty = xt.dot(&y);

        let beta = invert(&xtx)?.dot(&xty);
        let slope = beta[1];
        Ok(RegressionResult {
            intercept: beta[0] - slope * x_mean,
            slope,
        })
    }

    /// Analytic two-variable solution: slope = cov(x, y) / var(x).
    pub fn fit_closed_form(&self, samples: &[(f64, f64)]) -> Result<RegressionResult> {
        check_finite(samples)?;
        if !has_distinct_x(samples) {
            return Err(Error::SingularMatrix);
        }

        let xs: Vec<f64> = samples.iter().map(|&(x, _)| x).collect();
        let ys: Vec<f64> = samples.iter().map(|&(_, y)| y).collect();

        let variance = xs.iter().variance();
        if variance == 0.0 || !variance.is_finite() {
            return Err(Error::SingularMatrix);
        }
        let slope = xs.iter().covariance(ys.iter()) / variance;
        let intercept = ys.iter().mean() - slope * xs.iter().mean();
        Ok(RegressionResult { intercept, slope })
    }
}

fn check_finite(samples: &[(f64, f64)]) -> Result<()> {
    match samples
        .iter()
        .find(|(x, y)| !x.is_finite() || !y.is_finite())
    {
        Some(&(x, y)) => Err(Error::NonFiniteSample { x, y }),
        None => Ok(()),
    }
}

fn has_distinct_x(samples: &[(f64, f64)]) -> bool {
    match samples.first() {
        Some(&(first, _)) => samples.iter().any(|&(x, _)| x != first),
        None => false,
    }
}

/// Gauss-Jordan inverse with partial pivoting. Only an exactly zero (or
/// non-finite) pivot is treated as singular.
fn invert(a: &Array2<f64>) -> Result<Array2<f64>> {
    let n = a.nrows();
    let mut work = a.clone();
    let mut inverse = Array2::<f64>::eye(n);

    for col in 0..n {
        let pivot_row = (col..n)
            .max_by(|&i, &j| work[[i, col]].abs().total_cmp(&work[[j, col]].abs()))
            .ok_or(Error::SingularMatrix)?;
        let pivot = work[[pivot_row, col]];
        if pivot == 0.0 || !pivot.is_finite() {
            return Err(Error::SingularMatrix);
        }

        if pivot_row != col {
            for k in 0..n {
                work.swap([pivot_row, k], [col, k]);
                inverse.swap([pivot_row, k], [col, k]);
            }
        }

        for k in 0..n {
            work[[col, k]] /= pivot;
            inverse[[col, k]] /= pivot;
        }

        for row in 0..n {
            if row == col {
                continue;
            }
            let factor = work[[row, col]];
            if factor == 0.0 {
                continue;
            }
            for k in 0..n {
                let (w, inv) = (work[[col, k]], inverse[[col, k]]);
                work[[row, k]] -= factor * w;
                inverse[[row, k]] -= factor * inv;
            }
        }
    }

    Ok(inverse)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_fit_exact_line() {
        let engine = RegressionEngine::new();
        let fit = engine.fit(&[(1.0, 2.0), (2.0, 4.0), (3.0, 6.0)]).unwrap();

        assert!(fit.intercept.abs() < 1e-9);
        assert!((fit.slope - 2.0).abs() < 1e-9);
        assert!((fit.evaluate_at(10.0) - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_identical_x_is_singular() {
        let engine = RegressionEngine::new();
        assert!(matches!(
            engine.fit(&[(5.0, 1.0), (5.0, 2.0)]),
            Err(Error::SingularMatrix)
        ));
        assert!(matches!(
            engine.fit_closed_form(&[(5.0, 1.0), (5.0, 2.0)]),
            Err(Error::SingularMatrix)
        ));
    }

    #[test]
    fn test_too_few_samples_is_singular() {
        let engine = RegressionEngine::new();
        assert!(matches!(engine.fit(&[(1.0, 3.0)]), Err(Error::SingularMatrix)));
        assert!(matches!(engine.fit(&[(0.1, 3.0)]), Err(Error::SingularMatrix)));
        assert!(matches!(engine.fit(&[]), Err(Error::SingularMatrix)));
    }

    #[test]
    fn test_non_finite_samples_rejected() {
        let engine = RegressionEngine::new();
        assert!(matches!(
            engine.fit(&[(1.0, 2.0), (f64::NAN, 4.0)]),
            Err(Error::NonFiniteSample { .. })
        ));
    }

    #[test]
    fn test_matrix_solution_matches_closed_form() {
        // GDP per capita (thousands of USD) against share of population diagnosed
        let samples = vec![
            (0.52, 0.000_012),
            (1.94, 0.000_031),
            (8.3, 0.000_210),
            (15.7, 0.000_180),
            (42.1, 0.001_400),
            (58.9, 0.002_100),
            (101.0, 0.000_950),
        ];
        let engine = RegressionEngine::new();
        let matrix = engine.fit(&samples).unwrap();
        let analytic = engine.fit_closed_form(&samples).unwrap();

        assert_relative_eq!(matrix.slope, analytic.slope, max_relative = 1e-9);
        assert_relative_eq!(matrix.intercept, analytic.intercept, max_relative = 1e-9);
    }

    #[test]
    fn test_offset_x_is_not_singular() {
        let engine = RegressionEngine::new();
        for offset in [1e4, 1e6, 1e8] {
            let samples: Vec<(f64, f64)> = (0..5)
                .map(|i| (offset + i as f64, 2.0 * i as f64 + 1.0))
                .collect();
            let matrix = engine.fit(&samples).unwrap();
            let analytic = engine.fit_closed_form(&samples).unwrap();

            assert_relative_eq!(matrix.slope, 2.0, max_relative = 1e-9);
            assert_relative_eq!(matrix.slope, analytic.slope, max_relative = 1e-9);
            assert_relative_eq!(matrix.intercept, analytic.intercept, max_relative = 1e-9);
            assert_relative_eq!(matrix.intercept, 1.0 - 2.0 * offset, max_relative = 1e-9);
        }
    }

    #[test]
    fn test_tiny_x_spread_is_not_singular() {
        let samples = [(0.0, 0.0), (1e-8, 1.0), (2e-8, 2.0)];
        let fit = RegressionEngine::new().fit(&samples).unwrap();

        assert_relative_eq!(fit.slope, 1e8, max_relative = 1e-6);
        assert!(fit.intercept.abs() < 1e-6);
    }

    #[test]
    fn test_noisy_fit_and_r_squared() {
        let samples = vec![(0.0, 1.1), (1.0, 2.9), (2.0, 5.2), (3.0, 6.8), (4.0, 9.1)];
        let fit = RegressionEngine::new().fit(&samples).unwrap();

        assert_relative_eq!(fit.slope, 1.99, epsilon = 1e-9);
        assert_relative_eq!(fit.intercept, 1.04, epsilon = 1e-9);
        let r2 = fit.r_squared(&samples).unwrap();
        assert!(r2 > 0.99 && r2 <= 1.0);

        assert_eq!(fit.r_squared(&[(1.0, 3.0), (2.0, 3.0)]), None);
    }
}
