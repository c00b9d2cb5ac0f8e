//! Weighted Levenberg–Marquardt least squares.
//!
//! Minimises `χ² = Σ ((z − f(x, y; p)) / σ)²` for an `N`-parameter model of two
//! independent variables. The normal equations are solved with an LU decomposition
//! and the parameter covariance is reported with the relative-σ convention, i.e.
//! scaled by the reduced χ².

use log::debug;
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::core::{CompletenessError, CompletenessResult};

/// A model that can be fitted by [`fit_weighted`].
pub trait LeastSquaresModel<const N: usize> {
    /// Model value at `(x, y)`.
    fn evaluate(&self, x: f64, y: f64, params: &[f64; N]) -> f64;

    /// Partial derivatives of the model with respect to each parameter at `(x, y)`.
    fn jacobian_row(&self, x: f64, y: f64, params: &[f64; N]) -> [f64; N];
}

/// Observations with per-point uncertainties.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WeightedData {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub z: Vec<f64>,
    pub sigma: Vec<f64>,
}

impl WeightedData {
    pub fn with_capacity(n: usize) -> Self {
        Self {
            x: Vec::with_capacity(n),
            y: Vec::with_capacity(n),
            z: Vec::with_capacity(n),
            sigma: Vec::with_capacity(n),
        }
    }

    pub fn push(&mut self, x: f64, y: f64, z: f64, sigma: f64) {
        self.x.push(x);
        self.y.push(y);
        self.z.push(z);
        self.sigma.push(sigma);
    }

    pub fn len(&self) -> usize {
        self.z.len()
    }

    pub fn is_empty(&self) -> bool {
        self.z.is_empty()
    }

    fn points(&self) -> impl Iterator<Item = (f64, f64, f64, f64)> + '_ {
        self.x
            .iter()
            .zip(&self.y)
            .zip(&self.z)
            .zip(&self.sigma)
            .map(|(((&x, &y), &z), &s)| (x, y, z, s))
    }
}

/// Configuration for Levenberg–Marquardt optimisation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LMConfig {
    /// Iteration budget; running out is reported as non-convergence.
    pub max_iterations: usize,
    /// Relative χ² reduction below which an accepted step counts as converged.
    pub ftol: f64,
    /// Relative step size below which the fit counts as converged.
    pub xtol: f64,
    pub initial_lambda: f64,
    /// Factor to increase lambda on a rejected step.
    pub lambda_up: f64,
    /// Factor to decrease lambda on an accepted step.
    pub lambda_down: f64,
    /// Damping above this value means no downhill step exists.
    pub max_lambda: f64,
}

impl Default for LMConfig {
    fn default() -> Self {
        Self {
            max_iterations: 500,
            ftol: 1.49012e-8,
            xtol: 1.49012e-8,
            initial_lambda: 1e-3,
            lambda_up: 10.0,
            lambda_down: 0.1,
            max_lambda: 1e16,
        }
    }
}

/// Result of a converged fit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LMResult<const N: usize> {
    pub params: [f64; N],
    pub chi2: f64,
    pub iterations: usize,
    /// One-sigma parameter errors; NaN when the covariance is undefined.
    pub errors: [f64; N],
    /// Number of data points used.
    pub n_points: usize,
}

impl<const N: usize> LMResult<N> {
    /// χ² per degree of freedom, NaN when there are no spare degrees of freedom.
    pub fn reduced_chi2(&self) -> f64 {
        if self.n_points > N {
            self.chi2 / (self.n_points - N) as f64
        } else {
            f64::NAN
        }
    }
}

fn chi2<const N: usize, M: LeastSquaresModel<N>>(
    model: &M,
    data: &WeightedData,
    params: &[f64; N],
) -> f64 {
    data.points()
        .map(|(x, y, z, s)| {
            let r = (z - model.evaluate(x, y, params)) / s;
            r * r
        })
        .sum()
}

/// Weighted `JᵀJ` and `Jᵀr` at `params`.
fn normal_equations<const N: usize, M: LeastSquaresModel<N>>(
    model: &M,
    data: &WeightedData,
    params: &[f64; N],
) -> (DMatrix<f64>, DVector<f64>) {
    let mut hessian = DMatrix::<f64>::zeros(N, N);
    let mut gradient = DVector::<f64>::zeros(N);

    for (x, y, z, s) in data.points() {
        let row = model.jacobian_row(x, y, params);
        let r = (z - model.evaluate(x, y, params)) / s;
        for i in 0..N {
            let ji = row[i] / s;
            gradient[i] += ji * r;
            for j in i..N {
                hessian[(i, j)] += ji * row[j] / s;
            }
        }
    }
    for i in 0..N {
        for j in 0..i {
            hessian[(i, j)] = hessian[(j, i)];
        }
    }

    (hessian, gradient)
}

fn parameter_errors<const N: usize>(hessian: DMatrix<f64>, reduced_chi2: f64) -> [f64; N] {
    let mut errors = [f64::NAN; N];
    if !reduced_chi2.is_finite() {
        return errors;
    }
    if let Some(covariance) = hessian.try_inverse() {
        for (i, e) in errors.iter_mut().enumerate() {
            let var = covariance[(i, i)] * reduced_chi2;
            if var.is_finite() && var >= 0.0 {
                *e = var.sqrt();
            }
        }
    }
    errors
}

/// Fit `model` to `data` starting from `initial`.
///
/// Errors with [`CompletenessError::InsufficientData`] when there are fewer points than
/// parameters, and with [`CompletenessError::FitDidNotConverge`] when the iteration
/// budget runs out or the damping grows past `max_lambda` without meeting the
/// step-size test.
pub fn fit_weighted<const N: usize, M: LeastSquaresModel<N>>(
    model: &M,
    data: &WeightedData,
    initial: [f64; N],
    config: &LMConfig,
) -> CompletenessResult<LMResult<N>> {
    if data.len() < N {
        return Err(CompletenessError::InsufficientData(format!(
            "{} data points for {} parameters",
            data.len(),
            N
        )));
    }

    let mut params = initial;
    let mut lambda = config.initial_lambda;
    let mut current = chi2(model, data, &params);
    if !current.is_finite() {
        return Err(CompletenessError::FitDidNotConverge(
            "initial guess gives a non-finite chi-square".to_string(),
        ));
    }

    for iteration in 1..=config.max_iterations {
        let (hessian, gradient) = normal_equations(model, data, &params);

        let mut damped = hessian.clone();
        for i in 0..N {
            damped[(i, i)] += lambda * hessian[(i, i)].max(1e-12);
        }

        let step = damped
            .lu()
            .solve(&gradient)
            .filter(|d| d.iter().all(|v| v.is_finite()));

        let Some(delta) = step else {
            lambda *= config.lambda_up;
            if lambda > config.max_lambda {
                return Err(CompletenessError::FitDidNotConverge(format!(
                    "singular normal equations after {} iterations",
                    iteration
                )));
            }
            continue;
        };

        let mut trial = params;
        for (p, d) in trial.iter_mut().zip(delta.iter()) {
            *p += d;
        }
        let small_step = delta
            .iter()
            .zip(params.iter())
            .all(|(d, p)| d.abs() <= config.xtol * (p.abs() + config.xtol));

        let trial_chi2 = chi2(model, data, &trial);
        debug!(
            "LM iteration {}: chi2 {:.6e} -> {:.6e}, lambda {:.1e}",
            iteration, current, trial_chi2, lambda
        );

        if trial_chi2.is_finite() && trial_chi2 < current {
            let reduction = current - trial_chi2;
            let previous = current;
            params = trial;
            current = trial_chi2;
            lambda = (lambda * config.lambda_down).max(1e-15);

            if reduction <= config.ftol * previous || small_step || current <= 1e-300 {
                return Ok(finish(model, data, params, current, iteration));
            }
        } else {
            lambda *= config.lambda_up;
            if small_step {
                return Ok(finish(model, data, params, current, iteration));
            }
            if lambda > config.max_lambda {
                return Err(CompletenessError::FitDidNotConverge(format!(
                    "no downhill step found after {} iterations (chi2 {:.6e})",
                    iteration, current
                )));
            }
        }
    }

    Err(CompletenessError::FitDidNotConverge(format!(
        "iteration budget of {} exhausted (chi2 {:.6e})",
        config.max_iterations, current
    )))
}

fn finish<const N: usize, M: LeastSquaresModel<N>>(
    model: &M,
    data: &WeightedData,
    params: [f64; N],
    chi2: f64,
    iterations: usize,
) -> LMResult<N> {
    let (hessian, _) = normal_equations(model, data, &params);
    let mut result = LMResult {
        params,
        chi2,
        iterations,
        errors: [f64::NAN; N],
        n_points: data.len(),
    };
    result.errors = parameter_errors(hessian, result.reduced_chi2());
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// `z = a · exp(b · x) + c · y`
    struct ExpPlane;

    impl LeastSquaresModel<3> for ExpPlane {
        fn evaluate(&self, x: f64, y: f64, p: &[f64; 3]) -> f64 {
            p[0] * (p[1] * x).exp() + p[2] * y
        }

        fn jacobian_row(&self, x: f64, y: f64, p: &[f64; 3]) -> [f64; 3] {
            let e = (p[1] * x).exp();
            [e, p[0] * x * e, y]
        }
    }

    fn synthetic(truth: [f64; 3], noise: f64) -> WeightedData {
        let mut data = WeightedData::with_capacity(60);
        for i in 0..60 {
            let x = i as f64 / 20.0;
            let y = (i % 7) as f64;
            // deterministic zig-zag noise
            let wiggle = if i % 2 == 0 { noise } else { -noise };
            data.push(x, y, ExpPlane.evaluate(x, y, &truth) + wiggle, 0.1);
        }
        data
    }

    #[test]
    fn test_recovers_known_parameters() {
        let truth = [2.0, -0.7, 0.3];
        let data = synthetic(truth, 0.0);
        let result = fit_weighted(&ExpPlane, &data, [1.0, 0.0, 0.0], &LMConfig::default()).unwrap();

        for (fit, expected) in result.params.iter().zip(truth) {
            assert_relative_eq!(*fit, expected, epsilon = 1e-6);
        }
        assert!(result.chi2 < 1e-10);
        assert!(result.iterations < 100);
    }

    #[test]
    fn test_errors_are_finite_with_noise() {
        let data = synthetic([2.0, -0.7, 0.3], 0.01);
        let result = fit_weighted(&ExpPlane, &data, [1.0, 0.0, 0.0], &LMConfig::default()).unwrap();
        assert!(result.errors.iter().all(|e| e.is_finite() && *e > 0.0));
        assert!(result.reduced_chi2() > 0.0);
    }

    #[test]
    fn test_insufficient_data() {
        let mut data = WeightedData::default();
        data.push(0.0, 0.0, 1.0, 1.0);
        data.push(1.0, 0.0, 1.0, 1.0);
        let err = fit_weighted(&ExpPlane, &data, [1.0, 0.0, 0.0], &LMConfig::default()).unwrap_err();
        assert!(matches!(err, CompletenessError::InsufficientData(_)));
    }

    #[test]
    fn test_iteration_budget_is_reported() {
        let data = synthetic([2.0, -0.7, 0.3], 0.0);
        let config = LMConfig {
            max_iterations: 1,
            ..Default::default()
        };
        let err = fit_weighted(&ExpPlane, &data, [10.0, 3.0, -5.0], &config).unwrap_err();
        assert!(matches!(err, CompletenessError::FitDidNotConverge(_)));
    }

    #[test]
    fn test_exactly_determined_has_nan_errors() {
        let mut data = WeightedData::default();
        for (x, y) in [(0.0, 1.0), (1.0, 2.0), (2.0, 0.0)] {
            data.push(x, y, ExpPlane.evaluate(x, y, &[1.0, 0.5, 0.2]), 1.0);
        }
        let result = fit_weighted(&ExpPlane, &data, [1.2, 0.4, 0.0], &LMConfig::default()).unwrap();
        assert!(result.reduced_chi2().is_nan());
        assert!(result.errors.iter().all(|e| e.is_nan()));
    }
}
