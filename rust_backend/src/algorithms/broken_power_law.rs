//! Clamped two-dimensional broken power law.
//!
//! ```text
//! u(P, R) = a · (P / b)^(c if P < b else d) · (R / e)^(f if R < e else g)
//! f(P, R) = clamp(u, 0.2, 1.0)
//! ```
//!
//! The clamp is part of the model: inside clamped regions every partial derivative
//! is zero, so the optimiser gets no pull from those points.

use super::optimization::LeastSquaresModel;

/// Lower clamp of the vetting surface.
pub const VETTING_FLOOR: f64 = 0.2;
/// Upper clamp of the vetting surface.
pub const VETTING_CEILING: f64 = 1.0;
/// Number of model parameters.
pub const N_PARAMS: usize = 7;

fn unclamped(period: f64, radius: f64, p: &[f64; N_PARAMS]) -> (f64, f64, f64) {
    let [a, b, c, d, e, f, g] = *p;
    let period_slope = if period < b { c } else { d };
    let radius_slope = if radius < e { f } else { g };
    let u = a * (period / b).powf(period_slope) * (radius / e).powf(radius_slope);
    (u, period_slope, radius_slope)
}

/// Evaluate the clamped surface.
///
/// Parameters are `[amplitude, period pivot, period slope below, period slope above,
/// radius pivot, radius slope below, radius slope above]`. A NaN raw value (for
/// example from a negative pivot) is returned as NaN rather than clamped.
///
/// # Examples
///
/// ```
/// use kepler_completeness::algorithms::broken_power_law::broken_power_law_2d;
///
/// let flat = [0.5, 100.0, 0.0, 0.0, 5.0, 0.0, 0.0];
/// assert_eq!(broken_power_law_2d(10.0, 2.0, &flat), 0.5);
///
/// let steep = [0.9, 100.0, 0.0, -3.0, 5.0, 0.0, 0.0];
/// assert_eq!(broken_power_law_2d(700.0, 2.0, &steep), 0.2);
/// ```
pub fn broken_power_law_2d(period: f64, radius: f64, params: &[f64; N_PARAMS]) -> f64 {
    let (u, _, _) = unclamped(period, radius, params);
    if u.is_nan() {
        return f64::NAN;
    }
    u.clamp(VETTING_FLOOR, VETTING_CEILING)
}

/// The broken power law as a least-squares model.
#[derive(Debug, Clone, Copy, Default)]
pub struct BrokenPowerLaw2d;

impl LeastSquaresModel<N_PARAMS> for BrokenPowerLaw2d {
    fn evaluate(&self, x: f64, y: f64, params: &[f64; N_PARAMS]) -> f64 {
        broken_power_law_2d(x, y, params)
    }

    fn jacobian_row(&self, x: f64, y: f64, params: &[f64; N_PARAMS]) -> [f64; N_PARAMS] {
        let (u, sx, sy) = unclamped(x, y, params);
        if !(u > VETTING_FLOOR && u < VETTING_CEILING) {
            return [0.0; N_PARAMS];
        }

        let [a, b, _, _, e, _, _] = *params;
        let log_p = (x / b).ln();
        let log_r = (y / e).ln();
        let below_p = x < b;
        let below_r = y < e;

        [
            u / a,
            -sx / b * u,
            if below_p { u * log_p } else { 0.0 },
            if below_p { 0.0 } else { u * log_p },
            -sy / e * u,
            if below_r { u * log_r } else { 0.0 },
            if below_r { 0.0 } else { u * log_r },
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    const TYPICAL: [f64; N_PARAMS] = [0.9, 100.0, 0.0, -0.2, 5.7, 0.1, -2.7];

    #[test]
    fn test_value_at_pivots_is_amplitude() {
        let p = [0.6, 50.0, 0.3, -0.3, 4.0, 0.2, -1.0];
        assert_relative_eq!(broken_power_law_2d(50.0, 4.0, &p), 0.6, epsilon = 1e-12);
    }

    #[test]
    fn test_slopes_switch_at_pivot() {
        let p = [0.5, 10.0, 0.0, -1.0, 1.0, 0.0, 0.0];
        assert_relative_eq!(broken_power_law_2d(5.0, 1.0, &p), 0.5, epsilon = 1e-12);
        // above the pivot the slope -1 halves the value at twice the period
        assert_relative_eq!(broken_power_law_2d(20.0, 1.0, &p), 0.25, epsilon = 1e-12);
    }

    #[test]
    fn test_clamped_points_have_zero_gradient() {
        let saturated = [5.0, 100.0, 0.0, 0.0, 5.0, 0.0, 0.0];
        assert_eq!(BrokenPowerLaw2d.evaluate(3.0, 2.0, &saturated), 1.0);
        assert_eq!(BrokenPowerLaw2d.jacobian_row(3.0, 2.0, &saturated), [0.0; N_PARAMS]);
    }

    #[test]
    fn test_jacobian_matches_finite_differences() {
        let p = [0.6, 50.0, 0.3, -0.3, 4.0, 0.2, -1.0];
        for (x, y) in [(10.0, 2.0), (200.0, 5.0), (30.0, 6.0)] {
            let row = BrokenPowerLaw2d.jacobian_row(x, y, &p);
            for k in 0..N_PARAMS {
                let h = 1e-6 * p[k].abs().max(1.0);
                let mut up = p;
                let mut down = p;
                up[k] += h;
                down[k] -= h;
                let numeric = (broken_power_law_2d(x, y, &up) - broken_power_law_2d(x, y, &down)) / (2.0 * h);
                assert_relative_eq!(row[k], numeric, epsilon = 1e-6);
            }
        }
    }

    proptest! {
        #[test]
        fn prop_model_stays_in_clamp_range(
            period in 1e-3f64..1e5,
            radius in 1e-2f64..1e3,
            amplitude in 1e-3f64..10.0,
            c in -5.0f64..5.0,
            d in -5.0f64..5.0,
        ) {
            let params = [amplitude, TYPICAL[1], c, d, TYPICAL[4], TYPICAL[5], TYPICAL[6]];
            let v = broken_power_law_2d(period, radius, &params);
            prop_assert!((VETTING_FLOOR..=VETTING_CEILING).contains(&v));
        }
    }
}
