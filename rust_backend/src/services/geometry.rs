//! Geometric transit probability for circular orbits.

use std::f64::consts::PI;

use ndarray::Array2;
use qtty::{Days, Second};

use crate::core::{PeriodRadiusGrid, PhysicalConstants};

/// Probability that a circular orbit of the given period transits, `R★ / a`.
///
/// `a` follows from Kepler's third law, so
/// `fgeo = R★ · (4π² / (G · M★))^(1/3) · P^(−2/3)` in SI units.
///
/// # Examples
///
/// ```
/// use kepler_completeness::core::PhysicalConstants;
/// use kepler_completeness::services::transit_probability;
///
/// let earth = transit_probability(365.25, 1.0, 1.0, &PhysicalConstants::default());
/// assert!((earth - 4.65e-3).abs() < 1e-5);
/// ```
pub fn transit_probability(
    period_days: f64,
    stellar_mass_msun: f64,
    stellar_radius_rsun: f64,
    constants: &PhysicalConstants,
) -> f64 {
    let period_s = Days::new(period_days).to::<Second>().value();
    let radius_m = stellar_radius_rsun * constants.solar_radius_m();
    let mass_kg = stellar_mass_msun * constants.solar_mass_kg();

    let kepler = (4.0 * PI * PI / (constants.gravitational_constant * mass_kg)).cbrt();
    radius_m * kepler * period_s.powf(-2.0 / 3.0)
}

/// Transit probability on the grid nodes, constant along the radius axis.
pub fn geometric_probability_map(
    grid: &PeriodRadiusGrid,
    stellar_mass_msun: f64,
    stellar_radius_rsun: f64,
    constants: &PhysicalConstants,
) -> Array2<f64> {
    let by_period: Vec<f64> = grid
        .periods()
        .iter()
        .map(|&p| transit_probability(p, stellar_mass_msun, stellar_radius_rsun, constants))
        .collect();
    Array2::from_shape_fn(grid.shape(), |(i, _)| by_period[i])
}
