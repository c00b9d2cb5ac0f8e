//! The fixed period–radius evaluation grid.
//!
//! Every map produced by the pipeline is indexed by the nodes of this grid, and the
//! vetting histograms use the same nodes as bin edges. All components must share one
//! grid instance so that bin-indexed maps line up.

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use super::error::{CompletenessError, CompletenessResult};

/// Number of period nodes.
pub const N_PERIOD: usize = 21;
/// Number of radius nodes.
pub const N_RADIUS: usize = 25;
/// Period bounds in days.
pub const PERIOD_BOUNDS_DAYS: (f64, f64) = (0.5, 730.0);
/// Planet radius bounds in Earth radii.
pub const RADIUS_BOUNDS_EARTH: (f64, f64) = (0.3, 20.0);

/// Returns `n` points spaced evenly in log space between `start` and `stop`.
///
/// Both endpoints are pinned to the exact input values.
///
/// # Examples
///
/// ```
/// use kepler_completeness::core::grid::geomspace;
///
/// let pts = geomspace(1.0, 1000.0, 4);
/// assert_eq!(pts[0], 1.0);
/// assert_eq!(pts[3], 1000.0);
/// assert!((pts[1] - 10.0).abs() < 1e-12);
/// ```
pub fn geomspace(start: f64, stop: f64, n: usize) -> Array1<f64> {
    if n == 0 {
        return Array1::zeros(0);
    }
    if n == 1 {
        return Array1::from_elem(1, start);
    }

    let log_start = start.ln();
    let step = (stop.ln() - log_start) / (n - 1) as f64;
    let mut points = Array1::from_shape_fn(n, |i| (log_start + step * i as f64).exp());
    points[0] = start;
    points[n - 1] = stop;
    points
}

fn geometric_centers(edges: &Array1<f64>) -> Array1<f64> {
    edges
        .windows(2)
        .into_iter()
        .map(|w| (w[0] * w[1]).sqrt())
        .collect()
}

/// Geometrically spaced period (days) and planet-radius (Earth radii) nodes.
///
/// The nodes double as histogram bin edges, so a grid with `nP × nR` nodes has
/// `(nP − 1) × (nR − 1)` cells whose centers are the geometric means of adjacent edges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodRadiusGrid {
    periods: Array1<f64>,
    radii: Array1<f64>,
}

impl Default for PeriodRadiusGrid {
    fn default() -> Self {
        Self::new()
    }
}

impl PeriodRadiusGrid {
    /// The standard 21 × 25 grid over [0.5, 730] d and [0.3, 20] R⊕.
    ///
    /// # Examples
    ///
    /// ```
    /// use kepler_completeness::core::PeriodRadiusGrid;
    ///
    /// let grid = PeriodRadiusGrid::new();
    /// assert_eq!(grid.shape(), (21, 25));
    /// assert_eq!(grid.periods()[0], 0.5);
    /// assert_eq!(grid.radii()[24], 20.0);
    /// ```
    pub fn new() -> Self {
        Self {
            periods: geomspace(PERIOD_BOUNDS_DAYS.0, PERIOD_BOUNDS_DAYS.1, N_PERIOD),
            radii: geomspace(RADIUS_BOUNDS_EARTH.0, RADIUS_BOUNDS_EARTH.1, N_RADIUS),
        }
    }

    /// Builds a custom grid. Bounds must be positive and increasing, with at least two
    /// nodes per axis.
    pub fn with_bounds(
        period_bounds: (f64, f64),
        n_period: usize,
        radius_bounds: (f64, f64),
        n_radius: usize,
    ) -> CompletenessResult<Self> {
        for (name, (low, high), n) in [
            ("period", period_bounds, n_period),
            ("radius", radius_bounds, n_radius),
        ] {
            if !(low > 0.0 && high > low && high.is_finite()) {
                return Err(CompletenessError::Configuration(format!(
                    "{} bounds must satisfy 0 < low < high, got [{}, {}]",
                    name, low, high
                )));
            }
            if n < 2 {
                return Err(CompletenessError::Configuration(format!(
                    "{} axis needs at least 2 nodes, got {}",
                    name, n
                )));
            }
        }

        Ok(Self {
            periods: geomspace(period_bounds.0, period_bounds.1, n_period),
            radii: geomspace(radius_bounds.0, radius_bounds.1, n_radius),
        })
    }

    pub fn periods(&self) -> &Array1<f64> {
        &self.periods
    }

    pub fn radii(&self) -> &Array1<f64> {
        &self.radii
    }

    /// Node counts `(nP, nR)`; the shape of every map on this grid.
    pub fn shape(&self) -> (usize, usize) {
        (self.periods.len(), self.radii.len())
    }

    /// Cell counts `(nP − 1, nR − 1)`; the shape of the vetting histograms.
    pub fn cell_shape(&self) -> (usize, usize) {
        (self.periods.len() - 1, self.radii.len() - 1)
    }

    pub fn period_centers(&self) -> Array1<f64> {
        geometric_centers(&self.periods)
    }

    pub fn radius_centers(&self) -> Array1<f64> {
        geometric_centers(&self.radii)
    }

    pub fn period_bounds(&self) -> (f64, f64) {
        (self.periods[0], self.periods[self.periods.len() - 1])
    }

    pub fn radius_bounds(&self) -> (f64, f64) {
        (self.radii[0], self.radii[self.radii.len() - 1])
    }

    /// Half-open containment test on both axes: `P0 <= P < P_last`, `R0 <= R < R_last`.
    pub fn contains(&self, period: f64, radius: f64) -> bool {
        let (p_low, p_high) = self.period_bounds();
        let (r_low, r_high) = self.radius_bounds();
        (p_low..p_high).contains(&period) && (r_low..r_high).contains(&radius)
    }

    /// Node mesh with `ij` indexing: `(P[i, j], R[i, j]) = (periods[i], radii[j])`.
    pub fn mesh(&self) -> (Array2<f64>, Array2<f64>) {
        let shape = self.shape();
        let periods = Array2::from_shape_fn(shape, |(i, _)| self.periods[i]);
        let radii = Array2::from_shape_fn(shape, |(_, j)| self.radii[j]);
        (periods, radii)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_is_deterministic() {
        let a = PeriodRadiusGrid::new();
        let b = PeriodRadiusGrid::new();
        for (x, y) in a.periods().iter().zip(b.periods().iter()) {
            assert_eq!(x.to_bits(), y.to_bits());
        }
        for (x, y) in a.radii().iter().zip(b.radii().iter()) {
            assert_eq!(x.to_bits(), y.to_bits());
        }
    }

    #[test]
    fn test_grid_bounds_and_monotonicity() {
        let grid = PeriodRadiusGrid::new();
        assert_eq!(grid.periods().len(), N_PERIOD);
        assert_eq!(grid.radii().len(), N_RADIUS);
        assert_eq!(grid.period_bounds(), PERIOD_BOUNDS_DAYS);
        assert_eq!(grid.radius_bounds(), RADIUS_BOUNDS_EARTH);
        assert!(grid.periods().windows(2).into_iter().all(|w| w[1] > w[0]));
        assert!(grid.radii().windows(2).into_iter().all(|w| w[1] > w[0]));
    }

    #[test]
    fn test_constant_log_ratio() {
        let grid = PeriodRadiusGrid::new();
        let p = grid.periods();
        let first = (p[1] / p[0]).ln();
        for i in 1..p.len() {
            assert!(((p[i] / p[i - 1]).ln() - first).abs() < 1e-12);
        }
    }

    #[test]
    fn test_cell_centers_are_geometric_means() {
        let grid = PeriodRadiusGrid::new();
        let centers = grid.radius_centers();
        assert_eq!(centers.len(), N_RADIUS - 1);
        for (i, c) in centers.iter().enumerate() {
            let r = grid.radii();
            assert!((c - (r[i] * r[i + 1]).sqrt()).abs() < 1e-12);
            assert!(*c > r[i] && *c < r[i + 1]);
        }
        assert_eq!(grid.cell_shape(), (N_PERIOD - 1, N_RADIUS - 1));
    }

    #[test]
    fn test_contains_is_half_open() {
        let grid = PeriodRadiusGrid::new();
        assert!(grid.contains(0.5, 0.3));
        assert!(!grid.contains(730.0, 1.0));
        assert!(!grid.contains(10.0, 20.0));
        assert!(!grid.contains(0.49, 1.0));
    }

    #[test]
    fn test_mesh_uses_ij_indexing() {
        let grid = PeriodRadiusGrid::new();
        let (p, r) = grid.mesh();
        assert_eq!(p.dim(), (N_PERIOD, N_RADIUS));
        assert_eq!(p[[3, 7]], grid.periods()[3]);
        assert_eq!(r[[3, 7]], grid.radii()[7]);
    }

    #[test]
    fn test_with_bounds_rejects_bad_input() {
        assert!(PeriodRadiusGrid::with_bounds((0.0, 10.0), 5, (1.0, 2.0), 5).is_err());
        assert!(PeriodRadiusGrid::with_bounds((10.0, 1.0), 5, (1.0, 2.0), 5).is_err());
        assert!(PeriodRadiusGrid::with_bounds((1.0, 10.0), 1, (1.0, 2.0), 5).is_err());
        assert!(PeriodRadiusGrid::with_bounds((1.0, 10.0), 3, (1.0, 2.0), 3).is_ok());
    }
}
