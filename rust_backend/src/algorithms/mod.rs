//! Numerical building blocks for the vetting fit.
//!
//! # Components
//!
//! - [`histogram`]: fixed-edge 1D/2D histograms and NaN-safe bin ratios
//! - [`optimization`]: weighted Levenberg–Marquardt least squares
//! - [`broken_power_law`]: the clamped 2D broken power law fitted to vetting efficiency
//!
//! # Example
//!
//! ```
//! use kepler_completeness::algorithms::{
//!     broken_power_law_2d, fit_weighted, BrokenPowerLaw2d, LMConfig, WeightedData,
//! };
//!
//! let mut data = WeightedData::default();
//! for p in [1.0, 3.0, 10.0, 30.0, 100.0] {
//!     for r in [0.5, 1.0, 2.0, 4.0] {
//!         data.push(p, r, 0.5, 0.1);
//!     }
//! }
//! let start = [0.9, 100.0, 0.0, -0.2, 5.7, 0.1, -2.7];
//! let fit = fit_weighted(&BrokenPowerLaw2d, &data, start, &LMConfig::default()).unwrap();
//! assert!((broken_power_law_2d(10.0, 1.0, &fit.params) - 0.5).abs() < 1e-3);
//! ```

pub mod broken_power_law;
pub mod histogram;
pub mod optimization;

pub use broken_power_law::{broken_power_law_2d, BrokenPowerLaw2d, VETTING_CEILING, VETTING_FLOOR};
pub use histogram::{bin_index, efficiency_uncertainty, histogram1d, histogram2d, safe_divide, safe_ratio};
pub use optimization::{fit_weighted, LMConfig, LMResult, LeastSquaresModel, WeightedData};
