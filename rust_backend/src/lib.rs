//! Completeness of a transit-survey planet search.
//!
//! For each orbital period and planet radius on a fixed grid, completeness is the
//! probability that a planet around a star in the chosen sample would be detected,
//! vetted as a genuine signal and seen to transit:
//!
//! ```text
//! completeness(P, R) = detection(P, R) × vetting(P, R) × fgeo(P)
//! ```
//!
//! - [`core`]: grid, records, detection archive, constants and errors
//! - [`transformations`]: stellar sample selection
//! - [`algorithms`]: histograms, Levenberg–Marquardt and the broken power law
//! - [`services`]: the pipeline stages and [`services::get_completeness`]
//! - [`io`], [`config`], [`report`]: file loaders, run configuration and display

pub mod algorithms;
pub mod config;
pub mod core;
pub mod io;
pub mod report;
pub mod services;
pub mod transformations;

#[cfg(feature = "python")]
pub mod python;

#[cfg(feature = "python")]
use pyo3::prelude::*;

/// Kepler completeness engine
#[cfg(feature = "python")]
#[pymodule]
fn kepler_completeness(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<python::PyCompletenessResult>()?;
    m.add_function(wrap_pyfunction!(python::get_completeness, m)?)?;
    m.add_function(wrap_pyfunction!(python::geometric_transit_probability, m)?)?;
    Ok(())
}
