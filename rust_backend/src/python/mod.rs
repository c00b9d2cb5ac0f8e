//! Python bindings for the completeness engine.
//!
//! Exposes the pipeline to Python via PyO3 when the crate is built with the
//! `python` feature. Maps are returned as nested lists indexed `[period][radius]`.
//!
//! # Example (Python)
//! ```python
//! import kepler_completeness
//!
//! result = kepler_completeness.get_completeness("completeness.toml")
//! print(result.n_stars, len(result.completeness), len(result.completeness[0]))
//! print(result.report)
//! ```

use ndarray::Array2;
use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;

use crate::config::RunConfig;
use crate::core::{CompletenessError, PhysicalConstants};
use crate::io::SurveyLoader;
use crate::report::DiagnosticsReport;
use crate::services::{self, CompletenessEstimate};

fn to_nested(map: &Array2<f64>) -> Vec<Vec<f64>> {
    map.rows().into_iter().map(|row| row.to_vec()).collect()
}

fn to_py_err(err: CompletenessError) -> PyErr {
    if err.is_configuration_error() {
        PyValueError::new_err(err.to_string())
    } else {
        PyRuntimeError::new_err(err.to_string())
    }
}

/// Python view of a completeness estimate
#[pyclass(name = "CompletenessResult")]
#[derive(Clone)]
pub struct PyCompletenessResult {
    #[pyo3(get)]
    pub periods: Vec<f64>,
    #[pyo3(get)]
    pub radii: Vec<f64>,
    #[pyo3(get)]
    pub completeness: Vec<Vec<f64>>,
    #[pyo3(get)]
    pub n_stars: usize,
    #[pyo3(get)]
    pub vetting_params: Vec<f64>,
    #[pyo3(get)]
    pub detection: Option<Vec<Vec<f64>>>,
    #[pyo3(get)]
    pub vetting: Option<Vec<Vec<f64>>>,
    #[pyo3(get)]
    pub geometric: Option<Vec<Vec<f64>>>,
    #[pyo3(get)]
    pub report: String,
    #[pyo3(get)]
    pub request_fingerprint: String,
}

#[pymethods]
impl PyCompletenessResult {
    fn __repr__(&self) -> String {
        format!(
            "CompletenessResult(n_stars={}, shape=({}, {}), request={})",
            self.n_stars,
            self.periods.len(),
            self.radii.len(),
            self.request_fingerprint
        )
    }
}

impl From<&CompletenessEstimate> for PyCompletenessResult {
    fn from(estimate: &CompletenessEstimate) -> Self {
        let components = estimate.components.as_ref();
        PyCompletenessResult {
            periods: estimate.grid.periods().to_vec(),
            radii: estimate.grid.radii().to_vec(),
            completeness: to_nested(&estimate.completeness),
            n_stars: estimate.n_stars,
            vetting_params: estimate.vetting_model.params.to_vec(),
            detection: components.map(|c| to_nested(&c.detection)),
            vetting: components.map(|c| to_nested(&c.vetting)),
            geometric: components.map(|c| to_nested(&c.geometric)),
            report: DiagnosticsReport::new(estimate).to_string(),
            request_fingerprint: estimate.diagnostics.request_fingerprint.clone(),
        }
    }
}

/// Run the completeness pipeline described by a TOML run configuration.
#[pyfunction]
pub fn get_completeness(config_path: &str) -> PyResult<PyCompletenessResult> {
    let config = RunConfig::from_file(config_path).map_err(to_py_err)?;
    let request = config.to_request().map_err(to_py_err)?;
    let survey = SurveyLoader::load(&config.inputs)
        .map_err(|e| PyRuntimeError::new_err(format!("{:#}", e)))?;

    let estimate = services::get_completeness(&survey, &request).map_err(to_py_err)?;
    Ok(PyCompletenessResult::from(&estimate))
}

/// Geometric transit probability for one star and period, default constants.
#[pyfunction]
pub fn geometric_transit_probability(period_days: f64, mass_msun: f64, radius_rsun: f64) -> f64 {
    services::transit_probability(
        period_days,
        mass_msun,
        radius_rsun,
        &PhysicalConstants::default(),
    )
}
