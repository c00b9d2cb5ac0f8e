//! Completeness composition and the top-level pipeline.
//!
//! `completeness = detection × vetting × geometric`, elementwise on the grid nodes.

use ndarray::{Array2, Zip};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::algorithms::optimization::LMConfig;
use crate::core::{
    CompletenessError, CompletenessResult, DetectionArchive, InjectionRecord, PeriodRadiusGrid,
    PhysicalConstants, RecoveredTces,
};
use crate::services::detection::build_detection_map;
use crate::services::geometry::geometric_probability_map;
use crate::services::vetting::{
    fit_vetting_efficiency, ParameterMode, VettingDiagnostics, VettingEfficiencyModel,
    VettingSettings,
};
use crate::transformations::{select_sample, SampleDiagnostics, SampleSelection, StellarCatalog};

/// Caller parameters for one completeness computation.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletenessRequest {
    pub selection: SampleSelection,
    pub score_cut: f64,
    pub return_components: bool,
    pub parameter_mode: ParameterMode,
    pub constants: PhysicalConstants,
    pub fit: LMConfig,
}

impl CompletenessRequest {
    pub fn vetting_settings(&self) -> VettingSettings {
        VettingSettings {
            score_cut: self.score_cut,
            parameter_mode: self.parameter_mode,
            fit: self.fit.clone(),
        }
    }

    /// SHA-256 of the request's JSON form, hex encoded.
    pub fn fingerprint(&self) -> CompletenessResult<String> {
        let bytes = serde_json::to_vec(self).map_err(|e| {
            CompletenessError::Configuration(format!("request is not serialisable: {}", e))
        })?;
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        Ok(hex::encode(hasher.finalize()))
    }
}

/// The parsed survey inputs, borrowed by every computation.
#[derive(Debug, Clone)]
pub struct SurveyData {
    pub catalog: StellarCatalog,
    pub archive: DetectionArchive,
    pub injections: Vec<InjectionRecord>,
    pub recovered: RecoveredTces,
    pub grid: PeriodRadiusGrid,
}

impl SurveyData {
    /// Survey inputs on the standard grid.
    pub fn new(
        catalog: StellarCatalog,
        archive: DetectionArchive,
        injections: Vec<InjectionRecord>,
        recovered: RecoveredTces,
    ) -> Self {
        Self {
            catalog,
            archive,
            injections,
            recovered,
            grid: PeriodRadiusGrid::new(),
        }
    }

    pub fn with_grid(mut self, grid: PeriodRadiusGrid) -> Self {
        self.grid = grid;
        self
    }
}

/// The three factors of the completeness product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletenessComponents {
    pub detection: Array2<f64>,
    pub vetting: Array2<f64>,
    pub geometric: Array2<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletenessDiagnostics {
    pub sample: SampleDiagnostics,
    pub vetting: VettingDiagnostics,
    pub mean_stellar_mass: f64,
    pub mean_stellar_radius: f64,
    pub constants_version: String,
    pub request_fingerprint: String,
}

/// Completeness on the grid nodes, with the fitted vetting surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletenessEstimate {
    pub grid: PeriodRadiusGrid,
    pub completeness: Array2<f64>,
    pub n_stars: usize,
    pub vetting_model: VettingEfficiencyModel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub components: Option<CompletenessComponents>,
    pub diagnostics: CompletenessDiagnostics,
}

/// Elementwise product of the three factor maps, which must share one shape.
///
/// # Examples
///
/// ```
/// use ndarray::Array2;
/// use kepler_completeness::services::compose_completeness;
///
/// let ones = Array2::ones((2, 3));
/// let geo = Array2::from_elem((2, 3), 0.01);
/// let c = compose_completeness(&ones, &ones, &geo).unwrap();
/// assert_eq!(c, geo);
/// ```
pub fn compose_completeness(
    detection: &Array2<f64>,
    vetting: &Array2<f64>,
    geometric: &Array2<f64>,
) -> CompletenessResult<Array2<f64>> {
    if detection.dim() != vetting.dim() || detection.dim() != geometric.dim() {
        return Err(CompletenessError::ShapeMismatch(format!(
            "detection {:?}, vetting {:?} and geometric {:?} maps differ",
            detection.dim(),
            vetting.dim(),
            geometric.dim()
        )));
    }

    Ok(Zip::from(detection)
        .and(vetting)
        .and(geometric)
        .map_collect(|&d, &v, &g| d * v * g))
}

/// Run the full pipeline: sample selection, detection map, vetting fit and geometry.
///
/// Configuration problems (unknown range fields, bad constants) are
/// reported before any numeric work.
pub fn get_completeness(
    data: &SurveyData,
    request: &CompletenessRequest,
) -> CompletenessResult<CompletenessEstimate> {
    request.constants.validate()?;
    let fingerprint = request.fingerprint()?;
    let grid = &data.grid;

    let (sample, sample_diagnostics) =
        select_sample(&data.catalog, &data.archive, &request.selection)?;

    let detection = build_detection_map(&sample, &data.archive, grid)?;

    let (vetting_fit, vetting_diagnostics) = fit_vetting_efficiency(
        &data.injections,
        &data.recovered,
        &sample,
        grid,
        &request.constants,
        &request.vetting_settings(),
    )?;
    let vetting = vetting_fit.model.evaluate_grid(grid);

    let geometric = geometric_probability_map(
        grid,
        detection.mean_mass,
        detection.mean_radius,
        &request.constants,
    );

    let completeness = compose_completeness(&detection.efficiency, &vetting, &geometric)?;

    log::info!(
        "Completeness computed for {} stars (constants {}, request {})",
        detection.n_stars,
        request.constants.version,
        &fingerprint[..12]
    );

    let components = request.return_components.then(|| CompletenessComponents {
        detection: detection.efficiency.clone(),
        vetting,
        geometric,
    });

    Ok(CompletenessEstimate {
        grid: grid.clone(),
        completeness,
        n_stars: detection.n_stars,
        vetting_model: vetting_fit.model,
        components,
        diagnostics: CompletenessDiagnostics {
            sample: sample_diagnostics,
            vetting: vetting_diagnostics,
            mean_stellar_mass: detection.mean_mass,
            mean_stellar_radius: detection.mean_radius,
            constants_version: request.constants.version.clone(),
            request_fingerprint: fingerprint,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_with_unit_factors() {
        let grid = PeriodRadiusGrid::new();
        let geometric = geometric_probability_map(&grid, 1.0, 1.0, &PhysicalConstants::default());
        let ones = Array2::ones(grid.shape());
        let c = compose_completeness(&ones, &ones, &geometric).unwrap();
        assert_eq!(c, geometric);
    }

    #[test]
    fn test_product_bounded_by_factors() {
        let det = Array2::from_shape_fn((3, 4), |(i, j)| (i + j) as f64 / 10.0);
        let vet = Array2::from_elem((3, 4), 0.6);
        let geo = Array2::from_elem((3, 4), 0.05);
        let c = compose_completeness(&det, &vet, &geo).unwrap();
        for ((&c, &d), &g) in c.iter().zip(det.iter()).zip(geo.iter()) {
            assert!(c >= 0.0 && c <= d && c <= g);
        }
    }

    #[test]
    fn test_nan_propagates() {
        let mut det = Array2::from_elem((2, 2), 0.5);
        det[[0, 1]] = f64::NAN;
        let other = Array2::from_elem((2, 2), 0.5);
        let c = compose_completeness(&det, &other, &other).unwrap();
        assert!(c[[0, 1]].is_nan());
        assert_eq!(c[[1, 1]], 0.125);
    }

    #[test]
    fn test_shape_mismatch() {
        let a = Array2::zeros((2, 2));
        let b = Array2::zeros((2, 3));
        let err = compose_completeness(&a, &a, &b).unwrap_err();
        assert!(matches!(err, CompletenessError::ShapeMismatch(_)));
    }

    #[test]
    fn test_fingerprint_tracks_request() {
        let base = CompletenessRequest::default();
        let same = CompletenessRequest::default();
        let other = CompletenessRequest {
            score_cut: 0.9,
            ..Default::default()
        };
        let fp = base.fingerprint().unwrap();
        assert_eq!(fp.len(), 64);
        assert_eq!(fp, same.fingerprint().unwrap());
        assert_ne!(fp, other.fingerprint().unwrap());
    }

    #[test]
    fn test_request_deserialises_with_defaults() {
        let request: CompletenessRequest =
            serde_json::from_str(r#"{"score_cut": 0.9, "parameter_mode": "independent"}"#).unwrap();
        assert_eq!(request.score_cut, 0.9);
        assert_eq!(request.parameter_mode, ParameterMode::Independent);
        assert!(request.selection.dwarf_cut);
        assert_eq!(request.constants.version, PhysicalConstants::ASTROPY_IAU2015);
        assert_eq!(request.fit.max_iterations, 500);
    }
}
