//! Service layer: the pipeline stages and their orchestration.
//!
//! Each stage takes the stellar sample and borrowed survey inputs and returns an
//! in-memory map plus diagnostics. [`get_completeness`] runs them in order.

pub mod completeness;
pub mod detection;
pub mod geometry;
pub mod vetting;

pub use completeness::{
    compose_completeness, get_completeness, CompletenessComponents, CompletenessDiagnostics,
    CompletenessEstimate, CompletenessRequest, SurveyData,
};
pub use detection::{build_detection_map, DetectionEfficiencyMap};
pub use geometry::{geometric_probability_map, transit_probability};
pub use vetting::{
    assemble_injections, fit_vetting_efficiency, initial_guess, AssemblyCounts, BinnedStatistics,
    ParameterMode, VettingDiagnostics, VettingEfficiencyModel, VettingFit, VettingInjection,
    VettingSettings,
};
