//! Vetting efficiency from injection-recovery statistics.
//!
//! Recovered injections around sample stars are binned on the grid cells. The per-cell
//! fraction of reliable candidates (`PC` with a score above the cut) is then fitted
//! with a clamped broken power law, which is what downstream code evaluates.

use std::collections::HashSet;

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::algorithms::broken_power_law::{broken_power_law_2d, BrokenPowerLaw2d, N_PARAMS};
use crate::algorithms::histogram::{
    efficiency_uncertainty, histogram1d, histogram2d, safe_divide, safe_ratio,
};
use crate::algorithms::optimization::{fit_weighted, LMConfig, WeightedData};
use crate::core::{
    CompletenessResult, Disposition, InjectionRecord, PeriodRadiusGrid, PhysicalConstants,
    RecoveredTces,
};
use crate::transformations::StellarSample;

/// Score cut that selects the high-reliability starting point.
pub const HIGH_RELIABILITY_SCORE_CUT: f64 = 0.9;

const HIGH_RELIABILITY_GUESS: [f64; N_PARAMS] = [0.9, 50.0, -0.07, -0.4, 5.7, 0.1, -2.7];
const DEFAULT_GUESS: [f64; N_PARAMS] = [0.9, 100.0, 0.0, -0.2, 5.7, 0.1, -2.7];

/// Starting parameters for the fit, chosen by score cut.
pub fn initial_guess(score_cut: f64) -> [f64; N_PARAMS] {
    if (score_cut - HIGH_RELIABILITY_SCORE_CUT).abs() < 1e-12 {
        HIGH_RELIABILITY_GUESS
    } else {
        DEFAULT_GUESS
    }
}

/// How the seventh reported parameter relates to the fitted ones.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterMode {
    /// Report the large-radius slope as a copy of the small-radius slope
    #[default]
    Duplicate,
    /// Report all seven fitted values as they are
    Independent,
}

impl ParameterMode {
    /// Map fitted parameters (and their errors) to the reported ones.
    pub fn report(&self, fitted: [f64; N_PARAMS]) -> [f64; N_PARAMS] {
        let mut reported = fitted;
        if *self == ParameterMode::Duplicate {
            reported[6] = fitted[5];
        }
        reported
    }
}

/// Settings for one vetting fit.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VettingSettings {
    /// Candidates need a score strictly above this to count as reliable
    pub score_cut: f64,
    pub parameter_mode: ParameterMode,
    pub fit: LMConfig,
}

/// A recovered injection with its planet radius re-derived from the sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VettingInjection {
    pub tce_id: String,
    pub kic: i64,
    /// Days
    pub period: f64,
    /// Earth radii
    pub radius: f64,
    /// Host radius in R☉
    pub stellar_radius: f64,
    pub disposition: Disposition,
    pub score: f64,
}

impl VettingInjection {
    pub fn is_reliable(&self, score_cut: f64) -> bool {
        self.disposition.is_candidate() && self.score > score_cut
    }
}

/// Injection counts after each assembly step
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssemblyCounts {
    pub total: usize,
    pub recovered: usize,
    pub in_sample: usize,
    pub on_grid: usize,
}

/// Keep recovered injections around sample stars whose period and radius fall on the grid.
///
/// Every matching injection is kept, including several on one host.
pub fn assemble_injections(
    injections: &[InjectionRecord],
    recovered: &RecoveredTces,
    sample: &StellarSample,
    grid: &PeriodRadiusGrid,
    constants: &PhysicalConstants,
) -> CompletenessResult<(Vec<VettingInjection>, AssemblyCounts)> {
    let stellar_radii = sample.stellar_radii()?;
    let mut counts = AssemblyCounts {
        total: injections.len(),
        ..Default::default()
    };

    let mut assembled = Vec::new();
    for injection in injections {
        if !recovered.contains(&injection.tce_id) {
            continue;
        }
        counts.recovered += 1;

        let Some(&stellar_radius) = stellar_radii.get(&injection.kic) else {
            continue;
        };
        counts.in_sample += 1;

        let radius = constants
            .radius_conversion
            .planet_radius(injection.radius_ratio, stellar_radius);
        if !grid.contains(injection.period, radius) {
            continue;
        }
        counts.on_grid += 1;

        assembled.push(VettingInjection {
            tce_id: injection.tce_id.clone(),
            kic: injection.kic,
            period: injection.period,
            radius,
            stellar_radius,
            disposition: injection.disposition,
            score: injection.score,
        });
    }

    log::info!(
        "Injections: {} total, {} recovered, {} around sample stars, {} on the grid",
        counts.total,
        counts.recovered,
        counts.in_sample,
        counts.on_grid
    );

    Ok((assembled, counts))
}

fn period_radius_columns<F>(injections: &[VettingInjection], keep: F) -> (Vec<f64>, Vec<f64>)
where
    F: Fn(&VettingInjection) -> bool,
{
    injections
        .iter()
        .filter(|i| keep(i))
        .map(|i| (i.period, i.radius))
        .unzip()
}

/// Histograms of the assembled injections on the grid cells.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinnedStatistics {
    pub all: Array2<f64>,
    pub candidates: Array2<f64>,
    pub reliable: Array2<f64>,
    /// `reliable / all`, NaN in empty cells
    pub efficiency: Array2<f64>,
    pub uncertainty: Array2<f64>,
    /// `candidates / all`, NaN in empty cells
    pub candidate_fraction: Array2<f64>,
    pub period_all: Array1<f64>,
    pub period_reliable: Array1<f64>,
    pub radius_all: Array1<f64>,
    pub radius_reliable: Array1<f64>,
}

impl BinnedStatistics {
    pub fn from_injections(
        injections: &[VettingInjection],
        grid: &PeriodRadiusGrid,
        score_cut: f64,
    ) -> Self {
        let (p_all, r_all) = period_radius_columns(injections, |_| true);
        let (p_cand, r_cand) =
            period_radius_columns(injections, |i| i.disposition.is_candidate());
        let (p_rel, r_rel) = period_radius_columns(injections, |i| i.is_reliable(score_cut));

        let periods = grid.periods().view();
        let radii = grid.radii().view();

        let all = histogram2d(&p_all, &r_all, periods, radii);
        let candidates = histogram2d(&p_cand, &r_cand, periods, radii);
        let reliable = histogram2d(&p_rel, &r_rel, periods, radii);

        let efficiency = safe_divide(&reliable, &all);
        let uncertainty = efficiency_uncertainty(&reliable, &all, &efficiency);
        let candidate_fraction = safe_divide(&candidates, &all);

        Self {
            period_all: histogram1d(&p_all, periods),
            period_reliable: histogram1d(&p_rel, periods),
            radius_all: histogram1d(&r_all, radii),
            radius_reliable: histogram1d(&r_rel, radii),
            all,
            candidates,
            reliable,
            efficiency,
            uncertainty,
            candidate_fraction,
        }
    }

    pub fn period_reliable_fraction(&self) -> Array1<f64> {
        safe_divide(&self.period_reliable, &self.period_all)
    }

    pub fn radius_reliable_fraction(&self) -> Array1<f64> {
        safe_divide(&self.radius_reliable, &self.radius_all)
    }

    /// Cells with a finite efficiency and a usable uncertainty, placed at cell centers.
    pub fn fit_data(&self, grid: &PeriodRadiusGrid) -> WeightedData {
        let period_centers = grid.period_centers();
        let radius_centers = grid.radius_centers();

        let mut data = WeightedData::with_capacity(self.efficiency.len());
        for ((i, j), &eff) in self.efficiency.indexed_iter() {
            let sigma = self.uncertainty[[i, j]];
            if eff.is_finite() && sigma.is_finite() && sigma > 0.0 {
                data.push(period_centers[i], radius_centers[j], eff, sigma);
            }
        }
        data
    }
}

/// Fitted vetting efficiency surface.
///
/// # Examples
///
/// ```
/// use kepler_completeness::services::VettingEfficiencyModel;
///
/// let model = VettingEfficiencyModel::new([0.5, 100.0, 0.0, 0.0, 5.0, 0.0, 0.0]);
/// assert_eq!(model.evaluate(10.0, 1.0), 0.5);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VettingEfficiencyModel {
    pub params: [f64; N_PARAMS],
}

impl VettingEfficiencyModel {
    pub fn new(params: [f64; N_PARAMS]) -> Self {
        Self { params }
    }

    pub fn evaluate(&self, period: f64, radius: f64) -> f64 {
        broken_power_law_2d(period, radius, &self.params)
    }

    /// The surface on the grid nodes, `(nP × nR)`.
    pub fn evaluate_grid(&self, grid: &PeriodRadiusGrid) -> Array2<f64> {
        let periods = grid.periods();
        let radii = grid.radii();
        Array2::from_shape_fn(grid.shape(), |(i, j)| self.evaluate(periods[i], radii[j]))
    }
}

/// Result of the regression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VettingFit {
    /// Surface built from the reported parameters
    pub model: VettingEfficiencyModel,
    pub fitted_params: [f64; N_PARAMS],
    pub errors: [f64; N_PARAMS],
    pub chi2: f64,
    pub iterations: usize,
    pub n_bins: usize,
    pub parameter_mode: ParameterMode,
}

/// Summary of the injection sample and the fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VettingDiagnostics {
    pub counts: AssemblyCounts,
    pub score_cut: f64,
    pub n_candidates: usize,
    pub n_false_positives: usize,
    pub n_reliable: usize,
    pub candidate_fraction: f64,
    pub reliable_fraction: f64,
    pub unique_hosts: usize,
    pub mean_stellar_radius: f64,
    pub median_stellar_radius: f64,
    pub n_fit_bins: usize,
    pub chi2: f64,
    pub iterations: usize,
    pub fitted_params: [f64; N_PARAMS],
    pub reported_params: [f64; N_PARAMS],
    pub errors: [f64; N_PARAMS],
    pub period_reliable_fraction: Vec<f64>,
    pub radius_reliable_fraction: Vec<f64>,
}

fn mean_and_median(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (f64::NAN, f64::NAN);
    }
    let count = values.len();
    let mean = values.iter().sum::<f64>() / count as f64;

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let median = if count % 2 == 0 {
        (sorted[count / 2 - 1] + sorted[count / 2]) / 2.0
    } else {
        sorted[count / 2]
    };
    (mean, median)
}

/// Assemble, bin and fit the vetting efficiency.
///
/// Fails with `InsufficientData` when fewer non-empty cells than parameters remain,
/// and with `FitDidNotConverge` when the optimiser gives up.
pub fn fit_vetting_efficiency(
    injections: &[InjectionRecord],
    recovered: &RecoveredTces,
    sample: &StellarSample,
    grid: &PeriodRadiusGrid,
    constants: &PhysicalConstants,
    settings: &VettingSettings,
) -> CompletenessResult<(VettingFit, VettingDiagnostics)> {
    let (assembled, counts) = assemble_injections(injections, recovered, sample, grid, constants)?;
    let stats = BinnedStatistics::from_injections(&assembled, grid, settings.score_cut);
    let data = stats.fit_data(grid);

    let n_candidates = assembled.iter().filter(|i| i.disposition.is_candidate()).count();
    let n_reliable = assembled
        .iter()
        .filter(|i| i.is_reliable(settings.score_cut))
        .count();
    let host_radii: Vec<f64> = assembled.iter().map(|i| i.stellar_radius).collect();
    let (mean_stellar_radius, median_stellar_radius) = mean_and_median(&host_radii);
    let unique_hosts = assembled.iter().map(|i| i.kic).collect::<HashSet<_>>().len();

    log::info!(
        "Vetting: {} candidates, {} reliable above score {}, {} bins to fit",
        n_candidates,
        n_reliable,
        settings.score_cut,
        data.len()
    );

    let result = fit_weighted(
        &BrokenPowerLaw2d,
        &data,
        initial_guess(settings.score_cut),
        &settings.fit,
    )?;

    let reported = settings.parameter_mode.report(result.params);
    let errors = settings.parameter_mode.report(result.errors);

    log::info!(
        "Vetting fit converged in {} iterations, chi2 = {:.4}",
        result.iterations,
        result.chi2
    );

    let fit = VettingFit {
        model: VettingEfficiencyModel::new(reported),
        fitted_params: result.params,
        errors,
        chi2: result.chi2,
        iterations: result.iterations,
        n_bins: data.len(),
        parameter_mode: settings.parameter_mode,
    };

    let diagnostics = VettingDiagnostics {
        counts,
        score_cut: settings.score_cut,
        n_candidates,
        n_false_positives: assembled.len() - n_candidates,
        n_reliable,
        candidate_fraction: safe_ratio(n_candidates as f64, assembled.len() as f64),
        reliable_fraction: safe_ratio(n_reliable as f64, assembled.len() as f64),
        unique_hosts,
        mean_stellar_radius,
        median_stellar_radius,
        n_fit_bins: data.len(),
        chi2: result.chi2,
        iterations: result.iterations,
        fitted_params: result.params,
        reported_params: reported,
        errors,
        period_reliable_fraction: stats.period_reliable_fraction().to_vec(),
        radius_reliable_fraction: stats.radius_reliable_fraction().to_vec(),
    };

    Ok((fit, diagnostics))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::histogram::bin_index;
    use crate::core::{CompletenessError, StarRecord};
    use crate::transformations::StellarCatalog;

    const RSUN_IN_REARTH: f64 = 696_340.0 / 6_371.0;

    fn solar_sample(n: i64) -> StellarSample {
        let records: Vec<_> = (1..=n)
            .map(|kic| StarRecord::new(kic, 5800.0, 4.4, 1.0, 1.0))
            .collect();
        StellarSample::new(StellarCatalog::from_records(&records).unwrap().frame().clone())
    }

    fn injection(n: usize, kic: i64, period: f64, radius: f64, disp: Disposition, score: f64) -> InjectionRecord {
        InjectionRecord {
            tce_id: format!("{:09}-{:02}", kic, n),
            kic,
            period,
            radius_ratio: radius / RSUN_IN_REARTH,
            disposition: disp,
            score,
        }
    }

    /// Two candidates per cell, one above and one below a cut of 0.5.
    fn half_reliable(grid: &PeriodRadiusGrid) -> Vec<InjectionRecord> {
        let mut out = Vec::new();
        let mut n = 0;
        for &p in grid.period_centers().iter() {
            for &r in grid.radius_centers().iter() {
                let kic = (n % 50) as i64 + 1;
                out.push(injection(n, kic, p, r, Disposition::Candidate, 0.95));
                out.push(injection(n + 1, kic, p, r, Disposition::Candidate, 0.10));
                n += 2;
            }
        }
        out
    }

    fn recover_all(injections: &[InjectionRecord]) -> RecoveredTces {
        RecoveredTces::new(injections.iter().map(|i| i.tce_id.clone()))
    }

    #[test]
    fn test_initial_guess_presets() {
        assert_eq!(initial_guess(0.9), HIGH_RELIABILITY_GUESS);
        assert_eq!(initial_guess(0.0), DEFAULT_GUESS);
        assert_eq!(initial_guess(0.5), DEFAULT_GUESS);
    }

    #[test]
    fn test_parameter_mode_report() {
        let fitted = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0];
        assert_eq!(ParameterMode::Duplicate.report(fitted)[6], 6.0);
        assert_eq!(ParameterMode::Independent.report(fitted), fitted);
    }

    #[test]
    fn test_assembly_filters() {
        let grid = PeriodRadiusGrid::new();
        let sample = solar_sample(2);
        let injections = vec![
            injection(1, 1, 10.0, 2.0, Disposition::Candidate, 0.9),
            injection(2, 1, 10.0, 2.0, Disposition::Candidate, 0.9), // not recovered
            injection(3, 99, 10.0, 2.0, Disposition::Candidate, 0.9), // host not in sample
            injection(4, 2, 800.0, 2.0, Disposition::FalsePositive, 0.1), // off grid
            injection(5, 2, 10.0, 2.0, Disposition::FalsePositive, 0.1),
        ];
        let recovered = RecoveredTces::new(
            [1, 3, 4, 5].iter().map(|&n| injections[n - 1].tce_id.clone()),
        );

        let (assembled, counts) = assemble_injections(
            &injections,
            &recovered,
            &sample,
            &grid,
            &PhysicalConstants::default(),
        )
        .unwrap();

        assert_eq!(
            counts,
            AssemblyCounts {
                total: 5,
                recovered: 4,
                in_sample: 3,
                on_grid: 2
            }
        );
        assert_eq!(assembled.len(), 2);
        assert!((assembled[0].radius - 2.0).abs() < 1e-9);
    }

    fn assembled(tce: &str, disposition: Disposition, score: f64) -> VettingInjection {
        VettingInjection {
            tce_id: tce.to_string(),
            kic: 1,
            period: 10.0,
            radius: 2.0,
            stellar_radius: 1.0,
            disposition,
            score,
        }
    }

    #[test]
    fn test_false_positives_are_never_reliable() {
        let grid = PeriodRadiusGrid::new();
        let injections = vec![
            assembled("a", Disposition::Candidate, 0.95),
            assembled("b", Disposition::Candidate, 0.30),
            assembled("c", Disposition::FalsePositive, 0.99),
            assembled("d", Disposition::FalsePositive, 0.10),
        ];
        assert!(!injections[2].is_reliable(0.5));

        let stats = BinnedStatistics::from_injections(&injections, &grid, 0.5);
        let i = bin_index(&grid.periods().to_vec(), 10.0).unwrap();
        let j = bin_index(&grid.radii().to_vec(), 2.0).unwrap();

        assert_eq!(stats.all[[i, j]], 4.0);
        assert_eq!(stats.candidates[[i, j]], 2.0);
        assert!(stats.candidates[[i, j]] < stats.all[[i, j]]);
        assert_eq!(stats.reliable[[i, j]], 1.0);
        assert_eq!(stats.efficiency[[i, j]], 0.25);
        assert_eq!(stats.candidate_fraction[[i, j]], 0.5);
        assert_eq!(stats.all.sum(), 4.0);
        assert_eq!(stats.reliable.sum(), 1.0);
        assert_eq!(stats.period_reliable_fraction()[i], 0.25);
    }

    #[test]
    fn test_binned_statistics() {
        let grid = PeriodRadiusGrid::new();
        let sample = solar_sample(50);
        let injections = half_reliable(&grid);
        let (assembled, _) = assemble_injections(
            &injections,
            &recover_all(&injections),
            &sample,
            &grid,
            &PhysicalConstants::default(),
        )
        .unwrap();
        let stats = BinnedStatistics::from_injections(&assembled, &grid, 0.5);

        assert_eq!(stats.all.sum(), 960.0);
        assert!(stats.efficiency.iter().all(|&e| (e - 0.5).abs() < 1e-12));
        assert!(stats.candidate_fraction.iter().all(|&f| f == 1.0));
        // one reliable count per cell: sqrt(1) >= 1 so sigma = 0.5 / 1
        assert!(stats.uncertainty.iter().all(|&s| (s - 0.5).abs() < 1e-12));
        assert_eq!(stats.fit_data(&grid).len(), 480);
        assert!(stats
            .period_reliable_fraction()
            .iter()
            .all(|&f| (f - 0.5).abs() < 1e-12));
    }

    #[test]
    fn test_flat_surface_fit() {
        let grid = PeriodRadiusGrid::new();
        let sample = solar_sample(50);
        let injections = half_reliable(&grid);
        let settings = VettingSettings {
            score_cut: 0.5,
            ..Default::default()
        };

        let (fit, diagnostics) = fit_vetting_efficiency(
            &injections,
            &recover_all(&injections),
            &sample,
            &grid,
            &PhysicalConstants::default(),
            &settings,
        )
        .unwrap();

        assert!((fit.model.params[0] - 0.5).abs() < 1e-3);
        let surface = fit.model.evaluate_grid(&grid);
        assert_eq!(surface.dim(), grid.shape());
        assert!(surface.iter().all(|&v| (v - 0.5).abs() < 1e-3));
        assert_eq!(fit.model.params[6], fit.model.params[5]);
        assert_eq!(diagnostics.n_fit_bins, 480);
        assert_eq!(diagnostics.unique_hosts, 50);
        assert_eq!(diagnostics.n_false_positives, 0);
        assert!((diagnostics.reliable_fraction - 0.5).abs() < 1e-12);
        assert_eq!(diagnostics.median_stellar_radius, 1.0);
    }

    #[test]
    fn test_independent_mode_keeps_seventh_parameter() {
        let grid = PeriodRadiusGrid::new();
        let sample = solar_sample(50);
        let injections = half_reliable(&grid);
        let settings = VettingSettings {
            score_cut: 0.5,
            parameter_mode: ParameterMode::Independent,
            ..Default::default()
        };

        let (fit, _) = fit_vetting_efficiency(
            &injections,
            &recover_all(&injections),
            &sample,
            &grid,
            &PhysicalConstants::default(),
            &settings,
        )
        .unwrap();
        assert_eq!(fit.model.params, fit.fitted_params);
    }

    #[test]
    fn test_too_few_bins_is_insufficient_data() {
        let grid = PeriodRadiusGrid::new();
        let sample = solar_sample(3);
        let injections: Vec<_> = (0..3)
            .map(|n| injection(n, 1, 5.0 * (n + 1) as f64, 2.0, Disposition::Candidate, 0.9))
            .collect();

        let err = fit_vetting_efficiency(
            &injections,
            &recover_all(&injections),
            &sample,
            &grid,
            &PhysicalConstants::default(),
            &VettingSettings::default(),
        )
        .unwrap_err();
        assert!(matches!(err, CompletenessError::InsufficientData(_)));
    }

    #[test]
    fn test_mean_and_median() {
        let (mean, median) = mean_and_median(&[3.0, 1.0, 2.0, 10.0]);
        assert_eq!(mean, 4.0);
        assert_eq!(median, 2.5);
        assert!(mean_and_median(&[]).0.is_nan());
    }
}
