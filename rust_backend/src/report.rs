//! Human-readable summary of a completeness run.

use std::fmt;

use crate::services::CompletenessEstimate;

const PARAMETER_NAMES: [&str; 7] = [
    "amplitude",
    "period pivot",
    "period slope (below)",
    "period slope (above)",
    "radius pivot",
    "radius slope (below)",
    "radius slope (above)",
];

/// Formats the diagnostics of a [`CompletenessEstimate`] for the terminal.
///
/// # Examples
///
/// ```no_run
/// use kepler_completeness::report::DiagnosticsReport;
/// # fn show(estimate: &kepler_completeness::services::CompletenessEstimate) {
/// println!("{}", DiagnosticsReport::new(estimate));
/// # }
/// ```
pub struct DiagnosticsReport<'a> {
    estimate: &'a CompletenessEstimate,
}

impl<'a> DiagnosticsReport<'a> {
    pub fn new(estimate: &'a CompletenessEstimate) -> Self {
        Self { estimate }
    }
}

fn fmt_fraction(value: f64) -> String {
    if value.is_finite() {
        format!("{:.3}", value)
    } else {
        "n/a".to_string()
    }
}

impl fmt::Display for DiagnosticsReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let diag = &self.estimate.diagnostics;
        let sample = &diag.sample;
        let vet = &diag.vetting;

        writeln!(f, "Stellar sample")?;
        writeln!(f, "  catalog stars:              {}", sample.catalog_size)?;
        writeln!(f, "  with detection metrics:     {}", sample.with_detection_metrics)?;
        writeln!(f, "  after dwarf cut:            {}", sample.after_dwarf_cut)?;
        writeln!(f, "  after parameter ranges:     {}", sample.after_ranges)?;
        writeln!(f, "  mean mass / radius [sun]:   {:.3} / {:.3}", diag.mean_stellar_mass, diag.mean_stellar_radius)?;

        writeln!(f, "Injections")?;
        writeln!(f, "  total:                      {}", vet.counts.total)?;
        writeln!(f, "  recovered on target:        {}", vet.counts.recovered)?;
        writeln!(f, "  around sample stars:        {}", vet.counts.in_sample)?;
        writeln!(f, "  on the grid:                {}", vet.counts.on_grid)?;
        writeln!(f, "  unique hosts:               {}", vet.unique_hosts)?;
        writeln!(
            f,
            "  host radius mean / median:  {} / {}",
            fmt_fraction(vet.mean_stellar_radius),
            fmt_fraction(vet.median_stellar_radius)
        )?;
        writeln!(f, "  PC / FP:                    {} / {}", vet.n_candidates, vet.n_false_positives)?;
        writeln!(
            f,
            "  candidate fraction:         {}",
            fmt_fraction(vet.candidate_fraction)
        )?;
        writeln!(
            f,
            "  reliable (score > {}):      {} ({})",
            vet.score_cut,
            vet.n_reliable,
            fmt_fraction(vet.reliable_fraction)
        )?;

        writeln!(f, "Vetting fit")?;
        writeln!(
            f,
            "  bins: {}, iterations: {}, chi2: {:.4}",
            vet.n_fit_bins, vet.iterations, vet.chi2
        )?;
        for (i, name) in PARAMETER_NAMES.iter().enumerate() {
            writeln!(
                f,
                "  {:<22} {:>10.4} +/- {:<10.4} (fitted {:.4})",
                name, vet.reported_params[i], vet.errors[i], vet.fitted_params[i]
            )?;
        }

        writeln!(f, "Constants: {}", diag.constants_version)?;
        write!(f, "Request:   {}", diag.request_fingerprint)
    }
}
