use std::collections::{BTreeMap, HashMap};

use polars::prelude::*;
use serde::{Deserialize, Serialize};

use crate::core::{CompletenessError, CompletenessResult, DetectionArchive, StarRecord};

pub const KIC_COLUMN: &str = "KIC";
pub const TEFF_COLUMN: &str = "Teff";
pub const LOGG_COLUMN: &str = "logg";
pub const MASS_COLUMN: &str = "Mass";
pub const RADIUS_COLUMN: &str = "Rad";

const FLOAT_COLUMNS: [&str; 4] = [TEFF_COLUMN, LOGG_COLUMN, MASS_COLUMN, RADIUS_COLUMN];

/// The stellar catalog as a table keyed by `KIC`.
///
/// Required columns are normalised to `Int64` (`KIC`) and `Float64` (`Teff`, `logg`,
/// `Mass`, `Rad`). Any extra columns are kept and can be used in range filters.
#[derive(Debug, Clone)]
pub struct StellarCatalog {
    frame: DataFrame,
}

impl StellarCatalog {
    /// Build a catalog from typed rows
    pub fn from_records(records: &[StarRecord]) -> CompletenessResult<Self> {
        let frame = DataFrame::new(vec![
            Column::from(Series::new(
                KIC_COLUMN.into(),
                records.iter().map(|r| r.kic).collect::<Vec<i64>>(),
            )),
            Column::from(Series::new(
                TEFF_COLUMN.into(),
                records.iter().map(|r| r.teff).collect::<Vec<f64>>(),
            )),
            Column::from(Series::new(
                LOGG_COLUMN.into(),
                records.iter().map(|r| r.logg).collect::<Vec<f64>>(),
            )),
            Column::from(Series::new(
                MASS_COLUMN.into(),
                records.iter().map(|r| r.mass).collect::<Vec<f64>>(),
            )),
            Column::from(Series::new(
                RADIUS_COLUMN.into(),
                records.iter().map(|r| r.radius).collect::<Vec<f64>>(),
            )),
        ])?;
        Ok(Self { frame })
    }

    /// Wrap an already-loaded table, checking and normalising the required columns
    pub fn from_dataframe(frame: DataFrame) -> CompletenessResult<Self> {
        let mut frame = frame;

        for name in std::iter::once(KIC_COLUMN).chain(FLOAT_COLUMNS) {
            if !has_column(&frame, name) {
                return Err(CompletenessError::Configuration(format!(
                    "stellar catalog is missing required column '{}'",
                    name
                )));
            }
        }

        let kic = frame.column(KIC_COLUMN)?.cast(&DataType::Int64)?;
        frame.with_column(kic)?;
        for name in FLOAT_COLUMNS {
            let cast = frame.column(name)?.cast(&DataType::Float64)?;
            frame.with_column(cast)?;
        }

        Ok(Self { frame })
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn len(&self) -> usize {
        self.frame.height()
    }

    pub fn is_empty(&self) -> bool {
        self.frame.height() == 0
    }

    pub fn has_field(&self, name: &str) -> bool {
        has_column(&self.frame, name)
    }
}

fn has_column(frame: &DataFrame, name: &str) -> bool {
    frame.get_column_names().iter().any(|c| c.as_str() == name)
}

/// Inclusive-lower, exclusive-upper interval on one catalog field.
///
/// Serialised as a two-element array, `[low, high]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct ParameterRange {
    pub low: f64,
    pub high: f64,
}

impl ParameterRange {
    pub fn new(low: f64, high: f64) -> Self {
        Self { low, high }
    }

    pub fn contains(&self, value: f64) -> bool {
        self.low <= value && value < self.high
    }

    /// Intersection of two half-open ranges. Disjoint inputs give an empty range.
    pub fn intersect(&self, other: &ParameterRange) -> ParameterRange {
        ParameterRange::new(self.low.max(other.low), self.high.min(other.high))
    }

    pub fn is_empty(&self) -> bool {
        self.low >= self.high || self.low.is_nan() || self.high.is_nan()
    }
}

impl From<[f64; 2]> for ParameterRange {
    fn from(bounds: [f64; 2]) -> Self {
        ParameterRange::new(bounds[0], bounds[1])
    }
}

impl From<ParameterRange> for [f64; 2] {
    fn from(range: ParameterRange) -> Self {
        [range.low, range.high]
    }
}

/// Caller-specified sample selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleSelection {
    #[serde(default = "default_dwarf_cut")]
    pub dwarf_cut: bool,
    /// Catalog field name to `[low, high)`; all ranges must hold
    #[serde(default)]
    pub ranges: BTreeMap<String, ParameterRange>,
}

fn default_dwarf_cut() -> bool {
    true
}

impl Default for SampleSelection {
    fn default() -> Self {
        Self {
            dwarf_cut: default_dwarf_cut(),
            ranges: BTreeMap::new(),
        }
    }
}

impl SampleSelection {
    pub fn with_range(mut self, field: &str, low: f64, high: f64) -> Self {
        self.ranges
            .insert(field.to_string(), ParameterRange::new(low, high));
        self
    }

    pub fn without_dwarf_cut(mut self) -> Self {
        self.dwarf_cut = false;
        self
    }

    /// Checks range fields against the catalog before any filtering happens.
    ///
    /// Empty or NaN ranges are accepted; they select no stars.
    pub fn validate(&self, catalog: &StellarCatalog) -> CompletenessResult<()> {
        for field in self.ranges.keys() {
            if !catalog.has_field(field) {
                return Err(CompletenessError::UnknownField(field.clone()));
            }
        }
        Ok(())
    }
}

/// Row counts after each selection stage
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleDiagnostics {
    pub catalog_size: usize,
    pub with_detection_metrics: usize,
    pub after_dwarf_cut: usize,
    pub after_ranges: usize,
}

/// Filtered view of the stellar catalog used by every downstream stage.
#[derive(Debug, Clone)]
pub struct StellarSample {
    frame: DataFrame,
}

impl StellarSample {
    pub fn new(frame: DataFrame) -> Self {
        Self { frame }
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn len(&self) -> usize {
        self.frame.height()
    }

    pub fn is_empty(&self) -> bool {
        self.frame.height() == 0
    }

    /// Star identifiers in row order; null identifiers are skipped
    pub fn ids(&self) -> CompletenessResult<Vec<i64>> {
        Ok(self.frame.column(KIC_COLUMN)?.i64()?.iter().flatten().collect())
    }

    /// Mean stellar mass in M☉, NaN for an empty sample
    pub fn mean_mass(&self) -> CompletenessResult<f64> {
        Ok(self.frame.column(MASS_COLUMN)?.f64()?.mean().unwrap_or(f64::NAN))
    }

    /// Mean stellar radius in R☉, NaN for an empty sample
    pub fn mean_radius(&self) -> CompletenessResult<f64> {
        Ok(self.frame.column(RADIUS_COLUMN)?.f64()?.mean().unwrap_or(f64::NAN))
    }

    /// Stellar radius by identifier, first row wins on duplicates
    pub fn stellar_radii(&self) -> CompletenessResult<HashMap<i64, f64>> {
        let ids = self.frame.column(KIC_COLUMN)?.i64()?;
        let radii = self.frame.column(RADIUS_COLUMN)?.f64()?;

        let mut by_id = HashMap::with_capacity(self.len());
        for (id, radius) in ids.iter().zip(radii.iter()) {
            if let (Some(id), Some(radius)) = (id, radius) {
                by_id.entry(id).or_insert(radius);
            }
        }
        Ok(by_id)
    }

    /// Typed rows of the sample; rows with null required values are skipped
    pub fn records(&self) -> CompletenessResult<Vec<StarRecord>> {
        let ids = self.frame.column(KIC_COLUMN)?.i64()?;
        let teff = self.frame.column(TEFF_COLUMN)?.f64()?;
        let logg = self.frame.column(LOGG_COLUMN)?.f64()?;
        let mass = self.frame.column(MASS_COLUMN)?.f64()?;
        let radius = self.frame.column(RADIUS_COLUMN)?.f64()?;

        let records = (0..self.len())
            .filter_map(|i| {
                Some(StarRecord::new(
                    ids.get(i)?,
                    teff.get(i)?,
                    logg.get(i)?,
                    mass.get(i)?,
                    radius.get(i)?,
                ))
            })
            .collect();
        Ok(records)
    }
}

/// Dwarf/giant boundary in log g as a function of effective temperature
pub fn dwarf_boundary_logg(teff: f64) -> f64 {
    (1.0 / 4.671) * ((teff - 6300.0) / -67.172).atan() + 3.876
}

/// `true` when the star sits strictly above the dwarf boundary
pub fn is_dwarf(teff: f64, logg: f64) -> bool {
    logg > dwarf_boundary_logg(teff)
}

fn mask_frame(frame: &DataFrame, mask: Vec<bool>) -> CompletenessResult<DataFrame> {
    let mask = BooleanChunked::from_slice("mask".into(), &mask);
    Ok(frame.filter(&mask)?)
}

/// Keep only stars that have an entry in the detection-metrics archive
pub fn filter_by_archive(
    frame: &DataFrame,
    archive: &DetectionArchive,
) -> CompletenessResult<DataFrame> {
    let mask = frame
        .column(KIC_COLUMN)?
        .i64()?
        .iter()
        .map(|id| id.is_some_and(|id| archive.contains(id)))
        .collect();
    mask_frame(frame, mask)
}

/// Keep only stars above the dwarf boundary in (Teff, log g)
pub fn filter_dwarfs(frame: &DataFrame) -> CompletenessResult<DataFrame> {
    let teff = frame.column(TEFF_COLUMN)?.f64()?;
    let logg = frame.column(LOGG_COLUMN)?.f64()?;
    let mask = teff
        .iter()
        .zip(logg.iter())
        .map(|(t, g)| match (t, g) {
            (Some(t), Some(g)) => is_dwarf(t, g),
            _ => false,
        })
        .collect();
    mask_frame(frame, mask)
}

/// Keep rows where `low <= frame[field] < high`
pub fn filter_by_range(
    frame: &DataFrame,
    field: &str,
    range: &ParameterRange,
) -> CompletenessResult<DataFrame> {
    if !has_column(frame, field) {
        return Err(CompletenessError::UnknownField(field.to_string()));
    }

    let values = frame.column(field)?.cast(&DataType::Float64)?;
    let mask = values
        .f64()?
        .iter()
        .map(|v| v.is_some_and(|v| range.contains(v)))
        .collect();
    mask_frame(frame, mask)
}

/// Apply every range in turn (logical AND across fields)
pub fn filter_by_ranges(
    frame: &DataFrame,
    ranges: &BTreeMap<String, ParameterRange>,
) -> CompletenessResult<DataFrame> {
    let mut filtered = frame.clone();
    for (field, range) in ranges {
        if range.is_empty() {
            log::warn!(
                "Range for '{}' is empty: [{}, {}) selects no stars",
                field,
                range.low,
                range.high
            );
        }
        filtered = filter_by_range(&filtered, field, range)?;
    }
    Ok(filtered)
}

/// Select the stellar sample: archive join, optional dwarf cut, then parameter ranges.
///
/// Range field names are validated first, so an unknown field fails before any
/// filtering work. An empty result is not an error.
pub fn select_sample(
    catalog: &StellarCatalog,
    archive: &DetectionArchive,
    selection: &SampleSelection,
) -> CompletenessResult<(StellarSample, SampleDiagnostics)> {
    selection.validate(catalog)?;

    let mut diagnostics = SampleDiagnostics {
        catalog_size: catalog.len(),
        ..Default::default()
    };

    let joined = filter_by_archive(catalog.frame(), archive)?;
    diagnostics.with_detection_metrics = joined.height();

    let dwarfs = if selection.dwarf_cut {
        filter_dwarfs(&joined)?
    } else {
        joined
    };
    diagnostics.after_dwarf_cut = dwarfs.height();

    let selected = filter_by_ranges(&dwarfs, &selection.ranges)?;
    diagnostics.after_ranges = selected.height();

    log::info!(
        "Stellar sample: {} catalog stars, {} with detection metrics, {} after dwarf cut, {} after ranges",
        diagnostics.catalog_size,
        diagnostics.with_detection_metrics,
        diagnostics.after_dwarf_cut,
        diagnostics.after_ranges
    );
    if selected.height() == 0 {
        log::warn!("Stellar sample is empty; downstream maps will be NaN");
    }

    Ok((StellarSample::new(selected), diagnostics))
}
