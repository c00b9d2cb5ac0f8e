//! Stellar catalog filtering.
//!
//! This module selects the stellar sample that every downstream map is built from:
//! an inner join with the detection-metrics archive, an optional dwarf cut in
//! (Teff, log g) and any number of half-open parameter ranges.
//!
//! # Example
//!
//! ```no_run
//! use kepler_completeness::core::{CompletenessResult, DetectionArchive};
//! use kepler_completeness::transformations::{select_sample, SampleSelection, StellarCatalog};
//!
//! # fn example(catalog: &StellarCatalog, archive: &DetectionArchive) -> CompletenessResult<()> {
//! let selection = SampleSelection::default().with_range("Teff", 3900.0, 7300.0);
//! let (sample, diagnostics) = select_sample(catalog, archive, &selection)?;
//! println!("{} of {} stars selected", sample.len(), diagnostics.catalog_size);
//! # Ok(())
//! # }
//! ```

pub mod filtering;

pub use filtering::{
    dwarf_boundary_logg, filter_by_archive, filter_by_range, filter_by_ranges, filter_dwarfs,
    is_dwarf, select_sample, ParameterRange, SampleDiagnostics, SampleSelection, StellarCatalog,
    StellarSample,
};
