//! Input file loaders.
//!
//! This module turns the files named in a run configuration into the in-memory
//! survey inputs: the stellar catalog (CSV), the detection-metrics archive (JSON
//! chunks), the injected-TCE table and the recovered TCE list (plain text). The
//! core never reads files itself.
//!
//! # Example
//!
//! ```no_run
//! use kepler_completeness::io::StellarCatalogLoader;
//! use std::path::Path;
//!
//! let catalog = StellarCatalogLoader::load_from_csv(Path::new("files/stellar_catalog.csv"))
//!     .expect("Failed to load");
//! println!("Loaded {} stars", catalog.len());
//! ```

pub mod loaders;


pub use loaders::{
    DetectionArchiveLoader, InjectionCatalogLoader, RecoveredTcesLoader, StellarCatalogLoader,
    SurveyLoader,
};
