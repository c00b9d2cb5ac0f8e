//! Core domain models for completeness estimation.
//!
//! This module defines the fundamental data structures shared by every stage of the
//! pipeline: the period–radius grid, the stellar and injection records, the
//! detection-metrics archive, the physical constants table and the error type.

pub mod archive;
pub mod constants;
pub mod domain;
pub mod error;
pub mod grid;

pub use archive::DetectionArchive;
pub use constants::{PhysicalConstants, RadiusConversion};
pub use domain::{Disposition, InjectionRecord, RecoveredTces, StarRecord};
pub use error::{CompletenessError, CompletenessResult};
pub use grid::PeriodRadiusGrid;
