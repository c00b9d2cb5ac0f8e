//! Domain records for stars and injected transit signals.
//!
//! These are the row types of the external catalogs. The stellar catalog is held as a
//! table (see [`crate::transformations::filtering::StellarCatalog`]); `StarRecord` is the
//! typed row used to build one from memory.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// One row of the stellar catalog.
///
/// Field names on the wire follow the Gaia–Kepler stellar properties catalog
/// (`KIC`, `Teff`, `logg`, `Mass`, `Rad`).
///
/// # Examples
///
/// ```
/// use kepler_completeness::core::StarRecord;
///
/// let sun = StarRecord::new(757450, 5772.0, 4.44, 1.0, 1.0);
/// assert_eq!(sun.kic, 757450);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StarRecord {
    #[serde(rename = "KIC")]
    pub kic: i64,
    /// Effective temperature in K
    #[serde(rename = "Teff")]
    pub teff: f64,
    /// Surface gravity, log10(cgs)
    pub logg: f64,
    /// Mass in solar masses
    #[serde(rename = "Mass")]
    pub mass: f64,
    /// Radius in solar radii
    #[serde(rename = "Rad")]
    pub radius: f64,
}

impl StarRecord {
    pub fn new(kic: i64, teff: f64, logg: f64, mass: f64, radius: f64) -> Self {
        Self {
            kic,
            teff,
            logg,
            mass,
            radius,
        }
    }
}

/// Vetting outcome of a recovered injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Disposition {
    #[serde(rename = "PC")]
    Candidate,
    #[serde(rename = "FP")]
    FalsePositive,
}

impl Disposition {
    pub fn is_candidate(&self) -> bool {
        matches!(self, Disposition::Candidate)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Disposition::Candidate => "PC",
            Disposition::FalsePositive => "FP",
        }
    }
}

impl FromStr for Disposition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "PC" => Ok(Disposition::Candidate),
            "FP" => Ok(Disposition::FalsePositive),
            other => Err(format!("Invalid disposition: {}. Must be 'PC' or 'FP'", other)),
        }
    }
}

impl fmt::Display for Disposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One injected synthetic transit and its recovery outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InjectionRecord {
    /// Composite TCE key, `<kic>-<planet number>`
    pub tce_id: String,
    pub kic: i64,
    /// Orbital period in days
    pub period: f64,
    /// Planet-to-star radius ratio
    pub radius_ratio: f64,
    pub disposition: Disposition,
    /// Vetting score in [0, 1]
    pub score: f64,
}

/// Extracts the KIC from a composite TCE key such as `001026032-01`.
pub fn kic_from_tce_id(tce_id: &str) -> Option<i64> {
    tce_id.split('-').next()?.trim().parse().ok()
}

/// Allow-list of injections that were recovered on target.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveredTces {
    ids: HashSet<String>,
}

impl RecoveredTces {
    pub fn new<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ids: ids.into_iter().map(Into::into).collect(),
        }
    }

    pub fn contains(&self, tce_id: &str) -> bool {
        self.ids.contains(tce_id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Host KICs named by the allow-list; malformed keys are skipped.
    pub fn kics(&self) -> HashSet<i64> {
        self.ids.iter().filter_map(|id| kic_from_tce_id(id)).collect()
    }
}

impl FromIterator<String> for RecoveredTces {
    fn from_iter<T: IntoIterator<Item = String>>(iter: T) -> Self {
        Self::new(iter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disposition_parse() {
        assert_eq!("PC".parse::<Disposition>().unwrap(), Disposition::Candidate);
        assert_eq!(" FP ".parse::<Disposition>().unwrap(), Disposition::FalsePositive);
        assert!("AFP".parse::<Disposition>().is_err());
        assert!(Disposition::Candidate.is_candidate());
        assert_eq!(Disposition::FalsePositive.to_string(), "FP");
    }

    #[test]
    fn test_kic_from_tce_id() {
        assert_eq!(kic_from_tce_id("001026032-01"), Some(1026032));
        assert_eq!(kic_from_tce_id("10000490-2"), Some(10000490));
        assert_eq!(kic_from_tce_id("abc-01"), None);
    }

    #[test]
    fn test_recovered_tces() {
        let list = RecoveredTces::new(["001026032-01", "001026032-02", "000757450-01"]);
        assert_eq!(list.len(), 3);
        assert!(list.contains("001026032-02"));
        assert!(!list.contains("001026032-03"));
        let kics = list.kics();
        assert_eq!(kics.len(), 2);
        assert!(kics.contains(&757450));
    }

    #[test]
    fn test_star_record_serde_names() {
        let star = StarRecord::new(1, 5800.0, 4.4, 1.0, 1.0);
        let json = serde_json::to_value(star).unwrap();
        assert_eq!(json["KIC"], 1);
        assert_eq!(json["Rad"], 1.0);
        assert_eq!(json["logg"], 4.4);
    }
}
