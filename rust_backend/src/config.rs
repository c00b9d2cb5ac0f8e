//! Run configuration file support.
//!
//! A run is described by a TOML file naming the input files, the sample selection,
//! the fit settings, the constants preset and where to write the result. Every section
//! is optional and falls back to the defaults below.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::algorithms::LMConfig;
use crate::core::{CompletenessError, CompletenessResult, PhysicalConstants};
use crate::services::{CompletenessRequest, ParameterMode};
use crate::transformations::{ParameterRange, SampleSelection};

/// Run configuration from file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(default)]
    pub inputs: InputSettings,
    #[serde(default)]
    pub selection: SelectionSettings,
    #[serde(default)]
    pub fit: FitSettings,
    #[serde(default)]
    pub constants: ConstantsSettings,
    #[serde(default)]
    pub output: OutputSettings,
}

/// Input file locations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputSettings {
    #[serde(default = "default_stellar_catalog")]
    pub stellar_catalog: PathBuf,
    #[serde(default = "default_detection_archive")]
    pub detection_archive: Vec<PathBuf>,
    #[serde(default = "default_injection_catalog")]
    pub injection_catalog: PathBuf,
    #[serde(default = "default_recovered_tces")]
    pub recovered_tces: PathBuf,
}

/// Stellar sample selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionSettings {
    #[serde(default = "default_dwarf_cut")]
    pub dwarf_cut: bool,
    #[serde(default)]
    pub score_cut: f64,
    #[serde(default)]
    pub ranges: BTreeMap<String, ParameterRange>,
}

/// Vetting fit settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitSettings {
    #[serde(default)]
    pub parameter_mode: ParameterMode,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
}

/// Physical constants selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstantsSettings {
    #[serde(default = "default_preset")]
    pub preset: String,
}

/// Output settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutputSettings {
    #[serde(default)]
    pub verbose: bool,
    #[serde(default)]
    pub return_components: bool,
    /// JSON destination; stdout when unset
    #[serde(default)]
    pub path: Option<PathBuf>,
}

fn default_stellar_catalog() -> PathBuf {
    PathBuf::from("files/stellar_catalog.csv")
}

fn default_detection_archive() -> Vec<PathBuf> {
    vec![
        PathBuf::from("files/detection_efficiency_part1.json"),
        PathBuf::from("files/detection_efficiency_part2.json"),
    ]
}

fn default_injection_catalog() -> PathBuf {
    PathBuf::from("files/kplr_dr25_inj1_tces.txt")
}

fn default_recovered_tces() -> PathBuf {
    PathBuf::from("files/DR25-Injected-Recovered-OnTarget-Planet-TCEs.txt")
}

fn default_dwarf_cut() -> bool {
    true
}

fn default_max_iterations() -> usize {
    LMConfig::default().max_iterations
}

fn default_preset() -> String {
    PhysicalConstants::ASTROPY_IAU2015.to_string()
}

impl Default for InputSettings {
    fn default() -> Self {
        Self {
            stellar_catalog: default_stellar_catalog(),
            detection_archive: default_detection_archive(),
            injection_catalog: default_injection_catalog(),
            recovered_tces: default_recovered_tces(),
        }
    }
}

impl Default for SelectionSettings {
    fn default() -> Self {
        Self {
            dwarf_cut: default_dwarf_cut(),
            score_cut: 0.0,
            ranges: BTreeMap::new(),
        }
    }
}

impl Default for FitSettings {
    fn default() -> Self {
        Self {
            parameter_mode: ParameterMode::default(),
            max_iterations: default_max_iterations(),
        }
    }
}

impl Default for ConstantsSettings {
    fn default() -> Self {
        Self {
            preset: default_preset(),
        }
    }
}

impl InputSettings {
    /// Make relative input paths relative to `base` instead of the working directory.
    pub fn resolve_relative_to(&mut self, base: &Path) {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        resolve(&mut self.stellar_catalog);
        self.detection_archive.iter_mut().for_each(resolve);
        resolve(&mut self.injection_catalog);
        resolve(&mut self.recovered_tces);
    }
}

impl RunConfig {
    /// Parse a configuration from TOML text. Paths are left as written.
    pub fn from_toml_str(content: &str) -> CompletenessResult<Self> {
        toml::from_str(content).map_err(|e| {
            CompletenessError::Configuration(format!("Failed to parse config file: {}", e))
        })
    }

    /// Load a configuration from a TOML file.
    ///
    /// Relative input paths are resolved against the directory holding the file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> CompletenessResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            CompletenessError::Configuration(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;

        let mut config = Self::from_toml_str(&content)?;
        if let Some(base) = path.parent() {
            config.inputs.resolve_relative_to(base);
        }
        Ok(config)
    }

    /// Load `completeness.toml` from the current directory or `rust_backend/`.
    pub fn from_default_location() -> CompletenessResult<Self> {
        let search_paths = [
            PathBuf::from("completeness.toml"),
            PathBuf::from("rust_backend/completeness.toml"),
        ];

        for path in search_paths {
            if path.exists() {
                return Self::from_file(&path);
            }
        }

        Err(CompletenessError::Configuration(
            "No completeness.toml found in standard locations".to_string(),
        ))
    }

    /// Build the core request described by this configuration.
    pub fn to_request(&self) -> CompletenessResult<CompletenessRequest> {
        let constants = PhysicalConstants::from_preset(&self.constants.preset)?;
        Ok(CompletenessRequest {
            selection: SampleSelection {
                dwarf_cut: self.selection.dwarf_cut,
                ranges: self.selection.ranges.clone(),
            },
            score_cut: self.selection.score_cut,
            return_components: self.output.return_components,
            parameter_mode: self.fit.parameter_mode,
            constants,
            fit: LMConfig {
                max_iterations: self.fit.max_iterations,
                ..LMConfig::default()
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"
[inputs]
stellar_catalog = "data/stars.csv"
detection_archive = ["data/det1.json", "data/det2.json"]
injection_catalog = "data/inj.txt"
recovered_tces = "data/recovered.txt"

[selection]
dwarf_cut = false
score_cut = 0.9
[selection.ranges]
Teff = [3900.0, 7300.0]

[fit]
parameter_mode = "independent"
max_iterations = 200

[constants]
preset = "qtty_nominal"

[output]
verbose = true
return_components = true
path = "out.json"
"#;

    #[test]
    fn test_parse_full_config() {
        let config = RunConfig::from_toml_str(FULL).unwrap();
        assert_eq!(config.inputs.detection_archive.len(), 2);
        assert!(!config.selection.dwarf_cut);
        assert_eq!(config.selection.ranges["Teff"], ParameterRange::new(3900.0, 7300.0));
        assert_eq!(config.fit.parameter_mode, ParameterMode::Independent);
        assert_eq!(config.output.path, Some(PathBuf::from("out.json")));

        let request = config.to_request().unwrap();
        assert_eq!(request.score_cut, 0.9);
        assert_eq!(request.fit.max_iterations, 200);
        assert_eq!(request.constants.version, PhysicalConstants::QTTY_NOMINAL);
        assert!(request.return_components);
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = RunConfig::from_toml_str("").unwrap();
        assert!(config.selection.dwarf_cut);
        assert_eq!(config.fit.max_iterations, 500);
        assert_eq!(config.constants.preset, PhysicalConstants::ASTROPY_IAU2015);
        assert!(config.output.path.is_none());
        assert_eq!(config.to_request().unwrap(), CompletenessRequest::default());
    }

    #[test]
    fn test_bad_preset_is_configuration_error() {
        let config = RunConfig::from_toml_str("[constants]\npreset = \"cgs\"").unwrap();
        assert!(config.to_request().unwrap_err().is_configuration_error());
    }

    #[test]
    fn test_bad_toml() {
        let err = RunConfig::from_toml_str("[selection\nscore_cut = ").unwrap_err();
        assert!(err.is_configuration_error());
    }

    #[test]
    fn test_relative_paths_resolve_against_config_dir() {
        let mut inputs = InputSettings::default();
        inputs.injection_catalog = PathBuf::from("/abs/inj.txt");
        inputs.resolve_relative_to(Path::new("/runs/a"));
        assert_eq!(inputs.stellar_catalog, PathBuf::from("/runs/a/files/stellar_catalog.csv"));
        assert_eq!(inputs.injection_catalog, PathBuf::from("/abs/inj.txt"));
    }
}
