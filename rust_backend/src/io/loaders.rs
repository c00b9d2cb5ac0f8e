use anyhow::{bail, Context, Result};
use ndarray::Array3;
use polars::prelude::*;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::InputSettings;
use crate::core::{DetectionArchive, Disposition, InjectionRecord, RecoveredTces};
use crate::services::SurveyData;
use crate::transformations::StellarCatalog;

/// Loads the stellar properties catalog from CSV
pub struct StellarCatalogLoader;

impl StellarCatalogLoader {
    /// Load a CSV with a header row containing at least `KIC, Teff, logg, Mass, Rad`
    pub fn load_from_csv(csv_path: &Path) -> Result<StellarCatalog> {
        let df = CsvReadOptions::default()
            .with_has_header(true)
            .try_into_reader_with_file_path(Some(csv_path.into()))
            .with_context(|| format!("Failed to open stellar catalog {}", csv_path.display()))?
            .finish()
            .context("Failed to parse CSV into DataFrame")?;

        let catalog =
            StellarCatalog::from_dataframe(df).context("Stellar catalog has an invalid schema")?;
        log::info!(
            "Loaded {} stars from {}",
            catalog.len(),
            csv_path.display()
        );
        Ok(catalog)
    }
}

/// One physical chunk of the detection-metrics archive
#[derive(Debug, Deserialize)]
struct ArchiveChunkJson {
    kid: Vec<i64>,
    /// star × period × radius; `null` marks a missing probability
    det3d: Vec<Vec<Vec<Option<f64>>>>,
}

impl ArchiveChunkJson {
    fn into_archive(self) -> Result<DetectionArchive> {
        let n_stars = self.det3d.len();
        let n_period = self.det3d.first().map_or(0, |s| s.len());
        let n_radius = self
            .det3d
            .first()
            .and_then(|s| s.first())
            .map_or(0, |r| r.len());

        let mut values = Vec::with_capacity(n_stars * n_period * n_radius);
        for (star, slice) in self.det3d.into_iter().enumerate() {
            if slice.len() != n_period || slice.iter().any(|row| row.len() != n_radius) {
                bail!(
                    "det3d slice {} is ragged; expected {} x {}",
                    star,
                    n_period,
                    n_radius
                );
            }
            values.extend(slice.into_iter().flatten().map(|v| v.unwrap_or(f64::NAN)));
        }

        let cube = Array3::from_shape_vec((n_stars, n_period, n_radius), values)
            .context("det3d does not form a dense cube")?;
        Ok(DetectionArchive::new(self.kid, cube)?)
    }
}

/// Loads detection-metrics archive chunks from JSON
pub struct DetectionArchiveLoader;

impl DetectionArchiveLoader {
    /// Parse one chunk from a JSON string
    pub fn load_chunk_str(json_str: &str) -> Result<DetectionArchive> {
        let chunk: ArchiveChunkJson =
            serde_json::from_str(json_str).context("Failed to parse detection archive JSON")?;
        chunk.into_archive()
    }

    /// Load one chunk from a JSON file
    pub fn load_chunk(path: &Path) -> Result<DetectionArchive> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read detection archive {}", path.display()))?;
        Self::load_chunk_str(&content)
            .with_context(|| format!("Invalid detection archive chunk {}", path.display()))
    }

    /// Load and concatenate chunks in the order given
    pub fn load_chunks(paths: &[PathBuf]) -> Result<DetectionArchive> {
        let chunks = paths
            .iter()
            .map(|p| Self::load_chunk(p))
            .collect::<Result<Vec<_>>>()?;
        let archive = DetectionArchive::concatenate(chunks)
            .context("Failed to concatenate detection archive chunks")?;
        log::info!(
            "Loaded detection metrics for {} stars from {} chunk(s)",
            archive.len(),
            paths.len()
        );
        Ok(archive)
    }
}

const INJECTION_COLUMNS: [&str; 6] = ["TCE_ID", "KIC", "Disp", "Score", "period", "Rp/Rs"];

/// Loads the injected-TCE table (whitespace-delimited text)
pub struct InjectionCatalogLoader;

impl InjectionCatalogLoader {
    /// Parse the table from a string.
    ///
    /// `#` lines are comments. The first other non-blank line is the header; it must name
    /// `TCE_ID KIC Disp Score period Rp/Rs`, in any order, and may name more columns.
    pub fn load_from_str(content: &str) -> Result<Vec<InjectionRecord>> {
        let mut lines = content
            .lines()
            .enumerate()
            .map(|(i, line)| (i + 1, line.trim()))
            .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'));

        let Some((_, header)) = lines.next() else {
            bail!("Injection catalog is empty");
        };
        let names: Vec<&str> = header.split_whitespace().collect();
        let mut index = [0usize; INJECTION_COLUMNS.len()];
        for (slot, column) in index.iter_mut().zip(INJECTION_COLUMNS) {
            *slot = names
                .iter()
                .position(|n| *n == column)
                .with_context(|| format!("Injection catalog header is missing column '{}'", column))?;
        }
        let [tce, kic, disp, score, period, ratio] = index;

        let mut records = Vec::new();
        for (line_no, line) in lines {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < names.len() {
                bail!(
                    "line {}: expected {} columns, found {}",
                    line_no,
                    names.len(),
                    fields.len()
                );
            }

            let parse_f64 = |i: usize, what: &str| -> Result<f64> {
                fields[i]
                    .parse::<f64>()
                    .with_context(|| format!("line {}: invalid {} '{}'", line_no, what, fields[i]))
            };

            records.push(InjectionRecord {
                tce_id: fields[tce].to_string(),
                kic: fields[kic]
                    .parse()
                    .with_context(|| format!("line {}: invalid KIC '{}'", line_no, fields[kic]))?,
                period: parse_f64(period, "period")?,
                radius_ratio: parse_f64(ratio, "Rp/Rs")?,
                disposition: fields[disp]
                    .parse::<Disposition>()
                    .map_err(anyhow::Error::msg)
                    .with_context(|| format!("line {}", line_no))?,
                score: parse_f64(score, "Score")?,
            });
        }

        Ok(records)
    }

    pub fn load_from_file(path: &Path) -> Result<Vec<InjectionRecord>> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read injection catalog {}", path.display()))?;
        let records = Self::load_from_str(&content)
            .with_context(|| format!("Failed to parse injection catalog {}", path.display()))?;
        log::info!("Loaded {} injections from {}", records.len(), path.display());
        Ok(records)
    }
}

/// Loads the recovered on-target TCE list, one id per line
pub struct RecoveredTcesLoader;

impl RecoveredTcesLoader {
    pub fn load_from_str(content: &str) -> RecoveredTces {
        content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .filter_map(|line| line.split_whitespace().next())
            .map(str::to_string)
            .collect()
    }

    pub fn load_from_file(path: &Path) -> Result<RecoveredTces> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read recovered TCE list {}", path.display()))?;
        Ok(Self::load_from_str(&content))
    }
}

/// Loads every survey input named by a run configuration
pub struct SurveyLoader;

impl SurveyLoader {
    pub fn load(inputs: &InputSettings) -> Result<SurveyData> {
        let catalog = StellarCatalogLoader::load_from_csv(&inputs.stellar_catalog)?;
        let archive = DetectionArchiveLoader::load_chunks(&inputs.detection_archive)?;
        let injections = InjectionCatalogLoader::load_from_file(&inputs.injection_catalog)?;
        let recovered = RecoveredTcesLoader::load_from_file(&inputs.recovered_tces)?;

        Ok(SurveyData::new(catalog, archive, injections, recovered))
    }
}
