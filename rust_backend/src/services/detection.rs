//! Detection efficiency averaged over the stellar sample.

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::core::{CompletenessError, CompletenessResult, DetectionArchive, PeriodRadiusGrid};
use crate::transformations::StellarSample;

/// Mean per-star detection probability on the grid nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionEfficiencyMap {
    /// `(nP × nR)` map; NaN where no star has a finite probability
    pub efficiency: Array2<f64>,
    /// Mean stellar mass of the sample in M☉
    pub mean_mass: f64,
    /// Mean stellar radius of the sample in R☉
    pub mean_radius: f64,
    pub n_stars: usize,
}

/// Average the archive slices of every sample star, ignoring NaN entries.
///
/// The archive's per-star shape must equal the grid shape. Sample stars missing from
/// the archive are skipped; an empty sample gives an all-NaN map.
pub fn build_detection_map(
    sample: &StellarSample,
    archive: &DetectionArchive,
    grid: &PeriodRadiusGrid,
) -> CompletenessResult<DetectionEfficiencyMap> {
    let shape = grid.shape();
    if !archive.is_empty() && archive.grid_shape() != shape {
        return Err(CompletenessError::ShapeMismatch(format!(
            "detection archive slices are {:?} but the grid is {:?}",
            archive.grid_shape(),
            shape
        )));
    }

    let mut sums = Array2::<f64>::zeros(shape);
    let mut counts = Array2::<f64>::zeros(shape);
    let mut contributing = 0usize;

    for id in sample.ids()? {
        let Some(slice) = archive.slice(id) else {
            continue;
        };
        contributing += 1;
        ndarray::Zip::from(&mut sums)
            .and(&mut counts)
            .and(&slice)
            .for_each(|s, c, &p| {
                if !p.is_nan() {
                    *s += p;
                    *c += 1.0;
                }
            });
    }

    let efficiency = ndarray::Zip::from(&sums)
        .and(&counts)
        .map_collect(|&s, &c| if c > 0.0 { s / c } else { f64::NAN });

    let out_of_range = efficiency
        .iter()
        .filter(|v| v.is_finite() && !(0.0..=1.0).contains(*v))
        .count();
    if out_of_range > 0 {
        log::warn!(
            "{} detection efficiency bins fall outside [0, 1]; check the archive",
            out_of_range
        );
    }

    log::info!(
        "Detection map: {} of {} sample stars found in the archive",
        contributing,
        sample.len()
    );

    Ok(DetectionEfficiencyMap {
        efficiency,
        mean_mass: sample.mean_mass()?,
        mean_radius: sample.mean_radius()?,
        n_stars: sample.len(),
    })
}
