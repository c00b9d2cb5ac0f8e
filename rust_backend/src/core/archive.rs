//! Per-star detection probabilities over the period–radius grid.

use std::collections::HashMap;

use ndarray::{concatenate, Array3, ArrayView2, Axis};

use super::error::{CompletenessError, CompletenessResult};

/// Detection-metrics archive: one `(nP × nR)` probability slice per star.
///
/// The archive may arrive in several physical chunks; [`DetectionArchive::concatenate`]
/// joins them into the logical whole. When an identifier repeats, lookups resolve to
/// its first occurrence.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionArchive {
    ids: Vec<i64>,
    probabilities: Array3<f64>,
    index: HashMap<i64, usize>,
}

impl DetectionArchive {
    /// Wraps identifiers and a `(star, period, radius)` probability cube.
    pub fn new(ids: Vec<i64>, probabilities: Array3<f64>) -> CompletenessResult<Self> {
        if ids.len() != probabilities.len_of(Axis(0)) {
            return Err(CompletenessError::ShapeMismatch(format!(
                "archive has {} identifiers but {} probability slices",
                ids.len(),
                probabilities.len_of(Axis(0))
            )));
        }

        let mut index = HashMap::with_capacity(ids.len());
        for (row, id) in ids.iter().enumerate() {
            index.entry(*id).or_insert(row);
        }

        Ok(Self {
            ids,
            probabilities,
            index,
        })
    }

    /// Joins archive chunks in order. All chunks must share the same grid shape.
    pub fn concatenate(chunks: Vec<DetectionArchive>) -> CompletenessResult<Self> {
        let Some(first) = chunks.first() else {
            return Self::new(Vec::new(), Array3::zeros((0, 0, 0)));
        };
        let shape = first.grid_shape();
        if let Some(bad) = chunks.iter().find(|c| c.grid_shape() != shape) {
            return Err(CompletenessError::ShapeMismatch(format!(
                "archive chunks disagree on grid shape: {:?} vs {:?}",
                shape,
                bad.grid_shape()
            )));
        }

        let ids: Vec<i64> = chunks.iter().flat_map(|c| c.ids.iter().copied()).collect();
        let views: Vec<_> = chunks.iter().map(|c| c.probabilities.view()).collect();
        let probabilities = concatenate(Axis(0), &views).map_err(|e| {
            CompletenessError::ShapeMismatch(format!("failed to join archive chunks: {}", e))
        })?;

        Self::new(ids, probabilities)
    }

    pub fn ids(&self) -> &[i64] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn contains(&self, id: i64) -> bool {
        self.index.contains_key(&id)
    }

    /// Shape of each per-star slice, `(nP, nR)`.
    pub fn grid_shape(&self) -> (usize, usize) {
        let (_, p, r) = self.probabilities.dim();
        (p, r)
    }

    /// Probability slice for one star.
    pub fn slice(&self, id: i64) -> Option<ArrayView2<'_, f64>> {
        self.index
            .get(&id)
            .map(|&row| self.probabilities.index_axis(Axis(0), row))
    }
}
