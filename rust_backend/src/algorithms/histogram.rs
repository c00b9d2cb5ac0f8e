//! Fixed-edge histograms and safe bin ratios.
//!
//! Binning follows the usual numerical convention: every bin is half-open
//! `[e_i, e_{i+1})` except the last, which also includes its right edge.

use ndarray::{Array1, Array2, ArrayView1, Zip};

/// Index of the bin containing `x`, or `None` if `x` is outside the edges or NaN.
///
/// # Examples
///
/// ```
/// use kepler_completeness::algorithms::histogram::bin_index;
///
/// let edges = [1.0, 2.0, 4.0];
/// assert_eq!(bin_index(&edges, 1.0), Some(0));
/// assert_eq!(bin_index(&edges, 2.0), Some(1));
/// assert_eq!(bin_index(&edges, 4.0), Some(1));
/// assert_eq!(bin_index(&edges, 4.5), None);
/// ```
pub fn bin_index(edges: &[f64], x: f64) -> Option<usize> {
    let n = edges.len();
    if n < 2 || x.is_nan() || x < edges[0] || x > edges[n - 1] {
        return None;
    }
    // number of edges <= x; at least 1 because x >= edges[0]
    let upper = edges.partition_point(|&e| e <= x);
    Some((upper - 1).min(n - 2))
}

/// Counts of `values` in the bins defined by `edges`.
pub fn histogram1d(values: &[f64], edges: ArrayView1<f64>) -> Array1<f64> {
    let edges = edges.to_vec();
    let mut counts = Array1::zeros(edges.len().saturating_sub(1));
    for &v in values {
        if let Some(i) = bin_index(&edges, v) {
            counts[i] += 1.0;
        }
    }
    counts
}

/// Counts of `(x, y)` pairs on the cells of two edge arrays, indexed `[x_bin, y_bin]`.
///
/// Pairs are zipped, so extra trailing elements in the longer slice are ignored.
pub fn histogram2d(
    xs: &[f64],
    ys: &[f64],
    x_edges: ArrayView1<f64>,
    y_edges: ArrayView1<f64>,
) -> Array2<f64> {
    let x_edges = x_edges.to_vec();
    let y_edges = y_edges.to_vec();
    let mut counts = Array2::zeros((
        x_edges.len().saturating_sub(1),
        y_edges.len().saturating_sub(1),
    ));
    for (&x, &y) in xs.iter().zip(ys) {
        if let (Some(i), Some(j)) = (bin_index(&x_edges, x), bin_index(&y_edges, y)) {
            counts[[i, j]] += 1.0;
        }
    }
    counts
}

/// `num / den`, NaN when the denominator is zero.
pub fn safe_ratio(num: f64, den: f64) -> f64 {
    if den == 0.0 {
        f64::NAN
    } else {
        num / den
    }
}

/// Elementwise [`safe_ratio`] over two arrays of the same shape.
pub fn safe_divide<D: ndarray::Dimension>(
    num: &ndarray::Array<f64, D>,
    den: &ndarray::Array<f64, D>,
) -> ndarray::Array<f64, D> {
    Zip::from(num).and(den).map_collect(|&n, &d| safe_ratio(n, d))
}

/// Per-bin uncertainty on `reliable / all`.
///
/// Bins with fewer than one reliable count fall back to `1 / all`; the rest use the
/// Poisson scaling `efficiency / sqrt(reliable)`.
pub fn efficiency_uncertainty(
    reliable: &Array2<f64>,
    all: &Array2<f64>,
    efficiency: &Array2<f64>,
) -> Array2<f64> {
    Zip::from(reliable)
        .and(all)
        .and(efficiency)
        .map_collect(|&k, &n, &eff| {
            if k.sqrt() < 1.0 {
                safe_ratio(1.0, n)
            } else {
                eff / k.sqrt()
            }
        })
}
