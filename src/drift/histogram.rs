//! Fixed-width histograms with reusable bin edges

use crate::error::{DriftError, Result};
use serde::{Deserialize, Serialize};

/// Default number of bins for baseline histograms
pub const DEFAULT_BINS: usize = 20;

/// Bin counts together with the edges that produced them.
///
/// `edges.len() == counts.len() + 1`. Every bin is half-open `[lo, hi)` except
/// the last, which also includes its right edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Histogram {
    pub counts: Vec<u64>,
    pub edges: Vec<f64>,
}

impl Histogram {
    /// Bin `values` against previously recorded edges.
    ///
    /// Values outside `[edges[0], edges[last]]` and NaN are not counted, so a
    /// window compared against a baseline always uses the baseline's binning.
    pub fn from_edges(values: &[f64], edges: &[f64]) -> Result<Self> {
        validate_edges(edges)?;

        let n_bins = edges.len() - 1;
        let lo = edges[0];
        let hi = edges[n_bins];
        let mut counts = vec![0u64; n_bins];

        for &value in values {
            if value.is_nan() || value < lo || value > hi {
                continue;
            }
            // First edge strictly greater than value; the bin sits just before it
            let idx = edges.partition_point(|&e| e <= value);
            let bin = idx.saturating_sub(1).min(n_bins - 1);
            counts[bin] += 1;
        }

        Ok(Self { counts, edges: edges.to_vec() })
    }

    pub fn n_bins(&self) -> usize {
        self.counts.len()
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// Counts as floats, the form the divergence functions consume
    pub fn weights(&self) -> Vec<f64> {
        self.counts.iter().map(|&c| c as f64).collect()
    }
}

/// Compute a fixed-width histogram.
///
/// Range bounds default to the finite min/max of `values`. A zero-width range
/// is widened by 0.5 on each side so a constant column still gets `bins` bins.
pub fn compute_histogram(
    values: &[f64],
    bins: usize,
    range_min: Option<f64>,
    range_max: Option<f64>,
) -> Result<Histogram> {
    if bins == 0 {
        return Err(DriftError::InvalidInput("histogram needs at least one bin".to_string()));
    }

    let finite = values.iter().copied().filter(|v| v.is_finite());
    let (data_min, data_max) = finite.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });

    let lo = match range_min {
        Some(v) => v,
        None if data_min.is_finite() => data_min,
        None => {
            return Err(DriftError::InvalidInput(
                "cannot derive histogram range from empty data".to_string(),
            ))
        }
    };
    let hi = match range_max {
        Some(v) => v,
        None if data_max.is_finite() => data_max,
        None => {
            return Err(DriftError::InvalidInput(
                "cannot derive histogram range from empty data".to_string(),
            ))
        }
    };

    if !lo.is_finite() || !hi.is_finite() || lo > hi {
        return Err(DriftError::InvalidInput(format!(
            "invalid histogram range [{}, {}]",
            lo, hi
        )));
    }

    let (lo, hi) = if lo == hi { (lo - 0.5, hi + 0.5) } else { (lo, hi) };
    let width = (hi - lo) / bins as f64;
    let mut edges: Vec<f64> = (0..=bins).map(|i| lo + width * i as f64).collect();
    edges[bins] = hi;

    Histogram::from_edges(values, &edges)
}

fn validate_edges(edges: &[f64]) -> Result<()> {
    if edges.len() < 2 {
        return Err(DriftError::InvalidInput(format!(
            "bin edges need at least 2 entries, got {}",
            edges.len()
        )));
    }
    if edges.iter().any(|e| !e.is_finite()) {
        return Err(DriftError::InvalidInput("bin edges must be finite".to_string()));
    }
    if edges.windows(2).any(|w| w[0] > w[1]) {
        return Err(DriftError::InvalidInput("bin edges must be non-decreasing".to_string()));
    }
    Ok(())
}
