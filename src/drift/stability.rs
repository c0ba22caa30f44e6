//! Explanation stability: cosine similarity between attribution vectors

use crate::drift::Severity;
use ndarray::Array1;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Vectors taken from each side, bounding the pairwise work at 100 x 100
pub const MAX_EXPLANATION_VECTORS: usize = 100;
pub const DEFAULT_STABILITY_THRESHOLD: f64 = 0.8;
/// Average similarity below this is critical regardless of threshold
pub const CRITICAL_SIMILARITY: f64 = 0.6;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExplanationStability {
    pub stable: bool,
    pub avg_similarity: f64,
    pub severity: Severity,
    /// Number of vector pairs that contributed to the average
    pub compared_pairs: usize,
}

impl Default for ExplanationStability {
    fn default() -> Self {
        Self {
            stable: true,
            avg_similarity: 1.0,
            severity: Severity::Stable,
            compared_pairs: 0,
        }
    }
}

/// Average pairwise cosine similarity between baseline and current explanations.
///
/// Pairs involving a zero-norm vector or vectors of different length are left
/// out of the average. With no valid pair the result is stable at 1.0.
pub fn compute_explanation_stability(
    baseline: &[Array1<f64>],
    current: &[Array1<f64>],
    threshold: f64,
) -> ExplanationStability {
    let current: Vec<(&Array1<f64>, f64)> = current
        .iter()
        .take(MAX_EXPLANATION_VECTORS)
        .map(|v| (v, v.dot(v).sqrt()))
        .filter(|(_, norm)| *norm > 0.0)
        .collect();

    let (sum, pairs) = baseline
        .par_iter()
        .take(MAX_EXPLANATION_VECTORS)
        .map(|base| {
            let base_norm = base.dot(base).sqrt();
            if base_norm.is_nan() || base_norm == 0.0 {
                return (0.0, 0usize);
            }
            current
                .iter()
                .filter(|(cur, _)| cur.len() == base.len())
                .fold((0.0, 0usize), |(sum, n), (cur, cur_norm)| {
                    (sum + base.dot(*cur) / (base_norm * cur_norm), n + 1)
                })
        })
        .reduce(|| (0.0, 0), |(s1, n1), (s2, n2)| (s1 + s2, n1 + n2));

    if pairs == 0 {
        return ExplanationStability::default();
    }

    let avg_similarity = sum / pairs as f64;
    let severity = if avg_similarity >= threshold {
        Severity::Stable
    } else if avg_similarity < CRITICAL_SIMILARITY {
        Severity::Critical
    } else {
        Severity::Warning
    };

    ExplanationStability {
        stable: severity == Severity::Stable,
        avg_similarity,
        severity,
        compared_pairs: pairs,
    }
}
