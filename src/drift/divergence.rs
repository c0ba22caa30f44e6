//! Distribution divergence measures: PSI, KL divergence, Wasserstein distance

use crate::drift::Severity;
use crate::error::{DriftError, Result};
use std::cmp::Ordering;

/// Additive smoothing applied to every bin before normalizing
pub const DEFAULT_EPSILON: f64 = 1e-6;

pub const PSI_WARNING_THRESHOLD: f64 = 0.1;
pub const PSI_CRITICAL_THRESHOLD: f64 = 0.25;
pub const KL_WARNING_THRESHOLD: f64 = 0.1;
pub const KL_CRITICAL_THRESHOLD: f64 = 0.3;

/// Population Stability Index of `current` against the `baseline` reference.
///
/// Both inputs are bin counts over the same edges. Each side is normalized as
/// `(count + ε) / (total + ε·bins)`, then
/// `PSI = Σ (current% − baseline%) · ln(current% / baseline%)`.
pub fn compute_psi(baseline: &[f64], current: &[f64], epsilon: f64) -> Result<f64> {
    let (base, cur) = smoothed_pair(baseline, current, epsilon)?;

    Ok(base
        .iter()
        .zip(cur.iter())
        .map(|(&b, &c)| (c - b) * (c / b).ln())
        .sum())
}

/// KL(current ‖ baseline) over the same smoothing as [`compute_psi`].
pub fn compute_kl_divergence(baseline: &[f64], current: &[f64], epsilon: f64) -> Result<f64> {
    let (base, cur) = smoothed_pair(baseline, current, epsilon)?;

    Ok(base
        .iter()
        .zip(cur.iter())
        .map(|(&b, &c)| c * (c / b).ln())
        .sum())
}

/// First Wasserstein (earth mover's) distance between two raw samples.
///
/// Computed as the area between the two empirical CDFs, so no binning
/// precision is lost. NaN samples are ignored.
pub fn compute_wasserstein_distance(baseline_values: &[f64], current_values: &[f64]) -> Result<f64> {
    let u = sorted_finite(baseline_values);
    let v = sorted_finite(current_values);

    if u.is_empty() || v.is_empty() {
        return Err(DriftError::InvalidInput(
            "Wasserstein distance needs non-empty samples".to_string(),
        ));
    }

    let mut all: Vec<f64> = u.iter().chain(v.iter()).copied().collect();
    all.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));

    let n_u = u.len() as f64;
    let n_v = v.len() as f64;

    let distance = all
        .windows(2)
        .map(|w| {
            let x = w[0];
            let delta = w[1] - w[0];
            let cdf_u = u.partition_point(|&s| s <= x) as f64 / n_u;
            let cdf_v = v.partition_point(|&s| s <= x) as f64 / n_v;
            (cdf_u - cdf_v).abs() * delta
        })
        .sum();

    Ok(distance)
}

/// `< 0.1` stable, `< 0.25` warning, otherwise critical
pub fn classify_psi_severity(psi: f64) -> Severity {
    if psi < PSI_WARNING_THRESHOLD {
        Severity::Stable
    } else if psi < PSI_CRITICAL_THRESHOLD {
        Severity::Warning
    } else {
        Severity::Critical
    }
}

/// `< 0.1` stable, `< 0.3` warning, otherwise critical
pub fn classify_kl_severity(kl: f64) -> Severity {
    if kl < KL_WARNING_THRESHOLD {
        Severity::Stable
    } else if kl < KL_CRITICAL_THRESHOLD {
        Severity::Warning
    } else {
        Severity::Critical
    }
}

fn smoothed_pair(baseline: &[f64], current: &[f64], epsilon: f64) -> Result<(Vec<f64>, Vec<f64>)> {
    if baseline.is_empty() || current.is_empty() {
        return Err(DriftError::InvalidInput("Empty histograms provided".to_string()));
    }
    if baseline.len() != current.len() {
        return Err(DriftError::InvalidInput(format!(
            "Histogram bin counts differ: baseline has {}, current has {}",
            baseline.len(),
            current.len()
        )));
    }
    if epsilon.is_nan() || epsilon <= 0.0 {
        return Err(DriftError::InvalidInput(format!(
            "Smoothing epsilon must be positive, got {}",
            epsilon
        )));
    }

    Ok((smooth(baseline, epsilon), smooth(current, epsilon)))
}

fn smooth(counts: &[f64], epsilon: f64) -> Vec<f64> {
    let total: f64 = counts.iter().sum::<f64>() + epsilon * counts.len() as f64;
    counts.iter().map(|&c| (c + epsilon) / total).collect()
}

fn sorted_finite(values: &[f64]) -> Vec<f64> {
    let mut out: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    out.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_psi_identical_is_zero() {
        let hist = vec![10.0, 20.0, 30.0, 0.0, 5.0];
        let psi = compute_psi(&hist, &hist, DEFAULT_EPSILON).unwrap();
        assert!(psi.abs() < 1e-12);
    }

    #[test]
    fn test_psi_shifted_distribution() {
        let baseline = vec![50.0, 30.0, 15.0, 5.0, 0.0];
        let current = vec![0.0, 5.0, 15.0, 30.0, 50.0];
        let psi = compute_psi(&baseline, &current, DEFAULT_EPSILON).unwrap();
        assert!(psi > PSI_CRITICAL_THRESHOLD);
    }

    #[test]
    fn test_psi_scale_invariant() {
        let baseline = vec![10.0, 20.0, 30.0];
        let current = vec![30.0, 20.0, 10.0];
        let doubled: Vec<f64> = current.iter().map(|c| c * 2.0).collect();

        let a = compute_psi(&baseline, &current, DEFAULT_EPSILON).unwrap();
        let b = compute_psi(&baseline, &doubled, DEFAULT_EPSILON).unwrap();
        assert!((a - b).abs() < 1e-6);
    }

    #[test]
    fn test_kl_identical_is_zero() {
        let hist = vec![3.0, 0.0, 7.0, 1.0];
        let kl = compute_kl_divergence(&hist, &hist, DEFAULT_EPSILON).unwrap();
        assert!(kl.abs() < 1e-12);
    }

    #[test]
    fn test_kl_is_directional() {
        let p = vec![90.0, 10.0];
        let q = vec![50.0, 50.0];
        let forward = compute_kl_divergence(&p, &q, DEFAULT_EPSILON).unwrap();
        let backward = compute_kl_divergence(&q, &p, DEFAULT_EPSILON).unwrap();
        assert!(forward > 0.0 && backward > 0.0);
        assert!((forward - backward).abs() > 1e-3);
    }

    #[test]
    fn test_mismatched_bins_rejected() {
        assert!(compute_psi(&[1.0, 2.0], &[1.0], DEFAULT_EPSILON).is_err());
        assert!(compute_kl_divergence(&[], &[], DEFAULT_EPSILON).is_err());
        assert!(compute_psi(&[1.0], &[1.0], 0.0).is_err());
    }

    #[test]
    fn test_wasserstein_shift() {
        let baseline: Vec<f64> = (0..100).map(|i| i as f64 / 10.0).collect();
        let shifted: Vec<f64> = baseline.iter().map(|v| v + 3.0).collect();

        let d = compute_wasserstein_distance(&baseline, &shifted).unwrap();
        assert!((d - 3.0).abs() < 1e-9);
        assert_eq!(compute_wasserstein_distance(&baseline, &baseline).unwrap(), 0.0);
    }

    #[test]
    fn test_wasserstein_simple() {
        let d = compute_wasserstein_distance(&[0.0, 1.0, 3.0], &[5.0, 6.0, 8.0]).unwrap();
        assert!((d - 5.0).abs() < 1e-12);
        assert!(compute_wasserstein_distance(&[], &[1.0]).is_err());
    }

    #[test]
    fn test_psi_severity_boundaries() {
        assert_eq!(classify_psi_severity(0.0999), Severity::Stable);
        assert_eq!(classify_psi_severity(0.1), Severity::Warning);
        assert_eq!(classify_psi_severity(0.2499), Severity::Warning);
        assert_eq!(classify_psi_severity(0.25), Severity::Critical);
    }

    #[test]
    fn test_kl_severity_boundaries() {
        assert_eq!(classify_kl_severity(0.0999), Severity::Stable);
        assert_eq!(classify_kl_severity(0.1), Severity::Warning);
        assert_eq!(classify_kl_severity(0.2999), Severity::Warning);
        assert_eq!(classify_kl_severity(0.3), Severity::Critical);
    }
}
