//! Integration tests for the drift metric algorithms working together:
//! binning, divergence, severity classification and aggregation

use kolosal_drift::drift::{
    aggregate_drift_metrics, classify_psi_severity, compute_data_quality_drift,
    compute_explanation_stability, compute_fairness_drift, compute_histogram, compute_kl_divergence,
    compute_psi, compute_wasserstein_distance, DataQualityStats, ExplanationStability, FairnessMetric,
    FairnessMetrics, FeatureDrift, Histogram, Severity, DEFAULT_BINS, DEFAULT_EPSILON,
    DEFAULT_STABILITY_THRESHOLD,
};
use ndarray::array;
use std::collections::{BTreeMap, BTreeSet};

fn linspace(lo: f64, hi: f64, n: usize) -> Vec<f64> {
    (0..n).map(|i| lo + (hi - lo) * i as f64 / (n - 1) as f64).collect()
}

// ============================================================================
// Binning
// ============================================================================

#[test]
fn test_histogram_last_bin_is_closed() {
    let hist = compute_histogram(&[0.0, 1.0, 2.0, 3.0, 4.0], 4, None, None).unwrap();
    assert_eq!(hist.counts, vec![1, 1, 1, 2]);
    assert_eq!(hist.edges, vec![0.0, 1.0, 2.0, 3.0, 4.0]);
}

#[test]
fn test_current_window_reuses_baseline_edges() {
    let baseline = compute_histogram(&linspace(0.0, 10.0, 101), DEFAULT_BINS, None, None).unwrap();
    let current = Histogram::from_edges(&[-5.0, 0.0, 5.0, 10.0, 15.0, f64::NAN], &baseline.edges).unwrap();

    assert_eq!(current.n_bins(), DEFAULT_BINS);
    assert_eq!(current.total(), 3);
}

// ============================================================================
// Divergence
// ============================================================================

#[test]
fn test_psi_identical_distributions_is_zero() {
    let counts = vec![10.0, 20.0, 40.0, 20.0, 10.0];
    let psi = compute_psi(&counts, &counts, DEFAULT_EPSILON).unwrap();
    assert!(psi.abs() < 1e-12);
    assert_eq!(classify_psi_severity(psi), Severity::Stable);
}

#[test]
fn test_psi_is_symmetric_and_kl_is_not() {
    let a = vec![50.0, 30.0, 15.0, 5.0];
    let b = vec![5.0, 15.0, 30.0, 50.0 + 40.0];

    let psi_ab = compute_psi(&a, &b, DEFAULT_EPSILON).unwrap();
    let psi_ba = compute_psi(&b, &a, DEFAULT_EPSILON).unwrap();
    assert!((psi_ab - psi_ba).abs() < 1e-9);

    let kl_ab = compute_kl_divergence(&a, &b, DEFAULT_EPSILON).unwrap();
    let kl_ba = compute_kl_divergence(&b, &a, DEFAULT_EPSILON).unwrap();
    assert!(kl_ab > 0.0 && kl_ba > 0.0);
    assert!((kl_ab - kl_ba).abs() > 1e-6);
}

#[test]
fn test_shifted_sample_is_critical() {
    let reference = linspace(0.0, 1.0, 500);
    let shifted: Vec<f64> = reference.iter().map(|v| v * 0.5 + 0.5).collect();

    let base = compute_histogram(&reference, DEFAULT_BINS, None, None).unwrap();
    let cur = Histogram::from_edges(&shifted, &base.edges).unwrap();
    let psi = compute_psi(&base.weights(), &cur.weights(), DEFAULT_EPSILON).unwrap();

    assert_eq!(classify_psi_severity(psi), Severity::Critical);
}

#[test]
fn test_empty_histograms_rejected() {
    assert!(compute_psi(&[], &[1.0], DEFAULT_EPSILON).is_err());
    assert!(compute_kl_divergence(&[1.0], &[], DEFAULT_EPSILON).is_err());
}

#[test]
fn test_wasserstein_of_translated_sample() {
    let distance = compute_wasserstein_distance(&[1.0, 2.0, 3.0], &[4.0, 5.0, 6.0]).unwrap();
    assert!((distance - 3.0).abs() < 1e-12);
    assert!(compute_wasserstein_distance(&[], &[1.0]).is_err());
}

// ============================================================================
// Fairness, quality and stability
// ============================================================================

#[test]
fn test_fairness_drift_uses_metric_thresholds() {
    let baseline: FairnessMetrics = BTreeMap::from([
        (FairnessMetric::DemographicParityDifference, 0.10),
        (FairnessMetric::DisparateImpactRatio, 0.90),
    ]);
    let current: FairnessMetrics = BTreeMap::from([
        (FairnessMetric::DemographicParityDifference, 0.25),
        (FairnessMetric::DisparateImpactRatio, 0.80),
        (FairnessMetric::EqualOpportunityDifference, 0.30),
    ]);

    let drift = compute_fairness_drift(&baseline, &current);
    assert_eq!(drift.len(), 2);
    assert_eq!(drift[&FairnessMetric::DemographicParityDifference].severity, Severity::Critical);
    assert_eq!(drift[&FairnessMetric::DisparateImpactRatio].severity, Severity::Warning);
}

#[test]
fn test_data_quality_findings() {
    let baseline = DataQualityStats {
        null_rates: BTreeMap::from([("age".to_string(), 0.01), ("city".to_string(), 0.0)]),
        categories: BTreeMap::from([(
            "city".to_string(),
            BTreeSet::from(["berlin".to_string(), "paris".to_string()]),
        )]),
    };
    let current = DataQualityStats {
        null_rates: BTreeMap::from([("age".to_string(), 0.30), ("city".to_string(), 0.01)]),
        categories: BTreeMap::from([(
            "city".to_string(),
            BTreeSet::from(["berlin".to_string(), "lisbon".to_string()]),
        )]),
    };

    let findings = compute_data_quality_drift(&baseline, &current);
    assert_eq!(findings.len(), 2);
    assert_eq!(findings[0].kind(), "null_rate");
    assert_eq!(findings[0].feature(), "age");
    assert_eq!(findings[0].severity(), Severity::Critical);
    assert_eq!(findings[1].kind(), "new_categories");
    assert_eq!(findings[1].severity(), Severity::Warning);
}

#[test]
fn test_explanation_stability_extremes() {
    let same = vec![array![1.0, 2.0, 3.0]];
    let stable = compute_explanation_stability(&same, &same, DEFAULT_STABILITY_THRESHOLD);
    assert!(stable.stable);
    assert!((stable.avg_similarity - 1.0).abs() < 1e-12);

    let orthogonal = compute_explanation_stability(
        &[array![1.0, 0.0]],
        &[array![0.0, 1.0]],
        DEFAULT_STABILITY_THRESHOLD,
    );
    assert_eq!(orthogonal.severity, Severity::Critical);
    assert!(!orthogonal.stable);

    let empty = compute_explanation_stability(&[], &same, DEFAULT_STABILITY_THRESHOLD);
    assert_eq!(empty, ExplanationStability::default());
}

// ============================================================================
// Aggregation
// ============================================================================

#[test]
fn test_aggregate_counts_every_sub_metric() {
    let features = BTreeMap::from([(
        "age".to_string(),
        FeatureDrift {
            psi: 0.4,
            psi_severity: Severity::Critical,
            mean_baseline: 40.0,
            mean_current: 55.0,
            std_baseline: 10.0,
            std_current: 12.0,
        },
    )]);
    let fairness = compute_fairness_drift(
        &BTreeMap::from([(FairnessMetric::EqualOpportunityDifference, 0.0)]),
        &BTreeMap::from([(FairnessMetric::EqualOpportunityDifference, 0.07)]),
    );

    let summary = aggregate_drift_metrics(features, None, fairness, Vec::new(), ExplanationStability::default());
    assert_eq!(summary.overall_status, Severity::Critical);
    assert_eq!(summary.critical_count, 1);
    assert_eq!(summary.warning_count, 1);
    assert!(!summary.needs_retraining);
    assert_eq!(summary.critical_features(), vec!["age"]);
}
