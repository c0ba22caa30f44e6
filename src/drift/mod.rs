//! Drift metric algorithms
//!
//! Pure, stateless functions comparing a recorded baseline against a window of
//! production traffic: population stability index, KL divergence, Wasserstein
//! distance, fairness-metric drift, data-quality drift and explanation
//! stability, plus the aggregation of all of them into one overall status.

mod aggregate;
mod divergence;
mod fairness;
mod histogram;
mod quality;
mod report;
mod stability;
pub mod stats;

pub use aggregate::{
    aggregate_drift_metrics, DriftSummary, FeatureDrift, ScoreDrift, RETRAINING_CRITICAL_COUNT,
};
pub use divergence::{
    classify_kl_severity, classify_psi_severity, compute_kl_divergence, compute_psi,
    compute_wasserstein_distance, DEFAULT_EPSILON, KL_CRITICAL_THRESHOLD, KL_WARNING_THRESHOLD,
    PSI_CRITICAL_THRESHOLD, PSI_WARNING_THRESHOLD,
};
pub use fairness::{
    compute_fairness_drift, FairnessDrift, FairnessMetric, FairnessMetricDrift, FairnessMetrics,
};
pub use histogram::{compute_histogram, Histogram, DEFAULT_BINS};
pub use quality::{
    compute_data_quality_drift, DataQualityAlert, DataQualityStats, NEW_CATEGORY_MIN_PROPORTION,
    NULL_RATE_CRITICAL_INCREASE, NULL_RATE_WARNING_INCREASE,
};
pub use report::DriftSnapshot;
pub use stability::{
    compute_explanation_stability, ExplanationStability, CRITICAL_SIMILARITY,
    DEFAULT_STABILITY_THRESHOLD, MAX_EXPLANATION_VECTORS,
};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Ordinal drift severity: stable < warning < critical
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Stable,
    Warning,
    Critical,
}

impl Severity {
    /// Warning and critical results produce alerts; stable ones don't
    pub fn is_actionable(self) -> bool {
        self != Severity::Stable
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Stable => "stable",
            Severity::Warning => "warning",
            Severity::Critical => "critical",
        }
    }

    /// Numeric level used by the gauge exporter (0 = stable, 2 = critical)
    pub fn level(self) -> u8 {
        match self {
            Severity::Stable => 0,
            Severity::Warning => 1,
            Severity::Critical => 2,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Stable < Severity::Warning);
        assert!(Severity::Warning < Severity::Critical);
        assert_eq!(Severity::default(), Severity::Stable);
    }

    #[test]
    fn test_severity_serde() {
        let json = serde_json::to_string(&Severity::Critical).unwrap();
        assert_eq!(json, "\"critical\"");
        let parsed: Severity = serde_json::from_str("\"warning\"").unwrap();
        assert_eq!(parsed, Severity::Warning);
    }

    #[test]
    fn test_actionable() {
        assert!(!Severity::Stable.is_actionable());
        assert!(Severity::Warning.is_actionable());
        assert!(Severity::Critical.is_actionable());
    }
}
