//! Aggregation of all drift sub-results into one overall status

use crate::drift::fairness::FairnessDrift;
use crate::drift::quality::DataQualityAlert;
use crate::drift::stability::ExplanationStability;
use crate::drift::Severity;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Critical findings in a single run needed to flag the model for retraining
pub const RETRAINING_CRITICAL_COUNT: usize = 2;

/// Population drift of one numeric input feature
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureDrift {
    pub psi: f64,
    pub psi_severity: Severity,
    pub mean_baseline: f64,
    pub mean_current: f64,
    pub std_baseline: f64,
    pub std_current: f64,
}

/// Concept drift measured on the model's output score
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreDrift {
    pub kl: f64,
    pub kl_severity: Severity,
    pub mean_baseline: f64,
    pub mean_current: f64,
    pub p95_baseline: f64,
    pub p95_current: f64,
}

/// Every sub-result of one comparison plus the derived overall verdict
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftSummary {
    pub overall_status: Severity,
    pub critical_count: usize,
    pub warning_count: usize,
    pub feature_drifts: BTreeMap<String, FeatureDrift>,
    pub score_drift: Option<ScoreDrift>,
    pub fairness_drift: FairnessDrift,
    pub data_quality_drift: Vec<DataQualityAlert>,
    pub explanation_stability: ExplanationStability,
    pub needs_retraining: bool,
}

impl DriftSummary {
    /// Features whose PSI severity is critical
    pub fn critical_features(&self) -> Vec<&str> {
        self.feature_drifts
            .iter()
            .filter(|(_, d)| d.psi_severity == Severity::Critical)
            .map(|(name, _)| name.as_str())
            .collect()
    }
}

/// Count severities across every sub-result and derive the overall status.
///
/// Critical beats warning beats stable, whichever sub-metric contributed, and
/// `needs_retraining` is set once two or more findings are critical.
pub fn aggregate_drift_metrics(
    feature_drifts: BTreeMap<String, FeatureDrift>,
    score_drift: Option<ScoreDrift>,
    fairness_drift: FairnessDrift,
    data_quality_drift: Vec<DataQualityAlert>,
    explanation_stability: ExplanationStability,
) -> DriftSummary {
    let severities = feature_drifts
        .values()
        .map(|d| d.psi_severity)
        .chain(score_drift.iter().map(|s| s.kl_severity))
        .chain(fairness_drift.values().map(|f| f.severity))
        .chain(data_quality_drift.iter().map(|a| a.severity()))
        .chain(std::iter::once(explanation_stability.severity));

    let (critical_count, warning_count) =
        severities.fold((0usize, 0usize), |(critical, warning), severity| match severity {
            Severity::Critical => (critical + 1, warning),
            Severity::Warning => (critical, warning + 1),
            Severity::Stable => (critical, warning),
        });

    let overall_status = if critical_count > 0 {
        Severity::Critical
    } else if warning_count > 0 {
        Severity::Warning
    } else {
        Severity::Stable
    };

    DriftSummary {
        overall_status,
        critical_count,
        warning_count,
        feature_drifts,
        score_drift,
        fairness_drift,
        data_quality_drift,
        explanation_stability,
        needs_retraining: critical_count >= RETRAINING_CRITICAL_COUNT,
    }
}
