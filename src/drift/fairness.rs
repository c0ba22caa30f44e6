//! Fairness-metric drift

use crate::drift::Severity;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Group fairness metrics tracked over time
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FairnessMetric {
    #[serde(rename = "demographic_parity_diff")]
    DemographicParityDifference,
    #[serde(rename = "equal_opportunity_diff")]
    EqualOpportunityDifference,
    #[serde(rename = "disparate_impact")]
    DisparateImpactRatio,
}

impl FairnessMetric {
    pub const ALL: [FairnessMetric; 3] = [
        FairnessMetric::DemographicParityDifference,
        FairnessMetric::EqualOpportunityDifference,
        FairnessMetric::DisparateImpactRatio,
    ];

    pub fn key(self) -> &'static str {
        match self {
            FairnessMetric::DemographicParityDifference => "demographic_parity_diff",
            FairnessMetric::EqualOpportunityDifference => "equal_opportunity_diff",
            FairnessMetric::DisparateImpactRatio => "disparate_impact",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.key() == key)
    }

    /// (warning, critical) thresholds on the absolute change
    pub fn thresholds(self) -> (f64, f64) {
        match self {
            FairnessMetric::DemographicParityDifference
            | FairnessMetric::EqualOpportunityDifference => (0.05, 0.10),
            FairnessMetric::DisparateImpactRatio => (0.08, 0.15),
        }
    }

    pub fn classify(self, drift: f64) -> Severity {
        let (warning, critical) = self.thresholds();
        if drift >= critical {
            Severity::Critical
        } else if drift >= warning {
            Severity::Warning
        } else {
            Severity::Stable
        }
    }
}

impl fmt::Display for FairnessMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Fairness scores observed at one point in time
pub type FairnessMetrics = BTreeMap<FairnessMetric, f64>;

/// Change of one fairness metric between baseline and current window
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FairnessMetricDrift {
    pub baseline: f64,
    pub current: f64,
    pub drift: f64,
    pub severity: Severity,
}

pub type FairnessDrift = BTreeMap<FairnessMetric, FairnessMetricDrift>;

/// Absolute change of every metric present on both sides.
///
/// A metric missing from either input is skipped, never an error.
pub fn compute_fairness_drift(baseline: &FairnessMetrics, current: &FairnessMetrics) -> FairnessDrift {
    FairnessMetric::ALL
        .into_iter()
        .filter_map(|metric| {
            let b = *baseline.get(&metric)?;
            let c = *current.get(&metric)?;
            let drift = (c - b).abs();
            Some((
                metric,
                FairnessMetricDrift {
                    baseline: b,
                    current: c,
                    drift,
                    severity: metric.classify(drift),
                },
            ))
        })
        .collect()
}
