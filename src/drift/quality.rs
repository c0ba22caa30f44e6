//! Data-quality drift: null-rate increases and unseen categories

use crate::drift::Severity;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

pub const NULL_RATE_WARNING_INCREASE: f64 = 0.05;
pub const NULL_RATE_CRITICAL_INCREASE: f64 = 0.15;
/// Minimum share of novel categories among the current ones to raise an alert
pub const NEW_CATEGORY_MIN_PROPORTION: f64 = 0.02;

/// Per-feature data-quality observations for one side of a comparison
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataQualityStats {
    /// Feature -> fraction of rows where the feature was missing or null
    #[serde(default)]
    pub null_rates: BTreeMap<String, f64>,
    /// Categorical feature -> set of observed categories
    #[serde(default)]
    pub categories: BTreeMap<String, BTreeSet<String>>,
}

/// One data-quality finding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DataQualityAlert {
    NullRate {
        feature: String,
        severity: Severity,
        baseline: f64,
        current: f64,
        increase: f64,
    },
    NewCategories {
        feature: String,
        severity: Severity,
        new_categories: Vec<String>,
        proportion: f64,
    },
}

impl DataQualityAlert {
    pub fn feature(&self) -> &str {
        match self {
            DataQualityAlert::NullRate { feature, .. }
            | DataQualityAlert::NewCategories { feature, .. } => feature,
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            DataQualityAlert::NullRate { severity, .. }
            | DataQualityAlert::NewCategories { severity, .. } => *severity,
        }
    }

    /// Stable identifier of the finding kind, used in alert metric names
    pub fn kind(&self) -> &'static str {
        match self {
            DataQualityAlert::NullRate { .. } => "null_rate",
            DataQualityAlert::NewCategories { .. } => "new_categories",
        }
    }
}

/// Compare current data-quality observations against the baseline.
///
/// Features present on only one side are ignored. Findings come back ordered
/// by kind (null rates first) and then by feature name.
pub fn compute_data_quality_drift(
    baseline: &DataQualityStats,
    current: &DataQualityStats,
) -> Vec<DataQualityAlert> {
    let mut alerts = Vec::new();

    for (feature, &current_rate) in &current.null_rates {
        let Some(&baseline_rate) = baseline.null_rates.get(feature) else {
            continue;
        };
        let increase = current_rate - baseline_rate;
        let severity = if increase >= NULL_RATE_CRITICAL_INCREASE {
            Severity::Critical
        } else if increase >= NULL_RATE_WARNING_INCREASE {
            Severity::Warning
        } else {
            continue;
        };

        alerts.push(DataQualityAlert::NullRate {
            feature: feature.clone(),
            severity,
            baseline: baseline_rate,
            current: current_rate,
            increase,
        });
    }

    for (feature, current_cats) in &current.categories {
        let Some(baseline_cats) = baseline.categories.get(feature) else {
            continue;
        };
        if current_cats.is_empty() {
            continue;
        }

        let new_categories: Vec<String> = current_cats.difference(baseline_cats).cloned().collect();
        if new_categories.is_empty() {
            continue;
        }

        let proportion = new_categories.len() as f64 / current_cats.len() as f64;
        if proportion >= NEW_CATEGORY_MIN_PROPORTION {
            alerts.push(DataQualityAlert::NewCategories {
                feature: feature.clone(),
                severity: Severity::Warning,
                new_categories,
                proportion,
            });
        }
    }

    alerts
}
