//! Pure stages of a drift run: compare a window to the baseline, then map
//! findings to alert requests

use crate::alerts::{AlertRequest, AlertSeverity, AlertType};
use crate::baseline::{BaselineSnapshot, FeatureStats, NumericFeatureStats};
use crate::drift::stats::{percentile, SummaryStats};
use crate::drift::{
    aggregate_drift_metrics, classify_kl_severity, classify_psi_severity, compute_data_quality_drift,
    compute_kl_divergence, compute_psi, DataQualityAlert, DataQualityStats, DriftSnapshot,
    ExplanationStability, FairnessDrift, FeatureDrift, Histogram, ScoreDrift, Severity,
    CRITICAL_SIMILARITY, DEFAULT_EPSILON, DEFAULT_STABILITY_THRESHOLD, KL_CRITICAL_THRESHOLD,
    KL_WARNING_THRESHOLD, NEW_CATEGORY_MIN_PROPORTION, NULL_RATE_CRITICAL_INCREASE,
    NULL_RATE_WARNING_INCREASE, PSI_CRITICAL_THRESHOLD, PSI_WARNING_THRESHOLD,
};
use crate::error::Result;
use crate::storage::{category_label, is_null, numeric_value, EvaluationRecord};
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use tracing::warn;

/// Compare one window of evaluations against `baseline`.
///
/// Numeric features with fewer than `min_feature_samples` usable current
/// values are left out. Fairness drift stays empty and explanation stability
/// stays at its neutral default because evaluations carry neither group
/// outcomes nor attribution vectors.
pub fn compute_drift(
    baseline: &BaselineSnapshot,
    evaluations: &[EvaluationRecord],
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
    min_feature_samples: usize,
) -> DriftSnapshot {
    let feature_drifts: BTreeMap<String, FeatureDrift> = baseline
        .feature_stats
        .par_iter()
        .filter_map(|(name, stats)| {
            let stats = stats.as_numeric()?;
            let values: Vec<f64> = evaluations
                .iter()
                .filter_map(|e| e.input_summary.get(name))
                .filter_map(numeric_value)
                .collect();
            if values.len() < min_feature_samples {
                return None;
            }
            match numeric_feature_drift(stats, &values) {
                Ok(drift) => drift.map(|d| (name.clone(), d)),
                Err(e) => {
                    warn!(feature = %name, error = %e, "Skipping feature drift");
                    None
                }
            }
        })
        .collect();

    let score_field = baseline.score_field.as_str();
    let scores: Vec<f64> = evaluations.iter().filter_map(|e| e.score_for(score_field)).collect();
    let score_drift = match baseline.score_stats.as_ref() {
        Some(_) if scores.is_empty() => {
            warn!(score_field, "Baseline has score stats but no evaluation carries a score");
            None
        }
        Some(stats) => score_distribution_drift(stats, &scores).unwrap_or_else(|e| {
            warn!(error = %e, "Skipping score drift");
            None
        }),
        None => None,
    };

    let data_quality_drift =
        compute_data_quality_drift(&baseline.data_quality_stats(), &current_quality(baseline, evaluations));

    let summary = aggregate_drift_metrics(
        feature_drifts,
        score_drift,
        FairnessDrift::new(),
        data_quality_drift,
        ExplanationStability::default(),
    );

    DriftSnapshot {
        model_id: baseline.model_id.clone(),
        window_start,
        window_end,
        sample_count: evaluations.len(),
        baseline_created_at: baseline.created_at,
        created_at: Utc::now(),
        summary,
    }
}

fn baseline_weights(stats: &NumericFeatureStats) -> Vec<f64> {
    stats.histogram.iter().map(|&c| c as f64).collect()
}

fn numeric_feature_drift(stats: &NumericFeatureStats, values: &[f64]) -> Result<Option<FeatureDrift>> {
    let current = Histogram::from_edges(values, &stats.bin_edges)?;
    let psi = compute_psi(&baseline_weights(stats), &current.weights(), DEFAULT_EPSILON)?;
    Ok(SummaryStats::from_values(values).map(|summary| FeatureDrift {
        psi,
        psi_severity: classify_psi_severity(psi),
        mean_baseline: stats.mean,
        mean_current: summary.mean,
        std_baseline: stats.std,
        std_current: summary.std,
    }))
}

fn score_distribution_drift(stats: &NumericFeatureStats, scores: &[f64]) -> Result<Option<ScoreDrift>> {
    let current = Histogram::from_edges(scores, &stats.bin_edges)?;
    let kl = compute_kl_divergence(&baseline_weights(stats), &current.weights(), DEFAULT_EPSILON)?;
    let (Some(summary), Some(p95)) = (SummaryStats::from_values(scores), percentile(scores, 95.0)) else {
        return Ok(None);
    };
    Ok(Some(ScoreDrift {
        kl,
        kl_severity: classify_kl_severity(kl),
        mean_baseline: stats.mean,
        mean_current: summary.mean,
        p95_baseline: stats.p95,
        p95_current: p95,
    }))
}

/// Null rates of every baseline feature plus category sets of the categorical ones
fn current_quality(baseline: &BaselineSnapshot, evaluations: &[EvaluationRecord]) -> DataQualityStats {
    let total = evaluations.len();
    let null_rates = baseline
        .feature_names()
        .into_iter()
        .map(|name| {
            let nulls = evaluations.iter().filter(|e| is_null(e.input_summary.get(&name))).count();
            let rate = if total == 0 { 0.0 } else { nulls as f64 / total as f64 };
            (name, rate)
        })
        .collect();

    let categories = baseline
        .feature_stats
        .iter()
        .filter(|(_, stats)| matches!(stats, FeatureStats::Categorical(_)))
        .map(|(name, _)| {
            let seen: BTreeSet<String> = evaluations
                .iter()
                .filter_map(|e| e.input_summary.get(name))
                .filter(|v| !v.is_null())
                .map(category_label)
                .collect();
            (name.clone(), seen)
        })
        .collect();

    DataQualityStats { null_rates, categories }
}

fn details<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or_default()
}

/// One request per warning or critical finding in `snapshot`
pub fn alert_requests(snapshot: &DriftSnapshot) -> Vec<AlertRequest> {
    let summary = &snapshot.summary;
    let request = |alert_type, severity: Severity, metric_name: String, metric_value, threshold, details| {
        AlertRequest {
            model_id: snapshot.model_id.clone(),
            alert_type,
            severity: AlertSeverity::from(severity),
            metric_name,
            metric_value,
            threshold,
            window_start: snapshot.window_start,
            window_end: snapshot.window_end,
            details,
        }
    };
    let mut requests = Vec::new();

    for (feature, drift) in &summary.feature_drifts {
        if !drift.psi_severity.is_actionable() {
            continue;
        }
        let threshold = match drift.psi_severity {
            Severity::Critical => PSI_CRITICAL_THRESHOLD,
            _ => PSI_WARNING_THRESHOLD,
        };
        requests.push(request(
            AlertType::PopulationDrift,
            drift.psi_severity,
            format!("psi_{}", feature),
            drift.psi,
            threshold,
            serde_json::json!({ "feature": feature, "metrics": details(drift) }),
        ));
    }

    if let Some(score) = summary.score_drift.as_ref().filter(|s| s.kl_severity.is_actionable()) {
        let threshold = match score.kl_severity {
            Severity::Critical => KL_CRITICAL_THRESHOLD,
            _ => KL_WARNING_THRESHOLD,
        };
        requests.push(request(
            AlertType::ConceptDrift,
            score.kl_severity,
            "score_kl_divergence".to_string(),
            score.kl,
            threshold,
            details(score),
        ));
    }

    for (metric, drift) in &summary.fairness_drift {
        if !drift.severity.is_actionable() {
            continue;
        }
        let (warning, critical) = metric.thresholds();
        let threshold = if drift.severity == Severity::Critical { critical } else { warning };
        requests.push(request(
            AlertType::FairnessDrift,
            drift.severity,
            format!("fairness_{}", metric.key()),
            drift.drift,
            threshold,
            details(drift),
        ));
    }

    for finding in &summary.data_quality_drift {
        let (value, threshold) = match finding {
            DataQualityAlert::NullRate { severity, baseline, current, .. } => {
                let increase = if *severity == Severity::Critical {
                    NULL_RATE_CRITICAL_INCREASE
                } else {
                    NULL_RATE_WARNING_INCREASE
                };
                (*current, baseline + increase)
            }
            DataQualityAlert::NewCategories { proportion, .. } => (*proportion, NEW_CATEGORY_MIN_PROPORTION),
        };
        requests.push(request(
            AlertType::DataQuality,
            finding.severity(),
            format!("data_quality_{}_{}", finding.kind(), finding.feature()),
            value,
            threshold,
            details(finding),
        ));
    }

    let stability = &summary.explanation_stability;
    if stability.severity.is_actionable() {
        let threshold = match stability.severity {
            Severity::Critical => CRITICAL_SIMILARITY,
            _ => DEFAULT_STABILITY_THRESHOLD,
        };
        requests.push(request(
            AlertType::Stability,
            stability.severity,
            "explanation_similarity".to_string(),
            stability.avg_similarity,
            threshold,
            details(stability),
        ));
    }

    requests
}
