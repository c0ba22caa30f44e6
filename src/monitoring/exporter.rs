//! Gauge registry fed by drift snapshots, rendered in Prometheus text format

use crate::drift::{DataQualityAlert, DriftSnapshot};
use crate::error::Result;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use tracing::info;

/// One-way sink for completed drift runs
pub trait MetricsSink: Send + Sync {
    fn export(&self, snapshot: &DriftSnapshot) -> Result<()>;
}

const GAUGES: &[(&str, &str)] = &[
    ("drift_population_psi", "Population stability index per input feature."),
    ("drift_concept_kl", "KL divergence of the model score distribution."),
    ("drift_fairness_delta", "Absolute change of a fairness metric against baseline."),
    ("drift_data_quality_null_rate", "Null rate of a feature whose null rate increased."),
    ("drift_critical_alerts", "Critical findings in the latest drift run."),
    ("drift_warning_alerts", "Warning findings in the latest drift run."),
    ("drift_overall_status", "Overall drift status (0 stable, 1 warning, 2 critical)."),
    ("drift_needs_retraining", "Whether the latest run flagged the model for retraining."),
];

type Labels = Vec<(String, String)>;

fn labels(pairs: &[(&str, &str)]) -> Labels {
    let mut labels: Labels = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
    labels.sort();
    labels
}

/// Latest value of every drift gauge, keyed by name and label set
#[derive(Default)]
pub struct DriftMetricsExporter {
    gauges: RwLock<BTreeMap<&'static str, BTreeMap<Labels, f64>>>,
}

impl DriftMetricsExporter {
    pub fn new() -> Self {
        Self::default()
    }

    fn set(&self, name: &'static str, labels: Labels, value: f64) {
        self.gauges.write().entry(name).or_default().insert(labels, value);
    }

    /// Current value of one series
    pub fn gauge(&self, name: &str, label_pairs: &[(&str, &str)]) -> Option<f64> {
        self.gauges.read().get(name)?.get(&labels(label_pairs)).copied()
    }

    pub fn series_count(&self) -> usize {
        self.gauges.read().values().map(BTreeMap::len).sum()
    }

    /// Render every series in the Prometheus text exposition format
    pub fn render_prometheus(&self) -> String {
        let gauges = self.gauges.read();
        let mut out = String::new();
        for (name, help) in GAUGES {
            let Some(series) = gauges.get(name) else {
                continue;
            };
            let _ = writeln!(out, "# HELP {} {}", name, help);
            let _ = writeln!(out, "# TYPE {} gauge", name);
            for (labels, value) in series {
                let rendered: Vec<String> = labels
                    .iter()
                    .map(|(k, v)| format!("{}=\"{}\"", k, escape_label(v)))
                    .collect();
                let _ = writeln!(out, "{}{{{}}} {}", name, rendered.join(","), value);
            }
        }
        out
    }
}

fn escape_label(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n")
}

impl MetricsSink for DriftMetricsExporter {
    fn export(&self, snapshot: &DriftSnapshot) -> Result<()> {
        let model = snapshot.model_id.as_str();
        let summary = &snapshot.summary;

        for (feature, drift) in &summary.feature_drifts {
            self.set("drift_population_psi", labels(&[("model_id", model), ("feature", feature.as_str())]), drift.psi);
        }
        if let Some(score) = &summary.score_drift {
            self.set("drift_concept_kl", labels(&[("model_id", model)]), score.kl);
        }
        for (metric, drift) in &summary.fairness_drift {
            self.set(
                "drift_fairness_delta",
                labels(&[("model_id", model), ("metric", metric.key())]),
                drift.drift,
            );
        }
        for alert in &summary.data_quality_drift {
            if let DataQualityAlert::NullRate { feature, current, .. } = alert {
                self.set(
                    "drift_data_quality_null_rate",
                    labels(&[("model_id", model), ("feature", feature.as_str())]),
                    *current,
                );
            }
        }

        let model_only = labels(&[("model_id", model)]);
        self.set("drift_critical_alerts", model_only.clone(), summary.critical_count as f64);
        self.set("drift_warning_alerts", model_only.clone(), summary.warning_count as f64);
        self.set("drift_overall_status", model_only.clone(), f64::from(summary.overall_status.level()));
        self.set(
            "drift_needs_retraining",
            model_only,
            if summary.needs_retraining { 1.0 } else { 0.0 },
        );

        info!(
            model_id = model,
            status = %summary.overall_status,
            critical = summary.critical_count,
            warnings = summary.warning_count,
            "Exported drift metrics"
        );
        Ok(())
    }
}
