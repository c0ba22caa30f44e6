//! Drift snapshot: the append-only record of one worker run

use crate::drift::aggregate::DriftSummary;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Result of comparing one window of traffic against a model's baseline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftSnapshot {
    pub model_id: String,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub sample_count: usize,
    pub baseline_created_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub summary: DriftSummary,
}

impl DriftSnapshot {
    /// Generate a human-readable summary
    pub fn summary_text(&self) -> String {
        let s = &self.summary;
        let mut out = String::new();
        out.push_str("Drift Report\n");
        out.push_str("============\n");
        out.push_str(&format!("Model: {}\n", self.model_id));
        out.push_str(&format!(
            "Window: {} .. {}\n",
            self.window_start.to_rfc3339(),
            self.window_end.to_rfc3339()
        ));
        out.push_str(&format!("Samples: {}\n", self.sample_count));
        out.push_str(&format!("Baseline created: {}\n", self.baseline_created_at.to_rfc3339()));
        out.push_str(&format!("Overall status: {}\n", s.overall_status));
        out.push_str(&format!(
            "Critical: {}, Warnings: {}, Needs retraining: {}\n",
            s.critical_count, s.warning_count, s.needs_retraining
        ));

        let drifted: Vec<_> = s
            .feature_drifts
            .iter()
            .filter(|(_, d)| d.psi_severity.is_actionable())
            .collect();
        if !drifted.is_empty() {
            out.push_str("\nDrifted Features:\n");
            for (name, d) in drifted {
                out.push_str(&format!(
                    "  - {} [{}] psi={:.4}\n",
                    name,
                    d.psi_severity.as_str().to_uppercase(),
                    d.psi
                ));
            }
        }

        if let Some(score) = s.score_drift.as_ref().filter(|d| d.kl_severity.is_actionable()) {
            out.push_str(&format!(
                "\nScore drift [{}] kl={:.4}\n",
                score.kl_severity.as_str().to_uppercase(),
                score.kl
            ));
        }

        if !s.data_quality_drift.is_empty() {
            out.push_str("\nData Quality:\n");
            for alert in &s.data_quality_drift {
                out.push_str(&format!(
                    "  - {} {} [{}]\n",
                    alert.feature(),
                    alert.kind(),
                    alert.severity().as_str().to_uppercase()
                ));
            }
        }

        out
    }
}
