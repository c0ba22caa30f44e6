//! Alert lifecycle
//!
//! Drift findings become alerts keyed by a content fingerprint. Repeat
//! detections inside the dedup window bump an occurrence counter instead of
//! piling up duplicate rows; acknowledgment and resolution are tracked
//! independently.

mod manager;

pub use manager::{AlertManager, LogNotifier, Notifier, DEDUP_WINDOW_HOURS, RETRAINING_ALERT_COUNT};

use crate::drift::Severity;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fmt;
use uuid::Uuid;

/// Category of drift an alert reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    PopulationDrift,
    ConceptDrift,
    FairnessDrift,
    DataQuality,
    Stability,
}

impl AlertType {
    pub fn as_str(self) -> &'static str {
        match self {
            AlertType::PopulationDrift => "population_drift",
            AlertType::ConceptDrift => "concept_drift",
            AlertType::FairnessDrift => "fairness_drift",
            AlertType::DataQuality => "data_quality",
            AlertType::Stability => "stability",
        }
    }
}

impl fmt::Display for AlertType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Info,
    Warning,
    Critical,
}

impl AlertSeverity {
    pub fn as_str(self) -> &'static str {
        match self {
            AlertSeverity::Info => "info",
            AlertSeverity::Warning => "warning",
            AlertSeverity::Critical => "critical",
        }
    }
}

impl From<Severity> for AlertSeverity {
    fn from(severity: Severity) -> Self {
        match severity {
            Severity::Stable => AlertSeverity::Info,
            Severity::Warning => AlertSeverity::Warning,
            Severity::Critical => AlertSeverity::Critical,
        }
    }
}

impl fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AlertSeverity {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "info" => Ok(AlertSeverity::Info),
            "warning" => Ok(AlertSeverity::Warning),
            "critical" => Ok(AlertSeverity::Critical),
            other => Err(format!("unknown severity '{}'", other)),
        }
    }
}

/// What a caller asks the manager to raise
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRequest {
    pub model_id: String,
    pub alert_type: AlertType,
    pub severity: AlertSeverity,
    pub metric_name: String,
    pub metric_value: f64,
    pub threshold: f64,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    #[serde(default)]
    pub details: Value,
}

impl AlertRequest {
    pub fn fingerprint(&self) -> String {
        fingerprint(&self.model_id, self.alert_type, &self.metric_name)
    }
}

/// A persisted alert
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    pub fingerprint: String,
    pub model_id: String,
    pub alert_type: AlertType,
    pub severity: AlertSeverity,
    pub metric_name: String,
    pub metric_value: f64,
    pub threshold: f64,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    #[serde(default)]
    pub details: Value,
    pub resolved: bool,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolution_note: Option<String>,
    pub acknowledged: bool,
    pub acknowledged_by: Option<String>,
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub occurrence_count: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Alert {
    /// Fresh, unresolved alert with a new id and an occurrence count of one
    pub fn from_request(request: AlertRequest, now: DateTime<Utc>) -> Self {
        let fingerprint = request.fingerprint();
        Self {
            id: Uuid::new_v4().to_string(),
            fingerprint,
            model_id: request.model_id,
            alert_type: request.alert_type,
            severity: request.severity,
            metric_name: request.metric_name,
            metric_value: request.metric_value,
            threshold: request.threshold,
            window_start: request.window_start,
            window_end: request.window_end,
            details: request.details,
            resolved: false,
            resolved_at: None,
            resolution_note: None,
            acknowledged: false,
            acknowledged_by: None,
            acknowledged_at: None,
            occurrence_count: 1,
            created_at: now,
            updated_at: now,
        }
    }

    /// Fold a repeat detection into this alert
    pub fn record_occurrence(&mut self, repeat: &Alert) {
        self.metric_value = repeat.metric_value;
        self.window_end = repeat.window_end;
        self.updated_at = repeat.updated_at;
        self.occurrence_count += 1;
    }

    /// Whether `candidate` is a repeat of this alert opened at or after `open_since`
    pub fn absorbs(&self, candidate: &Alert, open_since: DateTime<Utc>) -> bool {
        self.fingerprint == candidate.fingerprint && !self.resolved && self.created_at >= open_since
    }
}

/// SHA-256 hex digest of `"{model_id}:{alert_type}:{metric_name}"`
pub fn fingerprint(model_id: &str, alert_type: AlertType, metric_name: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{}:{}:{}", model_id, alert_type.as_str(), metric_name).as_bytes());
    hex::encode(hasher.finalize())
}
