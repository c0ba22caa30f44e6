//! Raw records flowing into the monitor

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Flat map from feature name to an arbitrary JSON value
pub type Record = Map<String, Value>;

/// One logged model evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRecord {
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub input_summary: Record,
    /// Model output score. Older producers wrote it as `risk_score`.
    #[serde(default, alias = "risk_score")]
    pub score: Option<f64>,
    /// Any other top-level keys the producer logged
    #[serde(flatten)]
    pub extra: Record,
}

impl EvaluationRecord {
    pub fn new(timestamp: DateTime<Utc>, input_summary: Record, score: Option<f64>) -> Self {
        Self { timestamp, input_summary, score, extra: Record::new() }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// Model output under `field`.
    ///
    /// Looks at top-level keys, then the input summary, then falls back to
    /// the `score` slot.
    pub fn score_for(&self, field: &str) -> Option<f64> {
        self.extra
            .get(field)
            .or_else(|| self.input_summary.get(field))
            .and_then(numeric_value)
            .or(self.score.filter(|s| s.is_finite()))
    }
}

/// Numeric reading of a JSON value. Booleans count as 0/1.
pub fn numeric_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|v| v.is_finite()),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

/// Whether a feature is missing from the record or explicitly null
pub fn is_null(value: Option<&Value>) -> bool {
    matches!(value, None | Some(Value::Null))
}

/// Label used for categorical counting. Strings are taken verbatim.
pub fn category_label(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
