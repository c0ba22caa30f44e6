//! Monitor configuration

use crate::error::{DriftError, Result};
use crate::storage::{days_before, minutes_before, RetentionPolicy};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Where collections live
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StorageConfig {
    Memory,
    Local { dir: PathBuf },
}

impl StorageConfig {
    fn from_env() -> Self {
        match std::env::var("DRIFT_STORE_DIR") {
            Ok(dir) if !dir.trim().is_empty() => StorageConfig::Local { dir: PathBuf::from(dir) },
            _ => StorageConfig::Memory,
        }
    }

    /// Whether state survives the process
    pub fn is_persistent(&self) -> bool {
        matches!(self, StorageConfig::Local { .. })
    }
}

/// Window length, sample cap and sample floor for one run mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowConfig {
    /// Minutes for streaming windows, days for batch windows
    pub length: i64,
    pub max_samples: usize,
    pub min_samples: usize,
}

impl WindowConfig {
    pub const fn streaming() -> Self {
        Self { length: 5, max_samples: 1_000, min_samples: 10 }
    }

    pub const fn batch() -> Self {
        Self { length: 1, max_samples: 10_000, min_samples: 50 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub model_id: String,
    pub storage: StorageConfig,
    /// Record field holding the model output score
    pub score_field: String,
    pub io_timeout_ms: u64,
    /// Pause between continuous streaming runs
    pub interval_minutes: u64,
    pub streaming: WindowConfig,
    pub batch: WindowConfig,
    pub retention: RetentionPolicy,
    /// Minimum non-null current values for a feature to be compared
    pub min_feature_samples: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            model_id: std::env::var("DRIFT_MODEL_ID").unwrap_or_else(|_| "default_model".to_string()),
            storage: StorageConfig::from_env(),
            score_field: std::env::var("DRIFT_SCORE_FIELD").unwrap_or_else(|_| "risk_score".to_string()),
            io_timeout_ms: std::env::var("DRIFT_IO_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10_000),
            interval_minutes: std::env::var("DRIFT_INTERVAL_MINUTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5),
            streaming: WindowConfig::streaming(),
            batch: WindowConfig::batch(),
            retention: RetentionPolicy::default(),
            min_feature_samples: 10,
        }
    }
}

impl MonitorConfig {
    /// Load from a JSON file; missing keys fall back to the defaults
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            DriftError::ConfigError(format!("Failed to read {}: {}", path.as_ref().display(), e))
        })?;
        let config: Self = serde_json::from_str(&contents)
            .map_err(|e| DriftError::ConfigError(format!("Invalid config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.model_id.trim().is_empty() {
            return Err(DriftError::ConfigError("model_id must not be empty".to_string()));
        }
        if self.io_timeout_ms == 0 {
            return Err(DriftError::ConfigError("io_timeout_ms must be positive".to_string()));
        }
        let now = Utc::now();
        for (mode, window, start) in [
            ("streaming", &self.streaming, minutes_before(now, self.streaming.length)),
            ("batch", &self.batch, days_before(now, self.batch.length)),
        ] {
            if window.length <= 0 || window.max_samples == 0 || start.is_err() {
                return Err(DriftError::ConfigError(format!(
                    "{} window needs a positive, representable length and a sample cap",
                    mode
                )));
            }
        }
        for (what, days) in [
            ("snapshot", self.retention.snapshot_days),
            ("alert", self.retention.alert_days),
        ] {
            if days_before(now, days).is_err() {
                return Err(DriftError::ConfigError(format!("{} retention of {} days is out of range", what, days)));
            }
        }
        Ok(())
    }

    pub fn io_timeout(&self) -> Duration {
        Duration::from_millis(self.io_timeout_ms)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_minutes.max(1).saturating_mul(60))
    }
}
