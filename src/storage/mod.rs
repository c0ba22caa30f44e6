//! Persistence seams
//!
//! The monitor talks to its document store and evaluation log only through the
//! collection traits below. Two backends ship with the crate: [`MemoryStore`]
//! and [`LocalStore`] (JSON files on disk). Any call may hang, so callers wrap
//! each one in [`with_timeout`].

mod local;
mod memory;
mod record;

pub use local::LocalStore;
pub use memory::MemoryStore;
pub use record::{category_label, is_null, numeric_value, EvaluationRecord, Record};

use crate::alerts::{Alert, AlertSeverity};
use crate::baseline::BaselineSnapshot;
use crate::config::StorageConfig;
use crate::drift::DriftSnapshot;
use crate::error::{DriftError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// One baseline document per model
#[async_trait]
pub trait BaselineCollection: Send + Sync {
    /// Insert or replace the baseline for `baseline.model_id`
    async fn upsert(&self, baseline: &BaselineSnapshot) -> Result<()>;

    async fn find_by_model(&self, model_id: &str) -> Result<Option<BaselineSnapshot>>;
}

/// Append-only drift snapshot history
#[async_trait]
pub trait SnapshotCollection: Send + Sync {
    async fn insert(&self, snapshot: &DriftSnapshot) -> Result<()>;

    /// Newest `window_end` first
    async fn find_recent(&self, model_id: &str, limit: usize) -> Result<Vec<DriftSnapshot>>;

    /// Drop snapshots whose window ended before `cutoff`; returns how many went
    async fn purge_before(&self, cutoff: DateTime<Utc>) -> Result<usize>;
}

/// Result of an insert-or-increment
#[derive(Debug, Clone, PartialEq)]
pub enum UpsertOutcome {
    Inserted(Alert),
    Updated(Alert),
}

impl UpsertOutcome {
    pub fn alert(&self) -> &Alert {
        match self {
            UpsertOutcome::Inserted(alert) | UpsertOutcome::Updated(alert) => alert,
        }
    }

    pub fn into_alert(self) -> Alert {
        match self {
            UpsertOutcome::Inserted(alert) | UpsertOutcome::Updated(alert) => alert,
        }
    }

    pub fn is_inserted(&self) -> bool {
        matches!(self, UpsertOutcome::Inserted(_))
    }
}

/// State transition applied to a stored alert
#[derive(Debug, Clone, PartialEq)]
pub enum AlertChange {
    Resolve { at: DateTime<Utc>, note: Option<String> },
    Acknowledge { by: String, at: DateTime<Utc> },
}

impl AlertChange {
    /// Apply the change; `false` when the alert was already in the target state
    pub fn apply_to(&self, alert: &mut Alert) -> bool {
        match self {
            AlertChange::Resolve { at, note } => {
                if alert.resolved {
                    return false;
                }
                alert.resolved = true;
                alert.resolved_at = Some(*at);
                alert.resolution_note = note.clone();
                alert.updated_at = *at;
                true
            }
            AlertChange::Acknowledge { by, at } => {
                if alert.acknowledged {
                    return false;
                }
                alert.acknowledged = true;
                alert.acknowledged_by = Some(by.clone());
                alert.acknowledged_at = Some(*at);
                alert.updated_at = *at;
                true
            }
        }
    }
}

/// Filter over stored alerts. Results are always newest `created_at` first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AlertQuery {
    pub model_id: Option<String>,
    pub severity: Option<AlertSeverity>,
    pub unresolved_only: bool,
    pub created_since: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

impl AlertQuery {
    pub fn for_model(model_id: impl Into<String>) -> Self {
        Self { model_id: Some(model_id.into()), ..Default::default() }
    }

    pub fn unresolved(mut self) -> Self {
        self.unresolved_only = true;
        self
    }

    pub fn with_severity(mut self, severity: Option<AlertSeverity>) -> Self {
        self.severity = severity;
        self
    }

    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.created_since = Some(since);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, alert: &Alert) -> bool {
        self.model_id.as_deref().map_or(true, |m| alert.model_id == m)
            && self.severity.map_or(true, |s| alert.severity == s)
            && (!self.unresolved_only || !alert.resolved)
            && self.created_since.map_or(true, |since| alert.created_at >= since)
    }

    /// Filter, order newest first and truncate
    pub fn select<'a, I>(&self, alerts: I) -> Vec<Alert>
    where
        I: IntoIterator<Item = &'a Alert>,
    {
        let mut selected: Vec<Alert> = alerts.into_iter().filter(|a| self.matches(a)).cloned().collect();
        selected.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        if let Some(limit) = self.limit {
            selected.truncate(limit);
        }
        selected
    }
}

#[async_trait]
pub trait AlertCollection: Send + Sync {
    /// Atomically fold `candidate` into an unresolved alert with the same
    /// fingerprint created at or after `open_since`, or insert it.
    async fn insert_or_increment(&self, candidate: Alert, open_since: DateTime<Utc>) -> Result<UpsertOutcome>;

    /// Returns `true` only if a stored alert changed
    async fn apply(&self, id: &str, change: AlertChange) -> Result<bool>;

    async fn find(&self, query: &AlertQuery) -> Result<Vec<Alert>>;

    async fn count(&self, query: &AlertQuery) -> Result<usize>;

    /// Drop alerts created before `cutoff`; returns how many went
    async fn purge_before(&self, cutoff: DateTime<Utc>) -> Result<usize>;
}

/// Read side of the evaluation log
#[async_trait]
pub trait EvaluationSource: Send + Sync {
    /// Evaluations at or after `since`, newest first, at most `limit`
    async fn fetch_since(&self, since: DateTime<Utc>, limit: usize) -> Result<Vec<EvaluationRecord>>;
}

/// Sort newest first and cap, shared by the backends
pub(crate) fn newest_evaluations<I>(records: I, since: DateTime<Utc>, limit: usize) -> Vec<EvaluationRecord>
where
    I: IntoIterator<Item = EvaluationRecord>,
{
    let mut selected: Vec<EvaluationRecord> = records.into_iter().filter(|r| r.timestamp >= since).collect();
    selected.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    selected.truncate(limit);
    selected
}

/// Age limits for stored history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionPolicy {
    pub snapshot_days: i64,
    pub alert_days: i64,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self { snapshot_days: 30, alert_days: 90 }
    }
}

/// Everything the monitor persists to, as trait objects
#[derive(Clone)]
pub struct Collections {
    pub baselines: Arc<dyn BaselineCollection>,
    pub snapshots: Arc<dyn SnapshotCollection>,
    pub alerts: Arc<dyn AlertCollection>,
    pub evaluations: Arc<dyn EvaluationSource>,
}

impl Collections {
    /// Use one backend for every collection
    pub fn from_store<S>(store: Arc<S>) -> Self
    where
        S: BaselineCollection + SnapshotCollection + AlertCollection + EvaluationSource + 'static,
    {
        Self {
            baselines: store.clone(),
            snapshots: store.clone(),
            alerts: store.clone(),
            evaluations: store,
        }
    }

    pub fn in_memory() -> Self {
        Self::from_store(Arc::new(MemoryStore::new()))
    }

    pub fn from_config(config: &StorageConfig) -> Result<Self> {
        match config {
            StorageConfig::Memory => Ok(Self::in_memory()),
            StorageConfig::Local { dir } => Ok(Self::from_store(Arc::new(LocalStore::open(dir)?))),
        }
    }

    /// Purge snapshots and alerts past their retention age
    pub async fn purge_expired(&self, now: DateTime<Utc>, policy: RetentionPolicy) -> Result<(usize, usize)> {
        let snapshot_cutoff = days_before(now, policy.snapshot_days)?;
        let alert_cutoff = days_before(now, policy.alert_days)?;
        let snapshots = self.snapshots.purge_before(snapshot_cutoff).await?;
        let alerts = self.alerts.purge_before(alert_cutoff).await?;
        Ok((snapshots, alerts))
    }
}

/// Start of a window `minutes` long that ends at `now`
pub fn minutes_before(now: DateTime<Utc>, minutes: i64) -> Result<DateTime<Utc>> {
    look_back(now, minutes, ChronoDuration::try_minutes(minutes), "minutes")
}

/// Start of a window `days` long that ends at `now`
pub fn days_before(now: DateTime<Utc>, days: i64) -> Result<DateTime<Utc>> {
    look_back(now, days, ChronoDuration::try_days(days), "days")
}

fn look_back(now: DateTime<Utc>, amount: i64, span: Option<ChronoDuration>, unit: &str) -> Result<DateTime<Utc>> {
    if amount < 0 {
        return Err(DriftError::InvalidInput(format!("window of {} {} is negative", amount, unit)));
    }
    span.and_then(|span| now.checked_sub_signed(span))
        .ok_or_else(|| DriftError::InvalidInput(format!("window of {} {} is out of range", amount, unit)))
}

/// Await `future`, failing with [`DriftError::Timeout`] after `duration`
pub async fn with_timeout<T, F>(duration: Duration, operation: &str, future: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(duration, future).await {
        Ok(result) => result,
        Err(_) => Err(DriftError::Timeout {
            operation: operation.to_string(),
            after_ms: duration.as_millis() as u64,
        }),
    }
}
