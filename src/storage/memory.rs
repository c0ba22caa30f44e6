//! In-process backend

use super::{
    days_before, newest_evaluations, AlertChange, AlertCollection, AlertQuery, BaselineCollection,
    EvaluationRecord, EvaluationSource, RetentionPolicy, SnapshotCollection, UpsertOutcome,
};
use crate::alerts::Alert;
use crate::baseline::BaselineSnapshot;
use crate::drift::DriftSnapshot;
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;

/// Every collection held in memory.
///
/// Alert dedup happens under a single mutex, so two concurrent detections of
/// the same fingerprint never both insert.
#[derive(Default)]
pub struct MemoryStore {
    baselines: RwLock<HashMap<String, BaselineSnapshot>>,
    snapshots: RwLock<Vec<DriftSnapshot>>,
    alerts: Mutex<Vec<Alert>>,
    evaluations: RwLock<Vec<EvaluationRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_parts(
        baselines: Vec<BaselineSnapshot>,
        snapshots: Vec<DriftSnapshot>,
        alerts: Vec<Alert>,
    ) -> Self {
        Self {
            baselines: RwLock::new(baselines.into_iter().map(|b| (b.model_id.clone(), b)).collect()),
            snapshots: RwLock::new(snapshots),
            alerts: Mutex::new(alerts),
            evaluations: RwLock::new(Vec::new()),
        }
    }

    /// Append evaluations to the log
    pub fn push_evaluations<I>(&self, records: I)
    where
        I: IntoIterator<Item = EvaluationRecord>,
    {
        self.evaluations.write().extend(records);
    }

    pub fn evaluation_count(&self) -> usize {
        self.evaluations.read().len()
    }

    pub fn snapshot_count(&self) -> usize {
        self.snapshots.read().len()
    }

    pub fn alert_count(&self) -> usize {
        self.alerts.lock().len()
    }

    /// Drop history past its retention age
    pub fn purge_expired(&self, now: DateTime<Utc>, policy: RetentionPolicy) -> Result<(usize, usize)> {
        let snapshots = self.purge_snapshots(days_before(now, policy.snapshot_days)?);
        let alerts = self.purge_alerts(days_before(now, policy.alert_days)?);
        Ok((snapshots, alerts))
    }

    pub(crate) fn all_baselines(&self) -> Vec<BaselineSnapshot> {
        let mut baselines: Vec<_> = self.baselines.read().values().cloned().collect();
        baselines.sort_by(|a, b| a.model_id.cmp(&b.model_id));
        baselines
    }

    pub(crate) fn all_snapshots(&self) -> Vec<DriftSnapshot> {
        self.snapshots.read().clone()
    }

    pub(crate) fn all_alerts(&self) -> Vec<Alert> {
        self.alerts.lock().clone()
    }

    fn purge_snapshots(&self, cutoff: DateTime<Utc>) -> usize {
        let mut snapshots = self.snapshots.write();
        let before = snapshots.len();
        snapshots.retain(|s| s.window_end >= cutoff);
        before - snapshots.len()
    }

    fn purge_alerts(&self, cutoff: DateTime<Utc>) -> usize {
        let mut alerts = self.alerts.lock();
        let before = alerts.len();
        alerts.retain(|a| a.created_at >= cutoff);
        before - alerts.len()
    }
}

#[async_trait]
impl BaselineCollection for MemoryStore {
    async fn upsert(&self, baseline: &BaselineSnapshot) -> Result<()> {
        self.baselines.write().insert(baseline.model_id.clone(), baseline.clone());
        Ok(())
    }

    async fn find_by_model(&self, model_id: &str) -> Result<Option<BaselineSnapshot>> {
        Ok(self.baselines.read().get(model_id).cloned())
    }
}

#[async_trait]
impl SnapshotCollection for MemoryStore {
    async fn insert(&self, snapshot: &DriftSnapshot) -> Result<()> {
        self.snapshots.write().push(snapshot.clone());
        Ok(())
    }

    async fn find_recent(&self, model_id: &str, limit: usize) -> Result<Vec<DriftSnapshot>> {
        let mut found: Vec<DriftSnapshot> = self
            .snapshots
            .read()
            .iter()
            .filter(|s| s.model_id == model_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| b.window_end.cmp(&a.window_end));
        found.truncate(limit);
        Ok(found)
    }

    async fn purge_before(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        Ok(self.purge_snapshots(cutoff))
    }
}

#[async_trait]
impl AlertCollection for MemoryStore {
    async fn insert_or_increment(&self, candidate: Alert, open_since: DateTime<Utc>) -> Result<UpsertOutcome> {
        let mut alerts = self.alerts.lock();
        if let Some(existing) = alerts.iter_mut().find(|a| a.absorbs(&candidate, open_since)) {
            existing.record_occurrence(&candidate);
            return Ok(UpsertOutcome::Updated(existing.clone()));
        }
        alerts.push(candidate.clone());
        Ok(UpsertOutcome::Inserted(candidate))
    }

    async fn apply(&self, id: &str, change: AlertChange) -> Result<bool> {
        let mut alerts = self.alerts.lock();
        Ok(alerts
            .iter_mut()
            .find(|a| a.id == id)
            .map_or(false, |alert| change.apply_to(alert)))
    }

    async fn find(&self, query: &AlertQuery) -> Result<Vec<Alert>> {
        Ok(query.select(self.alerts.lock().iter()))
    }

    async fn count(&self, query: &AlertQuery) -> Result<usize> {
        Ok(self.alerts.lock().iter().filter(|a| query.matches(a)).count())
    }

    async fn purge_before(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        Ok(self.purge_alerts(cutoff))
    }
}

#[async_trait]
impl EvaluationSource for MemoryStore {
    async fn fetch_since(&self, since: DateTime<Utc>, limit: usize) -> Result<Vec<EvaluationRecord>> {
        Ok(newest_evaluations(self.evaluations.read().iter().cloned(), since, limit))
    }
}
