//! Local file system backend
//!
//! State lives in a [`MemoryStore`] and is mirrored into JSON files after
//! every write. Evaluations are read from an append-only JSON-lines file that
//! some other process produces.

use super::{
    newest_evaluations, AlertChange, AlertCollection, AlertQuery, BaselineCollection,
    EvaluationRecord, EvaluationSource, MemoryStore, SnapshotCollection, UpsertOutcome,
};
use crate::alerts::Alert;
use crate::baseline::BaselineSnapshot;
use crate::drift::DriftSnapshot;
use crate::error::{DriftError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, warn};

const BASELINES_FILE: &str = "baselines.json";
const SNAPSHOTS_FILE: &str = "drift_snapshots.json";
const ALERTS_FILE: &str = "alerts.json";
const EVALUATIONS_FILE: &str = "evaluations.jsonl";

pub struct LocalStore {
    base_dir: PathBuf,
    inner: MemoryStore,
    // Serialises read-state-then-write so an older state never lands last
    flush_lock: AsyncMutex<()>,
    append_lock: Mutex<()>,
}

impl LocalStore {
    /// Open (creating if needed) a store rooted at `base_dir`
    pub fn open(base_dir: impl AsRef<Path>) -> Result<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();
        fs::create_dir_all(&base_dir)
            .map_err(|e| DriftError::StorageError(format!("Failed to create {}: {}", base_dir.display(), e)))?;

        let baselines: Vec<BaselineSnapshot> = load_json(&base_dir.join(BASELINES_FILE))?;
        let snapshots: Vec<DriftSnapshot> = load_json(&base_dir.join(SNAPSHOTS_FILE))?;
        let alerts: Vec<Alert> = load_json(&base_dir.join(ALERTS_FILE))?;
        debug!(
            dir = %base_dir.display(),
            baselines = baselines.len(),
            snapshots = snapshots.len(),
            alerts = alerts.len(),
            "Opened local store"
        );

        Ok(Self {
            base_dir,
            inner: MemoryStore::from_parts(baselines, snapshots, alerts),
            flush_lock: AsyncMutex::new(()),
            append_lock: Mutex::new(()),
        })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn evaluations_path(&self) -> PathBuf {
        self.base_dir.join(EVALUATIONS_FILE)
    }

    /// Append evaluations to the JSON-lines log
    pub fn append_evaluations(&self, records: &[EvaluationRecord]) -> Result<()> {
        use std::io::Write;

        let _guard = self.append_lock.lock();
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.evaluations_path())?;
        for record in records {
            writeln!(file, "{}", serde_json::to_string(record)?)?;
        }
        Ok(())
    }

    async fn flush_baselines(&self) -> Result<()> {
        let _guard = self.flush_lock.lock().await;
        write_json(self.base_dir.join(BASELINES_FILE), &self.inner.all_baselines()).await
    }

    async fn flush_snapshots(&self) -> Result<()> {
        let _guard = self.flush_lock.lock().await;
        write_json(self.base_dir.join(SNAPSHOTS_FILE), &self.inner.all_snapshots()).await
    }

    async fn flush_alerts(&self) -> Result<()> {
        let _guard = self.flush_lock.lock().await;
        write_json(self.base_dir.join(ALERTS_FILE), &self.inner.all_alerts()).await
    }

    async fn read_evaluations(&self) -> Result<Vec<EvaluationRecord>> {
        let path = self.evaluations_path();
        tokio::task::spawn_blocking(move || read_evaluation_log(&path))
            .await
            .map_err(|e| DriftError::StorageError(format!("Evaluation read task failed: {}", e)))?
    }
}

fn read_evaluation_log(path: &Path) -> Result<Vec<EvaluationRecord>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let contents = fs::read_to_string(path)
        .map_err(|e| DriftError::StorageError(format!("Failed to read {}: {}", path.display(), e)))?;
    let mut records = Vec::new();
    for (line_no, line) in contents.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<EvaluationRecord>(line) {
            Ok(record) => records.push(record),
            Err(e) => warn!(line = line_no + 1, error = %e, "Skipping malformed evaluation"),
        }
    }
    Ok(records)
}

fn load_json<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let contents = fs::read_to_string(path)
        .map_err(|e| DriftError::StorageError(format!("Failed to read {}: {}", path.display(), e)))?;
    if contents.trim().is_empty() {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_str(&contents)?)
}

/// Serialise on the caller, then write off the runtime threads
async fn write_json<T: Serialize>(path: PathBuf, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    tokio::task::spawn_blocking(move || replace_file(&path, json))
        .await
        .map_err(|e| DriftError::StorageError(format!("Write task failed: {}", e)))?
}

/// Write through a sibling temp file so readers never see a torn document
fn replace_file(path: &Path, contents: String) -> Result<()> {
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, contents)
        .map_err(|e| DriftError::StorageError(format!("Failed to write {}: {}", tmp.display(), e)))?;
    fs::rename(&tmp, path)
        .map_err(|e| DriftError::StorageError(format!("Failed to replace {}: {}", path.display(), e)))?;
    Ok(())
}

#[async_trait]
impl BaselineCollection for LocalStore {
    async fn upsert(&self, baseline: &BaselineSnapshot) -> Result<()> {
        BaselineCollection::upsert(&self.inner, baseline).await?;
        self.flush_baselines().await
    }

    async fn find_by_model(&self, model_id: &str) -> Result<Option<BaselineSnapshot>> {
        self.inner.find_by_model(model_id).await
    }
}

#[async_trait]
impl SnapshotCollection for LocalStore {
    async fn insert(&self, snapshot: &DriftSnapshot) -> Result<()> {
        SnapshotCollection::insert(&self.inner, snapshot).await?;
        self.flush_snapshots().await
    }

    async fn find_recent(&self, model_id: &str, limit: usize) -> Result<Vec<DriftSnapshot>> {
        self.inner.find_recent(model_id, limit).await
    }

    async fn purge_before(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let purged = SnapshotCollection::purge_before(&self.inner, cutoff).await?;
        if purged > 0 {
            self.flush_snapshots().await?;
        }
        Ok(purged)
    }
}

#[async_trait]
impl AlertCollection for LocalStore {
    async fn insert_or_increment(&self, candidate: Alert, open_since: DateTime<Utc>) -> Result<UpsertOutcome> {
        let outcome = self.inner.insert_or_increment(candidate, open_since).await?;
        self.flush_alerts().await?;
        Ok(outcome)
    }

    async fn apply(&self, id: &str, change: AlertChange) -> Result<bool> {
        let changed = self.inner.apply(id, change).await?;
        if changed {
            self.flush_alerts().await?;
        }
        Ok(changed)
    }

    async fn find(&self, query: &AlertQuery) -> Result<Vec<Alert>> {
        self.inner.find(query).await
    }

    async fn count(&self, query: &AlertQuery) -> Result<usize> {
        self.inner.count(query).await
    }

    async fn purge_before(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let purged = AlertCollection::purge_before(&self.inner, cutoff).await?;
        if purged > 0 {
            self.flush_alerts().await?;
        }
        Ok(purged)
    }
}

#[async_trait]
impl EvaluationSource for LocalStore {
    async fn fetch_since(&self, since: DateTime<Utc>, limit: usize) -> Result<Vec<EvaluationRecord>> {
        Ok(newest_evaluations(self.read_evaluations().await?, since, limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::{AlertRequest, AlertSeverity, AlertType};
    use crate::storage::Record;
    use chrono::Duration;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_alerts_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let now = Utc::now();
        let id = {
            let store = LocalStore::open(dir.path()).unwrap();
            let alert = Alert::from_request(
                AlertRequest {
                    model_id: "m".to_string(),
                    alert_type: AlertType::Stability,
                    severity: AlertSeverity::Critical,
                    metric_name: "explanation_similarity".to_string(),
                    metric_value: 0.4,
                    threshold: 0.6,
                    window_start: now,
                    window_end: now,
                    details: serde_json::Value::Null,
                },
                now,
            );
            let outcome = store.insert_or_increment(alert, now - Duration::hours(24)).await.unwrap();
            outcome.alert().id.clone()
        };

        let reopened = LocalStore::open(dir.path()).unwrap();
        let found = reopened.find(&AlertQuery::for_model("m")).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, id);
        assert!(!dir.path().join("alerts.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_reads_evaluation_log() {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::open(dir.path()).unwrap();
        let now = Utc::now();
        store
            .append_evaluations(&[
                EvaluationRecord::new(now - Duration::minutes(1), Record::new(), Some(0.1)),
                EvaluationRecord::new(now, Record::new(), Some(0.2)),
            ])
            .unwrap();
        fs::OpenOptions::new()
            .append(true)
            .open(store.evaluations_path())
            .and_then(|mut f| std::io::Write::write_all(&mut f, b"not json\n"))
            .unwrap();

        let records = store.fetch_since(now - Duration::hours(1), 10).await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].score, Some(0.2));
    }

    #[tokio::test]
    async fn test_empty_dir_opens_clean() {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::open(dir.path().join("nested")).unwrap();
        assert!(store.find_by_model("m").await.unwrap().is_none());
        assert!(store.fetch_since(Utc::now(), 10).await.unwrap().is_empty());
    }

    fn alert(metric: &str, now: DateTime<Utc>) -> Alert {
        Alert::from_request(
            AlertRequest {
                model_id: "m".to_string(),
                alert_type: AlertType::PopulationDrift,
                severity: AlertSeverity::Warning,
                metric_name: metric.to_string(),
                metric_value: 0.3,
                threshold: 0.2,
                window_start: now,
                window_end: now,
                details: serde_json::Value::Null,
            },
            now,
        )
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_writes_all_persist() {
        let dir = TempDir::new().unwrap();
        let store = std::sync::Arc::new(LocalStore::open(dir.path()).unwrap());
        let now = Utc::now();

        let writers: Vec<_> = (0..24)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move {
                    store
                        .insert_or_increment(alert(&format!("psi_f{}", i), now), now - Duration::hours(24))
                        .await
                })
            })
            .collect();
        for writer in writers {
            writer.await.unwrap().unwrap();
        }

        let reopened = LocalStore::open(dir.path()).unwrap();
        assert_eq!(reopened.count(&AlertQuery::for_model("m")).await.unwrap(), 24);
    }

    #[tokio::test]
    async fn test_floats_survive_reopen_exactly() {
        let dir = TempDir::new().unwrap();
        let records: Vec<Record> = (0..40)
            .map(|k| {
                serde_json::json!({"x": k as f64 / 3.0 + 0.1 + 0.2, "risk_score": (k as f64).sqrt() / 7.0})
                    .as_object()
                    .cloned()
                    .unwrap()
            })
            .collect();
        let baseline = BaselineSnapshot::build("m", &records, &["x".to_string()], "risk_score", &[]).unwrap();
        LocalStore::open(dir.path()).unwrap().upsert(&baseline).await.unwrap();

        let loaded = LocalStore::open(dir.path()).unwrap().find_by_model("m").await.unwrap().unwrap();
        let (before, after) = (
            baseline.feature_stats["x"].as_numeric().unwrap(),
            loaded.feature_stats["x"].as_numeric().unwrap(),
        );
        assert_eq!(before.mean.to_bits(), after.mean.to_bits());
        assert_eq!(before.std.to_bits(), after.std.to_bits());
        assert_eq!(before.bin_edges, after.bin_edges);
        assert_eq!(loaded, baseline);
    }
}
