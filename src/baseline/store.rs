//! Cached, persisted baselines

use super::snapshot::BaselineSnapshot;
use crate::error::{DriftError, Result};
use crate::storage::{with_timeout, BaselineCollection, Record};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

/// Owner of every model's baseline.
///
/// Readers get an `Arc` to an immutable snapshot; replacement swaps the whole
/// `Arc`, so nobody observes a half-written baseline.
pub struct BaselineStore {
    collection: Arc<dyn BaselineCollection>,
    cache: RwLock<HashMap<String, Arc<BaselineSnapshot>>>,
    score_field: String,
    io_timeout: Duration,
}

impl BaselineStore {
    pub fn new(collection: Arc<dyn BaselineCollection>, score_field: impl Into<String>, io_timeout: Duration) -> Self {
        Self {
            collection,
            cache: RwLock::new(HashMap::new()),
            score_field: score_field.into(),
            io_timeout,
        }
    }

    pub fn score_field(&self) -> &str {
        &self.score_field
    }

    /// Build a baseline from `records`, persist it and make it current.
    ///
    /// A persistence failure is logged; the new baseline still replaces the
    /// cached one.
    pub async fn create_baseline(
        &self,
        model_id: &str,
        records: &[Record],
        feature_names: &[String],
        score_field: Option<&str>,
        protected_attributes: &[String],
    ) -> Result<Arc<BaselineSnapshot>> {
        let score_field = score_field.unwrap_or(self.score_field.as_str());
        let baseline =
            BaselineSnapshot::build(model_id, records, feature_names, score_field, protected_attributes)?;
        info!(
            model_id,
            sample_size = baseline.sample_size,
            features = baseline.feature_stats.len(),
            "Created baseline"
        );
        Ok(self.install(baseline).await)
    }

    /// Current baseline for `model_id`, loading it from storage on a cache miss
    pub async fn get_baseline(&self, model_id: &str) -> Result<Option<Arc<BaselineSnapshot>>> {
        if let Some(cached) = self.cache.read().get(model_id) {
            return Ok(Some(cached.clone()));
        }

        let loaded = with_timeout(
            self.io_timeout,
            "find_baseline",
            self.collection.find_by_model(model_id),
        )
        .await?;

        // A baseline installed while the read was in flight is newer; keep it
        Ok(loaded.map(|baseline| {
            self.cache
                .write()
                .entry(model_id.to_string())
                .or_insert_with(|| Arc::new(baseline))
                .clone()
        }))
    }

    /// Rebuild the baseline from fresh records with the previous feature set.
    ///
    /// Incremental merging is not supported and fails with `NotImplemented`.
    pub async fn update_baseline(
        &self,
        model_id: &str,
        records: &[Record],
        merge: bool,
    ) -> Result<Arc<BaselineSnapshot>> {
        if merge {
            return Err(DriftError::NotImplemented(
                "incremental baseline merge".to_string(),
            ));
        }

        let previous = self.get_baseline(model_id).await?;
        let (features, protected) = previous
            .as_deref()
            .map(|b| (b.feature_names(), b.protected_attributes()))
            .unwrap_or_default();

        self.create_baseline(model_id, records, &features, None, &protected).await
    }

    /// Serialise the current baseline to a JSON document
    pub async fn export_document(&self, model_id: &str) -> Result<String> {
        let baseline = self
            .get_baseline(model_id)
            .await?
            .ok_or_else(|| DriftError::DataError(format!("No baseline for model '{}'", model_id)))?;
        Ok(serde_json::to_string_pretty(baseline.as_ref())?)
    }

    /// Parse a baseline document and make it current for its model
    pub async fn import_document(&self, document: &str) -> Result<Arc<BaselineSnapshot>> {
        let baseline: BaselineSnapshot = serde_json::from_str(document)?;
        info!(model_id = %baseline.model_id, "Imported baseline");
        Ok(self.install(baseline).await)
    }

    pub async fn export_baseline(&self, model_id: &str, path: impl AsRef<Path>) -> Result<()> {
        let document = self.export_document(model_id).await?;
        fs::write(path.as_ref(), document)?;
        info!(model_id, path = %path.as_ref().display(), "Exported baseline");
        Ok(())
    }

    pub async fn import_baseline(&self, path: impl AsRef<Path>) -> Result<Arc<BaselineSnapshot>> {
        let document = fs::read_to_string(path.as_ref())?;
        self.import_document(&document).await
    }

    async fn install(&self, baseline: BaselineSnapshot) -> Arc<BaselineSnapshot> {
        if let Err(e) = with_timeout(self.io_timeout, "upsert_baseline", self.collection.upsert(&baseline)).await {
            error!(model_id = %baseline.model_id, error = %e, "Failed to persist baseline");
        }
        let baseline = Arc::new(baseline);
        self.cache.write().insert(baseline.model_id.clone(), baseline.clone());
        baseline
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use serde_json::json;

    fn store() -> (BaselineStore, Arc<MemoryStore>) {
        let backend = Arc::new(MemoryStore::new());
        (BaselineStore::new(backend.clone(), "risk_score", Duration::from_secs(1)), backend)
    }

    fn records(offset: f64) -> Vec<Record> {
        (0..30)
            .map(|i| {
                json!({"x": offset + i as f64, "risk_score": 0.5})
                    .as_object()
                    .cloned()
                    .unwrap()
            })
            .collect()
    }

    #[tokio::test]
    async fn test_create_then_get_from_cache_and_backend() {
        let (store, backend) = store();
        let created = store
            .create_baseline("m", &records(0.0), &["x".to_string()], None, &[])
            .await
            .unwrap();
        let cached = store.get_baseline("m").await.unwrap().unwrap();
        assert!(Arc::ptr_eq(&created, &cached));

        // A second store over the same backend loads from storage
        let fresh = BaselineStore::new(backend, "risk_score", Duration::from_secs(1));
        let loaded = fresh.get_baseline("m").await.unwrap().unwrap();
        assert_eq!(loaded.as_ref(), created.as_ref());
        assert!(fresh.get_baseline("unknown").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_with_merge_is_not_implemented() {
        let (store, _) = store();
        let err = store.update_baseline("m", &records(0.0), true).await.unwrap_err();
        assert!(matches!(err, DriftError::NotImplemented(_)));
    }

    #[tokio::test]
    async fn test_update_reuses_feature_set() {
        let (store, _) = store();
        store
            .create_baseline("m", &records(0.0), &["x".to_string()], None, &[])
            .await
            .unwrap();
        let updated = store.update_baseline("m", &records(100.0), false).await.unwrap();
        let x = updated.feature_stats["x"].as_numeric().unwrap();
        assert_eq!(x.min, 100.0);
        assert!(updated.score_stats.is_some());
    }

    #[tokio::test]
    async fn test_document_round_trip() {
        let (store, _) = store();
        let created = store
            .create_baseline("m", &records(0.0), &["x".to_string()], None, &[])
            .await
            .unwrap();
        let document = store.export_document("m").await.unwrap();

        let (other, _) = self::store();
        let imported = other.import_document(&document).await.unwrap();
        assert_eq!(imported.as_ref(), created.as_ref());
        assert!(other.get_baseline("m").await.unwrap().is_some());
    }

    /// Backend whose reads stall, so a writer can overtake them
    struct SlowReads {
        inner: MemoryStore,
        delay: Duration,
    }

    #[async_trait::async_trait]
    impl BaselineCollection for SlowReads {
        async fn upsert(&self, baseline: &BaselineSnapshot) -> Result<()> {
            self.inner.upsert(baseline).await
        }

        async fn find_by_model(&self, model_id: &str) -> Result<Option<BaselineSnapshot>> {
            let found = self.inner.find_by_model(model_id).await;
            tokio::time::sleep(self.delay).await;
            found
        }
    }

    #[tokio::test]
    async fn test_slow_load_does_not_replace_newer_baseline() {
        let backend = Arc::new(SlowReads { inner: MemoryStore::new(), delay: Duration::from_millis(200) });
        let seed = BaselineSnapshot::build("m", &records(0.0), &["x".to_string()], "risk_score", &[]).unwrap();
        backend.upsert(&seed).await.unwrap();

        let store = Arc::new(BaselineStore::new(backend, "risk_score", Duration::from_secs(5)));
        let reader = {
            let store = store.clone();
            tokio::spawn(async move { store.get_baseline("m").await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        let fresh = store
            .create_baseline("m", &records(100.0), &["x".to_string()], None, &[])
            .await
            .unwrap();
        let raced = reader.await.unwrap().unwrap().unwrap();
        assert!(Arc::ptr_eq(&raced, &fresh));

        let current = store.get_baseline("m").await.unwrap().unwrap();
        assert_eq!(current.feature_stats["x"].as_numeric().unwrap().min, 100.0);
    }

    #[tokio::test]
    async fn test_export_missing_baseline() {
        let (store, _) = store();
        assert!(matches!(store.export_document("nope").await, Err(DriftError::DataError(_))));
    }
}
