//! Composition root: builds every component from one configuration

use crate::alerts::{AlertManager, LogNotifier, Notifier};
use crate::baseline::BaselineStore;
use crate::config::MonitorConfig;
use crate::error::Result;
use crate::monitoring::{DriftMetricsExporter, MetricsSink};
use crate::storage::Collections;
use crate::worker::DriftWorker;
use std::sync::Arc;
use tracing::debug;

/// Shared handles for one monitored model
pub struct MonitorContext {
    pub config: MonitorConfig,
    pub collections: Collections,
    pub baselines: Arc<BaselineStore>,
    pub alerts: Arc<AlertManager>,
    pub exporter: Arc<DriftMetricsExporter>,
    pub worker: DriftWorker,
}

impl MonitorContext {
    /// Build with the storage backend named in `config`
    pub fn new(config: MonitorConfig) -> Result<Self> {
        config.validate()?;
        let collections = Collections::from_config(&config.storage)?;
        Ok(Self::with_collections(config, collections))
    }

    /// Build over caller-provided collections
    pub fn with_collections(config: MonitorConfig, collections: Collections) -> Self {
        let io_timeout = config.io_timeout();
        let baselines = Arc::new(BaselineStore::new(
            collections.baselines.clone(),
            config.score_field.clone(),
            io_timeout,
        ));
        let alerts = Arc::new(AlertManager::new(collections.alerts.clone(), io_timeout));
        alerts.add_notifier(Arc::new(LogNotifier));
        let exporter = Arc::new(DriftMetricsExporter::new());
        let sink: Arc<dyn MetricsSink> = exporter.clone();
        let worker = DriftWorker::new(&config, collections.clone(), baselines.clone(), alerts.clone(), sink);

        debug!(model_id = %config.model_id, storage = ?config.storage, "Monitor context ready");
        Self { config, collections, baselines, alerts, exporter, worker }
    }

    /// Register an extra notifier alongside the default log notifier
    pub fn add_notifier(&self, notifier: Arc<dyn Notifier>) {
        self.alerts.add_notifier(notifier);
    }

    pub fn model_id(&self) -> &str {
        &self.config.model_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageConfig;

    #[test]
    fn test_memory_context() {
        let config = MonitorConfig {
            model_id: "ctx".to_string(),
            storage: StorageConfig::Memory,
            ..MonitorConfig::default()
        };
        let context = MonitorContext::new(config).unwrap();
        assert_eq!(context.model_id(), "ctx");
        assert_eq!(context.worker.model_id(), "ctx");
        assert_eq!(context.baselines.score_field(), context.config.score_field);
    }

    #[test]
    fn test_local_context_creates_dir() {
        let dir = tempfile::TempDir::new().unwrap();
        let store_dir = dir.path().join("drift");
        let config = MonitorConfig {
            storage: StorageConfig::Local { dir: store_dir.clone() },
            ..MonitorConfig::default()
        };
        MonitorContext::new(config).unwrap();
        assert!(store_dir.is_dir());
    }
}
