//! Drift worker
//!
//! Runs the detection pipeline for one model: load the baseline, pull a
//! window of evaluations, compare, persist the snapshot, raise alerts and
//! export gauges. Every I/O step is best effort; a failure is logged and the
//! remaining steps still run.

mod pipeline;

pub use pipeline::{alert_requests, compute_drift};

use crate::alerts::AlertManager;
use crate::baseline::BaselineStore;
use crate::config::{MonitorConfig, WindowConfig};
use crate::drift::DriftSnapshot;
use crate::error::Result;
use crate::monitoring::MetricsSink;
use crate::storage::{days_before, minutes_before, with_timeout, Collections, RetentionPolicy};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Which window a run covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Minutes of recent traffic
    Streaming,
    /// Days of traffic
    Batch,
}

/// Why a run stopped before computing anything
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunError {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_count: Option<usize>,
}

impl RunError {
    pub fn no_baseline() -> Self {
        Self { error: "No baseline available".to_string(), sample_count: None }
    }

    pub fn insufficient_samples(sample_count: usize) -> Self {
        Self { error: "Insufficient samples".to_string(), sample_count: Some(sample_count) }
    }

    pub fn computation_failed() -> Self {
        Self { error: "Drift computation failed".to_string(), sample_count: None }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RunOutcome {
    Completed(Box<DriftSnapshot>),
    Skipped(RunError),
}

impl RunOutcome {
    pub fn snapshot(&self) -> Option<&DriftSnapshot> {
        match self {
            RunOutcome::Completed(snapshot) => Some(snapshot.as_ref()),
            RunOutcome::Skipped(_) => None,
        }
    }

    pub fn skipped(&self) -> Option<&RunError> {
        match self {
            RunOutcome::Skipped(reason) => Some(reason),
            RunOutcome::Completed(_) => None,
        }
    }
}

/// Drift detection for one model
#[derive(Clone)]
pub struct DriftWorker {
    model_id: String,
    collections: Collections,
    baselines: Arc<BaselineStore>,
    alerts: Arc<AlertManager>,
    metrics: Arc<dyn MetricsSink>,
    streaming: WindowConfig,
    batch: WindowConfig,
    retention: RetentionPolicy,
    min_feature_samples: usize,
    io_timeout: Duration,
}

impl DriftWorker {
    pub fn new(
        config: &MonitorConfig,
        collections: Collections,
        baselines: Arc<BaselineStore>,
        alerts: Arc<AlertManager>,
        metrics: Arc<dyn MetricsSink>,
    ) -> Self {
        Self {
            model_id: config.model_id.clone(),
            collections,
            baselines,
            alerts,
            metrics,
            streaming: config.streaming,
            batch: config.batch,
            retention: config.retention,
            min_feature_samples: config.min_feature_samples,
            io_timeout: config.io_timeout(),
        }
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    /// Compare the last `window_minutes` of traffic against the baseline.
    ///
    /// Fails with `InvalidInput` only when the window cannot be placed on the
    /// calendar; everything after that is reported through the outcome.
    pub async fn run_streaming(&self, window_minutes: i64, max_samples: usize) -> Result<RunOutcome> {
        info!(model_id = %self.model_id, window_minutes, max_samples, "Running streaming drift detection");
        let window_start = minutes_before(Utc::now(), window_minutes)?;
        Ok(self
            .run_window(RunMode::Streaming, window_start, max_samples, self.streaming.min_samples)
            .await)
    }

    /// Compare the last `lookback_days` of traffic against the baseline
    pub async fn run_batch(&self, lookback_days: i64, max_samples: usize) -> Result<RunOutcome> {
        info!(model_id = %self.model_id, lookback_days, max_samples, "Running batch drift detection");
        let window_start = days_before(Utc::now(), lookback_days)?;
        Ok(self
            .run_window(RunMode::Batch, window_start, max_samples, self.batch.min_samples)
            .await)
    }

    /// Run with the configured window for `mode`
    pub async fn run(&self, mode: RunMode) -> Result<RunOutcome> {
        match mode {
            RunMode::Streaming => self.run_streaming(self.streaming.length, self.streaming.max_samples).await,
            RunMode::Batch => self.run_batch(self.batch.length, self.batch.max_samples).await,
        }
    }

    async fn run_window(
        &self,
        mode: RunMode,
        window_start: DateTime<Utc>,
        max_samples: usize,
        min_samples: usize,
    ) -> RunOutcome {
        let baseline = match self.baselines.get_baseline(&self.model_id).await {
            Ok(Some(baseline)) => baseline,
            Ok(None) => {
                warn!(model_id = %self.model_id, "No baseline found");
                return RunOutcome::Skipped(RunError::no_baseline());
            }
            Err(e) => {
                error!(model_id = %self.model_id, error = %e, "Failed to load baseline");
                return RunOutcome::Skipped(RunError::no_baseline());
            }
        };

        let evaluations = match with_timeout(
            self.io_timeout,
            "fetch_evaluations",
            self.collections.evaluations.fetch_since(window_start, max_samples),
        )
        .await
        {
            Ok(evaluations) => evaluations,
            Err(e) => {
                warn!(model_id = %self.model_id, error = %e, "Failed to fetch evaluations");
                Vec::new()
            }
        };

        let sample_count = evaluations.len();
        if sample_count < min_samples {
            info!(model_id = %self.model_id, sample_count, min_samples, "Insufficient samples, skipping detection");
            return RunOutcome::Skipped(RunError::insufficient_samples(sample_count));
        }
        debug!(model_id = %self.model_id, ?mode, sample_count, "Analyzing samples");

        let window_end = Utc::now();
        let min_feature_samples = self.min_feature_samples;
        let computed = tokio::task::spawn_blocking(move || {
            compute_drift(&baseline, &evaluations, window_start, window_end, min_feature_samples)
        })
        .await;
        let snapshot = match computed {
            Ok(snapshot) => snapshot,
            Err(e) => {
                error!(model_id = %self.model_id, error = %e, "Drift computation failed");
                return RunOutcome::Skipped(RunError::computation_failed());
            }
        };

        self.store_snapshot(&snapshot).await;
        self.raise_alerts(&snapshot).await;
        if let Err(e) = self.metrics.export(&snapshot) {
            warn!(model_id = %self.model_id, error = %e, "Failed to export drift metrics");
        }

        info!(
            model_id = %self.model_id,
            status = %snapshot.summary.overall_status,
            critical = snapshot.summary.critical_count,
            warnings = snapshot.summary.warning_count,
            needs_retraining = snapshot.summary.needs_retraining,
            "Drift detection complete"
        );
        RunOutcome::Completed(Box::new(snapshot))
    }

    async fn store_snapshot(&self, snapshot: &DriftSnapshot) {
        match with_timeout(self.io_timeout, "insert_snapshot", self.collections.snapshots.insert(snapshot)).await {
            Ok(()) => debug!(model_id = %snapshot.model_id, status = %snapshot.summary.overall_status, "Stored snapshot"),
            Err(e) => error!(model_id = %snapshot.model_id, error = %e, "Failed to store snapshot"),
        }
    }

    async fn raise_alerts(&self, snapshot: &DriftSnapshot) {
        for request in alert_requests(snapshot) {
            let metric = request.metric_name.clone();
            if let Err(e) = self.alerts.create_alert(request).await {
                warn!(model_id = %snapshot.model_id, metric = %metric, error = %e, "Failed to create alert");
            }
        }
    }

    /// Drop snapshots and alerts past their retention age
    pub async fn apply_retention(&self) {
        match self.collections.purge_expired(Utc::now(), self.retention).await {
            Ok((snapshots, alerts)) if snapshots + alerts > 0 => {
                info!(snapshots, alerts, "Purged expired drift history")
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "Retention purge failed"),
        }
    }

    /// Run streaming detection every `interval` until `shutdown` resolves.
    ///
    /// Each iteration runs in its own task so a panic is logged instead of
    /// ending the loop. An iteration in progress is allowed to finish.
    pub async fn run_continuous<F>(&self, window_minutes: i64, max_samples: usize, interval: Duration, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        info!(model_id = %self.model_id, interval_secs = interval.as_secs(), "Starting continuous drift monitoring");
        tokio::pin!(shutdown);

        loop {
            let worker = self.clone();
            let iteration =
                tokio::spawn(async move { worker.run_streaming(window_minutes, max_samples).await });
            match iteration.await {
                Ok(Ok(RunOutcome::Completed(snapshot))) => {
                    debug!(status = %snapshot.summary.overall_status, "Iteration complete")
                }
                Ok(Ok(RunOutcome::Skipped(reason))) => debug!(reason = %reason.error, "Iteration skipped"),
                Ok(Err(e)) => error!(error = %e, "Drift iteration failed"),
                Err(e) => error!(error = %e, "Drift iteration panicked"),
            }
            self.apply_retention().await;

            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                _ = tokio::time::sleep(interval) => {}
            }
        }

        info!(model_id = %self.model_id, "Continuous drift monitoring stopped");
    }
}
