//! Kolosal Drift - Model drift monitoring
//!
//! This crate compares live model evaluations against a stored reference
//! distribution and raises deduplicated alerts when they diverge.
//!
//! # Modules
//!
//! ## Metrics
//! - [`drift`] - PSI, KL divergence, Wasserstein distance, fairness,
//!   data quality and explanation stability metrics
//!
//! ## State
//! - [`baseline`] - Baseline snapshots and their cached store
//! - [`alerts`] - Alert lifecycle, deduplication and notification
//! - [`storage`] - Collection traits with in-memory and local JSON backends
//!
//! ## Services
//! - [`worker`] - Windowed drift runs, one-shot or continuous
//! - [`monitoring`] - Prometheus-style drift gauges
//! - [`context`] - Wiring of all components for one model
//! - [`cli`] - Command-line interface

// Core error handling
pub mod error;
pub mod config;

// Metrics
pub mod drift;

// State
pub mod storage;
pub mod baseline;
pub mod alerts;

// Services
pub mod monitoring;
pub mod worker;
pub mod context;
pub mod cli;

pub use error::{DriftError, Result};

/// Re-export commonly used types
pub mod prelude {
    // Error handling
    pub use crate::error::{DriftError, Result};

    // Configuration
    pub use crate::config::{MonitorConfig, StorageConfig, WindowConfig};

    // Drift metrics
    pub use crate::drift::{
        aggregate_drift_metrics, compute_kl_divergence, compute_psi, compute_wasserstein_distance,
        DriftSnapshot, DriftSummary, Severity,
    };

    // Baselines
    pub use crate::baseline::{BaselineSnapshot, BaselineStore, FeatureStats};

    // Alerts
    pub use crate::alerts::{Alert, AlertManager, AlertRequest, AlertSeverity, AlertType, Notifier};

    // Storage
    pub use crate::storage::{Collections, EvaluationRecord, LocalStore, MemoryStore, Record};

    // Worker
    pub use crate::worker::{DriftWorker, RunMode, RunOutcome};

    // Monitoring
    pub use crate::monitoring::{DriftMetricsExporter, MetricsSink};
    pub use crate::context::MonitorContext;
}
