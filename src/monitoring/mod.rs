//! Monitoring Module
//!
//! Publishes drift results as labelled gauges for an external scraper.

mod exporter;

pub use exporter::{DriftMetricsExporter, MetricsSink};
