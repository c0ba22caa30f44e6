//! Kolosal Drift CLI Module
//!
//! Command-line interface for running drift detection and inspecting
//! baselines, alerts and snapshot history.

use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::*;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::alerts::{Alert, AlertSeverity};
use crate::config::{MonitorConfig, StorageConfig};
use crate::context::MonitorContext;
use crate::drift::{DriftSnapshot, Severity};
use crate::monitoring::MetricsSink;
use crate::storage::{minutes_before, Record};
use crate::worker::{RunMode, RunOutcome};

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn step_ok(msg: &str) {
    println!("  {} {}", ok("✓"), msg);
}

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

fn kv(key: &str, val: &str) {
    println!("  {:<20} {}", muted(key), val.white());
}

fn severity_label(severity: Severity) -> ColoredString {
    match severity {
        Severity::Stable => ok("stable"),
        Severity::Warning => "warning".yellow(),
        Severity::Critical => "critical".red().bold(),
    }
}

fn alert_severity_label(severity: AlertSeverity) -> ColoredString {
    match severity {
        AlertSeverity::Info => muted("info"),
        AlertSeverity::Warning => "warning".yellow(),
        AlertSeverity::Critical => "critical".red().bold(),
    }
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "kolosal-drift")]
#[command(author = "KolosalAI")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Drift monitoring for deployed models")]
#[command(long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Model to operate on
    #[arg(long, global = true, env = "DRIFT_MODEL_ID")]
    pub model_id: Option<String>,

    /// Directory of the local store (in-memory when unset)
    #[arg(long, global = true, env = "DRIFT_STORE_DIR")]
    pub store_dir: Option<PathBuf>,

    /// JSON configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Print machine-readable JSON instead of formatted output
    #[arg(long, global = true)]
    pub json: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    Streaming,
    Batch,
}

impl From<ModeArg> for RunMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Streaming => RunMode::Streaming,
            ModeArg::Batch => RunMode::Batch,
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run drift detection
    Run {
        /// Window mode
        #[arg(long, value_enum, default_value = "streaming")]
        mode: ModeArg,

        /// Window length (minutes for streaming, days for batch)
        #[arg(long)]
        window: Option<i64>,

        /// Maximum evaluations to analyze
        #[arg(long)]
        max_samples: Option<usize>,

        /// Keep running streaming detection until interrupted
        #[arg(long)]
        continuous: bool,

        /// Minutes between continuous runs
        #[arg(long, env = "DRIFT_INTERVAL_MINUTES")]
        interval: Option<u64>,
    },

    /// Manage baselines
    Baseline {
        #[command(subcommand)]
        command: BaselineCommand,
    },

    /// Inspect and manage alerts
    Alerts {
        #[command(subcommand)]
        command: AlertsCommand,
    },

    /// Show drift snapshot history
    Metrics {
        /// Number of snapshots to show
        #[arg(long, default_value = "10")]
        limit: usize,

        /// Render the latest snapshot as Prometheus gauges
        #[arg(long)]
        prometheus: bool,
    },
}

#[derive(Subcommand)]
pub enum BaselineCommand {
    /// Build a baseline from reference data (JSON array or JSON lines)
    Create {
        /// Reference data file
        #[arg(short, long)]
        data: PathBuf,

        /// Feature names, comma separated
        #[arg(short, long, value_delimiter = ',', required = true)]
        features: Vec<String>,

        /// Score field (defaults to the configured one)
        #[arg(long)]
        score_field: Option<String>,

        /// Protected attributes, comma separated
        #[arg(long, value_delimiter = ',')]
        protected: Vec<String>,
    },

    /// Show the current baseline
    Show,

    /// Export the current baseline to a JSON file
    Export {
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Import a baseline JSON file
    Import {
        #[arg(short, long)]
        input: PathBuf,
    },
}

#[derive(Subcommand)]
pub enum AlertsCommand {
    /// List unresolved alerts
    List {
        /// Only this severity (info, warning, critical)
        #[arg(long)]
        severity: Option<AlertSeverity>,

        #[arg(long, default_value = "50")]
        limit: usize,
    },

    /// Alerts raised in the trailing window
    History {
        #[arg(long, default_value = "7")]
        days: i64,

        #[arg(long, default_value = "100")]
        limit: usize,
    },

    /// Resolve an alert
    Resolve {
        #[arg(long)]
        id: String,

        #[arg(long)]
        note: Option<String>,
    },

    /// Acknowledge an alert
    Ack {
        #[arg(long)]
        id: String,

        #[arg(long)]
        by: String,
    },

    /// Check whether open critical alerts call for retraining
    RetrainCheck,
}

// ─── Context ───────────────────────────────────────────────────────────────────

/// Resolve configuration: file (or environment defaults), then flags
pub fn build_config(global: &GlobalArgs) -> anyhow::Result<MonitorConfig> {
    let mut config = match &global.config {
        Some(path) => MonitorConfig::from_file(path)?,
        None => MonitorConfig::default(),
    };
    if let Some(model_id) = &global.model_id {
        config.model_id = model_id.clone();
    }
    if let Some(dir) = &global.store_dir {
        config.storage = StorageConfig::Local { dir: dir.clone() };
    }
    Ok(config)
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Load reference records from a JSON array or a JSON-lines file
pub fn load_records(path: &Path) -> anyhow::Result<Vec<Record>> {
    let contents = std::fs::read_to_string(path)?;
    let is_lines = path.extension().and_then(|e| e.to_str()) == Some("jsonl");

    if is_lines {
        contents
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(|l| Ok(serde_json::from_str::<Record>(l)?))
            .collect()
    } else {
        Ok(serde_json::from_str::<Vec<Record>>(&contents)?)
    }
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub async fn cmd_run(
    context: &MonitorContext,
    mode: ModeArg,
    window: Option<i64>,
    max_samples: Option<usize>,
    continuous: bool,
    interval: Option<u64>,
    json: bool,
) -> anyhow::Result<()> {
    let config = &context.config;
    let worker = &context.worker;

    if continuous {
        let window = window.unwrap_or(config.streaming.length);
        minutes_before(chrono::Utc::now(), window)?;
        let max_samples = max_samples.unwrap_or(config.streaming.max_samples);
        let interval = interval
            .map(|m| std::time::Duration::from_secs(m.max(1).saturating_mul(60)))
            .unwrap_or_else(|| config.interval());

        section("Continuous drift monitoring");
        kv("Model", context.model_id());
        kv("Interval", &format!("{}s", interval.as_secs()));
        println!("  {}", dim("press ctrl-c to stop"));

        worker
            .run_continuous(window, max_samples, interval, async {
                let _ = tokio::signal::ctrl_c().await;
            })
            .await;
        step_ok("Stopped");
        return Ok(());
    }

    let start = Instant::now();
    let outcome = match mode {
        ModeArg::Streaming => {
            worker
                .run_streaming(
                    window.unwrap_or(config.streaming.length),
                    max_samples.unwrap_or(config.streaming.max_samples),
                )
                .await?
        }
        ModeArg::Batch => {
            worker
                .run_batch(
                    window.unwrap_or(config.batch.length),
                    max_samples.unwrap_or(config.batch.max_samples),
                )
                .await?
        }
    };

    if json {
        return print_json(&outcome);
    }

    section(&format!("Drift detection ({:?})", RunMode::from(mode)).to_lowercase());
    match &outcome {
        RunOutcome::Completed(snapshot) => print_snapshot(snapshot),
        RunOutcome::Skipped(reason) => {
            let detail = reason
                .sample_count
                .map(|n| format!(" ({} samples)", n))
                .unwrap_or_default();
            println!("  {} {}{}", "skipped".yellow(), reason.error, dim(&detail));
        }
    }
    println!("  {}", dim(&format!("{:.2?}", start.elapsed())));
    println!();
    Ok(())
}

fn print_snapshot(snapshot: &DriftSnapshot) {
    let summary = &snapshot.summary;
    kv("Model", &snapshot.model_id);
    kv("Samples", &snapshot.sample_count.to_string());
    println!("  {:<20} {}", muted("Status"), severity_label(summary.overall_status));
    kv("Critical", &summary.critical_count.to_string());
    kv("Warnings", &summary.warning_count.to_string());
    kv("Needs retraining", if summary.needs_retraining { "yes" } else { "no" });

    if !summary.feature_drifts.is_empty() {
        println!();
        println!("  {:<24} {:>10} {:>10}", muted("Feature"), muted("PSI"), muted("Severity"));
        println!("  {}", dim(&"─".repeat(46)));
        for (name, drift) in &summary.feature_drifts {
            println!("  {:<24} {:>10.4} {:>10}", name, drift.psi, severity_label(drift.psi_severity));
        }
    }
    if let Some(score) = &summary.score_drift {
        println!();
        println!("  {:<24} {:>10.4} {:>10}", "score (kl)", score.kl, severity_label(score.kl_severity));
    }
    for finding in &summary.data_quality_drift {
        println!(
            "  {} {} {}",
            severity_label(finding.severity()),
            finding.feature(),
            dim(finding.kind())
        );
    }
}

pub async fn cmd_baseline(context: &MonitorContext, command: BaselineCommand, json: bool) -> anyhow::Result<()> {
    let baselines = &context.baselines;
    let model_id = context.model_id();

    match command {
        BaselineCommand::Create { data, features, score_field, protected } => {
            section("Create baseline");
            step_run(&format!("Loading {}", data.display()));
            let records = load_records(&data)?;
            step_done(&format!("{} records", records.len()));

            step_run("Building baseline");
            let start = Instant::now();
            let baseline = baselines
                .create_baseline(model_id, &records, &features, score_field.as_deref(), &protected)
                .await?;
            step_done(&format!("{:?}", start.elapsed()));

            if json {
                print_json(baseline.as_ref())?;
            } else {
                kv("Features", &baseline.feature_stats.len().to_string());
                kv("Sample size", &baseline.sample_size.to_string());
                kv("Score stats", if baseline.score_stats.is_some() { "yes" } else { "no" });
            }
        }
        BaselineCommand::Show => {
            let Some(baseline) = baselines.get_baseline(model_id).await? else {
                anyhow::bail!("No baseline for model '{}'", model_id);
            };
            if json {
                return print_json(baseline.as_ref());
            }
            section("Baseline");
            kv("Model", &baseline.model_id);
            kv("Created", &baseline.created_at.to_rfc3339());
            kv("Sample size", &baseline.sample_size.to_string());
            println!();
            println!("  {:<24} {:>12} {:>10}", muted("Feature"), muted("Kind"), muted("Null rate"));
            println!("  {}", dim(&"─".repeat(48)));
            for name in baseline.feature_names() {
                let kind = baseline.feature_stats.get(&name).map_or("empty", |s| s.kind());
                let null_rate = baseline.data_quality.null_rates.get(&name).copied().unwrap_or(0.0);
                println!("  {:<24} {:>12} {:>10.3}", name, kind, null_rate);
            }
        }
        BaselineCommand::Export { output } => {
            baselines.export_baseline(model_id, &output).await?;
            step_ok(&format!("Exported baseline → {}", output.display()));
        }
        BaselineCommand::Import { input } => {
            let baseline = baselines.import_baseline(&input).await?;
            step_ok(&format!("Imported baseline for {}", baseline.model_id.white().bold()));
        }
    }

    println!();
    Ok(())
}

fn print_alerts(alerts: &[Alert]) {
    if alerts.is_empty() {
        println!("  {}", dim("no alerts"));
        return;
    }
    println!(
        "  {:<36} {:>9} {:<28} {:>8} {:>5}",
        muted("Id"),
        muted("Severity"),
        muted("Metric"),
        muted("Value"),
        muted("Seen")
    );
    println!("  {}", dim(&"─".repeat(90)));
    for alert in alerts {
        let mut flags = String::new();
        if alert.acknowledged {
            flags.push_str(" ack");
        }
        if alert.resolved {
            flags.push_str(" resolved");
        }
        println!(
            "  {:<36} {:>9} {:<28} {:>8.4} {:>5}{}",
            alert.id,
            alert_severity_label(alert.severity),
            alert.metric_name,
            alert.metric_value,
            alert.occurrence_count,
            dim(&flags)
        );
    }
}

pub async fn cmd_alerts(context: &MonitorContext, command: AlertsCommand, json: bool) -> anyhow::Result<()> {
    let alerts = &context.alerts;
    let model_id = context.model_id();

    match command {
        AlertsCommand::List { severity, limit } => {
            let active = alerts.get_active_alerts(Some(model_id), severity, limit).await?;
            if json {
                return print_json(&active);
            }
            section("Active alerts");
            print_alerts(&active);
        }
        AlertsCommand::History { days, limit } => {
            let history = alerts.get_alert_history(model_id, days, limit).await?;
            if json {
                return print_json(&history);
            }
            section(&format!("Alerts, last {} days", days));
            print_alerts(&history);
        }
        AlertsCommand::Resolve { id, note } => {
            if alerts.resolve_alert(&id, note).await? {
                step_ok(&format!("Resolved {}", id));
            } else {
                println!("  {} {}", "unchanged".yellow(), dim("unknown id or already resolved"));
            }
        }
        AlertsCommand::Ack { id, by } => {
            if alerts.acknowledge_alert(&id, &by).await? {
                step_ok(&format!("Acknowledged {}", id));
            } else {
                println!("  {} {}", "unchanged".yellow(), dim("unknown id or already acknowledged"));
            }
        }
        AlertsCommand::RetrainCheck => {
            let retrain = alerts.should_trigger_retraining(model_id).await?;
            if json {
                return print_json(&serde_json::json!({ "model_id": model_id, "should_retrain": retrain }));
            }
            if retrain {
                println!("  {} {}", "retrain".red().bold(), model_id);
            } else {
                step_ok(&format!("{} does not need retraining", model_id));
            }
        }
    }

    println!();
    Ok(())
}

pub async fn cmd_metrics(context: &MonitorContext, limit: usize, prometheus: bool, json: bool) -> anyhow::Result<()> {
    let snapshots = context.collections.snapshots.find_recent(context.model_id(), limit).await?;

    if prometheus {
        if let Some(latest) = snapshots.first() {
            context.exporter.export(latest)?;
        }
        print!("{}", context.exporter.render_prometheus());
        return Ok(());
    }
    if json {
        return print_json(&snapshots);
    }

    section("Drift history");
    if snapshots.is_empty() {
        println!("  {}", dim("no snapshots"));
    }
    for snapshot in &snapshots {
        println!(
            "  {}  {:>10}  {:>6} samples  {} critical  {} warnings",
            snapshot.window_end.format("%Y-%m-%d %H:%M"),
            severity_label(snapshot.summary.overall_status),
            snapshot.sample_count,
            snapshot.summary.critical_count,
            snapshot.summary.warning_count
        );
    }
    println!();
    Ok(())
}

/// Dispatch a parsed command line
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = build_config(&cli.global)?;
    if !config.storage.is_persistent() && !matches!(cli.command, Commands::Run { .. }) {
        eprintln!(
            "  {} {}",
            "note".yellow(),
            dim("no --store-dir given; state will not outlive this process")
        );
    }
    let context = MonitorContext::new(config)?;
    let json = cli.global.json;

    match cli.command {
        Commands::Run { mode, window, max_samples, continuous, interval } => {
            cmd_run(&context, mode, window, max_samples, continuous, interval, json).await
        }
        Commands::Baseline { command } => cmd_baseline(&context, command, json).await,
        Commands::Alerts { command } => cmd_alerts(&context, command, json).await,
        Commands::Metrics { limit, prometheus } => cmd_metrics(&context, limit, prometheus, json).await,
    }
}
