//! Alert manager: dedup, lifecycle and retraining decision

use super::{Alert, AlertRequest, AlertSeverity};
use crate::error::Result;
use crate::storage::{days_before, with_timeout, AlertChange, AlertCollection, AlertQuery};
use chrono::{Duration as ChronoDuration, Utc};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Repeat detections inside this window fold into the open alert
pub const DEDUP_WINDOW_HOURS: i64 = 24;
/// Open critical alerts within the dedup window that call for retraining
pub const RETRAINING_ALERT_COUNT: usize = 2;

/// Receives newly created alerts
pub trait Notifier: Send + Sync {
    fn notify(&self, alert: &Alert) -> Result<()>;
}

impl<F> Notifier for F
where
    F: Fn(&Alert) -> Result<()> + Send + Sync,
{
    fn notify(&self, alert: &Alert) -> Result<()> {
        self(alert)
    }
}

/// Emits a structured log event per new alert
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, alert: &Alert) -> Result<()> {
        match alert.severity {
            AlertSeverity::Critical => warn!(
                model_id = %alert.model_id,
                alert_type = %alert.alert_type,
                metric = %alert.metric_name,
                value = alert.metric_value,
                threshold = alert.threshold,
                "Critical drift alert"
            ),
            _ => info!(
                model_id = %alert.model_id,
                alert_type = %alert.alert_type,
                severity = %alert.severity,
                metric = %alert.metric_name,
                value = alert.metric_value,
                "Drift alert"
            ),
        }
        Ok(())
    }
}

/// Owns the alert collection on behalf of the rest of the monitor
pub struct AlertManager {
    alerts: Arc<dyn AlertCollection>,
    notifiers: RwLock<Vec<Arc<dyn Notifier>>>,
    io_timeout: Duration,
}

impl AlertManager {
    pub fn new(alerts: Arc<dyn AlertCollection>, io_timeout: Duration) -> Self {
        Self {
            alerts,
            notifiers: RwLock::new(Vec::new()),
            io_timeout,
        }
    }

    /// Register a notifier called for every newly inserted alert
    pub fn add_notifier(&self, notifier: Arc<dyn Notifier>) {
        self.notifiers.write().push(notifier);
    }

    /// Raise an alert, folding it into an open one with the same fingerprint.
    ///
    /// Only a fresh insert notifies; notifier failures are logged and dropped.
    pub async fn create_alert(&self, request: AlertRequest) -> Result<Alert> {
        let now = Utc::now();
        let candidate = Alert::from_request(request, now);
        let open_since = now - ChronoDuration::hours(DEDUP_WINDOW_HOURS);

        let outcome = with_timeout(
            self.io_timeout,
            "upsert_alert",
            self.alerts.insert_or_increment(candidate, open_since),
        )
        .await?;

        if outcome.is_inserted() {
            self.dispatch(outcome.alert());
        }
        Ok(outcome.into_alert())
    }

    /// Mark an alert resolved; `false` if unknown or already resolved
    pub async fn resolve_alert(&self, alert_id: &str, note: Option<String>) -> Result<bool> {
        let change = AlertChange::Resolve { at: Utc::now(), note };
        let changed = with_timeout(self.io_timeout, "resolve_alert", self.alerts.apply(alert_id, change)).await?;
        if changed {
            info!(alert_id, "Resolved alert");
        }
        Ok(changed)
    }

    /// Mark an alert acknowledged; `false` if unknown or already acknowledged
    pub async fn acknowledge_alert(&self, alert_id: &str, acknowledged_by: &str) -> Result<bool> {
        let change = AlertChange::Acknowledge { by: acknowledged_by.to_string(), at: Utc::now() };
        let changed =
            with_timeout(self.io_timeout, "acknowledge_alert", self.alerts.apply(alert_id, change)).await?;
        if changed {
            info!(alert_id, acknowledged_by, "Acknowledged alert");
        }
        Ok(changed)
    }

    /// Unresolved alerts, newest first
    pub async fn get_active_alerts(
        &self,
        model_id: Option<&str>,
        severity: Option<AlertSeverity>,
        limit: usize,
    ) -> Result<Vec<Alert>> {
        let query = AlertQuery {
            model_id: model_id.map(str::to_string),
            ..Default::default()
        }
        .unresolved()
        .with_severity(severity)
        .limit(limit);
        with_timeout(self.io_timeout, "find_alerts", self.alerts.find(&query)).await
    }

    /// Alerts created in the trailing `days`, any state, newest first
    pub async fn get_alert_history(&self, model_id: &str, days: i64, limit: usize) -> Result<Vec<Alert>> {
        let query = AlertQuery::for_model(model_id)
            .since(days_before(Utc::now(), days)?)
            .limit(limit);
        with_timeout(self.io_timeout, "find_alerts", self.alerts.find(&query)).await
    }

    /// Whether enough open critical alerts piled up in the last day
    pub async fn should_trigger_retraining(&self, model_id: &str) -> Result<bool> {
        let query = AlertQuery::for_model(model_id)
            .unresolved()
            .with_severity(Some(AlertSeverity::Critical))
            .since(Utc::now() - ChronoDuration::hours(DEDUP_WINDOW_HOURS));
        let count = with_timeout(self.io_timeout, "count_alerts", self.alerts.count(&query)).await?;
        Ok(count >= RETRAINING_ALERT_COUNT)
    }

    fn dispatch(&self, alert: &Alert) {
        let notifiers = self.notifiers.read().clone();
        for notifier in notifiers {
            if let Err(e) = notifier.notify(alert) {
                warn!(alert_id = %alert.id, error = %e, "Alert notification failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::AlertType;
    use crate::error::DriftError;
    use crate::storage::MemoryStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn manager() -> AlertManager {
        AlertManager::new(Arc::new(MemoryStore::new()), Duration::from_secs(1))
    }

    fn request(metric: &str, severity: AlertSeverity) -> AlertRequest {
        let now = Utc::now();
        AlertRequest {
            model_id: "credit".to_string(),
            alert_type: AlertType::PopulationDrift,
            severity,
            metric_name: metric.to_string(),
            metric_value: 0.3,
            threshold: 0.25,
            window_start: now,
            window_end: now,
            details: serde_json::Value::Null,
        }
    }

    #[tokio::test]
    async fn test_notifies_only_on_insert() {
        let manager = manager();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        manager.add_notifier(Arc::new(move |_: &Alert| -> Result<()> {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }));

        let first = manager.create_alert(request("psi_x", AlertSeverity::Critical)).await.unwrap();
        let second = manager.create_alert(request("psi_x", AlertSeverity::Critical)).await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(second.occurrence_count, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failing_notifier_does_not_fail_create() {
        let manager = manager();
        manager.add_notifier(Arc::new(|_: &Alert| -> Result<()> {
            Err(DriftError::StorageError("webhook down".to_string()))
        }));
        manager.add_notifier(Arc::new(LogNotifier));
        assert!(manager.create_alert(request("psi_x", AlertSeverity::Warning)).await.is_ok());
    }

    #[tokio::test]
    async fn test_retraining_ignores_criticals_older_than_a_day() {
        let store = Arc::new(MemoryStore::new());
        let manager = AlertManager::new(store.clone(), Duration::from_secs(1));
        let now = Utc::now();
        for metric in ["psi_old_a", "psi_old_b"] {
            let mut stale = Alert::from_request(request(metric, AlertSeverity::Critical), now);
            stale.created_at = now - ChronoDuration::hours(25);
            stale.updated_at = stale.created_at;
            store.insert_or_increment(stale, now - ChronoDuration::days(7)).await.unwrap();
        }
        assert_eq!(manager.get_alert_history("credit", 7, 10).await.unwrap().len(), 2);
        assert!(!manager.should_trigger_retraining("credit").await.unwrap());

        manager.create_alert(request("psi_new_a", AlertSeverity::Critical)).await.unwrap();
        assert!(!manager.should_trigger_retraining("credit").await.unwrap());

        manager.create_alert(request("psi_new_b", AlertSeverity::Critical)).await.unwrap();
        assert!(manager.should_trigger_retraining("credit").await.unwrap());
    }

    #[tokio::test]
    async fn test_history_rejects_unrepresentable_range() {
        let manager = manager();
        let err = manager.get_alert_history("credit", i64::MAX / 1000, 10).await.unwrap_err();
        assert!(matches!(err, DriftError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_retraining_needs_two_open_criticals() {
        let manager = manager();
        manager.create_alert(request("psi_a", AlertSeverity::Critical)).await.unwrap();
        manager.create_alert(request("psi_w", AlertSeverity::Warning)).await.unwrap();
        assert!(!manager.should_trigger_retraining("credit").await.unwrap());

        let second = manager.create_alert(request("psi_b", AlertSeverity::Critical)).await.unwrap();
        assert!(manager.should_trigger_retraining("credit").await.unwrap());

        manager.resolve_alert(&second.id, None).await.unwrap();
        assert!(!manager.should_trigger_retraining("credit").await.unwrap());
    }

    #[tokio::test]
    async fn test_active_alerts_filtering() {
        let manager = manager();
        let warning = manager.create_alert(request("psi_a", AlertSeverity::Warning)).await.unwrap();
        manager.create_alert(request("psi_b", AlertSeverity::Critical)).await.unwrap();
        manager.resolve_alert(&warning.id, Some("expected seasonality".into())).await.unwrap();

        let active = manager.get_active_alerts(Some("credit"), None, 10).await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].metric_name, "psi_b");

        let warnings = manager
            .get_active_alerts(None, Some(AlertSeverity::Warning), 10)
            .await
            .unwrap();
        assert!(warnings.is_empty());

        let history = manager.get_alert_history("credit", 7, 10).await.unwrap();
        assert_eq!(history.len(), 2);
    }
}
