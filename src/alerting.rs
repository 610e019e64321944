//! Non-fatal data checks and the sinks that report them.

use crate::merge::WideTable;
use crate::series_key::SeriesKey;
use chrono::NaiveDate;
use reqwest::Client;
use serde::Serialize;
use serde_json::json;
use std::sync::Mutex;
use std::time::Duration;

/// A non-fatal condition worth notifying someone about.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Alert {
    /// Merged table still holds missing cells
    DataQuality {
        table: String,
        missing: Vec<(SeriesKey, usize)>,
    },
    /// Persisted data has not advanced recently
    Staleness {
        table: String,
        latest: Option<NaiveDate>,
        threshold_days: i64,
    },
}

impl Alert {
    pub fn message(&self) -> String {
        match self {
            Alert::DataQuality { table, missing } => {
                let detail: Vec<String> = missing
                    .iter()
                    .map(|(key, count)| format!("{}={}", key, count))
                    .collect();
                format!(
                    "Missing values detected in merged {} table ({})",
                    table,
                    detail.join(", ")
                )
            }
            Alert::Staleness {
                table,
                latest: Some(latest),
                threshold_days,
            } => format!(
                "The {} table has not been updated for more than {} days (latest row {})",
                table, threshold_days, latest
            ),
            Alert::Staleness { table, latest: None, .. } => {
                format!("The {} table holds no rows", table)
            }
        }
    }
}

impl std::fmt::Display for Alert {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

/// Thresholds for the data checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlertPolicy {
    /// Maximum age in days of the latest persisted row
    pub staleness_days: i64,
}

impl Default for AlertPolicy {
    fn default() -> Self {
        AlertPolicy { staleness_days: 10 }
    }
}

impl AlertPolicy {
    /// Reports columns with missing cells, if any.
    pub fn check_missing(&self, table_name: &str, table: &WideTable) -> Option<Alert> {
        if !table.has_missing() {
            return None;
        }
        let missing = table
            .missing_by_column()
            .into_iter()
            .filter(|(_, count)| *count > 0)
            .collect();
        Some(Alert::DataQuality {
            table: table_name.to_string(),
            missing,
        })
    }

    /// Reports a latest persisted date more than `staleness_days` before `today`.
    pub fn check_staleness(
        &self,
        table_name: &str,
        latest: Option<NaiveDate>,
        today: NaiveDate,
    ) -> Option<Alert> {
        let stale = match latest {
            Some(date) => (today - date).num_days() > self.staleness_days,
            None => true,
        };
        stale.then(|| Alert::Staleness {
            table: table_name.to_string(),
            latest,
            threshold_days: self.staleness_days,
        })
    }
}

/// Destination for alerts. Delivery is best effort.
#[allow(async_fn_in_trait)]
pub trait AlertSink {
    async fn notify(&self, alert: &Alert) -> Result<(), AlertError>;
}

/// Sends `alert` and logs, rather than propagates, a delivery failure.
pub async fn dispatch<A: AlertSink + ?Sized>(sink: &A, alert: &Alert) {
    if let Err(e) = sink.notify(alert).await {
        log::warn!("Failed to deliver alert '{}': {}", alert, e);
    }
}

/// Writes alerts to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogAlertSink;

impl AlertSink for LogAlertSink {
    async fn notify(&self, alert: &Alert) -> Result<(), AlertError> {
        log::warn!("ALERT: {}", alert);
        Ok(())
    }
}

/// Posts alerts as JSON to an HTTP endpoint (chat webhook, notification relay).
#[derive(Debug, Clone)]
pub struct WebhookAlertSink {
    client: Client,
    url: String,
}

impl WebhookAlertSink {
    pub fn new(url: impl Into<String>) -> Result<Self, AlertError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| AlertError(e.to_string()))?;
        Ok(WebhookAlertSink {
            client,
            url: url.into(),
        })
    }
}

impl AlertSink for WebhookAlertSink {
    async fn notify(&self, alert: &Alert) -> Result<(), AlertError> {
        let body = json!({ "text": alert.message(), "alert": alert });
        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| AlertError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AlertError(format!("HTTP {}", response.status().as_u16())));
        }
        log::info!("Alert delivered to webhook");
        Ok(())
    }
}

/// Collects alerts in memory. Useful for testing.
#[derive(Debug, Default)]
pub struct MemoryAlertSink {
    alerts: Mutex<Vec<Alert>>,
}

impl MemoryAlertSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alerts(&self) -> Vec<Alert> {
        self.alerts.lock().map(|a| a.clone()).unwrap_or_default()
    }
}

impl AlertSink for MemoryAlertSink {
    async fn notify(&self, alert: &Alert) -> Result<(), AlertError> {
        self.alerts
            .lock()
            .map_err(|e| AlertError(e.to_string()))?
            .push(alert.clone());
        Ok(())
    }
}

/// Alert delivery failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertError(pub String);

impl std::fmt::Display for AlertError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Alert delivery failed: {}", self.0)
    }
}

impl std::error::Error for AlertError {}
