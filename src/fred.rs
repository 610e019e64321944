use crate::calendar::CalendarRange;
use crate::observation::{ObservationSource, ProviderError, RawObservation};
use reqwest::Client;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, trace};

/// FRED series observations endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.stlouisfed.org/fred/series/observations";

/// Configuration for the FRED observation client
#[derive(Debug, Clone)]
pub struct FredConfig {
    /// Observations endpoint (default: the public FRED API)
    pub base_url: String,
    /// Fixed pause between successive calls, in seconds (default: 31)
    pub pacing_seconds: u64,
    /// Request timeout in seconds (default: 30)
    pub timeout_seconds: u64,
}

impl Default for FredConfig {
    fn default() -> Self {
        FredConfig {
            base_url: DEFAULT_BASE_URL.to_string(),
            pacing_seconds: 31,
            timeout_seconds: 30,
        }
    }
}

/// Observation source backed by the FRED HTTP API.
///
/// Successive calls are paced by a fixed delay measured from the start of
/// the previous call; the first call goes out immediately.
#[derive(Debug)]
pub struct FredClient {
    client: Client,
    api_key: String,
    config: FredConfig,
    last_call: Mutex<Option<Instant>>,
}

impl FredClient {
    /// Creates a new client with default configuration.
    pub fn new(api_key: impl Into<String>) -> Result<Self, ProviderError> {
        Self::with_config(api_key, FredConfig::default())
    }

    /// Creates a new client with custom configuration.
    ///
    /// # Errors
    /// Returns `ProviderError::ClientCreation` if the HTTP client cannot be built.
    pub fn with_config(api_key: impl Into<String>, config: FredConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| ProviderError::ClientCreation(e.to_string()))?;

        Ok(FredClient {
            client,
            api_key: api_key.into(),
            config,
            last_call: Mutex::new(None),
        })
    }

    /// Returns a reference to the configuration.
    pub fn config(&self) -> &FredConfig {
        &self.config
    }

    async fn pace(&self) {
        let mut last_call = self.last_call.lock().await;
        if let Some(previous) = *last_call {
            let delay = Duration::from_secs(self.config.pacing_seconds);
            let elapsed = previous.elapsed();
            if elapsed < delay {
                trace!(wait_ms = (delay - elapsed).as_millis() as u64, "pacing FRED call");
                tokio::time::sleep(delay - elapsed).await;
            }
        }
        *last_call = Some(Instant::now());
    }
}

impl ObservationSource for FredClient {
    async fn fetch(
        &self,
        series_id: &str,
        range: &CalendarRange,
    ) -> Result<Vec<RawObservation>, ProviderError> {
        self.pace().await;

        let start = range.start().format("%Y-%m-%d").to_string();
        let end = range.end().format("%Y-%m-%d").to_string();
        debug!(series_id, %start, %end, "fetching FRED observations");

        let response = self
            .client
            .get(&self.config.base_url)
            .query(&[
                ("series_id", series_id),
                ("api_key", self.api_key.as_str()),
                ("observation_start", start.as_str()),
                ("observation_end", end.as_str()),
                ("file_type", "json"),
            ])
            .send()
            .await
            .map_err(|e| ProviderError::NetworkError(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ProviderError::MalformedPayload(e.to_string()))?;

        if !status.is_success() {
            let detail = serde_json::from_str::<ErrorResponse>(&text)
                .map(|err| err.error_message)
                .unwrap_or_else(|_| status.canonical_reason().unwrap_or("Unknown error").to_string());
            return Err(ProviderError::ApiError(format!(
                "HTTP {} for {}: {}",
                status.as_u16(),
                series_id,
                detail
            )));
        }

        let observations = parse_observations(&text)?;
        debug!(series_id, count = observations.len(), "received FRED observations");
        Ok(observations)
    }
}

#[derive(Debug, Deserialize)]
struct ObservationsResponse {
    observations: Vec<RawObservation>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error_message: String,
}

/// Extracts the `observations` array from a FRED JSON payload.
pub fn parse_observations(body: &str) -> Result<Vec<RawObservation>, ProviderError> {
    serde_json::from_str::<ObservationsResponse>(body)
        .map(|payload| payload.observations)
        .map_err(|e| ProviderError::MalformedPayload(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = FredClient::new("key");
        assert!(client.is_ok());
    }

    #[test]
    fn test_client_with_config() {
        let config = FredConfig {
            base_url: "http://localhost:1/obs".to_string(),
            pacing_seconds: 0,
            timeout_seconds: 5,
        };
        let client = FredClient::with_config("key", config).unwrap();
        assert_eq!(client.config().pacing_seconds, 0);
        assert_eq!(client.config().timeout_seconds, 5);
    }

    #[test]
    fn test_parse_observations() {
        let body = r#"{
            "realtime_start": "2024-01-08",
            "count": 2,
            "observations": [
                {"realtime_start": "2024-01-08", "realtime_end": "2024-01-08", "date": "2024-01-01", "value": "."},
                {"realtime_start": "2024-01-08", "realtime_end": "2024-01-08", "date": "2024-01-02", "value": "37715.04"}
            ]
        }"#;
        let observations = parse_observations(body).unwrap();
        assert_eq!(
            observations,
            vec![
                RawObservation::new("2024-01-01", "."),
                RawObservation::new("2024-01-02", "37715.04"),
            ]
        );
    }

    #[test]
    fn test_parse_malformed_payload() {
        let err = parse_observations(r#"{"error_code": 400}"#).unwrap_err();
        assert!(matches!(err, ProviderError::MalformedPayload(_)));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_network_error() {
        // bind then drop to get a port nothing listens on
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let config = FredConfig {
            base_url: format!("http://127.0.0.1:{}/fred/series/observations", port),
            pacing_seconds: 0,
            timeout_seconds: 2,
        };
        let client = FredClient::with_config("key", config).unwrap();
        let end = chrono::NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();
        let result = client.fetch("DJIA", &CalendarRange::trailing(end, 5).unwrap()).await;
        assert!(matches!(result, Err(ProviderError::NetworkError(_))));
    }
}
