use crate::calendar::CalendarRange;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One observation as delivered by a provider: both fields still string-coded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawObservation {
    /// Observation date, `YYYY-MM-DD` optionally followed by a time component
    pub date: String,
    /// Numeric value, or the provider's placeholder token when not reported
    pub value: String,
}

impl RawObservation {
    pub fn new(date: impl Into<String>, value: impl Into<String>) -> Self {
        RawObservation {
            date: date.into(),
            value: value.into(),
        }
    }

    /// Leading `YYYY-MM-DD` portion of the date, if it parses.
    pub(crate) fn calendar_date(&self) -> Option<NaiveDate> {
        let head = self.date.get(..10).unwrap_or(&self.date);
        NaiveDate::parse_from_str(head, "%Y-%m-%d").ok()
    }
}

/// Source of raw observations for a provider series.
///
/// The pipeline only consumes already-parsed tabular output through this
/// trait; HTTP, authentication and pacing live in the implementations.
#[allow(async_fn_in_trait)]
pub trait ObservationSource {
    /// Fetches every observation of `series_id` dated within `range`.
    ///
    /// # Errors
    /// Returns a `ProviderError` if the source is unreachable or returns a
    /// malformed payload.
    async fn fetch(
        &self,
        series_id: &str,
        range: &CalendarRange,
    ) -> Result<Vec<RawObservation>, ProviderError>;
}

/// Errors raised by an observation source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// HTTP client creation failed
    ClientCreation(String),
    /// Network error occurred
    NetworkError(String),
    /// Provider answered with a non-success status
    ApiError(String),
    /// Payload could not be decoded
    MalformedPayload(String),
    /// Unknown series identifier
    SeriesNotFound(String),
}

impl std::fmt::Display for ProviderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderError::ClientCreation(msg) => write!(f, "Client creation error: {}", msg),
            ProviderError::NetworkError(msg) => write!(f, "Network error: {}", msg),
            ProviderError::ApiError(msg) => write!(f, "API error: {}", msg),
            ProviderError::MalformedPayload(msg) => write!(f, "Malformed payload: {}", msg),
            ProviderError::SeriesNotFound(id) => write!(f, "Series not found: {}", id),
        }
    }
}

impl std::error::Error for ProviderError {}

/// In-memory observation source for testing.
///
/// Stores raw observations keyed by provider series id and serves the ones
/// whose date falls inside the requested range. Observations whose date
/// cannot be read are always served so that the normalizer reports them.
#[derive(Debug, Clone, Default)]
pub struct InMemoryObservationSource {
    data: HashMap<String, Vec<RawObservation>>,
}

impl InMemoryObservationSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds observations for a series, replacing any previous ones.
    pub fn add_series(&mut self, series_id: impl Into<String>, observations: Vec<RawObservation>) {
        self.data.insert(series_id.into(), observations);
    }

    /// Builder-style variant of [`add_series`](Self::add_series).
    pub fn with_series(
        mut self,
        series_id: impl Into<String>,
        observations: Vec<RawObservation>,
    ) -> Self {
        self.add_series(series_id, observations);
        self
    }

    pub fn clear(&mut self) {
        self.data.clear();
    }
}

impl ObservationSource for InMemoryObservationSource {
    async fn fetch(
        &self,
        series_id: &str,
        range: &CalendarRange,
    ) -> Result<Vec<RawObservation>, ProviderError> {
        let all = self
            .data
            .get(series_id)
            .ok_or_else(|| ProviderError::SeriesNotFound(series_id.to_string()))?;

        Ok(all
            .iter()
            .filter(|obs| obs.calendar_date().map_or(true, |date| range.contains(date)))
            .cloned()
            .collect())
    }
}
