//! Conversion of provider observations into numeric series.

use crate::observation::RawObservation;
use crate::series::Series;
use chrono::NaiveDate;

/// Token the economic-data provider emits for "not reported".
pub const DEFAULT_PLACEHOLDER: &str = ".";

/// Converts one series' raw observations into a [`Series`].
///
/// Values equal to `placeholder` (after trimming), and empty values, become
/// missing. Everything else must parse as `f64`. Dates keep only their
/// `YYYY-MM-DD` part.
///
/// # Errors
/// Returns a `ParseError` on the first date or value that cannot be parsed.
pub fn normalize(
    series_id: &str,
    raw: &[RawObservation],
    placeholder: &str,
) -> Result<Series, ParseError> {
    let mut series = Series::new();

    for obs in raw {
        let date = parse_date(&obs.date).ok_or_else(|| ParseError::InvalidDate {
            series_id: series_id.to_string(),
            date: obs.date.clone(),
        })?;

        let trimmed = obs.value.trim();
        let value = if trimmed.is_empty() || trimmed == placeholder {
            None
        } else {
            let parsed = trimmed
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| ParseError::InvalidValue {
                    series_id: series_id.to_string(),
                    date: obs.date.clone(),
                    value: obs.value.clone(),
                })?;
            Some(parsed)
        };

        series.insert(date, value);
    }

    Ok(series)
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    let head = match raw.find(|c| c == 'T' || c == ' ') {
        Some(idx) => &raw[..idx],
        None => raw,
    };
    NaiveDate::parse_from_str(head, "%Y-%m-%d").ok()
}

/// An observation that is neither the placeholder nor a number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    InvalidValue {
        series_id: String,
        date: String,
        value: String,
    },
    InvalidDate {
        series_id: String,
        date: String,
    },
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::InvalidValue {
                series_id,
                date,
                value,
            } => write!(
                f,
                "Parse error in {} at {}: '{}' is not a number",
                series_id, date, value
            ),
            ParseError::InvalidDate { series_id, date } => {
                write!(f, "Parse error in {}: invalid date '{}'", series_id, date)
            }
        }
    }
}

impl std::error::Error for ParseError {}
