//! Daily aggregates over already-scored social-media posts.
//!
//! Scoring and text cleaning happen upstream; this module only turns the
//! scored posts and the provider's per-day counts into date-keyed series.

use crate::normalize::ParseError;
use crate::series::Series;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// One post with its polarity score in `[-1, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredPost {
    pub created_at: DateTime<Utc>,
    pub polarity: f64,
}

/// One bucket of the provider's recent-count endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountBucket {
    /// Bucket end timestamp, ISO 8601
    pub end: String,
    pub tweet_count: u64,
}

/// Already-fetched sentiment input for one pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SentimentInput {
    pub posts: Vec<ScoredPost>,
    pub counts: Vec<CountBucket>,
}

/// Mean polarity per calendar day (UTC).
pub fn daily_polarity(posts: &[ScoredPost]) -> Series {
    let mut sums: BTreeMap<NaiveDate, (f64, usize)> = BTreeMap::new();
    for post in posts.iter().filter(|post| post.polarity.is_finite()) {
        let entry = sums.entry(post.created_at.date_naive()).or_insert((0.0, 0));
        entry.0 += post.polarity;
        entry.1 += 1;
    }

    Series::from_pairs(
        sums.into_iter()
            .map(|(date, (sum, n))| (date, Some(sum / n as f64))),
    )
}

/// Post counts per calendar day.
///
/// The provider lists the current day twice: once as a full bucket and
/// again as a partial one. Buckets are read in order and reading stops at
/// the first repeated date.
pub fn daily_mentions(buckets: &[CountBucket]) -> Result<Series, ParseError> {
    let mut seen = HashSet::new();
    let mut series = Series::new();

    for bucket in buckets {
        let head = bucket.end.get(..10).unwrap_or(&bucket.end);
        let date = NaiveDate::parse_from_str(head, "%Y-%m-%d").map_err(|_| {
            ParseError::InvalidDate {
                series_id: "Mentions".to_string(),
                date: bucket.end.clone(),
            }
        })?;
        if !seen.insert(date) {
            break;
        }
        series.insert(date, Some(bucket.tweet_count as f64));
    }

    Ok(series)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    #[test]
    fn test_daily_polarity_means() {
        let posts = vec![
            ScoredPost {
                created_at: Utc.with_ymd_and_hms(2024, 1, 2, 1, 0, 0).unwrap(),
                polarity: 0.5,
            },
            ScoredPost {
                created_at: Utc.with_ymd_and_hms(2024, 1, 2, 23, 0, 0).unwrap(),
                polarity: -0.1,
            },
            ScoredPost {
                created_at: Utc.with_ymd_and_hms(2024, 1, 3, 12, 0, 0).unwrap(),
                polarity: 0.0,
            },
        ];
        let series = daily_polarity(&posts);
        assert_eq!(series.len(), 2);
        assert!((series.get(d(2)).unwrap() - 0.2).abs() < 1e-12);
        assert_eq!(series.get(d(3)), Some(0.0));
    }

    #[test]
    fn test_daily_mentions_stops_at_repeated_date() {
        let buckets = vec![
            CountBucket { end: "2024-01-02T00:00:00.000Z".into(), tweet_count: 10 },
            CountBucket { end: "2024-01-03T00:00:00.000Z".into(), tweet_count: 20 },
            CountBucket { end: "2024-01-03T14:12:00.000Z".into(), tweet_count: 3 },
            CountBucket { end: "2024-01-04T00:00:00.000Z".into(), tweet_count: 99 },
        ];
        let series = daily_mentions(&buckets).unwrap();
        assert_eq!(series.dates().collect::<Vec<_>>(), vec![d(2), d(3)]);
        assert_eq!(series.get(d(3)), Some(20.0));
    }

    #[test]
    fn test_daily_mentions_bad_date() {
        let buckets = vec![CountBucket { end: "yesterday".into(), tweet_count: 1 }];
        assert!(daily_mentions(&buckets).is_err());
    }
}
