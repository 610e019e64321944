//! One pipeline run: fetch, normalize, align, merge, check, reconcile, write.
//!
//! Every input (today's date, the observation source, the store, the alert
//! sink) is passed in, so a run is repeatable against fixed inputs.

use crate::alerting::{dispatch, Alert, AlertPolicy, AlertSink};
use crate::cadence::Cadence;
use crate::calendar::{CalendarGapError, CalendarRange};
use crate::config::{MissingValuePolicy, PipelineConfig};
use crate::error::PipelineError;
use crate::merge::{merge, WideTable};
use crate::normalize::normalize;
use crate::observation::ObservationSource;
use crate::reconcile::{apply, reconcile, RowStore};
use crate::reindex::reindex;
use crate::schema::{SeriesSource, SeriesSpec, TableSchema};
use crate::sentiment::{daily_mentions, daily_polarity, SentimentInput};
use crate::series::Series;
use crate::series_key::SeriesKey;
use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, info, warn};

/// Outcome of one run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineReport {
    pub table: String,
    /// Target daily window
    pub window: CalendarRange,
    /// Raw observations received from the source
    pub observations_fetched: usize,
    /// Rows in the merged table after edge trimming
    pub rows_merged: usize,
    /// Rows dated after the last day every daily series has reported
    pub rows_deferred: usize,
    /// Incomplete rows removed before reconciliation
    pub rows_dropped: usize,
    pub rows_inserted: usize,
    pub rows_skipped: usize,
    pub alerts: Vec<Alert>,
}

impl std::fmt::Display for PipelineReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: window {}..{}, {} observations, {} rows merged, {} inserted, {} already stored",
            self.table,
            self.window.start(),
            self.window.end(),
            self.observations_fetched,
            self.rows_merged,
            self.rows_inserted,
            self.rows_skipped
        )?;
        if self.rows_deferred > 0 {
            write!(f, ", {} deferred", self.rows_deferred)?;
        }
        if self.rows_dropped > 0 {
            write!(f, ", {} incomplete dropped", self.rows_dropped)?;
        }
        if !self.alerts.is_empty() {
            write!(f, ", {} alert(s)", self.alerts.len())?;
        }
        Ok(())
    }
}

/// Merged table for one run, before any storage access.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedTable {
    pub window: CalendarRange,
    pub observations_fetched: usize,
    /// Last date with an actual value, per daily provider series
    pub last_reported: Vec<(SeriesKey, Option<NaiveDate>)>,
    pub table: WideTable,
}

impl AlignedTable {
    /// Latest date on which every daily provider series has a value.
    ///
    /// `None` if any daily series reported nothing in the window, or if the
    /// table tracks no daily provider series.
    pub fn reported_through(&self) -> Option<NaiveDate> {
        self.last_reported.iter().map(|(_, last)| *last).min().flatten()
    }
}

/// Pipeline bound to one table schema and run configuration.
#[derive(Debug, Clone)]
pub struct Pipeline<'a> {
    schema: &'a TableSchema,
    config: &'a PipelineConfig,
}

impl<'a> Pipeline<'a> {
    pub fn new(schema: &'a TableSchema, config: &'a PipelineConfig) -> Self {
        Pipeline { schema, config }
    }

    pub fn schema(&self) -> &TableSchema {
        self.schema
    }

    /// Target daily calendar window ending on `today`.
    pub fn daily_window(&self, today: NaiveDate) -> Result<CalendarRange, CalendarGapError> {
        CalendarRange::trailing(today, self.config.daily_window_days)
    }

    /// Range requested from the source for a series of the given cadence.
    ///
    /// Monthly series reach further back so that the latest release before
    /// the window can seed forward fill.
    pub fn fetch_range(
        &self,
        cadence: Cadence,
        today: NaiveDate,
    ) -> Result<CalendarRange, CalendarGapError> {
        match cadence {
            Cadence::Daily => self.daily_window(today),
            Cadence::Monthly => {
                let lookback = self
                    .config
                    .monthly_lookback_days
                    .max(self.config.daily_window_days);
                CalendarRange::trailing(today, lookback)
            }
        }
    }

    /// Fetches, normalizes, aligns and merges every tracked series.
    ///
    /// # Arguments
    /// * `source` - Observation source for provider series
    /// * `sentiment` - Already-scored sentiment input, required when the
    ///   schema tracks sentiment columns
    /// * `today` - Last date of the daily window
    ///
    /// # Errors
    /// Fails on the first provider, parse or merge error, or if the configured
    /// windows reach past the earliest representable date.
    pub async fn build_table<S: ObservationSource>(
        &self,
        source: &S,
        sentiment: Option<&SentimentInput>,
        today: NaiveDate,
    ) -> Result<AlignedTable, PipelineError> {
        let window = self.daily_window(today)?;
        let mut fetched = 0;
        let mut last_reported = Vec::new();
        let mut inputs: Vec<(SeriesKey, Series)> = Vec::with_capacity(self.schema.series.len());

        for spec in &self.schema.series {
            let series = match &spec.source {
                SeriesSource::Provider { series_id } => {
                    let range = self.fetch_range(spec.cadence, today)?;
                    let raw = source.fetch(series_id, &range).await?;
                    fetched += raw.len();
                    let series = normalize(series_id, &raw, &self.config.placeholder)?;
                    debug!(
                        column = %spec.key,
                        series_id = series_id.as_str(),
                        observations = raw.len(),
                        missing = series.missing_count(),
                        "normalized series"
                    );
                    if spec.cadence == Cadence::Daily {
                        last_reported.push((spec.key.clone(), series.last_observed()));
                    }
                    reindex(&series, &window, self.schema.fill_policy(spec.cadence))
                }
                SeriesSource::Mentions => {
                    daily_mentions(&self.sentiment_input(sentiment)?.counts)?
                }
                SeriesSource::Polarity => daily_polarity(&self.sentiment_input(sentiment)?.posts),
            };
            inputs.push((spec.key.clone(), round(spec, series)));
        }

        let trim = self.config.edge_trim.unwrap_or(self.schema.edge_trim);
        let table = merge(&self.schema.columns(), inputs, &self.schema.merge_mode)?.trim_edges(trim);
        info!(
            table = %self.schema.table,
            rows = table.len(),
            observations = fetched,
            "merged wide table"
        );

        Ok(AlignedTable {
            window,
            observations_fetched: fetched,
            last_reported,
            table,
        })
    }

    /// Runs the pipeline end to end and writes new dates to `store`.
    ///
    /// Alerts are delivered to `sink` on a best-effort basis. Storage is only
    /// written after every existence check has succeeded, and the write is a
    /// single all-or-nothing batch.
    ///
    /// With `hold_unreported_tail` set, dates after the last day on which
    /// every daily series has published are left for a later run. A value the
    /// provider publishes a day late is then stored once it arrives instead
    /// of being written as missing and never revisited.
    ///
    /// # Errors
    /// Returns `PipelineError::IncompleteData` under the abort policy when
    /// the merged table has missing cells. Any fetch, parse, merge or storage
    /// error aborts the run.
    pub async fn run<S, R, A>(
        &self,
        source: &S,
        sentiment: Option<&SentimentInput>,
        store: &mut R,
        sink: &A,
        today: NaiveDate,
    ) -> Result<PipelineReport, PipelineError>
    where
        S: ObservationSource,
        R: RowStore,
        A: AlertSink,
    {
        let aligned = self.build_table(source, sentiment, today).await?;
        let policy = AlertPolicy {
            staleness_days: self.config.staleness_days,
        };
        let mut alerts = Vec::new();

        let rows_merged = aligned.table.len();
        let (mut table, rows_deferred) = self.hold_unreported(&aligned);
        let mut rows_dropped = 0;

        if let Some(alert) = policy.check_missing(&self.schema.table, &table) {
            warn!(table = %self.schema.table, "merged table has missing values");
            dispatch(sink, &alert).await;
            match self.config.missing_values {
                MissingValuePolicy::AlertAndWrite => {}
                MissingValuePolicy::DropIncomplete => {
                    let complete = table.drop_incomplete();
                    rows_dropped = table.len() - complete.len();
                    table = complete;
                    info!(rows = rows_dropped, "dropped incomplete rows");
                }
                MissingValuePolicy::Abort => {
                    return Err(PipelineError::IncompleteData {
                        missing: table
                            .missing_by_column()
                            .into_iter()
                            .filter(|(_, count)| *count > 0)
                            .collect(),
                    });
                }
            }
            alerts.push(alert);
        }

        let reconciliation = reconcile(&table, &*store)?;
        let rows_inserted = apply(&reconciliation, store)?;

        if let Some(alert) =
            policy.check_staleness(&self.schema.table, store.latest_date()?, today)
        {
            warn!(table = %self.schema.table, "persisted data is stale");
            dispatch(sink, &alert).await;
            alerts.push(alert);
        }

        let report = PipelineReport {
            table: self.schema.table.clone(),
            window: aligned.window,
            observations_fetched: aligned.observations_fetched,
            rows_merged,
            rows_deferred,
            rows_dropped,
            rows_inserted,
            rows_skipped: reconciliation.skipped.len(),
            alerts,
        };
        info!("{}", report);
        Ok(report)
    }

    fn hold_unreported(&self, aligned: &AlignedTable) -> (WideTable, usize) {
        if !self.config.hold_unreported_tail || aligned.last_reported.is_empty() {
            return (aligned.table.clone(), 0);
        }

        let cutoff = aligned.reported_through();
        let held = aligned.table.rows_through(cutoff);
        let deferred = aligned.table.len() - held.len();
        if deferred > 0 {
            let pending: Vec<String> = aligned
                .last_reported
                .iter()
                .filter(|(_, last)| *last < aligned.table.latest_date())
                .map(|(key, _)| key.to_string())
                .collect();
            info!(
                table = %self.schema.table,
                rows = deferred,
                reported_through = ?cutoff,
                pending = ?pending,
                "deferring dates not yet reported by every daily series"
            );
        }
        (held, deferred)
    }

    fn sentiment_input<'s>(
        &self,
        sentiment: Option<&'s SentimentInput>,
    ) -> Result<&'s SentimentInput, PipelineError> {
        sentiment.ok_or_else(|| PipelineError::MissingSentiment(self.schema.table.clone()))
    }
}

fn round(spec: &SeriesSpec, series: Series) -> Series {
    match spec.round_to {
        Some(decimals) => series.rounded(decimals),
        None => series,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerting::MemoryAlertSink;
    use crate::merge::{EdgeTrim, MergeMode};
    use crate::observation::{InMemoryObservationSource, RawObservation};
    use crate::reconcile::InMemoryRowStore;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, day).unwrap()
    }

    fn schema() -> TableSchema {
        TableSchema::new(
            "prices",
            vec![
                SeriesSpec::provider("Dow", "DJIA", Cadence::Daily).unwrap(),
                SeriesSpec::provider("CPI", "CPIAUCSL", Cadence::Monthly)
                    .unwrap()
                    .rounded(1),
            ],
            MergeMode::Union,
            EdgeTrim::default(),
        )
        .unwrap()
    }

    fn config() -> PipelineConfig {
        PipelineConfig {
            daily_window_days: 4,
            monthly_lookback_days: 40,
            ..PipelineConfig::default()
        }
    }

    fn source() -> InMemoryObservationSource {
        source_through(10)
    }

    fn source_through(last: u32) -> InMemoryObservationSource {
        InMemoryObservationSource::new()
            .with_series(
                "DJIA",
                (6..=last)
                    .map(|day| RawObservation::new(d(day).to_string(), format!("{}.0", day)))
                    .collect(),
            )
            .with_series(
                "CPIAUCSL",
                vec![
                    RawObservation::new("2024-02-01", "310.326"),
                    RawObservation::new("2024-03-01", "."),
                ],
            )
    }

    #[test]
    fn test_fetch_ranges() {
        let schema = schema();
        let config = config();
        let pipeline = Pipeline::new(&schema, &config);
        assert_eq!(
            pipeline.daily_window(d(10)).unwrap(),
            CalendarRange::new(d(6), d(10)).unwrap()
        );
        assert_eq!(
            pipeline.fetch_range(Cadence::Monthly, d(10)).unwrap().start(),
            NaiveDate::from_ymd_opt(2024, 1, 30).unwrap()
        );
    }

    #[tokio::test]
    async fn test_build_table_aligns_and_rounds() {
        let schema = schema();
        let config = config();
        let aligned = Pipeline::new(&schema, &config)
            .build_table(&source(), None, d(10))
            .await
            .unwrap();

        let cpi = SeriesKey::new("CPI").unwrap();
        assert_eq!(aligned.table.len(), 5);
        assert_eq!(aligned.observations_fetched, 7);
        assert_eq!(aligned.reported_through(), Some(d(10)));
        for date in aligned.table.dates() {
            assert_eq!(aligned.table.value(date, &cpi), Some(310.3));
        }
        assert!(!aligned.table.has_missing());
    }

    #[tokio::test]
    async fn test_run_inserts_then_skips() {
        let schema = schema();
        let config = config();
        let pipeline = Pipeline::new(&schema, &config);
        let mut store = InMemoryRowStore::new(schema.columns());
        let sink = MemoryAlertSink::new();

        let first = pipeline.run(&source(), None, &mut store, &sink, d(10)).await.unwrap();
        assert_eq!(first.rows_inserted, 5);
        assert_eq!(first.rows_skipped, 0);
        assert!(first.alerts.is_empty());

        let second = pipeline.run(&source(), None, &mut store, &sink, d(10)).await.unwrap();
        assert_eq!(second.rows_inserted, 0);
        assert_eq!(second.rows_skipped, 5);
        assert_eq!(store.len(), 5);
        assert!(sink.alerts().is_empty());
    }

    #[tokio::test]
    async fn test_run_defers_dates_not_yet_reported() {
        let schema = schema();
        let config = config();
        let pipeline = Pipeline::new(&schema, &config);
        let mut store = InMemoryRowStore::new(schema.columns());
        let sink = MemoryAlertSink::new();

        let early = pipeline.run(&source_through(8), None, &mut store, &sink, d(10)).await.unwrap();
        assert_eq!(early.rows_merged, 5);
        assert_eq!(early.rows_deferred, 2);
        assert_eq!(early.rows_inserted, 3);
        assert!(early.alerts.is_empty());
        assert_eq!(store.latest_date().unwrap(), Some(d(8)));

        let late = pipeline.run(&source(), None, &mut store, &sink, d(10)).await.unwrap();
        assert_eq!(late.rows_deferred, 0);
        assert_eq!(late.rows_inserted, 2);
        assert_eq!(late.rows_skipped, 3);
        assert!(!store.load_rows(None).unwrap().has_missing());
    }

    #[tokio::test]
    async fn test_unheld_tail_is_written_with_gaps() {
        let schema = schema();
        let config = PipelineConfig {
            hold_unreported_tail: false,
            ..config()
        };
        let mut store = InMemoryRowStore::new(schema.columns());
        let sink = MemoryAlertSink::new();

        let report = Pipeline::new(&schema, &config)
            .run(&source_through(8), None, &mut store, &sink, d(10))
            .await
            .unwrap();
        assert_eq!(report.rows_deferred, 0);
        assert_eq!(report.rows_inserted, 5);
        assert_eq!(sink.alerts().len(), 1);
    }

    #[tokio::test]
    async fn test_silent_daily_series_defers_every_date() {
        let schema = schema();
        let config = config();
        let source = source().with_series("DJIA", vec![RawObservation::new("2024-03-10", ".")]);
        let mut store = InMemoryRowStore::new(schema.columns());

        let report = Pipeline::new(&schema, &config)
            .run(&source, None, &mut store, &MemoryAlertSink::new(), d(10))
            .await
            .unwrap();
        assert_eq!(report.rows_deferred, 5);
        assert_eq!(report.rows_inserted, 0);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_window_before_earliest_date_fails() {
        let schema = schema();
        let config = PipelineConfig {
            daily_window_days: u32::MAX,
            ..config()
        };
        let pipeline = Pipeline::new(&schema, &config);
        assert!(pipeline.daily_window(d(10)).is_err());

        let err = pipeline.build_table(&source(), None, d(10)).await.unwrap_err();
        assert!(matches!(err, PipelineError::Calendar(CalendarGapError::OutOfRange { .. })));
    }

    #[tokio::test]
    async fn test_missing_source_series_fails() {
        let schema = schema();
        let config = config();
        let source = InMemoryObservationSource::new();
        let err = Pipeline::new(&schema, &config)
            .build_table(&source, None, d(10))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Provider(_)));
    }

    #[tokio::test]
    async fn test_sentiment_required() {
        let schema = TableSchema::sentiment_economics();
        let config = PipelineConfig::default();
        let err = Pipeline::new(&schema, &config)
            .build_table(&InMemoryObservationSource::new(), None, d(10))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::MissingSentiment(_)));
    }

    #[test]
    fn test_report_display() {
        let report = PipelineReport {
            table: "econ_metrics".to_string(),
            window: CalendarRange::new(d(1), d(5)).unwrap(),
            observations_fetched: 12,
            rows_merged: 5,
            rows_deferred: 1,
            rows_dropped: 1,
            rows_inserted: 2,
            rows_skipped: 2,
            alerts: Vec::new(),
        };
        assert_eq!(
            report.to_string(),
            "econ_metrics: window 2024-03-01..2024-03-05, 12 observations, 5 rows merged, \
             2 inserted, 2 already stored, 1 deferred, 1 incomplete dropped"
        );
    }
}
