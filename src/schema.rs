//! Persisted table layouts and the series that feed each column.

use crate::cadence::Cadence;
use crate::merge::{EdgeTrim, MergeMode};
use crate::reindex::FillPolicy;
use crate::series_key::{SeriesKey, SeriesKeyError};
use serde::{Deserialize, Serialize};

/// Where a column's observations come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeriesSource {
    /// Economic-data provider series id (e.g. `DJIA`)
    Provider { series_id: String },
    /// Daily post count for the tracked search query
    Mentions,
    /// Daily mean polarity of the tracked posts
    Polarity,
}

/// One tracked column: its name, origin, cadence and output rounding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesSpec {
    pub key: SeriesKey,
    pub source: SeriesSource,
    pub cadence: Cadence,
    /// Decimal places to round to before persisting
    pub round_to: Option<u32>,
}

impl SeriesSpec {
    pub fn provider(
        key: &str,
        series_id: &str,
        cadence: Cadence,
    ) -> Result<Self, SeriesKeyError> {
        Ok(SeriesSpec {
            key: SeriesKey::new(key)?,
            source: SeriesSource::Provider {
                series_id: series_id.to_string(),
            },
            cadence,
            round_to: None,
        })
    }

    pub fn sentiment(key: &str, source: SeriesSource) -> Result<Self, SeriesKeyError> {
        Ok(SeriesSpec {
            key: SeriesKey::new(key)?,
            source,
            cadence: Cadence::Daily,
            round_to: None,
        })
    }

    pub fn rounded(mut self, decimals: u32) -> Self {
        self.round_to = Some(decimals);
        self
    }

    pub fn provider_series_id(&self) -> Option<&str> {
        match &self.source {
            SeriesSource::Provider { series_id } => Some(series_id),
            _ => None,
        }
    }
}

/// Layout of one persisted table: `date` followed by one column per series.
///
/// Column order is part of the contract because dashboard readers access
/// columns by position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub table: String,
    pub series: Vec<SeriesSpec>,
    pub merge_mode: MergeMode,
    pub edge_trim: EdgeTrim,
    /// Fill applied to daily provider series when reindexing
    #[serde(default)]
    pub daily_fill: FillPolicy,
}

impl TableSchema {
    /// Creates a schema after validating the table name.
    pub fn new(
        table: impl Into<String>,
        series: Vec<SeriesSpec>,
        merge_mode: MergeMode,
        edge_trim: EdgeTrim,
    ) -> Result<Self, SeriesKeyError> {
        let table = table.into();
        // table names follow the same identifier rules as columns
        SeriesKey::new(table.as_str())?;
        Ok(TableSchema {
            table,
            series,
            merge_mode,
            edge_trim,
            daily_fill: FillPolicy::None,
        })
    }

    /// Carries daily provider values over dates the provider skips.
    pub fn with_daily_fill(mut self, fill: FillPolicy) -> Self {
        self.daily_fill = fill;
        self
    }

    /// Fill policy for a provider series of the given cadence in this table.
    ///
    /// Monthly series are always forward filled; daily series follow
    /// `daily_fill`.
    pub fn fill_policy(&self, cadence: Cadence) -> FillPolicy {
        match cadence {
            Cadence::Daily => self.daily_fill,
            Cadence::Monthly => cadence.fill_policy(),
        }
    }

    /// Pure-economics table: nine indicators plus consumer confidence.
    pub fn economics() -> Self {
        let series = vec![
            SeriesSpec::provider("Dow", "DJIA", Cadence::Daily),
            SeriesSpec::provider("NASDAQ", "NASDAQCOM", Cadence::Daily),
            SeriesSpec::provider("SP500", "SP500", Cadence::Daily),
            SeriesSpec::provider("Inflation_5yr", "T5YIE", Cadence::Daily),
            SeriesSpec::provider("Oil", "DCOILWTICO", Cadence::Daily),
            SeriesSpec::provider("Interest", "DFF", Cadence::Daily),
            SeriesSpec::provider("T_Note_10yr", "DGS10", Cadence::Daily),
            SeriesSpec::provider("CPI_item_cost", "CPIAUCSL", Cadence::Monthly).map(|s| s.rounded(2)),
            SeriesSpec::provider("CPI_purchase_power", "CUUR0000SA0R", Cadence::Monthly),
            SeriesSpec::provider("Confidence", "CSCICP03USM665S", Cadence::Monthly),
        ];
        TableSchema {
            table: "econ_metrics".to_string(),
            series: collect_builtin(series),
            merge_mode: MergeMode::Union,
            edge_trim: EdgeTrim::default(),
            daily_fill: FillPolicy::None,
        }
    }

    /// Sentiment-plus-economics table, inner-joined on the sentiment dates.
    ///
    /// The first two and the last sentiment days do not cover a full day of
    /// posts, so they are trimmed. Posts arrive on weekends and holidays too,
    /// so daily indicators carry their last published value onto those dates.
    pub fn sentiment_economics() -> Self {
        let series = vec![
            SeriesSpec::sentiment("Mentions", SeriesSource::Mentions),
            SeriesSpec::sentiment("Polarity", SeriesSource::Polarity),
            SeriesSpec::provider("Dow", "DJIA", Cadence::Daily),
            SeriesSpec::provider("NASDAQ", "NASDAQCOM", Cadence::Daily),
            SeriesSpec::provider("SP500", "SP500", Cadence::Daily),
            SeriesSpec::provider("Inflation_5yr", "T5YIE", Cadence::Daily),
            SeriesSpec::provider("Oil", "DCOILWTICO", Cadence::Daily),
            SeriesSpec::provider("Interest", "DFF", Cadence::Daily),
            SeriesSpec::provider("T_Note_10yr", "DGS10", Cadence::Daily),
            SeriesSpec::provider("CPI_item_cost", "CPIAUCSL", Cadence::Monthly),
            SeriesSpec::provider("CPI_purchase_power", "CUUR0000SA0R", Cadence::Monthly),
        ];
        let series = collect_builtin(series);
        let anchor = series[1].key.clone();
        TableSchema {
            table: "tweets".to_string(),
            series,
            merge_mode: MergeMode::Inner { anchor },
            edge_trim: EdgeTrim::new(2, 1),
            daily_fill: FillPolicy::ForwardFill,
        }
    }

    /// Looks up a built-in schema by its configuration name.
    pub fn by_name(name: &str) -> Option<Self> {
        match name {
            "economics" | "econ_metrics" => Some(Self::economics()),
            "sentiment_economics" | "tweets" => Some(Self::sentiment_economics()),
            _ => None,
        }
    }

    /// Series keys in table column order, excluding `date`.
    pub fn columns(&self) -> Vec<SeriesKey> {
        self.series.iter().map(|spec| spec.key.clone()).collect()
    }

    pub fn has_sentiment(&self) -> bool {
        self.series
            .iter()
            .any(|spec| !matches!(spec.source, SeriesSource::Provider { .. }))
    }
}

fn collect_builtin(series: Vec<Result<SeriesSpec, SeriesKeyError>>) -> Vec<SeriesSpec> {
    // built-in column names are valid identifiers
    series.into_iter().filter_map(Result::ok).collect()
}
