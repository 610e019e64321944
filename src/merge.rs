//! Combination of reindexed series into one wide, date-keyed table.

use crate::series::Series;
use crate::series_key::SeriesKey;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// One date plus one value per tracked series, in table column order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WideRow {
    pub date: NaiveDate,
    pub values: Vec<Option<f64>>,
}

impl WideRow {
    pub fn new(date: NaiveDate, values: Vec<Option<f64>>) -> Self {
        WideRow { date, values }
    }

    pub fn is_complete(&self) -> bool {
        self.values.iter().all(Option::is_some)
    }
}

/// Date-ordered sequence of [`WideRow`]s sharing one column layout.
///
/// Rows are strictly ascending by date, so a table never holds two rows for
/// the same date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WideTable {
    columns: Vec<SeriesKey>,
    rows: Vec<WideRow>,
}

impl WideTable {
    /// Builds a table from rows, sorting them by date.
    ///
    /// # Errors
    /// Returns an error if a row's width differs from the column count or a
    /// date appears twice.
    pub fn from_rows(columns: Vec<SeriesKey>, mut rows: Vec<WideRow>) -> Result<Self, MergeError> {
        if let Some(row) = rows.iter().find(|row| row.values.len() != columns.len()) {
            return Err(MergeError::RowWidth {
                date: row.date,
                expected: columns.len(),
                found: row.values.len(),
            });
        }

        rows.sort_by_key(|row| row.date);
        if let Some(pair) = rows.windows(2).find(|pair| pair[0].date == pair[1].date) {
            return Err(MergeError::DuplicateDate(pair[0].date));
        }

        Ok(WideTable { columns, rows })
    }

    pub fn columns(&self) -> &[SeriesKey] {
        &self.columns
    }

    pub fn rows(&self) -> &[WideRow] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<WideRow> {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.rows.iter().map(|row| row.date)
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.rows.first().map(|row| row.date)
    }

    pub fn latest_date(&self) -> Option<NaiveDate> {
        self.rows.last().map(|row| row.date)
    }

    pub fn column_index(&self, key: &SeriesKey) -> Option<usize> {
        self.columns.iter().position(|column| column == key)
    }

    /// Value of `key` on `date`; `None` if missing or either lookup fails.
    pub fn value(&self, date: NaiveDate, key: &SeriesKey) -> Option<f64> {
        let idx = self.column_index(key)?;
        let pos = self.rows.binary_search_by_key(&date, |row| row.date).ok()?;
        self.rows[pos].values[idx]
    }

    /// Number of missing cells per column, in column order.
    pub fn missing_by_column(&self) -> Vec<(SeriesKey, usize)> {
        self.columns
            .iter()
            .enumerate()
            .map(|(idx, key)| {
                let missing = self.rows.iter().filter(|row| row.values[idx].is_none()).count();
                (key.clone(), missing)
            })
            .collect()
    }

    pub fn has_missing(&self) -> bool {
        self.rows.iter().any(|row| !row.is_complete())
    }

    /// Copy of the table keeping only rows with a value in every column.
    pub fn drop_incomplete(&self) -> WideTable {
        WideTable {
            columns: self.columns.clone(),
            rows: self.rows.iter().filter(|row| row.is_complete()).cloned().collect(),
        }
    }

    /// Copy of the table keeping rows dated on or before `last`.
    ///
    /// `None` keeps no rows.
    pub fn rows_through(&self, last: Option<NaiveDate>) -> WideTable {
        WideTable {
            columns: self.columns.clone(),
            rows: self
                .rows
                .iter()
                .filter(|row| last.map_or(false, |last| row.date <= last))
                .cloned()
                .collect(),
        }
    }

    /// Drops `trim.head` rows from the start and `trim.tail` rows from the end.
    pub fn trim_edges(mut self, trim: EdgeTrim) -> WideTable {
        let len = self.rows.len();
        if trim.head + trim.tail >= len {
            self.rows.clear();
            return self;
        }
        self.rows.truncate(len - trim.tail);
        self.rows.drain(..trim.head);
        self
    }
}

/// Number of boundary rows to drop from a merged table.
///
/// Used when the first or last rows come from partial collection windows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeTrim {
    pub head: usize,
    pub tail: usize,
}

impl EdgeTrim {
    pub fn new(head: usize, tail: usize) -> Self {
        EdgeTrim { head, tail }
    }

    pub fn is_noop(&self) -> bool {
        self.head == 0 && self.tail == 0
    }
}

/// How the date axes of the merged series are combined.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeMode {
    /// Every date present in any input becomes a row
    Union,
    /// Only dates in the anchor series' support become rows; when other
    /// inputs exist a date must also appear in at least one of them
    Inner { anchor: SeriesKey },
}

/// Merges reindexed series into a [`WideTable`] with the given column order.
///
/// Columns absent on a row's date are filled with missing. The result is a
/// pure function of its inputs.
///
/// # Errors
/// Returns an error if the inputs do not match `columns` one to one, or if
/// the inner-join anchor is not one of the inputs.
pub fn merge(
    columns: &[SeriesKey],
    inputs: Vec<(SeriesKey, Series)>,
    mode: &MergeMode,
) -> Result<WideTable, MergeError> {
    let mut by_key: HashMap<SeriesKey, Series> = HashMap::with_capacity(inputs.len());
    for (key, series) in inputs {
        if !columns.contains(&key) {
            return Err(MergeError::UnknownColumn(key));
        }
        if by_key.insert(key.clone(), series).is_some() {
            return Err(MergeError::DuplicateColumn(key));
        }
    }

    let mut ordered: Vec<&Series> = Vec::with_capacity(columns.len());
    for key in columns {
        let series = by_key
            .get(key)
            .ok_or_else(|| MergeError::MissingColumn(key.clone()))?;
        ordered.push(series);
    }

    let dates: BTreeSet<NaiveDate> = match mode {
        MergeMode::Union => ordered.iter().flat_map(|series| series.dates()).collect(),
        MergeMode::Inner { anchor } => {
            let anchor_series = by_key
                .get(anchor)
                .ok_or_else(|| MergeError::UnknownAnchor(anchor.clone()))?;
            let others: BTreeSet<NaiveDate> = by_key
                .iter()
                .filter(|(key, _)| *key != anchor)
                .flat_map(|(_, series)| series.dates())
                .collect();

            anchor_series
                .dates()
                .filter(|date| by_key.len() == 1 || others.contains(date))
                .collect()
        }
    };

    let rows = dates
        .into_iter()
        .map(|date| WideRow::new(date, ordered.iter().map(|series| series.get(date)).collect()))
        .collect();

    Ok(WideTable {
        columns: columns.to_vec(),
        rows,
    })
}

/// Errors raised while assembling a wide table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeError {
    /// An input series is not part of the column order
    UnknownColumn(SeriesKey),
    /// A column has no input series
    MissingColumn(SeriesKey),
    /// Two inputs share one column
    DuplicateColumn(SeriesKey),
    /// Inner-join anchor is not an input
    UnknownAnchor(SeriesKey),
    /// A row's width does not match the column count
    RowWidth {
        date: NaiveDate,
        expected: usize,
        found: usize,
    },
    /// A date appears on two rows
    DuplicateDate(NaiveDate),
}

impl std::fmt::Display for MergeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MergeError::UnknownColumn(key) => write!(f, "Series '{}' is not a table column", key),
            MergeError::MissingColumn(key) => write!(f, "No series supplied for column '{}'", key),
            MergeError::DuplicateColumn(key) => {
                write!(f, "Series '{}' supplied more than once", key)
            }
            MergeError::UnknownAnchor(key) => {
                write!(f, "Inner merge anchor '{}' is not an input series", key)
            }
            MergeError::RowWidth {
                date,
                expected,
                found,
            } => write!(
                f,
                "Row {} has {} values, expected {}",
                date, found, expected
            ),
            MergeError::DuplicateDate(date) => write!(f, "Date {} appears more than once", date),
        }
    }
}

impl std::error::Error for MergeError {}
