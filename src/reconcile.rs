//! Reconciliation of a freshly merged table against persisted rows.
//!
//! Persisted rows are append-only: a date already stored is skipped, never
//! updated. Classification and mutation are separate steps so that a failed
//! existence check can never drive a partial write.

use crate::calendar::CalendarRange;
use crate::merge::{WideRow, WideTable};
use crate::series_key::SeriesKey;
use chrono::NaiveDate;
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info};

/// Narrow read/write contract against the backing store of one table.
pub trait RowStore {
    /// Whether a row for `date` is already persisted.
    fn row_exists(&self, date: NaiveDate) -> Result<bool, StorageError>;

    /// Inserts every row as one all-or-nothing unit of work.
    ///
    /// Returns the number of rows written. On error nothing is written.
    fn insert_rows(&mut self, rows: &[WideRow]) -> Result<usize, StorageError>;

    /// Most recent persisted date, if any.
    fn latest_date(&self) -> Result<Option<NaiveDate>, StorageError>;

    /// Persisted rows, optionally restricted to `range`, in date order.
    fn load_rows(&self, range: Option<&CalendarRange>) -> Result<WideTable, StorageError>;
}

/// Partition of a wide table into new and already-persisted rows.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Reconciliation {
    /// Rows whose date is not yet persisted, in table order
    pub to_insert: Vec<WideRow>,
    /// Dates already persisted
    pub skipped: Vec<NaiveDate>,
}

impl Reconciliation {
    pub fn is_empty(&self) -> bool {
        self.to_insert.is_empty()
    }

    pub fn insert_dates(&self) -> Vec<NaiveDate> {
        self.to_insert.iter().map(|row| row.date).collect()
    }
}

/// Classifies every row of `table` as new or already persisted.
///
/// Each date is checked exactly once, in table order.
///
/// # Errors
/// Any storage failure aborts the whole reconciliation; no partial result is
/// returned.
pub fn reconcile<S: RowStore + ?Sized>(
    table: &WideTable,
    store: &S,
) -> Result<Reconciliation, StorageError> {
    let mut seen = HashSet::with_capacity(table.len());
    let mut result = Reconciliation::default();

    for row in table.rows() {
        if !seen.insert(row.date) {
            continue;
        }
        if store.row_exists(row.date)? {
            result.skipped.push(row.date);
        } else {
            result.to_insert.push(row.clone());
        }
    }

    debug!(
        new = result.to_insert.len(),
        skipped = result.skipped.len(),
        "reconciled wide table against store"
    );
    Ok(result)
}

/// Writes the new rows of a reconciliation in one unit of work.
pub fn apply<S: RowStore + ?Sized>(
    reconciliation: &Reconciliation,
    store: &mut S,
) -> Result<usize, StorageError> {
    if reconciliation.is_empty() {
        info!("no new dates to insert");
        return Ok(0);
    }

    let written = store.insert_rows(&reconciliation.to_insert)?;
    info!(rows = written, "inserted new dates");
    Ok(written)
}

/// Errors raised by a row store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// Store cannot be reached
    Unavailable(String),
    /// A query or statement failed
    Query(String),
    /// An insert targeted a date that is already persisted
    DuplicateDate(NaiveDate),
    /// Row layout does not match the table
    SchemaMismatch(String),
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageError::Unavailable(msg) => write!(f, "Storage unavailable: {}", msg),
            StorageError::Query(msg) => write!(f, "Storage query failed: {}", msg),
            StorageError::DuplicateDate(date) => {
                write!(f, "Row for {} is already persisted", date)
            }
            StorageError::SchemaMismatch(msg) => write!(f, "Schema mismatch: {}", msg),
        }
    }
}

impl std::error::Error for StorageError {}

/// In-memory row store for testing.
///
/// Can be switched offline to exercise storage failure paths.
#[derive(Debug, Clone)]
pub struct InMemoryRowStore {
    columns: Vec<SeriesKey>,
    rows: BTreeMap<NaiveDate, Vec<Option<f64>>>,
    offline: bool,
    exists_calls: std::cell::Cell<usize>,
}

impl InMemoryRowStore {
    pub fn new(columns: Vec<SeriesKey>) -> Self {
        InMemoryRowStore {
            columns,
            rows: BTreeMap::new(),
            offline: false,
            exists_calls: std::cell::Cell::new(0),
        }
    }

    /// Makes every subsequent call fail with `StorageError::Unavailable`.
    pub fn set_offline(&mut self, offline: bool) {
        self.offline = offline;
    }

    /// Number of `row_exists` calls made so far.
    pub fn exists_calls(&self) -> usize {
        self.exists_calls.get()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn check_online(&self) -> Result<(), StorageError> {
        if self.offline {
            return Err(StorageError::Unavailable("store is offline".to_string()));
        }
        Ok(())
    }
}

impl RowStore for InMemoryRowStore {
    fn row_exists(&self, date: NaiveDate) -> Result<bool, StorageError> {
        self.check_online()?;
        self.exists_calls.set(self.exists_calls.get() + 1);
        Ok(self.rows.contains_key(&date))
    }

    fn insert_rows(&mut self, rows: &[WideRow]) -> Result<usize, StorageError> {
        self.check_online()?;

        let mut batch = HashSet::with_capacity(rows.len());
        for row in rows {
            if row.values.len() != self.columns.len() {
                return Err(StorageError::SchemaMismatch(format!(
                    "row {} has {} values, table has {} columns",
                    row.date,
                    row.values.len(),
                    self.columns.len()
                )));
            }
            if self.rows.contains_key(&row.date) || !batch.insert(row.date) {
                return Err(StorageError::DuplicateDate(row.date));
            }
        }

        for row in rows {
            self.rows.insert(row.date, row.values.clone());
        }
        Ok(rows.len())
    }

    fn latest_date(&self) -> Result<Option<NaiveDate>, StorageError> {
        self.check_online()?;
        Ok(self.rows.keys().next_back().copied())
    }

    fn load_rows(&self, range: Option<&CalendarRange>) -> Result<WideTable, StorageError> {
        self.check_online()?;
        let rows = self
            .rows
            .iter()
            .filter(|(date, _)| range.map_or(true, |r| r.contains(**date)))
            .map(|(date, values)| WideRow::new(*date, values.clone()))
            .collect();
        WideTable::from_rows(self.columns.clone(), rows)
            .map_err(|e| StorageError::SchemaMismatch(e.to_string()))
    }
}
