use crate::calendar::CalendarRange;
use crate::merge::{WideRow, WideTable};
use crate::reconcile::{RowStore, StorageError};
use crate::schema::TableSchema;
use chrono::NaiveDate;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, ErrorCode};
use std::path::Path;
use tracing::{debug, trace};

/// SQLite-backed row store for one wide table.
///
/// The table layout is `date TEXT PRIMARY KEY` followed by one `REAL` column
/// per series, in schema order. Column identifiers are stored lower-cased.
#[derive(Debug)]
pub struct SqliteRowStore {
    conn: Connection,
    schema: TableSchema,
}

impl SqliteRowStore {
    /// Opens (or creates) a file-based database for `schema`.
    ///
    /// The table itself is not created here; see [`create_table`](Self::create_table).
    ///
    /// # Errors
    /// Returns `StorageError::Unavailable` if the database cannot be opened.
    pub fn new<P: AsRef<Path>>(db_path: P, schema: TableSchema) -> Result<Self, StorageError> {
        let conn = Connection::open(db_path).map_err(|e| StorageError::Unavailable(e.to_string()))?;
        Ok(SqliteRowStore { conn, schema })
    }

    /// Opens an in-memory database and creates the table. Useful for testing.
    pub fn new_in_memory(schema: TableSchema) -> Result<Self, StorageError> {
        let conn =
            Connection::open_in_memory().map_err(|e| StorageError::Unavailable(e.to_string()))?;
        let store = SqliteRowStore { conn, schema };
        store.create_table()?;
        Ok(store)
    }

    /// Creates the schema's table if it doesn't exist.
    pub fn create_table(&self) -> Result<(), StorageError> {
        let columns: Vec<String> = self
            .schema
            .columns()
            .iter()
            .map(|key| format!("{} REAL", quote(&key.column_name())))
            .collect();

        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} (date TEXT PRIMARY KEY, {})",
            self.table(),
            columns.join(", ")
        );
        trace!("{}", sql);
        self.conn.execute(&sql, [])?;
        Ok(())
    }

    /// Checks if a table exists in the database.
    pub fn table_exists(&self, table_name: &str) -> Result<bool, StorageError> {
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' AND name=?1")?;
        Ok(stmt.exists([table_name])?)
    }

    /// Verifies the persisted table has exactly the schema's columns, in order.
    pub fn verify_layout(&self) -> Result<(), StorageError> {
        let mut stmt = self
            .conn
            .prepare(&format!("PRAGMA table_info({})", self.table()))?;
        let found: Vec<String> = stmt
            .query_map([], |row| row.get::<_, String>(1))?
            .collect::<Result<_, _>>()?;

        let mut expected = vec!["date".to_string()];
        expected.extend(self.schema.columns().iter().map(|key| key.column_name()));

        let found: Vec<String> = found.iter().map(|name| name.to_ascii_lowercase()).collect();
        if found != expected {
            return Err(StorageError::SchemaMismatch(format!(
                "table {} has columns [{}], expected [{}]",
                self.schema.table,
                found.join(", "),
                expected.join(", ")
            )));
        }
        Ok(())
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    /// Returns a reference to the underlying SQLite connection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    fn table(&self) -> String {
        quote(&self.schema.table)
    }

    fn column_list(&self) -> String {
        self.schema
            .columns()
            .iter()
            .map(|key| quote(&key.column_name()))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

fn quote(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        StorageError::Query(err.to_string())
    }
}

impl RowStore for SqliteRowStore {
    fn row_exists(&self, date: NaiveDate) -> Result<bool, StorageError> {
        let mut stmt = self
            .conn
            .prepare_cached(&format!("SELECT 1 FROM {} WHERE date = ?1", self.table()))?;
        Ok(stmt.exists([date])?)
    }

    fn insert_rows(&mut self, rows: &[WideRow]) -> Result<usize, StorageError> {
        let width = self.schema.series.len();
        if let Some(row) = rows.iter().find(|row| row.values.len() != width) {
            return Err(StorageError::SchemaMismatch(format!(
                "row {} has {} values, table {} has {} columns",
                row.date,
                row.values.len(),
                self.schema.table,
                width
            )));
        }

        let placeholders: Vec<String> = (1..=width + 1).map(|i| format!("?{}", i)).collect();
        let sql = format!(
            "INSERT INTO {} (date, {}) VALUES ({})",
            self.table(),
            self.column_list(),
            placeholders.join(", ")
        );

        // dropping the transaction without commit rolls it back
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(&sql)?;
            for row in rows {
                let mut params = Vec::with_capacity(width + 1);
                params.push(Value::Text(row.date.format("%Y-%m-%d").to_string()));
                params.extend(row.values.iter().map(|v| match v {
                    Some(x) => Value::Real(*x),
                    None => Value::Null,
                }));

                stmt.execute(params_from_iter(params.iter()))
                    .map_err(|e| match e {
                        rusqlite::Error::SqliteFailure(ref failure, _)
                            if failure.code == ErrorCode::ConstraintViolation =>
                        {
                            StorageError::DuplicateDate(row.date)
                        }
                        _ => StorageError::from(e),
                    })?;
                trace!(date = %row.date, "staged row");
            }
        }
        tx.commit()?;

        debug!(rows = rows.len(), table = %self.schema.table, "committed insert batch");
        Ok(rows.len())
    }

    fn latest_date(&self) -> Result<Option<NaiveDate>, StorageError> {
        let latest: Option<NaiveDate> = self.conn.query_row(
            &format!("SELECT MAX(date) FROM {}", self.table()),
            [],
            |row| row.get(0),
        )?;
        Ok(latest)
    }

    fn load_rows(&self, range: Option<&CalendarRange>) -> Result<WideTable, StorageError> {
        let mut sql = format!("SELECT date, {} FROM {}", self.column_list(), self.table());
        let mut params: Vec<Value> = Vec::new();
        if let Some(range) = range {
            sql.push_str(" WHERE date >= ?1 AND date <= ?2");
            params.push(Value::Text(range.start().format("%Y-%m-%d").to_string()));
            params.push(Value::Text(range.end().format("%Y-%m-%d").to_string()));
        }
        sql.push_str(" ORDER BY date");

        let width = self.schema.series.len();
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(params.iter()), |row| {
                let date: NaiveDate = row.get(0)?;
                let values = (1..=width)
                    .map(|i| row.get::<_, Option<f64>>(i))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(WideRow::new(date, values))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        WideTable::from_rows(self.schema.columns(), rows)
            .map_err(|e| StorageError::SchemaMismatch(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::{apply, reconcile};

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn row(day: u32) -> WideRow {
        let mut values = vec![Some(day as f64); 10];
        values[9] = None;
        WideRow::new(d(day), values)
    }

    fn store() -> SqliteRowStore {
        SqliteRowStore::new_in_memory(TableSchema::economics()).unwrap()
    }

    #[test]
    fn test_table_created_with_layout() {
        let store = store();
        assert!(store.table_exists("econ_metrics").unwrap());
        assert!(!store.table_exists("tweets").unwrap());
        store.verify_layout().unwrap();
    }

    #[test]
    fn test_create_table_idempotent() {
        let store = store();
        store.create_table().unwrap();
        store.verify_layout().unwrap();
    }

    #[test]
    fn test_verify_layout_detects_mismatch() {
        let other = SqliteRowStore {
            conn: Connection::open_in_memory().unwrap(),
            schema: TableSchema::sentiment_economics(),
        };
        other
            .conn
            .execute("CREATE TABLE tweets (date TEXT PRIMARY KEY, mentions REAL)", [])
            .unwrap();
        assert!(matches!(
            other.verify_layout().unwrap_err(),
            StorageError::SchemaMismatch(_)
        ));
    }

    #[test]
    fn test_insert_and_exists() {
        let mut store = store();
        assert!(!store.row_exists(d(1)).unwrap());
        assert_eq!(store.insert_rows(&[row(1), row(2)]).unwrap(), 2);
        assert!(store.row_exists(d(1)).unwrap());
        assert!(store.row_exists(d(2)).unwrap());
        assert!(!store.row_exists(d(3)).unwrap());
        assert_eq!(store.latest_date().unwrap(), Some(d(2)));
    }

    #[test]
    fn test_latest_date_empty_table() {
        assert_eq!(store().latest_date().unwrap(), None);
    }

    #[test]
    fn test_failed_batch_leaves_table_unchanged() {
        let mut store = store();
        store.insert_rows(&[row(3)]).unwrap();

        let err = store.insert_rows(&[row(1), row(2), row(3), row(4)]).unwrap_err();
        assert_eq!(err, StorageError::DuplicateDate(d(3)));

        let persisted = store.load_rows(None).unwrap();
        assert_eq!(persisted.dates().collect::<Vec<_>>(), vec![d(3)]);
    }

    #[test]
    fn test_row_width_checked() {
        let mut store = store();
        let err = store
            .insert_rows(&[WideRow::new(d(1), vec![Some(1.0)])])
            .unwrap_err();
        assert!(matches!(err, StorageError::SchemaMismatch(_)));
    }

    #[test]
    fn test_load_rows_round_trips_nulls() {
        let mut store = store();
        store.insert_rows(&[row(1), row(2), row(5)]).unwrap();

        let range = CalendarRange::new(d(2), d(5)).unwrap();
        let loaded = store.load_rows(Some(&range)).unwrap();
        assert_eq!(loaded.rows(), &[row(2), row(5)]);
        assert_eq!(loaded.columns(), &TableSchema::economics().columns()[..]);
    }

    #[test]
    fn test_reconcile_against_sqlite() {
        let mut store = store();
        store.insert_rows(&[row(1), row(2), row(3)]).unwrap();

        let rows: Vec<WideRow> = (1..=5).map(row).collect();
        let table = WideTable::from_rows(TableSchema::economics().columns(), rows).unwrap();

        let result = reconcile(&table, &store).unwrap();
        assert_eq!(result.insert_dates(), vec![d(4), d(5)]);
        apply(&result, &mut store).unwrap();
        assert!(reconcile(&table, &store).unwrap().is_empty());
    }
}
