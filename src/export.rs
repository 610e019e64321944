//! CSV and JSON renderings of a wide table for dashboard readers.
//!
//! CSV keeps the persisted column order: `date` first, then one column per
//! series. Missing cells are empty in CSV and `null` in JSON.

use crate::merge::WideTable;
use serde_json::{Map, Value};
use std::io::Write;

/// Writes `table` as CSV to `writer`.
pub fn write_csv<W: Write>(table: &WideTable, writer: W) -> Result<(), ExportError> {
    let mut wtr = csv::Writer::from_writer(writer);

    let mut header = vec!["date".to_string()];
    header.extend(table.columns().iter().map(|key| key.as_str().to_string()));
    wtr.write_record(&header)?;

    for row in table.rows() {
        let mut record = Vec::with_capacity(row.values.len() + 1);
        record.push(row.date.format("%Y-%m-%d").to_string());
        record.extend(
            row.values
                .iter()
                .map(|value| value.map(|v| v.to_string()).unwrap_or_default()),
        );
        wtr.write_record(&record)?;
    }

    wtr.flush().map_err(|e| ExportError::Io(e.to_string()))?;
    Ok(())
}

/// Renders `table` as a CSV string.
pub fn to_csv(table: &WideTable) -> Result<String, ExportError> {
    let mut buf = Vec::new();
    write_csv(table, &mut buf)?;
    String::from_utf8(buf).map_err(|e| ExportError::Io(e.to_string()))
}

/// One JSON object per row, keyed by column name.
pub fn to_json_records(table: &WideTable) -> Vec<Value> {
    table
        .rows()
        .iter()
        .map(|row| {
            let mut record = Map::with_capacity(row.values.len() + 1);
            record.insert(
                "date".to_string(),
                Value::String(row.date.format("%Y-%m-%d").to_string()),
            );
            for (key, value) in table.columns().iter().zip(&row.values) {
                let cell = value
                    .and_then(serde_json::Number::from_f64)
                    .map(Value::Number)
                    .unwrap_or(Value::Null);
                record.insert(key.as_str().to_string(), cell);
            }
            Value::Object(record)
        })
        .collect()
}

/// Renders `table` as a pretty-printed JSON array.
pub fn to_json(table: &WideTable) -> Result<String, ExportError> {
    serde_json::to_string_pretty(&to_json_records(table))
        .map_err(|e| ExportError::Serialization(e.to_string()))
}

/// Export errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportError {
    /// Writing the output failed
    Io(String),
    /// Encoding failed
    Serialization(String),
}

impl std::fmt::Display for ExportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExportError::Io(msg) => write!(f, "Export I/O error: {}", msg),
            ExportError::Serialization(msg) => write!(f, "Export serialization error: {}", msg),
        }
    }
}

impl std::error::Error for ExportError {}

impl From<csv::Error> for ExportError {
    fn from(err: csv::Error) -> Self {
        ExportError::Serialization(err.to_string())
    }
}
