//! HTTP request handlers for the dashboard feed

use axum::{
    extract::{Query, State},
    http::header,
    response::IntoResponse,
    Json,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::error::ApiError;
use super::state::AppState;
use crate::calendar::CalendarRange;
use crate::export::to_csv;
use crate::merge::{WideRow, WideTable};
use crate::reconcile::RowStore;
use crate::schema::SeriesSource;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub table: String,
    pub latest_date: Option<NaiveDate>,
}

/// GET /health - Liveness plus the most recent persisted date
pub async fn health_check(
    State(state): State<Arc<AppState>>,
) -> Result<Json<HealthResponse>, ApiError> {
    let store = state.store.lock().await;
    Ok(Json(HealthResponse {
        status: "ok".to_string(),
        table: store.schema().table.clone(),
        latest_date: store.latest_date()?,
    }))
}

/// Response for column listing
#[derive(Debug, Serialize)]
pub struct ColumnsResponse {
    pub table: String,
    pub columns: Vec<ColumnInfo>,
}

/// Information about one persisted column
#[derive(Debug, Serialize)]
pub struct ColumnInfo {
    pub name: String,
    pub column: String,
    pub cadence: String,
    pub source: String,
}

/// GET /columns - Column layout of the served table, in order
pub async fn list_columns(State(state): State<Arc<AppState>>) -> Json<ColumnsResponse> {
    let store = state.store.lock().await;
    let schema = store.schema();

    let columns = schema
        .series
        .iter()
        .map(|spec| ColumnInfo {
            name: spec.key.to_string(),
            column: spec.key.column_name(),
            cadence: spec.cadence.as_str().to_string(),
            source: match &spec.source {
                SeriesSource::Provider { series_id } => series_id.clone(),
                SeriesSource::Mentions => "mentions".to_string(),
                SeriesSource::Polarity => "polarity".to_string(),
            },
        })
        .collect();

    Json(ColumnsResponse {
        table: schema.table.clone(),
        columns,
    })
}

/// Query parameters for row queries. Both bounds or neither.
#[derive(Debug, Default, Deserialize)]
pub struct RowsQuery {
    pub start: Option<String>,
    pub end: Option<String>,
}

impl RowsQuery {
    fn range(&self) -> Result<Option<CalendarRange>, ApiError> {
        match (&self.start, &self.end) {
            (None, None) => Ok(None),
            (Some(start), Some(end)) => {
                let start = NaiveDate::parse_from_str(start, "%Y-%m-%d")
                    .map_err(|e| ApiError::InvalidDateRange(format!("Invalid start date: {}", e)))?;
                let end = NaiveDate::parse_from_str(end, "%Y-%m-%d")
                    .map_err(|e| ApiError::InvalidDateRange(format!("Invalid end date: {}", e)))?;
                CalendarRange::new(start, end)
                    .map(Some)
                    .map_err(|e| ApiError::InvalidDateRange(e.to_string()))
            }
            _ => Err(ApiError::InvalidParameter(
                "start and end must be given together".to_string(),
            )),
        }
    }
}

/// Response for row queries
#[derive(Debug, Serialize)]
pub struct RowsResponse {
    pub table: String,
    pub columns: Vec<String>,
    pub rows: Vec<WideRow>,
}

async fn load(state: &AppState, params: &RowsQuery) -> Result<(String, WideTable), ApiError> {
    let range = params.range()?;
    let store = state.store.lock().await;
    let table = store.load_rows(range.as_ref())?;
    Ok((store.schema().table.clone(), table))
}

/// GET /rows?start=&end= - Persisted rows in date order
pub async fn get_rows(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RowsQuery>,
) -> Result<Json<RowsResponse>, ApiError> {
    let (table_name, table) = load(&state, &params).await?;
    tracing::debug!(table = %table_name, rows = table.len(), "serving rows");

    Ok(Json(RowsResponse {
        table: table_name,
        columns: table.columns().iter().map(|key| key.to_string()).collect(),
        rows: table.into_rows(),
    }))
}

/// GET /rows.csv?start=&end= - Persisted rows as CSV
pub async fn get_rows_csv(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RowsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let (_, table) = load(&state, &params).await?;
    let body = to_csv(&table)?;
    Ok(([(header::CONTENT_TYPE, "text/csv; charset=utf-8")], body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::TableSchema;
    use crate::sqlite_store::SqliteRowStore;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn state() -> Arc<AppState> {
        let mut store = SqliteRowStore::new_in_memory(TableSchema::economics()).unwrap();
        let rows: Vec<WideRow> = (1..=4)
            .map(|day| WideRow::new(d(day), vec![Some(day as f64); 10]))
            .collect();
        store.insert_rows(&rows).unwrap();
        Arc::new(AppState::new(store))
    }

    fn query(start: Option<&str>, end: Option<&str>) -> Query<RowsQuery> {
        Query(RowsQuery {
            start: start.map(str::to_string),
            end: end.map(str::to_string),
        })
    }

    #[tokio::test]
    async fn test_health_reports_latest_date() {
        let Json(health) = health_check(State(state())).await.unwrap();
        assert_eq!(health.status, "ok");
        assert_eq!(health.table, "econ_metrics");
        assert_eq!(health.latest_date, Some(d(4)));
    }

    #[tokio::test]
    async fn test_list_columns_in_order() {
        let Json(response) = list_columns(State(state())).await;
        assert_eq!(response.columns.len(), 10);
        assert_eq!(response.columns[0].name, "Dow");
        assert_eq!(response.columns[0].source, "DJIA");
        assert_eq!(response.columns[7].column, "cpi_item_cost");
        assert_eq!(response.columns[7].cadence, "monthly");
    }

    #[tokio::test]
    async fn test_get_rows_with_range() {
        let Json(response) = get_rows(State(state()), query(Some("2024-01-02"), Some("2024-01-03")))
            .await
            .unwrap();
        assert_eq!(response.rows.len(), 2);
        assert_eq!(response.rows[0].date, d(2));
        assert_eq!(response.columns[0], "Dow");
    }

    #[tokio::test]
    async fn test_get_rows_without_range() {
        let Json(response) = get_rows(State(state()), query(None, None)).await.unwrap();
        assert_eq!(response.rows.len(), 4);
    }

    #[tokio::test]
    async fn test_get_rows_rejects_bad_ranges() {
        let inverted = get_rows(State(state()), query(Some("2024-01-03"), Some("2024-01-01"))).await;
        assert!(matches!(inverted, Err(ApiError::InvalidDateRange(_))));

        let half = get_rows(State(state()), query(Some("2024-01-03"), None)).await;
        assert!(matches!(half, Err(ApiError::InvalidParameter(_))));

        let garbage = get_rows(State(state()), query(Some("yesterday"), Some("today"))).await;
        assert!(matches!(garbage, Err(ApiError::InvalidDateRange(_))));
    }

    #[tokio::test]
    async fn test_rows_csv() {
        let response = get_rows_csv(State(state()), query(Some("2024-01-01"), Some("2024-01-01")))
            .await
            .unwrap()
            .into_response();
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "text/csv; charset=utf-8"
        );
    }
}
