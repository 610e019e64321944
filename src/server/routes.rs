//! Route definitions for the dashboard feed

use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers;
use super::state::AppState;

/// Creates the router with all routes and middleware
pub fn create_router(state: Arc<AppState>) -> Router {
    // the dashboard is served from another origin
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/columns", get(handlers::list_columns))
        .route("/rows", get(handlers::get_rows))
        .route("/rows.csv", get(handlers::get_rows_csv))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
