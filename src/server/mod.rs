//! Read-only HTTP feed of persisted rows for the dashboard

mod error;
mod handlers;
mod routes;
mod state;

pub use error::ApiError;
pub use routes::create_router;
pub use state::AppState;

use crate::config::AppConfig;
use crate::schema::TableSchema;
use crate::sqlite_store::SqliteRowStore;
use std::sync::Arc;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server host address (default: "127.0.0.1")
    pub host: String,
    /// Server port (default: 3000)
    pub port: u16,
    /// Path to SQLite database
    pub database_path: String,
    /// Table served by the feed
    pub schema: TableSchema,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for ServerConfig {
    fn from(config: &AppConfig) -> Self {
        ServerConfig {
            host: config.host.clone(),
            port: config.port,
            database_path: config.database_path.clone(),
            schema: config.schema.clone(),
        }
    }
}

/// Runs the dashboard feed until the listener fails.
///
/// The table is created if missing so that a fresh deployment serves an
/// empty feed instead of failing every request.
///
/// # Example
/// ```rust,no_run
/// use econdaily::server::{run_server, ServerConfig};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     run_server(ServerConfig::default()).await?;
///     Ok(())
/// }
/// ```
pub async fn run_server(config: ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    let store = SqliteRowStore::new(&config.database_path, config.schema)?;
    store.create_table()?;
    store.verify_layout()?;

    let state = Arc::new(AppState::new(store));
    let app = routes::create_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Dashboard feed listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
