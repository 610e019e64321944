//! Shared application state for the dashboard feed

use crate::sqlite_store::SqliteRowStore;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Store of the served table.
    /// Wrapped in Mutex because SQLite connections are not thread-safe
    pub store: Arc<Mutex<SqliteRowStore>>,
}

impl AppState {
    pub fn new(store: SqliteRowStore) -> Self {
        AppState {
            store: Arc::new(Mutex::new(store)),
        }
    }
}
