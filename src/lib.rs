pub mod series_key;
pub mod cadence;
pub mod calendar;
pub mod series;
pub mod observation;
pub mod normalize;
pub mod reindex;
pub mod merge;
pub mod schema;
pub mod reconcile;
pub mod sqlite_store;
pub mod fred;
pub mod sentiment;
pub mod alerting;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod export;
pub mod server;

pub use series_key::{SeriesKey, SeriesKeyError};
pub use cadence::Cadence;
pub use calendar::{CalendarGapError, CalendarRange};
pub use series::Series;
pub use observation::{InMemoryObservationSource, ObservationSource, ProviderError, RawObservation};
pub use normalize::{normalize, ParseError, DEFAULT_PLACEHOLDER};
pub use reindex::{reindex, FillPolicy};
pub use merge::{merge, EdgeTrim, MergeError, MergeMode, WideRow, WideTable};
pub use schema::{SeriesSource, SeriesSpec, TableSchema};
pub use reconcile::{apply, reconcile, InMemoryRowStore, Reconciliation, RowStore, StorageError};
pub use sqlite_store::SqliteRowStore;
pub use fred::{FredClient, FredConfig};
pub use sentiment::{daily_mentions, daily_polarity, CountBucket, ScoredPost, SentimentInput};
pub use alerting::{
    Alert,
    AlertError,
    AlertPolicy,
    AlertSink,
    LogAlertSink,
    MemoryAlertSink,
    WebhookAlertSink,
};
pub use config::{AppConfig, ConfigError, MissingValuePolicy, PipelineConfig};
pub use error::PipelineError;
pub use pipeline::{AlignedTable, Pipeline, PipelineReport};
pub use export::{to_csv, to_json, ExportError};
pub use server::{run_server, ApiError, AppState, ServerConfig};
