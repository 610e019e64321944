//! Process configuration, built once at start-up and passed by reference.

use crate::fred::FredConfig;
use crate::merge::EdgeTrim;
use crate::normalize::DEFAULT_PLACEHOLDER;
use crate::schema::TableSchema;
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;

/// What to do with merged rows that still hold missing cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissingValuePolicy {
    /// Raise a data-quality alert, then write the rows with NULL cells
    #[default]
    AlertAndWrite,
    /// Drop incomplete rows before reconciliation
    DropIncomplete,
    /// Fail the run before anything is written
    Abort,
}

impl FromStr for MissingValuePolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "alert_and_write" | "alert" => Ok(MissingValuePolicy::AlertAndWrite),
            "drop_incomplete" | "drop" => Ok(MissingValuePolicy::DropIncomplete),
            "abort" => Ok(MissingValuePolicy::Abort),
            _ => Err(ConfigError::InvalidValue {
                key: "MISSING_VALUE_POLICY".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// Knobs of one pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Length of the target daily calendar window, in days (default: 31)
    pub daily_window_days: u32,
    /// How far back monthly series are fetched, in days (default: 75)
    pub monthly_lookback_days: u32,
    /// Overrides the schema's edge trim when set
    pub edge_trim: Option<EdgeTrim>,
    /// Raw value that stands for "not reported" (default: ".")
    pub placeholder: String,
    /// Staleness alert threshold, in days (default: 10)
    pub staleness_days: i64,
    pub missing_values: MissingValuePolicy,
    /// Leave dates after the last day every daily series has reported for a
    /// later run (default: true)
    pub hold_unreported_tail: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            daily_window_days: 31,
            monthly_lookback_days: 75,
            edge_trim: None,
            placeholder: DEFAULT_PLACEHOLDER.to_string(),
            staleness_days: 10,
            missing_values: MissingValuePolicy::default(),
            hold_unreported_tail: true,
        }
    }
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// FRED API key, required to run the pipeline
    pub fred_api_key: Option<String>,
    /// Path to the SQLite database (default: "econdaily.db")
    pub database_path: String,
    /// Target table preset
    pub schema: TableSchema,
    /// Optional webhook receiving alerts
    pub alert_webhook: Option<String>,
    /// Dashboard feed host (default: "127.0.0.1")
    pub host: String,
    /// Dashboard feed port (default: 3000)
    pub port: u16,
    pub fred: FredConfig,
    pub pipeline: PipelineConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            fred_api_key: None,
            database_path: "econdaily.db".to_string(),
            schema: TableSchema::economics(),
            alert_webhook: None,
            host: "127.0.0.1".to_string(),
            port: 3000,
            fred: FredConfig::default(),
            pipeline: PipelineConfig::default(),
        }
    }
}

impl AppConfig {
    /// Builds the configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let vars: HashMap<String, String> = std::env::vars().collect();
        Self::from_map(&vars)
    }

    /// Builds the configuration from the environment overlaid with a
    /// dotenv-style `KEY=VALUE` file. Values in the file win.
    ///
    /// # Errors
    /// Returns `ConfigError::Unreadable` if the file cannot be read and
    /// `ConfigError::MalformedLine` for a line dotenv syntax rejects.
    pub fn from_kv_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let entries = dotenvy::from_path_iter(path).map_err(|e| file_error(path, e))?;

        let mut vars: HashMap<String, String> = std::env::vars().collect();
        for entry in entries {
            let (key, value) = entry.map_err(|e| file_error(path, e))?;
            vars.insert(key, value);
        }
        Self::from_map(&vars)
    }

    /// Builds the configuration from an explicit key/value map.
    pub fn from_map(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let defaults = AppConfig::default();
        let get = |key: &str| vars.get(key).map(|v| v.trim()).filter(|v| !v.is_empty());

        let schema = match get("ECONDAILY_SCHEMA") {
            Some(name) => TableSchema::by_name(name).ok_or_else(|| ConfigError::InvalidValue {
                key: "ECONDAILY_SCHEMA".to_string(),
                value: name.to_string(),
            })?,
            None => defaults.schema,
        };

        let mut fred = defaults.fred;
        if let Some(url) = get("FRED_BASE_URL") {
            fred.base_url = url.to_string();
        }
        fred.pacing_seconds = parse_or(vars, "FRED_PACING_SECONDS", fred.pacing_seconds)?;
        fred.timeout_seconds = parse_or(vars, "FRED_TIMEOUT_SECONDS", fred.timeout_seconds)?;

        let mut pipeline = defaults.pipeline;
        pipeline.daily_window_days =
            parse_or(vars, "DAILY_WINDOW_DAYS", pipeline.daily_window_days)?;
        pipeline.monthly_lookback_days =
            parse_or(vars, "MONTHLY_LOOKBACK_DAYS", pipeline.monthly_lookback_days)?;
        pipeline.staleness_days = parse_or(vars, "STALENESS_DAYS", pipeline.staleness_days)?;
        pipeline.hold_unreported_tail =
            parse_or(vars, "HOLD_UNREPORTED_TAIL", pipeline.hold_unreported_tail)?;
        if let Some(token) = get("MISSING_PLACEHOLDER") {
            pipeline.placeholder = token.to_string();
        }
        if let Some(policy) = get("MISSING_VALUE_POLICY") {
            pipeline.missing_values = policy.parse()?;
        }
        if let Some(trim) = get("EDGE_TRIM") {
            pipeline.edge_trim = Some(parse_edge_trim(trim)?);
        }

        Ok(AppConfig {
            fred_api_key: get("FRED_API_KEY").map(str::to_string),
            database_path: get("DATABASE_PATH")
                .map(str::to_string)
                .unwrap_or(defaults.database_path),
            schema,
            alert_webhook: get("ALERT_WEBHOOK_URL").map(str::to_string),
            host: get("HOST").map(str::to_string).unwrap_or(defaults.host),
            port: parse_or(vars, "PORT", defaults.port)?,
            fred,
            pipeline,
        })
    }

    /// Returns the FRED API key.
    ///
    /// # Errors
    /// Returns `ConfigError::Missing` if no key was configured.
    pub fn require_api_key(&self) -> Result<&str, ConfigError> {
        self.fred_api_key
            .as_deref()
            .ok_or_else(|| ConfigError::Missing("FRED_API_KEY".to_string()))
    }
}

fn file_error(path: &Path, err: dotenvy::Error) -> ConfigError {
    match err {
        dotenvy::Error::LineParse(line, _) => ConfigError::MalformedLine(line),
        other => ConfigError::Unreadable(format!("{}: {}", path.display(), other)),
    }
}

fn parse_or<T: FromStr>(
    vars: &HashMap<String, String>,
    key: &str,
    default: T,
) -> Result<T, ConfigError> {
    match vars.get(key).map(|v| v.trim()).filter(|v| !v.is_empty()) {
        Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            value: raw.to_string(),
        }),
        None => Ok(default),
    }
}

/// Parses `head,tail`.
fn parse_edge_trim(raw: &str) -> Result<EdgeTrim, ConfigError> {
    let invalid = || ConfigError::InvalidValue {
        key: "EDGE_TRIM".to_string(),
        value: raw.to_string(),
    };
    let (head, tail) = raw.split_once(',').ok_or_else(invalid)?;
    let head = head.trim().parse().map_err(|_| invalid())?;
    let tail = tail.trim().parse().map_err(|_| invalid())?;
    Ok(EdgeTrim::new(head, tail))
}

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Required key is absent
    Missing(String),
    /// Key present but its value is invalid
    InvalidValue { key: String, value: String },
    /// Configuration file could not be read
    Unreadable(String),
    /// Line the configuration file syntax rejects
    MalformedLine(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "Missing configuration key: {}", key),
            ConfigError::InvalidValue { key, value } => {
                write!(f, "Invalid value for {}: '{}'", key, value)
            }
            ConfigError::Unreadable(msg) => write!(f, "Cannot read configuration: {}", msg),
            ConfigError::MalformedLine(line) => {
                write!(f, "Malformed configuration line: '{}'", line)
            }
        }
    }
}

impl std::error::Error for ConfigError {}
