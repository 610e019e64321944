use crate::calendar::CalendarGapError;
use crate::config::ConfigError;
use crate::merge::MergeError;
use crate::normalize::ParseError;
use crate::observation::ProviderError;
use crate::reconcile::StorageError;
use crate::series_key::SeriesKey;

/// Errors that abort a pipeline run
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineError {
    /// Fetching observations failed
    Provider(ProviderError),
    /// A raw observation could not be parsed
    Parse(ParseError),
    /// Invalid calendar range
    Calendar(CalendarGapError),
    /// Reading or writing persisted rows failed
    Storage(StorageError),
    /// The wide table could not be assembled
    Merge(MergeError),
    /// Invalid configuration
    Config(ConfigError),
    /// The schema tracks sentiment columns but no sentiment input was supplied
    MissingSentiment(String),
    /// Missing cells under the abort policy; nothing was written
    IncompleteData { missing: Vec<(SeriesKey, usize)> },
}

impl std::fmt::Display for PipelineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineError::Provider(e) => write!(f, "{}", e),
            PipelineError::Parse(e) => write!(f, "{}", e),
            PipelineError::Calendar(e) => write!(f, "{}", e),
            PipelineError::Storage(e) => write!(f, "{}", e),
            PipelineError::Merge(e) => write!(f, "{}", e),
            PipelineError::Config(e) => write!(f, "{}", e),
            PipelineError::MissingSentiment(table) => {
                write!(f, "Table {} needs sentiment input but none was supplied", table)
            }
            PipelineError::IncompleteData { missing } => {
                let detail: Vec<String> = missing
                    .iter()
                    .map(|(key, count)| format!("{}={}", key, count))
                    .collect();
                write!(f, "Refusing to write incomplete rows ({})", detail.join(", "))
            }
        }
    }
}

impl std::error::Error for PipelineError {}

impl From<ProviderError> for PipelineError {
    fn from(err: ProviderError) -> Self {
        PipelineError::Provider(err)
    }
}

impl From<ParseError> for PipelineError {
    fn from(err: ParseError) -> Self {
        PipelineError::Parse(err)
    }
}

impl From<CalendarGapError> for PipelineError {
    fn from(err: CalendarGapError) -> Self {
        PipelineError::Calendar(err)
    }
}

impl From<StorageError> for PipelineError {
    fn from(err: StorageError) -> Self {
        PipelineError::Storage(err)
    }
}

impl From<MergeError> for PipelineError {
    fn from(err: MergeError) -> Self {
        PipelineError::Merge(err)
    }
}

impl From<ConfigError> for PipelineError {
    fn from(err: ConfigError) -> Self {
        PipelineError::Config(err)
    }
}
