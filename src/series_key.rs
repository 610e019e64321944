use serde::{Deserialize, Serialize};
use std::fmt;

/// Column name identifying one tracked series in the wide table.
///
/// The key doubles as a SQL column identifier, so it is restricted to
/// ASCII letters, digits and underscores, and may not start with a digit.
/// Keys are compared case-sensitively, but the store folds them to lower case
/// when creating columns (the persisted table uses lower-case identifiers).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SeriesKey(String);

impl SeriesKey {
    /// Creates a new series key from a column name.
    ///
    /// # Errors
    /// Returns an error if the name is empty, is the reserved `date` column,
    /// or contains characters that are not valid in an SQL identifier.
    pub fn new(name: impl Into<String>) -> Result<Self, SeriesKeyError> {
        let name = name.into();
        Self::validate(&name)?;
        Ok(SeriesKey(name))
    }

    fn validate(name: &str) -> Result<(), SeriesKeyError> {
        if name.is_empty() {
            return Err(SeriesKeyError::EmptyKey);
        }

        if name.eq_ignore_ascii_case("date") {
            return Err(SeriesKeyError::Reserved);
        }

        if name.starts_with(|c: char| c.is_ascii_digit())
            || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(SeriesKeyError::InvalidCharacters);
        }

        Ok(())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Lower-cased column identifier as stored in the database.
    pub fn column_name(&self) -> String {
        self.0.to_ascii_lowercase()
    }
}

impl fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for SeriesKey {
    type Error = SeriesKeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        SeriesKey::new(value)
    }
}

impl From<SeriesKey> for String {
    fn from(key: SeriesKey) -> Self {
        key.0
    }
}

/// Errors that can occur when creating or validating series keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeriesKeyError {
    /// The key is empty
    EmptyKey,
    /// The key collides with the `date` key column
    Reserved,
    /// The key contains characters not allowed in a column identifier
    InvalidCharacters,
}

impl fmt::Display for SeriesKeyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeriesKeyError::EmptyKey => write!(f, "Series key cannot be empty"),
            SeriesKeyError::Reserved => write!(f, "Series key cannot be the reserved 'date' column"),
            SeriesKeyError::InvalidCharacters => {
                write!(f, "Series key contains invalid characters")
            }
        }
    }
}

impl std::error::Error for SeriesKeyError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_series_key_creation_valid() {
        let key = SeriesKey::new("T_Note_10yr").unwrap();
        assert_eq!(key.as_str(), "T_Note_10yr");
        assert_eq!(key.column_name(), "t_note_10yr");
    }

    #[test]
    fn test_series_key_empty() {
        assert_eq!(SeriesKey::new("").unwrap_err(), SeriesKeyError::EmptyKey);
    }

    #[test]
    fn test_series_key_reserved_date() {
        assert_eq!(SeriesKey::new("Date").unwrap_err(), SeriesKeyError::Reserved);
    }

    #[test]
    fn test_series_key_rejects_sql_metacharacters() {
        assert_eq!(
            SeriesKey::new("Dow; DROP TABLE x").unwrap_err(),
            SeriesKeyError::InvalidCharacters
        );
        assert_eq!(
            SeriesKey::new("10yr").unwrap_err(),
            SeriesKeyError::InvalidCharacters
        );
    }

    #[test]
    fn test_series_key_serde_validates() {
        let key: SeriesKey = serde_json::from_str("\"SP500\"").unwrap();
        assert_eq!(key.to_string(), "SP500");
        assert!(serde_json::from_str::<SeriesKey>("\"S&P\"").is_err());
    }
}
