//! Database error types.

use derive_more::{Display, Error};
use tracing::instrument;

/// Which stage of a database call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum DbErrorKind {
    /// Opening the SQLite file or configuring the connection.
    Connection,
    /// Applying embedded migrations.
    Migration,
    /// A query or statement was rejected.
    Query,
    /// A stored row could not be decoded into a session.
    Corrupt,
    /// A value cannot be represented in the schema.
    Invalid,
    /// The addressed row does not exist.
    NotFound,
}

/// Database error with location tracking.
#[derive(Debug, Clone, Display, Error)]
#[display("Database {} error: {} at {}:{}", kind, message, file, line)]
pub struct DbError {
    /// Failing stage.
    pub kind: DbErrorKind,
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl DbError {
    /// Creates a new database error with caller location tracking.
    #[track_caller]
    #[instrument(skip(message))]
    pub fn new(kind: DbErrorKind, message: impl Into<String>) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            kind,
            message: message.into(),
            line: loc.line(),
            file: loc.file(),
        }
    }

    /// Shorthand for a [`DbErrorKind::Corrupt`] error.
    #[track_caller]
    pub fn corrupt(message: impl Into<String>) -> Self {
        Self::new(DbErrorKind::Corrupt, message)
    }

    /// Shorthand for a [`DbErrorKind::Invalid`] error.
    #[track_caller]
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::new(DbErrorKind::Invalid, message)
    }
}

impl From<diesel::result::Error> for DbError {
    #[track_caller]
    fn from(err: diesel::result::Error) -> Self {
        match err {
            diesel::result::Error::NotFound => Self::new(DbErrorKind::NotFound, "Row not found"),
            other => Self::new(DbErrorKind::Query, other.to_string()),
        }
    }
}

impl From<diesel::ConnectionError> for DbError {
    #[track_caller]
    fn from(err: diesel::ConnectionError) -> Self {
        Self::new(DbErrorKind::Connection, err.to_string())
    }
}

impl From<serde_json::Error> for DbError {
    #[track_caller]
    fn from(err: serde_json::Error) -> Self {
        Self::corrupt(format!("Malformed stored JSON: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_names_kind_and_location() {
        let err = DbError::invalid("Grid dimension too large");
        let shown = err.to_string();
        assert!(shown.starts_with("Database invalid error: Grid dimension too large at "));
        assert!(shown.contains("error.rs"));
    }

    #[test]
    fn test_diesel_not_found_maps_to_kind() {
        let err = DbError::from(diesel::result::Error::NotFound);
        assert_eq!(err.kind, DbErrorKind::NotFound);
    }
}
