//! Error types for meeting persistence.

use tempo_core::error::TempoError;

/// Errors surfaced by a [`crate::MeetingStore`].
///
/// A missing record is not an error; lookups return `Option`.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("store lock poisoned: {0}")]
    Poisoned(String),
    #[error("query failed: {0}")]
    Query(String),
    #[error("corrupt record: {0}")]
    Corrupt(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Query(err.to_string())
    }
}

impl From<StoreError> for TempoError {
    fn from(err: StoreError) -> Self {
        TempoError::Storage(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_display() {
        assert_eq!(
            StoreError::Unavailable("db closed".into()).to_string(),
            "store unavailable: db closed"
        );
        assert_eq!(
            StoreError::Corrupt("bad uuid".into()).to_string(),
            "corrupt record: bad uuid"
        );
    }

    #[test]
    fn test_store_error_into_tempo_error() {
        let err: TempoError = StoreError::Query("syntax".into()).into();
        assert!(matches!(err, TempoError::Storage(_)));
        assert!(err.to_string().contains("syntax"));
    }

    #[test]
    fn test_from_rusqlite() {
        let err: StoreError = rusqlite::Error::QueryReturnedNoRows.into();
        assert!(matches!(err, StoreError::Query(_)));
    }
}
