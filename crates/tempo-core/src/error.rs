use thiserror::Error;

/// Top-level error type for Tempo.
///
/// Subsystem crates keep their own error enums and convert into this one
/// where a failure has to cross the application boundary.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TempoError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Chat error: {0}")]
    Chat(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<toml::de::Error> for TempoError {
    fn from(err: toml::de::Error) -> Self {
        TempoError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for TempoError {
    fn from(err: toml::ser::Error) -> Self {
        TempoError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for TempoError {
    fn from(err: serde_json::Error) -> Self {
        TempoError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for Tempo operations.
pub type Result<T> = std::result::Result<T, TempoError>;
