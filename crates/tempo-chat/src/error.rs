//! Error types for the dialogue layer.

use tempo_core::error::TempoError;
use tempo_schedule::StoreError;

use crate::completion::CompletionError;

/// Why a model reply could not be turned into a structured extraction.
#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    #[error("no JSON object found in model output")]
    NoJson,
    #[error("model output is not valid JSON: {0}")]
    Malformed(String),
    #[error("missing action tag")]
    MissingAction,
    #[error("unexpected action '{0}'")]
    UnexpectedAction(String),
    #[error("invalid field {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

/// Errors from the chat engine.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("message cannot be empty")]
    EmptyMessage,
    #[error("message exceeds maximum length of {0} characters")]
    MessageTooLong(usize),
    #[error("storage error: {0}")]
    Store(#[from] StoreError),
    #[error("completion error: {0}")]
    Completion(#[from] CompletionError),
    #[error("extraction error: {0}")]
    Extraction(#[from] ExtractionError),
    #[error("invalid conversation state: {0}")]
    InvalidState(String),
}

impl From<ChatError> for TempoError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::EmptyMessage | ChatError::MessageTooLong(_) => {
                TempoError::InvalidInput(err.to_string())
            }
            ChatError::Store(e) => e.into(),
            other => TempoError::Chat(other.to_string()),
        }
    }
}
