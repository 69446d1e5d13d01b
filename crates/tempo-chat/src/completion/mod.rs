//! Text completion service client.
//!
//! Every call is a single attempt. Callers treat any error as "no answer"
//! and fall back to rule-based or canned text.

mod http;

pub use http::HttpCompletionClient;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const MAX_LOG_CHARS: usize = 2_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptMessage {
    pub role: PromptRole,
    pub content: String,
}

impl PromptMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: PromptRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: PromptRole::User,
            content: content.into(),
        }
    }
}

/// A completion request: role-tagged messages, optionally with a temperature
/// override.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub messages: Vec<PromptMessage>,
    pub temperature: Option<f32>,
}

impl CompletionRequest {
    /// A plain-text prompt sent as a single user message.
    pub fn prompt(text: impl Into<String>) -> Self {
        Self {
            messages: vec![PromptMessage::user(text)],
            temperature: None,
        }
    }

    pub fn with_system(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            messages: vec![PromptMessage::system(system), PromptMessage::user(user)],
            temperature: None,
        }
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("http error: {0}")]
    Http(String),
    #[error("rate limited: {0}")]
    RateLimited(String),
    #[error("response error: {0}")]
    Response(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("completion service unavailable")]
    Unavailable,
}

#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<String, CompletionError>;
}

#[async_trait]
impl CompletionClient for Arc<dyn CompletionClient> {
    async fn complete(&self, request: CompletionRequest) -> Result<String, CompletionError> {
        (**self).complete(request).await
    }
}

/// Client used when no completion service is configured. Always fails, so
/// every caller takes its fallback path.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableCompletionClient;

#[async_trait]
impl CompletionClient for UnavailableCompletionClient {
    async fn complete(&self, _request: CompletionRequest) -> Result<String, CompletionError> {
        Err(CompletionError::Unavailable)
    }
}

pub(crate) fn truncate_for_log(input: &str, max_chars: usize) -> String {
    let char_count = input.chars().count();
    if char_count <= max_chars {
        return input.to_string();
    }
    let mut preview: String = input.chars().take(max_chars).collect();
    preview.push_str(&format!("... [truncated, total_chars={}]", char_count));
    preview
}

/// Single-attempt completion with uniform logging. `purpose` labels the call.
pub(crate) async fn complete_once(
    client: &dyn CompletionClient,
    purpose: &'static str,
    request: CompletionRequest,
) -> Result<String, CompletionError> {
    if tracing::enabled!(tracing::Level::DEBUG) {
        let prompt = request
            .messages
            .last()
            .map(|m| m.content.as_str())
            .unwrap_or_default();
        tracing::debug!(purpose, prompt = %truncate_for_log(prompt, MAX_LOG_CHARS), "Completion request");
    }
    match client.complete(request).await {
        Ok(text) => {
            tracing::debug!(purpose, output = %truncate_for_log(&text, MAX_LOG_CHARS), "Completion response");
            Ok(text)
        }
        Err(e) => {
            tracing::warn!(purpose, error = %e, "Completion failed, using fallback");
            Err(e)
        }
    }
}
