//! OpenAI-compatible chat completions over HTTP.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use tempo_core::config::CompletionConfig;

use super::{CompletionClient, CompletionError, CompletionRequest, PromptMessage};

pub struct HttpCompletionClient {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    temperature: f32,
    api_key: Option<String>,
}

impl HttpCompletionClient {
    /// Build from config. The API key is read from the environment variable
    /// named by `api_key_env`; a missing key is allowed for local servers.
    pub fn from_config(config: &CompletionConfig) -> Result<Self, CompletionError> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty());
        if api_key.is_none() {
            tracing::warn!(
                env = %config.api_key_env,
                "No API key found for completion service"
            );
        }
        Self::new(config, api_key)
    }

    pub fn new(config: &CompletionConfig, api_key: Option<String>) -> Result<Self, CompletionError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| CompletionError::Http(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            temperature: config.temperature,
            api_key,
        })
    }

    fn headers(&self) -> Result<HeaderMap, CompletionError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(key) = &self.api_key {
            let value = format!("Bearer {}", key);
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&value).map_err(|e| CompletionError::Http(e.to_string()))?,
            );
        }
        Ok(headers)
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [PromptMessage],
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Debug, Deserialize)]
struct ChatMessageResponse {
    #[serde(default)]
    content: Option<String>,
}

/// Pull the first choice's text out of a chat completions body.
fn parse_completion(body: &str) -> Result<String, CompletionError> {
    let parsed: ChatResponse =
        serde_json::from_str(body).map_err(|e| CompletionError::Serialization(e.to_string()))?;
    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| CompletionError::Response("Missing choices".to_string()))
}

#[async_trait]
impl CompletionClient for HttpCompletionClient {
    async fn complete(&self, request: CompletionRequest) -> Result<String, CompletionError> {
        let body = ChatRequest {
            model: &self.model,
            messages: &request.messages,
            temperature: request.temperature.unwrap_or(self.temperature),
        };

        let response = self
            .client
            .post(&self.endpoint)
            .headers(self.headers()?)
            .json(&body)
            .send()
            .await
            .map_err(|e| CompletionError::Http(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let text = response.text().await.unwrap_or_default();
            return Err(CompletionError::RateLimited(text));
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(CompletionError::Response(format!("HTTP {}: {}", status, text)));
        }

        let text = response
            .text()
            .await
            .map_err(|e| CompletionError::Http(e.to_string()))?;
        parse_completion(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_completion_first_choice() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"Sure thing"}}]}"#;
        assert_eq!(parse_completion(body).unwrap(), "Sure thing");
    }

    #[test]
    fn test_parse_completion_missing_choices() {
        let err = parse_completion(r#"{"choices":[]}"#).unwrap_err();
        assert!(matches!(err, CompletionError::Response(_)));
    }

    #[test]
    fn test_parse_completion_null_content() {
        let body = r#"{"choices":[{"message":{"content":null}}]}"#;
        assert!(parse_completion(body).is_err());
    }

    #[test]
    fn test_parse_completion_invalid_json() {
        let err = parse_completion("<html>bad gateway</html>").unwrap_err();
        assert!(matches!(err, CompletionError::Serialization(_)));
    }

    #[test]
    fn test_request_body_shape() {
        let messages = vec![PromptMessage::user("hi")];
        let body = ChatRequest {
            model: "m",
            messages: &messages,
            temperature: 0.2,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["model"], "m");
        assert_eq!(json["messages"][0]["role"], "user");
    }

    #[test]
    fn test_client_builds_without_key() {
        let client = HttpCompletionClient::new(&CompletionConfig::default(), None).unwrap();
        let headers = client.headers().unwrap();
        assert!(headers.get(AUTHORIZATION).is_none());
    }
}
