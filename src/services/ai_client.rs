use reqwest::{Client, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error};

use crate::config::AssistantConfig;

#[derive(Error, Debug)]
pub enum AssistantError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Provider returned {status}: {body}")]
    Provider { status: StatusCode, body: String },
    #[error("Provider returned no content")]
    EmptyResponse,
    #[error("Provider returned malformed output: {0}")]
    MalformedOutput(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PromptMessage {
    pub role: String,
    pub content: String,
}

impl PromptMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [PromptMessage],
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    content: Option<String>,
}

/// Client for an OpenAI-compatible `/chat/completions` endpoint
#[derive(Clone)]
pub struct AiClient {
    client: Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl std::fmt::Debug for AiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AiClient")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

impl AiClient {
    /// `None` when no API key is configured
    pub fn from_config(config: &AssistantConfig) -> Result<Option<Self>, AssistantError> {
        let Some(api_key) = config.api_key.clone() else {
            return Ok(None);
        };

        let client = Client::builder().timeout(config.timeout).build()?;

        Ok(Some(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
        }))
    }

    pub async fn complete(&self, messages: &[PromptMessage]) -> Result<String, AssistantError> {
        self.send(messages, None).await
    }

    /// Ask for a JSON object and deserialize it
    pub async fn complete_json<T: DeserializeOwned>(
        &self,
        messages: &[PromptMessage],
    ) -> Result<T, AssistantError> {
        let content = self
            .send(messages, Some(ResponseFormat { kind: "json_object" }))
            .await?;

        parse_json_content(&content)
    }

    async fn send(
        &self,
        messages: &[PromptMessage],
        response_format: Option<ResponseFormat>,
    ) -> Result<String, AssistantError> {
        let request = CompletionRequest {
            model: &self.model,
            messages,
            temperature: 0.7,
            response_format,
        };

        debug!("Sending {} messages to {}", messages.len(), self.base_url);

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("AI provider request failed: {} - {}", status, body);
            return Err(AssistantError::Provider { status, body });
        }

        let completion = response.json::<CompletionResponse>().await?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or(AssistantError::EmptyResponse)
    }
}

/// Models sometimes wrap JSON in markdown fences even in JSON mode
pub fn parse_json_content<T: DeserializeOwned>(content: &str) -> Result<T, AssistantError> {
    let trimmed = content.trim();
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.trim_end().strip_suffix("```"))
        .unwrap_or(trimmed)
        .trim();

    serde_json::from_str(unfenced).map_err(|err| AssistantError::MalformedOutput(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use std::time::Duration;

    #[test]
    fn test_disabled_without_api_key() {
        let config = AssistantConfig {
            api_key: None,
            base_url: "http://localhost".to_string(),
            model: "test".to_string(),
            timeout: Duration::from_secs(5),
        };
        assert!(AiClient::from_config(&config).unwrap().is_none());
    }

    #[test]
    fn test_parse_json_content_strips_fences() {
        let value: Value = parse_json_content("```json\n{\"a\": 1}\n```").unwrap();
        assert_eq!(value["a"], 1);

        let value: Value = parse_json_content("  {\"b\": true} ").unwrap();
        assert_eq!(value["b"], true);

        assert!(matches!(
            parse_json_content::<Value>("not json"),
            Err(AssistantError::MalformedOutput(_))
        ));
    }

    #[test]
    fn test_request_serialization() {
        let messages = vec![PromptMessage::system("be brief"), PromptMessage::user("hi")];
        let request = CompletionRequest {
            model: "m",
            messages: &messages,
            temperature: 0.7,
            response_format: Some(ResponseFormat { kind: "json_object" }),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["messages"][1]["role"], "user");
        assert_eq!(json["response_format"]["type"], "json_object");

        let plain = CompletionRequest {
            response_format: None,
            ..request
        };
        assert!(serde_json::to_value(&plain).unwrap().get("response_format").is_none());
    }
}
