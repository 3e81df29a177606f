use crate::ai::client::{AiError, CommitContext, MessageProvider, MessageStyle, build_prompt, clean_response};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "http://localhost:11434";
const DEFAULT_MODEL: &str = "llama3.2";

#[derive(Serialize)]
struct GenerateRequest {
    model: String,
    prompt: String,
    stream: bool,
    options: serde_json::Value,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelTag>,
}

#[derive(Deserialize)]
struct ModelTag {
    #[serde(default)]
    name: String,
}

/// Local model provider; no API key, longer timeouts
pub struct OllamaProvider {
    base_url: String,
    model: String,
    http_client: Client,
}

impl OllamaProvider {
    pub fn new() -> Self {
        Self::with_config(DEFAULT_BASE_URL.to_string(), DEFAULT_MODEL.to_string())
    }

    pub fn with_config(base_url: String, model: String) -> Self {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url,
            model,
            http_client,
        }
    }

    /// Check the server is reachable and the model is pulled
    pub async fn check_connection(&self) -> Result<(), AiError> {
        let response = self
            .http_client
            .get(format!("{}/api/tags", self.base_url))
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .map_err(|_| {
                AiError::ApiError(format!("Cannot connect to Ollama at {}", self.base_url))
            })?;

        let tags: TagsResponse = response.json().await?;
        let wanted = self.model.split(':').next().unwrap_or(&self.model);
        let found = tags
            .models
            .iter()
            .any(|m| m.name.split(':').next() == Some(wanted));
        if !found {
            return Err(AiError::ApiError(format!(
                "Model '{}' not found on Ollama server",
                self.model
            )));
        }
        Ok(())
    }
}

impl Default for OllamaProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageProvider for OllamaProvider {
    async fn generate_message(
        &self,
        context: &CommitContext,
        style: MessageStyle,
    ) -> Result<String, AiError> {
        let request = GenerateRequest {
            model: self.model.clone(),
            prompt: build_prompt(context, style),
            stream: false,
            options: json!({
                "temperature": 0.3,
                "top_p": 0.9,
            }),
        };

        let response = self
            .http_client
            .post(format!("{}/api/generate", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|_| {
                AiError::ApiError(format!("Cannot connect to Ollama at {}", self.base_url))
            })?;

        if !response.status().is_success() {
            return Err(AiError::ApiError(format!(
                "Ollama returned status {}",
                response.status()
            )));
        }

        let body: GenerateResponse = response.json().await?;
        let message = clean_response(&body.response, style);
        if message.is_empty() {
            return Err(AiError::InvalidResponse("Empty message".to_string()));
        }

        Ok(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_request_shape() {
        let request = GenerateRequest {
            model: DEFAULT_MODEL.to_string(),
            prompt: "rewrite this".to_string(),
            stream: false,
            options: json!({"temperature": 0.3, "top_p": 0.9}),
        };

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["stream"], false);
        assert_eq!(value["options"]["temperature"], 0.3);
    }

    #[test]
    fn test_tags_response_parsing() {
        let body = r#"{"models": [{"name": "llama3.2:latest"}, {"name": "mistral:7b"}]}"#;
        let tags: TagsResponse = serde_json::from_str(body).unwrap();
        assert_eq!(tags.models.len(), 2);
        assert_eq!(tags.models[0].name.split(':').next(), Some("llama3.2"));
    }

    #[test]
    fn test_generate_response_parsing() {
        let body = r#"{"response": "feat: add login", "done": true}"#;
        let parsed: GenerateResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.response, "feat: add login");
    }
}
