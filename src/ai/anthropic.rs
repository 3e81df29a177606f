use crate::ai::client::{AiError, CommitContext, MessageProvider, MessageStyle, build_prompt, clean_response};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use std::time::{Duration, Instant};

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const DEFAULT_MODEL: &str = "claude-sonnet-4-5-20250929";
const SYSTEM_PROMPT: &str =
    "You are a git commit message writer. Respond only with the commit message, nothing else.";
const MAX_RETRIES: u32 = 3;
const INITIAL_BACKOFF_MS: u64 = 1000;

// Rate limiting: 10 requests per minute
const RATE_LIMIT_REQUESTS: usize = 10;
const RATE_LIMIT_WINDOW: Duration = Duration::from_secs(60);

#[derive(Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    temperature: f32,
    system: String,
    messages: Vec<Message>,
}

#[derive(Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    text: String,
}

pub struct AnthropicProvider {
    api_key: String,
    model: String,
    http_client: Client,
    // Rate limiting: track request timestamps
    request_times: Mutex<Vec<Instant>>,
}

impl AnthropicProvider {
    pub fn new(api_key: String) -> Self {
        Self::with_model(api_key, DEFAULT_MODEL.to_string())
    }

    pub fn with_model(api_key: String, model: String) -> Self {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            api_key,
            model,
            http_client,
            request_times: Mutex::new(Vec::new()),
        }
    }

    /// Check and enforce rate limiting
    /// Returns Ok(()) if request is allowed, Err with wait time if rate limited
    fn check_rate_limit(&self) -> Result<(), AiError> {
        let now = Instant::now();
        let mut times = self.request_times.lock().unwrap();

        // Remove requests older than the rate limit window
        times.retain(|&time| now.duration_since(time) < RATE_LIMIT_WINDOW);

        if times.len() >= RATE_LIMIT_REQUESTS {
            let oldest = times[0];
            let wait_time = RATE_LIMIT_WINDOW.saturating_sub(now.duration_since(oldest));
            return Err(AiError::RateLimitExceeded(wait_time.as_secs()));
        }

        times.push(now);
        Ok(())
    }

    async fn call_api(&self, prompt: String) -> Result<String, AiError> {
        let request_body = AnthropicRequest {
            model: self.model.clone(),
            max_tokens: 200,
            temperature: 0.3,
            system: SYSTEM_PROMPT.to_string(),
            messages: vec![Message {
                role: "user".to_string(),
                content: prompt,
            }],
        };

        let mut attempt = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            attempt += 1;

            let response = self
                .http_client
                .post(ANTHROPIC_API_URL)
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", "2023-06-01")
                .header("content-type", "application/json")
                .json(&request_body)
                .send()
                .await?;

            let status = response.status();

            if status.is_success() {
                let api_response: AnthropicResponse = response.json().await?;

                if let Some(content) = api_response.content.first() {
                    return Ok(content.text.clone());
                } else {
                    return Err(AiError::InvalidResponse(
                        "No content in response".to_string(),
                    ));
                }
            } else if status.as_u16() == 429 {
                // Rate limit - check retry-after header
                let retry_after = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(60);

                if attempt >= MAX_RETRIES {
                    return Err(AiError::RateLimitExceeded(retry_after));
                }

                // Exponential backoff with retry-after
                let wait_ms = retry_after.saturating_mul(1000).max(backoff_ms);
                eprintln!(
                    "Rate limited, retrying in {}ms (attempt {}/{})",
                    wait_ms, attempt, MAX_RETRIES
                );

                tokio::time::sleep(Duration::from_millis(wait_ms)).await;
                backoff_ms *= 2;
                continue;
            } else {
                let error_text = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unknown error".to_string());
                return Err(AiError::ApiError(format!(
                    "API returned status {}: {}",
                    status, error_text
                )));
            }
        }
    }
}

#[async_trait]
impl MessageProvider for AnthropicProvider {
    async fn generate_message(
        &self,
        context: &CommitContext,
        style: MessageStyle,
    ) -> Result<String, AiError> {
        // Check rate limiting before making API call
        self.check_rate_limit()?;

        let prompt = build_prompt(context, style);
        let response = self.call_api(prompt).await?;

        let message = clean_response(&response, style);
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
    fn test_rate_limiting_allows_initial_requests() {
        let provider = AnthropicProvider::new("test-key".to_string());

        // First 10 requests should succeed
        for _ in 0..10 {
            assert!(provider.check_rate_limit().is_ok());
        }
    }

    #[test]
    fn test_rate_limiting_blocks_excess_requests() {
        let provider = AnthropicProvider::new("test-key".to_string());

        // Fill up the rate limit
        for _ in 0..10 {
            provider.check_rate_limit().unwrap();
        }

        // 11th request should be rate limited
        let result = provider.check_rate_limit();
        assert!(result.is_err());
        assert!(matches!(result.unwrap_err(), AiError::RateLimitExceeded(_)));
    }

    #[test]
    fn test_request_body_shape() {
        let request = AnthropicRequest {
            model: DEFAULT_MODEL.to_string(),
            max_tokens: 200,
            temperature: 0.3,
            system: SYSTEM_PROMPT.to_string(),
            messages: vec![Message {
                role: "user".to_string(),
                content: "prompt".to_string(),
            }],
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["max_tokens"], 200);
        assert_eq!(json["messages"][0]["role"], "user");
        assert!(json["system"].as_str().unwrap().contains("commit message"));
    }
}
