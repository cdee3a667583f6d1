use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Serialize;
use tracing::debug;

use crate::config::LlmConfig;
use crate::error::ServiceError;

/// A text-in, text-out completion service.
#[async_trait]
pub trait Completion: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, ServiceError>;
}

#[derive(Debug, Clone, Serialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

/// Client for an OpenAI-compatible chat completions endpoint.
pub struct LlmClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
    temperature: f32,
}

impl LlmClient {
    pub fn new(config: &LlmConfig, client: reqwest::Client) -> Self {
        Self {
            client,
            base_url: config.base_url.clone(),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
            temperature: config.temperature,
        }
    }

    /// Resolve the chat completions endpoint from the base URL.
    fn endpoint(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        if base.ends_with("/chat/completions") {
            base.to_string()
        } else if base.ends_with("/v1") {
            format!("{}/chat/completions", base)
        } else {
            format!("{}/v1/chat/completions", base)
        }
    }

    /// Non-streaming chat completion.
    pub async fn chat(&self, messages: &[Message]) -> Result<String, ServiceError> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": messages,
            "temperature": self.temperature,
        });

        let resp = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        match resp.status() {
            StatusCode::UNAUTHORIZED => return Err(ServiceError::Unauthorized),
            StatusCode::TOO_MANY_REQUESTS => return Err(ServiceError::RateLimited),
            status if !status.is_success() => {
                let body = resp.text().await.unwrap_or_default();
                return Err(ServiceError::Http {
                    status: status.as_u16(),
                    body,
                });
            }
            _ => {}
        }

        let text = resp.text().await?;
        let content = extract_content(&text)?;
        debug!(model = %self.model, response_len = content.len(), "LLM completion");
        Ok(content)
    }
}

#[async_trait]
impl Completion for LlmClient {
    async fn complete(&self, prompt: &str) -> Result<String, ServiceError> {
        let messages = vec![Message {
            role: "user".to_string(),
            content: prompt.to_string(),
        }];
        self.chat(&messages).await
    }
}

/// Pull `choices[0].message.content` out of a completion body; null content reads as empty.
fn extract_content(body: &str) -> Result<String, ServiceError> {
    let json: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| ServiceError::InvalidResponse(format!("LLM JSON: {}", e)))?;

    let choice = json["choices"]
        .get(0)
        .ok_or_else(|| ServiceError::InvalidResponse("no choices in LLM response".to_string()))?;

    Ok(choice["message"]["content"].as_str().unwrap_or("").to_string())
}
