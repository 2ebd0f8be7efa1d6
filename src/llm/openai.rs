use crate::llm::client::{LLMClient, HTTP_TIMEOUT};
use crate::types::{AppError, Result};
use async_trait::async_trait;
use serde_json::{json, Value};

/// Client for OpenAI-compatible `chat/completions` endpoints.
pub struct OpenAIClient {
    http_client: reqwest::Client,
    api_key: String,
    api_base: String,
    model: String,
}

impl OpenAIClient {
    pub fn new(api_key: String, api_base: String, model: String) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            http_client,
            api_key,
            api_base: api_base.trim_end_matches('/').to_string(),
            model,
        }
    }

    fn parse_response(json: &Value) -> Result<String> {
        json.get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .map(str::to_string)
            .ok_or_else(|| AppError::LLM("No response from OpenAI".to_string()))
    }
}

#[async_trait]
impl LLMClient for OpenAIClient {
    async fn generate_with_history(&self, messages: &[(String, String)]) -> Result<String> {
        let messages: Vec<Value> = messages
            .iter()
            .map(|(role, content)| {
                let role = match role.as_str() {
                    "system" | "assistant" => role.as_str(),
                    _ => "user",
                };
                json!({ "role": role, "content": content })
            })
            .collect();

        let body = json!({
            "model": self.model,
            "messages": messages,
        });

        let response = self
            .http_client
            .post(format!("{}/chat/completions", self.api_base))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::LLM(format!("OpenAI request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(AppError::LLM(format!(
                "OpenAI API error ({}): {}",
                status, text
            )));
        }

        let json: Value = response
            .json()
            .await
            .map_err(|e| AppError::LLM(format!("Failed to parse OpenAI response: {}", e)))?;

        Self::parse_response(&json)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
