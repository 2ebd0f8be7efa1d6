use crate::llm::client::{LLMClient, HTTP_TIMEOUT};
use crate::types::{AppError, Result};
use async_trait::async_trait;
use serde_json::{json, Value};

/// Client for a local Ollama server.
pub struct OllamaClient {
    http_client: reqwest::Client,
    base_url: String,
    model: String,
}

impl OllamaClient {
    pub fn new(base_url: String, model: String) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
        }
    }

    /// Pull the assistant message out of an `/api/chat` response.
    fn parse_response(json: &Value) -> Result<String> {
        let message = json
            .get("message")
            .ok_or_else(|| AppError::LLM("No message in Ollama response".into()))?;

        Ok(message
            .get("content")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string())
    }
}

#[async_trait]
impl LLMClient for OllamaClient {
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
            "stream": false,
        });

        let response = self
            .http_client
            .post(format!("{}/api/chat", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::LLM(format!("Ollama request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(AppError::LLM(format!(
                "Ollama request failed ({}): {}",
                status, text
            )));
        }

        let json: Value = response
            .json()
            .await
            .map_err(|e| AppError::LLM(format!("Failed to parse Ollama response: {}", e)))?;

        Self::parse_response(&json)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
