//! Timeout and fallback policy around an [`LLMClient`].
//!
//! Free-text questions must always get an answer. The provider is tried once
//! per configured attempt timeout; if every attempt fails or times out the
//! canned offline reply is returned and the answer is marked degraded.

use super::client::LLMClient;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Per-attempt limits: first try, then one retry.
pub const DEFAULT_ATTEMPT_TIMEOUTS: [Duration; 2] =
    [Duration::from_secs(10), Duration::from_secs(8)];

pub const DEFAULT_OFFLINE_RESPONSE: &str = "The assistant's language model is unavailable right now. \
You can still manage stock directly, for example \"reduce 5 units of N95 Masks at ICU-01\", \
ask \"how many N95 Masks at ER-01\", or answer pending suggestions with yes or no.";

/// An answer and how it was produced.
#[derive(Debug, Clone, PartialEq)]
pub struct FallbackReply {
    pub text: String,
    /// True when the offline reply was used
    pub degraded: bool,
    /// Provider calls made
    pub attempts: usize,
}

pub struct FallbackLLM {
    client: Box<dyn LLMClient>,
    attempt_timeouts: Vec<Duration>,
    offline_response: String,
}

impl FallbackLLM {
    pub fn new(client: Box<dyn LLMClient>) -> Self {
        Self {
            client,
            attempt_timeouts: DEFAULT_ATTEMPT_TIMEOUTS.to_vec(),
            offline_response: DEFAULT_OFFLINE_RESPONSE.to_string(),
        }
    }

    pub fn with_attempt_timeouts(mut self, attempt_timeouts: Vec<Duration>) -> Self {
        self.attempt_timeouts = attempt_timeouts;
        self
    }

    pub fn with_offline_response(mut self, offline_response: impl Into<String>) -> Self {
        self.offline_response = offline_response.into();
        self
    }

    pub fn model_name(&self) -> &str {
        self.client.model_name()
    }

    pub fn offline_response(&self) -> &str {
        &self.offline_response
    }

    /// Ask the model, never failing.
    pub async fn respond(&self, messages: &[(String, String)]) -> FallbackReply {
        let mut attempts = 0;

        for (i, limit) in self.attempt_timeouts.iter().enumerate() {
            attempts += 1;
            match timeout(*limit, self.client.generate_with_history(messages)).await {
                Ok(Ok(text)) if !text.trim().is_empty() => {
                    debug!(
                        "LLM {} answered on attempt {}",
                        self.client.model_name(),
                        i + 1
                    );
                    return FallbackReply {
                        text,
                        degraded: false,
                        attempts,
                    };
                }
                Ok(Ok(_)) => warn!("LLM attempt {} returned an empty answer", i + 1),
                Ok(Err(e)) => warn!("LLM attempt {} failed: {}", i + 1, e),
                Err(_) => warn!("LLM attempt {} timed out after {:?}", i + 1, limit),
            }
        }

        warn!(
            "LLM {} unavailable after {} attempt(s), using offline reply",
            self.client.model_name(),
            attempts
        );
        FallbackReply {
            text: self.offline_response.clone(),
            degraded: true,
            attempts,
        }
    }
}
