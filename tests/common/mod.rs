//! Shared helpers for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use careflow::{
    llm::LLMClient,
    types::{AppError, Result},
    utils::toml_config::{CareflowConfig, ProviderConfig, SeedRecord},
    AppState, ConfigManager,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Mock LLM client with a fixed reply, or one that always fails.
#[derive(Clone)]
pub struct MockLLMClient {
    response: String,
    should_fail: bool,
    calls: Arc<AtomicUsize>,
}

impl MockLLMClient {
    pub fn new(response: &str) -> Self {
        Self {
            response: response.to_string(),
            should_fail: false,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing() -> Self {
        Self {
            response: String::new(),
            should_fail: true,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LLMClient for MockLLMClient {
    async fn generate_with_history(&self, _messages: &[(String, String)]) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.should_fail {
            return Err(AppError::LLM("Mock LLM failure".to_string()));
        }
        Ok(self.response.clone())
    }

    fn model_name(&self) -> &str {
        "mock"
    }
}

fn seed(location: &str, item: &str, quantity: u32, min_threshold: u32) -> SeedRecord {
    SeedRecord {
        location: location.to_string(),
        item: item.to_string(),
        quantity,
        min_threshold,
        unit: None,
    }
}

/// ICU-01 holds 71 N95 Masks against a minimum of 73. Reducing it by 5
/// leaves 66, a reorder of 80 (target 146) and transfer options from ER-01
/// (surplus 15) then WARD-02 (surplus 10).
pub fn test_config() -> CareflowConfig {
    let mut config = CareflowConfig::default();
    config.inventory.seed = vec![
        seed("ICU-01", "N95 Masks", 71, 73),
        seed("ER-01", "N95 Masks", 30, 15),
        seed("WARD-02", "N95 Masks", 40, 30),
        seed("ICU-01", "Saline Bags", 50, 20),
        seed("ER-01", "Saline Bags", 12, 10),
    ];
    config.llm.provider = ProviderConfig::Offline;
    config.llm.attempt_timeouts_ms = vec![200];
    config
}

pub fn test_state() -> AppState {
    AppState::from_config(ConfigManager::from_config(test_config()))
        .expect("offline state builds")
}

pub fn test_state_with_llm(client: MockLLMClient) -> AppState {
    test_state().with_llm(Box::new(client))
}
