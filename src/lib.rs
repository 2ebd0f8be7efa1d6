//! # Careflow - chat-driven supply approvals
//!
//! The supply workflow of a hospital operations dashboard as a standalone
//! service: inventory modification → low-stock detection → auto-suggestion →
//! yes/no approval → state mutation, all driven from a chat endpoint.
//!
//! ## Overview
//!
//! Careflow can be used in two ways:
//!
//! 1. **As a standalone server** - Run the `careflow-server` binary
//! 2. **As a library** - Embed the workflow in your own axum application
//!
//! ### Basic Example
//!
//! ```rust,ignore
//! use careflow::{AppState, CareflowConfig, ConfigManager, SessionKey};
//!
//! let state = AppState::from_config(ConfigManager::from_config(CareflowConfig::default()))?;
//! let key = SessionKey::new("nurse-1", "shift-a");
//!
//! let mut memory = state.sessions.checkout(&key).await;
//! let reply = state
//!     .agent()
//!     .handle(&mut memory, "reduce 5 units of N95 Masks at ICU-01", None)
//!     .await?;
//! println!("{}", reply.text);
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `ollama` | Ollama local inference (default) |
//! | `openai` | OpenAI-compatible APIs (default) |
//! | `swagger-ui` | Interactive API docs at `/swagger-ui` |
//!
//! ## Modules
//!
//! - [`agents`] - Intent grammar, suggestions, approvals and the chat agent
//! - [`api`] - REST and WebSocket handlers and routes
//! - [`events`] - Dashboard event broadcast
//! - [`inventory`] - Stock store
//! - [`llm`] - Language model clients and fallback policy
//! - [`memory`] - Per-session conversation memory
//! - [`orders`] - Pending and purchase orders, retention
//! - [`types`] - Common types and error handling

#![cfg_attr(docsrs, feature(doc_cfg))]

/// Chat workflow: intents, suggestions, approvals.
pub mod agents;
/// HTTP API handlers and routes.
pub mod api;
/// Command line interface.
pub mod cli;
/// Dashboard event hub.
pub mod events;
/// Stock levels per location.
pub mod inventory;
/// LLM provider clients and abstractions.
pub mod llm;
/// Conversation memory and session store.
pub mod memory;
/// Order records and retention.
pub mod orders;
/// Core types (requests, responses, errors).
pub mod types;
/// Configuration and logging utilities.
pub mod utils;

// Re-export commonly used types
pub use agents::{InventoryAgent, SuggestionGenerator};
pub use events::{DashboardEvent, EventHub};
pub use inventory::{InMemoryInventory, InventoryStore};
pub use llm::{FallbackLLM, LLMClient, Provider};
pub use memory::{InMemorySessionStore, SessionKey, SessionStore};
pub use types::{AppError, Result};
pub use utils::toml_config::{CareflowConfig, ConfigManager};

use std::sync::Arc;
use tracing::warn;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// TOML configuration with hot-reload support
    pub config_manager: Arc<ConfigManager>,
    pub inventory: Arc<dyn InventoryStore>,
    pub sessions: Arc<dyn SessionStore>,
    /// Language model wrapped in the timeout / offline policy
    pub llm: Arc<FallbackLLM>,
    pub events: EventHub,
}

impl AppState {
    /// Build state from configuration: seeded in-memory inventory, empty
    /// session store, and the configured language model.
    ///
    /// A provider that cannot be set up (for example a missing API key) is
    /// replaced by the offline client so the server still starts.
    pub fn from_config(config_manager: ConfigManager) -> Result<Self> {
        let config = config_manager.config();

        let provider = match Provider::from_config(&config.llm.provider) {
            Ok(provider) => provider,
            Err(e) => {
                warn!("{}; free-text chat will use the offline reply", e);
                Provider::Offline
            }
        };
        let client = provider.create_client()?;

        Ok(Self {
            inventory: Arc::new(InMemoryInventory::with_records(
                config.inventory.records(),
            )),
            sessions: Arc::new(InMemorySessionStore::new()),
            llm: Arc::new(Self::fallback(&config, client)),
            events: EventHub::new(config.server.event_buffer),
            config_manager: Arc::new(config_manager),
        })
    }

    /// Swap the language model client, keeping the configured fallback policy.
    pub fn with_llm(mut self, client: Box<dyn LLMClient>) -> Self {
        self.llm = Arc::new(Self::fallback(&self.config_manager.config(), client));
        self
    }

    fn fallback(config: &CareflowConfig, client: Box<dyn LLMClient>) -> FallbackLLM {
        FallbackLLM::new(client)
            .with_attempt_timeouts(config.llm.attempt_timeouts())
            .with_offline_response(config.llm.offline_response.clone())
    }

    /// An agent configured from the current (possibly reloaded) settings.
    pub fn agent(&self) -> InventoryAgent {
        let config = self.config_manager.config();
        let agent = InventoryAgent::new(
            Arc::clone(&self.inventory),
            SuggestionGenerator::new(
                Arc::clone(&self.inventory),
                config.inventory.suggestion_settings(),
            ),
            Arc::clone(&self.llm),
            self.events.clone(),
        )
        .with_history_window(config.sessions.history_window);

        match &config.llm.system_prompt {
            Some(prompt) => agent.with_system_prompt(prompt.clone()),
            None => agent,
        }
    }
}
