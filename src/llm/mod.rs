//! LLM Provider Clients
//!
//! Free-text chat messages that the command grammar does not recognise are
//! answered by a language model. Providers implement [`LLMClient`]; the
//! [`FallbackLLM`] wrapper adds per-attempt timeouts and a canned offline
//! answer so a chat turn never fails because the model is down.
//!
//! Enable providers via Cargo features:
//! - `openai` - OpenAI API and compatible chat-completions servers
//! - `ollama` - Local Ollama server

/// Core LLM client trait and provider selection.
pub mod client;
/// Timeout / offline fallback policy.
pub mod fallback;

#[cfg(feature = "ollama")]
pub mod ollama;

#[cfg(feature = "openai")]
pub mod openai;

pub use client::{LLMClient, OfflineClient, Provider};
pub use fallback::{FallbackLLM, FallbackReply, DEFAULT_ATTEMPT_TIMEOUTS, DEFAULT_OFFLINE_RESPONSE};
