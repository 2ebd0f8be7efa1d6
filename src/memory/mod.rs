//! Per-session conversation memory.
//!
//! Each (user, session) pair owns one [`ConversationMemory`]: the ordered
//! chat history, at most one pending suggestion bundle, the orders filed from
//! rejected reorders, and the purchase orders synthesized from approvals.
//! Memory lives for the lifetime of the process.
//!
//! This module also carries the history-window helpers used when building
//! language model prompts.

mod store;

pub use store::{InMemorySessionStore, SessionGuard, SessionStore};

use crate::agents::suggestions::SuggestionBundle;
use crate::orders::{PendingOrder, PurchaseOrder};
use crate::types::{FocusContext, Message, MessageRole};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

/// Default number of recent messages to include in context.
pub const DEFAULT_HISTORY_WINDOW: usize = 10;

/// Prefix for audit lines appended to history.
pub const AUDIT_PREFIX: &str = "[audit]";

/// Identifies one conversation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
pub struct SessionKey {
    pub user_id: String,
    pub session_id: String,
}

impl SessionKey {
    pub fn new(user_id: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            session_id: session_id.into(),
        }
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.user_id, self.session_id)
    }
}

/// Where a session sits in the approval state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalState {
    Idle,
    AwaitingApproval,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ConversationMemory {
    pub key: SessionKey,
    pub history: Vec<Message>,
    /// The single active suggestion bundle, if any
    pub pending_approvals: Option<SuggestionBundle>,
    pub pending_orders: Vec<PendingOrder>,
    pub purchase_orders: Vec<PurchaseOrder>,
    pub focus: FocusContext,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ConversationMemory {
    pub fn new(key: SessionKey) -> Self {
        let now = Utc::now();
        Self {
            key,
            history: Vec::new(),
            pending_approvals: None,
            pending_orders: Vec::new(),
            purchase_orders: Vec::new(),
            focus: FocusContext::default(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn approval_state(&self) -> ApprovalState {
        if self.pending_approvals.is_some() {
            ApprovalState::AwaitingApproval
        } else {
            ApprovalState::Idle
        }
    }

    pub fn push(&mut self, role: MessageRole, content: impl Into<String>) {
        self.history.push(Message::new(role, content));
        self.updated_at = Utc::now();
    }

    /// Record a state mutation in the conversation history.
    pub fn audit(&mut self, line: impl AsRef<str>) {
        self.push(
            MessageRole::System,
            format!("{} {}", AUDIT_PREFIX, line.as_ref()),
        );
    }

    /// Replace the active bundle.
    pub fn set_bundle(&mut self, bundle: SuggestionBundle) {
        self.pending_approvals = Some(bundle);
        self.updated_at = Utc::now();
    }

    pub fn clear_bundle(&mut self) -> Option<SuggestionBundle> {
        self.updated_at = Utc::now();
        self.pending_approvals.take()
    }

    /// Orders still waiting for a manager.
    pub fn open_orders(&self) -> Vec<PendingOrder> {
        self.pending_orders
            .iter()
            .filter(|o| o.is_pending())
            .cloned()
            .collect()
    }

    /// Chat turns only, audit lines excluded.
    pub fn turns(&self) -> usize {
        self.history
            .iter()
            .filter(|m| m.role != MessageRole::System)
            .count()
    }
}

/// Truncates conversation history to a window of recent messages.
pub fn truncate_history(history: &[Message], window_size: usize) -> Vec<Message> {
    if history.len() <= window_size {
        history.to_vec()
    } else {
        history[history.len() - window_size..].to_vec()
    }
}

/// Builds `(role, content)` pairs for an LLM call: system prompt, the recent
/// history window, then the new user input. Audit lines are passed as system
/// messages so the model sees what already happened.
pub fn build_prompt_messages(
    system_prompt: &str,
    history: &[Message],
    window: usize,
    input: &str,
) -> Vec<(String, String)> {
    let mut messages = vec![("system".to_string(), system_prompt.to_string())];
    for msg in truncate_history(history, window) {
        messages.push((msg.role.as_str().to_string(), msg.content));
    }
    messages.push(("user".to_string(), input.to_string()));
    messages
}

#[cfg(test)]
mod tests {
    use super::*;

    fn history(n: usize) -> Vec<Message> {
        (0..n)
            .map(|i| Message::new(MessageRole::User, format!("Message {}", i)))
            .collect()
    }

    #[test]
    fn test_truncate_history() {
        let truncated = truncate_history(&history(10), 3);
        assert_eq!(truncated.len(), 3);
        assert!(truncated[0].content.contains('7'));
        assert!(truncated[2].content.contains('9'));
    }

    #[test]
    fn test_build_prompt_messages_order() {
        let messages = build_prompt_messages("sys", &history(4), 2, "hello");
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0], ("system".to_string(), "sys".to_string()));
        assert_eq!(messages[1].1, "Message 2");
        assert_eq!(messages[3], ("user".to_string(), "hello".to_string()));
    }

    #[test]
    fn test_audit_lines_do_not_count_as_turns() {
        let mut memory = ConversationMemory::new(SessionKey::new("u", "s"));
        memory.push(MessageRole::User, "hi");
        memory.audit("Transferred 15 N95 Masks");
        memory.push(MessageRole::Assistant, "done");
        assert_eq!(memory.history.len(), 3);
        assert_eq!(memory.turns(), 2);
        assert!(memory.history[1].content.starts_with(AUDIT_PREFIX));
        assert_eq!(memory.approval_state(), ApprovalState::Idle);
    }
}
