//! The chat approval workflow.
//!
//! modification → low-stock detection → suggestion bundle → yes/no → mutation

pub mod approval;
pub mod intent;
pub mod inventory;
pub mod suggestions;

// Re-export commonly used types
pub use approval::{ApprovalExecutor, ApprovalOutcome};
pub use intent::{classify, parse_command, ApprovalTarget, Command, Intent, Vocabulary};
pub use inventory::{AgentReply, InventoryAgent, DEFAULT_SYSTEM_PROMPT};
pub use suggestions::{
    LowStockContext, ReorderSuggestion, Suggestion, SuggestionBundle, SuggestionGenerator,
    SuggestionSettings, TransferSuggestion, Urgency,
};
