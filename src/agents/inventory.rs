//! The inventory assistant: one chat turn end to end.
//!
//! Commands that change or read stock are handled against the inventory
//! store, approval answers go to the [`ApprovalExecutor`], and everything else
//! is passed to the language model with the recent conversation.

use super::approval::{ApprovalExecutor, ApprovalOutcome};
use super::intent::{classify, parse_command, Command, Intent, NameKind, Vocabulary};
use super::suggestions::SuggestionGenerator;
use crate::events::{DashboardEvent, EventHub};
use crate::inventory::{Adjustment, InventoryFilter, InventoryStore};
use crate::llm::FallbackLLM;
use crate::memory::{build_prompt_messages, ConversationMemory, DEFAULT_HISTORY_WINDOW};
use crate::orders::PurchaseOrder;
use crate::types::{AppError, FocusContext, MessageRole, Result};
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::{debug, info};

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are the supply assistant of a hospital operations dashboard. \
You help nurses and ward managers keep medical supplies stocked across locations. \
Answer briefly and practically. Stock changes and approvals are handled by the dashboard itself; \
if the user wants to change stock, tell them the command form, for example \
\"reduce 5 units of N95 Masks at ICU-01\".";

/// What one chat turn produced.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentReply {
    pub text: String,
    pub intent: Intent,
    pub degraded: bool,
    /// Set when this turn approved a reorder
    pub purchase_order: Option<PurchaseOrder>,
}

impl AgentReply {
    fn handled(text: impl Into<String>, intent: Intent) -> Self {
        Self {
            text: text.into(),
            intent,
            degraded: false,
            purchase_order: None,
        }
    }
}

pub struct InventoryAgent {
    inventory: Arc<dyn InventoryStore>,
    suggestions: SuggestionGenerator,
    approvals: ApprovalExecutor,
    llm: Arc<FallbackLLM>,
    events: EventHub,
    history_window: usize,
    system_prompt: String,
}

impl InventoryAgent {
    pub fn new(
        inventory: Arc<dyn InventoryStore>,
        suggestions: SuggestionGenerator,
        llm: Arc<FallbackLLM>,
        events: EventHub,
    ) -> Self {
        Self {
            approvals: ApprovalExecutor::new(Arc::clone(&inventory)),
            inventory,
            suggestions,
            llm,
            events,
            history_window: DEFAULT_HISTORY_WINDOW,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }

    pub fn with_history_window(mut self, history_window: usize) -> Self {
        self.history_window = history_window;
        self
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = system_prompt.into();
        self
    }

    /// Run one turn against a session's memory.
    ///
    /// The caller holds the session lock for the duration, so nothing else
    /// can touch the pending bundle in between.
    pub async fn handle(
        &self,
        memory: &mut ConversationMemory,
        message: &str,
        context: Option<&FocusContext>,
    ) -> Result<AgentReply> {
        if let Some(context) = context {
            memory.focus.merge(context);
        }

        let vocabulary = Vocabulary::from_store(self.inventory.as_ref()).await?;
        let command = parse_command(message, &vocabulary);
        let intent = classify(&command, memory);
        debug!("Session {} intent {} ({:?})", memory.key, intent, command);

        memory.push(MessageRole::User, message);

        let reply = match (intent, command) {
            (
                Intent::Modify,
                Command::Modify {
                    adjustment,
                    item,
                    location,
                },
            ) => self.modify(memory, adjustment, item, location).await?,
            (Intent::Modify, Command::Unresolved { kind, name }) => {
                self.unresolved(kind, &name).await?
            }
            (Intent::Approve, Command::Approve { target, .. }) => {
                let outcome = self.approvals.approve(memory, target).await?;
                self.publish_outcome(&outcome);
                let purchase_order = match &outcome {
                    ApprovalOutcome::Ordered(order) => Some(order.clone()),
                    _ => None,
                };
                AgentReply {
                    purchase_order,
                    ..AgentReply::handled(outcome.message(), Intent::Approve)
                }
            }
            (Intent::Reject, Command::Reject { reason, .. }) => {
                let outcome = self.approvals.reject(memory, reason.as_deref());
                self.publish_outcome(&outcome);
                AgentReply::handled(outcome.message(), Intent::Reject)
            }
            (Intent::Query, Command::Query { item, location }) => {
                self.query(memory, item, location).await?
            }
            (_, _) => self.converse(memory, message).await?,
        };

        memory.push(MessageRole::Assistant, reply.text.clone());
        Ok(reply)
    }

    async fn modify(
        &self,
        memory: &mut ConversationMemory,
        adjustment: Adjustment,
        item: Option<String>,
        location: Option<String>,
    ) -> Result<AgentReply> {
        let item = item.or_else(|| memory.focus.item.clone());
        let location = location.or_else(|| memory.focus.location.clone());
        let (item, location) = match (item, location) {
            (Some(item), Some(location)) => (item, location),
            (item, location) => {
                let missing = match (item, location) {
                    (None, None) => "which item and at which location",
                    (None, Some(_)) => "which item",
                    _ => "at which location",
                };
                return Ok(AgentReply::handled(
                    format!("I can update the stock, but I need to know {}.", missing),
                    Intent::Modify,
                ));
            }
        };

        let change = match self.inventory.adjust(&location, &item, adjustment).await {
            Ok(change) => change,
            Err(
                e @ (AppError::NotFound(_)
                | AppError::InsufficientStock(_)
                | AppError::InvalidInput(_)),
            ) => {
                return Ok(AgentReply::handled(
                    format!("❌ Stock was not changed. {}", e),
                    Intent::Modify,
                ));
            }
            Err(e) => return Err(e),
        };

        let record = &change.record;
        memory.focus = FocusContext {
            location: Some(record.location.clone()),
            item: Some(record.item.clone()),
        };
        memory.audit(format!(
            "Stock of {} at {} changed {} -> {}",
            record.item, record.location, change.before, change.after
        ));
        self.events
            .publish(DashboardEvent::stock_changed(record, change.before));

        let mut text = format!(
            "Updated {} at {}: {} → {} {}.",
            record.item, record.location, change.before, change.after, record.unit
        );

        if let Some(bundle) = self.suggestions.generate(&change).await? {
            self.events.publish(DashboardEvent::low_stock(&bundle));
            text.push('\n');
            text.push_str(&bundle.summary());
            if memory.pending_approvals.is_some() {
                debug!("Session {} replaces its pending bundle", memory.key);
            }
            memory.set_bundle(bundle);
        } else if memory.pending_approvals.as_ref().is_some_and(|bundle| {
            bundle.context.location.eq_ignore_ascii_case(&record.location)
                && bundle.context.item.eq_ignore_ascii_case(&record.item)
        }) {
            memory.clear_bundle();
            memory.audit(format!(
                "Suggestions for {} at {} withdrawn, stock back above minimum",
                record.item, record.location
            ));
            let _ = write!(
                text,
                "\n{} at {} is back above its minimum, so the pending suggestions were withdrawn.",
                record.item, record.location
            );
        }

        info!(
            "Session {} modified {} at {} ({} -> {})",
            memory.key, record.item, record.location, change.before, change.after
        );
        Ok(AgentReply::handled(text, Intent::Modify))
    }

    /// A stock change naming something the store does not hold. Nothing is
    /// changed and the focus is left alone.
    async fn unresolved(&self, kind: NameKind, name: &str) -> Result<AgentReply> {
        let known = match kind {
            NameKind::Location => self.inventory.locations().await?,
            NameKind::Item => self.inventory.items().await?,
        };
        Ok(AgentReply::handled(
            format!(
                "I don't know {} {}. Stock was not changed. Known {}s: {}.",
                kind,
                name,
                kind,
                known.join(", ")
            ),
            Intent::Modify,
        ))
    }

    async fn query(
        &self,
        memory: &mut ConversationMemory,
        item: Option<String>,
        location: Option<String>,
    ) -> Result<AgentReply> {
        let filter = InventoryFilter {
            location: location.clone(),
            item: item.clone(),
        };
        memory.focus.merge(&FocusContext { location, item });

        let records = self.inventory.list(&filter).await?;
        if records.is_empty() {
            return Ok(AgentReply::handled(
                "No stock records match that.",
                Intent::Query,
            ));
        }

        let mut text = String::from("Current stock:\n");
        for r in &records {
            let _ = writeln!(
                text,
                "- {} at {}: {} {} (minimum {}){}",
                r.item,
                r.location,
                r.quantity,
                r.unit,
                r.min_threshold,
                if r.is_low() { " ⚠ LOW" } else { "" }
            );
        }
        Ok(AgentReply::handled(text.trim_end(), Intent::Query))
    }

    async fn converse(&self, memory: &ConversationMemory, message: &str) -> Result<AgentReply> {
        // History already ends with this message
        let prior = &memory.history[..memory.history.len().saturating_sub(1)];
        let system = self.system_prompt_for(memory).await?;
        let messages = build_prompt_messages(&system, prior, self.history_window, message);

        let reply = self.llm.respond(&messages).await;
        Ok(AgentReply {
            text: reply.text,
            intent: Intent::Unknown,
            degraded: reply.degraded,
            purchase_order: None,
        })
    }

    /// Base prompt plus what the model should know about current stock.
    async fn system_prompt_for(&self, memory: &ConversationMemory) -> Result<String> {
        let mut prompt = self.system_prompt.clone();

        let low: Vec<_> = self
            .inventory
            .list(&InventoryFilter::default())
            .await?
            .into_iter()
            .filter(|r| r.is_low())
            .collect();
        if !low.is_empty() {
            prompt.push_str("\n\nLocations currently below minimum stock:");
            for r in &low {
                let _ = write!(
                    prompt,
                    "\n- {} at {}: {} of {} {}",
                    r.item, r.location, r.quantity, r.min_threshold, r.unit
                );
            }
        }
        if let Some(bundle) = &memory.pending_approvals {
            let _ = write!(
                prompt,
                "\n\nThe user has suggestions awaiting a yes/no answer:\n{}",
                bundle.options_text()
            );
        }
        Ok(prompt)
    }

    fn publish_outcome(&self, outcome: &ApprovalOutcome) {
        match outcome {
            ApprovalOutcome::Transferred(receipt) => {
                self.events.publish(DashboardEvent::transferred(receipt));
            }
            ApprovalOutcome::Ordered(order) => {
                self.events.publish(DashboardEvent::purchase_ordered(order));
            }
            ApprovalOutcome::Rejected(order) => {
                self.events.publish(DashboardEvent::order_changed(order));
            }
            _ => {}
        }
    }
}
