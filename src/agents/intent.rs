//! Chat text to command grammar.
//!
//! Messages are parsed into a tagged [`Command`] by keyword matching, with
//! item and location names resolved against what the inventory store knows.
//! [`classify`] then maps the command to an [`Intent`] given session memory:
//! bare "yes"/"no" only count as approval answers while a suggestion bundle
//! is pending.

use crate::inventory::{Adjustment, InventoryStore};
use crate::memory::ConversationMemory;
use crate::types::Result;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;
use std::sync::LazyLock;
use utoipa::ToSchema;

const AFFIRMATIVES: &[&str] = &[
    "yes", "y", "yep", "yeah", "ok", "okay", "sure", "confirm", "go ahead", "proceed",
];
const NEGATIVES: &[&str] = &["no", "n", "nope", "decline", "deny", "cancel"];
const POLITE_SUFFIXES: &[&str] = &["please", "thanks", "thank you"];

const DECREASE_VERBS: &[&str] = &[
    "reduce", "decrease", "remove", "use", "used", "consume", "consumed", "take", "dispense",
    "dispensed",
];
const INCREASE_VERBS: &[&str] = &["add", "increase", "restock", "receive", "received"];
const SET_VERBS: &[&str] = &["set", "update"];
const QUERY_WORDS: &[&str] = &["stock", "level", "levels", "check", "show", "status", "inventory"];
const QUERY_PHRASES: &[&str] = &["how many", "how much", "what is", "what's"];

static NUMBER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b(\d+)\b").expect("valid regex"));
static SET_TARGET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bto\s+(\d+)\b").expect("valid regex"));
static BECAUSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bbecause\b\s*(.*)$").expect("valid regex"));
static PLACE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(at|in|from|to)\s+(?:the\s+)?([a-z][\w-]*)").expect("valid regex")
});

/// Words after "at"/"in"/"from" that never name a location.
const NOT_PLACES: &[&str] = &[
    "stock", "total", "once", "all", "least", "hand", "a", "an", "my", "our", "this", "that",
    "last", "next", "case", "storage",
];
/// Words between a quantity and its item that are not the item.
const ITEM_FILLERS: &[&str] = &[
    "unit", "units", "of", "more", "extra", "piece", "pieces", "pcs", "box", "boxes", "pack",
    "packs", "x", "the", "a", "an", "by", "now", "today",
];
const PREPOSITIONS: &[&str] = &["at", "in", "from", "to", "for", "because"];

/// What the user wants from one chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    Modify,
    Approve,
    Reject,
    Query,
    Unknown,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Modify => "modify",
            Intent::Approve => "approve",
            Intent::Reject => "reject",
            Intent::Query => "query",
            Intent::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which suggestion an approval points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalTarget {
    /// "yes" with no further detail
    Any,
    /// A transfer, optionally by its rank
    Transfer(Option<usize>),
    Reorder,
}

/// Kind of name a message mentioned but the store does not know.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameKind {
    Location,
    Item,
}

impl fmt::Display for NameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NameKind::Location => f.write_str("location"),
            NameKind::Item => f.write_str("item"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Modify {
        adjustment: Adjustment,
        item: Option<String>,
        location: Option<String>,
    },
    Approve {
        target: ApprovalTarget,
        /// Said "approve" rather than a bare affirmative
        explicit: bool,
    },
    Reject {
        reason: Option<String>,
        explicit: bool,
    },
    Query {
        item: Option<String>,
        location: Option<String>,
    },
    /// A stock change naming a location or item the store does not hold
    Unresolved { kind: NameKind, name: String },
    FreeText(String),
}

/// Location and item names known to the inventory store.
#[derive(Debug, Clone, Default)]
pub struct Vocabulary {
    locations: Vec<(String, Regex)>,
    items: Vec<(String, Regex)>,
}

impl Vocabulary {
    pub fn new(locations: Vec<String>, items: Vec<String>) -> Self {
        Self {
            locations: compile_names(locations),
            items: compile_names(items),
        }
    }

    pub async fn from_store(store: &dyn InventoryStore) -> Result<Self> {
        Ok(Self::new(store.locations().await?, store.items().await?))
    }

    pub fn find_location(&self, text: &str) -> Option<(String, Range<usize>)> {
        find_name(&self.locations, text)
    }

    pub fn find_item(&self, text: &str) -> Option<(String, Range<usize>)> {
        find_name(&self.items, text)
    }
}

/// Longest names first so "N95 Masks" wins over "Masks". A trailing "s" is
/// optional so "N95 mask" still resolves.
fn compile_names(mut names: Vec<String>) -> Vec<(String, Regex)> {
    names.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
    names.dedup();
    names
        .into_iter()
        .filter_map(|name| {
            let trimmed = name.trim();
            if trimmed.is_empty() {
                return None;
            }
            let body = match trimmed.strip_suffix('s').or_else(|| trimmed.strip_suffix('S')) {
                Some(stem) if !stem.is_empty() => format!("{}s?", regex::escape(stem)),
                _ => regex::escape(trimmed),
            };
            Regex::new(&format!(r"(?i)(?:^|[^\w-])({})(?:$|[^\w-])", body))
                .ok()
                .map(|re| (name, re))
        })
        .collect()
}

fn find_name(names: &[(String, Regex)], text: &str) -> Option<(String, Range<usize>)> {
    names.iter().find_map(|(name, re)| {
        re.captures(text)
            .and_then(|caps| caps.get(1))
            .map(|m| (name.clone(), m.range()))
    })
}

fn blank(text: &mut String, range: Range<usize>) {
    let spaces = " ".repeat(range.len());
    text.replace_range(range, &spaces);
}

fn tokens(text: &str) -> Vec<&str> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .filter(|t| !t.is_empty())
        .collect()
}

/// Lowercased, trimmed text without trailing punctuation or pleasantries.
fn normalize(text: &str) -> String {
    let mut text = text
        .trim()
        .trim_end_matches(|c: char| c.is_ascii_punctuation() || c.is_whitespace())
        .to_lowercase();
    for suffix in POLITE_SUFFIXES {
        if let Some(stripped) = text.strip_suffix(suffix) {
            let stripped = stripped.trim_end_matches(|c: char| c == ',' || c.is_whitespace());
            if !stripped.is_empty() {
                text = stripped.to_string();
            }
        }
    }
    text
}

fn is_phrase(text: &str, phrases: &[&str]) -> bool {
    let text = text.trim_start_matches(|c: char| c.is_ascii_punctuation() || c.is_whitespace());
    phrases.contains(&text)
}

fn first_number(text: &str) -> Option<u32> {
    NUMBER
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

fn reason(original: &str) -> Option<String> {
    BECAUSE
        .captures(original)
        .and_then(|caps| caps.get(1))
        .map(|m| {
            m.as_str()
                .trim()
                .trim_end_matches(|c: char| c == '.' || c == '!')
                .to_string()
        })
        .filter(|r| !r.is_empty())
}

fn approval_target(words: &[&str], stripped: &str) -> ApprovalTarget {
    if words.iter().any(|w| *w == "transfer" || *w == "transfers") {
        ApprovalTarget::Transfer(first_number(stripped).map(|n| n as usize))
    } else if words
        .iter()
        .any(|w| matches!(*w, "reorder" | "order" | "purchase"))
    {
        ApprovalTarget::Reorder
    } else {
        ApprovalTarget::Any
    }
}

/// A location-like word after "at ER-02" style phrases, read from text whose
/// known names are blanked. After "to" only codes with a digit or dash count.
fn unknown_location(stripped: &str) -> Option<String> {
    PLACE.captures_iter(stripped).find_map(|caps| {
        let preposition = caps.get(1)?.as_str().to_lowercase();
        let word = caps.get(2)?.as_str();
        let lower = word.to_lowercase();
        let code_like = word.chars().any(|c| c.is_ascii_digit() || c == '-');
        let accepted = if preposition == "to" {
            code_like
        } else {
            code_like || !NOT_PLACES.contains(&lower.as_str())
        };
        accepted.then(|| word.to_string())
    })
}

/// `word` as the user typed it, for replies.
fn original_spelling(text: &str, word: &str) -> String {
    let lowered = text.to_lowercase();
    match lowered.find(word) {
        Some(start) if lowered.len() == text.len() => text[start..start + word.len()].to_string(),
        _ => word.to_string(),
    }
}

/// Words between the quantity and the next preposition, e.g. "gowns" in
/// "reduce 5 gowns at ICU-01". Only meaningful once known names are blanked.
fn unknown_item(stripped: &str) -> Option<String> {
    let after = &stripped[NUMBER.find(stripped)?.end()..];
    let words: Vec<&str> = tokens(after)
        .into_iter()
        .take_while(|w| !PREPOSITIONS.contains(w))
        .filter(|w| !ITEM_FILLERS.contains(w))
        .collect();
    (!words.is_empty()).then(|| words.join(" "))
}

fn modify(
    adjustment: Adjustment,
    item: Option<String>,
    location: Option<String>,
    text: &str,
    stripped: &str,
) -> Command {
    if location.is_none() {
        if let Some(name) = unknown_location(stripped) {
            return Command::Unresolved {
                kind: NameKind::Location,
                name: original_spelling(text, &name),
            };
        }
    }
    if item.is_none() && matches!(adjustment, Adjustment::Delta(_)) {
        if let Some(name) = unknown_item(stripped) {
            return Command::Unresolved {
                kind: NameKind::Item,
                name,
            };
        }
    }
    Command::Modify {
        adjustment,
        item,
        location,
    }
}

/// Parse one chat message.
pub fn parse_command(text: &str, vocabulary: &Vocabulary) -> Command {
    let normalized = normalize(text);

    if is_phrase(&normalized, AFFIRMATIVES) {
        return Command::Approve {
            target: ApprovalTarget::Any,
            explicit: false,
        };
    }
    if is_phrase(&normalized, NEGATIVES) {
        return Command::Reject {
            reason: None,
            explicit: false,
        };
    }

    // Names are blanked out before numbers are read: "ICU-01" and "N95"
    // both contain digits.
    let mut stripped = normalized.clone();
    let location = vocabulary.find_location(&normalized).map(|(name, range)| {
        blank(&mut stripped, range);
        name
    });
    let item = vocabulary.find_item(&stripped.clone()).map(|(name, range)| {
        blank(&mut stripped, range);
        name
    });
    let words = tokens(&stripped);
    let has = |list: &[&str]| words.iter().any(|w| list.iter().any(|l| l == w));

    if has(&["approve", "approved", "accept"]) {
        return Command::Approve {
            target: approval_target(&words, &stripped),
            explicit: true,
        };
    }
    if has(&["reject", "rejected"]) {
        return Command::Reject {
            reason: reason(text),
            explicit: true,
        };
    }
    if let Some(first) = words.first() {
        // "yes, the transfer" / "no because over budget"
        if AFFIRMATIVES.contains(first) && words.len() > 1 {
            let target = approval_target(&words, &stripped);
            if target != ApprovalTarget::Any {
                return Command::Approve {
                    target,
                    explicit: false,
                };
            }
        }
        if NEGATIVES.contains(first) {
            if let Some(reason) = reason(text) {
                return Command::Reject {
                    reason: Some(reason),
                    explicit: false,
                };
            }
        }
    }

    // Questions are never stock changes: "how many did ICU-01 use?"
    if QUERY_PHRASES.iter().any(|p| normalized.contains(p)) || text.trim_end().ends_with('?') {
        return Command::Query { item, location };
    }

    if has(SET_VERBS) {
        let value = SET_TARGET
            .captures(&stripped)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse().ok());
        if let Some(value) = value {
            return modify(Adjustment::Set(value), item, location, text, &stripped);
        }
    }
    if has(DECREASE_VERBS) {
        if let Some(n) = first_number(&stripped) {
            let adjustment = Adjustment::Delta(-i64::from(n));
            return modify(adjustment, item, location, text, &stripped);
        }
    }
    if has(INCREASE_VERBS) {
        if let Some(n) = first_number(&stripped) {
            let adjustment = Adjustment::Delta(i64::from(n));
            return modify(adjustment, item, location, text, &stripped);
        }
    }

    if has(QUERY_WORDS) {
        return Command::Query { item, location };
    }

    Command::FreeText(text.trim().to_string())
}

/// Intent of a parsed command given what the session is waiting for.
pub fn classify(command: &Command, memory: &ConversationMemory) -> Intent {
    let awaiting = memory.pending_approvals.is_some();
    match command {
        Command::Modify { .. } | Command::Unresolved { .. } => Intent::Modify,
        Command::Approve { explicit, .. } if awaiting || *explicit => Intent::Approve,
        Command::Reject { explicit, .. } if awaiting || *explicit => Intent::Reject,
        Command::Approve { .. } | Command::Reject { .. } => Intent::Unknown,
        Command::Query { .. } => Intent::Query,
        Command::FreeText(_) => Intent::Unknown,
    }
}
