//! Conversation memory.
//!
//! One [`ConversationContext`] per conversation id, each behind its own
//! async mutex so a turn can hold it across awaits while other
//! conversations proceed.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use hearth_core::types::{Listing, ListingFilter, PriceTier, StayDates};

use crate::error::ChatError;
use crate::types::{ChatMessage, ChatRole};

const BUDGET_KEYWORDS: &[&str] = &[
    "cheap", "budget", "affordable", "inexpensive", "economical", "low cost",
];
const LUXURY_KEYWORDS: &[&str] = &[
    "luxury", "luxurious", "high-end", "upscale", "premium", "lavish",
];
const CATEGORY_KEYWORDS: &[(&str, &[&str])] = &[
    ("Beach", &["beach", "seaside", "ocean", "sea view"]),
    ("Mountain", &["mountain", "alpine", "hills"]),
    ("Countryside", &["countryside", "rural", "village", "farm"]),
    ("City", &["city", "downtown", "urban"]),
];

/// Preferences inferred from what the user has said so far.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPreferences {
    pub price_tier: PriceTier,
    pub preferred_categories: Vec<String>,
}

/// Mutable state for one conversation.
#[derive(Debug, Clone)]
pub struct ConversationContext {
    pub conversation_id: String,
    pub messages: Vec<ChatMessage>,
    pub current_filters: ListingFilter,
    pub current_dates: StayDates,
    pub last_search_results: Vec<Listing>,
    pub preferences: UserPreferences,
    pub created_at: DateTime<Utc>,
    max_messages: usize,
}

impl ConversationContext {
    pub fn new(conversation_id: impl Into<String>, max_messages: usize) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            messages: Vec::new(),
            current_filters: ListingFilter::default(),
            current_dates: StayDates::default(),
            last_search_results: Vec::new(),
            preferences: UserPreferences::default(),
            created_at: Utc::now(),
            max_messages: max_messages.max(1),
        }
    }

    pub fn add_message(&mut self, role: ChatRole, content: impl Into<String>) {
        self.add_message_at(role, content, Utc::now());
    }

    /// Append a message with an explicit timestamp, dropping the oldest
    /// entries beyond the cap.
    pub fn add_message_at(
        &mut self,
        role: ChatRole,
        content: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) {
        self.messages.push(ChatMessage {
            role,
            content: content.into(),
            timestamp,
        });
        if self.messages.len() > self.max_messages {
            let excess = self.messages.len() - self.max_messages;
            self.messages.drain(..excess);
        }
    }

    /// Overlay newly stated filters; fields not mentioned keep their value.
    pub fn merge_filters(&mut self, filters: &ListingFilter) {
        self.current_filters.merge(filters);
    }

    pub fn merge_dates(&mut self, dates: StayDates) {
        self.current_dates = dates.or(self.current_dates);
    }

    pub fn set_last_results(&mut self, listings: Vec<Listing>) {
        self.last_search_results = listings;
    }

    pub fn last_activity(&self) -> Option<DateTime<Utc>> {
        self.messages.last().map(|m| m.timestamp)
    }

    /// Re-derive price tier and accumulate preferred categories from all
    /// user messages.
    pub fn analyze_preferences(&mut self) {
        let user_messages: Vec<String> = self
            .messages
            .iter()
            .filter(|m| m.role == ChatRole::User)
            .map(|m| m.content.to_lowercase())
            .collect();
        if user_messages.is_empty() {
            return;
        }

        let count = |keywords: &[&str]| {
            user_messages
                .iter()
                .filter(|msg| keywords.iter().any(|kw| msg.contains(kw)))
                .count()
        };
        let budget = count(BUDGET_KEYWORDS);
        let luxury = count(LUXURY_KEYWORDS);
        if budget > luxury {
            self.preferences.price_tier = PriceTier::Budget;
        } else if luxury > budget {
            self.preferences.price_tier = PriceTier::Luxury;
        }

        for (category, keywords) in CATEGORY_KEYWORDS {
            let mentioned = user_messages
                .iter()
                .any(|msg| keywords.iter().any(|kw| msg.contains(kw)));
            if mentioned && !self.preferences.preferred_categories.iter().any(|c| c == category) {
                self.preferences.preferred_categories.push((*category).to_string());
            }
        }
    }

    /// Plain-text summary of filters, preferences and the last result set.
    pub fn summary(&self) -> String {
        let mut lines = Vec::new();
        let f = &self.current_filters;

        if !f.is_empty() || !self.current_dates.is_empty() {
            lines.push("Current search filters:".to_string());
            if let Some(category) = &f.category {
                lines.push(format!("- Category: {}", category));
            }
            if let Some(location) = &f.location {
                lines.push(format!("- Location: {}", location));
            }
            match (f.min_price, f.max_price) {
                (Some(min), Some(max)) => lines.push(format!("- Price: ${}-{}", min, max)),
                (None, Some(max)) => lines.push(format!("- Price: up to ${}", max)),
                (Some(min), None) => lines.push(format!("- Price: from ${}", min)),
                (None, None) => {}
            }
            if let Some(guests) = f.min_guests {
                lines.push(format!("- Guests: {}", guests));
            }
            if let Some(rooms) = f.min_rooms {
                lines.push(format!("- Bedrooms: {}", rooms));
            }
            if let Some(check_in) = self.current_dates.check_in {
                lines.push(format!("- Check-in: {}", check_in));
            }
            if let Some(check_out) = self.current_dates.check_out {
                lines.push(format!("- Check-out: {}", check_out));
            }
        }

        if !self.preferences.preferred_categories.is_empty() {
            lines.push(format!(
                "Preferred categories: {}",
                self.preferences.preferred_categories.join(", ")
            ));
        }
        lines.push(format!("Price preference: {}", self.preferences.price_tier));

        if !self.last_search_results.is_empty() {
            let titles: Vec<&str> = self
                .last_search_results
                .iter()
                .take(5)
                .map(|l| l.title.as_str())
                .collect();
            lines.push(format!(
                "Last search returned {} listings: {}",
                self.last_search_results.len(),
                titles.join(", ")
            ));
        }
        lines.join("\n")
    }

    /// The last `n` messages as `role: content` lines followed by the summary.
    pub fn history_for_parser(&self, n: usize) -> String {
        let start = self.messages.len().saturating_sub(n);
        let mut out: Vec<String> = self.messages[start..]
            .iter()
            .map(|m| format!("{}: {}", m.role, m.content))
            .collect();
        out.push(String::new());
        out.push(self.summary());
        out.join("\n")
    }
}

// =============================================================================
// ConversationStore
// =============================================================================

type SharedContext = Arc<tokio::sync::Mutex<ConversationContext>>;

/// All live conversations, keyed by id.
pub struct ConversationStore {
    contexts: Mutex<HashMap<String, SharedContext>>,
    max_messages: usize,
}

impl ConversationStore {
    pub fn new(max_messages: usize) -> Self {
        Self {
            contexts: Mutex::new(HashMap::new()),
            max_messages,
        }
    }

    /// The context for `conversation_id`, created empty on first use.
    pub fn get_or_create(&self, conversation_id: &str) -> Result<SharedContext, ChatError> {
        let mut contexts = self
            .contexts
            .lock()
            .map_err(|e| ChatError::Storage(format!("conversation lock poisoned: {}", e)))?;
        let context = contexts
            .entry(conversation_id.to_string())
            .or_insert_with(|| {
                debug!(conversation_id, "Creating conversation context");
                Arc::new(tokio::sync::Mutex::new(ConversationContext::new(
                    conversation_id,
                    self.max_messages,
                )))
            });
        Ok(Arc::clone(context))
    }

    pub fn get(&self, conversation_id: &str) -> Result<Option<SharedContext>, ChatError> {
        let contexts = self
            .contexts
            .lock()
            .map_err(|e| ChatError::Storage(format!("conversation lock poisoned: {}", e)))?;
        Ok(contexts.get(conversation_id).cloned())
    }

    /// Forget a conversation. Returns whether it existed.
    pub fn remove(&self, conversation_id: &str) -> Result<bool, ChatError> {
        let mut contexts = self
            .contexts
            .lock()
            .map_err(|e| ChatError::Storage(format!("conversation lock poisoned: {}", e)))?;
        Ok(contexts.remove(conversation_id).is_some())
    }

    pub fn len(&self) -> usize {
        self.contexts.lock().map(|c| c.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop conversations whose newest message is older than `max_age`.
    ///
    /// Contexts with no messages, or locked by an in-flight turn, are kept.
    pub fn reap_idle(&self, max_age: chrono::Duration) -> Result<usize, ChatError> {
        let now = Utc::now();
        let mut contexts = self
            .contexts
            .lock()
            .map_err(|e| ChatError::Storage(format!("conversation lock poisoned: {}", e)))?;
        let before = contexts.len();
        contexts.retain(|_, context| match context.try_lock() {
            Ok(ctx) => ctx
                .last_activity()
                .map_or(true, |last| now - last <= max_age),
            Err(_) => true,
        });
        let removed = before - contexts.len();
        if removed > 0 {
            info!(removed, remaining = contexts.len(), "Reaped idle conversations");
        }
        Ok(removed)
    }
}
