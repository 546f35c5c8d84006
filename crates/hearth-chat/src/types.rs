//! Types shared across the conversation pipeline.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use hearth_core::types::{Listing, StayDates};

use crate::trace::AgentTraceStep;

// =============================================================================
// Intent
// =============================================================================

/// What the user is trying to do this turn.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentKind {
    #[default]
    Search,
    DateCheck,
    PricePredict,
    Booking,
    General,
}

impl IntentKind {
    /// Parse the wire label (`search`, `date_check`, ...). Case-insensitive.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "search" => Some(IntentKind::Search),
            "date_check" => Some(IntentKind::DateCheck),
            "price_predict" => Some(IntentKind::PricePredict),
            "booking" => Some(IntentKind::Booking),
            "general" => Some(IntentKind::General),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            IntentKind::Search => "search",
            IntentKind::DateCheck => "date_check",
            IntentKind::PricePredict => "price_predict",
            IntentKind::Booking => "booking",
            IntentKind::General => "general",
        }
    }
}

impl std::fmt::Display for IntentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified utterance with its extracted slots. Built fresh every turn.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Intent {
    #[serde(rename = "type")]
    pub kind: IntentKind,
    pub search_query: Option<String>,
    pub check_in_date: Option<NaiveDate>,
    pub check_out_date: Option<NaiveDate>,
    pub listing_id: Option<String>,
    pub listing_title: Option<String>,
    pub enable_price_prediction: bool,
    pub reasoning: String,
}

impl Intent {
    /// The degraded intent: treat the whole utterance as a search query.
    pub fn fallback_search(utterance: &str, reasoning: impl Into<String>) -> Self {
        Self {
            kind: IntentKind::Search,
            search_query: Some(utterance.trim().to_string()),
            reasoning: reasoning.into(),
            ..Default::default()
        }
    }

    pub fn dates(&self) -> StayDates {
        StayDates::new(self.check_in_date, self.check_out_date)
    }

    pub fn set_dates(&mut self, dates: StayDates) {
        self.check_in_date = dates.check_in;
        self.check_out_date = dates.check_out;
    }
}

// =============================================================================
// Conversation messages
// =============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    User,
    Assistant,
}

impl std::fmt::Display for ChatRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChatRole::User => write!(f, "user"),
            ChatRole::Assistant => write!(f, "assistant"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

// =============================================================================
// Annotations
// =============================================================================

/// Relevance judgement attached to a listing copy by a reranker.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationAnnotation {
    /// 0-100 for heuristic scoring, 0-10 for generative scoring.
    pub relevance_score: f64,
    pub reasons: Vec<String>,
}

/// Dominant pricing effect, used to pick the narrative for a single listing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceTrend {
    #[default]
    Stable,
    Peak,
    Holiday,
    Weekend,
    LastMinute,
    EarlyBird,
}

/// Nightly rate before and after seasonal adjustment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceInfo {
    pub base_price: u32,
    pub predicted_price: u32,
    /// Display label, e.g. `Peak season (+30%) + Weekend surcharge (+15%)`.
    pub trend_label: String,
    pub trend: PriceTrend,
    /// Signed whole-percent change from base, e.g. `+50%`.
    pub price_change: String,
}

/// Availability and pricing for a listing over an optional stay.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityAnnotation {
    pub is_available: bool,
    pub conflicting_ranges: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_info: Option<PriceInfo>,
    pub total_price: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nights: Option<u32>,
}

/// A listing copy with whatever annotations the turn produced.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotatedListing {
    #[serde(flatten)]
    pub listing: Listing,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<RecommendationAnnotation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub availability: Option<AvailabilityAnnotation>,
}

impl AnnotatedListing {
    pub fn plain(listing: Listing) -> Self {
        Self {
            listing,
            recommendation: None,
            availability: None,
        }
    }

    pub fn is_bookable(&self) -> bool {
        self.availability.as_ref().map_or(true, |a| a.is_available)
    }

    /// Predicted nightly rate when priced, else the base rate.
    pub fn nightly_price(&self) -> u32 {
        self.availability
            .as_ref()
            .and_then(|a| a.price_info.as_ref())
            .map_or(self.listing.price, |p| p.predicted_price)
    }
}

impl From<Listing> for AnnotatedListing {
    fn from(listing: Listing) -> Self {
        Self::plain(listing)
    }
}

// =============================================================================
// Turn output
// =============================================================================

/// Everything a caller gets back from one conversational turn.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnResponse {
    pub message: String,
    pub listings: Vec<AnnotatedListing>,
    pub trace: Vec<AgentTraceStep>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intent_kind_labels() {
        assert_eq!(IntentKind::from_label("DATE_CHECK"), Some(IntentKind::DateCheck));
        assert_eq!(IntentKind::from_label(" booking "), Some(IntentKind::Booking));
        assert_eq!(IntentKind::from_label("search | booking"), None);
        assert_eq!(IntentKind::PricePredict.to_string(), "price_predict");
    }

    #[test]
    fn test_fallback_search_intent() {
        let intent = Intent::fallback_search("  beach houses ", "could not parse");
        assert_eq!(intent.kind, IntentKind::Search);
        assert_eq!(intent.search_query.as_deref(), Some("beach houses"));
        assert!(intent.dates().is_empty());
    }

    #[test]
    fn test_intent_serializes_wire_names() {
        let intent = Intent {
            kind: IntentKind::Booking,
            listing_title: Some("Luxury Villa 1".into()),
            check_in_date: NaiveDate::from_ymd_opt(2026, 1, 1),
            ..Default::default()
        };
        let json = serde_json::to_value(&intent).unwrap();
        assert_eq!(json["type"], "booking");
        assert_eq!(json["listingTitle"], "Luxury Villa 1");
        assert_eq!(json["checkInDate"], "2026-01-01");
    }

    #[test]
    fn test_annotated_listing_flattens() {
        let listing = Listing::new("l1", "Cabin", "Lake", 90);
        let annotated = AnnotatedListing {
            listing,
            recommendation: Some(RecommendationAnnotation {
                relevance_score: 80.0,
                reasons: vec!["Lakefront".into()],
            }),
            availability: None,
        };
        let json = serde_json::to_value(&annotated).unwrap();
        assert_eq!(json["title"], "Cabin");
        assert_eq!(json["recommendation"]["relevanceScore"], 80.0);
        assert!(json.get("availability").is_none());
        assert!(annotated.is_bookable());
        assert_eq!(annotated.nightly_price(), 90);
    }
}
