//! Conversational query orchestration for Hearth.
//!
//! Classifies each utterance into an intent, retrieves candidate listings
//! (semantic search with a keyword fallback), reranks them, evaluates
//! availability and pricing, and keeps short-lived conversation memory so
//! follow-up turns can refer back to earlier results.

pub mod error;
pub mod filters;
pub mod intent;
pub mod llm;
pub mod memory;
pub mod orchestrator;
pub mod pricing;
pub mod rerank;
pub mod response;
pub mod search;
pub mod trace;
pub mod types;

pub use error::ChatError;
pub use intent::{GenerativeIntentParser, IntentParser, RuleBasedIntentParser};
pub use llm::{GeminiGenerator, TextGenerator};
pub use memory::{ConversationContext, ConversationStore};
pub use orchestrator::{Orchestrator, OrchestratorDeps};
pub use pricing::AvailabilityEngine;
pub use rerank::{GenerativeReranker, HeuristicReranker, Reranker};
pub use search::{SearchAgent, SearchOutcome};
pub use trace::{AgentTraceStep, Trace, TraceStatus};
pub use types::{
    AnnotatedListing, AvailabilityAnnotation, ChatMessage, ChatRole, Intent, IntentKind,
    PriceInfo, PriceTrend, RecommendationAnnotation, TurnResponse,
};
