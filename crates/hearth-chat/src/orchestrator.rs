//! Turn orchestrator: central coordinator wiring intent parsing, search,
//! reranking, availability and conversation memory.
//!
//! Each turn holds its conversation's lock from the first read to the final
//! write, so turns on one conversation id run one at a time while different
//! ids proceed independently.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use hearth_core::config::{
    ConversationConfig, HearthConfig, IntentConfig, IntentStrategy, RerankStrategy, TurnConfig,
};
use hearth_core::types::{Clock, Listing};
use hearth_storage::ListingRepository;
use hearth_vector::{DynEmbeddingService, VectorSearch};

use crate::error::ChatError;
use crate::filters::{detect_category, extract_filters};
use crate::intent::{normalize_dates, GenerativeIntentParser, IntentParser, RuleBasedIntentParser};
use crate::llm::TextGenerator;
use crate::memory::{ConversationContext, ConversationStore};
use crate::pricing::AvailabilityEngine;
use crate::rerank::{GenerativeReranker, HeuristicReranker, Reranker};
use crate::response;
use crate::search::{SearchAgent, SearchSource};
use crate::trace::{Trace, TraceStatus};
use crate::types::{AnnotatedListing, ChatRole, Intent, IntentKind, TurnResponse};

const ORCHESTRATOR: &str = "Orchestrator";
const INTENT_AGENT: &str = "IntentParser";
const SEARCH_AGENT: &str = "SearchAgent";
const RECOMMEND_AGENT: &str = "RecommendAgent";
const AVAILABILITY_AGENT: &str = "AvailabilityAgent";
const PRICING_AGENT: &str = "PricingAgent";

/// Listings analysed when a price question falls back to a fresh search.
const PRICE_SEARCH_LIMIT: usize = 5;

/// Follow-ups are short; longer utterances are treated as new searches.
const FOLLOW_UP_MAX_WORDS: usize = 8;

const FOLLOW_UP_MARKERS: &[&str] = &[
    "these",
    "those",
    "them",
    "they",
    "it",
    "which",
    "cheapest",
    "most expensive",
    "priciest",
    "largest",
    "biggest",
    "that one",
];

type TurnResult = Result<(String, Vec<AnnotatedListing>), ChatError>;

/// External collaborators the orchestrator is built from.
pub struct OrchestratorDeps {
    pub repo: Arc<dyn ListingRepository>,
    pub embedder: Arc<dyn DynEmbeddingService>,
    pub index: Arc<dyn VectorSearch>,
    /// Without a generator the rule-based parser and heuristic reranker are
    /// used regardless of configuration.
    pub generator: Option<Arc<dyn TextGenerator>>,
    pub clock: Clock,
}

/// Central coordinator for conversational turns.
pub struct Orchestrator {
    repo: Arc<dyn ListingRepository>,
    search: SearchAgent,
    intent_parser: Arc<dyn IntentParser>,
    reranker: Arc<dyn Reranker>,
    engine: AvailabilityEngine,
    store: ConversationStore,
    intent_config: IntentConfig,
    conversation_config: ConversationConfig,
    turn_config: TurnConfig,
}

impl Orchestrator {
    /// Build the pipeline, choosing strategies from `config`.
    pub fn from_config(config: &HearthConfig, deps: OrchestratorDeps) -> Self {
        let intent_parser: Arc<dyn IntentParser> = match (&config.intent.strategy, &deps.generator)
        {
            (IntentStrategy::Generative, Some(generator)) => Arc::new(
                GenerativeIntentParser::new(Arc::clone(generator), deps.clock),
            ),
            (IntentStrategy::Generative, None) => {
                warn!("Generative intent parsing configured without a model, using rules");
                Arc::new(RuleBasedIntentParser::new(deps.clock))
            }
            (IntentStrategy::RuleBased, _) => Arc::new(RuleBasedIntentParser::new(deps.clock)),
        };

        let reranker: Arc<dyn Reranker> = match (&config.rerank.strategy, &deps.generator) {
            (RerankStrategy::Generative, Some(generator)) => Arc::new(GenerativeReranker::new(
                Arc::clone(generator),
                config.rerank.max_candidates,
                config.rerank.description_chars,
            )),
            (RerankStrategy::Generative, None) => {
                warn!("Generative reranking configured without a model, using heuristics");
                Arc::new(HeuristicReranker::new(config.rerank.top_k))
            }
            (RerankStrategy::Heuristic, _) => Arc::new(HeuristicReranker::new(config.rerank.top_k)),
        };

        info!(
            intent = intent_parser.strategy(),
            rerank = reranker.strategy(),
            "Orchestrator ready"
        );

        Self {
            search: SearchAgent::new(
                deps.embedder,
                deps.index,
                Arc::clone(&deps.repo),
                config.search.clone(),
            ),
            repo: deps.repo,
            intent_parser,
            reranker,
            engine: AvailabilityEngine::new(deps.clock),
            store: ConversationStore::new(config.conversation.max_messages),
            intent_config: config.intent.clone(),
            conversation_config: config.conversation.clone(),
            turn_config: config.turn.clone(),
        }
    }

    pub fn with_intent_parser(mut self, parser: Arc<dyn IntentParser>) -> Self {
        self.intent_parser = parser;
        self
    }

    pub fn with_reranker(mut self, reranker: Arc<dyn Reranker>) -> Self {
        self.reranker = reranker;
        self
    }

    pub fn store(&self) -> &ConversationStore {
        &self.store
    }

    pub fn intent_strategy(&self) -> &'static str {
        self.intent_parser.strategy()
    }

    pub fn rerank_strategy(&self) -> &'static str {
        self.reranker.strategy()
    }

    /// Reject empty and oversized messages.
    pub fn validate(&self, utterance: &str) -> Result<(), ChatError> {
        if utterance.trim().is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        let max = self.conversation_config.max_message_chars;
        if utterance.chars().count() > max {
            return Err(ChatError::MessageTooLong(max));
        }
        Ok(())
    }

    /// Process one user message. Never fails: errors and timeouts become an
    /// apology with no listings and a failed trace step.
    pub async fn handle_turn(&self, utterance: &str, conversation_id: &str) -> TurnResponse {
        let mut trace = Trace::new();

        if let Err(e) = self.validate(utterance) {
            trace.record(ORCHESTRATOR, "validate", TraceStatus::Failed, e.to_string());
            return TurnResponse {
                message: format!("Sorry, I can't process that: {}.", e),
                listings: Vec::new(),
                trace: trace.into_steps(),
            };
        }

        let secs = self.turn_config.timeout_secs.max(1);
        let result = match tokio::time::timeout(
            Duration::from_secs(secs),
            self.run_turn(utterance.trim(), conversation_id, &mut trace),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(ChatError::Timeout(secs)),
        };

        match result {
            Ok((message, listings)) => TurnResponse {
                message,
                listings,
                trace: trace.into_steps(),
            },
            Err(e) => {
                warn!(conversation_id, error = %e, "Turn failed");
                trace.record(ORCHESTRATOR, "handle_turn", TraceStatus::Failed, e.to_string());
                let message = response::general_error();
                self.remember_reply(conversation_id, &message).await;
                TurnResponse {
                    message,
                    listings: Vec::new(),
                    trace: trace.into_steps(),
                }
            }
        }
    }

    async fn remember_reply(&self, conversation_id: &str, message: &str) {
        match self.store.get_or_create(conversation_id) {
            Ok(shared) => shared.lock().await.add_message(ChatRole::Assistant, message),
            Err(e) => warn!(conversation_id, error = %e, "Could not record apology"),
        }
    }

    async fn run_turn(&self, utterance: &str, conversation_id: &str, trace: &mut Trace) -> TurnResult {
        let shared = self.store.get_or_create(conversation_id)?;
        let mut ctx = shared.lock().await;

        ctx.add_message(ChatRole::User, utterance);
        ctx.analyze_preferences();
        ctx.merge_filters(&extract_filters(utterance));

        let step = trace.start(INTENT_AGENT, "parse_intent");
        let history = ctx.history_for_parser(self.intent_config.history_messages);
        let mut intent = self.intent_parser.parse(utterance, &history).await;
        let dates = normalize_dates(intent.dates().or(ctx.current_dates));
        intent.set_dates(dates);
        ctx.merge_dates(dates);
        trace.succeed(step, format!("{}: {}", intent.kind, intent.reasoning));
        info!(conversation_id, intent = %intent.kind, "Intent parsed");

        let (message, listings) = match intent.kind {
            IntentKind::DateCheck => self.date_check(&mut ctx, &intent, trace).await?,
            IntentKind::PricePredict => {
                self.price_predict(&mut ctx, utterance, &intent, trace).await?
            }
            IntentKind::Booking => self.booking(&mut ctx, &intent, trace).await?,
            IntentKind::Search | IntentKind::General => {
                self.search_turn(&mut ctx, utterance, &intent, trace).await?
            }
        };

        ctx.add_message(ChatRole::Assistant, message.clone());
        debug!(conversation_id, listings = listings.len(), "Turn complete");
        Ok((message, listings))
    }

    // =========================================================================
    // date_check
    // =========================================================================

    async fn date_check(
        &self,
        ctx: &mut ConversationContext,
        intent: &Intent,
        trace: &mut Trace,
    ) -> TurnResult {
        let dates = intent.dates();
        let Some((check_in, check_out)) = dates.range() else {
            trace.record(
                AVAILABILITY_AGENT,
                "check_dates",
                TraceStatus::Success,
                "No dates given, asked the user for them",
            );
            return Ok((response::missing_dates(), Vec::new()));
        };

        let step = trace.start(AVAILABILITY_AGENT, "check_dates");
        let candidates = match self.repo.find(&ctx.current_filters).await {
            Ok(candidates) => candidates,
            Err(e) => {
                trace.fail(step, e.to_string());
                return Err(e.into());
            }
        };
        let scanned = candidates.len();

        let available: Vec<AnnotatedListing> = candidates
            .into_iter()
            .map(|l| self.engine.annotate(AnnotatedListing::plain(l), dates, true))
            .filter(AnnotatedListing::is_bookable)
            .take(self.turn_config.date_check_limit)
            .collect();

        trace.succeed(
            step,
            format!(
                "{} of {} listings free from {} to {}",
                available.len(),
                scanned,
                check_in,
                check_out
            ),
        );
        if !available.is_empty() {
            ctx.set_last_results(available.iter().map(|l| l.listing.clone()).collect());
        }
        Ok((
            response::date_check_result(check_in, check_out, available.len()),
            available,
        ))
    }

    // =========================================================================
    // price_predict
    // =========================================================================

    async fn price_predict(
        &self,
        ctx: &mut ConversationContext,
        utterance: &str,
        intent: &Intent,
        trace: &mut Trace,
    ) -> TurnResult {
        let step = trace.start(PRICING_AGENT, "resolve_targets");
        let named = intent.listing_title.is_some() || intent.listing_id.is_some();

        let (targets, from_context) = match self.find_target(ctx, intent).await {
            Ok(Some((listing, from_context))) => (vec![listing], from_context),
            Ok(None) if !named && !ctx.last_search_results.is_empty() => {
                (ctx.last_search_results.clone(), true)
            }
            Ok(None) => {
                let query = intent
                    .listing_title
                    .as_deref()
                    .or(intent.search_query.as_deref())
                    .unwrap_or(utterance);
                let outcome = self.search.search(query).await;
                if outcome.source == SearchSource::None {
                    trace.fail(step, outcome.reasoning.clone());
                    return Err(ChatError::Search(outcome.reasoning));
                }
                let mut listings = outcome.into_listings();
                listings.truncate(PRICE_SEARCH_LIMIT);
                (listings, false)
            }
            Err(e) => {
                trace.fail(step, e.to_string());
                return Err(e);
            }
        };

        if targets.is_empty() {
            trace.succeed(step, "No listings to price");
            return Ok((response::no_results(), Vec::new()));
        }
        trace.succeed(
            step,
            format!(
                "{} listing(s) from {}",
                targets.len(),
                if from_context { "conversation" } else { "lookup" }
            ),
        );

        let dates = intent.dates();
        let priced: Vec<AnnotatedListing> = targets
            .into_iter()
            .map(|l| self.engine.annotate(AnnotatedListing::plain(l), dates, true))
            .collect();
        trace.record(
            PRICING_AGENT,
            "predict_prices",
            TraceStatus::Success,
            match dates.check_in {
                Some(check_in) => format!("Priced {} listing(s) for {}", priced.len(), check_in),
                None => format!("Priced {} listing(s) without dates", priced.len()),
            },
        );

        let message = if priced.len() == 1 {
            response::single_price_analysis(&priced[0])
        } else {
            response::multi_price_analysis(&priced, from_context)
        };
        Ok((message, priced))
    }

    // =========================================================================
    // booking
    // =========================================================================

    async fn booking(
        &self,
        ctx: &mut ConversationContext,
        intent: &Intent,
        trace: &mut Trace,
    ) -> TurnResult {
        let step = trace.start(ORCHESTRATOR, "resolve_booking_target");
        let named = intent.listing_title.is_some() || intent.listing_id.is_some();

        let target = match self.find_target(ctx, intent).await {
            Ok(Some((listing, _))) => Some(listing),
            Ok(None) if !named && ctx.last_search_results.len() == 1 => {
                Some(ctx.last_search_results[0].clone())
            }
            Ok(None) => None,
            Err(e) => {
                trace.fail(step, e.to_string());
                return Err(e);
            }
        };

        let Some(listing) = target else {
            let suggestions: Vec<String> = ctx
                .last_search_results
                .iter()
                .map(|l| l.title.clone())
                .collect();
            trace.succeed(
                step,
                format!("No target resolved, {} suggestion(s)", suggestions.len()),
            );
            let message = match (&intent.listing_title, suggestions.is_empty()) {
                (Some(title), _) => response::listing_not_found(title, &suggestions),
                (None, false) => response::choose_listing(&suggestions),
                (None, true) => response::booking_prompt(),
            };
            let listings = ctx
                .last_search_results
                .iter()
                .cloned()
                .map(AnnotatedListing::plain)
                .collect();
            return Ok((message, listings));
        };
        trace.succeed(step, format!("Resolved {}", listing.title));

        let dates = intent.dates();
        let annotated = self
            .engine
            .annotate(AnnotatedListing::plain(listing), dates, true);
        ctx.set_last_results(vec![annotated.listing.clone()]);

        // Without dates there is nothing to check yet; the reply asks for them.
        let Some((check_in, check_out)) = dates.range() else {
            trace.record(
                AVAILABILITY_AGENT,
                "check_booking",
                TraceStatus::Success,
                "No dates given",
            );
            let message = response::booking_confirmation(&annotated, None, None);
            return Ok((message, vec![annotated]));
        };

        let conflicts = annotated
            .availability
            .as_ref()
            .map(|a| a.conflicting_ranges.clone())
            .unwrap_or_default();
        let message = if annotated.is_bookable() {
            trace.record(
                AVAILABILITY_AGENT,
                "check_booking",
                TraceStatus::Success,
                format!("{} is free from {} to {}", annotated.listing.title, check_in, check_out),
            );
            response::booking_confirmation(&annotated, Some(check_in), Some(check_out))
        } else {
            trace.record(
                AVAILABILITY_AGENT,
                "check_booking",
                TraceStatus::Success,
                format!("{} conflicts with {}", annotated.listing.title, conflicts.join(", ")),
            );
            response::booking_unavailable(&annotated.listing.title, &conflicts)
        };
        Ok((message, vec![annotated]))
    }

    /// One named listing. Exact title or id in the last results first, then
    /// the repository by id and by title, then a whole-word title match in
    /// the last results.
    ///
    /// The flag reports whether it came from the conversation.
    async fn find_target(
        &self,
        ctx: &ConversationContext,
        intent: &Intent,
    ) -> Result<Option<(Listing, bool)>, ChatError> {
        let title = intent.listing_title.as_deref();
        if let Some(title) = title {
            let wanted = title.trim().to_lowercase();
            if let Some(listing) = ctx
                .last_search_results
                .iter()
                .find(|l| l.title.to_lowercase() == wanted)
            {
                return Ok(Some((listing.clone(), true)));
            }
        }
        if let Some(id) = intent.listing_id.as_deref() {
            if let Some(listing) = ctx.last_search_results.iter().find(|l| l.id == id) {
                return Ok(Some((listing.clone(), true)));
            }
            if let Some(listing) = self.repo.find_by_id(id).await? {
                return Ok(Some((listing, false)));
            }
        }
        if let Some(title) = title {
            if let Some(listing) = self.repo.find_by_title(title).await? {
                return Ok(Some((listing, false)));
            }
            let partial = ctx.last_search_results.iter().find(|l| l.title_matches(title));
            if let Some(listing) = partial {
                return Ok(Some((listing.clone(), true)));
            }
        }
        Ok(None)
    }

    // =========================================================================
    // search / general
    // =========================================================================

    async fn search_turn(
        &self,
        ctx: &mut ConversationContext,
        utterance: &str,
        intent: &Intent,
        trace: &mut Trace,
    ) -> TurnResult {
        let follow_up = is_follow_up(utterance, ctx);

        let candidates: Vec<Listing> = if follow_up {
            let narrowing = ctx.current_filters.numeric_only();
            let narrowed: Vec<Listing> = ctx
                .last_search_results
                .iter()
                .filter(|l| narrowing.matches(l))
                .cloned()
                .collect();
            let reused = if narrowed.is_empty() {
                ctx.last_search_results.clone()
            } else {
                narrowed
            };
            trace.record(
                ORCHESTRATOR,
                "reuse_results",
                TraceStatus::Success,
                format!("Follow-up on {} previous result(s)", reused.len()),
            );
            reused
        } else {
            let query = intent.search_query.as_deref().unwrap_or(utterance);
            let step = trace.start(SEARCH_AGENT, "search");
            let outcome = self.search.search(query).await;
            if outcome.source == SearchSource::None {
                trace.fail(step, outcome.reasoning.clone());
                return Err(ChatError::Search(outcome.reasoning));
            }
            trace.succeed(step, outcome.reasoning.clone());
            if outcome.is_empty() {
                return Ok((response::no_results(), Vec::new()));
            }

            let mut soft = ctx.current_filters.clone();
            soft.category = None;
            let listings = outcome.into_listings();
            let filtered: Vec<Listing> =
                listings.iter().filter(|l| soft.matches(l)).cloned().collect();
            if filtered.is_empty() {
                listings
            } else {
                filtered
            }
        };

        let step = trace.start(RECOMMEND_AGENT, "rerank");
        let reranked = self.reranker.rerank(utterance, candidates).await;
        if reranked.applied {
            trace.succeed(step, reranked.reasoning);
        } else {
            trace.fail(step, reranked.reasoning);
        }
        let mut ranked = reranked.listings;
        if let Some(order) = Superlative::detect(utterance) {
            order.sort(&mut ranked);
        }

        let dates = intent.dates();
        let pricing = dates.check_in.is_some() || intent.enable_price_prediction;
        let step = trace.start(AVAILABILITY_AGENT, "evaluate");
        let total = ranked.len();
        let shown: Vec<AnnotatedListing> = ranked
            .into_iter()
            .map(|l| self.engine.annotate(l, dates, pricing))
            .filter(AnnotatedListing::is_bookable)
            .take(self.turn_config.search_display_limit)
            .collect();
        trace.succeed(
            step,
            format!("{} of {} candidates bookable", shown.len(), total),
        );
        if pricing {
            trace.record(
                PRICING_AGENT,
                "predict_prices",
                TraceStatus::Success,
                format!("Priced {} listing(s)", shown.len()),
            );
        }

        if shown.is_empty() {
            return Ok((response::none_available(total), Vec::new()));
        }
        ctx.set_last_results(shown.iter().map(|l| l.listing.clone()).collect());
        Ok((response::found_listings(shown.len(), follow_up), shown))
    }
}

fn padded_words(text: &str) -> (String, usize) {
    let words: Vec<String> = text
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect();
    (format!(" {} ", words.join(" ")), words.len())
}

/// A short reference back to the previous results rather than a new search.
fn is_follow_up(utterance: &str, ctx: &ConversationContext) -> bool {
    if ctx.last_search_results.is_empty() || detect_category(utterance).is_some() {
        return false;
    }
    let (padded, count) = padded_words(utterance);
    count <= FOLLOW_UP_MAX_WORDS
        && FOLLOW_UP_MARKERS
            .iter()
            .any(|m| padded.contains(&format!(" {} ", m)))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Superlative {
    Cheapest,
    Priciest,
    Largest,
}

impl Superlative {
    fn detect(text: &str) -> Option<Self> {
        let (padded, _) = padded_words(text);
        let has = |w: &str| padded.contains(&format!(" {} ", w));
        if has("cheapest") || has("least expensive") {
            Some(Superlative::Cheapest)
        } else if has("most expensive") || has("priciest") {
            Some(Superlative::Priciest)
        } else if has("largest") || has("biggest") {
            Some(Superlative::Largest)
        } else {
            None
        }
    }

    /// Stable, so equal keys keep their relevance order.
    fn sort(self, listings: &mut [AnnotatedListing]) {
        match self {
            Superlative::Cheapest => listings.sort_by_key(|l| l.listing.price),
            Superlative::Priciest => {
                listings.sort_by_key(|l| std::cmp::Reverse(l.listing.price))
            }
            Superlative::Largest => {
                listings.sort_by_key(|l| std::cmp::Reverse(l.listing.guest_count))
            }
        }
    }
}
