//! Relevance reranking.
//!
//! - `HeuristicReranker` adds fixed points for query words that the listing
//!   actually satisfies (0-100 scale).
//! - `GenerativeReranker` asks a model to score candidates 0-10 and explain
//!   each score, keeping the search order when that fails.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use hearth_core::types::Listing;

use crate::llm::{extract_json_array, extract_reasoning, strip_code_fences, TextGenerator};
use crate::types::{AnnotatedListing, RecommendationAnnotation};

/// Reranked listings plus a note on how the order was decided.
#[derive(Debug, Clone)]
pub struct RerankOutcome {
    pub listings: Vec<AnnotatedListing>,
    pub reasoning: String,
    /// False when the input order was returned unscored.
    pub applied: bool,
}

impl RerankOutcome {
    fn unscored(listings: Vec<Listing>, reasoning: String) -> Self {
        Self {
            listings: listings.into_iter().map(AnnotatedListing::plain).collect(),
            reasoning,
            applied: false,
        }
    }
}

#[async_trait]
pub trait Reranker: Send + Sync {
    /// Never fails; an unusable ranking falls back to the input order.
    async fn rerank(&self, query: &str, listings: Vec<Listing>) -> RerankOutcome;

    fn strategy(&self) -> &'static str;
}

// =============================================================================
// HeuristicReranker
// =============================================================================

const BASE_SCORE: f64 = 50.0;
const MAX_SCORE: f64 = 100.0;
const PRICE_POINTS: f64 = 25.0;
const CATEGORY_POINTS: f64 = 30.0;
const PARTY_POINTS: f64 = 20.0;
const AMENITY_POINTS: f64 = 15.0;

const BUDGET_PRICE_CEILING: u32 = 150;
const LUXURY_PRICE_FLOOR: u32 = 300;

const BUDGET_WORDS: &[&str] = &["cheap", "budget", "affordable", "inexpensive", "economical"];
const LUXURY_WORDS: &[&str] = &["luxury", "luxurious", "upscale", "high-end", "premium", "lavish"];
const GROUP_WORDS: &[&str] = &["family", "families", "group", "friends", "kids", "children", "large"];
const COUPLE_WORDS: &[&str] = &["couple", "couples", "romantic", "solo", "honeymoon", "two of us"];

/// Query word and the category it points at.
const CATEGORY_VOCAB: &[(&str, &str)] = &[
    ("beach", "Beach"),
    ("seaside", "Beach"),
    ("ocean", "Beach"),
    ("ski", "Skiing"),
    ("mountain", "Skiing"),
    ("lake", "Lake"),
    ("desert", "Desert"),
    ("countryside", "Countryside"),
    ("rural", "Countryside"),
    ("farm", "Countryside"),
    ("city", "Modern"),
    ("downtown", "Modern"),
    ("urban", "Modern"),
    ("modern", "Modern"),
    ("castle", "Castles"),
    ("mansion", "Castles"),
    ("camping", "Camping"),
    ("forest", "Camping"),
    ("pool", "Pools"),
];

const AMENITY_VOCAB: &[&str] = &[
    "wifi", "kitchen", "parking", "pool", "hot tub", "fireplace", "air conditioning", "washer",
    "gym", "balcony",
];

/// Deterministic additive scoring.
#[derive(Debug, Clone, Copy)]
pub struct HeuristicReranker {
    top_k: usize,
}

impl HeuristicReranker {
    pub fn new(top_k: usize) -> Self {
        Self { top_k: top_k.max(1) }
    }

    /// Score one listing against the normalised query.
    pub fn score(&self, query: &str, listing: &Listing) -> RecommendationAnnotation {
        let q = normalize(query);
        let mut score = BASE_SCORE;
        let mut reasons = Vec::new();

        if mentions_any(&q, BUDGET_WORDS) && listing.price < BUDGET_PRICE_CEILING {
            score += PRICE_POINTS;
            reasons.push(format!("Budget-friendly at ${}/night", listing.price));
        }
        if mentions_any(&q, LUXURY_WORDS)
            && (listing.price >= LUXURY_PRICE_FLOOR || listing.category.eq_ignore_ascii_case("Lux"))
        {
            score += PRICE_POINTS;
            reasons.push("Luxury property".to_string());
        }

        let haystack = normalize(&format!("{} {}", listing.title, listing.description));
        if let Some((word, _)) = CATEGORY_VOCAB.iter().find(|(word, category)| {
            mentions(&q, word)
                && (listing.category.eq_ignore_ascii_case(category) || mentions(&haystack, word))
        }) {
            score += CATEGORY_POINTS;
            reasons.push(format!("Matches your {} preference", word));
        }

        if mentions_any(&q, GROUP_WORDS) && listing.guest_count >= 6 {
            score += PARTY_POINTS;
            reasons.push(format!("Sleeps {}, good for groups", listing.guest_count));
        } else if mentions_any(&q, COUPLE_WORDS) && listing.guest_count <= 2 {
            score += PARTY_POINTS;
            reasons.push("Cozy size for two".to_string());
        }

        for amenity in AMENITY_VOCAB {
            if mentions(&q, amenity) && listing.amenities.contains(*amenity) {
                score += AMENITY_POINTS;
                reasons.push(format!("Has {}", amenity));
            }
        }

        RecommendationAnnotation {
            relevance_score: score.min(MAX_SCORE),
            reasons,
        }
    }
}

impl Default for HeuristicReranker {
    fn default() -> Self {
        Self::new(10)
    }
}

#[async_trait]
impl Reranker for HeuristicReranker {
    async fn rerank(&self, query: &str, listings: Vec<Listing>) -> RerankOutcome {
        let mut scored: Vec<AnnotatedListing> = listings
            .into_iter()
            .map(|listing| {
                let recommendation = self.score(query, &listing);
                AnnotatedListing {
                    listing,
                    recommendation: Some(recommendation),
                    availability: None,
                }
            })
            .collect();

        // Stable: equal scores keep their search order.
        scored.sort_by(|a, b| score_of(b).total_cmp(&score_of(a)));
        scored.truncate(self.top_k);

        let boosted = scored
            .iter()
            .filter(|l| score_of(l) > BASE_SCORE)
            .count();
        RerankOutcome {
            reasoning: format!(
                "Scored {} listings by keyword relevance; {} matched query preferences.",
                scored.len(),
                boosted
            ),
            listings: scored,
            applied: true,
        }
    }

    fn strategy(&self) -> &'static str {
        "heuristic"
    }
}

fn score_of(listing: &AnnotatedListing) -> f64 {
    listing
        .recommendation
        .as_ref()
        .map_or(0.0, |r| r.relevance_score)
}

/// Lowercase with punctuation turned into spaces and padded, so that
/// `mentions` can match whole words and phrases.
fn normalize(text: &str) -> String {
    let cleaned: String = text
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' { c } else { ' ' })
        .collect();
    format!(" {} ", cleaned.split_whitespace().collect::<Vec<_>>().join(" "))
}

fn mentions(normalized: &str, phrase: &str) -> bool {
    normalized.contains(&format!(" {} ", phrase))
}

fn mentions_any(normalized: &str, phrases: &[&str]) -> bool {
    phrases.iter().any(|p| mentions(normalized, p))
}

// =============================================================================
// GenerativeReranker
// =============================================================================

#[derive(Deserialize)]
struct RankedItem {
    id: Value,
    #[serde(default)]
    score: Value,
    #[serde(default)]
    reason: Option<String>,
}

pub struct GenerativeReranker {
    generator: Arc<dyn TextGenerator>,
    max_candidates: usize,
    description_chars: usize,
}

impl GenerativeReranker {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        max_candidates: usize,
        description_chars: usize,
    ) -> Self {
        Self {
            generator,
            max_candidates: max_candidates.max(1),
            description_chars,
        }
    }

    fn build_prompt(&self, query: &str, candidates: &[Listing]) -> String {
        let items: Vec<Value> = candidates
            .iter()
            .map(|l| {
                json!({
                    "id": l.id,
                    "title": l.title,
                    "price": l.price,
                    "category": l.category,
                    "location": l.location_value,
                    "guests": l.guest_count,
                    "description": truncate_chars(&l.description, self.description_chars),
                })
            })
            .collect();
        let listing_json =
            serde_json::to_string_pretty(&items).unwrap_or_else(|_| "[]".to_string());

        format!(
            r#"You are ranking vacation rental listings for a guest.

Guest request: "{query}"

Candidate listings:
{listing_json}

Score every listing from 0 to 10 for how well it fits the request, and give a one-sentence reason.

Answer in exactly this format:

Reasoning:
<your thinking about what the guest wants>

JSON:
[{{"id": "listing id", "score": 8, "reason": "why it fits"}}]"#,
            query = query.trim(),
            listing_json = listing_json,
        )
    }

    fn apply_ranking(&self, text: &str, candidates: &[Listing]) -> Result<RerankOutcome, String> {
        let text = strip_code_fences(text);
        let reasoning = extract_reasoning(&text)
            .unwrap_or_else(|| "Ranked by generative relevance scoring.".to_string());
        let array = extract_json_array(&text).ok_or("no JSON array in response")?;
        let items: Vec<RankedItem> =
            serde_json::from_str(array).map_err(|e| format!("malformed ranking JSON: {}", e))?;

        let mut ranked: Vec<AnnotatedListing> = Vec::new();
        for item in items {
            let Some(id) = value_as_string(&item.id) else { continue };
            let Some(listing) = candidates.iter().find(|l| l.id == id) else {
                continue;
            };
            if ranked.iter().any(|r| r.listing.id == listing.id) {
                continue;
            }
            let score = value_as_f64(&item.score).unwrap_or(0.0).clamp(0.0, 10.0);
            ranked.push(AnnotatedListing {
                listing: listing.clone(),
                recommendation: Some(RecommendationAnnotation {
                    relevance_score: score,
                    reasons: item
                        .reason
                        .map(|r| r.trim().to_string())
                        .filter(|r| !r.is_empty())
                        .into_iter()
                        .collect(),
                }),
                availability: None,
            });
        }

        if ranked.is_empty() {
            return Err("ranking mentioned none of the candidates".to_string());
        }
        ranked.sort_by(|a, b| score_of(b).total_cmp(&score_of(a)));
        Ok(RerankOutcome {
            listings: ranked,
            reasoning,
            applied: true,
        })
    }
}

#[async_trait]
impl Reranker for GenerativeReranker {
    async fn rerank(&self, query: &str, listings: Vec<Listing>) -> RerankOutcome {
        if listings.is_empty() {
            return RerankOutcome::unscored(listings, "Nothing to rank.".to_string());
        }
        let candidates = &listings[..listings.len().min(self.max_candidates)];
        let prompt = self.build_prompt(query, candidates);

        let result = match self.generator.generate(&prompt).await {
            Ok(text) => self.apply_ranking(&text, candidates),
            Err(e) => Err(e.to_string()),
        };
        match result {
            Ok(outcome) => {
                debug!(kept = outcome.listings.len(), "Generative rerank applied");
                outcome
            }
            Err(reason) => {
                warn!(reason = %reason, "Generative rerank skipped");
                RerankOutcome::unscored(
                    listings,
                    format!("Re-ranking skipped ({}); showing results in search order.", reason),
                )
            }
        }
    }

    fn strategy(&self) -> &'static str {
        "generative"
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max).collect();
    out.push_str("...");
    out
}

fn value_as_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn value_as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ChatError;

    struct Scripted(Result<String, String>);

    #[async_trait]
    impl TextGenerator for Scripted {
        async fn generate(&self, _prompt: &str) -> Result<String, ChatError> {
            self.0.clone().map_err(ChatError::Generation)
        }
    }

    fn listings() -> Vec<Listing> {
        vec![
            Listing::new("villa", "Luxury Villa 1", "Lux", 450).with_capacity(8, 4, 3),
            Listing::new("beach", "Beach House 4", "Beach", 120)
                .with_capacity(4, 2, 1)
                .with_amenities(["wifi", "pool"]),
            Listing::new("studio", "City Studio 6", "Modern", 90).with_capacity(2, 1, 1),
        ]
    }

    fn ids(outcome: &RerankOutcome) -> Vec<&str> {
        outcome.listings.iter().map(|l| l.listing.id.as_str()).collect()
    }

    // ---- Heuristic ----

    #[tokio::test]
    async fn test_heuristic_rewards_matches() {
        let outcome = HeuristicReranker::new(10)
            .rerank("cheap beach house with a pool", listings())
            .await;
        assert!(outcome.applied);
        assert_eq!(ids(&outcome)[0], "beach");

        let top = outcome.listings[0].recommendation.as_ref().unwrap();
        // 50 + 25 budget + 30 beach + 15 pool
        assert_eq!(top.relevance_score, 100.0);
        assert_eq!(top.reasons.len(), 3);
    }

    #[tokio::test]
    async fn test_heuristic_word_without_attribute_scores_nothing() {
        let reranker = HeuristicReranker::new(10);
        let villa = &listings()[0];
        let annotation = reranker.score("cheap", villa);
        assert_eq!(annotation.relevance_score, BASE_SCORE);
        assert!(annotation.reasons.is_empty());
    }

    #[tokio::test]
    async fn test_heuristic_party_size() {
        let reranker = HeuristicReranker::new(10);
        let all = listings();
        assert_eq!(reranker.score("big family trip", &all[0]).relevance_score, 70.0);
        assert_eq!(reranker.score("romantic getaway", &all[2]).relevance_score, 70.0);
        assert_eq!(reranker.score("romantic getaway", &all[0]).relevance_score, 50.0);
    }

    #[tokio::test]
    async fn test_heuristic_ties_keep_order_and_truncate() {
        let outcome = HeuristicReranker::new(2).rerank("somewhere", listings()).await;
        assert_eq!(ids(&outcome), vec!["villa", "beach"]);
    }

    #[tokio::test]
    async fn test_heuristic_luxury_category() {
        let reranker = HeuristicReranker::new(10);
        let cheap_lux = Listing::new("x", "Penthouse Suite 8", "Lux", 200);
        assert_eq!(reranker.score("luxury penthouse", &cheap_lux).relevance_score, 75.0);
    }

    // ---- Generative ----

    #[tokio::test]
    async fn test_generative_orders_by_score_and_drops_unmentioned() {
        let reply = "Reasoning:\nThe guest wants the sea.\n\nJSON:\n[{\"id\": \"studio\", \"score\": 3, \"reason\": \"In the city\"}, {\"id\": \"beach\", \"score\": \"9\", \"reason\": \"On the beach\"}, {\"id\": \"ghost\", \"score\": 10}]";
        let reranker = GenerativeReranker::new(Arc::new(Scripted(Ok(reply.into()))), 10, 150);
        let outcome = reranker.rerank("beach", listings()).await;

        assert!(outcome.applied);
        assert_eq!(ids(&outcome), vec!["beach", "studio"]);
        assert_eq!(outcome.reasoning, "The guest wants the sea.");
        let top = outcome.listings[0].recommendation.as_ref().unwrap();
        assert_eq!(top.relevance_score, 9.0);
        assert_eq!(top.reasons, vec!["On the beach"]);
    }

    #[tokio::test]
    async fn test_generative_failure_keeps_order() {
        let reranker = GenerativeReranker::new(Arc::new(Scripted(Err("timeout".into()))), 10, 150);
        let outcome = reranker.rerank("beach", listings()).await;
        assert!(!outcome.applied);
        assert_eq!(ids(&outcome), vec!["villa", "beach", "studio"]);
        assert!(outcome.listings.iter().all(|l| l.recommendation.is_none()));
        assert!(outcome.reasoning.contains("Re-ranking skipped"));
    }

    #[tokio::test]
    async fn test_generative_unparseable_keeps_order() {
        let reranker =
            GenerativeReranker::new(Arc::new(Scripted(Ok("I like them all".into()))), 10, 150);
        let outcome = reranker.rerank("beach", listings()).await;
        assert!(!outcome.applied);
        assert_eq!(outcome.listings.len(), 3);
    }

    #[tokio::test]
    async fn test_generative_no_overlap_keeps_order() {
        let reranker = GenerativeReranker::new(
            Arc::new(Scripted(Ok("[{\"id\": \"nope\", \"score\": 5}]".into()))),
            10,
            150,
        );
        let outcome = reranker.rerank("beach", listings()).await;
        assert!(!outcome.applied);
        assert_eq!(ids(&outcome), vec!["villa", "beach", "studio"]);
    }

    #[test]
    fn test_prompt_truncates_descriptions() {
        let reranker = GenerativeReranker::new(Arc::new(Scripted(Ok(String::new()))), 1, 10);
        let long = Listing::new("l", "Long", "Beach", 100).with_description("a".repeat(50));
        let prompt = reranker.build_prompt("beach", &[long]);
        assert!(prompt.contains("aaaaaaaaaa..."));
        assert!(!prompt.contains(&"a".repeat(11)));
    }
}
