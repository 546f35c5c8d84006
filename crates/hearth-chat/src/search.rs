//! Search agent: semantic retrieval with a keyword fallback.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use hearth_core::config::SearchConfig;
use hearth_core::error::HearthError;
use hearth_core::types::Listing;
use hearth_storage::ListingRepository;
use hearth_vector::{DynEmbeddingService, VectorSearch};

const KEYWORD_STOPWORDS: &[&str] = &[
    "a", "an", "and", "the", "of", "for", "in", "on", "to", "with", "at", "by", "is", "it", "me",
    "my", "i", "some", "any", "find", "show", "want", "looking", "need", "please", "can", "you",
    "place", "places", "somewhere", "something", "near",
];

/// Where a result set came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchSource {
    Semantic,
    Keyword,
    None,
}

/// A listing with its semantic similarity; keyword hits carry no score and
/// are ranked by position.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub listing: Listing,
    pub similarity: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub results: Vec<SearchResult>,
    pub reasoning: String,
    pub source: SearchSource,
}

impl SearchOutcome {
    pub fn listings(&self) -> Vec<Listing> {
        self.results.iter().map(|r| r.listing.clone()).collect()
    }

    pub fn into_listings(self) -> Vec<Listing> {
        self.results.into_iter().map(|r| r.listing).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

/// Resolves free-text queries into candidate listings.
pub struct SearchAgent {
    embedder: Arc<dyn DynEmbeddingService>,
    index: Arc<dyn VectorSearch>,
    repo: Arc<dyn ListingRepository>,
    config: SearchConfig,
}

impl SearchAgent {
    pub fn new(
        embedder: Arc<dyn DynEmbeddingService>,
        index: Arc<dyn VectorSearch>,
        repo: Arc<dyn ListingRepository>,
        config: SearchConfig,
    ) -> Self {
        Self {
            embedder,
            index,
            repo,
            config,
        }
    }

    /// Semantic search first; keyword search when that fails or finds
    /// nothing. Never returns an error: a failed fallback yields an empty
    /// outcome whose reasoning says why.
    pub async fn search(&self, query: &str) -> SearchOutcome {
        let mut notes = Vec::new();

        match self.semantic(query, &mut notes).await {
            Ok(results) if !results.is_empty() => {
                notes.push(format!("Semantic search found {} listings.", results.len()));
                return SearchOutcome {
                    results,
                    reasoning: notes.join(" "),
                    source: SearchSource::Semantic,
                };
            }
            Ok(_) => notes.push("Semantic search found no matches.".to_string()),
            Err(e) => {
                warn!(error = %e, "Semantic search failed, falling back to keywords");
                notes.push(format!("Semantic search unavailable ({}).", e));
            }
        }

        match self.keyword(query).await {
            Ok(listings) => {
                notes.push(format!("Keyword search found {} listings.", listings.len()));
                SearchOutcome {
                    results: listings
                        .into_iter()
                        .map(|listing| SearchResult {
                            listing,
                            similarity: None,
                        })
                        .collect(),
                    reasoning: notes.join(" "),
                    source: SearchSource::Keyword,
                }
            }
            Err(e) => {
                warn!(error = %e, "Keyword search failed");
                notes.push(format!("Keyword search failed ({}).", e));
                SearchOutcome {
                    results: Vec::new(),
                    reasoning: notes.join(" "),
                    source: SearchSource::None,
                }
            }
        }
    }

    async fn semantic(
        &self,
        query: &str,
        notes: &mut Vec<String>,
    ) -> Result<Vec<SearchResult>, HearthError> {
        let text = format!("{} {}", self.config.query_prefix, query.trim());
        let vector = self.embedder.embed_boxed(&text).await?;
        let matches = self
            .index
            .search(
                &vector,
                self.config.similarity_threshold,
                self.config.max_results,
            )
            .await?;
        if matches.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<String> = matches.iter().map(|m| m.id.clone()).collect();
        let listings = self.repo.find_by_ids(&ids).await?;
        if listings.len() < ids.len() {
            let missing = ids.len() - listings.len();
            warn!(missing, "Vector index references listings missing from the repository");
            notes.push(format!("{} indexed listings were missing from the repository.", missing));
        }

        let results: Vec<SearchResult> = listings
            .into_iter()
            .map(|listing| {
                let similarity = matches
                    .iter()
                    .find(|m| m.id == listing.id)
                    .map(|m| m.similarity);
                SearchResult {
                    listing,
                    similarity,
                }
            })
            .collect();
        debug!(count = results.len(), "Semantic search results");
        Ok(results)
    }

    async fn keyword(&self, query: &str) -> Result<Vec<Listing>, HearthError> {
        let tokens = keyword_tokens(query);
        if tokens.is_empty() {
            return Ok(Vec::new());
        }
        self.repo
            .search_keywords(&tokens, self.config.fallback_limit)
            .await
    }
}

/// Lowercase whitespace-separated terms with edge punctuation trimmed,
/// stopwords and single characters removed, first occurrence kept.
pub fn keyword_tokens(query: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    query
        .split_whitespace()
        .map(|t| {
            t.trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase()
        })
        .filter(|t| t.chars().count() > 1 && !KEYWORD_STOPWORDS.contains(&t.as_str()))
        .filter(|t| seen.insert(t.clone()))
        .collect()
}
