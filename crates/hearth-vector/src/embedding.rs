//! Embedding service trait and implementations.
//!
//! - `GeminiEmbedding` calls the Gemini `embedContent` endpoint. This is the
//!   production backend.
//! - `HashingEmbedding` hashes word tokens into a fixed-size bag-of-words
//!   vector. Deterministic and offline; used when no API key is configured
//!   and in tests.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::Duration;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::debug;

use hearth_core::config::GeminiConfig;
use hearth_core::error::HearthError;

/// Service for generating text embeddings.
pub trait EmbeddingService: Send + Sync {
    /// Generate an embedding vector for the given text.
    fn embed(
        &self,
        text: &str,
    ) -> impl std::future::Future<Output = Result<Vec<f32>, HearthError>> + Send;

    /// Return the dimensionality of vectors produced by this service.
    fn dimensions(&self) -> usize;
}

/// Object-safe version of [`EmbeddingService`] for dynamic dispatch.
///
/// `EmbeddingService::embed` returns `impl Future`, which is not
/// object-safe. This trait boxes the future so `Arc<dyn DynEmbeddingService>`
/// can be shared by the search agent and the indexer.
pub trait DynEmbeddingService: Send + Sync {
    fn embed_boxed<'a>(
        &'a self,
        text: &'a str,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<Vec<f32>, HearthError>> + Send + 'a>>;

    fn dimensions(&self) -> usize;
}

impl<T: EmbeddingService> DynEmbeddingService for T {
    fn embed_boxed<'a>(
        &'a self,
        text: &'a str,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<Vec<f32>, HearthError>> + Send + 'a>> {
        Box::pin(self.embed(text))
    }

    fn dimensions(&self) -> usize {
        EmbeddingService::dimensions(self)
    }
}

// ---------------------------------------------------------------------------
// GeminiEmbedding - remote embedContent calls
// ---------------------------------------------------------------------------

/// Dimensionality of `text-embedding-004`.
pub const GEMINI_EMBEDDING_DIMENSIONS: usize = 768;

/// Gemini-backed embedding service.
#[derive(Debug, Clone)]
pub struct GeminiEmbedding {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: String,
    content: EmbedContent<'a>,
}

#[derive(Serialize)]
struct EmbedContent<'a> {
    parts: Vec<EmbedPart<'a>>,
}

#[derive(Serialize)]
struct EmbedPart<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: EmbedValues,
}

#[derive(Deserialize)]
struct EmbedValues {
    values: Vec<f32>,
}

impl GeminiEmbedding {
    pub fn new(api_key: impl Into<String>, config: &GeminiConfig) -> Result<Self, HearthError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| HearthError::Embedding(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.embedding_model.clone(),
        })
    }
}

impl EmbeddingService for GeminiEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, HearthError> {
        if text.trim().is_empty() {
            return Err(HearthError::Embedding("Cannot embed empty text".to_string()));
        }

        let url = format!(
            "{}/v1beta/models/{}:embedContent?key={}",
            self.base_url, self.model, self.api_key
        );
        let body = EmbedRequest {
            model: format!("models/{}", self.model),
            content: EmbedContent {
                parts: vec![EmbedPart { text }],
            },
        };

        let resp = match self.client.post(&url).json(&body).send().await {
            Ok(r) => r,
            Err(e) if e.is_timeout() => {
                return Err(HearthError::Embedding("embedding request timed out".to_string()));
            }
            Err(e) if e.is_connect() => {
                return Err(HearthError::Embedding(format!("embedding connect error: {}", e)));
            }
            Err(e) => return Err(HearthError::Embedding(e.to_string())),
        };

        let status = resp.status();
        if status != StatusCode::OK {
            let text = resp.text().await.unwrap_or_default();
            return Err(HearthError::Embedding(format!(
                "embedding API returned {}: {}",
                status, text
            )));
        }

        let parsed: EmbedResponse = resp
            .json()
            .await
            .map_err(|e| HearthError::Embedding(format!("Invalid embedding response: {}", e)))?;
        if parsed.embedding.values.is_empty() {
            return Err(HearthError::Embedding("Empty embedding returned".to_string()));
        }
        debug!(dims = parsed.embedding.values.len(), "Embedded text via Gemini");
        Ok(parsed.embedding.values)
    }

    fn dimensions(&self) -> usize {
        GEMINI_EMBEDDING_DIMENSIONS
    }
}

// ---------------------------------------------------------------------------
// HashingEmbedding - deterministic bag-of-words vectors
// ---------------------------------------------------------------------------

const STOPWORDS: &[&str] = &[
    "a", "an", "and", "the", "of", "for", "in", "on", "to", "with", "at", "by", "is", "it",
    "me", "my", "i", "some", "any", "find", "show",
];

/// Hashes lowercase word tokens into signed buckets, then L2-normalizes.
///
/// Texts sharing words land close together under cosine similarity, which is
/// enough for offline demos; it has no notion of synonyms.
#[derive(Debug, Clone)]
pub struct HashingEmbedding {
    dimensions: usize,
}

impl HashingEmbedding {
    pub fn new() -> Self {
        Self { dimensions: 384 }
    }

    pub fn with_dimensions(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    fn hash_to_vector(&self, text: &str) -> Vec<f32> {
        let mut result = vec![0.0f32; self.dimensions];
        let lowered = text.to_lowercase();
        let mut seen = std::collections::HashSet::new();

        for token in lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty() && !STOPWORDS.contains(t))
        {
            if !seen.insert(token) {
                continue;
            }
            let mut hasher = DefaultHasher::new();
            token.hash(&mut hasher);
            let h = hasher.finish();
            let bucket = (h % self.dimensions as u64) as usize;
            let sign = if (h >> 63) == 0 { 1.0 } else { -1.0 };
            result[bucket] += sign;
        }

        let norm: f32 = result.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for val in &mut result {
                *val /= norm;
            }
        }
        result
    }
}

impl Default for HashingEmbedding {
    fn default() -> Self {
        Self::new()
    }
}

impl EmbeddingService for HashingEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, HearthError> {
        let vector = self.hash_to_vector(text);
        if vector.iter().all(|v| *v == 0.0) {
            return Err(HearthError::Embedding(
                "Text contains no indexable words".to_string(),
            ));
        }
        Ok(vector)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    // ---- HashingEmbedding ----

    #[tokio::test]
    async fn test_hashing_dimension_and_norm() {
        let service = HashingEmbedding::new();
        let vec = service.embed("beach house with pool").await.unwrap();
        assert_eq!(vec.len(), 384);
        let norm: f32 = vec.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_hashing_deterministic() {
        let service = HashingEmbedding::new();
        let v1 = service.embed("Seaside Retreat").await.unwrap();
        let v2 = service.embed("seaside retreat").await.unwrap();
        assert_eq!(v1, v2);
    }

    #[tokio::test]
    async fn test_hashing_shared_words_are_closer() {
        let service = HashingEmbedding::new();
        let query = service.embed("beach house").await.unwrap();
        let near = service.embed("Beach House 4 steps from the beach").await.unwrap();
        let far = service.embed("Mountain Cabin near ski lifts").await.unwrap();
        assert!(cosine(&query, &near) > cosine(&query, &far));
    }

    #[tokio::test]
    async fn test_hashing_rejects_wordless_text() {
        let service = HashingEmbedding::new();
        assert!(service.embed("").await.is_err());
        assert!(service.embed("?! the").await.is_err());
    }

    #[tokio::test]
    async fn test_dyn_dispatch() {
        let service: Box<dyn DynEmbeddingService> = Box::new(HashingEmbedding::with_dimensions(16));
        let vec = service.embed_boxed("lake cabin").await.unwrap();
        assert_eq!(vec.len(), 16);
        assert_eq!(service.dimensions(), 16);
    }

    // ---- GeminiEmbedding ----

    fn gemini_config(base_url: &str) -> GeminiConfig {
        GeminiConfig {
            base_url: base_url.to_string(),
            timeout_secs: 5,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_gemini_embed_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/text-embedding-004:embedContent"))
            .and(query_param("key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "embedding": { "values": [0.1, 0.2, 0.3] }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let service = GeminiEmbedding::new("test-key", &gemini_config(&server.uri())).unwrap();
        let vec = service.embed("beach").await.unwrap();
        assert_eq!(vec, vec![0.1, 0.2, 0.3]);
    }

    #[tokio::test]
    async fn test_gemini_embed_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("quota exceeded"))
            .mount(&server)
            .await;

        let service = GeminiEmbedding::new("k", &gemini_config(&server.uri())).unwrap();
        let err = service.embed("beach").await.unwrap_err();
        assert!(matches!(err, HearthError::Embedding(ref m) if m.contains("429")));
    }

    #[tokio::test]
    async fn test_gemini_embed_malformed_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let service = GeminiEmbedding::new("k", &gemini_config(&server.uri())).unwrap();
        assert!(service.embed("beach").await.is_err());
    }

    #[tokio::test]
    async fn test_gemini_embed_empty_text_skips_request() {
        let server = MockServer::start().await;
        let service = GeminiEmbedding::new("k", &gemini_config(&server.uri())).unwrap();
        assert!(service.embed("   ").await.is_err());
    }
}
