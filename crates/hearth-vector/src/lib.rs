//! Hearth Vector crate - embedding services, vector index and listing indexer.
//!
//! Provides the embedding service abstraction with a Gemini backend and a
//! deterministic hashing backend, an in-memory cosine-similarity index, and
//! the indexer that turns listings into searchable vectors.

pub mod embedding;
pub mod index;
pub mod indexer;

pub use embedding::{DynEmbeddingService, EmbeddingService, GeminiEmbedding, HashingEmbedding};
pub use index::{InMemoryVectorIndex, VectorMatch, VectorSearch};
pub use indexer::{listing_document, IndexReport, ListingIndexer};
