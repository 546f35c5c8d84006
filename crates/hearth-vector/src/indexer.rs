//! Listing indexer.
//!
//! Builds the embedding document for each listing, embeds it, and upserts
//! the vector into the index under the listing id.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use hearth_core::error::HearthError;
use hearth_core::types::Listing;
use hearth_storage::ListingRepository;

use crate::embedding::DynEmbeddingService;
use crate::index::InMemoryVectorIndex;

/// Outcome of indexing a batch of listings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexReport {
    pub indexed: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Text that represents a listing in vector space.
pub fn listing_document(listing: &Listing) -> String {
    let mut doc = format!(
        "{}\n{}\nCategory: {}\nLocation: {}\nPrice: ${} per night\n{} bedrooms, {} bathrooms\nAccommodates {} guests",
        listing.title,
        listing.description,
        listing.category,
        listing.location_value,
        listing.price,
        listing.room_count,
        listing.bathroom_count,
        listing.guest_count,
    );
    if !listing.amenities.is_empty() {
        let amenities: Vec<&str> = listing.amenities.iter().map(String::as_str).collect();
        doc.push_str("\nAmenities: ");
        doc.push_str(&amenities.join(", "));
    }
    doc
}

/// Embeds listings into an [`InMemoryVectorIndex`].
pub struct ListingIndexer {
    embedder: Arc<dyn DynEmbeddingService>,
    index: InMemoryVectorIndex,
}

impl ListingIndexer {
    pub fn new(embedder: Arc<dyn DynEmbeddingService>, index: InMemoryVectorIndex) -> Self {
        Self { embedder, index }
    }

    /// Index one listing. Returns `Ok(false)` when it has no text to embed.
    pub async fn index_listing(&self, listing: &Listing) -> Result<bool, HearthError> {
        if listing.title.trim().is_empty() && listing.description.trim().is_empty() {
            debug!(listing_id = %listing.id, "Skipping listing with no text");
            return Ok(false);
        }
        let document = listing_document(listing);
        let vector = self.embedder.embed_boxed(&document).await?;
        self.index.upsert(listing.id.clone(), vector)?;
        Ok(true)
    }

    /// Index every listing in the repository. Per-listing embedding failures
    /// are counted, not propagated.
    pub async fn index_all(&self, repo: &dyn ListingRepository) -> Result<IndexReport, HearthError> {
        let listings = repo.find_all().await?;
        let mut report = IndexReport::default();

        for listing in &listings {
            match self.index_listing(listing).await {
                Ok(true) => report.indexed += 1,
                Ok(false) => report.skipped += 1,
                Err(e) => {
                    warn!(listing_id = %listing.id, error = %e, "Failed to index listing");
                    report.failed += 1;
                }
            }
        }

        info!(
            indexed = report.indexed,
            skipped = report.skipped,
            failed = report.failed,
            "Listing index built"
        );
        Ok(report)
    }
}
