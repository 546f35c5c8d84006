//! Listing repository.
//!
//! `ListingRepository` is the read surface the conversation pipeline
//! depends on; `SqliteListingRepository` implements it with raw SQL over
//! the shared [`Database`].

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, TimeZone, Utc};
use rusqlite::types::Value;
use rusqlite::Connection;
use tracing::debug;

use hearth_core::error::HearthError;
use hearth_core::types::{Listing, ListingFilter, Reservation};

use crate::db::Database;

const LISTING_COLUMNS: &str = "id, title, description, category, price, guest_count, room_count, \
     bathroom_count, location_value, amenities, created_at";

/// Read access to listing records and their reservations.
#[async_trait]
pub trait ListingRepository: Send + Sync {
    /// Listings matching every set field of `filter`, newest first.
    async fn find(&self, filter: &ListingFilter) -> Result<Vec<Listing>, HearthError>;

    async fn find_by_id(&self, id: &str) -> Result<Option<Listing>, HearthError>;

    /// Fetch several listings, returned in the order of `ids`. Unknown ids
    /// are skipped.
    async fn find_by_ids(&self, ids: &[String]) -> Result<Vec<Listing>, HearthError>;

    /// Case-insensitive title lookup: an exact match wins, otherwise the
    /// shortest title containing `title`.
    async fn find_by_title(&self, title: &str) -> Result<Option<Listing>, HearthError>;

    async fn find_all(&self) -> Result<Vec<Listing>, HearthError> {
        self.find(&ListingFilter::default()).await
    }

    /// Listings whose title, description or location contains any of
    /// `tokens` (case-insensitive), newest first.
    async fn search_keywords(
        &self,
        tokens: &[String],
        limit: usize,
    ) -> Result<Vec<Listing>, HearthError>;

    async fn count(&self) -> Result<u64, HearthError>;
}

/// SQLite implementation of [`ListingRepository`].
pub struct SqliteListingRepository {
    db: Arc<Database>,
}

impl SqliteListingRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Insert or replace a listing together with its reservations.
    pub fn save(&self, listing: &Listing) -> Result<(), HearthError> {
        let amenities = serde_json::to_string(&listing.amenities)?;
        self.db.with_conn_mut(|conn| {
            let tx = conn
                .transaction()
                .map_err(|e| HearthError::Storage(format!("Failed to begin transaction: {}", e)))?;
            tx.execute(
                "INSERT OR REPLACE INTO listings
                 (id, title, description, category, price, guest_count, room_count,
                  bathroom_count, location_value, amenities, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                rusqlite::params![
                    listing.id,
                    listing.title,
                    listing.description,
                    listing.category,
                    listing.price,
                    listing.guest_count,
                    listing.room_count,
                    listing.bathroom_count,
                    listing.location_value,
                    amenities,
                    listing.created_at.timestamp(),
                ],
            )
            .map_err(|e| HearthError::Storage(format!("Failed to save listing: {}", e)))?;

            tx.execute(
                "DELETE FROM reservations WHERE listing_id = ?1",
                rusqlite::params![listing.id],
            )
            .map_err(|e| HearthError::Storage(format!("Failed to clear reservations: {}", e)))?;

            for reservation in &listing.reservations {
                insert_reservation(&tx, &listing.id, reservation)?;
            }

            tx.commit()
                .map_err(|e| HearthError::Storage(format!("Failed to commit listing: {}", e)))?;
            Ok(())
        })
    }

    /// Attach a reservation to an existing listing.
    pub fn add_reservation(
        &self,
        listing_id: &str,
        reservation: &Reservation,
    ) -> Result<(), HearthError> {
        self.db
            .with_conn(|conn| insert_reservation(conn, listing_id, reservation))
    }

    fn query_listings(
        &self,
        where_clause: &str,
        params: Vec<Value>,
        order_limit: &str,
    ) -> Result<Vec<Listing>, HearthError> {
        let sql = format!(
            "SELECT {} FROM listings {} {}",
            LISTING_COLUMNS, where_clause, order_limit
        );
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(&sql)
                .map_err(|e| HearthError::Storage(e.to_string()))?;
            let rows = stmt
                .query_map(rusqlite::params_from_iter(params), |row| {
                    Ok(row_to_listing(row))
                })
                .map_err(|e| HearthError::Storage(e.to_string()))?;

            let mut listings = Vec::new();
            for row in rows {
                let listing = row.map_err(|e| HearthError::Storage(e.to_string()))??;
                listings.push(listing);
            }
            attach_reservations(conn, &mut listings)?;
            Ok(listings)
        })
    }
}

#[async_trait]
impl ListingRepository for SqliteListingRepository {
    async fn find(&self, filter: &ListingFilter) -> Result<Vec<Listing>, HearthError> {
        let mut clauses: Vec<&str> = Vec::new();
        let mut params: Vec<Value> = Vec::new();

        if let Some(category) = &filter.category {
            clauses.push("category = ? COLLATE NOCASE");
            params.push(Value::Text(category.clone()));
        }
        if let Some(location) = &filter.location {
            clauses.push("location_value = ? COLLATE NOCASE");
            params.push(Value::Text(location.clone()));
        }
        if let Some(min) = filter.min_price {
            clauses.push("price >= ?");
            params.push(Value::Integer(min.into()));
        }
        if let Some(max) = filter.max_price {
            clauses.push("price <= ?");
            params.push(Value::Integer(max.into()));
        }
        if let Some(guests) = filter.min_guests {
            clauses.push("guest_count >= ?");
            params.push(Value::Integer(guests.into()));
        }
        if let Some(rooms) = filter.min_rooms {
            clauses.push("room_count >= ?");
            params.push(Value::Integer(rooms.into()));
        }

        let where_clause = if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        };
        let listings =
            self.query_listings(&where_clause, params, "ORDER BY created_at DESC, id")?;
        debug!(count = listings.len(), "Listings matched filter");
        Ok(listings)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Listing>, HearthError> {
        let mut found = self.query_listings(
            "WHERE id = ?",
            vec![Value::Text(id.to_string())],
            "LIMIT 1",
        )?;
        Ok(found.pop())
    }

    async fn find_by_ids(&self, ids: &[String]) -> Result<Vec<Listing>, HearthError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = vec!["?"; ids.len()].join(", ");
        let params = ids.iter().cloned().map(Value::Text).collect();
        let found = self.query_listings(&format!("WHERE id IN ({})", placeholders), params, "")?;

        let mut by_id: HashMap<String, Listing> =
            found.into_iter().map(|l| (l.id.clone(), l)).collect();
        Ok(ids.iter().filter_map(|id| by_id.remove(id)).collect())
    }

    async fn find_by_title(&self, title: &str) -> Result<Option<Listing>, HearthError> {
        let title = title.trim();
        if title.is_empty() {
            return Ok(None);
        }
        let mut found = self.query_listings(
            "WHERE title = ? COLLATE NOCASE",
            vec![Value::Text(title.to_string())],
            "ORDER BY created_at DESC, id LIMIT 1",
        )?;
        if let Some(listing) = found.pop() {
            return Ok(Some(listing));
        }

        // LIKE narrows the candidates; whole-word matching picks among them.
        let candidates = self.query_listings(
            "WHERE LOWER(title) LIKE ? ESCAPE '\\'",
            vec![Value::Text(like_pattern(title))],
            "ORDER BY LENGTH(title), id",
        )?;
        Ok(candidates.into_iter().find(|l| l.title_matches(title)))
    }

    async fn search_keywords(
        &self,
        tokens: &[String],
        limit: usize,
    ) -> Result<Vec<Listing>, HearthError> {
        if tokens.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }
        let mut clauses = Vec::with_capacity(tokens.len());
        let mut params = Vec::with_capacity(tokens.len() * 3);
        for token in tokens {
            clauses.push(
                "(LOWER(title) LIKE ? ESCAPE '\\' \
                 OR LOWER(description) LIKE ? ESCAPE '\\' \
                 OR LOWER(location_value) LIKE ? ESCAPE '\\')",
            );
            let pattern = like_pattern(token);
            for _ in 0..3 {
                params.push(Value::Text(pattern.clone()));
            }
        }
        let where_clause = format!("WHERE {}", clauses.join(" OR "));
        let order_limit = format!("ORDER BY created_at DESC, id LIMIT {}", limit);
        self.query_listings(&where_clause, params, &order_limit)
    }

    async fn count(&self) -> Result<u64, HearthError> {
        self.db.with_conn(|conn| {
            let count: i64 = conn
                .query_row("SELECT COUNT(*) FROM listings", [], |row| row.get(0))
                .map_err(|e| HearthError::Storage(e.to_string()))?;
            Ok(count as u64)
        })
    }
}

// ============================================================================
// Helper functions for row-to-entity conversion.
// ============================================================================

fn insert_reservation(
    conn: &Connection,
    listing_id: &str,
    reservation: &Reservation,
) -> Result<(), HearthError> {
    conn.execute(
        "INSERT OR REPLACE INTO reservations (id, listing_id, start_date, end_date)
         VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![
            reservation.id,
            listing_id,
            reservation.start_date.format("%Y-%m-%d").to_string(),
            reservation.end_date.format("%Y-%m-%d").to_string(),
        ],
    )
    .map_err(|e| HearthError::Storage(format!("Failed to save reservation: {}", e)))?;
    Ok(())
}

fn attach_reservations(conn: &Connection, listings: &mut [Listing]) -> Result<(), HearthError> {
    let mut stmt = conn
        .prepare(
            "SELECT id, start_date, end_date FROM reservations
             WHERE listing_id = ?1 ORDER BY start_date, id",
        )
        .map_err(|e| HearthError::Storage(e.to_string()))?;

    for listing in listings.iter_mut() {
        let rows = stmt
            .query_map(rusqlite::params![listing.id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })
            .map_err(|e| HearthError::Storage(e.to_string()))?;

        for row in rows {
            let (id, start, end) = row.map_err(|e| HearthError::Storage(e.to_string()))?;
            listing
                .reservations
                .push(Reservation::new(id, parse_date(&start)?, parse_date(&end)?));
        }
    }
    Ok(())
}

fn row_to_listing(row: &rusqlite::Row<'_>) -> Result<Listing, HearthError> {
    let storage = |e: rusqlite::Error| HearthError::Storage(e.to_string());

    let amenities_json: String = row.get(9).map_err(storage)?;
    let amenities: BTreeSet<String> = serde_json::from_str(&amenities_json)
        .map_err(|e| HearthError::Storage(format!("Invalid amenities JSON: {}", e)))?;
    let created_at: i64 = row.get(10).map_err(storage)?;

    Ok(Listing {
        id: row.get(0).map_err(storage)?,
        title: row.get(1).map_err(storage)?,
        description: row.get(2).map_err(storage)?,
        category: row.get(3).map_err(storage)?,
        price: row.get(4).map_err(storage)?,
        guest_count: row.get(5).map_err(storage)?,
        room_count: row.get(6).map_err(storage)?,
        bathroom_count: row.get(7).map_err(storage)?,
        location_value: row.get(8).map_err(storage)?,
        amenities,
        reservations: Vec::new(),
        created_at: Utc
            .timestamp_opt(created_at, 0)
            .single()
            .unwrap_or_default(),
    })
}

fn parse_date(value: &str) -> Result<NaiveDate, HearthError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|e| HearthError::Storage(format!("Invalid date '{}': {}", value, e)))
}

/// Lowercased `%token%` with LIKE wildcards escaped.
fn like_pattern(token: &str) -> String {
    let escaped = token
        .to_lowercase()
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn make_repo() -> SqliteListingRepository {
        SqliteListingRepository::new(Arc::new(Database::in_memory().unwrap()))
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn make_listing(id: &str, title: &str, category: &str, price: u32, age_secs: i64) -> Listing {
        let mut listing = Listing::new(id, title, category, price)
            .with_description(format!("A lovely {} stay", category.to_lowercase()))
            .with_location("PT")
            .with_amenities(["wifi"]);
        listing.created_at = Utc.timestamp_opt(1_700_000_000 - age_secs, 0).unwrap();
        listing
    }

    // ---- save / find_by_id ----

    #[tokio::test]
    async fn test_save_and_find_by_id() {
        let repo = make_repo();
        let listing = make_listing("l1", "Seaside Retreat 1", "Beach", 180, 0)
            .with_reservation(Reservation::new("r1", date(2025, 7, 1), date(2025, 7, 4)));
        repo.save(&listing).unwrap();

        let found = repo.find_by_id("l1").await.unwrap().unwrap();
        assert_eq!(found.title, "Seaside Retreat 1");
        assert_eq!(found.price, 180);
        assert!(found.amenities.contains("wifi"));
        assert_eq!(found.reservations.len(), 1);
        assert_eq!(found.reservations[0].end_date, date(2025, 7, 4));
    }

    #[tokio::test]
    async fn test_find_nonexistent() {
        let repo = make_repo();
        assert!(repo.find_by_id("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_replaces_reservations() {
        let repo = make_repo();
        let mut listing = make_listing("l1", "Cabin", "Lake", 90, 0)
            .with_reservation(Reservation::new("r1", date(2025, 1, 1), date(2025, 1, 3)));
        repo.save(&listing).unwrap();

        listing.reservations.clear();
        repo.save(&listing).unwrap();
        let found = repo.find_by_id("l1").await.unwrap().unwrap();
        assert!(found.reservations.is_empty());
    }

    #[tokio::test]
    async fn test_add_reservation() {
        let repo = make_repo();
        repo.save(&make_listing("l1", "Cabin", "Lake", 90, 0)).unwrap();
        let start = date(2025, 3, 10);
        repo.add_reservation("l1", &Reservation::new("r9", start, start + Duration::days(2)))
            .unwrap();
        let found = repo.find_by_id("l1").await.unwrap().unwrap();
        assert_eq!(found.reservations[0].id, "r9");
    }

    // ---- find(filter) ----

    #[tokio::test]
    async fn test_find_with_filter() {
        let repo = make_repo();
        repo.save(&make_listing("a", "Beach House 1", "Beach", 120, 30)).unwrap();
        repo.save(&make_listing("b", "Beach House 2", "Beach", 400, 20)).unwrap();
        repo.save(&make_listing("c", "Ski Chalet 3", "Skiing", 150, 10)).unwrap();

        let beach = repo
            .find(&ListingFilter {
                category: Some("beach".into()),
                max_price: Some(200),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(beach.len(), 1);
        assert_eq!(beach[0].id, "a");

        let all = repo.find_all().await.unwrap();
        // Newest first.
        let ids: Vec<_> = all.iter().map(|l| l.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "b", "a"]);
    }

    // ---- find_by_ids / find_by_title ----

    #[tokio::test]
    async fn test_find_by_title_partial_needs_whole_words() {
        let repo = make_repo();
        repo.save(&make_listing("b", "Luxury Villa 16", "Lux", 600, 0)).unwrap();

        assert!(repo.find_by_title("Luxury Villa 1").await.unwrap().is_none());
        let found = repo.find_by_title("villa 16").await.unwrap().unwrap();
        assert_eq!(found.id, "b");
    }

    #[tokio::test]
    async fn test_find_by_ids_preserves_order_and_drops_unknown() {
        let repo = make_repo();
        repo.save(&make_listing("a", "A", "Beach", 100, 0)).unwrap();
        repo.save(&make_listing("b", "B", "Beach", 100, 0)).unwrap();

        let ids = vec!["b".to_string(), "ghost".to_string(), "a".to_string()];
        let found = repo.find_by_ids(&ids).await.unwrap();
        let got: Vec<_> = found.iter().map(|l| l.id.as_str()).collect();
        assert_eq!(got, vec!["b", "a"]);
    }

    #[tokio::test]
    async fn test_find_by_title_exact_then_contains() {
        let repo = make_repo();
        repo.save(&make_listing("a", "Luxury Villa 1", "Lux", 500, 0)).unwrap();
        repo.save(&make_listing("b", "Luxury Villa 12", "Lux", 600, 0)).unwrap();

        let exact = repo.find_by_title("luxury villa 1").await.unwrap().unwrap();
        assert_eq!(exact.id, "a");

        let partial = repo.find_by_title("Villa 12").await.unwrap().unwrap();
        assert_eq!(partial.id, "b");

        assert!(repo.find_by_title("Igloo").await.unwrap().is_none());
        assert!(repo.find_by_title("Villa 1").await.unwrap().is_some_and(|l| l.id == "a"));
        assert!(repo.find_by_title("  ").await.unwrap().is_none());
    }

    // ---- search_keywords ----

    #[tokio::test]
    async fn test_search_keywords_any_token() {
        let repo = make_repo();
        repo.save(&make_listing("a", "Seaside Retreat 11", "Beach", 100, 0)).unwrap();
        repo.save(&make_listing("b", "Desert Lodge 14", "Desert", 100, 0)).unwrap();
        repo.save(&make_listing("c", "City Studio 6", "Modern", 100, 0)).unwrap();

        let tokens = vec!["beach".to_string(), "desert".to_string()];
        let found = repo.search_keywords(&tokens, 20).await.unwrap();
        let mut ids: Vec<_> = found.iter().map(|l| l.id.clone()).collect();
        ids.sort();
        assert_eq!(ids, vec!["a", "b"]);

        let capped = repo.search_keywords(&tokens, 1).await.unwrap();
        assert_eq!(capped.len(), 1);
    }

    #[tokio::test]
    async fn test_search_keywords_escapes_wildcards() {
        let repo = make_repo();
        repo.save(&make_listing("a", "Cabin", "Lake", 100, 0)).unwrap();
        let found = repo.search_keywords(&["%".to_string()], 20).await.unwrap();
        assert!(found.is_empty());
        assert!(repo.search_keywords(&[], 20).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_count() {
        let repo = make_repo();
        assert_eq!(repo.count().await.unwrap(), 0);
        repo.save(&make_listing("a", "A", "Beach", 100, 0)).unwrap();
        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[test]
    fn test_like_pattern() {
        assert_eq!(like_pattern("Beach"), "%beach%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
    }
}
