//! Database schema migrations.
//!
//! Version 1 creates the listings and reservations tables.

use rusqlite::Connection;
use tracing::info;

use hearth_core::error::HearthError;

/// Run all pending database migrations.
pub fn run_migrations(conn: &Connection) -> Result<(), HearthError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version     INTEGER PRIMARY KEY NOT NULL,
            name        TEXT NOT NULL,
            applied_at  INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );",
    )
    .map_err(|e| HearthError::Storage(format!("Failed to create migrations table: {}", e)))?;

    let current_version: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .map_err(|e| HearthError::Storage(format!("Failed to query migration version: {}", e)))?;

    if current_version < 1 {
        apply_v1(conn)?;
        info!("Applied migration v1: listings_schema");
    }

    Ok(())
}

/// Version 1: listings with their reservations.
fn apply_v1(conn: &Connection) -> Result<(), HearthError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS listings (
            id              TEXT PRIMARY KEY NOT NULL,
            title           TEXT NOT NULL,
            description     TEXT NOT NULL DEFAULT '',
            category        TEXT NOT NULL DEFAULT '',
            price           INTEGER NOT NULL CHECK (price > 0),
            guest_count     INTEGER NOT NULL DEFAULT 1,
            room_count      INTEGER NOT NULL DEFAULT 1,
            bathroom_count  INTEGER NOT NULL DEFAULT 1,
            location_value  TEXT NOT NULL DEFAULT '',
            -- JSON array of amenity tags.
            amenities       TEXT NOT NULL DEFAULT '[]',
            created_at      INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );

        CREATE INDEX IF NOT EXISTS idx_listings_category
            ON listings (category COLLATE NOCASE);

        CREATE INDEX IF NOT EXISTS idx_listings_created_at
            ON listings (created_at DESC);

        -- Dates are ISO-8601 (YYYY-MM-DD); end_date is the check-out day.
        CREATE TABLE IF NOT EXISTS reservations (
            id          TEXT PRIMARY KEY NOT NULL,
            listing_id  TEXT NOT NULL REFERENCES listings (id) ON DELETE CASCADE,
            start_date  TEXT NOT NULL,
            end_date    TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_reservations_listing
            ON reservations (listing_id, start_date);

        INSERT INTO schema_migrations (version, name) VALUES (1, 'listings_schema');
        ",
    )
    .map_err(|e| HearthError::Storage(format!("Migration v1 failed: {}", e)))?;
    Ok(())
}
