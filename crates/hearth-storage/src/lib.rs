//! Hearth Storage crate - SQLite-backed listing repository.
//!
//! Provides a WAL-mode SQLite database with migrations, the
//! `ListingRepository` abstraction consumed by the conversation pipeline,
//! and deterministic demo fixtures.

pub mod db;
pub mod fixtures;
pub mod migrations;
pub mod repository;

pub use db::Database;
pub use fixtures::seed_demo_listings;
pub use repository::{ListingRepository, SqliteListingRepository};
