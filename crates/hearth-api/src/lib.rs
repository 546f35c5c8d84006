//! Hearth API crate - thin axum HTTP wrapper around the conversation
//! pipeline.
//!
//! Exposes `POST /chat` (one turn), `GET /health` and `GET /diagnostics`.

pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::{create_router, start_server};
pub use state::AppState;
