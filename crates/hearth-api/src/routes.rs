//! Router setup with all API routes and middleware.

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use tower::limit::GlobalConcurrencyLimitLayer;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use hearth_core::config::HearthConfig;
use hearth_core::error::HearthError;

use crate::handlers;
use crate::state::AppState;

/// Turns running at once across both turn routes.
const MAX_CONCURRENT_TURNS: usize = 64;

/// Create the axum Router with all routes and middleware.
pub fn create_router(state: AppState) -> Router {
    // Localhost origins on the configured port and port+1 (dev front-end).
    let port = state.config.general.port;
    let origins: Vec<HeaderValue> = [port, port.saturating_add(1)]
        .iter()
        .flat_map(|p| {
            [
                format!("http://127.0.0.1:{}", p),
                format!("http://localhost:{}", p),
            ]
        })
        .filter_map(|origin| origin.parse::<HeaderValue>().ok())
        .collect();
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT]);

    let turn_routes = Router::new()
        .route("/chat", post(handlers::chat))
        .route("/diagnostics", get(handlers::diagnostics))
        .layer(GlobalConcurrencyLimitLayer::new(MAX_CONCURRENT_TURNS));

    Router::new()
        .route("/health", get(handlers::health))
        .merge(turn_routes)
        .layer(DefaultBodyLimit::max(64 * 1024))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server on 127.0.0.1 and the configured port.
pub async fn start_server(config: &HearthConfig, state: AppState) -> Result<(), HearthError> {
    let addr = format!("127.0.0.1:{}", config.general.port);
    let router = create_router(state);

    tracing::info!("Starting API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| HearthError::Api(format!("Failed to bind: {}", e)))?;

    axum::serve(listener, router)
        .await
        .map_err(|e| HearthError::Api(format!("Server error: {}", e)))?;

    Ok(())
}
