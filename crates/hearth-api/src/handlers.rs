//! Route handler functions.

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use hearth_chat::{AgentTraceStep, TurnResponse};

use crate::error::ApiError;
use crate::state::AppState;

/// Utterance sent by the diagnostics probe turn.
const PROBE_MESSAGE: &str = "beach houses";

// =============================================================================
// Request / response types
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub message: String,
    /// A fresh id is issued when absent.
    pub conversation_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub conversation_id: String,
    #[serde(flatten)]
    pub turn: TurnResponse,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub active_conversations: u64,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticsResponse {
    pub listing_count: u64,
    pub vector_count: u64,
    pub intent_strategy: String,
    pub rerank_strategy: String,
    pub probe_message: String,
    pub probe_listing_count: usize,
    pub probe_trace: Vec<AgentTraceStep>,
}

// =============================================================================
// Handler functions
// =============================================================================

/// POST /chat - run one conversational turn.
pub async fn chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    state.orchestrator.validate(&req.message)?;

    let conversation_id = req
        .conversation_id
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let turn = state
        .orchestrator
        .handle_turn(&req.message, &conversation_id)
        .await;
    info!(
        conversation_id = %conversation_id,
        listings = turn.listings.len(),
        "Chat turn served"
    );

    Ok(Json(ChatResponse {
        conversation_id,
        turn,
    }))
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        active_conversations: state.orchestrator.store().len() as u64,
    })
}

/// GET /diagnostics - collaborator counts, strategies and a probe turn.
///
/// The probe runs in a throwaway conversation that is removed afterwards.
pub async fn diagnostics(
    State(state): State<AppState>,
) -> Result<Json<DiagnosticsResponse>, ApiError> {
    let listing_count = state.repo.count().await?;
    let probe_id = format!("diagnostics-{}", Uuid::new_v4());
    let probe = state
        .orchestrator
        .handle_turn(PROBE_MESSAGE, &probe_id)
        .await;
    state.orchestrator.store().remove(&probe_id)?;

    Ok(Json(DiagnosticsResponse {
        listing_count,
        vector_count: state.vector_index.len() as u64,
        intent_strategy: state.orchestrator.intent_strategy().to_string(),
        rerank_strategy: state.orchestrator.rerank_strategy().to_string(),
        probe_message: PROBE_MESSAGE.to_string(),
        probe_listing_count: probe.listings.len(),
        probe_trace: probe.trace,
    }))
}
