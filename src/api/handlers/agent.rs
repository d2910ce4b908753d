use axum::{extract::State, Json};

use crate::api::handlers::AppState;
use crate::api::middleware::AppError;
use crate::models::{AgentRequest, AgentResponse};

/// Answer a natural language question across every known database
pub async fn run_agent(
    State(state): State<AppState>,
    Json(payload): Json<AgentRequest>,
) -> Result<Json<AgentResponse>, AppError> {
    tracing::info!("Agent request received");

    let response = state.agent.answer(&payload).await.map_err(|e| {
        tracing::error!("Agent request failed: {}", e);
        e
    })?;

    Ok(Json(response))
}
