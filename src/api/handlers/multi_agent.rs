use axum::{extract::State, Json};

use crate::api::handlers::AppState;
use crate::api::middleware::AppError;
use crate::models::{MultiAgentRequest, MultiAgentResponse};
use crate::services::MultiAgentStatus;

/// Answer a question from the single table the router picks
pub async fn run_multi_agent(
    State(state): State<AppState>,
    Json(payload): Json<MultiAgentRequest>,
) -> Result<Json<MultiAgentResponse>, AppError> {
    tracing::info!(
        "Multi-agent request received (company: {})",
        payload.company_code.as_deref().unwrap_or("any")
    );

    let response = state.multi_agent.answer(&payload).await.map_err(|e| {
        tracing::error!("Multi-agent request failed: {}", e);
        e
    })?;

    Ok(Json(response))
}

pub async fn multi_agent_status(State(state): State<AppState>) -> Json<MultiAgentStatus> {
    Json(state.multi_agent.status().await)
}
