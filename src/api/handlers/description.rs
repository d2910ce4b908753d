use axum::{
    extract::{Query, State},
    Json,
};

use crate::api::handlers::AppState;
use crate::api::middleware::AppError;
use crate::models::{DescriptionParams, UpdateDescriptionRequest};

/// Get the curated description of a table, empty when none was written
pub async fn get_description(
    State(state): State<AppState>,
    Query(params): Query<DescriptionParams>,
) -> Result<Json<serde_json::Value>, AppError> {
    let description = state
        .storage
        .get_description(&params.database_name, &params.table_name)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

    Ok(Json(serde_json::json!({
        "database_name": params.database_name,
        "table_name": params.table_name,
        "description": description.map(|d| d.description).unwrap_or_default(),
    })))
}

/// Create or replace the description of a table
pub async fn update_description(
    State(state): State<AppState>,
    Query(params): Query<DescriptionParams>,
    Json(payload): Json<UpdateDescriptionRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    if params.table_name.trim().is_empty() {
        return Err(AppError::Validation("Table name cannot be empty".to_string()));
    }
    let database = state.registry.get(&params.database_name)?;

    let description = state
        .storage
        .upsert_description(&database.name, params.table_name.trim(), &payload.description)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

    tracing::info!(
        "Updated description of {}.{}",
        description.database_name,
        description.table_name
    );

    Ok(Json(serde_json::json!({
        "message": "Description updated successfully",
        "description": description,
    })))
}
