use axum::{extract::State, Json};

use crate::api::handlers::AppState;
use crate::api::middleware::AppError;
use crate::models::SqlQueryRequest;
use crate::services::database::create_adapter;
use crate::validation::SqlValidator;

/// Execute a user-written SELECT against one named database
pub async fn execute_sql(
    State(state): State<AppState>,
    Json(payload): Json<SqlQueryRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    tracing::info!("Executing SQL query on {}", payload.db_name);

    let sanitized_query = payload.query.trim();
    if sanitized_query.is_empty() {
        return Err(AppError::Validation("SQL query cannot be empty".to_string()));
    }

    let handle = state.registry.get(&payload.db_name)?;
    let sql = SqlValidator::validate_select_only(sanitized_query, handle.kind)?;

    let adapter = create_adapter(handle)?;
    let output = adapter.execute_query(&sql).await?;

    let data: Vec<serde_json::Map<String, serde_json::Value>> = output
        .rows
        .iter()
        .map(|row| {
            output
                .columns
                .iter()
                .cloned()
                .zip(row.iter().cloned())
                .collect()
        })
        .collect();

    Ok(Json(serde_json::json!({
        "data": data,
        "message": format!("Query executed successfully. Found {} rows.", data.len()),
        "query": sql,
    })))
}
