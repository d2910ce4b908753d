use axum::{
    extract::{Query, State},
    Json,
};

use crate::api::handlers::AppState;
use crate::api::middleware::AppError;
use crate::models::{ListTablesParams, RetrieveSchemaParams};
use crate::services::database::create_adapter;

/// List every database the gateway can route to, default first
pub async fn list_all_databases(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    Ok(Json(serde_json::json!({
        "databases": state.registry.names(),
    })))
}

/// List tables and views of one database
pub async fn list_all_tables(
    State(state): State<AppState>,
    Query(params): Query<ListTablesParams>,
) -> Result<Json<serde_json::Value>, AppError> {
    tracing::info!("Listing tables of {}", params.db_name);

    let tables = state.catalog.list_tables(&params.db_name).await?;

    Ok(Json(serde_json::json!({
        "tables": tables,
    })))
}

pub async fn retrieve_schema(
    State(state): State<AppState>,
    Query(params): Query<RetrieveSchemaParams>,
) -> Result<Json<serde_json::Value>, AppError> {
    tracing::info!("Retrieving schema of {}.{}", params.db_name, params.table_name);

    let columns = state
        .catalog
        .describe_table(&params.db_name, &params.table_name)
        .await?;

    Ok(Json(serde_json::json!({
        "schema": columns,
    })))
}

pub async fn describe_table_columns(
    State(state): State<AppState>,
    Query(params): Query<RetrieveSchemaParams>,
) -> Result<Json<serde_json::Value>, AppError> {
    let description = state
        .catalog
        .column_summary(&params.db_name, &params.table_name)
        .await?;

    Ok(Json(serde_json::json!({
        "description": description,
    })))
}

/// Company and site codes available as tenant scopes
pub async fn get_companies(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    let tenant_table = &state.config.routing.tenant_table;
    let companies = state.catalog.companies(tenant_table).await?;
    tracing::info!("Found {} company/site pairs in {}", companies.len(), tenant_table);

    Ok(Json(serde_json::json!({
        "companies": companies,
    })))
}

/// Check that the default database answers a trivial query
pub async fn test_connection(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    let handle = state
        .registry
        .default_database()
        .ok_or_else(|| AppError::NotFound("No databases are configured".to_string()))?;

    let adapter = create_adapter(handle)?;
    adapter.test_connection().await?;

    tracing::info!("Connection test succeeded for {}", handle.display_location());

    Ok(Json(serde_json::json!({
        "status": "success",
        "database": handle.name,
        "database_type": handle.kind.as_str(),
        "message": "Connection successful",
    })))
}
