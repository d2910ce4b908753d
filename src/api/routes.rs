use axum::{
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::api::handlers::{agent, catalog, description, multi_agent, query, AppState};

/// Create router with application state
pub fn create_router_with_state(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/api/agent", post(agent::run_agent))
        .route("/api/multi-agent", post(multi_agent::run_multi_agent))
        .route("/api/multi-agent/status", get(multi_agent::multi_agent_status))
        .route("/api/list_all_database", get(catalog::list_all_databases))
        .route("/api/list_all_tables", get(catalog::list_all_tables))
        .route("/api/retrieve-schema", get(catalog::retrieve_schema))
        .route("/api/test-connection", get(catalog::test_connection))
        .route("/api/describe-table-columns", get(catalog::describe_table_columns))
        .route("/api/get-companies", get(catalog::get_companies))
        .route("/api/sql-query-executor", post(query::execute_sql))
        .route("/api/get-description", get(description::get_description))
        .route("/api/update-description", post(description::update_description))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn root() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "message": "NL-to-SQL gateway is running",
    }))
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::middleware::AppError;
    use crate::config::Config;
    use crate::services::database::{DatabaseHandle, DatabaseRegistry};
    use crate::services::{CompletionClient, LlmService};
    use crate::storage::SqliteStorage;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use std::sync::Arc;
    use tempfile::{tempdir, TempDir};
    use tower::ServiceExt;

    struct CannedClient(&'static str);

    #[async_trait::async_trait]
    impl CompletionClient for CannedClient {
        async fn complete(&self, _system: &str, _user: &str) -> Result<String, AppError> {
            Ok(self.0.to_string())
        }
    }

    async fn app() -> (TempDir, Router) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("DB1.db");
        rusqlite::Connection::open(&path)
            .unwrap()
            .execute_batch(
                r#"
                CREATE TABLE Vw_GI_SalesDetails (CheckId TEXT PRIMARY KEY, Date TEXT NOT NULL);
                INSERT INTO Vw_GI_SalesDetails VALUES ('K-1', '01-01-2024');
                CREATE TABLE View_DiscountDetails (CompanyCode TEXT, SiteCode TEXT);
                INSERT INTO View_DiscountDetails VALUES ('PC01', 'S01');
                "#,
            )
            .unwrap();

        let config = Config::from_env().unwrap();
        let storage = Arc::new(SqliteStorage::new(dir.path().join("metadata.db")).await.unwrap());
        let registry = Arc::new(DatabaseRegistry::from_handles(vec![DatabaseHandle::sqlite(
            "DB1",
            path.to_string_lossy(),
        )]));
        let llm = LlmService::with_clients(
            Arc::new(CannedClient("SELECT CheckId, Date FROM Vw_GI_SalesDetails;")),
            Arc::new(CannedClient("One check was found.")),
        );

        let state = AppState::with_services(config, storage, registry, llm).unwrap();
        (dir, create_router_with_state(state))
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health_check() {
        let (_dir, app) = app().await;
        let response = app.oneshot(get_request("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"OK");
    }

    #[tokio::test]
    async fn test_agent_endpoint() {
        let (_dir, app) = app().await;
        let response = app
            .oneshot(post_json("/api/agent", serde_json::json!({"question": "list checks"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["sql_query"], "SELECT CheckId, Date FROM Vw_GI_SalesDetails");
        assert_eq!(body["data"], serde_json::json!([{"CheckId": "K-1", "Date": "01-01-2024"}]));
        assert_eq!(body["error_messages"], serde_json::json!([]));
        assert_eq!(body["answer"], "One check was found.");
    }

    #[tokio::test]
    async fn test_agent_rejects_blank_question() {
        let (_dir, app) = app().await;
        let response = app
            .oneshot(post_json("/api/agent", serde_json::json!({"question": "  "})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_catalog_endpoints() {
        let (_dir, app) = app().await;

        let body = body_json(app.clone().oneshot(get_request("/api/list_all_database")).await.unwrap()).await;
        assert_eq!(body["databases"], serde_json::json!(["DB1"]));

        let body = body_json(
            app.clone()
                .oneshot(get_request("/api/list_all_tables?db_name=DB1"))
                .await
                .unwrap(),
        )
        .await;
        assert_eq!(
            body["tables"],
            serde_json::json!(["View_DiscountDetails", "Vw_GI_SalesDetails"])
        );

        let body = body_json(
            app.clone()
                .oneshot(get_request(
                    "/api/retrieve-schema?db_name=DB1&table_name=Vw_GI_SalesDetails",
                ))
                .await
                .unwrap(),
        )
        .await;
        assert_eq!(body["schema"][0]["column_name"], "CheckId");
        assert_eq!(body["schema"][0]["primary_key"], true);
        assert_eq!(body["schema"][1]["notnull"], true);

        let response = app
            .clone()
            .oneshot(get_request("/api/retrieve-schema?db_name=DB1&table_name=missing"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app.oneshot(get_request("/api/test-connection")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["database"], "DB1");
        assert_eq!(body["database_type"], "sqlite");
    }

    #[tokio::test]
    async fn test_describe_table_columns_and_companies() {
        let (_dir, app) = app().await;

        let body = body_json(
            app.clone()
                .oneshot(get_request(
                    "/api/describe-table-columns?db_name=DB1&table_name=Vw_GI_SalesDetails",
                ))
                .await
                .unwrap(),
        )
        .await;
        assert_eq!(
            body["description"],
            "Table Vw_GI_SalesDetails contains the following columns:\n- CheckId (TEXT): Column data\n- Date (TEXT): Column data\n"
        );

        let response = app
            .clone()
            .oneshot(get_request("/api/describe-table-columns?db_name=DB1&table_name=missing"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = body_json(app.oneshot(get_request("/api/get-companies")).await.unwrap()).await;
        assert_eq!(
            body["companies"],
            serde_json::json!([{"companyCode": "PC01", "siteCode": "S01"}])
        );
    }

    #[tokio::test]
    async fn test_multi_agent_endpoints() {
        let (_dir, app) = app().await;

        let response = app
            .clone()
            .oneshot(post_json(
                "/api/multi-agent",
                serde_json::json!({"question": "list checks", "company_code": "PC01", "company_name": "UK"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["selected_table"], "Vw_GI_SalesDetails");
        assert_eq!(body["routing_decision"]["confidence"], "medium");
        assert_eq!(body["sql_query"], "SELECT CheckId, Date FROM Vw_GI_SalesDetails");
        assert_eq!(body["data"], serde_json::json!([{"CheckId": "K-1", "Date": "01-01-2024"}]));
        assert_eq!(body["answer"], "One check was found.");
        assert_eq!(body["agent_system"], "multi-agent-orchestration");
        assert_eq!(body["company_info"]["country"], "UK");

        let body = body_json(app.oneshot(get_request("/api/multi-agent/status")).await.unwrap()).await;
        assert_eq!(body["status"], "operational");
        assert_eq!(body["agents"][0], "router-agent");
        assert_eq!(
            body["available_tables"],
            serde_json::json!(["View_DiscountDetails", "Vw_GI_SalesDetails"])
        );
    }

    #[tokio::test]
    async fn test_sql_query_executor() {
        let (_dir, app) = app().await;
        let response = app
            .clone()
            .oneshot(post_json(
                "/api/sql-query-executor",
                serde_json::json!({"db_name": "DB1", "query": "SELECT CheckId FROM Vw_GI_SalesDetails;"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["message"], "Query executed successfully. Found 1 rows.");
        assert_eq!(body["data"][0]["CheckId"], "K-1");

        let response = app
            .clone()
            .oneshot(post_json(
                "/api/sql-query-executor",
                serde_json::json!({"db_name": "DB1", "query": "DELETE FROM Vw_GI_SalesDetails"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"]["code"], "INVALID_SQL");

        let response = app
            .oneshot(post_json(
                "/api/sql-query-executor",
                serde_json::json!({"db_name": "Nowhere", "query": "SELECT 1"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_description_round_trip() {
        let (_dir, app) = app().await;

        let body = body_json(
            app.clone()
                .oneshot(get_request(
                    "/api/get-description?database_name=DB1&table_name=Vw_GI_SalesDetails",
                ))
                .await
                .unwrap(),
        )
        .await;
        assert_eq!(body["description"], "");

        let response = app
            .clone()
            .oneshot(post_json(
                "/api/update-description?database_name=DB1&table_name=Vw_GI_SalesDetails",
                serde_json::json!({"description": "Sales by check line"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(
            app.oneshot(get_request(
                "/api/get-description?database_name=DB1&table_name=Vw_GI_SalesDetails",
            ))
            .await
            .unwrap(),
        )
        .await;
        assert_eq!(body["description"], "Sales by check line");
    }
}
