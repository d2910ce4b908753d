// Single-table pipeline: route the question to one table, then query only it
use crate::api::middleware::AppError;
use crate::config::RoutingConfig;
use crate::models::{
    CompanyInfo, DatabaseSchema, DescriptionPayload, MultiAgentRequest, MultiAgentResponse, RoutingDecision,
    TableSchema, TenantScope,
};
use crate::services::agent_service::{NO_QUERIES_ANSWER, NO_QUERIES_STATUS};
use crate::services::batch::extract_statements;
use crate::services::catalog::{SchemaCatalog, TableIndex, TableLocation};
use crate::services::executor::{QueryExecutor, ResultFormat};
use crate::services::llm_service::{LlmService, NO_DATA_ANSWER};
use crate::services::normalizer::ResultNormalizer;
use crate::storage::SqliteStorage;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

pub const AGENT_SYSTEM: &str = "multi-agent-orchestration";

pub const AGENTS: [&str; 4] = [
    "router-agent",
    "table-specialist-agent",
    "query-executor",
    "description-agent",
];

#[derive(Debug, Clone, Serialize)]
pub struct MultiAgentStatus {
    pub status: &'static str,
    pub system: &'static str,
    pub agents: Vec<&'static str>,
    pub available_tables: Vec<String>,
}

/// Read a routing reply. Falls back to a table named anywhere in the text,
/// then to the first indexed table.
pub fn parse_routing_decision(reply: &str, index: &TableIndex) -> Option<RoutingDecision> {
    let json = match (reply.find('{'), reply.rfind('}')) {
        (Some(start), Some(end)) if start < end => &reply[start..=end],
        _ => reply,
    };
    if let Ok(decision) = serde_json::from_str::<RoutingDecision>(json) {
        if !decision.selected_table.trim().is_empty() {
            return Some(decision);
        }
    }

    let lowered = reply.to_lowercase();
    let mentioned = index
        .entries()
        .iter()
        .filter(|entry| lowered.contains(&entry.key))
        .max_by_key(|entry| entry.key.len());
    if let Some(entry) = mentioned {
        return Some(RoutingDecision {
            selected_table: entry.name.clone(),
            confidence: "medium".to_string(),
            reasoning: "Extracted from response text".to_string(),
        });
    }

    index.entries().first().map(|entry| RoutingDecision {
        selected_table: entry.name.clone(),
        confidence: "low".to_string(),
        reasoning: "Default fallback".to_string(),
    })
}

pub struct MultiAgentService {
    catalog: Arc<SchemaCatalog>,
    storage: Arc<SqliteStorage>,
    llm: LlmService,
    executor: QueryExecutor,
    normalizer: ResultNormalizer,
    row_cap: u32,
}

impl MultiAgentService {
    pub fn new(
        routing: &RoutingConfig,
        catalog: Arc<SchemaCatalog>,
        storage: Arc<SqliteStorage>,
        llm: LlmService,
    ) -> Result<Self, AppError> {
        let executor = QueryExecutor::new(
            Arc::clone(catalog.registry()),
            ResultFormat::from_str(&routing.result_format)?,
        );
        Ok(Self {
            catalog,
            storage,
            llm,
            executor,
            normalizer: ResultNormalizer::new(routing.error_keywords.clone()),
            row_cap: routing.row_cap_per_query,
        })
    }

    pub async fn status(&self) -> MultiAgentStatus {
        let available_tables = match self.catalog.table_index().await {
            Ok(index) => index.entries().iter().map(|entry| entry.name.clone()).collect(),
            Err(e) => {
                tracing::warn!("Table index unavailable for status: {}", e);
                Vec::new()
            }
        };
        MultiAgentStatus {
            status: "operational",
            system: AGENT_SYSTEM,
            agents: AGENTS.to_vec(),
            available_tables,
        }
    }

    pub async fn answer(&self, request: &MultiAgentRequest) -> Result<MultiAgentResponse, AppError> {
        let question = request.question.trim();
        if question.is_empty() {
            return Err(AppError::Validation("No question provided".to_string()));
        }

        let request_id = Uuid::new_v4();
        tracing::info!("[{}] Routing question to a single table: {}", request_id, question);

        let index = self.catalog.table_index().await?;
        let decision = self.route(question, &index).await?;
        let location = index.locate(&decision.selected_table).ok_or_else(|| {
            AppError::Validation(format!(
                "Selected table '{}' is not available",
                decision.selected_table
            ))
        })?;
        tracing::info!(
            "[{}] Selected {}.{} ({} confidence)",
            request_id,
            location.database,
            location.name,
            decision.confidence
        );

        let company_info = CompanyInfo {
            company_code: request.company_code.clone(),
            country: request.company_name.clone(),
        };
        let scope = TenantScope {
            company_code: request.company_code.clone().filter(|c| !c.trim().is_empty()),
            site_code: None,
        };

        let schema_context = self.llm.prepare_schema_context(&[self.table_schema(location).await?]);
        let raw = self
            .llm
            .generate_sql(question, &schema_context, &scope, self.row_cap)
            .await?;

        let Some(statement) = extract_statements(&raw).into_iter().next() else {
            tracing::warn!("[{}] No SQL statement in model response", request_id);
            return Ok(MultiAgentResponse {
                success: true,
                selected_table: location.name.clone(),
                routing_decision: decision,
                sql_query: String::new(),
                data: Vec::new(),
                answer: NO_QUERIES_ANSWER.to_string(),
                description: NO_QUERIES_ANSWER.to_string(),
                error_messages: vec![NO_QUERIES_STATUS.to_string()],
                agent_system: AGENT_SYSTEM,
                company_info,
            });
        };
        let sql_query = statement.trim_end_matches(';').trim().to_string();

        let result = self.executor.execute(&sql_query, &location.database).await;
        let normalized = self.normalizer.normalize(&result);

        let payload = DescriptionPayload {
            records: normalized.records.clone(),
            sql_query: sql_query.clone(),
            question: question.to_string(),
        };
        let description = self.llm.generate_description(&payload).await.unwrap_or_else(|e| {
            tracing::warn!("[{}] Description generation failed: {}", request_id, e);
            NO_DATA_ANSWER.to_string()
        });

        Ok(MultiAgentResponse {
            success: true,
            selected_table: location.name.clone(),
            routing_decision: decision,
            sql_query,
            data: normalized.records,
            answer: description.clone(),
            description,
            error_messages: normalized.error_messages,
            agent_system: AGENT_SYSTEM,
            company_info,
        })
    }

    async fn route(&self, question: &str, index: &TableIndex) -> Result<RoutingDecision, AppError> {
        if index.is_empty() {
            return Err(AppError::NotFound("No tables are available for routing".to_string()));
        }

        let mut candidates = Vec::with_capacity(index.len());
        for entry in index.entries() {
            let description = self
                .storage
                .get_description(&entry.database, &entry.name)
                .await
                .ok()
                .flatten()
                .map(|d| d.description);
            candidates.push((entry.name.clone(), description));
        }

        let decision = match self.llm.route_table(question, &candidates).await {
            Ok(reply) => parse_routing_decision(&reply, index),
            Err(e) => {
                tracing::warn!("Table routing failed: {}", e);
                index.entries().first().map(|entry| RoutingDecision {
                    selected_table: entry.name.clone(),
                    confidence: "low".to_string(),
                    reasoning: format!("Error occurred: {}", e),
                })
            }
        };
        decision.ok_or_else(|| AppError::NotFound("No tables are available for routing".to_string()))
    }

    async fn table_schema(&self, location: &TableLocation) -> Result<DatabaseSchema, AppError> {
        let handle = self.catalog.registry().get(&location.database)?;
        let columns = self.catalog.describe_table(&location.database, &location.name).await?;
        let description = self
            .storage
            .get_description(&location.database, &location.name)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
            .map(|d| d.description);

        Ok(DatabaseSchema {
            database: location.database.clone(),
            database_type: handle.kind.as_str().to_string(),
            tables: vec![TableSchema {
                name: location.name.clone(),
                columns,
                description,
            }],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::database::{DatabaseHandle, DatabaseRegistry};
    use crate::services::llm_service::CompletionClient;
    use serde_json::json;
    use std::path::Path;
    use std::sync::Mutex;
    use tempfile::{tempdir, TempDir};

    /// Replies in order, repeating the last reply once the script runs out
    struct ScriptedClient {
        replies: Mutex<Vec<Result<String, String>>>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedClient {
        fn new(replies: Vec<Result<&str, &str>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(
                    replies
                        .into_iter()
                        .rev()
                        .map(|reply| reply.map(str::to_string).map_err(str::to_string))
                        .collect(),
                ),
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait::async_trait]
    impl CompletionClient for ScriptedClient {
        async fn complete(&self, system: &str, _user: &str) -> Result<String, AppError> {
            self.prompts.lock().unwrap().push(system.to_string());
            let mut replies = self.replies.lock().unwrap();
            let reply = if replies.len() > 1 {
                replies.pop()
            } else {
                replies.last().cloned()
            };
            reply
                .unwrap_or_else(|| Err("no reply scripted".to_string()))
                .map_err(AppError::LlmService)
        }
    }

    fn sqlite(dir: &Path, name: &str, ddl: &str) -> DatabaseHandle {
        let path = dir.join(format!("{}.db", name));
        rusqlite::Connection::open(&path).unwrap().execute_batch(ddl).unwrap();
        DatabaseHandle::sqlite(name, path.to_string_lossy())
    }

    async fn service(dir: &TempDir, sql: Arc<ScriptedClient>, description: Arc<ScriptedClient>) -> MultiAgentService {
        let sales = sqlite(
            dir.path(),
            "Sales",
            r#"
            CREATE TABLE Vw_GI_SalesDetails (CheckId TEXT, CompanyCode TEXT);
            INSERT INTO Vw_GI_SalesDetails VALUES ('K-1', 'PC01');
            "#,
        );
        let summary = sqlite(
            dir.path(),
            "Summary",
            r#"
            CREATE TABLE Vw_GI_SalesSummary (Month TEXT, NetAmount REAL);
            INSERT INTO Vw_GI_SalesSummary VALUES ('January', 1250.5);
            "#,
        );
        let registry = Arc::new(DatabaseRegistry::from_handles(vec![sales, summary]));
        let catalog = Arc::new(SchemaCatalog::new(registry, false));
        let storage = Arc::new(SqliteStorage::new(dir.path().join("metadata.db")).await.unwrap());
        MultiAgentService::new(
            &RoutingConfig::default(),
            catalog,
            storage,
            LlmService::with_clients(sql, description),
        )
        .unwrap()
    }

    fn request(question: &str) -> MultiAgentRequest {
        MultiAgentRequest {
            question: question.to_string(),
            company_code: Some("PC01".to_string()),
            company_name: Some("UK".to_string()),
        }
    }

    #[test]
    fn test_parse_routing_decision_fallbacks() {
        let index = TableIndex::from_tables(vec![(
            "Sales",
            vec!["Vw_GI_SalesDetails".to_string(), "Vw_GI_SalesSummary".to_string()],
        )])
        .unwrap();

        let fenced = "```json\n{\"selected_table\": \"Vw_GI_SalesSummary\", \"confidence\": \"high\", \"reasoning\": \"totals\"}\n```";
        let decision = parse_routing_decision(fenced, &index).unwrap();
        assert_eq!(decision.selected_table, "Vw_GI_SalesSummary");
        assert_eq!(decision.confidence, "high");

        let decision = parse_routing_decision("I would use vw_gi_salesdetails here", &index).unwrap();
        assert_eq!(decision.selected_table, "Vw_GI_SalesDetails");
        assert_eq!(decision.confidence, "medium");
        assert_eq!(decision.reasoning, "Extracted from response text");

        let decision = parse_routing_decision("no idea", &index).unwrap();
        assert_eq!(decision.selected_table, "Vw_GI_SalesDetails");
        assert_eq!(decision.confidence, "low");
        assert_eq!(decision.reasoning, "Default fallback");
    }

    #[tokio::test]
    async fn test_question_runs_on_owning_database() {
        let dir = tempdir().unwrap();
        let sql = ScriptedClient::new(vec![
            Ok(r#"{"selected_table": "vw_gi_salessummary", "confidence": "high", "reasoning": "totals"}"#),
            Ok("```sql\nSELECT Month, NetAmount FROM Vw_GI_SalesSummary LIMIT 20;\n```"),
        ]);
        let description = ScriptedClient::new(vec![Ok("January sales were 1,250.")]);
        let agent = service(&dir, sql.clone(), description).await;

        let response = agent.answer(&request("sales by month")).await.unwrap();

        assert!(response.success);
        assert_eq!(response.selected_table, "Vw_GI_SalesSummary");
        assert_eq!(response.routing_decision.confidence, "high");
        assert_eq!(response.sql_query, "SELECT Month, NetAmount FROM Vw_GI_SalesSummary LIMIT 20");
        assert_eq!(response.data[0]["Month"], json!("January"));
        assert_eq!(response.data[0]["NetAmount"], json!("1250.5"));
        assert_eq!(response.answer, "January sales were 1,250.");
        assert_eq!(response.description, response.answer);
        assert_eq!(response.agent_system, AGENT_SYSTEM);
        assert_eq!(
            response.company_info,
            CompanyInfo {
                company_code: Some("PC01".to_string()),
                country: Some("UK".to_string()),
            }
        );

        // SQL prompt only carries the routed table
        let prompts = sql.prompts.lock().unwrap();
        assert!(prompts[1].contains("Vw_GI_SalesSummary"));
        assert!(!prompts[1].contains("Vw_GI_SalesDetails"));
        assert!(prompts[1].contains("CompanyCode = 'PC01'"));
    }

    #[tokio::test]
    async fn test_router_failure_uses_first_table() {
        let dir = tempdir().unwrap();
        let sql = ScriptedClient::new(vec![
            Err("gateway timeout"),
            Ok("SELECT CheckId FROM Vw_GI_SalesDetails"),
        ]);
        let agent = service(&dir, sql, ScriptedClient::new(vec![Err("gateway timeout")])).await;

        let response = agent.answer(&request("checks")).await.unwrap();
        assert_eq!(response.selected_table, "Vw_GI_SalesDetails");
        assert_eq!(response.routing_decision.confidence, "low");
        assert!(response.routing_decision.reasoning.starts_with("Error occurred:"));
        assert_eq!(response.data[0]["CheckId"], json!("K-1"));
        assert_eq!(response.answer, NO_DATA_ANSWER);
    }

    #[tokio::test]
    async fn test_unknown_selected_table_is_rejected() {
        let dir = tempdir().unwrap();
        let sql = ScriptedClient::new(vec![Ok(r#"{"selected_table": "Vw_GI_CompanyMaster"}"#)]);
        let agent = service(&dir, sql, ScriptedClient::new(vec![Ok("unused")])).await;

        assert!(matches!(
            agent.answer(&request("company info")).await,
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            agent.answer(&request("  ")).await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_status_lists_indexed_tables() {
        let dir = tempdir().unwrap();
        let agent = service(&dir, ScriptedClient::new(vec![Ok("")]), ScriptedClient::new(vec![Ok("")])).await;

        let status = agent.status().await;
        assert_eq!(status.status, "operational");
        assert_eq!(status.agents, AGENTS.to_vec());
        assert_eq!(status.available_tables, vec!["Vw_GI_SalesDetails", "Vw_GI_SalesSummary"]);
    }
}
