// Question in, routed and summarised answer out
use crate::api::middleware::AppError;
use crate::config::RoutingConfig;
use crate::models::{AgentRequest, AgentResponse, DatabaseSchema, DescriptionPayload, CROSS_DATABASE_JOIN_MARKER};
use crate::services::batch::{extract_statements, BatchProcessor};
use crate::services::catalog::SchemaCatalog;
use crate::services::executor::{QueryExecutor, ResultFormat};
use crate::services::llm_service::LlmService;
use crate::services::normalizer::ResultNormalizer;
use crate::services::router::DatabaseRouter;
use crate::services::splitter::CrossDatabaseSplitter;
use crate::storage::SqliteStorage;
use std::sync::Arc;
use uuid::Uuid;

pub const NO_QUERIES_ANSWER: &str =
    "No queries were generated for your question. Please try rephrasing your question.";
pub const NO_QUERIES_STATUS: &str = "No queries were generated for your question.";
pub const NO_DATA_FOUND_ANSWER: &str = "No data was found for your query. Please try a different question.";

pub struct AgentService {
    catalog: Arc<SchemaCatalog>,
    storage: Arc<SqliteStorage>,
    llm: LlmService,
    batch: BatchProcessor,
    normalizer: ResultNormalizer,
    row_cap: u32,
}

impl AgentService {
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
        let batch = BatchProcessor::new(
            DatabaseRouter::default(),
            CrossDatabaseSplitter::new(routing.common_join_columns.clone(), routing.row_cap_per_query),
            executor,
        )
        .with_splitting(routing.split_cross_database);

        Ok(Self {
            catalog,
            storage,
            llm,
            batch,
            normalizer: ResultNormalizer::new(routing.error_keywords.clone()),
            row_cap: routing.row_cap_per_query,
        })
    }

    pub async fn answer(&self, request: &AgentRequest) -> Result<AgentResponse, AppError> {
        let question = request.question.trim();
        if question.is_empty() {
            return Err(AppError::Validation("Question cannot be empty".to_string()));
        }

        let request_id = Uuid::new_v4();
        tracing::info!("[{}] Answering question: {}", request_id, question);

        let schema_context = self.llm.prepare_schema_context(&self.annotated_schema().await);
        let index = self.catalog.table_index().await?;

        let raw = self
            .llm
            .generate_sql(question, &schema_context, &request.scope(), self.row_cap)
            .await?;
        let statements = extract_statements(&raw);
        tracing::debug!("[{}] Model produced {} statements", request_id, statements.len());

        if statements.is_empty() {
            tracing::warn!("[{}] No SQL statements in model response", request_id);
            return Ok(AgentResponse {
                sql_query: String::new(),
                data: Vec::new(),
                error_messages: Vec::new(),
                answer: NO_QUERIES_ANSWER.to_string(),
                original_answer: NO_QUERIES_STATUS.to_string(),
            });
        }

        let executed = self.batch.process_batch(&statements, &index).await;
        let split_count = executed.iter().filter(|item| item.split).count();
        if split_count > 0 {
            tracing::info!(
                "[{}] Cross-database joins split into {} per-database statements",
                request_id,
                split_count
            );
        }
        let normalized = self.normalizer.normalize_all(executed.iter().map(|item| &item.result));

        let sql_query = executed
            .iter()
            .map(|item| item.statement.trim_end_matches(';').trim())
            .filter(|statement| !statement.is_empty())
            .collect::<Vec<_>>()
            .join("\n");

        let spans_databases = normalized
            .error_messages
            .iter()
            .any(|message| message.contains(CROSS_DATABASE_JOIN_MARKER));

        let record_count = normalized.records.len();
        let answer = if spans_databases {
            Self::multi_database_answer(record_count)
        } else if record_count > 0 {
            let payload = DescriptionPayload {
                records: normalized.records.clone(),
                sql_query: sql_query.clone(),
                question: question.to_string(),
            };
            match self.llm.generate_description(&payload).await {
                Ok(description) => description,
                Err(e) => {
                    tracing::warn!("[{}] Description generation failed: {}", request_id, e);
                    format!(
                        "Successfully retrieved {} records from the database. The data shows various sales \
                         transactions and business metrics that can be analyzed in the visualization below.",
                        record_count
                    )
                }
            }
        } else {
            NO_DATA_FOUND_ANSWER.to_string()
        };

        tracing::info!(
            "[{}] Returning {} records and {} messages",
            request_id,
            record_count,
            normalized.error_messages.len()
        );

        Ok(AgentResponse {
            sql_query,
            original_answer: format!(
                "Generated {} SQL queries and executed them successfully. Found {} results.",
                executed.len(),
                record_count
            ),
            data: normalized.records,
            error_messages: normalized.error_messages,
            answer,
        })
    }

    fn multi_database_answer(record_count: usize) -> String {
        format!(
            "I detected that your question requires data from multiple databases. \
             I've generated separate queries for each database to retrieve the relevant information. \
             The data from different databases can be compared and analyzed together. \
             Retrieved {} records across multiple databases.",
            record_count
        )
    }

    /// Live schema with the curated table descriptions merged in
    async fn annotated_schema(&self) -> Vec<DatabaseSchema> {
        let mut schemas = self.catalog.schema_overview().await;
        for schema in &mut schemas {
            let descriptions = match self.storage.list_descriptions(&schema.database).await {
                Ok(descriptions) => descriptions,
                Err(e) => {
                    tracing::warn!("Failed to load descriptions for {}: {}", schema.database, e);
                    continue;
                }
            };
            for table in &mut schema.tables {
                table.description = descriptions
                    .iter()
                    .find(|d| d.table_name.eq_ignore_ascii_case(&table.name))
                    .map(|d| d.description.clone());
            }
        }
        schemas
    }
}
