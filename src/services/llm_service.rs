use crate::api::middleware::AppError;
use crate::config::Config;
use crate::models::{DatabaseSchema, DescriptionPayload, TenantScope};
use reqwest::Client as HttpClient;
use serde_json::json;
use std::sync::Arc;

/// Most records handed to the summary model
pub const DESCRIPTION_RECORD_LIMIT: usize = 50;

/// Answer used when there is nothing to describe
pub const NO_DATA_ANSWER: &str = "I don't have data for this query. Please try another question.";

/// A chat-style text completion backend
#[async_trait::async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, system: &str, user: &str) -> Result<String, AppError>;
}

/// OpenAI-compatible chat completions over HTTP
pub struct HttpCompletionClient {
    gateway_url: String,
    api_key: Option<String>,
    model: String,
    http_client: HttpClient,
}

impl HttpCompletionClient {
    pub fn new(gateway_url: &str, api_key: Option<String>, model: &str) -> Self {
        Self {
            gateway_url: gateway_url.to_string(),
            api_key,
            model: model.to_string(),
            http_client: HttpClient::new(),
        }
    }

    /// Pull the completion text out of the several response shapes gateways use
    fn extract_content(result: &serde_json::Value) -> Option<&str> {
        result["choices"][0]["message"]["content"]
            .as_str()
            .or_else(|| result["text"].as_str())
            .or_else(|| result["content"].as_str())
            .or_else(|| result["response"].as_str())
    }
}

#[async_trait::async_trait]
impl CompletionClient for HttpCompletionClient {
    async fn complete(&self, system: &str, user: &str) -> Result<String, AppError> {
        if self.gateway_url.is_empty() {
            return Err(AppError::LlmService("LLM gateway not configured".to_string()));
        }

        let mut request = self.http_client.post(&self.gateway_url).json(&json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user},
            ],
        }));

        if let Some(api_key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {}", api_key));
        }

        let response = request
            .send()
            .await
            .map_err(|e| AppError::LlmService(format!("Failed to call LLM service: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::LlmService(format!(
                "LLM service returned error {}: {}",
                status, error_text
            )));
        }

        let result: serde_json::Value = response
            .json()
            .await
            .map_err(|e| AppError::LlmService(format!("Failed to parse LLM response: {}", e)))?;

        Self::extract_content(&result)
            .map(|content| content.trim().to_string())
            .ok_or_else(|| AppError::LlmService("LLM response does not contain any text".to_string()))
    }
}

/// Model calls of a request: table routing and SQL generation share one
/// client, result summaries use the other
#[derive(Clone)]
pub struct LlmService {
    sql_client: Arc<dyn CompletionClient>,
    description_client: Arc<dyn CompletionClient>,
}

impl LlmService {
    pub fn new(config: &Config) -> Self {
        let llm = &config.llm;
        Self::with_clients(
            Arc::new(HttpCompletionClient::new(&llm.gateway_url, llm.api_key.clone(), &llm.sql_model)),
            Arc::new(HttpCompletionClient::new(
                &llm.gateway_url,
                llm.api_key.clone(),
                &llm.description_model,
            )),
        )
    }

    pub fn with_clients(
        sql_client: Arc<dyn CompletionClient>,
        description_client: Arc<dyn CompletionClient>,
    ) -> Self {
        Self {
            sql_client,
            description_client,
        }
    }

    /// Prepare schema context for the SQL prompt
    pub fn prepare_schema_context(&self, schemas: &[DatabaseSchema]) -> String {
        let mut context = String::new();

        for schema in schemas {
            context.push_str(&format!("Database: {} ({})\n", schema.database, schema.database_type));
            for table in &schema.tables {
                context.push_str(&format!("  - {}\n", table.name));
                if let Some(description) = table.description.as_deref().filter(|d| !d.trim().is_empty()) {
                    context.push_str(&format!("    Description: {}\n", description.trim()));
                }
                context.push_str("    Columns:\n");
                for column in &table.columns {
                    context.push_str(&format!("      * {} ({})", column.name, column.data_type));
                    if column.primary_key {
                        context.push_str(" [PRIMARY KEY]");
                    }
                    if column.notnull {
                        context.push_str(" [NOT NULL]");
                    }
                    context.push('\n');
                }
            }
            context.push('\n');
        }

        context
    }

    /// Ask the SQL model for statements answering `question`.
    /// Returns the raw response; statement extraction happens downstream.
    pub async fn generate_sql(
        &self,
        question: &str,
        schema_context: &str,
        scope: &TenantScope,
        row_cap: u32,
    ) -> Result<String, AppError> {
        let mut scope_rules = String::new();
        if let Some(company_code) = &scope.company_code {
            scope_rules.push_str(&format!(
                "- Only return rows where CompanyCode = '{}'\n",
                company_code
            ));
        }
        if let Some(site_code) = &scope.site_code {
            scope_rules.push_str(&format!("- Only return rows where SiteCode = '{}'\n", site_code));
        }

        let system = format!(
            r#"You are a SQL expert for a hospitality and restaurant business. Given the schemas of several databases and a question, write SQLite-compatible SELECT queries that answer it.

Schemas:
{schema_context}
Instructions:
1. Return ONLY SQL statements separated by semicolons, no explanations
2. Use table and column names exactly as listed above
3. Every query must end with LIMIT {row_cap}
4. Each query may only use tables from a single database; never JOIN tables from different databases
5. When the question needs data from several databases, write one query per database selecting comparable columns such as CheckId, Date, CompanyCode and SiteCode
{scope_rules}"#,
            schema_context = schema_context,
            row_cap = row_cap,
            scope_rules = scope_rules,
        );

        tracing::debug!("Requesting SQL for question: {}", question);
        self.sql_client.complete(&system, question.trim()).await
    }

    /// Ask the routing model which single table answers `question`.
    /// `tables` pairs each candidate table with its curated description.
    pub async fn route_table(
        &self,
        question: &str,
        tables: &[(String, Option<String>)],
    ) -> Result<String, AppError> {
        let listing = tables
            .iter()
            .map(|(name, description)| match description.as_deref().filter(|d| !d.trim().is_empty()) {
                Some(description) => format!("- {}: {}", name, description.trim()),
                None => format!("- {}", name),
            })
            .collect::<Vec<_>>()
            .join("\n");

        let system = format!(
            r#"You are a table router for a hospitality and restaurant business. Pick the one table best suited to answer the user's question.

Available tables:
{listing}

Rules:
1. Identify what kind of data the question needs (line-level transactions, summaries, company or reference data)
2. If several tables could help, pick the main one
3. Use the table name exactly as listed

Return ONLY a JSON object:
{{"selected_table": "table_name", "confidence": "high/medium/low", "reasoning": "brief explanation"}}"#,
            listing = listing,
        );

        tracing::debug!("Routing question to one of {} tables", tables.len());
        self.sql_client.complete(&system, question.trim()).await
    }

    /// Summarise normalized records for the end user
    pub async fn generate_description(&self, payload: &DescriptionPayload) -> Result<String, AppError> {
        if payload.records.is_empty() {
            return Ok(NO_DATA_ANSWER.to_string());
        }

        let records = &payload.records[..payload.records.len().min(DESCRIPTION_RECORD_LIMIT)];
        let data = serde_json::to_string_pretty(records)
            .map_err(|e| AppError::Internal(format!("Failed to serialize records: {}", e)))?;

        let system = format!(
            r#"You are a data analyst assistant. Write a clear, concise markdown description of what the data shows for the user's question.

Rules:
- If the data is empty or holds no meaningful values, respond ONLY with: "{no_data}"
- When results come from several queries, describe each dataset and compare them on shared fields such as CheckId, Date, CompanyCode and SiteCode
- Do not invent numbers that are not in the data

Question: {question}
SQL:
{sql}"#,
            no_data = NO_DATA_ANSWER,
            question = payload.question,
            sql = payload.sql_query,
        );

        let description = self
            .description_client
            .complete(&system, &format!("Analyze this data: {}", data))
            .await?;

        if description.trim().is_empty() {
            return Ok(NO_DATA_ANSWER.to_string());
        }
        Ok(description)
    }
}
