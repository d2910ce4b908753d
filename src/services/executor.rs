// Runs single statements and turns driver output into raw results
use crate::api::middleware::AppError;
use crate::models::{NormalizedRecord, QueryPlan, RawResult};
use crate::services::database::{render_cell, DatabaseRegistry, QueryOutput};
use serde_json::Value;
use std::sync::Arc;

/// Shape of successful results handed to the normalizer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResultFormat {
    /// Tab-separated text with a header line
    #[default]
    Tabular,
    /// Records keyed by column name
    Structured,
}

impl ResultFormat {
    pub fn from_str(s: &str) -> Result<Self, AppError> {
        match s.trim().to_lowercase().as_str() {
            "tabular" | "text" => Ok(ResultFormat::Tabular),
            "structured" | "records" => Ok(ResultFormat::Structured),
            _ => Err(AppError::Validation(format!("Unsupported result format: {}", s))),
        }
    }
}

pub struct QueryExecutor {
    registry: Arc<DatabaseRegistry>,
    format: ResultFormat,
}

impl QueryExecutor {
    pub fn new(registry: Arc<DatabaseRegistry>, format: ResultFormat) -> Self {
        Self { registry, format }
    }

    /// Run one statement on `database`. Failures come back as
    /// `RawResult::ExecutionError`, never as `Err`.
    pub async fn execute(&self, statement: &str, database: &str) -> RawResult {
        tracing::debug!("Executing on {}: {}", database, statement);

        let adapter = match self.registry.adapter(database) {
            Ok(adapter) => adapter,
            Err(e) => {
                tracing::error!("No adapter for {}: {}", database, e);
                return RawResult::ExecutionError(e.message().to_string());
            }
        };

        match adapter.execute_query(statement).await {
            Ok(output) if output.is_empty() => RawResult::NoResults,
            Ok(output) => {
                tracing::debug!("{} returned {} rows", database, output.row_count());
                self.render(output)
            }
            Err(e) => {
                tracing::error!("Query failed on {}: {}", database, e);
                RawResult::ExecutionError(e.message().to_string())
            }
        }
    }

    /// Execute a routed plan. Cross-database plans are reported, not run.
    pub async fn execute_plan(&self, plan: &QueryPlan) -> RawResult {
        match plan {
            QueryPlan::Single { statement, database } => self.execute(statement, database).await,
            QueryPlan::CrossDatabaseJoin { groups, .. } => RawResult::CrossDatabaseJoin(groups.clone()),
        }
    }

    fn render(&self, output: QueryOutput) -> RawResult {
        match self.format {
            ResultFormat::Tabular => RawResult::Text(Self::to_tabular(&output)),
            ResultFormat::Structured => RawResult::Records(Self::to_records(output)),
        }
    }

    fn to_tabular(output: &QueryOutput) -> String {
        let mut lines = Vec::with_capacity(output.rows.len() + 1);
        lines.push(output.columns.join("\t"));
        for row in &output.rows {
            lines.push(row.iter().map(render_cell).collect::<Vec<_>>().join("\t"));
        }
        lines.join("\n")
    }

    fn to_records(output: QueryOutput) -> Vec<NormalizedRecord> {
        let QueryOutput { columns, rows } = output;
        rows.into_iter()
            .map(|row| {
                let mut record = NormalizedRecord::new();
                for (column, value) in columns.iter().zip(row.iter()) {
                    record.insert(column.clone(), Value::String(render_cell(value)));
                }
                record
            })
            .collect()
    }
}
