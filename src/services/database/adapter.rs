// Uniform access to every store the gateway can route to
use crate::api::middleware::AppError;
use crate::models::Column;
use serde_json::Value;

/// Rows of one executed statement, cells in column order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryOutput {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl QueryOutput {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

/// Database adapter trait - one implementation per store type.
///
/// Every call opens its own connection and closes it before returning.
#[async_trait::async_trait]
pub trait DatabaseAdapter: Send + Sync {
    /// Table and view names, sorted by name
    async fn list_tables(&self) -> Result<Vec<String>, AppError>;

    /// Column layout of one table, empty when the table is unknown
    async fn describe_table(&self, table: &str) -> Result<Vec<Column>, AppError>;

    async fn execute_query(&self, sql: &str) -> Result<QueryOutput, AppError>;

    async fn test_connection(&self) -> Result<(), AppError>;

    fn database_type(&self) -> &str;
}

/// Render one cell the way text results show it
pub fn render_cell(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
