// PostgreSQL adapter, one connection per call
use crate::api::middleware::AppError;
use crate::models::Column;
use crate::services::database::adapter::{DatabaseAdapter, QueryOutput};
use serde_json::Value;
use tokio_postgres::{Client, NoTls, SimpleQueryMessage};
use url::Url;

pub struct PostgreSQLAdapter {
    connection_url: String,
}

impl PostgreSQLAdapter {
    pub fn new(connection_url: &str) -> Result<Self, AppError> {
        // Validate PostgreSQL URL format
        let url = Url::parse(connection_url)
            .map_err(|e| AppError::Validation(format!("Invalid PostgreSQL URL: {}", e)))?;

        if url.scheme() != "postgresql" && url.scheme() != "postgres" {
            return Err(AppError::Validation(
                "URL must use postgresql:// or postgres:// scheme".to_string(),
            ));
        }

        Ok(Self {
            connection_url: connection_url.to_string(),
        })
    }

    /// Open a client; the connection task ends when the client is dropped
    async fn connect(&self) -> Result<Client, AppError> {
        let (client, connection) = tokio_postgres::connect(&self.connection_url, NoTls)
            .await
            .map_err(|e| AppError::Connection(format!("Failed to connect to PostgreSQL: {}", e)))?;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!("PostgreSQL connection error: {}", e);
            }
        });

        Ok(client)
    }

    fn describe_error(e: &tokio_postgres::Error) -> String {
        if let Some(db_error) = e.as_db_error() {
            format!("Code: {}, Message: {}", db_error.code().code(), db_error.message())
        } else {
            e.to_string()
        }
    }
}

#[async_trait::async_trait]
impl DatabaseAdapter for PostgreSQLAdapter {
    async fn list_tables(&self) -> Result<Vec<String>, AppError> {
        let client = self.connect().await?;
        let rows = client
            .query(
                r#"
                SELECT table_name::text
                FROM information_schema.tables
                WHERE table_schema NOT IN ('pg_catalog', 'information_schema', 'pg_toast')
                ORDER BY table_name
                "#,
                &[],
            )
            .await
            .map_err(|e| AppError::Database(format!("Failed to get tables: {}", e)))?;

        Ok(rows.iter().map(|row| row.get::<_, String>(0)).collect())
    }

    async fn describe_table(&self, table: &str) -> Result<Vec<Column>, AppError> {
        let client = self.connect().await?;
        let rows = client
            .query(
                r#"
                SELECT
                    c.column_name::text,
                    c.data_type::text,
                    c.is_nullable::text,
                    c.column_default::text,
                    EXISTS (
                        SELECT 1
                        FROM information_schema.table_constraints tc
                        JOIN information_schema.key_column_usage kcu
                          ON tc.constraint_name = kcu.constraint_name
                         AND tc.table_schema = kcu.table_schema
                        WHERE tc.constraint_type = 'PRIMARY KEY'
                          AND tc.table_schema = c.table_schema
                          AND tc.table_name = c.table_name
                          AND kcu.column_name = c.column_name
                    ) AS is_primary_key
                FROM information_schema.columns c
                WHERE c.table_name = $1
                  AND c.table_schema NOT IN ('pg_catalog', 'information_schema', 'pg_toast')
                ORDER BY c.ordinal_position
                "#,
                &[&table],
            )
            .await
            .map_err(|e| AppError::Database(format!("Failed to get columns: {}", e)))?;

        Ok(rows
            .iter()
            .map(|row| Column {
                name: row.get(0),
                data_type: row.get(1),
                notnull: row.get::<_, String>(2) == "NO",
                default_value: row.get(3),
                primary_key: row.get(4),
            })
            .collect())
    }

    async fn execute_query(&self, sql: &str) -> Result<QueryOutput, AppError> {
        let client = self.connect().await?;

        // Simple protocol returns every cell as text, which is what callers render
        let messages = client
            .simple_query(sql)
            .await
            .map_err(|e| {
                AppError::Database(format!("Query execution failed: {}", Self::describe_error(&e)))
            })?;

        let mut output = QueryOutput::default();
        for message in messages {
            if let SimpleQueryMessage::Row(row) = message {
                if output.columns.is_empty() {
                    output.columns = row
                        .columns()
                        .iter()
                        .map(|column| column.name().to_string())
                        .collect();
                }
                let cells = (0..row.len())
                    .map(|idx| match row.get(idx) {
                        Some(text) => Value::String(text.to_string()),
                        None => Value::Null,
                    })
                    .collect();
                output.rows.push(cells);
            }
        }

        Ok(output)
    }

    async fn test_connection(&self) -> Result<(), AppError> {
        let client = self.connect().await?;
        client
            .simple_query("SELECT 1")
            .await
            .map_err(|e| AppError::Connection(format!("PostgreSQL connection check failed: {}", e)))?;
        Ok(())
    }

    fn database_type(&self) -> &str {
        "postgresql"
    }
}
