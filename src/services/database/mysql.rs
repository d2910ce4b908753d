// MySQL adapter, one connection per call
use crate::api::middleware::AppError;
use crate::models::Column;
use crate::services::database::adapter::{DatabaseAdapter, QueryOutput};
use mysql_async::{prelude::*, Conn, Opts, Row, Value as MySqlValue};
use serde_json::{json, Value};
use url::Url;

pub struct MySQLAdapter {
    opts: Opts,
}

impl MySQLAdapter {
    pub fn new(connection_url: &str) -> Result<Self, AppError> {
        // Validate MySQL URL format
        let url = Url::parse(connection_url)
            .map_err(|e| AppError::Validation(format!("Invalid MySQL URL: {}", e)))?;

        if url.scheme() != "mysql" && url.scheme() != "mariadb" {
            return Err(AppError::Validation(
                "URL must use mysql:// or mariadb:// scheme".to_string(),
            ));
        }

        // The driver only understands the mysql scheme
        let mut normalized = url;
        if normalized.scheme() == "mariadb" {
            let rewritten = normalized.as_str().replacen("mariadb://", "mysql://", 1);
            normalized = Url::parse(&rewritten)
                .map_err(|e| AppError::Validation(format!("Invalid MySQL URL: {}", e)))?;
        }

        let opts = Opts::from_url(normalized.as_str())
            .map_err(|e| AppError::Validation(format!("Invalid MySQL URL: {}", e)))?;

        Ok(Self { opts })
    }

    async fn connect(&self) -> Result<Conn, AppError> {
        Conn::new(self.opts.clone())
            .await
            .map_err(|e| AppError::Connection(format!("Failed to connect to MySQL: {}", e)))
    }

    async fn close(conn: Conn) {
        if let Err(e) = conn.disconnect().await {
            tracing::warn!("MySQL disconnect failed: {}", e);
        }
    }

    fn mysql_value_to_json(mysql_val: MySqlValue) -> Value {
        match mysql_val {
            MySqlValue::NULL => Value::Null,
            MySqlValue::Bytes(bytes) => match String::from_utf8(bytes) {
                Ok(s) => json!(s),
                Err(e) => json!(format!("<blob {} bytes>", e.into_bytes().len())),
            },
            MySqlValue::Int(i) => json!(i),
            MySqlValue::UInt(u) => json!(u),
            MySqlValue::Float(f) => json!(f),
            MySqlValue::Double(d) => json!(d),
            MySqlValue::Date(y, m, d, h, min, s, _) => {
                json!(format!("{:04}-{:02}-{:02} {:02}:{:02}:{:02}", y, m, d, h, min, s))
            }
            MySqlValue::Time(is_neg, d, h, m, s, _) => {
                let sign = if is_neg { "-" } else { "" };
                let total_hours = d * 24 + h as u32;
                json!(format!("{}{}:{:02}:{:02}", sign, total_hours, m, s))
            }
        }
    }
}

#[async_trait::async_trait]
impl DatabaseAdapter for MySQLAdapter {
    async fn list_tables(&self) -> Result<Vec<String>, AppError> {
        let mut conn = self.connect().await?;
        let result: Result<Vec<String>, _> = conn
            .query(
                "SELECT TABLE_NAME FROM information_schema.TABLES \
                 WHERE TABLE_SCHEMA = DATABASE() \
                 ORDER BY TABLE_NAME",
            )
            .await;
        Self::close(conn).await;

        result.map_err(|e| AppError::Database(format!("Failed to get tables: {}", e)))
    }

    async fn describe_table(&self, table: &str) -> Result<Vec<Column>, AppError> {
        let query = r#"
            SELECT
                c.COLUMN_NAME,
                c.DATA_TYPE,
                c.IS_NULLABLE,
                c.COLUMN_DEFAULT,
                CASE WHEN c.COLUMN_KEY = 'PRI' THEN 1 ELSE 0 END as is_primary_key
            FROM information_schema.COLUMNS c
            WHERE c.TABLE_SCHEMA = DATABASE() AND c.TABLE_NAME = ?
            ORDER BY c.ORDINAL_POSITION
        "#;

        let mut conn = self.connect().await?;
        let result: Result<Vec<(String, String, String, Option<String>, u8)>, _> =
            conn.exec(query, (table,)).await;
        Self::close(conn).await;

        let rows = result.map_err(|e| AppError::Database(format!("Failed to get columns: {}", e)))?;
        Ok(rows
            .into_iter()
            .map(|(name, data_type, is_nullable, default_value, is_pk)| Column {
                name,
                data_type,
                notnull: is_nullable == "NO",
                default_value,
                primary_key: is_pk == 1,
            })
            .collect())
    }

    async fn execute_query(&self, sql: &str) -> Result<QueryOutput, AppError> {
        let mut conn = self.connect().await?;
        let result: Result<Vec<Row>, _> = conn.query(sql).await;
        Self::close(conn).await;

        let rows = result.map_err(|e| AppError::Database(format!("Query execution failed: {}", e)))?;

        let mut output = QueryOutput::default();
        for row in rows {
            if output.columns.is_empty() {
                output.columns = row
                    .columns_ref()
                    .iter()
                    .map(|column| column.name_str().to_string())
                    .collect();
            }
            let cells = (0..row.len())
                .map(|idx| match row.get_opt::<MySqlValue, usize>(idx) {
                    Some(Ok(value)) => Self::mysql_value_to_json(value),
                    _ => Value::Null,
                })
                .collect();
            output.rows.push(cells);
        }

        Ok(output)
    }

    async fn test_connection(&self) -> Result<(), AppError> {
        let mut conn = self.connect().await?;
        let result = conn.query_drop("SELECT 1").await;
        Self::close(conn).await;
        result.map_err(|e| AppError::Connection(format!("MySQL connection check failed: {}", e)))
    }

    fn database_type(&self) -> &str {
        "mysql"
    }
}
