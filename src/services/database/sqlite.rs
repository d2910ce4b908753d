// SQLite adapter for the workspace *.db files
use crate::api::middleware::AppError;
use crate::models::Column;
use crate::services::database::adapter::{DatabaseAdapter, QueryOutput};
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};

pub struct SqliteAdapter {
    path: PathBuf,
}

impl SqliteAdapter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn open(path: &Path) -> Result<Connection, AppError> {
        Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| {
            AppError::Connection(format!("Failed to open {}: {}", path.display(), e))
        })
    }

    /// Run `f` on a fresh read-only connection on the blocking pool.
    /// The connection is dropped when `f` returns.
    async fn with_connection<T, F>(&self, f: F) -> Result<T, AppError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, AppError> + Send + 'static,
    {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || {
            let conn = Self::open(&path)?;
            f(&conn)
        })
        .await
        .map_err(|e| AppError::Internal(format!("spawn_blocking join error: {}", e)))?
    }

    fn sqlite_value_to_json(value: ValueRef<'_>) -> Value {
        match value {
            ValueRef::Null => Value::Null,
            ValueRef::Integer(i) => json!(i),
            ValueRef::Real(f) => serde_json::Number::from_f64(f)
                .map(Value::Number)
                .unwrap_or_else(|| json!(f.to_string())),
            ValueRef::Text(bytes) => json!(String::from_utf8_lossy(bytes)),
            ValueRef::Blob(bytes) => json!(format!("<blob {} bytes>", bytes.len())),
        }
    }

    fn quote_identifier(name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }
}

#[async_trait::async_trait]
impl DatabaseAdapter for SqliteAdapter {
    async fn list_tables(&self) -> Result<Vec<String>, AppError> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare(
                "SELECT name FROM sqlite_master \
                 WHERE type IN ('table', 'view') AND name NOT LIKE 'sqlite_%' \
                 ORDER BY name",
            )?;
            let names = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(names)
        })
        .await
    }

    async fn describe_table(&self, table: &str) -> Result<Vec<Column>, AppError> {
        let pragma = format!("PRAGMA table_info({})", Self::quote_identifier(table));
        self.with_connection(move |conn| {
            let mut stmt = conn.prepare(&pragma)?;
            let columns = stmt
                .query_map([], |row| {
                    Ok(Column {
                        name: row.get(1)?,
                        data_type: row.get(2)?,
                        notnull: row.get::<_, i64>(3)? != 0,
                        default_value: row.get(4)?,
                        primary_key: row.get::<_, i64>(5)? > 0,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(columns)
        })
        .await
    }

    async fn execute_query(&self, sql: &str) -> Result<QueryOutput, AppError> {
        let sql = sql.to_string();
        self.with_connection(move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let columns: Vec<String> = stmt
                .column_names()
                .into_iter()
                .map(String::from)
                .collect();
            let width = columns.len();

            let mut rows = stmt.query([])?;
            let mut output = Vec::new();
            while let Some(row) = rows.next()? {
                let mut cells = Vec::with_capacity(width);
                for idx in 0..width {
                    cells.push(Self::sqlite_value_to_json(row.get_ref(idx)?));
                }
                output.push(cells);
            }

            Ok(QueryOutput {
                columns,
                rows: output,
            })
        })
        .await
    }

    async fn test_connection(&self) -> Result<(), AppError> {
        self.with_connection(|conn| {
            conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
            Ok(())
        })
        .await
    }

    fn database_type(&self) -> &str {
        "sqlite"
    }
}
