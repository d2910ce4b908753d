use crate::models::TableDescription;
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, Result as SqliteResult};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

/// File path of a store URL (`sqlite:./path`, `sqlite://path` or a bare path)
pub fn store_path(url: &str) -> &str {
    match url.strip_prefix("sqlite:") {
        Some(rest) => rest.trim_start_matches("//"),
        None => url,
    }
}

/// SQLite store for user-curated table descriptions
/// Uses tokio::Mutex for async-friendly locking
pub struct SqliteStorage {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStorage {
    /// Create a new SQLite storage instance
    pub async fn new<P: AsRef<Path>>(db_path: P) -> SqliteResult<Self> {
        let path_str = db_path.as_ref().to_string_lossy();
        let conn = Connection::open(store_path(&path_str))?;
        let storage = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        storage.init_schema().await?;
        Ok(storage)
    }

    /// Initialize database schema
    async fn init_schema(&self) -> SqliteResult<()> {
        let conn = self.conn.lock().await;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS table_descriptions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                database_name TEXT NOT NULL,
                table_name TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                UNIQUE(database_name, table_name)
            )
            "#,
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_table_descriptions_database ON table_descriptions(database_name)",
            [],
        )?;

        Ok(())
    }

    /// Description of one table, `None` when never written
    pub async fn get_description(
        &self,
        database_name: &str,
        table_name: &str,
    ) -> SqliteResult<Option<TableDescription>> {
        let db_conn = self.conn.lock().await;
        let result = db_conn.query_row(
            r#"
            SELECT database_name, table_name, description, created_at, updated_at
            FROM table_descriptions
            WHERE database_name = ?1 AND table_name = ?2
            "#,
            rusqlite::params![database_name, table_name],
            Self::row_to_description,
        );

        match result {
            Ok(description) => Ok(Some(description)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Insert or replace a description. The creation time of an existing row is kept.
    pub async fn upsert_description(
        &self,
        database_name: &str,
        table_name: &str,
        description: &str,
    ) -> SqliteResult<TableDescription> {
        let now = Utc::now().to_rfc3339();
        {
            let db_conn = self.conn.lock().await;
            db_conn.execute(
                r#"
                INSERT INTO table_descriptions (database_name, table_name, description, created_at, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?4)
                ON CONFLICT(database_name, table_name)
                DO UPDATE SET description = excluded.description, updated_at = excluded.updated_at
                "#,
                rusqlite::params![database_name, table_name, description, now],
            )?;
        }

        self.get_description(database_name, table_name)
            .await?
            .ok_or(rusqlite::Error::QueryReturnedNoRows)
    }

    /// All descriptions of one database, ordered by table name
    pub async fn list_descriptions(&self, database_name: &str) -> SqliteResult<Vec<TableDescription>> {
        let db_conn = self.conn.lock().await;
        let mut stmt = db_conn.prepare(
            r#"
            SELECT database_name, table_name, description, created_at, updated_at
            FROM table_descriptions
            WHERE database_name = ?1
            ORDER BY table_name
            "#,
        )?;

        let descriptions = stmt
            .query_map(rusqlite::params![database_name], Self::row_to_description)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(descriptions)
    }

    fn row_to_description(row: &rusqlite::Row<'_>) -> SqliteResult<TableDescription> {
        Ok(TableDescription {
            database_name: row.get(0)?,
            table_name: row.get(1)?,
            description: row.get(2)?,
            created_at: Self::parse_timestamp(3, &row.get::<_, String>(3)?)?,
            updated_at: Self::parse_timestamp(4, &row.get::<_, String>(4)?)?,
        })
    }

    fn parse_timestamp(idx: usize, raw: &str) -> SqliteResult<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(raw)
            .map(|ts| ts.with_timezone(&Utc))
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_store_path() {
        assert_eq!(store_path("sqlite:./metadata.db"), "./metadata.db");
        assert_eq!(store_path("sqlite:///tmp/metadata.db"), "/tmp/metadata.db");
        assert_eq!(store_path("./metadata.db"), "./metadata.db");
    }

    #[test]
    fn test_sqlite_storage_creation() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("metadata.db");
        let rt = tokio::runtime::Runtime::new().unwrap();
        let storage = rt.block_on(async { SqliteStorage::new(&db_path).await });
        assert!(storage.is_ok());
    }

    #[test]
    fn test_schema_initialization() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("metadata.db");
        let rt = tokio::runtime::Runtime::new().unwrap();
        let storage = rt.block_on(async { SqliteStorage::new(&db_path).await.unwrap() });

        let conn = rt.block_on(async { storage.conn.lock().await });
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name = 'table_descriptions'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_sqlite_url_prefix() {
        let dir = tempdir().unwrap();
        let db_path = format!("sqlite://{}", dir.path().join("metadata.db").display());
        let storage = SqliteStorage::new(&db_path).await.unwrap();
        assert!(storage.get_description("DB1", "t").await.unwrap().is_none());
        assert!(dir.path().join("metadata.db").exists());
    }

    #[tokio::test]
    async fn test_upsert_and_get_description() {
        let dir = tempdir().unwrap();
        let storage = SqliteStorage::new(dir.path().join("metadata.db")).await.unwrap();

        assert!(storage
            .get_description("DB1", "Vw_GI_SalesDetails")
            .await
            .unwrap()
            .is_none());

        let first = storage
            .upsert_description("DB1", "Vw_GI_SalesDetails", "Line-level sales")
            .await
            .unwrap();
        assert_eq!(first.description, "Line-level sales");

        let second = storage
            .upsert_description("DB1", "Vw_GI_SalesDetails", "Sales by check")
            .await
            .unwrap();
        assert_eq!(second.description, "Sales by check");
        assert_eq!(second.created_at, first.created_at);
        assert!(second.updated_at >= first.updated_at);

        let fetched = storage
            .get_description("DB1", "Vw_GI_SalesDetails")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fetched.description, "Sales by check");
    }

    #[tokio::test]
    async fn test_list_descriptions_is_scoped_and_sorted() {
        let dir = tempdir().unwrap();
        let storage = SqliteStorage::new(dir.path().join("metadata.db")).await.unwrap();
        storage.upsert_description("DB1", "sites", "Sites").await.unwrap();
        storage.upsert_description("DB1", "orders", "Orders").await.unwrap();
        storage.upsert_description("DB2", "refunds", "Refunds").await.unwrap();

        let listed = storage.list_descriptions("DB1").await.unwrap();
        let names: Vec<&str> = listed.iter().map(|d| d.table_name.as_str()).collect();
        assert_eq!(names, vec!["orders", "sites"]);
    }
}
