// Schema catalog and the table -> database index used for routing
use crate::api::middleware::AppError;
use crate::models::{Column, Company, DatabaseSchema, TableSchema};
use crate::services::database::{render_cell, DatabaseRegistry};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Where one table lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableLocation {
    /// Lower-cased table name, used for matching
    pub key: String,
    /// Name as the owning database reports it
    pub name: String,
    pub database: String,
}

/// Lower-cased table name to owning database, in enumeration order.
///
/// A name present in several databases keeps the position of its first
/// sighting but points at the database seen last, spelled the way that
/// database spells it.
#[derive(Debug, Clone)]
pub struct TableIndex {
    databases: Vec<String>,
    entries: Vec<TableLocation>,
    positions: HashMap<String, usize>,
}

impl TableIndex {
    /// `None` when there is no database to fall back to
    pub fn new(databases: Vec<String>) -> Option<Self> {
        if databases.is_empty() {
            return None;
        }
        Some(Self {
            databases,
            entries: Vec::new(),
            positions: HashMap::new(),
        })
    }

    pub fn insert(&mut self, table: &str, database: &str) {
        let key = table.to_lowercase();
        match self.positions.get(&key) {
            Some(&pos) => {
                if self.entries[pos].database != database {
                    tracing::debug!(
                        "Table {} found in both {} and {}, keeping {}",
                        key,
                        self.entries[pos].database,
                        database,
                        database
                    );
                }
                self.entries[pos].database = database.to_string();
                self.entries[pos].name = table.to_string();
            }
            None => {
                self.positions.insert(key.clone(), self.entries.len());
                self.entries.push(TableLocation {
                    key,
                    name: table.to_string(),
                    database: database.to_string(),
                });
            }
        }
    }

    /// Build from `(database, tables)` pairs, databases in enumeration order
    pub fn from_tables<I, S>(groups: I) -> Option<Self>
    where
        I: IntoIterator<Item = (S, Vec<String>)>,
        S: Into<String>,
    {
        let groups: Vec<(String, Vec<String>)> =
            groups.into_iter().map(|(db, tables)| (db.into(), tables)).collect();
        let mut index = Self::new(groups.iter().map(|(db, _)| db.clone()).collect())?;
        for (database, tables) in &groups {
            for table in tables {
                index.insert(table, database);
            }
        }
        Some(index)
    }

    /// Case-insensitive lookup of the owning database
    pub fn lookup(&self, table: &str) -> Option<&str> {
        self.locate(table).map(|location| location.database.as_str())
    }

    pub fn locate(&self, table: &str) -> Option<&TableLocation> {
        self.positions
            .get(&table.to_lowercase())
            .map(|&pos| &self.entries[pos])
    }

    pub fn entries(&self) -> &[TableLocation] {
        &self.entries
    }

    pub fn databases(&self) -> &[String] {
        &self.databases
    }

    pub fn default_database(&self) -> &str {
        &self.databases[0]
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Live view over the tables and columns of every registered database
pub struct SchemaCatalog {
    registry: Arc<DatabaseRegistry>,
    cache_index: bool,
    cached_index: RwLock<Option<Arc<TableIndex>>>,
}

impl SchemaCatalog {
    pub fn new(registry: Arc<DatabaseRegistry>, cache_index: bool) -> Self {
        Self {
            registry,
            cache_index,
            cached_index: RwLock::new(None),
        }
    }

    pub fn registry(&self) -> &Arc<DatabaseRegistry> {
        &self.registry
    }

    /// Table index for routing. Rebuilt on every call unless caching is on,
    /// in which case the first build is kept for the life of the process.
    pub async fn table_index(&self) -> Result<Arc<TableIndex>, AppError> {
        if self.cache_index {
            if let Some(index) = self.cached_index.read().await.as_ref() {
                return Ok(Arc::clone(index));
            }
        }

        let index = Arc::new(self.build_index().await?);

        if self.cache_index {
            let mut cached = self.cached_index.write().await;
            if cached.is_none() {
                *cached = Some(Arc::clone(&index));
            }
        }

        Ok(index)
    }

    async fn build_index(&self) -> Result<TableIndex, AppError> {
        let mut index = TableIndex::new(self.registry.names())
            .ok_or_else(|| AppError::NotFound("No databases are configured".to_string()))?;

        for handle in self.registry.handles() {
            let tables = match self.list_tables(&handle.name).await {
                Ok(tables) => tables,
                Err(e) => {
                    tracing::warn!("Skipping {} while indexing tables: {}", handle.name, e);
                    continue;
                }
            };
            for table in &tables {
                index.insert(table, &handle.name);
            }
        }

        tracing::debug!(
            "Indexed {} tables across {} databases",
            index.len(),
            index.databases().len()
        );
        Ok(index)
    }

    pub async fn list_tables(&self, database: &str) -> Result<Vec<String>, AppError> {
        let adapter = self.registry.adapter(database)?;
        adapter.list_tables().await
    }

    pub async fn describe_table(&self, database: &str, table: &str) -> Result<Vec<Column>, AppError> {
        let adapter = self.registry.adapter(database)?;
        let columns = adapter.describe_table(table).await?;
        if columns.is_empty() {
            return Err(AppError::NotFound(format!(
                "Table '{}' not found in database '{}'",
                table, database
            )));
        }
        Ok(columns)
    }

    /// Plain-text column listing of one table
    pub async fn column_summary(&self, database: &str, table: &str) -> Result<String, AppError> {
        let columns = self.describe_table(database, table).await?;
        let mut summary = format!("Table {} contains the following columns:\n", table);
        for column in &columns {
            summary.push_str(&format!("- {} ({}): Column data\n", column.name, column.data_type));
        }
        Ok(summary)
    }

    /// Distinct company and site codes of the tenant table, wherever it lives
    pub async fn companies(&self, tenant_table: &str) -> Result<Vec<Company>, AppError> {
        let index = self.table_index().await?;
        let location = index.locate(tenant_table).ok_or_else(|| {
            AppError::NotFound(format!("Tenant table '{}' not found in any database", tenant_table))
        })?;

        let sql = format!(
            "SELECT DISTINCT CompanyCode, SiteCode FROM {} \
             WHERE CompanyCode IS NOT NULL AND SiteCode IS NOT NULL \
             ORDER BY CompanyCode, SiteCode",
            location.name
        );
        let output = self.registry.adapter(&location.database)?.execute_query(&sql).await?;

        Ok(output
            .rows
            .iter()
            .filter(|row| row.len() >= 2)
            .map(|row| Company {
                company_code: render_cell(&row[0]),
                site_code: render_cell(&row[1]),
            })
            .collect())
    }

    /// Tables and columns of every readable database, for prompt building
    pub async fn schema_overview(&self) -> Vec<DatabaseSchema> {
        let mut overview = Vec::new();
        for handle in self.registry.handles() {
            let adapter = match self.registry.adapter(&handle.name) {
                Ok(adapter) => adapter,
                Err(e) => {
                    tracing::warn!("No adapter for {}: {}", handle.name, e);
                    continue;
                }
            };
            let tables = match adapter.list_tables().await {
                Ok(tables) => tables,
                Err(e) => {
                    tracing::warn!("Skipping {} in schema overview: {}", handle.name, e);
                    continue;
                }
            };

            let mut schemas = Vec::with_capacity(tables.len());
            for table in tables {
                let columns = adapter.describe_table(&table).await.unwrap_or_else(|e| {
                    tracing::warn!("Failed to describe {}.{}: {}", handle.name, table, e);
                    Vec::new()
                });
                schemas.push(TableSchema {
                    name: table,
                    columns,
                    description: None,
                });
            }

            overview.push(DatabaseSchema {
                database: handle.name.clone(),
                database_type: adapter.database_type().to_string(),
                tables: schemas,
            });
        }
        overview
    }
}
