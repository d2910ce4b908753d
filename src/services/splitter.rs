// Rewrites a cross-database join into independent single-table reads
use crate::config::{DEFAULT_COMMON_JOIN_COLUMNS, DEFAULT_ROW_CAP};
use crate::models::TableGroup;

/// One statement produced by splitting, bound to its database
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitQuery {
    pub statement: String,
    pub database: String,
}

/// Replaces a join the engines cannot run with one capped read per table,
/// selecting only the columns shared across stores. Filters, grouping and
/// aggregates of the original statement are not carried over.
#[derive(Debug, Clone)]
pub struct CrossDatabaseSplitter {
    common_columns: Vec<String>,
    row_cap: u32,
}

impl Default for CrossDatabaseSplitter {
    fn default() -> Self {
        Self::new(
            DEFAULT_COMMON_JOIN_COLUMNS.iter().map(|c| c.to_string()).collect(),
            DEFAULT_ROW_CAP,
        )
    }
}

impl CrossDatabaseSplitter {
    pub fn new(common_columns: Vec<String>, row_cap: u32) -> Self {
        Self {
            common_columns,
            row_cap,
        }
    }

    pub fn split(&self, original_sql: &str, groups: &[TableGroup]) -> Vec<SplitQuery> {
        let columns = self.common_columns.join(", ");
        let queries: Vec<SplitQuery> = groups
            .iter()
            .flat_map(|group| {
                group.tables.iter().map(|table| SplitQuery {
                    statement: format!("SELECT {} FROM {} LIMIT {}", columns, table, self.row_cap),
                    database: group.database.clone(),
                })
            })
            .collect();

        tracing::info!(
            "Split cross-database statement into {} queries: {}",
            queries.len(),
            original_sql
        );
        queries
    }
}
