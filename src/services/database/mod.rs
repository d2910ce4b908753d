// Database abstraction layer for multi-database support
pub mod adapter;
pub mod mysql;
pub mod postgresql;
pub mod registry;
pub mod sqlite;

pub use adapter::{render_cell, DatabaseAdapter, QueryOutput};
pub use mysql::MySQLAdapter;
pub use postgresql::PostgreSQLAdapter;
pub use registry::{mask_credentials, DatabaseHandle, DatabaseRegistry};
pub use sqlite::SqliteAdapter;

use crate::api::middleware::AppError;

/// Database type enum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseKind {
    Sqlite,
    PostgreSQL,
    MySQL,
}

impl DatabaseKind {
    pub fn from_str(s: &str) -> Result<Self, AppError> {
        match s.to_lowercase().as_str() {
            "sqlite" => Ok(DatabaseKind::Sqlite),
            "postgresql" | "postgres" => Ok(DatabaseKind::PostgreSQL),
            "mysql" | "mariadb" => Ok(DatabaseKind::MySQL),
            _ => Err(AppError::Validation(format!("Unsupported database type: {}", s))),
        }
    }

    /// Infer the kind from a connection URL scheme
    pub fn from_url(url: &str) -> Result<Self, AppError> {
        let scheme = url
            .split_once("://")
            .map(|(scheme, _)| scheme)
            .ok_or_else(|| AppError::Validation(format!("Missing URL scheme in {}", mask_credentials(url))))?;
        Self::from_str(scheme)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DatabaseKind::Sqlite => "sqlite",
            DatabaseKind::PostgreSQL => "postgresql",
            DatabaseKind::MySQL => "mysql",
        }
    }
}

/// Factory function to create the adapter for a registered database
pub fn create_adapter(handle: &DatabaseHandle) -> Result<Box<dyn DatabaseAdapter>, AppError> {
    match handle.kind {
        DatabaseKind::Sqlite => Ok(Box::new(SqliteAdapter::new(&handle.location))),
        DatabaseKind::PostgreSQL => Ok(Box::new(PostgreSQLAdapter::new(&handle.location)?)),
        DatabaseKind::MySQL => Ok(Box::new(MySQLAdapter::new(&handle.location)?)),
    }
}
