use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// User-curated annotation of a table, keyed by (database, table)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableDescription {
    pub database_name: String,
    pub table_name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct DescriptionParams {
    pub database_name: String,
    pub table_name: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateDescriptionRequest {
    pub description: String,
}
