use serde::{Deserialize, Serialize};

/// One column of a table as reported by schema introspection.
///
/// Serialized with the field names the schema endpoint has always returned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    #[serde(rename = "column_name")]
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
    pub notnull: bool,
    pub default_value: Option<String>,
    pub primary_key: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<Column>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Tables of one database, used to build the SQL generation context
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSchema {
    pub database: String,
    pub database_type: String,
    pub tables: Vec<TableSchema>,
}

#[derive(Debug, Deserialize)]
pub struct ListTablesParams {
    pub db_name: String,
}

#[derive(Debug, Deserialize)]
pub struct RetrieveSchemaParams {
    pub db_name: String,
    pub table_name: String,
}

/// One `(CompanyCode, SiteCode)` pair of the tenant table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Company {
    pub company_code: String,
    pub site_code: String,
}

#[derive(Debug, Deserialize)]
pub struct SqlQueryRequest {
    pub db_name: String,
    pub query: String,
}
