use serde::{Deserialize, Serialize};
use std::fmt;

/// Marker carried by every cross-database join message
pub const CROSS_DATABASE_JOIN_MARKER: &str = "Cross-database JOIN detected";

/// Status text for a query that succeeded with zero rows
pub const NO_RESULTS_MESSAGE: &str = "No results found.";

/// Prefix of every execution failure message
pub const EXECUTION_ERROR_PREFIX: &str = "Error executing query:";

/// One output row: header name to cell text, in header order
pub type NormalizedRecord = serde_json::Map<String, serde_json::Value>;

/// Tables of one database that a statement references
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableGroup {
    pub database: String,
    pub tables: Vec<String>,
}

/// Routing decision for a single generated statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryPlan {
    /// Run the statement as-is on `database`
    Single { statement: String, database: String },
    /// The statement joins tables living in different databases and must be split
    CrossDatabaseJoin {
        statement: String,
        groups: Vec<TableGroup>,
    },
}

impl QueryPlan {
    pub fn statement(&self) -> &str {
        match self {
            QueryPlan::Single { statement, .. } => statement,
            QueryPlan::CrossDatabaseJoin { statement, .. } => statement,
        }
    }

    /// Database the plan runs on; every involved database for a join across stores
    pub fn target(&self) -> String {
        match self {
            QueryPlan::Single { database, .. } => database.clone(),
            QueryPlan::CrossDatabaseJoin { groups, .. } => groups
                .iter()
                .map(|group| group.database.as_str())
                .collect::<Vec<_>>()
                .join(", "),
        }
    }
}

/// Executor output before normalization
#[derive(Debug, Clone, PartialEq)]
pub enum RawResult {
    /// Structured rows, passed through the normalizer unchanged
    Records(Vec<NormalizedRecord>),
    /// Free text: tab-separated rows, a single column or a status line
    Text(String),
    NoResults,
    ExecutionError(String),
    CrossDatabaseJoin(Vec<TableGroup>),
}

/// Wire form of a raw result, kept byte-compatible with earlier clients
impl fmt::Display for RawResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawResult::Records(records) => {
                let rendered = serde_json::to_string(records).map_err(|_| fmt::Error)?;
                f.write_str(&rendered)
            }
            RawResult::Text(text) => f.write_str(text),
            RawResult::NoResults => f.write_str(NO_RESULTS_MESSAGE),
            RawResult::ExecutionError(detail) => write!(f, "{} {}", EXECUTION_ERROR_PREFIX, detail),
            RawResult::CrossDatabaseJoin(groups) => {
                let placement = groups
                    .iter()
                    .map(|group| format!("{} ({})", group.tables.join(", "), group.database))
                    .collect::<Vec<_>>()
                    .join("; ");
                write!(
                    f,
                    "Error: {}. Tables {} live in different databases and cannot be joined; query each database separately.",
                    CROSS_DATABASE_JOIN_MARKER, placement
                )
            }
        }
    }
}

/// One statement of a batch after execution
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutedStatement {
    pub statement: String,
    pub database: String,
    pub result: RawResult,
    /// Produced by splitting a cross-database statement
    pub split: bool,
}

/// Normalizer output: data rows and status/error strings, both in input order
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NormalizedResult {
    pub records: Vec<NormalizedRecord>,
    pub error_messages: Vec<String>,
}

/// Input of the summary step
#[derive(Debug, Clone, Serialize)]
pub struct DescriptionPayload {
    pub records: Vec<NormalizedRecord>,
    pub sql_query: String,
    pub question: String,
}

/// Optional tenant scoping forwarded to SQL generation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantScope {
    pub company_code: Option<String>,
    pub site_code: Option<String>,
}

impl TenantScope {
    pub fn is_empty(&self) -> bool {
        self.company_code.is_none() && self.site_code.is_none()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AgentRequest {
    pub question: String,
    #[serde(default)]
    pub company_code: Option<String>,
    #[serde(default)]
    pub site_code: Option<String>,
}

impl AgentRequest {
    pub fn scope(&self) -> TenantScope {
        TenantScope {
            company_code: self.company_code.clone().filter(|c| !c.trim().is_empty()),
            site_code: self.site_code.clone().filter(|c| !c.trim().is_empty()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AgentResponse {
    pub sql_query: String,
    pub data: Vec<NormalizedRecord>,
    pub error_messages: Vec<String>,
    pub answer: String,
    pub original_answer: String,
}

/// Table picked for a question by the routing model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingDecision {
    pub selected_table: String,
    #[serde(default)]
    pub confidence: String,
    #[serde(default)]
    pub reasoning: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MultiAgentRequest {
    pub question: String,
    #[serde(default)]
    pub company_code: Option<String>,
    /// Country label of the company, echoed back only
    #[serde(default)]
    pub company_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompanyInfo {
    pub company_code: Option<String>,
    pub country: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MultiAgentResponse {
    pub success: bool,
    pub routing_decision: RoutingDecision,
    pub selected_table: String,
    pub sql_query: String,
    pub data: Vec<NormalizedRecord>,
    pub answer: String,
    pub description: String,
    pub error_messages: Vec<String>,
    pub agent_system: &'static str,
    pub company_info: CompanyInfo,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_strings() {
        assert_eq!(RawResult::NoResults.to_string(), "No results found.");
        assert_eq!(
            RawResult::ExecutionError("no such table: foo".to_string()).to_string(),
            "Error executing query: no such table: foo"
        );

        let cross = RawResult::CrossDatabaseJoin(vec![
            TableGroup { database: "sales".to_string(), tables: vec!["orders".to_string()] },
            TableGroup { database: "master".to_string(), tables: vec!["sites".to_string()] },
        ]);
        let text = cross.to_string();
        assert!(text.contains(CROSS_DATABASE_JOIN_MARKER));
        assert!(text.contains("orders (sales); sites (master)"));
    }

    #[test]
    fn test_agent_request_scope_drops_blank_codes() {
        let request: AgentRequest = serde_json::from_str(
            r#"{"question": "sales by site", "company_code": "PC01", "site_code": "  "}"#,
        )
        .unwrap();
        let scope = request.scope();
        assert_eq!(scope.company_code.as_deref(), Some("PC01"));
        assert!(scope.site_code.is_none());
        assert!(!scope.is_empty());
    }

    #[test]
    fn test_plan_accessors() {
        let plan = QueryPlan::Single {
            statement: "SELECT 1".to_string(),
            database: "main".to_string(),
        };
        assert_eq!(plan.statement(), "SELECT 1");
        assert_eq!(plan.target(), "main");

        let join = QueryPlan::CrossDatabaseJoin {
            statement: "SELECT * FROM a JOIN b".to_string(),
            groups: vec![
                TableGroup { database: "sales".to_string(), tables: vec!["a".to_string()] },
                TableGroup { database: "master".to_string(), tables: vec!["b".to_string()] },
            ],
        };
        assert_eq!(join.statement(), "SELECT * FROM a JOIN b");
        assert_eq!(join.target(), "sales, master");
    }
}
