use serde::Deserialize;
use std::env;

/// Source defaults for the routing core
pub const DEFAULT_ROW_CAP: u32 = 20;
pub const DEFAULT_TENANT_TABLE: &str = "View_DiscountDetails";
pub const DEFAULT_ERROR_KEYWORDS: [&str; 4] = ["error", "no results found", "not found", "empty"];
pub const DEFAULT_COMMON_JOIN_COLUMNS: [&str; 8] = [
    "CheckId",
    "Date",
    "Month",
    "Year",
    "DayPart",
    "RevenueCenter",
    "CompanyCode",
    "SiteCode",
];

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub llm: LlmConfig,
    pub workspace: WorkspaceConfig,
    pub routing: RoutingConfig,
    pub logging: LoggingConfig,
}

/// Location of the table description store
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    pub gateway_url: String,
    pub api_key: Option<String>,
    pub sql_model: String,
    pub description_model: String,
}

/// Where the queryable databases come from
#[derive(Debug, Clone, Deserialize)]
pub struct WorkspaceConfig {
    /// Directory scanned for `*.db` SQLite files
    pub path: String,
    /// Extra named databases as `name=url`
    #[serde(default)]
    pub extra_databases: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RoutingConfig {
    pub row_cap_per_query: u32,
    pub error_keywords: Vec<String>,
    pub common_join_columns: Vec<String>,
    pub cache_table_index: bool,
    pub result_format: String,
    /// Split joins across databases; when off they are reported as errors
    pub split_cross_database: bool,
    /// Table holding the CompanyCode/SiteCode pairs offered as tenant scopes
    pub tenant_table: String,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            row_cap_per_query: DEFAULT_ROW_CAP,
            error_keywords: DEFAULT_ERROR_KEYWORDS.iter().map(|s| s.to_string()).collect(),
            common_join_columns: DEFAULT_COMMON_JOIN_COLUMNS.iter().map(|s| s.to_string()).collect(),
            cache_table_index: false,
            result_format: "tabular".to_string(),
            split_cross_database: true,
            tenant_table: DEFAULT_TENANT_TABLE.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub style: String,
}

impl Config {
    pub fn from_env() -> Result<Self, config::ConfigError> {
        // Load .env before reading overrides so its values take part
        let _ = dotenv::dotenv();

        let routing = RoutingConfig::default();
        let mut builder = config::Config::builder()
            .set_default("database.url", "./metadata.db")?
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3000)?
            .set_default("llm.gateway_url", "")?
            .set_default("llm.sql_model", "gpt-4o")?
            .set_default("llm.description_model", "o3-mini")?
            .set_default("workspace.path", ".")?
            .set_default("workspace.extra_databases", Vec::<String>::new())?
            .set_default("routing.row_cap_per_query", routing.row_cap_per_query as i64)?
            .set_default("routing.error_keywords", routing.error_keywords)?
            .set_default("routing.common_join_columns", routing.common_join_columns)?
            .set_default("routing.cache_table_index", routing.cache_table_index)?
            .set_default("routing.result_format", routing.result_format)?
            .set_default("routing.split_cross_database", routing.split_cross_database)?
            .set_default("routing.tenant_table", routing.tenant_table)?
            .set_default("logging.level", "info")?
            .set_default("logging.style", "auto")?;

        if let Ok(database_url) = env::var("DATABASE_URL") {
            builder = builder.set_override("database.url", database_url)?;
        }

        if let Ok(host) = env::var("HOST") {
            builder = builder.set_override("server.host", host)?;
        }

        if let Ok(port) = env::var("PORT") {
            builder = builder.set_override("server.port", port.parse::<u16>().unwrap_or(3000))?;
        }

        if let Ok(gateway_url) = env::var("LLM_GATEWAY_URL") {
            builder = builder.set_override("llm.gateway_url", gateway_url)?;
        }

        if let Ok(api_key) = env::var("LLM_API_KEY") {
            builder = builder.set_override("llm.api_key", Some(api_key))?;
        }

        if let Ok(model) = env::var("LLM_SQL_MODEL") {
            builder = builder.set_override("llm.sql_model", model)?;
        }

        if let Ok(model) = env::var("LLM_DESCRIPTION_MODEL") {
            builder = builder.set_override("llm.description_model", model)?;
        }

        if let Ok(path) = env::var("DATABASE_WORKSPACE") {
            builder = builder.set_override("workspace.path", path)?;
        }

        if let Ok(extra) = env::var("EXTRA_DATABASES") {
            builder = builder.set_override("workspace.extra_databases", split_list(&extra))?;
        }

        if let Ok(row_cap) = env::var("ROUTING_ROW_CAP") {
            builder = builder.set_override(
                "routing.row_cap_per_query",
                row_cap.parse::<u32>().unwrap_or(DEFAULT_ROW_CAP) as i64,
            )?;
        }

        if let Ok(keywords) = env::var("ROUTING_ERROR_KEYWORDS") {
            builder = builder.set_override("routing.error_keywords", split_list(&keywords))?;
        }

        if let Ok(columns) = env::var("ROUTING_COMMON_COLUMNS") {
            builder = builder.set_override("routing.common_join_columns", split_list(&columns))?;
        }

        if let Ok(cache) = env::var("ROUTING_CACHE_INDEX") {
            builder = builder.set_override("routing.cache_table_index", cache == "true" || cache == "1")?;
        }

        if let Ok(format) = env::var("ROUTING_RESULT_FORMAT") {
            builder = builder.set_override("routing.result_format", format)?;
        }

        if let Ok(split) = env::var("ROUTING_SPLIT_CROSS_DATABASE") {
            builder = builder.set_override(
                "routing.split_cross_database",
                !(split == "false" || split == "0"),
            )?;
        }

        if let Ok(table) = env::var("ROUTING_TENANT_TABLE") {
            builder = builder.set_override("routing.tenant_table", table)?;
        }

        if let Ok(log_level) = env::var("RUST_LOG") {
            builder = builder.set_override("logging.level", log_level)?;
        }

        if let Ok(log_style) = env::var("RUST_LOG_STYLE") {
            builder = builder.set_override("logging.style", log_style)?;
        }

        builder.build()?.try_deserialize()
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

/// Split a comma-separated environment value, dropping blanks
fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}
