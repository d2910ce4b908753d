pub mod agent;
pub mod catalog;
pub mod description;
pub mod multi_agent;
pub mod query;

use std::sync::Arc;

use crate::api::middleware::AppError;
use crate::config::Config;
use crate::services::database::DatabaseRegistry;
use crate::services::{AgentService, LlmService, MultiAgentService, SchemaCatalog};
use crate::storage::SqliteStorage;

/// Application state
#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<SqliteStorage>,
    pub config: Config,
    pub registry: Arc<DatabaseRegistry>,
    pub catalog: Arc<SchemaCatalog>,
    pub agent: Arc<AgentService>,
    pub multi_agent: Arc<MultiAgentService>,
}

impl AppState {
    /// Discover databases and wire the services from configuration
    pub fn new(config: Config, storage: Arc<SqliteStorage>) -> Result<Self, AppError> {
        let llm = LlmService::new(&config);
        let registry = Arc::new(DatabaseRegistry::discover(
            &config.workspace,
            &config.database.url,
        )?);
        Self::with_services(config, storage, registry, llm)
    }

    pub fn with_services(
        config: Config,
        storage: Arc<SqliteStorage>,
        registry: Arc<DatabaseRegistry>,
        llm: LlmService,
    ) -> Result<Self, AppError> {
        if registry.is_empty() {
            tracing::warn!("No databases found; natural language queries will fail until one is added");
        }

        let catalog = Arc::new(SchemaCatalog::new(
            Arc::clone(&registry),
            config.routing.cache_table_index,
        ));
        let agent = Arc::new(AgentService::new(
            &config.routing,
            Arc::clone(&catalog),
            Arc::clone(&storage),
            llm.clone(),
        )?);
        let multi_agent = Arc::new(MultiAgentService::new(
            &config.routing,
            Arc::clone(&catalog),
            Arc::clone(&storage),
            llm,
        )?);

        Ok(Self {
            storage,
            config,
            registry,
            catalog,
            agent,
            multi_agent,
        })
    }
}
