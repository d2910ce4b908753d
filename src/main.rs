use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tracing::{error, info};

use nl_sql_gateway::api::handlers::AppState;
use nl_sql_gateway::api::routes::create_router_with_state;
use nl_sql_gateway::config::Config;
use nl_sql_gateway::storage::SqliteStorage;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env().map_err(|e| {
        eprintln!("Failed to load configuration: {}", e);
        e
    })?;

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level)),
        )
        .with_ansi(config.logging.style != "never")
        .init();

    info!("Starting server on {}", config.server_address());

    // Description store
    let storage = Arc::new(SqliteStorage::new(&config.database.url).await.map_err(|e| {
        error!("Failed to initialize database: {}", e);
        e
    })?);

    let state = AppState::new(config.clone(), storage).map_err(|e| {
        error!("Failed to initialize services: {}", e);
        e
    })?;
    info!(
        "Routing across {} database(s): {}",
        state.registry.handles().len(),
        state.registry.names().join(", ")
    );

    let app: Router = create_router_with_state(state);

    // Start server
    let addr: SocketAddr = config.server_address().parse()?;
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
