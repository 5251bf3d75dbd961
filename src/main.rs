use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};

mod config;
mod db;
mod llm;
mod query;
mod sql;
mod util;
mod web;

use crate::config::{AppConfig, CliArgs};
use crate::db::{DuckDbStore, QueryStore};
use crate::llm::LlmManager;
use crate::util::logging::init_tracing;
use crate::web::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Parse command line arguments
    let args = CliArgs::parse();

    // Initialize logging
    init_tracing(args.log_format);

    // Load configuration
    let config = match AppConfig::new(&args) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    info!(
        "Opening DuckDB database {} (pool size {})",
        config.database.connection_string, config.database.pool_size
    );
    let store: Arc<dyn QueryStore> = Arc::new(DuckDbStore::open(
        &config.database.connection_string,
        config.database.pool_size,
    )?);

    // The table is created lazily on first query; warming it here is optional.
    match store.ensure_schema().await {
        Ok(seeded) if seeded > 0 => info!("Seeded {} legal prompts", seeded),
        Ok(_) => info!("Table legalprompt ready"),
        Err(e) => error!("Failed to prepare table, will retry on first query: {}", e),
    }

    // Initialize LLM manager
    info!("Initializing LLM manager with backend: {}", config.llm.backend);
    let llm_manager = Arc::new(LlmManager::new(&config.llm)?);

    let app_state = Arc::new(AppState::new(config.clone(), llm_manager, store)?);

    // Start the web server
    info!("Starting legal-nlq server on {}:{}", config.web.host, config.web.port);
    match web::run_server(config.web, app_state).await {
        Ok(_) => info!("Server stopped gracefully"),
        Err(e) => {
            error!("Server error: {}", e);
            return Err(e);
        }
    }

    Ok(())
}
