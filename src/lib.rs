pub mod api;
pub mod config;
pub mod core_state;
pub mod db;
pub mod models;
pub mod pharmacy;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

/// Startup failures that stop the service.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("Pharmacy client error: {0}")]
    Pharmacy(#[from] pharmacy::PharmacyError),
    #[error("Database error: {0}")]
    Database(#[from] db::DatabaseError),
    #[error("Runtime error: {0}")]
    Runtime(#[from] std::io::Error),
    #[error("Server error: {0}")]
    Server(String),
}

pub fn run() -> Result<(), RunError> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let server_config = config::ServerConfig::from_env()?;
    let pharmacy_config = config::PharmacyConfig::from_env()?;

    // Migrate up front so a bad database fails startup, not the first request.
    db::open_database(&server_config.db_path)?;
    tracing::info!(db = %server_config.db_path.display(), "Database ready");

    // The blocking HTTP client must be built outside the async runtime and
    // dropped outside it too, so `core` outlives `block_on`.
    let core = Arc::new(core_state::CoreState::new(
        server_config.db_path.clone(),
        &pharmacy_config,
    )?);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let served = runtime.block_on(api::serve_until_interrupted(core.clone(), server_config.addr));
    drop(runtime);

    tracing::info!("{} stopped", config::APP_NAME);
    served.map_err(RunError::Server)
}
