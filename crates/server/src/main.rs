//! Knowledge base API server.

use database::Database;
use kb_server::{create_router, AppState, Config, Passwords};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug")),
        )
        .init();

    // Load configuration
    let config = Config::from_env()?;
    info!(addr = %config.addr, "Starting knowledge base server");

    // Connect to database
    let db = Database::connect_with_pool_size(&config.database_url, config.database_pool_size)
        .await?;
    db.migrate().await?;

    // Build application state
    let state = AppState::new(db, Passwords::new(config.password_policy.clone()));
    let app = create_router(state);

    // Start server
    info!(addr = %config.addr, "Knowledge base server listening");
    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
