//! Tenet server entry point.

use tenet_db::{DbConfig, DbManager, run_migrations};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("tenet=info".parse().unwrap()))
        .json()
        .init();

    tracing::info!("starting tenet server");

    let config = DbConfig::from_env();
    let manager = match DbManager::connect(&config).await {
        Ok(manager) => manager,
        Err(e) => {
            tracing::error!(error = %e, url = %config.url, "database connection failed");
            std::process::exit(1);
        }
    };

    if let Err(e) = run_migrations(manager.client()).await {
        tracing::error!(error = %e, "schema migration failed");
        std::process::exit(1);
    }

    tracing::info!(
        namespace = %config.namespace,
        database = %config.database,
        "tenet server ready"
    );

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "shutdown signal listener failed");
        std::process::exit(1);
    }

    tracing::info!("tenet server stopped");
}
