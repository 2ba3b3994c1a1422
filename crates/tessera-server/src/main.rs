//! Tessera Server — application entry point.
//!
//! Composition root: loads configuration, installs the tracing
//! subscriber, connects to SurrealDB and applies migrations. The
//! repositories, auth service and authorization service are all
//! constructed here and handed to the transport layer.

mod config;

use tessera_auth::{AuthService, AuthzService};
use tessera_db::repository::{
    SurrealPasswordResetRepository, SurrealProjectRepository, SurrealSessionRepository,
    SurrealTaskRepository, SurrealUserRepository, SurrealWorkspaceRepository,
};
use tessera_db::{DbManager, SurrealAuditLog};
use tracing_subscriber::EnvFilter;

use crate::config::ServerConfig;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("tessera=info".parse().unwrap()),
        )
        .json()
        .init();

    tracing::info!("Starting Tessera server...");

    let _ = dotenvy::dotenv();

    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            std::process::exit(1);
        }
    };

    let manager = match DbManager::connect(&config.db).await {
        Ok(manager) => manager,
        Err(e) => {
            tracing::error!(error = %e, "Failed to connect to SurrealDB");
            std::process::exit(1);
        }
    };

    if let Err(e) = manager.health_check().await {
        tracing::error!(error = %e, "Database health check failed");
        std::process::exit(1);
    }

    if let Err(e) = tessera_db::run_migrations(manager.client()).await {
        tracing::error!(error = %e, "Migrations failed");
        std::process::exit(1);
    }

    let db = manager.client().clone();
    let _auth_service = AuthService::new(
        SurrealUserRepository::new(db.clone()),
        SurrealSessionRepository::new(db.clone()),
        SurrealPasswordResetRepository::new(db.clone()),
        SurrealAuditLog::new(db.clone()),
        config.auth.clone(),
    );
    let _authz_service = AuthzService::new(
        SurrealUserRepository::new(db.clone()),
        SurrealWorkspaceRepository::new(db.clone()),
        SurrealProjectRepository::new(db.clone()),
        SurrealTaskRepository::new(db),
    );

    tracing::info!(env = %config.env, "Auth core ready");

    // TODO: mount the GraphQL/REST transport on top of the services;
    // bearer extraction goes through
    // tessera_auth::token::principal_from_bearer.

    tracing::info!("Tessera server stopped.");
}
