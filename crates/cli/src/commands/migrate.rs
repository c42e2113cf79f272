//! Database migration commands.
//!
//! # Usage
//!
//! ```bash
//! seto-cli migrate
//! ```
//!
//! # Environment Variables
//!
//! - `STOREFRONT_DATABASE_URL` (or `DATABASE_URL`) - `PostgreSQL` connection string
//!
//! # Migration Files
//!
//! Storefront migrations live in `crates/storefront/migrations/` and create the
//! `storefront` schema (products, orders) and the `tower_sessions` session table.

use secrecy::ExposeSecret;
use seto_storefront::config::{ConfigError, database_url_from_env};
use sqlx::PgPool;
use thiserror::Error;

/// Errors that can occur while migrating.
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Run storefront database migrations.
///
/// # Errors
///
/// Returns `MigrationError` if the URL is missing, the database is unreachable,
/// or a migration fails.
pub async fn storefront() -> Result<(), MigrationError> {
    dotenvy::dotenv().ok();

    let database_url = database_url_from_env()?;

    tracing::info!("Connecting to storefront database...");
    let pool = PgPool::connect(database_url.expose_secret()).await?;

    tracing::info!("Running storefront migrations...");
    sqlx::migrate!("../storefront/migrations").run(&pool).await?;

    tracing::info!("Storefront migrations complete!");
    Ok(())
}
