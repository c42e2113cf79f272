//! Database operations for storefront `PostgreSQL`.
//!
//! ## Tables
//!
//! - `storefront.product` - Product documents (JSONB), read by the catalog
//! - `storefront.order` - Placed orders, unique per merchant payment id
//! - `tower_sessions.session` - Tower-sessions storage
//!
//! # Migrations
//!
//! Migrations are stored in `crates/storefront/migrations/` and run via:
//! ```bash
//! cargo run -p seto-cli -- migrate
//! ```

mod orders;
mod products;

use std::time::Duration;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use seto_core::catalog::Product;
use seto_core::order::Order;
use seto_core::{CustomerId, MerchantPaymentId, OrderId, ProductId};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use orders::PgOrderStore;
pub use products::PgProductStore;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// The store is not reachable (used by in-process stores and tests).
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Read access to product documents.
#[async_trait]
pub trait ProductStore: Send + Sync {
    /// All products, ordered by id.
    async fn list(&self) -> Result<Vec<Product>, RepositoryError>;

    /// A single product, `None` if the id is unknown.
    async fn get(&self, id: &ProductId) -> Result<Option<Product>, RepositoryError>;
}

/// Durable order storage.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Insert an order.
    ///
    /// Returns `false` when an order with the same id or merchant payment id
    /// already exists; the existing row is left untouched.
    async fn insert(&self, order: &Order) -> Result<bool, RepositoryError>;

    /// An order placed by `customer_id`.
    async fn get(
        &self,
        customer_id: CustomerId,
        order_id: &OrderId,
    ) -> Result<Option<Order>, RepositoryError>;

    /// All orders placed by `customer_id`, newest first.
    async fn list_for_customer(&self, customer_id: CustomerId)
    -> Result<Vec<Order>, RepositoryError>;

    /// The order paid with `merchant_payment_id`.
    async fn get_by_merchant_payment_id(
        &self,
        merchant_payment_id: &MerchantPaymentId,
    ) -> Result<Option<Order>, RepositoryError>;
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// Connections are opened on first use, so the storefront starts (and serves
/// the fallback catalog) while the database is unreachable.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection string cannot be parsed.
pub fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(5))
        .connect_lazy(database_url.expose_secret())
}
