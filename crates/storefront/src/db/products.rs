//! Product document repository.

use async_trait::async_trait;
use seto_core::ProductId;
use seto_core::catalog::Product;
use sqlx::PgPool;
use sqlx::types::Json;

use super::{ProductStore, RepositoryError};

/// `PostgreSQL`-backed product documents.
#[derive(Clone)]
pub struct PgProductStore {
    pool: PgPool,
}

impl PgProductStore {
    /// Create a new product store.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert or replace a product document.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn upsert(&self, product: &Product) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO storefront.product (id, document, created_at, updated_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE
            SET document = EXCLUDED.document, updated_at = EXCLUDED.updated_at
            ",
        )
        .bind(product.id.as_str())
        .bind(Json(product))
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl ProductStore for PgProductStore {
    async fn list(&self) -> Result<Vec<Product>, RepositoryError> {
        let rows: Vec<(Json<Product>,)> =
            sqlx::query_as("SELECT document FROM storefront.product ORDER BY id")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(|(Json(product),)| product).collect())
    }

    async fn get(&self, id: &ProductId) -> Result<Option<Product>, RepositoryError> {
        let row: Option<(Json<Product>,)> =
            sqlx::query_as("SELECT document FROM storefront.product WHERE id = $1")
                .bind(id.as_str())
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|(Json(product),)| product))
    }
}
