//! Order repository.
//!
//! The full order is stored as a JSONB document; identifying columns are kept
//! alongside it for lookups and uniqueness.

use async_trait::async_trait;
use seto_core::order::Order;
use seto_core::{CustomerId, MerchantPaymentId, OrderId};
use sqlx::PgPool;
use sqlx::types::Json;

use super::{OrderStore, RepositoryError};

/// `PostgreSQL`-backed order store.
#[derive(Clone)]
pub struct PgOrderStore {
    pool: PgPool,
}

impl PgOrderStore {
    /// Create a new order store.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OrderStore for PgOrderStore {
    async fn insert(&self, order: &Order) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r#"
            INSERT INTO storefront."order"
                (order_id, customer_id, merchant_payment_id, status, document, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(order.order_id.as_str())
        .bind(order.customer_id)
        .bind(order.merchant_payment_id.as_ref().map(MerchantPaymentId::as_str))
        .bind(order.status.to_string())
        .bind(Json(order))
        .bind(order.order_date)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn get(
        &self,
        customer_id: CustomerId,
        order_id: &OrderId,
    ) -> Result<Option<Order>, RepositoryError> {
        let row: Option<(Json<Order>,)> = sqlx::query_as(
            r#"SELECT document FROM storefront."order" WHERE order_id = $1 AND customer_id = $2"#,
        )
        .bind(order_id.as_str())
        .bind(customer_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(Json(order),)| order))
    }

    async fn list_for_customer(
        &self,
        customer_id: CustomerId,
    ) -> Result<Vec<Order>, RepositoryError> {
        let rows: Vec<(Json<Order>,)> = sqlx::query_as(
            r#"
            SELECT document FROM storefront."order"
            WHERE customer_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(customer_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(Json(order),)| order).collect())
    }

    async fn get_by_merchant_payment_id(
        &self,
        merchant_payment_id: &MerchantPaymentId,
    ) -> Result<Option<Order>, RepositoryError> {
        let row: Option<(Json<Order>,)> = sqlx::query_as(
            r#"SELECT document FROM storefront."order" WHERE merchant_payment_id = $1"#,
        )
        .bind(merchant_payment_id.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(Json(order),)| order))
    }
}
