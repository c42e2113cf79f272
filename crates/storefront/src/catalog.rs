//! Product catalog with a static fallback.
//!
//! Reads product documents from the [`ProductStore`]. If the store cannot be
//! reached the built-in product list is served instead and the failure is
//! logged; visitors never see the outage.

use std::sync::Arc;

use seto_core::ProductId;
use seto_core::catalog::{Product, fallback_product, fallback_products};
use tracing::instrument;

use crate::db::ProductStore;

/// Read-only product catalog.
#[derive(Clone)]
pub struct Catalog {
    store: Arc<dyn ProductStore>,
}

impl Catalog {
    /// Create a catalog backed by `store`.
    #[must_use]
    pub fn new(store: Arc<dyn ProductStore>) -> Self {
        Self { store }
    }

    /// All products, or the built-in list while the store is unavailable.
    #[instrument(skip(self))]
    pub async fn list_products(&self) -> Vec<Product> {
        match self.store.list().await {
            Ok(products) => products,
            Err(e) => {
                tracing::warn!(error = %e, "Product store unavailable, serving fallback catalog");
                fallback_products()
            }
        }
    }

    /// A single product, `None` if it does not exist.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn get_product(&self, id: &ProductId) -> Option<Product> {
        match self.store.get(id).await {
            Ok(product) => product,
            Err(e) => {
                tracing::warn!(error = %e, "Product store unavailable, serving fallback product");
                fallback_product(id)
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::db::RepositoryError;

    struct DownStore;

    #[async_trait]
    impl ProductStore for DownStore {
        async fn list(&self) -> Result<Vec<Product>, RepositoryError> {
            Err(RepositoryError::Unavailable("connection refused".to_string()))
        }

        async fn get(&self, _id: &ProductId) -> Result<Option<Product>, RepositoryError> {
            Err(RepositoryError::Unavailable("connection refused".to_string()))
        }
    }

    struct EmptyStore;

    #[async_trait]
    impl ProductStore for EmptyStore {
        async fn list(&self) -> Result<Vec<Product>, RepositoryError> {
            Ok(Vec::new())
        }

        async fn get(&self, _id: &ProductId) -> Result<Option<Product>, RepositoryError> {
            Ok(None)
        }
    }

    #[tokio::test]
    async fn test_falls_back_when_store_is_down() {
        let catalog = Catalog::new(Arc::new(DownStore));
        let products = catalog.list_products().await;
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].name, "SETO Blend Coffee");

        assert!(catalog.get_product(&ProductId::new("1")).await.is_some());
        assert!(catalog.get_product(&ProductId::new("42")).await.is_none());
    }

    #[tokio::test]
    async fn test_reachable_store_is_authoritative() {
        let catalog = Catalog::new(Arc::new(EmptyStore));
        assert!(catalog.list_products().await.is_empty());
        assert!(catalog.get_product(&ProductId::new("1")).await.is_none());
    }
}
