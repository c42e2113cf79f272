//! Seed the storefront catalog.
//!
//! Upserts the coffee line-up into `storefront.product`; running it again
//! refreshes names, prices and stock without duplicating rows.

use chrono::{DateTime, Utc};
use seto_core::catalog::Product;
use seto_core::{ProductId, Yen};
use seto_storefront::config::{ConfigError, database_url_from_env};
use seto_storefront::db::{self, PgProductStore};
use thiserror::Error;
use tracing::{error, info};

const IMAGE_URL: &str = "/images/coffee-beans.jpeg";

/// Errors that can occur while seeding.
#[derive(Debug, Error)]
pub enum SeedError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("{0} of {1} products failed to seed")]
    Incomplete(usize, usize),
}

/// The catalog line-up: (id, name, description, price, stock).
const CATALOG: &[(&str, &str, &str, u64, u32)] = &[
    (
        "1",
        "SETO Blend Coffee - Light Roast",
        "軽やかな酸味と華やかな香りが特徴の浅煎りブレンド",
        1200,
        50,
    ),
    (
        "2",
        "SETO Blend Coffee - Medium Roast",
        "バランスの取れた味わいと豊かなコクが楽しめる中煎りブレンド",
        1300,
        45,
    ),
    (
        "3",
        "SETO Blend Coffee - Dark Roast",
        "深いコクと苦味が特徴の深煎りブレンド",
        1400,
        40,
    ),
    (
        "4",
        "SETO Single Origin - Ethiopia",
        "フローラルな香りとベリーのような風味が特徴のエチオピア産シングルオリジン",
        1600,
        30,
    ),
    (
        "5",
        "SETO Single Origin - Colombia",
        "ナッツのような風味とキャラメルのような甘さが特徴のコロンビア産シングルオリジン",
        1500,
        35,
    ),
];

/// Build the catalog documents stamped with `now`.
fn catalog(now: DateTime<Utc>) -> Vec<Product> {
    CATALOG
        .iter()
        .map(|&(id, name, description, price, stock)| Product {
            id: ProductId::new(id),
            name: name.to_string(),
            description: description.to_string(),
            price: Yen::new(price),
            image_url: IMAGE_URL.to_string(),
            stock,
            grind_options: vec![
                "豆のまま".to_string(),
                "挽いた状態".to_string(),
                "ドリップバッグ".to_string(),
            ],
            weight_options: vec![100],
            created_at: now,
            updated_at: now,
        })
        .collect()
}

/// Upsert the catalog products.
///
/// Each product is written independently; failures are logged and counted.
///
/// # Errors
///
/// Returns `SeedError` if the database URL is missing or invalid, or if any
/// product could not be written.
pub async fn products() -> Result<(), SeedError> {
    dotenvy::dotenv().ok();

    let database_url = database_url_from_env()?;
    let pool = db::create_pool(&database_url)?;
    let store = PgProductStore::new(pool);

    let products = catalog(Utc::now());
    let total = products.len();
    let mut failed = 0;

    info!(total, "Seeding products");
    for product in &products {
        match store.upsert(product).await {
            Ok(()) => info!(id = %product.id, name = %product.name, "Upserted product"),
            Err(e) => {
                failed += 1;
                error!(id = %product.id, error = %e, "Failed to upsert product");
            }
        }
    }

    if failed > 0 {
        return Err(SeedError::Incomplete(failed, total));
    }
    info!("Seeding complete!");
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_products_are_orderable() {
        let products = catalog(Utc::now());
        assert_eq!(products.len(), 5);
        for product in &products {
            assert!(!product.price.is_zero());
            assert!(product.stock > 0);
            assert_eq!(product.grind_options.len(), 3);
            assert_eq!(product.default_weight(), 100);
        }
    }

    #[test]
    fn test_catalog_ids_are_unique() {
        let products = catalog(Utc::now());
        let mut ids: Vec<_> = products.iter().map(|p| p.id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), products.len());
    }
}
