//! Product documents and the built-in fallback catalog.
//!
//! Products are stored as JSON documents (camelCase keys) in the catalog store.
//! When the store cannot be reached the storefront serves [`fallback_products`]
//! so the shop stays browsable. The fallback is a degraded mode, not a cache:
//! it does not reflect real inventory.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{ProductId, Yen};

/// A product document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    /// Whole-bean price; other grind options are priced relative to it.
    pub price: Yen,
    pub image_url: String,
    pub stock: u32,
    /// Display labels of the grind options on offer.
    #[serde(default)]
    pub grind_options: Vec<String>,
    /// Package weights in grams.
    #[serde(default)]
    pub weight_options: Vec<u32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// The package weight shown in line names (first option, 100g otherwise).
    #[must_use]
    pub fn default_weight(&self) -> u32 {
        self.weight_options.first().copied().unwrap_or(100)
    }
}

/// Timestamp used for the built-in products (2025-03-01T00:00:00Z).
const FALLBACK_TIMESTAMP: i64 = 1_740_787_200;

/// The built-in product list served when the catalog store is unreachable.
#[must_use]
pub fn fallback_products() -> Vec<Product> {
    let stamp = DateTime::from_timestamp(FALLBACK_TIMESTAMP, 0).unwrap_or_default();

    vec![Product {
        id: ProductId::new("1"),
        name: "SETO Blend Coffee".to_string(),
        description: "コーヒーの奥深い世界への「最初の一歩」をテーマにした特別なブレンドです。\n\n\
            厳選された2種類のシングルオリジンを絶妙な配合でブレンドし、深煎りと浅煎りの絶妙なバランスを実現しました。\n\n\
            王道のコーヒーの味が好きな方にとって、コーヒーの奥深い世界へ踏み出す「最初の一歩目」となるような、特別なコーヒーです。"
            .to_string(),
        price: Yen::new(1200),
        image_url: "/images/seto-blend-package.jpeg".to_string(),
        stock: 100,
        grind_options: vec![
            "豆のまま".to_string(),
            "挽いた状態".to_string(),
            "ドリップバッグ".to_string(),
        ],
        weight_options: vec![100],
        created_at: stamp,
        updated_at: stamp,
    }]
}

/// Look up a single built-in product.
#[must_use]
pub fn fallback_product(id: &ProductId) -> Option<Product> {
    fallback_products().into_iter().find(|p| &p.id == id)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_has_seto_blend() {
        let products = fallback_products();
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].price, Yen::new(1200));
        assert_eq!(products[0].default_weight(), 100);

        let paragraphs: Vec<&str> = products[0].description.split("\n\n").collect();
        assert_eq!(paragraphs.len(), 3);
        assert!(paragraphs[2].starts_with("王道のコーヒーの味が好きな方にとって"));
    }

    #[test]
    fn test_fallback_product_lookup() {
        assert!(fallback_product(&ProductId::new("1")).is_some());
        assert!(fallback_product(&ProductId::new("999")).is_none());
    }

    #[test]
    fn test_product_document_uses_camel_case() {
        let json = serde_json::to_value(&fallback_products()[0]).unwrap();
        assert!(json.get("imageUrl").is_some());
        assert!(json.get("grindOptions").is_some());
        assert_eq!(json["price"], 1200);
    }
}
