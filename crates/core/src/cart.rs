//! Cart store.
//!
//! A cart is an ordered list of lines keyed by variant id. Adding a variant that
//! is already present sums the quantities; setting a quantity to zero or below
//! removes the line, so every line in a cart has `quantity >= 1`.
//!
//! Carts are persisted as a [`CartSnapshot`] carrying a schema version. Loading
//! a snapshot with a different version is rejected so callers can start from an
//! empty cart instead of misreading old data.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::Product;
use crate::types::{ProductId, Yen};

/// Current cart snapshot schema version.
pub const CART_SCHEMA_VERSION: u32 = 1;

/// Extra charge for gift wrapping, per unit.
pub const GIFT_WRAP_SURCHARGE: Yen = Yen::new(300);

/// Errors produced by cart mutations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartError {
    #[error("quantity must be at least 1")]
    InvalidQuantity,
    #[error("cart item not found: {0}")]
    ItemNotFound(String),
    #[error("grind option {grind} is not offered for product {product_id}")]
    GrindUnavailable { product_id: ProductId, grind: GrindType },
    #[error("unsupported cart schema version {0}")]
    UnsupportedVersion(u32),
}

/// How the beans are prepared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrindType {
    WholeBean,
    Ground,
    /// Box of five drip bags.
    DripBag,
}

impl GrindType {
    /// Display label, matching the product document's `grindOptions`.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::WholeBean => "豆のまま",
            Self::Ground => "挽いた状態",
            Self::DripBag => "ドリップバッグ",
        }
    }

    /// Label used inside cart line names.
    #[must_use]
    pub const fn line_label(self) -> &'static str {
        match self {
            Self::DripBag => "ドリップバッグ(5個入り)",
            other => other.label(),
        }
    }

    /// Price difference to the whole-bean price.
    #[must_use]
    pub const fn surcharge(self) -> Yen {
        match self {
            Self::WholeBean => Yen::ZERO,
            Self::Ground => Yen::new(300),
            Self::DripBag => Yen::new(800),
        }
    }

    /// Stable machine name used in variant ids.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::WholeBean => "whole_bean",
            Self::Ground => "ground",
            Self::DripBag => "drip_bag",
        }
    }
}

impl std::fmt::Display for GrindType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A product variant about to be added to the cart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCartItem {
    pub id: String,
    pub product_id: ProductId,
    pub name: String,
    pub unit_price: Yen,
    pub grind_type: GrindType,
    pub image_url: Option<String>,
    pub gift: bool,
}

impl NewCartItem {
    /// Price a product variant from its catalog document.
    ///
    /// # Errors
    ///
    /// Returns `CartError::GrindUnavailable` if the product does not list the
    /// requested grind option.
    pub fn for_product(
        product: &Product,
        grind_type: GrindType,
        gift: bool,
    ) -> Result<Self, CartError> {
        if !product.grind_options.iter().any(|g| g == grind_type.label()) {
            return Err(CartError::GrindUnavailable {
                product_id: product.id.clone(),
                grind: grind_type,
            });
        }

        let mut unit_price = product.price + grind_type.surcharge();
        let mut name = format!(
            "{} ({}g, {})",
            product.name,
            product.default_weight(),
            grind_type.line_label()
        );
        if gift {
            unit_price = unit_price + GIFT_WRAP_SURCHARGE;
            name.push_str(" (ギフト包装あり)");
        }

        Ok(Self {
            id: variant_id(&product.id, grind_type, gift),
            product_id: product.id.clone(),
            name,
            unit_price,
            grind_type,
            image_url: Some(product.image_url.clone()),
            gift,
        })
    }
}

/// Variant id used as the cart merge key.
#[must_use]
pub fn variant_id(product_id: &ProductId, grind_type: GrindType, gift: bool) -> String {
    if gift {
        format!("{product_id}:{grind_type}:gift")
    } else {
        format!("{product_id}:{grind_type}")
    }
}

/// A line in the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub id: String,
    pub product_id: ProductId,
    pub name: String,
    #[serde(rename = "price")]
    pub unit_price: Yen,
    pub quantity: u32,
    pub grind_type: GrindType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default)]
    pub gift: bool,
}

impl CartItem {
    /// `unit_price × quantity`.
    #[must_use]
    pub fn line_total(&self) -> Yen {
        self.unit_price.times(self.quantity)
    }
}

/// Persisted form of a cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartSnapshot {
    pub version: u32,
    pub items: Vec<CartItem>,
}

/// The cart store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cart {
    items: Vec<CartItem>,
}

impl Cart {
    /// Create an empty cart.
    #[must_use]
    pub const fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Rehydrate a cart from its persisted snapshot.
    ///
    /// Lines with a zero quantity are dropped.
    ///
    /// # Errors
    ///
    /// Returns `CartError::UnsupportedVersion` if the snapshot was written by a
    /// different schema version.
    pub fn from_snapshot(snapshot: CartSnapshot) -> Result<Self, CartError> {
        if snapshot.version != CART_SCHEMA_VERSION {
            return Err(CartError::UnsupportedVersion(snapshot.version));
        }
        let items = snapshot
            .items
            .into_iter()
            .filter(|item| item.quantity > 0)
            .collect();
        Ok(Self { items })
    }

    /// Persisted form of this cart.
    #[must_use]
    pub fn snapshot(&self) -> CartSnapshot {
        CartSnapshot {
            version: CART_SCHEMA_VERSION,
            items: self.items.clone(),
        }
    }

    /// Lines in insertion order.
    #[must_use]
    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    /// Whether the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Look up a line by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&CartItem> {
        self.items.iter().find(|item| item.id == id)
    }

    /// Add `quantity` units of a variant, merging with an existing line.
    ///
    /// # Errors
    ///
    /// Returns `CartError::InvalidQuantity` for a zero quantity or if the merged
    /// quantity would overflow.
    pub fn add(&mut self, item: NewCartItem, quantity: u32) -> Result<(), CartError> {
        if quantity == 0 {
            return Err(CartError::InvalidQuantity);
        }

        if let Some(existing) = self.items.iter_mut().find(|i| i.id == item.id) {
            existing.quantity = existing
                .quantity
                .checked_add(quantity)
                .ok_or(CartError::InvalidQuantity)?;
            return Ok(());
        }

        self.items.push(CartItem {
            id: item.id,
            product_id: item.product_id,
            name: item.name,
            unit_price: item.unit_price,
            quantity,
            grind_type: item.grind_type,
            image_url: item.image_url,
            gift: item.gift,
        });
        Ok(())
    }

    /// Remove a line. Returns whether a line was removed.
    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.items.len();
        self.items.retain(|item| item.id != id);
        self.items.len() != before
    }

    /// Set the quantity of a line; zero or below removes it.
    ///
    /// # Errors
    ///
    /// Returns `CartError::ItemNotFound` when setting a positive quantity on a
    /// line that does not exist, and `CartError::InvalidQuantity` if the value
    /// does not fit a line quantity.
    pub fn set_quantity(&mut self, id: &str, quantity: i64) -> Result<(), CartError> {
        if quantity <= 0 {
            self.remove(id);
            return Ok(());
        }

        let quantity = u32::try_from(quantity).map_err(|_| CartError::InvalidQuantity)?;
        let item = self
            .items
            .iter_mut()
            .find(|item| item.id == id)
            .ok_or_else(|| CartError::ItemNotFound(id.to_owned()))?;
        item.quantity = quantity;
        Ok(())
    }

    /// Remove every line.
    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Σ unit price × quantity.
    #[must_use]
    pub fn total(&self) -> Yen {
        self.items.iter().map(CartItem::line_total).sum()
    }

    /// Σ quantity.
    #[must_use]
    pub fn total_items(&self) -> u64 {
        self.items.iter().map(|item| u64::from(item.quantity)).sum()
    }

    /// Consume the cart and return its lines.
    #[must_use]
    pub fn into_items(self) -> Vec<CartItem> {
        self.items
    }
}
