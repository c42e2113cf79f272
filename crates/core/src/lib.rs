//! SETO Coffee Core - Shared domain library.
//!
//! This crate provides the domain types and checkout logic used across all
//! SETO Coffee components:
//! - `storefront` - Public-facing JSON storefront and checkout service
//! - `cli` - Command-line tools for migrations, seeding and payment operations
//!
//! # Architecture
//!
//! The core crate contains only types, validation and state machines - no I/O,
//! no database access, no HTTP clients. This keeps it lightweight and allows the
//! checkout rules to be tested without a running server.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for ids, yen amounts, emails and statuses
//! - [`cart`] - Cart store (merge-by-variant lines, versioned snapshot)
//! - [`shipping`] - Shipping form validation (Japanese postal addresses)
//! - [`order`] - Order record and the order finalizer
//! - [`checkout`] - Payment flow state machine and poll policy
//! - [`catalog`] - Product document and the built-in fallback catalog

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod order;
pub mod shipping;
pub mod types;

pub use types::*;
