//! SETO Coffee Storefront library.
//!
//! This crate provides the storefront functionality as a library,
//! allowing it to be tested and reused (the CLI shares the PayPay client
//! and the product store).

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod catalog;
pub mod checkout;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod paypay;
pub mod routes;
pub mod state;
