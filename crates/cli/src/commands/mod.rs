//! CLI subcommand implementations.

pub mod migrate;
pub mod payment;
pub mod seed;
