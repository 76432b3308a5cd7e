//! # refguard
//!
//! Data-quality validation for financial instrument reference data.
//!
//! For a (product, exchange) slice, refguard answers which columns violate
//! which declared expectations and on which rows. Declarative YAML rules
//! merge through a layered hierarchy (base, product, exchange,
//! product-exchange, named custom sets, inline rules), compile into a typed
//! expectation suite, and evaluate over a columnar dataset. Results are
//! served over HTTP, swept in batch per region, and persisted for
//! longitudinal analytics.

pub mod batch;
pub mod config;
pub mod engine;
pub mod error;
pub mod expectations;
pub mod loaders;
pub mod logging;
pub mod persistence;
pub mod rules;
pub mod services;

#[cfg(feature = "api-server")]
pub mod api;

#[cfg(feature = "cli")]
pub mod cli;
#[cfg(feature = "cli")]
pub mod commands;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
