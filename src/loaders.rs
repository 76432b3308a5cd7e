//! Data loading layer.
//!
//! A single `DataLoader` capability trait fronts the two backends; callers
//! never branch on the backend type. The factory picks the implementation
//! from configuration.

pub mod csv;
pub mod database;

use async_trait::async_trait;
use polars::prelude::DataFrame;
use std::sync::Arc;

use crate::config::{AppConfig, BackendKind};
use crate::error::DomainResult;

pub use csv::CsvDataLoader;
pub use database::DatabaseDataLoader;

/// Pagination pushed down to the backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct Page {
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl Page {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn new(limit: Option<usize>, offset: Option<usize>) -> Self {
        Self { limit, offset }
    }
}

/// Uniform interface over the dataset backends.
#[async_trait]
pub trait DataLoader: Send + Sync {
    /// Backend tag for health output and request validation.
    fn backend(&self) -> &'static str;

    /// Load the dataset for a (product, exchange) slice. Zero rows is not
    /// an error.
    async fn load(&self, product_type: &str, exchange: &str, page: Page) -> DomainResult<DataFrame>;

    /// Snapshot of cache / pool state for health reporting.
    async fn stats(&self) -> serde_json::Value;

    /// Pre-load whatever the backend can cache. Per-source failures are
    /// warnings, not errors.
    async fn warm_up(&self) {}

    /// Evict one cached source, or everything when `None`.
    fn invalidate(&self, _source: Option<&str>) {}

    /// Release backend resources.
    async fn close(&self) {}
}

/// Build the configured loader.
pub async fn build_loader(config: &AppConfig) -> DomainResult<Arc<dyn DataLoader>> {
    match config.backend()? {
        BackendKind::Csv => Ok(Arc::new(CsvDataLoader::from_config(config))),
        BackendKind::Database => Ok(Arc::new(DatabaseDataLoader::connect(config).await?)),
    }
}
