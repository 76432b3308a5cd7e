//! CSV file backend with a mutex-guarded in-memory cache.
//!
//! Parsed frames are held for a TTL; entries within the window are returned
//! as cheap copies and the map mutex is held only for lookups and inserts,
//! never across a parse. Values are immutable once published.

use async_trait::async_trait;
use polars::prelude::*;
use polars_io::prelude::CsvReadOptions;
use polars_io::SerReader;
use std::collections::{BTreeMap, HashMap};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use super::{DataLoader, Page};
use crate::config::AppConfig;
use crate::error::{DomainError, DomainResult};
use crate::rules::model::normalize_product_type;

pub struct CsvDataLoader {
    data_folder: PathBuf,
    ttl: Duration,
    /// product -> exchange -> relative file path
    exchange_maps: BTreeMap<String, BTreeMap<String, String>>,
    cache: Mutex<HashMap<PathBuf, (DataFrame, Instant)>>,
}

impl CsvDataLoader {
    pub fn new(
        data_folder: impl Into<PathBuf>,
        exchange_maps: BTreeMap<String, BTreeMap<String, String>>,
        ttl: Duration,
    ) -> Self {
        Self {
            data_folder: data_folder.into(),
            ttl,
            exchange_maps,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        let mut maps = BTreeMap::new();
        for product in config.product_types() {
            maps.insert(product.clone(), config.csv_exchange_map(&product));
        }
        Self::new(config.data_folder(), maps, config.csv_cache_ttl())
    }

    fn source_for(&self, product_type: &str, exchange: &str) -> DomainResult<String> {
        let product = normalize_product_type(product_type);
        let map = self.exchange_maps.get(&product).ok_or_else(|| {
            DomainError::ExchangeNotFound {
                exchange: exchange.to_string(),
                available: Vec::new(),
            }
        })?;
        map.get(exchange).cloned().ok_or_else(|| DomainError::ExchangeNotFound {
            exchange: exchange.to_string(),
            available: map.keys().cloned().collect(),
        })
    }

    fn resolve(&self, source: &str) -> PathBuf {
        let path = Path::new(source);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.data_folder.join(path)
        }
    }

    /// Return the frame for one source file, reading through the cache.
    fn load_source(&self, source: &str) -> DomainResult<DataFrame> {
        let path = self.resolve(source);

        {
            let cache = self.cache.lock().expect("csv cache poisoned");
            if let Some((df, loaded_at)) = cache.get(&path) {
                if loaded_at.elapsed() < self.ttl {
                    tracing::debug!(path = %path.display(), "csv cache hit");
                    return Ok(df.clone());
                }
            }
        }

        tracing::debug!(path = %path.display(), "csv cache miss");
        let df = read_csv(&path)?;

        let mut cache = self.cache.lock().expect("csv cache poisoned");
        cache.insert(path, (df.clone(), Instant::now()));
        Ok(df)
    }
}

fn read_csv(path: &Path) -> DomainResult<DataFrame> {
    if !path.exists() {
        return Err(DomainError::DatasetNotFound(path.display().to_string()));
    }
    let data = std::fs::read(path)?;

    let mut options = CsvReadOptions::default();
    options.has_header = true;

    CsvReader::new(Cursor::new(data))
        .with_options(options)
        .finish()
        .map_err(|e| DomainError::DatasetParse(format!("{}: {e}", path.display())))
}

fn paginate(df: DataFrame, page: Page) -> DataFrame {
    let offset = page.offset.unwrap_or(0);
    let limit = page.limit.unwrap_or(usize::MAX);
    if offset == 0 && limit == usize::MAX {
        df
    } else {
        df.slice(offset as i64, limit)
    }
}

#[async_trait]
impl DataLoader for CsvDataLoader {
    fn backend(&self) -> &'static str {
        "csv"
    }

    async fn load(&self, product_type: &str, exchange: &str, page: Page) -> DomainResult<DataFrame> {
        let source = self.source_for(product_type, exchange)?;
        let df = self.load_source(&source)?;
        Ok(paginate(df, page))
    }

    async fn stats(&self) -> serde_json::Value {
        let cache = self.cache.lock().expect("csv cache poisoned");
        let entries: Vec<serde_json::Value> = cache
            .iter()
            .map(|(path, (_, loaded_at))| {
                let age = loaded_at.elapsed();
                serde_json::json!({
                    "path": path.display().to_string(),
                    "age_seconds": age.as_secs(),
                    "stale": age >= self.ttl,
                })
            })
            .collect();
        serde_json::json!({
            "backend": "csv",
            "entry_count": entries.len(),
            "ttl_seconds": self.ttl.as_secs(),
            "entries": entries,
        })
    }

    async fn warm_up(&self) {
        for (product, map) in &self.exchange_maps {
            for (exchange, source) in map {
                match self.load_source(source) {
                    Ok(df) => tracing::info!(
                        product,
                        exchange,
                        rows = df.height(),
                        "csv warm-up loaded"
                    ),
                    Err(e) => {
                        tracing::warn!(product, exchange, error = %e, "csv warm-up skipped")
                    }
                }
            }
        }
    }

    fn invalidate(&self, source: Option<&str>) {
        let mut cache = self.cache.lock().expect("csv cache poisoned");
        match source {
            None => {
                cache.clear();
                tracing::info!("csv cache fully cleared");
            }
            Some(source) => {
                let key = self.resolve(source);
                cache.remove(&key);
                tracing::debug!(path = %key.display(), "csv cache evicted");
            }
        }
    }
}
