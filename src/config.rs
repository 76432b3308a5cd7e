//! Environment-scoped configuration snapshot.
//!
//! One `AppConfig` is loaded at process start for an environment token
//! (`dev`/`uat`/`prod`) resolved from CLI argument, then the `REFGUARD_ENV`
//! variable, then the `dev` default. The snapshot is read-only; callers that
//! need fresh settings reload explicitly.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{DomainError, DomainResult};
use crate::rules::model::normalize_product_type;

const VALID_ENVS: [&str; 3] = ["dev", "uat", "prod"];

/// Resolve the environment token: explicit argument, `REFGUARD_ENV`, `dev`.
pub fn resolve_env(arg: Option<&str>) -> DomainResult<String> {
    let env = arg
        .map(str::to_string)
        .or_else(|| std::env::var("REFGUARD_ENV").ok())
        .unwrap_or_else(|| "dev".to_string())
        .to_lowercase();

    if !VALID_ENVS.contains(&env.as_str()) {
        return Err(DomainError::Config(format!(
            "invalid environment '{}' (expected one of: {})",
            env,
            VALID_ENVS.join(", ")
        )));
    }
    Ok(env)
}

/// Which data backend serves datasets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Csv,
    Database,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub data_loader: DataLoaderConfig,
    #[serde(default)]
    pub rules: RulesConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub batch: BatchConfig,
    /// Environment token the snapshot was loaded for; not part of the file.
    #[serde(skip)]
    pub env: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DataLoaderConfig {
    #[serde(rename = "type", default = "default_backend")]
    pub backend: String,
    #[serde(default)]
    pub csv: CsvConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
}

impl Default for DataLoaderConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            csv: CsvConfig::default(),
            database: DatabaseConfig::default(),
        }
    }
}

/// Region-nested exchange map: product -> region -> exchange -> data source.
pub type ExchangeTree = BTreeMap<String, BTreeMap<String, BTreeMap<String, String>>>;

#[derive(Debug, Clone, Deserialize)]
pub struct CsvConfig {
    #[serde(default = "default_data_folder")]
    pub data_folder: String,
    #[serde(default = "default_csv_ttl")]
    pub cache_ttl_seconds: u64,
    #[serde(default)]
    pub exchange_map: ExchangeTree,
}

impl Default for CsvConfig {
    fn default() -> Self {
        Self {
            data_folder: default_data_folder(),
            cache_ttl_seconds: default_csv_ttl(),
            exchange_map: ExchangeTree::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct DatabaseConfig {
    /// Keyed `"{region}_{env}"`, e.g. `"apac_uat"`.
    #[serde(default)]
    pub connection_strings: BTreeMap<String, String>,
    /// Per-product query template with an `:exchange` bind placeholder.
    #[serde(default)]
    pub query_templates: BTreeMap<String, String>,
    #[serde(default)]
    pub pool: PoolConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PoolConfig {
    #[serde(default = "default_pool_size")]
    pub size: u32,
    #[serde(default = "default_pool_overflow")]
    pub max_overflow: u32,
    #[serde(default = "default_pool_recycle")]
    pub recycle_seconds: u64,
    #[serde(default = "default_pre_ping")]
    pub pre_ping: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            size: default_pool_size(),
            max_overflow: default_pool_overflow(),
            recycle_seconds: default_pool_recycle(),
            pre_ping: default_pre_ping(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RulesConfig {
    #[serde(default = "default_rules_dir")]
    pub rules_dir: String,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self { rules_dir: default_rules_dir() }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_exchange_list_ttl")]
    pub exchange_list_ttl_seconds: u64,
    #[serde(default = "default_validation_ttl")]
    pub validation_default_ttl_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            exchange_list_ttl_seconds: default_exchange_list_ttl(),
            validation_default_ttl_seconds: default_validation_ttl(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self { base_url: default_base_url(), port: default_port() }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BatchConfig {
    #[serde(default = "default_workers")]
    pub workers_per_region: usize,
    #[serde(default = "default_regions_file")]
    pub regions_file: String,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            workers_per_region: default_workers(),
            regions_file: default_regions_file(),
        }
    }
}

fn default_backend() -> String {
    "csv".to_string()
}
fn default_data_folder() -> String {
    "data".to_string()
}
fn default_csv_ttl() -> u64 {
    300
}
fn default_pool_size() -> u32 {
    5
}
fn default_pool_overflow() -> u32 {
    15
}
fn default_pool_recycle() -> u64 {
    3600
}
fn default_pre_ping() -> bool {
    true
}
fn default_rules_dir() -> String {
    "config/rules".to_string()
}
fn default_exchange_list_ttl() -> u64 {
    600
}
fn default_validation_ttl() -> u64 {
    300
}
fn default_base_url() -> String {
    "http://127.0.0.1:5006".to_string()
}
fn default_port() -> u16 {
    5006
}
fn default_workers() -> usize {
    4
}
fn default_regions_file() -> String {
    "config/regions.yaml".to_string()
}

impl AppConfig {
    /// Load the snapshot for the resolved environment.
    ///
    /// Looks for `config_{env}.json` in the config directory
    /// (`REFGUARD_CONFIG_DIR`, default `config/`), falling back to a plain
    /// `config.json`. A missing file or invalid JSON is fatal.
    pub fn load(env_arg: Option<&str>) -> DomainResult<Self> {
        let env = resolve_env(env_arg)?;
        let dir = std::env::var("REFGUARD_CONFIG_DIR").unwrap_or_else(|_| "config".to_string());
        let dir = PathBuf::from(dir);

        let primary = dir.join(format!("config_{env}.json"));
        let fallback = dir.join("config.json");
        let path: &Path = if primary.exists() {
            &primary
        } else if fallback.exists() {
            tracing::warn!(
                "config_{}.json not found, using {}",
                env,
                fallback.display()
            );
            &fallback
        } else {
            return Err(DomainError::Config(format!(
                "config file not found (tried {} and {})",
                primary.display(),
                fallback.display()
            )));
        };

        let raw = std::fs::read_to_string(path)
            .map_err(|e| DomainError::Config(format!("cannot read {}: {e}", path.display())))?;
        let mut config = Self::from_json_str(&raw)?;
        config.env = env;
        tracing::info!("loaded configuration from {} (env: {})", path.display(), config.env);
        Ok(config)
    }

    pub fn from_json_str(raw: &str) -> DomainResult<Self> {
        serde_json::from_str(raw).map_err(|e| DomainError::Config(format!("invalid JSON config: {e}")))
    }

    pub fn backend(&self) -> DomainResult<BackendKind> {
        match self.data_loader.backend.as_str() {
            "csv" => Ok(BackendKind::Csv),
            "database" | "db" => Ok(BackendKind::Database),
            other => Err(DomainError::Config(format!("unknown data loader type '{other}'"))),
        }
    }

    pub fn data_folder(&self) -> &str {
        &self.data_loader.csv.data_folder
    }

    pub fn rules_dir(&self) -> &str {
        &self.rules.rules_dir
    }

    pub fn csv_cache_ttl(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.data_loader.csv.cache_ttl_seconds)
    }

    /// Exchange -> data source map for a product, flattened across regions.
    pub fn csv_exchange_map(&self, product_type: &str) -> BTreeMap<String, String> {
        let product = normalize_product_type(product_type);
        let mut flat = BTreeMap::new();
        if let Some(regions) = self.data_loader.csv.exchange_map.get(&product) {
            for exchanges in regions.values() {
                for (exchange, source) in exchanges {
                    flat.insert(exchange.clone(), source.clone());
                }
            }
        }
        flat
    }

    /// Exchange codes for a product, sorted.
    pub fn exchange_codes(&self, product_type: &str) -> Vec<String> {
        self.csv_exchange_map(product_type).into_keys().collect()
    }

    /// The region-nested tree, optionally narrowed to a product.
    pub fn exchanges_by_region(&self, product_type: Option<&str>) -> ExchangeTree {
        match product_type {
            None => self.data_loader.csv.exchange_map.clone(),
            Some(raw) => {
                let product = normalize_product_type(raw);
                self.data_loader
                    .csv
                    .exchange_map
                    .get(&product)
                    .map(|regions| {
                        let mut tree = ExchangeTree::new();
                        tree.insert(product, regions.clone());
                        tree
                    })
                    .unwrap_or_default()
            }
        }
    }

    /// All configured product types.
    pub fn product_types(&self) -> Vec<String> {
        self.data_loader.csv.exchange_map.keys().cloned().collect()
    }

    pub fn connection_string(&self, region: &str, env: &str) -> DomainResult<&str> {
        let key = format!("{}_{}", region.to_lowercase(), env.to_lowercase());
        self.data_loader
            .database
            .connection_strings
            .get(&key)
            .map(String::as_str)
            .ok_or_else(|| {
                DomainError::Config(format!("no database connection string for '{key}'"))
            })
    }

    /// Any configured connection string, preferring the current env.
    pub fn default_connection_string(&self) -> Option<&str> {
        let suffix = format!("_{}", self.env);
        self.data_loader
            .database
            .connection_strings
            .iter()
            .find(|(k, _)| k.ends_with(&suffix))
            .or_else(|| self.data_loader.database.connection_strings.iter().next())
            .map(|(_, v)| v.as_str())
    }

    pub fn query_template(&self, product_type: &str) -> Option<&str> {
        let product = normalize_product_type(product_type);
        self.data_loader.database.query_templates.get(&product).map(String::as_str)
    }

    pub fn pool(&self) -> &PoolConfig {
        &self.data_loader.database.pool
    }
}
