//! Regional sweep configuration.
//!
//! `regions.yaml` maps region -> product type -> exchange list:
//!
//! ```yaml
//! apac:
//!   stock: [XHKG, XTKS]
//!   option: [XHKG]
//! emea:
//!   stock: [XLON, XPAR]
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{DomainError, DomainResult};
use crate::rules::model::normalize_product_type;

#[derive(Debug, Clone)]
pub struct RegionsConfig {
    regions: BTreeMap<String, BTreeMap<String, Vec<String>>>,
}

impl RegionsConfig {
    pub fn load(path: impl AsRef<Path>) -> DomainResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(DomainError::Config(format!(
                "regions file not found: {}",
                path.display()
            )));
        }
        let raw = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&raw)
    }

    pub fn from_yaml_str(raw: &str) -> DomainResult<Self> {
        let regions: BTreeMap<String, BTreeMap<String, Vec<String>>> =
            serde_yaml::from_str(raw).map_err(|e| {
                DomainError::Config(format!("regions config must map region -> product -> exchanges: {e}"))
            })?;
        Ok(Self { regions })
    }

    pub fn regions(&self) -> Vec<String> {
        self.regions.keys().cloned().collect()
    }

    pub fn contains(&self, region: &str) -> bool {
        self.regions.contains_key(region)
    }

    pub fn product_types(&self, region: &str) -> DomainResult<Vec<String>> {
        self.regions
            .get(region)
            .map(|products| products.keys().cloned().collect())
            .ok_or_else(|| {
                DomainError::Config(format!(
                    "region '{}' not found (available: {})",
                    region,
                    self.regions().join(", ")
                ))
            })
    }

    pub fn exchanges(&self, region: &str, product_type: &str) -> Vec<String> {
        self.regions
            .get(region)
            .and_then(|products| products.get(product_type))
            .cloned()
            .unwrap_or_default()
    }

    /// Every (region, product, exchange) task for one region, product types
    /// normalized to their canonical form.
    pub fn combinations(&self, region: &str) -> Vec<(String, String, String)> {
        let Some(products) = self.regions.get(region) else {
            return Vec::new();
        };
        let mut combos = Vec::new();
        for (product, exchanges) in products {
            for exchange in exchanges {
                combos.push((
                    region.to_string(),
                    normalize_product_type(product),
                    exchange.clone(),
                ));
            }
        }
        combos
    }
}
