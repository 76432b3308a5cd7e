//! Relational backend over a pooled Postgres connection.
//!
//! Each product type maps to a query template carrying an `:exchange` bind
//! placeholder; pagination is appended as LIMIT/OFFSET. Connections are
//! borrowed per query and released on every exit path by the pool guard.

use async_trait::async_trait;
use polars::prelude::*;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{Column as SqlxColumn, PgPool, Row, TypeInfo};
use std::collections::BTreeMap;
use std::time::Duration;

use super::{DataLoader, Page};
use crate::config::AppConfig;
use crate::error::{DomainError, DomainResult};
use crate::rules::model::normalize_product_type;

pub struct DatabaseDataLoader {
    pool: PgPool,
    query_templates: BTreeMap<String, String>,
    /// product -> valid exchange codes, from configuration
    exchange_codes: BTreeMap<String, Vec<String>>,
}

impl DatabaseDataLoader {
    pub async fn connect(config: &AppConfig) -> DomainResult<Self> {
        let conn = config.default_connection_string().ok_or_else(|| {
            DomainError::Config("database backend selected but no connection string configured".into())
        })?;
        let pool_cfg = config.pool();
        let pool = PgPoolOptions::new()
            .max_connections(pool_cfg.size + pool_cfg.max_overflow)
            .max_lifetime(Duration::from_secs(pool_cfg.recycle_seconds))
            .test_before_acquire(pool_cfg.pre_ping)
            .connect(conn)
            .await?;

        let mut exchange_codes = BTreeMap::new();
        for product in config.product_types() {
            exchange_codes.insert(product.clone(), config.exchange_codes(&product));
        }

        Ok(Self {
            pool,
            query_templates: config.data_loader.database.query_templates.clone(),
            exchange_codes,
        })
    }

    fn query_for(&self, product_type: &str, page: Page) -> DomainResult<String> {
        let product = normalize_product_type(product_type);
        let template = self.query_templates.get(&product).ok_or_else(|| {
            DomainError::Config(format!("no query template configured for product '{product}'"))
        })?;
        let mut sql = template.replace(":exchange", "$1");
        if let Some(limit) = page.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        if let Some(offset) = page.offset {
            sql.push_str(&format!(" OFFSET {offset}"));
        }
        Ok(sql)
    }

    fn check_exchange(&self, product_type: &str, exchange: &str) -> DomainResult<()> {
        let product = normalize_product_type(product_type);
        if let Some(codes) = self.exchange_codes.get(&product) {
            if !codes.is_empty() && !codes.iter().any(|c| c == exchange) {
                return Err(DomainError::ExchangeNotFound {
                    exchange: exchange.to_string(),
                    available: codes.clone(),
                });
            }
        }
        Ok(())
    }
}

#[async_trait]
impl DataLoader for DatabaseDataLoader {
    fn backend(&self) -> &'static str {
        "database"
    }

    async fn load(&self, product_type: &str, exchange: &str, page: Page) -> DomainResult<DataFrame> {
        self.check_exchange(product_type, exchange)?;
        let sql = self.query_for(product_type, page)?;
        let rows = sqlx::query(&sql).bind(exchange).fetch_all(&self.pool).await?;
        rows_to_dataframe(&rows)
    }

    async fn stats(&self) -> serde_json::Value {
        serde_json::json!({
            "backend": "database",
            "pool_connections": self.pool.size(),
            "pool_idle": self.pool.num_idle(),
        })
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

/// Map Postgres rows onto a columnar frame. Unsupported column types decode
/// to nulls rather than failing the whole load.
fn rows_to_dataframe(rows: &[PgRow]) -> DomainResult<DataFrame> {
    let Some(first) = rows.first() else {
        return Ok(DataFrame::default());
    };

    let mut columns: Vec<polars::prelude::Column> = Vec::with_capacity(first.columns().len());
    for (index, col) in first.columns().iter().enumerate() {
        let name = col.name();
        let type_name = col.type_info().name().to_uppercase();

        let series = match type_name.as_str() {
            "INT2" => {
                let values: Vec<Option<i64>> = rows
                    .iter()
                    .map(|r| r.try_get::<Option<i16>, _>(index).unwrap_or(None).map(i64::from))
                    .collect();
                Series::new(name.into(), values)
            }
            "INT4" => {
                let values: Vec<Option<i64>> = rows
                    .iter()
                    .map(|r| r.try_get::<Option<i32>, _>(index).unwrap_or(None).map(i64::from))
                    .collect();
                Series::new(name.into(), values)
            }
            "INT8" => {
                let values: Vec<Option<i64>> =
                    rows.iter().map(|r| r.try_get::<Option<i64>, _>(index).unwrap_or(None)).collect();
                Series::new(name.into(), values)
            }
            "FLOAT4" => {
                let values: Vec<Option<f64>> = rows
                    .iter()
                    .map(|r| r.try_get::<Option<f32>, _>(index).unwrap_or(None).map(f64::from))
                    .collect();
                Series::new(name.into(), values)
            }
            "FLOAT8" => {
                let values: Vec<Option<f64>> =
                    rows.iter().map(|r| r.try_get::<Option<f64>, _>(index).unwrap_or(None)).collect();
                Series::new(name.into(), values)
            }
            "BOOL" => {
                let values: Vec<Option<bool>> =
                    rows.iter().map(|r| r.try_get::<Option<bool>, _>(index).unwrap_or(None)).collect();
                Series::new(name.into(), values)
            }
            "TEXT" | "VARCHAR" | "BPCHAR" | "CHAR" | "NAME" => {
                let values: Vec<Option<String>> =
                    rows.iter().map(|r| r.try_get::<Option<String>, _>(index).unwrap_or(None)).collect();
                Series::new(name.into(), values)
            }
            other => {
                tracing::debug!(column = name, r#type = other, "unsupported column type, mapped to nulls");
                let values: Vec<Option<String>> = vec![None; rows.len()];
                Series::new(name.into(), values)
            }
        };
        columns.push(series.into());
    }

    DataFrame::new(columns).map_err(DomainError::from)
}
