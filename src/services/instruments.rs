//! Read-only instrument queries against the data loader.
//!
//! Serves point reads (by RIC, by MasterId), paginated listings, and
//! server-side column filters. Every returned record normalizes
//! NaN-equivalents to null so responses are JSON-clean.

use polars::prelude::*;
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::config::AppConfig;
use crate::error::{DomainError, DomainResult};
use crate::expectations::extract_cells;
use crate::loaders::{DataLoader, Page};
use crate::rules::model::normalize_product_type;

/// Columns every filtered-instrument record is projected to; the filter
/// column is appended when not already present.
pub const INSTRUMENT_DETAIL_COLS: [&str; 4] = ["MasterId", "RIC", "Sedol", "Exchange"];

pub type Record = Map<String, Value>;

pub struct InstrumentService {
    loader: Arc<dyn DataLoader>,
    config: Arc<AppConfig>,
}

impl InstrumentService {
    pub fn new(loader: Arc<dyn DataLoader>, config: Arc<AppConfig>) -> Self {
        Self { loader, config }
    }

    fn exchanges(&self, product_type: &str) -> Vec<String> {
        self.config.exchange_codes(product_type)
    }

    fn ensure_exchange(&self, product_type: &str, exchange: &str) -> DomainResult<()> {
        let available = self.exchanges(product_type);
        if available.iter().any(|e| e == exchange) {
            Ok(())
        } else {
            Err(DomainError::ExchangeNotFound { exchange: exchange.to_string(), available })
        }
    }

    /// Exact match on `RIC`. Without an exchange, every configured exchange
    /// is scanned (CSV backend only; DB queries need the exchange bind).
    pub async fn find_by_ric(
        &self,
        product_type: &str,
        ric: &str,
        exchange: Option<&str>,
    ) -> DomainResult<Vec<Record>> {
        let product = normalize_product_type(product_type);
        match exchange {
            Some(ex) => {
                self.ensure_exchange(&product, ex)?;
                let df = self.loader.load(&product, ex, Page::all()).await?;
                let rows = matching_rows(&df, "RIC", ric)?;
                records_at(&df, &rows, None)
            }
            None => {
                self.require_scan_capable()?;
                let mut out = Vec::new();
                for ex in self.exchanges(&product) {
                    let Ok(df) = self.loader.load(&product, &ex, Page::all()).await else {
                        continue;
                    };
                    if let Ok(rows) = matching_rows(&df, "RIC", ric) {
                        out.extend(records_at(&df, &rows, None)?);
                    }
                }
                Ok(out)
            }
        }
    }

    /// Exact match on `MasterId`, string-compared. Returns the record and
    /// the exchange it was found on.
    pub async fn find_by_masterid(
        &self,
        product_type: &str,
        master_id: &str,
        exchange: Option<&str>,
    ) -> DomainResult<Option<(String, Record)>> {
        let product = normalize_product_type(product_type);
        let exchanges: Vec<String> = match exchange {
            Some(ex) => {
                self.ensure_exchange(&product, ex)?;
                vec![ex.to_string()]
            }
            None => {
                self.require_scan_capable()?;
                self.exchanges(&product)
            }
        };

        for ex in exchanges {
            let Ok(df) = self.loader.load(&product, &ex, Page::all()).await else {
                continue;
            };
            let Ok(rows) = matching_rows(&df, "MasterId", master_id) else {
                continue;
            };
            if let Some(first) = rows.first() {
                let mut records = records_at(&df, &[*first], None)?;
                return Ok(records.pop().map(|r| (ex, r)));
            }
        }
        Ok(None)
    }

    /// Paginated listing of one exchange.
    pub async fn get_by_exchange(
        &self,
        product_type: &str,
        exchange: &str,
        limit: Option<usize>,
        offset: Option<usize>,
    ) -> DomainResult<Value> {
        let product = normalize_product_type(product_type);
        self.ensure_exchange(&product, exchange)?;
        let df = self.loader.load(&product, exchange, Page::new(limit, offset)).await?;
        let rows: Vec<usize> = (0..df.height()).collect();
        let records = records_at(&df, &rows, None)?;
        Ok(serde_json::json!({
            "exchange": exchange,
            "count": records.len(),
            "instruments": records,
        }))
    }

    /// Rows whose `column` value is one of `values`, or missing when
    /// `include_missing`. With no values and `include_missing` false the
    /// result is empty by definition.
    pub async fn filter_by_column_values(
        &self,
        product_type: &str,
        exchange: &str,
        column: &str,
        values: &[String],
        include_missing: bool,
    ) -> DomainResult<Vec<Record>> {
        let product = normalize_product_type(product_type);
        self.ensure_exchange(&product, exchange)?;
        if values.is_empty() && !include_missing {
            return Ok(Vec::new());
        }

        let df = self.loader.load(&product, exchange, Page::all()).await?;
        let cells = extract_cells(&df, column)?;
        let wanted: Vec<&str> = values.iter().map(|v| v.trim()).collect();
        let rows: Vec<usize> = cells
            .cells
            .iter()
            .filter(|cell| {
                (include_missing && cell.is_missing())
                    || (!cell.is_missing() && wanted.contains(&cell.trimmed()))
            })
            .map(|cell| cell.row)
            .collect();

        let mut projection: Vec<String> = INSTRUMENT_DETAIL_COLS
            .iter()
            .filter(|c| df.get_column_names().iter().any(|n| n.as_str() == **c))
            .map(|c| c.to_string())
            .collect();
        if !projection.iter().any(|c| c == column)
            && df.get_column_names().iter().any(|n| n.as_str() == column)
        {
            projection.push(column.to_string());
        }
        records_at(&df, &rows, Some(&projection))
    }

    fn require_scan_capable(&self) -> DomainResult<()> {
        if self.loader.backend() == "database" {
            return Err(DomainError::InvalidRequest(
                "exchange is required for the database backend".to_string(),
            ));
        }
        Ok(())
    }
}

/// Positions of rows whose trimmed value equals `needle`.
fn matching_rows(df: &DataFrame, column: &str, needle: &str) -> DomainResult<Vec<usize>> {
    let cells = extract_cells(df, column)?;
    Ok(cells
        .cells
        .iter()
        .filter(|cell| !cell.is_missing() && cell.trimmed() == needle.trim())
        .map(|cell| cell.row)
        .collect())
}

/// Convert selected dataset rows to JSON records, optionally projected to a
/// column subset. NaN floats come back as null.
pub(crate) fn records_at(
    df: &DataFrame,
    rows: &[usize],
    projection: Option<&[String]>,
) -> DomainResult<Vec<Record>> {
    let columns: Vec<&polars::prelude::Column> = match projection {
        None => df.get_columns().iter().collect(),
        Some(names) => names
            .iter()
            .filter_map(|name| df.get_columns().iter().find(|c| c.name().as_str() == name))
            .collect(),
    };

    let mut records = Vec::with_capacity(rows.len());
    for &row in rows {
        let mut record = Record::new();
        for col in &columns {
            let value = col.as_materialized_series().get(row)?;
            record.insert(col.name().to_string(), any_value_to_json(value));
        }
        records.push(record);
    }
    Ok(records)
}

fn any_value_to_json(value: AnyValue) -> Value {
    match value {
        AnyValue::Null => Value::Null,
        AnyValue::Boolean(b) => Value::Bool(b),
        AnyValue::String(s) => Value::String(s.to_string()),
        AnyValue::StringOwned(s) => Value::String(s.to_string()),
        AnyValue::Int8(v) => Value::from(v),
        AnyValue::Int16(v) => Value::from(v),
        AnyValue::Int32(v) => Value::from(v),
        AnyValue::Int64(v) => Value::from(v),
        AnyValue::UInt8(v) => Value::from(v),
        AnyValue::UInt16(v) => Value::from(v),
        AnyValue::UInt32(v) => Value::from(v),
        AnyValue::UInt64(v) => Value::from(v),
        AnyValue::Float32(v) => float_to_json(v as f64),
        AnyValue::Float64(v) => float_to_json(v),
        other => Value::String(other.to_string()),
    }
}

fn float_to_json(v: f64) -> Value {
    if v.is_nan() || v.is_infinite() {
        Value::Null
    } else {
        serde_json::Number::from_f64(v).map(Value::Number).unwrap_or(Value::Null)
    }
}
