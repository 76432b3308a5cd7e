use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::Value;

use super::error::ApiError;
use super::ApiState;
use crate::rules::model::Rule;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

type ApiResult = Result<Json<Value>, ApiError>;

fn product_or_default(product_type: &Option<String>) -> String {
    product_type.clone().unwrap_or_else(|| "stock".to_string())
}

fn csv_list(raw: &Option<String>) -> Option<Vec<String>> {
    raw.as_ref().map(|s| {
        s.split(',').map(str::trim).filter(|v| !v.is_empty()).map(String::from).collect()
    })
}

// ===== REQUEST SHAPES =====

#[derive(Debug, Default, Deserialize)]
pub struct LookupQuery {
    pub product_type: Option<String>,
    pub exchange: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProductQuery {
    pub product_type: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub product_type: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct FilterQuery {
    pub product_type: Option<String>,
    pub column: String,
    pub values: Option<String>,
    #[serde(default)]
    pub missing: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct CustomNamesQuery {
    pub custom_rule_names: Option<String>,
}

/// POST body for validate endpoints; query parameters cover GET.
#[derive(Debug, Default, Deserialize)]
pub struct ValidateBody {
    pub custom_rule_names: Option<Vec<String>>,
    pub custom_rules: Option<Vec<Rule>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RuleDetailQuery {
    pub rule_name: Option<String>,
}

fn merge_custom_inputs(
    query: &CustomNamesQuery,
    body: Option<ValidateBody>,
) -> (Option<Vec<String>>, Option<Vec<Rule>>) {
    let body = body.unwrap_or_default();
    let names = body.custom_rule_names.or_else(|| csv_list(&query.custom_rule_names));
    (names, body.custom_rules)
}

// ===== HEALTH =====

pub async fn health() -> Json<Value> {
    Json(serde_json::json!({"status": "ok", "version": VERSION}))
}

pub async fn health_detailed(State(state): State<ApiState>) -> Json<Value> {
    let loader_stats = state.loader.stats().await;
    Json(serde_json::json!({
        "status": "ok",
        "version": VERSION,
        "environment": state.config.env,
        "data_loader": loader_stats,
        "rules_dir": state.config.rules_dir(),
    }))
}

// ===== INSTRUMENTS =====

pub async fn find_by_ric(
    State(state): State<ApiState>,
    Path(ric): Path<String>,
    Query(query): Query<LookupQuery>,
) -> ApiResult {
    let product = product_or_default(&query.product_type);
    let records = state
        .instruments()
        .find_by_ric(&product, &ric, query.exchange.as_deref())
        .await?;
    if records.is_empty() {
        return Err(crate::error::DomainError::RecordNotFound(format!("RIC '{ric}' not found")).into());
    }
    Ok(Json(serde_json::json!({
        "ric": ric,
        "count": records.len(),
        "instruments": records,
    })))
}

pub async fn find_by_id(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Query(query): Query<LookupQuery>,
) -> ApiResult {
    let product = product_or_default(&query.product_type);
    let found = state
        .instruments()
        .find_by_masterid(&product, &id, query.exchange.as_deref())
        .await?;
    match found {
        Some((exchange, record)) => Ok(Json(serde_json::json!({
            "master_id": id,
            "exchange": exchange,
            "instrument": record,
        }))),
        None => Err(crate::error::DomainError::RecordNotFound(format!(
            "MasterId '{id}' not found"
        ))
        .into()),
    }
}

pub async fn list_exchanges(
    State(state): State<ApiState>,
    Query(query): Query<ProductQuery>,
) -> ApiResult {
    let product = product_or_default(&query.product_type);
    let exchanges = state.config.exchange_codes(&product);
    Ok(Json(serde_json::json!({
        "product_type": product,
        "count": exchanges.len(),
        "exchanges": exchanges,
    })))
}

pub async fn exchanges_by_region(
    State(state): State<ApiState>,
    Query(query): Query<ProductQuery>,
) -> ApiResult {
    let tree = state.config.exchanges_by_region(query.product_type.as_deref());
    Ok(Json(serde_json::to_value(tree).unwrap_or_default()))
}

pub async fn get_by_exchange(
    State(state): State<ApiState>,
    Path(exchange): Path<String>,
    Query(query): Query<PageQuery>,
) -> ApiResult {
    let product = product_or_default(&query.product_type);
    let listing = state
        .instruments()
        .get_by_exchange(&product, &exchange, query.limit, query.offset)
        .await?;
    Ok(Json(listing))
}

pub async fn filter_by_column(
    State(state): State<ApiState>,
    Path(exchange): Path<String>,
    Query(query): Query<FilterQuery>,
) -> ApiResult {
    let product = product_or_default(&query.product_type);
    let values = csv_list(&query.values).unwrap_or_default();
    let records = state
        .instruments()
        .filter_by_column_values(&product, &exchange, &query.column, &values, query.missing)
        .await?;
    Ok(Json(serde_json::json!({
        "exchange": exchange,
        "column": query.column,
        "count": records.len(),
        "instruments": records,
    })))
}

// ===== VALIDATION =====

pub async fn validate(
    State(state): State<ApiState>,
    Path((product_type, exchange)): Path<(String, String)>,
    Query(query): Query<CustomNamesQuery>,
    body: Option<Json<ValidateBody>>,
) -> ApiResult {
    let (names, inline) = merge_custom_inputs(&query, body.map(|Json(b)| b));
    let report = state
        .validation()
        .validate_exchange(&product_type, &exchange, names.as_deref(), inline.as_deref())
        .await?;
    Ok(Json(serde_json::to_value(&report).unwrap_or_default()))
}

pub async fn validate_custom(
    State(state): State<ApiState>,
    Path((product_type, exchange)): Path<(String, String)>,
    Query(query): Query<CustomNamesQuery>,
    body: Option<Json<ValidateBody>>,
) -> ApiResult {
    let (names, inline) = merge_custom_inputs(&query, body.map(|Json(b)| b));
    let report = state
        .validation()
        .validate_custom_only(&product_type, &exchange, names.as_deref(), inline.as_deref())
        .await?;
    Ok(Json(serde_json::to_value(&report).unwrap_or_default()))
}

pub async fn rules_for_exchange(
    State(state): State<ApiState>,
    Path((product_type, exchange)): Path<(String, String)>,
    Query(query): Query<CustomNamesQuery>,
) -> ApiResult {
    let names = csv_list(&query.custom_rule_names);
    let rules = state
        .validation()
        .rules_for_exchange(&product_type, &exchange, names.as_deref())?;
    Ok(Json(serde_json::json!({
        "exchange": exchange,
        "product_type": crate::rules::model::normalize_product_type(&product_type),
        "count": rules.len(),
        "rules": rules,
    })))
}

pub async fn rules_for_exchange_yaml(
    State(state): State<ApiState>,
    Path((product_type, exchange)): Path<(String, String)>,
    Query(query): Query<CustomNamesQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let names = csv_list(&query.custom_rule_names);
    let rules = state
        .validation()
        .rules_for_exchange(&product_type, &exchange, names.as_deref())?;
    let yaml = serde_yaml::to_string(&rules)
        .map_err(|e| crate::error::DomainError::Other(e.to_string()))?;
    Ok(([(header::CONTENT_TYPE, "application/yaml")], yaml))
}

pub async fn combined_rules(
    State(state): State<ApiState>,
    Path((product_type, exchange)): Path<(String, String)>,
) -> ApiResult {
    Ok(Json(state.validation().combined_rule_names(&product_type, Some(&exchange))))
}

pub async fn combined_rules_details(
    State(state): State<ApiState>,
    Path((product_type, exchange)): Path<(String, String)>,
    Query(query): Query<RuleDetailQuery>,
) -> ApiResult {
    let mut details = state
        .validation()
        .combined_rule_details(&product_type, Some(&exchange))?;
    if let Some(wanted) = query.rule_name {
        if let Some(list) = details["combined_rules"].as_array() {
            let filtered: Vec<Value> =
                list.iter().filter(|r| r["name"] == wanted.as_str()).cloned().collect();
            details["count"] = serde_json::json!(filtered.len());
            details["combined_rules"] = Value::Array(filtered);
        }
    }
    Ok(Json(details))
}

pub async fn validate_by_masterid(
    State(state): State<ApiState>,
    Path((master_id, combined_rule)): Path<(String, String)>,
    Query(query): Query<ProductQuery>,
) -> ApiResult {
    let product = product_or_default(&query.product_type);
    let result = state
        .validation()
        .validate_record_by_masterid(&master_id, &combined_rule, &product)
        .await?;
    Ok(Json(result))
}
