//! Validation operations behind the HTTP adapter.
//!
//! Every request gets its own suite; the service itself is cheap to build
//! and holds only shared handles (loader, rule loader, config). Results
//! come back as `Result<_, DomainError>`; HTTP translation happens in one
//! adapter.

use serde_json::Value;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::engine::{self, ReportContext, ValidationReport};
use crate::error::{DomainError, DomainResult};
use crate::expectations::extract_cells;
use crate::loaders::{DataLoader, Page};
use crate::rules::model::{normalize_product_type, Rule, RuleLevel, ScopedRule};
use crate::rules::RuleLoader;
use crate::services::instruments::InstrumentService;

pub struct ValidationService {
    loader: Arc<dyn DataLoader>,
    rules: Arc<RuleLoader>,
    config: Arc<AppConfig>,
}

impl ValidationService {
    pub fn new(loader: Arc<dyn DataLoader>, rules: Arc<RuleLoader>, config: Arc<AppConfig>) -> Self {
        Self { loader, rules, config }
    }

    fn ensure_exchange(&self, product: &str, exchange: &str) -> DomainResult<()> {
        let available = self.config.exchange_codes(product);
        if available.iter().any(|e| e == exchange) {
            Ok(())
        } else {
            Err(DomainError::ExchangeNotFound { exchange: exchange.to_string(), available })
        }
    }

    /// Full layered validation: base + product + exchange + product-exchange
    /// + named sets + inline rules.
    pub async fn validate_exchange(
        &self,
        product_type: &str,
        exchange: &str,
        custom_rule_names: Option<&[String]>,
        custom_rules: Option<&[Rule]>,
    ) -> DomainResult<ValidationReport> {
        let product = normalize_product_type(product_type);
        self.ensure_exchange(&product, exchange)?;

        let df = self.loader.load(&product, exchange, Page::all()).await?;
        let rules = self.rules.load_combined(
            Some(&product),
            Some(exchange),
            custom_rule_names,
            custom_rules,
        )?;
        let label = full_run_label(&rules, custom_rule_names);
        let ctx = ReportContext {
            exchange,
            product_type: &product,
            rules_applied_label: label,
        };
        engine::validate(&df, &rules, &ctx)
    }

    /// Validation with ONLY named/inline custom rules; the layered
    /// hierarchy is skipped entirely.
    pub async fn validate_custom_only(
        &self,
        product_type: &str,
        exchange: &str,
        custom_rule_names: Option<&[String]>,
        custom_rules: Option<&[Rule]>,
    ) -> DomainResult<ValidationReport> {
        let names = custom_rule_names.unwrap_or(&[]);
        let inline = custom_rules.unwrap_or(&[]);
        if names.is_empty() && inline.is_empty() {
            return Err(DomainError::InvalidRequest(
                "at least one custom rule must be provided via custom_rule_names or custom_rules"
                    .to_string(),
            ));
        }

        let product = normalize_product_type(product_type);
        self.ensure_exchange(&product, exchange)?;
        let df = self.loader.load(&product, exchange, Page::all()).await?;

        let mut rules =
            self.rules.load_custom_rules_from_yaml(names, Some(&product), Some(exchange))?;
        rules.extend(
            inline.iter().cloned().map(|r| ScopedRule::new(r, RuleLevel::Custom, "inline")),
        );
        let label = custom_run_label(&rules, names);
        let ctx = ReportContext {
            exchange,
            product_type: &product,
            rules_applied_label: label,
        };
        engine::validate(&df, &rules, &ctx)
    }

    /// The merged rule list a validation request would apply, with
    /// provenance, without touching the dataset.
    pub fn rules_for_exchange(
        &self,
        product_type: &str,
        exchange: &str,
        custom_rule_names: Option<&[String]>,
    ) -> DomainResult<Vec<ScopedRule>> {
        let product = normalize_product_type(product_type);
        self.ensure_exchange(&product, exchange)?;
        self.rules.load_combined(Some(&product), Some(exchange), custom_rule_names, None)
    }

    /// Named combined sets visible for a product, split by scope level.
    pub fn combined_rule_names(&self, product_type: &str, exchange: Option<&str>) -> Value {
        let product = normalize_product_type(product_type);
        let product_level = self.rules.available_combined_rule_sets(Some(&product), None);
        let exchange_level = exchange
            .map(|ex| self.rules.exchange_combined_names(&product, ex))
            .unwrap_or_default();

        let mut all: Vec<String> =
            product_level.iter().chain(exchange_level.iter()).cloned().collect();
        all.sort();
        all.dedup();

        serde_json::json!({
            "product_type": product,
            "exchange": exchange,
            "product_type_level": {
                "combined_rule_names": product_level,
                "count": product_level.len(),
            },
            "exchange_level": {
                "combined_rule_names": exchange_level,
                "count": exchange_level.len(),
            },
            "all_combined_rule_names": all,
            "count": all.len(),
        })
    }

    /// Expanded view of every combined set at this scope: definition,
    /// include list, resolved rules, and full-merge counts.
    pub fn combined_rule_details(
        &self,
        product_type: &str,
        exchange: Option<&str>,
    ) -> DomainResult<Value> {
        let product = normalize_product_type(product_type);
        let names = self.rules.available_combined_rule_sets(Some(&product), exchange);

        let mut detailed = Vec::with_capacity(names.len());
        for name in &names {
            let mut info = serde_json::json!({
                "name": name,
                "definition": Value::Null,
                "includes": [],
                "resolved_rules": [],
            });

            if let Some((definition, includes)) =
                self.rules.named_set_definition(name, Some(&product), exchange)?
            {
                info["definition"] = serde_json::to_value(&definition).unwrap_or(Value::Null);
                info["includes"] = serde_json::json!(includes);
            }

            match self.rules.load_custom_rules_from_yaml(
                std::slice::from_ref(name),
                Some(&product),
                exchange,
            ) {
                Ok(resolved) => {
                    info["resolved_rule_count"] = serde_json::json!(resolved.len());
                    info["resolved_rules"] = serde_json::to_value(&resolved).unwrap_or_default();
                    if let Some(ex) = exchange {
                        let full = self.rules.load_combined(
                            Some(&product),
                            Some(ex),
                            Some(std::slice::from_ref(name)),
                            None,
                        )?;
                        info["full_rule_set_count"] = serde_json::json!(full.len());
                        info["base_and_exchange_rules_count"] =
                            serde_json::json!(full.len() - resolved.len());
                    }
                }
                Err(e) => {
                    info["error"] = Value::String(e.to_string());
                }
            }
            detailed.push(info);
        }

        Ok(serde_json::json!({
            "product_type": product,
            "exchange": exchange,
            "combined_rules": detailed,
            "count": detailed.len(),
        }))
    }

    /// Validate one record, located by MasterId, against the full hierarchy
    /// plus one named set. The exchange comes from the record itself.
    pub async fn validate_record_by_masterid(
        &self,
        master_id: &str,
        combined_rule_name: &str,
        product_type: &str,
    ) -> DomainResult<Value> {
        let product = normalize_product_type(product_type);
        let instruments = InstrumentService::new(self.loader.clone(), self.config.clone());

        let (exchange, record) = instruments
            .find_by_masterid(&product, master_id, None)
            .await?
            .ok_or_else(|| {
                DomainError::RecordNotFound(format!("MasterId '{master_id}' not found"))
            })?;

        // Resolving the set up front turns an unknown name into a clean 404
        // before any dataset work happens.
        self.rules.load_custom_rules_from_yaml(
            std::slice::from_ref(&combined_rule_name.to_string()),
            Some(&product),
            Some(&exchange),
        )?;

        let df = self.loader.load(&product, &exchange, Page::all()).await?;
        let cells = extract_cells(&df, "MasterId")?;
        let row = cells
            .cells
            .iter()
            .find(|c| !c.is_missing() && c.trimmed() == master_id.trim())
            .map(|c| c.row)
            .ok_or_else(|| {
                DomainError::RecordNotFound(format!("MasterId '{master_id}' not found"))
            })?;
        let single = df.slice(row as i64, 1);

        let names = vec![combined_rule_name.to_string()];
        let rules =
            self.rules.load_combined(Some(&product), Some(&exchange), Some(&names), None)?;
        let ctx = ReportContext {
            exchange: &exchange,
            product_type: &product,
            rules_applied_label: "combined",
        };
        let report = engine::validate(&single, &rules, &ctx)?;

        let mut wire = serde_json::to_value(&report).map_err(|e| DomainError::Other(e.to_string()))?;
        wire["master_id"] = Value::String(master_id.to_string());
        wire["combined_rule_name"] = Value::String(combined_rule_name.to_string());
        wire["record"] = Value::Object(record);
        Ok(wire)
    }
}

/// Label for a full layered run, derived from provenance instead of name
/// keywords: named sets force `combined`, otherwise any exchange-level rule
/// makes it `exchange`, else `base`.
fn full_run_label(rules: &[ScopedRule], custom_rule_names: Option<&[String]>) -> &'static str {
    if custom_rule_names.map(|n| !n.is_empty()).unwrap_or(false) {
        return "combined";
    }
    let has_exchange_rules = rules
        .iter()
        .any(|r| matches!(r.level, RuleLevel::Exchange | RuleLevel::ProductExchange));
    if has_exchange_rules {
        "exchange"
    } else {
        "base"
    }
}

/// Label for a custom-only run: `combined` when more than one set was named
/// or any rule resolved out of a combined document.
fn custom_run_label(rules: &[ScopedRule], names: &[String]) -> &'static str {
    if names.len() > 1 || rules.iter().any(|r| r.level == RuleLevel::Combined) {
        "combined"
    } else {
        "custom"
    }
}
