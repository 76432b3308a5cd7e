//! Normalized validation output shapes.
//!
//! These are both the wire types served by the API and the records the
//! persister flattens into `GeExpectationResults` / `GeValidationRulesApplied`
//! rows. Reports are immutable once emitted.

use serde::{Deserialize, Serialize};

use crate::rules::model::ScopedRule;

/// One distinct unexpected value and how often it occurred.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueCount {
    pub value: String,
    pub count: usize,
}

/// Outcome of a single expectation over a dataset slice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpectationResult {
    pub column: String,
    pub expectation_type: String,
    pub success: bool,
    pub element_count: usize,
    pub unexpected_count: usize,
    pub unexpected_percent: f64,
    pub missing_count: usize,
    pub missing_percent: f64,
    /// Top distinct unexpected values by count, capped at 20, count-descending.
    pub partial_unexpected: Vec<ValueCount>,
}

impl ExpectationResult {
    /// Full result blob stored in the `result_details_json` column for
    /// post-hoc analysis. Carries the counts plus both sample encodings:
    /// `partial_unexpected_counts` is authoritative, the flat list is
    /// derived from it.
    pub fn details_json(&self) -> serde_json::Value {
        serde_json::json!({
            "element_count": self.element_count,
            "unexpected_count": self.unexpected_count,
            "unexpected_percent": self.unexpected_percent,
            "missing_count": self.missing_count,
            "missing_percent": self.missing_percent,
            "partial_unexpected_counts": self.partial_unexpected,
            "partial_unexpected_list": self.partial_unexpected
                .iter()
                .map(|vc| vc.value.clone())
                .collect::<Vec<_>>(),
        })
    }
}

/// Provenance of one applied rule, classified by hierarchy layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppliedRule {
    pub name: String,
    #[serde(rename = "type")]
    pub rule_type: String,
    pub level: String,
    pub source: String,
}

impl From<&ScopedRule> for AppliedRule {
    fn from(scoped: &ScopedRule) -> Self {
        Self {
            name: scoped.provenance_name(),
            rule_type: scoped.rule.kind.clone(),
            level: scoped.level.as_str().to_string(),
            source: scoped.source.clone(),
        }
    }
}

/// Complete outcome of validating one (product, exchange) slice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    pub exchange: String,
    pub product_type: String,
    pub success: bool,
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub results: Vec<ExpectationResult>,
    pub rules_applied: Vec<AppliedRule>,
    /// Request-mode label recorded on the persisted run:
    /// `base`, `exchange`, `custom`, or `combined`.
    pub rules_applied_label: String,
}

impl ValidationReport {
    pub fn from_results(
        exchange: &str,
        product_type: &str,
        results: Vec<ExpectationResult>,
        rules_applied: Vec<AppliedRule>,
        rules_applied_label: &str,
    ) -> Self {
        let total = results.len();
        let successful = results.iter().filter(|r| r.success).count();
        Self {
            exchange: exchange.to_string(),
            product_type: product_type.to_string(),
            success: results.iter().all(|r| r.success),
            total,
            successful,
            failed: total - successful,
            results,
            rules_applied,
            rules_applied_label: rules_applied_label.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn result(success: bool) -> ExpectationResult {
        ExpectationResult {
            column: "MasterId".into(),
            expectation_type: "ColumnUnique".into(),
            success,
            element_count: 3,
            unexpected_count: if success { 0 } else { 2 },
            unexpected_percent: if success { 0.0 } else { 66.7 },
            missing_count: 0,
            missing_percent: 0.0,
            partial_unexpected: vec![],
        }
    }

    #[test]
    fn totals_add_up() {
        let report = ValidationReport::from_results(
            "XHKG",
            "stock",
            vec![result(true), result(false), result(true)],
            vec![],
            "base",
        );
        assert_eq!(report.total, 3);
        assert_eq!(report.successful, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(report.successful + report.failed, report.results.len());
        assert!(!report.success);
    }

    #[test]
    fn empty_report_is_successful() {
        let report = ValidationReport::from_results("XHKG", "stock", vec![], vec![], "base");
        assert!(report.success);
        assert_eq!(report.total, 0);
    }

    #[test]
    fn details_json_carries_both_sample_encodings() {
        let mut r = result(false);
        r.partial_unexpected = vec![ValueCount { value: "HK0001".into(), count: 2 }];
        let details = r.details_json();
        assert_eq!(details["partial_unexpected_counts"][0]["count"], 2);
        assert_eq!(details["partial_unexpected_list"][0], "HK0001");
    }

    #[test]
    fn report_roundtrips_through_json() {
        let report = ValidationReport::from_results("XHKG", "stock", vec![result(true)], vec![], "base");
        let raw = serde_json::to_string(&report).unwrap();
        let back: ValidationReport = serde_json::from_str(&raw).unwrap();
        assert_eq!(back.total, 1);
        assert_eq!(back.exchange, "XHKG");
    }
}
