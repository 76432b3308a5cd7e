use serde::{Deserialize, Serialize};

/// Canonical product types are singular: `stock`, `option`, `future`,
/// `multileg`. Plural aliases normalize here, at every entry point, so the
/// rules directory and the config maps agree on one spelling.
pub fn normalize_product_type(raw: &str) -> String {
    let normalized = raw.trim().to_lowercase();
    match normalized.as_str() {
        "stocks" => "stock".to_string(),
        "options" => "option".to_string(),
        "futures" => "future".to_string(),
        "multilegs" => "multileg".to_string(),
        _ => normalized,
    }
}

/// A scalar parameter value as it appears in a YAML rule document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScalarValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl ScalarValue {
    /// Display form used for string-comparison checks. Integral floats drop
    /// the trailing `.0` so `1.0` and `"1"` compare equal.
    pub fn display(&self) -> String {
        match self {
            ScalarValue::Bool(b) => b.to_string(),
            ScalarValue::Int(i) => i.to_string(),
            ScalarValue::Float(f) => format_number(*f),
            ScalarValue::Str(s) => s.clone(),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ScalarValue::Bool(_) => None,
            ScalarValue::Int(i) => Some(*i as f64),
            ScalarValue::Float(f) => Some(*f),
            ScalarValue::Str(s) => s.trim().parse().ok(),
        }
    }
}

/// Render a float the way the engine compares it as a string.
pub fn format_number(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

/// One declarative rule as written in YAML.
///
/// `column` may hold a comma-separated list; the suite compiler expands it
/// into one expectation per column before evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    #[serde(rename = "type")]
    pub kind: String,
    pub column: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_set: Option<Vec<ScalarValue>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_value: Option<ScalarValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_value: Option<ScalarValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regex: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
}

/// The hierarchy layer a rule was merged from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleLevel {
    Base,
    Product,
    Exchange,
    ProductExchange,
    Custom,
    Combined,
}

impl RuleLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleLevel::Base => "base",
            RuleLevel::Product => "product",
            RuleLevel::Exchange => "exchange",
            RuleLevel::ProductExchange => "product_exchange",
            RuleLevel::Custom => "custom",
            RuleLevel::Combined => "combined",
        }
    }
}

impl std::fmt::Display for RuleLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A rule together with the scope it was loaded from, so reports and
/// persisted runs can record provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScopedRule {
    #[serde(flatten)]
    pub rule: Rule,
    pub level: RuleLevel,
    /// File the rule came from, relative to the rules directory, or
    /// `"inline"` for programmatic rules.
    pub source: String,
    /// Named set the rule resolved through, when any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub set_name: Option<String>,
}

impl ScopedRule {
    pub fn new(rule: Rule, level: RuleLevel, source: impl Into<String>) -> Self {
        Self { rule, level, source: source.into(), set_name: None }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.set_name = Some(name.into());
        self
    }

    /// Provenance label used in reports and `GeValidationRulesApplied` rows.
    pub fn provenance_name(&self) -> String {
        self.set_name.clone().unwrap_or_else(|| self.level.as_str().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn normalizes_plural_aliases() {
        assert_eq!(normalize_product_type("stocks"), "stock");
        assert_eq!(normalize_product_type(" Options "), "option");
        assert_eq!(normalize_product_type("FUTURES"), "future");
        assert_eq!(normalize_product_type("multileg"), "multileg");
    }

    #[test]
    fn scalar_display_coerces_numbers() {
        assert_eq!(ScalarValue::Int(7).display(), "7");
        assert_eq!(ScalarValue::Float(7.0).display(), "7");
        assert_eq!(ScalarValue::Float(7.5).display(), "7.5");
        assert_eq!(ScalarValue::Str("ACTIVE".into()).display(), "ACTIVE");
    }

    #[test]
    fn rule_roundtrips_through_yaml() {
        let yaml = r#"
type: ColumnInSet
column: Status
value_set: [Active, Inactive]
condition: "SecurityType == 'Bond'"
"#;
        let rule: Rule = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(rule.kind, "ColumnInSet");
        assert_eq!(rule.value_set.as_ref().unwrap().len(), 2);
        let back = serde_yaml::to_string(&rule).unwrap();
        let again: Rule = serde_yaml::from_str(&back).unwrap();
        assert_eq!(rule, again);
    }

    #[test]
    fn numeric_bounds_accept_ints_and_floats() {
        let rule: Rule =
            serde_yaml::from_str("{type: ColumnBetween, column: Price, min_value: 0, max_value: 1.5}")
                .unwrap();
        assert_eq!(rule.min_value.unwrap().as_f64(), Some(0.0));
        assert_eq!(rule.max_value.unwrap().as_f64(), Some(1.5));
    }
}
