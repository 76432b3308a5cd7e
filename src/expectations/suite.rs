//! Suite compilation: generic rules in, runnable expectations out.
//!
//! Compilation expands comma-separated `column` fields, dispatches each
//! rule kind to its evaluator constructor, validates parameters, and parses
//! any row-condition. Suites are built fresh per request under a unique
//! identifier and never shared.

use std::fmt;

use uuid::Uuid;

use super::between::BetweenExpectation;
use super::condition::ConditionExpr;
use super::in_set::InSetExpectation;
use super::matches_regex::MatchesRegexExpectation;
use super::not_null::NotNullExpectation;
use super::unique::UniqueExpectation;
use super::Expectation;
use crate::error::{DomainError, DomainResult};
use crate::rules::model::{Rule, ScopedRule};

pub struct CompiledExpectation {
    pub column: String,
    pub condition: Option<ConditionExpr>,
    /// The (expanded) rule this expectation was compiled from, with scope.
    pub origin: ScopedRule,
    pub evaluator: Box<dyn Expectation>,
}

pub struct Suite {
    pub id: String,
    pub expectations: Vec<CompiledExpectation>,
}

impl fmt::Debug for CompiledExpectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledExpectation")
            .field("column", &self.column)
            .field("condition", &self.condition)
            .field("origin", &self.origin)
            .finish_non_exhaustive()
    }
}

impl fmt::Debug for Suite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Suite")
            .field("id", &self.id)
            .field("expectations", &self.expectations)
            .finish()
    }
}

/// Expand rules whose `column` holds a comma-separated list into one rule
/// per column; every other field is copied verbatim.
pub fn expand_columns(rules: &[ScopedRule]) -> Vec<ScopedRule> {
    let mut expanded = Vec::with_capacity(rules.len());
    for scoped in rules {
        if !scoped.rule.column.contains(',') {
            expanded.push(scoped.clone());
            continue;
        }
        for column in scoped.rule.column.split(',') {
            let column = column.trim();
            if column.is_empty() {
                continue;
            }
            let mut clone = scoped.clone();
            clone.rule.column = column.to_string();
            expanded.push(clone);
        }
    }
    expanded
}

/// Compile a merged rule list into a fresh suite.
pub fn compile_suite(rules: &[ScopedRule]) -> DomainResult<Suite> {
    let expanded = expand_columns(rules);
    let mut expectations = Vec::with_capacity(expanded.len());

    for scoped in expanded {
        let evaluator = compile_rule(&scoped.rule)?;
        let condition = match scoped.rule.condition.as_deref() {
            Some(cond) if !cond.trim().is_empty() => Some(ConditionExpr::parse(cond)?),
            _ => None,
        };
        expectations.push(CompiledExpectation {
            column: scoped.rule.column.clone(),
            condition,
            origin: scoped,
            evaluator,
        });
    }

    Ok(Suite { id: format!("suite_{}", Uuid::new_v4().simple()), expectations })
}

fn compile_rule(rule: &Rule) -> DomainResult<Box<dyn Expectation>> {
    let column = rule.column.clone();
    match rule.kind.as_str() {
        "ColumnUnique" => Ok(Box::new(UniqueExpectation { column })),
        "ColumnNotNull" => Ok(Box::new(NotNullExpectation { column })),
        "ColumnInSet" => {
            let value_set = rule.value_set.as_deref().unwrap_or(&[]);
            if value_set.is_empty() {
                return Err(DomainError::InvalidRule(format!(
                    "ColumnInSet on '{}' requires a non-empty value_set",
                    rule.column
                )));
            }
            Ok(Box::new(InSetExpectation::new(column, value_set)))
        }
        "ColumnBetween" => {
            let min = rule.min_value.as_ref().and_then(|v| v.as_f64());
            let max = rule.max_value.as_ref().and_then(|v| v.as_f64());
            if min.is_none() && max.is_none() {
                return Err(DomainError::InvalidRule(format!(
                    "ColumnBetween on '{}' requires min_value or max_value",
                    rule.column
                )));
            }
            Ok(Box::new(BetweenExpectation { column, min, max }))
        }
        "ColumnMatchesRegex" => {
            let pattern = rule.regex.as_deref().ok_or_else(|| {
                DomainError::InvalidRule(format!(
                    "ColumnMatchesRegex on '{}' requires a regex",
                    rule.column
                ))
            })?;
            Ok(Box::new(MatchesRegexExpectation::new(column, pattern)?))
        }
        other => Err(DomainError::UnsupportedExpectation(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::model::{RuleLevel, ScalarValue};
    use pretty_assertions::assert_eq;

    fn scoped(kind: &str, column: &str) -> ScopedRule {
        ScopedRule::new(
            Rule {
                kind: kind.to_string(),
                column: column.to_string(),
                value_set: None,
                min_value: None,
                max_value: None,
                regex: None,
                condition: None,
            },
            RuleLevel::Base,
            "base.yaml",
        )
    }

    #[test]
    fn comma_separated_columns_expand_one_rule_per_column() {
        let mut rule = scoped("ColumnNotNull", "MasterId, RIC,Sedol");
        rule.rule.condition = Some("SecurityType == 'Bond'".to_string());
        let expanded = expand_columns(&[rule]);
        assert_eq!(expanded.len(), 3);
        let columns: Vec<&str> = expanded.iter().map(|r| r.rule.column.as_str()).collect();
        assert_eq!(columns, vec!["MasterId", "RIC", "Sedol"]);
        assert!(expanded.iter().all(|r| r.rule.condition.is_some()));
        assert!(expanded.iter().all(|r| r.level == RuleLevel::Base));
    }

    #[test]
    fn empty_segments_are_dropped() {
        let expanded = expand_columns(&[scoped("ColumnNotNull", "A,,B, ")]);
        assert_eq!(expanded.len(), 2);
    }

    #[test]
    fn unknown_type_is_rejected() {
        let err = compile_suite(&[scoped("ColumnIsPrime", "N")]).unwrap_err();
        assert!(matches!(err, DomainError::UnsupportedExpectation(_)));
    }

    #[test]
    fn in_set_requires_values() {
        let err = compile_suite(&[scoped("ColumnInSet", "Status")]).unwrap_err();
        assert!(matches!(err, DomainError::InvalidRule(_)));
    }

    #[test]
    fn between_requires_at_least_one_bound() {
        let mut rule = scoped("ColumnBetween", "Price");
        assert!(compile_suite(std::slice::from_ref(&rule)).is_err());
        rule.rule.min_value = Some(ScalarValue::Int(0));
        assert!(compile_suite(&[rule]).is_ok());
    }

    #[test]
    fn suites_get_unique_identifiers() {
        let rules = [scoped("ColumnNotNull", "MasterId")];
        let a = compile_suite(&rules).unwrap();
        let b = compile_suite(&rules).unwrap();
        assert_ne!(a.id, b.id);
        assert_eq!(a.expectations.len(), 1);
    }

    #[test]
    fn bad_condition_fails_compilation() {
        let mut rule = scoped("ColumnNotNull", "Coupon");
        rule.rule.condition = Some("SecurityType = 'Bond'".to_string());
        assert!(compile_suite(&[rule]).is_err());
    }
}
