use regex::Regex;

use super::{build_result, ColumnView, Expectation};
use crate::engine::report::ExpectationResult;
use crate::error::DomainResult;

/// Every non-missing value must match the pattern over its full string.
/// The user pattern is compiled once, wrapped as `^(?:pattern)$`.
pub struct MatchesRegexExpectation {
    pub column: String,
    pub pattern: String,
    regex: Regex,
}

impl MatchesRegexExpectation {
    pub fn new(column: String, pattern: &str) -> DomainResult<Self> {
        let regex = Regex::new(&format!("^(?:{pattern})$"))?;
        Ok(Self { column, pattern: pattern.to_string(), regex })
    }
}

impl Expectation for MatchesRegexExpectation {
    fn expectation_type(&self) -> &'static str {
        "ColumnMatchesRegex"
    }

    fn evaluate(&self, view: &ColumnView) -> ExpectationResult {
        let missing_count = view.cells.iter().filter(|c| c.is_missing()).count();
        let unexpected: Vec<(usize, String)> = view
            .cells
            .iter()
            .filter(|c| !c.is_missing())
            .filter(|c| !self.regex.is_match(c.text.as_deref().unwrap_or("")))
            .map(|c| (c.row, c.text.clone().unwrap_or_default()))
            .collect();

        build_result(
            self.expectation_type(),
            &self.column,
            view.cells.len(),
            missing_count,
            unexpected,
            true,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expectations::testutil::text_view;
    use pretty_assertions::assert_eq;

    #[test]
    fn matches_full_string_only() {
        let view = text_view("RIC", &[Some("0005.HK"), Some("0005.HKX"), Some("x0005.HK")]);
        let exp = MatchesRegexExpectation::new("RIC".into(), r"[0-9]{4}\.HK").unwrap();
        let result = exp.evaluate(&view);
        assert!(!result.success);
        assert_eq!(result.unexpected_count, 2);
    }

    #[test]
    fn passes_when_every_value_matches() {
        let view = text_view("RIC", &[Some("0005.HK"), Some("0388.HK")]);
        let exp = MatchesRegexExpectation::new("RIC".into(), r"^[0-9]{4}\.HK$").unwrap();
        assert!(exp.evaluate(&view).success);
    }

    #[test]
    fn nulls_are_missing_not_unexpected() {
        let view = text_view("RIC", &[None, Some("0005.HK")]);
        let exp = MatchesRegexExpectation::new("RIC".into(), r"[0-9]{4}\.HK").unwrap();
        let result = exp.evaluate(&view);
        assert!(result.success);
        assert_eq!(result.missing_count, 1);
    }

    #[test]
    fn invalid_pattern_is_rejected_at_construction() {
        assert!(MatchesRegexExpectation::new("RIC".into(), "[unclosed").is_err());
    }
}
