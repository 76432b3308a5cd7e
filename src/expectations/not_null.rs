use super::{build_result, ColumnView, Expectation};
use crate::engine::report::ExpectationResult;

/// No value may be null or blank. Unexpected and missing counts coincide
/// for this kind, so the percents mirror each other.
pub struct NotNullExpectation {
    pub column: String,
}

impl Expectation for NotNullExpectation {
    fn expectation_type(&self) -> &'static str {
        "ColumnNotNull"
    }

    fn evaluate(&self, view: &ColumnView) -> ExpectationResult {
        let missing_count = view.cells.iter().filter(|c| c.is_missing()).count();
        // Nulls have no informative display value; the sample list stays
        // empty and missing_count carries the signal.
        let mut result = build_result(
            self.expectation_type(),
            &self.column,
            view.cells.len(),
            missing_count,
            Vec::new(),
            false,
        );
        result.unexpected_count = missing_count;
        result.unexpected_percent = result.missing_percent;
        result.success = missing_count == 0;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expectations::testutil::text_view;
    use pretty_assertions::assert_eq;

    #[test]
    fn passes_on_fully_populated_column() {
        let view = text_view("Symbol", &[Some("0005"), Some("0388")]);
        let result = NotNullExpectation { column: "Symbol".into() }.evaluate(&view);
        assert!(result.success);
        assert_eq!(result.missing_count, 0);
    }

    #[test]
    fn nulls_fail_and_mirror_missing_counts() {
        let view = text_view("Symbol", &[Some("0005"), None, Some("0388"), None]);
        let result = NotNullExpectation { column: "Symbol".into() }.evaluate(&view);
        assert!(!result.success);
        assert_eq!(result.missing_count, 2);
        assert_eq!(result.unexpected_count, 2);
        assert_eq!(result.unexpected_percent, result.missing_percent);
        assert_eq!(result.missing_percent, 50.0);
    }

    #[test]
    fn blank_after_trim_counts_as_missing() {
        let view = text_view("Symbol", &[Some("  "), Some("0005")]);
        let result = NotNullExpectation { column: "Symbol".into() }.evaluate(&view);
        assert!(!result.success);
        assert_eq!(result.missing_count, 1);
    }

    #[test]
    fn empty_column_passes() {
        let view = text_view("Symbol", &[]);
        let result = NotNullExpectation { column: "Symbol".into() }.evaluate(&view);
        assert!(result.success);
        assert_eq!(result.element_count, 0);
        assert_eq!(result.missing_percent, 0.0);
    }
}
