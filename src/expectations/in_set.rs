use std::collections::HashSet;

use super::{build_result, ColumnView, Expectation};
use crate::engine::report::ExpectationResult;
use crate::rules::model::ScalarValue;

/// Every non-missing value must belong to the declared set. Values compare
/// as trimmed strings; numeric set members coerce through the same display
/// rule as numeric cells, so `1.0` matches `"1"`.
pub struct InSetExpectation {
    pub column: String,
    allowed: HashSet<String>,
}

impl InSetExpectation {
    pub fn new(column: String, value_set: &[ScalarValue]) -> Self {
        let allowed = value_set.iter().map(|v| v.display().trim().to_string()).collect();
        Self { column, allowed }
    }
}

impl Expectation for InSetExpectation {
    fn expectation_type(&self) -> &'static str {
        "ColumnInSet"
    }

    fn evaluate(&self, view: &ColumnView) -> ExpectationResult {
        let missing_count = view.cells.iter().filter(|c| c.is_missing()).count();
        let unexpected: Vec<(usize, String)> = view
            .cells
            .iter()
            .filter(|c| !c.is_missing())
            .filter(|c| !self.allowed.contains(c.trimmed()))
            .map(|c| (c.row, c.trimmed().to_string()))
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
