use std::collections::HashMap;

use super::{build_result, ColumnView, Expectation};
use crate::engine::report::ExpectationResult;

/// Every non-missing value must appear exactly once. When a value repeats,
/// all of its occurrences count as unexpected.
pub struct UniqueExpectation {
    pub column: String,
}

impl Expectation for UniqueExpectation {
    fn expectation_type(&self) -> &'static str {
        "ColumnUnique"
    }

    fn evaluate(&self, view: &ColumnView) -> ExpectationResult {
        let mut occurrences: HashMap<&str, usize> = HashMap::new();
        for cell in view.cells.iter().filter(|c| !c.is_missing()) {
            *occurrences.entry(cell.trimmed()).or_insert(0) += 1;
        }

        let missing_count = view.cells.iter().filter(|c| c.is_missing()).count();
        let unexpected: Vec<(usize, String)> = view
            .cells
            .iter()
            .filter(|c| !c.is_missing())
            .filter(|c| occurrences[c.trimmed()] >= 2)
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
