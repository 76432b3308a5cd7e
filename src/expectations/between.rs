use super::{build_result, ColumnView, Expectation};
use crate::engine::report::ExpectationResult;

/// Every non-missing value must fall inside `[min, max]`, both bounds
/// inclusive; an absent bound leaves that side open. A non-missing value
/// with no numeric reading counts as unexpected.
pub struct BetweenExpectation {
    pub column: String,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl BetweenExpectation {
    fn in_bounds(&self, value: f64) -> bool {
        if let Some(min) = self.min {
            if value < min {
                return false;
            }
        }
        if let Some(max) = self.max {
            if value > max {
                return false;
            }
        }
        true
    }
}

impl Expectation for BetweenExpectation {
    fn expectation_type(&self) -> &'static str {
        "ColumnBetween"
    }

    fn evaluate(&self, view: &ColumnView) -> ExpectationResult {
        let missing_count = view.cells.iter().filter(|c| c.is_missing()).count();
        let unexpected: Vec<(usize, String)> = view
            .cells
            .iter()
            .filter(|c| !c.is_missing())
            .filter(|c| match c.number {
                Some(n) => !self.in_bounds(n),
                None => true,
            })
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
