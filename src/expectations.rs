//! Typed expectation family and common evaluation types.
//!
//! This module defines the `Expectation` trait that every rule kind
//! implements, plus the cell/view types evaluators consume. A compiled
//! expectation sees only a `ColumnView`: the projection of its column over
//! the rows matching its (optional) row-condition, with original row
//! positions preserved.
//!
//! Submodules:
//! - `unique`, `not_null`, `in_set`, `between`, `matches_regex`: one
//!   evaluator per expectation kind.
//! - `condition`: the row-predicate language (parse + mask evaluation).
//! - `suite`: rule expansion and compilation into a runnable suite.

use polars::prelude::*;

use crate::engine::report::{ExpectationResult, ValueCount};
use crate::error::{DomainError, DomainResult};
use crate::rules::model::format_number;

pub mod between;
pub mod condition;
pub mod in_set;
pub mod matches_regex;
pub mod not_null;
pub mod suite;
pub mod unique;

/// At most this many distinct unexpected values are sampled per result.
pub const PARTIAL_UNEXPECTED_LIMIT: usize = 20;

/// How a source column is typed, after normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellKind {
    Numeric,
    Boolean,
    Text,
}

/// One value of a column, positioned at its original dataset row.
///
/// `text` is the string rendering (`None` for null); `number` is the numeric
/// reading when one exists (native for numeric columns, parsed for numeric-
/// looking strings).
#[derive(Debug, Clone)]
pub struct Cell {
    pub row: usize,
    pub text: Option<String>,
    pub number: Option<f64>,
}

impl Cell {
    /// Missing means null, or a string that trims to empty.
    pub fn is_missing(&self) -> bool {
        match &self.text {
            None => true,
            Some(t) => t.trim().is_empty(),
        }
    }

    /// Trimmed string form used for value comparison.
    pub fn trimmed(&self) -> &str {
        self.text.as_deref().map(str::trim).unwrap_or("")
    }
}

/// A whole column pulled out of the dataset.
pub struct ColumnCells {
    pub kind: CellKind,
    pub cells: Vec<Cell>,
}

/// The condition-filtered projection an expectation evaluates over.
pub struct ColumnView {
    pub column: String,
    pub kind: CellKind,
    pub cells: Vec<Cell>,
}

/// Trait for all expectation evaluators.
///
/// Implementors compute one `ExpectationResult` from a column view. They are
/// pure: no suite-level state, no dataset access beyond the view.
pub trait Expectation: Send + Sync {
    /// Wire name of the expectation kind (e.g. `"ColumnUnique"`).
    fn expectation_type(&self) -> &'static str;

    /// Evaluate the expectation over the projected column.
    fn evaluate(&self, view: &ColumnView) -> ExpectationResult;
}

/// Pull one column out of the dataframe as positioned cells.
///
/// Numeric columns cast through `Float64`; everything else casts through
/// string. A column missing from the dataset is an invalid rule, not an
/// engine fault.
pub fn extract_cells(df: &DataFrame, column: &str) -> DomainResult<ColumnCells> {
    let col = df.column(column).map_err(|_| {
        DomainError::InvalidRule(format!("column '{column}' is not a field of the dataset"))
    })?;

    let dtype = col.dtype();
    if dtype.is_numeric() {
        let casted = col.cast(&DataType::Float64)?;
        let values = casted.f64()?;
        let cells = values
            .into_iter()
            .enumerate()
            .map(|(row, v)| Cell { row, text: v.map(format_number), number: v })
            .collect();
        return Ok(ColumnCells { kind: CellKind::Numeric, cells });
    }
    if matches!(dtype, DataType::Boolean) {
        let values = col.bool()?;
        let cells = values
            .into_iter()
            .enumerate()
            .map(|(row, v)| Cell {
                row,
                text: v.map(|b| b.to_string()),
                number: v.map(|b| if b { 1.0 } else { 0.0 }),
            })
            .collect();
        return Ok(ColumnCells { kind: CellKind::Boolean, cells });
    }

    let casted = col.cast(&DataType::String)?;
    let values = casted.str()?;
    let cells = values
        .into_iter()
        .enumerate()
        .map(|(row, v)| Cell {
            row,
            text: v.map(String::from),
            number: v.and_then(|s| s.trim().parse::<f64>().ok()),
        })
        .collect();
    Ok(ColumnCells { kind: CellKind::Text, cells })
}

/// Assemble a normalized result from an evaluator's unexpected findings.
///
/// `unexpected` carries (row, display value) pairs in evaluation order.
/// Value-checks use the non-null denominator for `unexpected_percent`;
/// NotNull passes `nonnull_denominator = false` so its percents line up
/// with the missing percents.
pub(crate) fn build_result(
    expectation_type: &'static str,
    column: &str,
    element_count: usize,
    missing_count: usize,
    unexpected: Vec<(usize, String)>,
    nonnull_denominator: bool,
) -> ExpectationResult {
    let unexpected_count = unexpected.len();
    let denominator = if nonnull_denominator {
        element_count.saturating_sub(missing_count)
    } else {
        element_count
    };
    let unexpected_percent = percent(unexpected_count, denominator);
    let missing_percent = percent(missing_count, element_count);

    ExpectationResult {
        column: column.to_string(),
        expectation_type: expectation_type.to_string(),
        success: unexpected_count == 0,
        element_count,
        unexpected_count,
        unexpected_percent,
        missing_count,
        missing_percent,
        partial_unexpected: top_unexpected(unexpected),
    }
}

fn percent(count: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        count as f64 / denominator as f64 * 100.0
    }
}

/// Group unexpected values, keep the top-K by count, ties broken by
/// first-seen order.
fn top_unexpected(unexpected: Vec<(usize, String)>) -> Vec<ValueCount> {
    let mut counts: Vec<(String, usize, usize)> = Vec::new();
    for (order, (_, value)) in unexpected.into_iter().enumerate() {
        match counts.iter_mut().find(|(v, _, _)| *v == value) {
            Some((_, count, _)) => *count += 1,
            None => counts.push((value, 1, order)),
        }
    }
    counts.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));
    counts
        .into_iter()
        .take(PARTIAL_UNEXPECTED_LIMIT)
        .map(|(value, count, _)| ValueCount { value, count })
        .collect()
}
