//! Suite execution: evaluate a compiled suite over a dataset.
//!
//! Each expectation evaluates independently: its row-condition (if any)
//! produces a mask, the target column is projected through the mask with
//! original row positions intact, and the evaluator reduces the view to an
//! `ExpectationResult`. Expectation order in the report follows rule order,
//! so identical inputs yield identical reports regardless of scheduling.
//!
//! Suites are created fresh per call with unique identifiers and never
//! shared across requests. A transient engine fault tears the local suite
//! down and retries with fresh resources before surfacing.

use polars::prelude::DataFrame;

use super::report::{AppliedRule, ExpectationResult, ValidationReport};
use crate::error::{DomainError, DomainResult};
use crate::expectations::suite::{compile_suite, Suite};
use crate::expectations::{extract_cells, ColumnView};
use crate::rules::model::ScopedRule;

/// Attempts made before a transient engine fault surfaces to the caller.
const TRANSIENT_ATTEMPTS: usize = 3;

/// Identity of the slice being validated, for the report header.
pub struct ReportContext<'a> {
    pub exchange: &'a str,
    pub product_type: &'a str,
    pub rules_applied_label: &'a str,
}

/// Compile and run a merged rule list against a dataset.
pub fn validate(
    df: &DataFrame,
    rules: &[ScopedRule],
    ctx: &ReportContext<'_>,
) -> DomainResult<ValidationReport> {
    let mut attempt = 0;
    loop {
        attempt += 1;
        let suite = compile_suite(rules)?;
        match run_suite(df, &suite) {
            Ok(results) => {
                let applied: Vec<AppliedRule> = rules.iter().map(AppliedRule::from).collect();
                tracing::info!(
                    exchange = ctx.exchange,
                    product = ctx.product_type,
                    suite = %suite.id,
                    expectations = results.len(),
                    "validation completed"
                );
                return Ok(ValidationReport::from_results(
                    ctx.exchange,
                    ctx.product_type,
                    results,
                    applied,
                    ctx.rules_applied_label,
                ));
            }
            Err(DomainError::EngineTransient(reason)) if attempt < TRANSIENT_ATTEMPTS => {
                tracing::warn!(
                    exchange = ctx.exchange,
                    attempt,
                    %reason,
                    "transient engine fault, rebuilding suite"
                );
            }
            Err(err) => return Err(err),
        }
    }
}

/// Evaluate every expectation of a suite, in suite order.
pub fn run_suite(df: &DataFrame, suite: &Suite) -> DomainResult<Vec<ExpectationResult>> {
    suite
        .expectations
        .iter()
        .map(|expectation| {
            let cells = extract_cells(df, &expectation.column)?;
            let view = match &expectation.condition {
                None => ColumnView {
                    column: expectation.column.clone(),
                    kind: cells.kind,
                    cells: cells.cells,
                },
                Some(condition) => {
                    let mask = condition.eval_mask(df)?;
                    ColumnView {
                        column: expectation.column.clone(),
                        kind: cells.kind,
                        cells: cells
                            .cells
                            .into_iter()
                            .zip(mask)
                            .filter_map(|(cell, keep)| keep.then_some(cell))
                            .collect(),
                    }
                }
            };
            Ok(expectation.evaluator.evaluate(&view))
        })
        .collect()
}

/// Retry a fallible operation on transient faults, up to the engine's
/// attempt budget. Used by callers that hold non-suite resources.
pub fn retry_transient<T, F>(mut operation: F) -> DomainResult<T>
where
    F: FnMut() -> DomainResult<T>,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match operation() {
            Err(DomainError::EngineTransient(_)) if attempt < TRANSIENT_ATTEMPTS => continue,
            other => return other,
        }
    }
}
