// Submodules for the validation engine
pub mod report; // Normalized result and report shapes
pub mod validation; // Suite execution over a dataset

pub use report::{AppliedRule, ExpectationResult, ValidationReport, ValueCount};
pub use validation::{validate, ReportContext};
