use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::engine::ValidationReport;

/// Outcome of one (region, product, exchange) validation task.
#[derive(Debug, Clone, Serialize)]
pub struct ExchangeOutcome {
    pub region: String,
    pub product_type: String,
    pub exchange: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<i64>,
    pub duration_ms: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<ValidationReport>,
}

/// Aggregated results for a region.
///
/// Owned behind a mutex by the orchestrator; workers only append and bump
/// counters under the lock.
#[derive(Debug, Serialize)]
pub struct ValidationSummary {
    pub region: String,
    pub started_at: DateTime<Utc>,
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub results: Vec<ExchangeOutcome>,
}

impl ValidationSummary {
    pub fn new(region: &str, total: usize) -> Self {
        Self {
            region: region.to_string(),
            started_at: Utc::now(),
            total,
            successful: 0,
            failed: 0,
            error: None,
            results: Vec::with_capacity(total),
        }
    }

    pub fn add_result(&mut self, outcome: ExchangeOutcome) {
        if outcome.success {
            self.successful += 1;
        } else {
            self.failed += 1;
        }
        self.results.push(outcome);
    }

    pub fn saved_run_ids(&self) -> Vec<i64> {
        self.results.iter().filter_map(|r| r.run_id).collect()
    }
}
