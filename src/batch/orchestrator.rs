//! Drives regional sweeps against the validation API.
//!
//! For each region the (product, exchange) fanout runs on a bounded worker
//! pool; outcomes land in a mutex-guarded regional summary. A failed health
//! probe marks the whole region `API unavailable` without scheduling tasks.

use futures::stream::{self, StreamExt};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use super::client::{ApiClient, DEFAULT_MAX_ATTEMPTS, DEFAULT_TIMEOUT};
use super::regions::RegionsConfig;
use super::summary::{ExchangeOutcome, ValidationSummary};
use crate::persistence::{RunRecord, RunStore};

pub struct BatchValidator {
    regions: RegionsConfig,
    client: ApiClient,
    repository: Option<Arc<dyn RunStore>>,
    workers: usize,
}

impl BatchValidator {
    pub fn new(
        regions: RegionsConfig,
        client: ApiClient,
        repository: Option<Arc<dyn RunStore>>,
        workers: usize,
    ) -> Self {
        Self { regions, client, repository, workers: workers.max(1) }
    }

    pub fn regions(&self) -> &RegionsConfig {
        &self.regions
    }

    /// Validate every configured (product, exchange) pair of one region.
    pub async fn validate_region(
        &self,
        region: &str,
        custom_rule_names: Option<&[String]>,
    ) -> ValidationSummary {
        if !self.client.health_check().await {
            tracing::error!(region, url = self.client.base_url(), "API unavailable");
            let mut summary = ValidationSummary::new(region, 0);
            summary.error = Some("API unavailable".to_string());
            return summary;
        }

        let combinations = self.regions.combinations(region);
        if combinations.is_empty() {
            tracing::warn!(region, "no configurations found");
            return ValidationSummary::new(region, 0);
        }

        let summary = Arc::new(Mutex::new(ValidationSummary::new(region, combinations.len())));

        stream::iter(combinations)
            .map(|(reg, product, exchange)| {
                let summary = summary.clone();
                async move {
                    let outcome =
                        self.validate_single(&reg, &product, &exchange, custom_rule_names).await;
                    summary.lock().expect("summary poisoned").add_result(outcome);
                }
            })
            .buffer_unordered(self.workers)
            .collect::<Vec<()>>()
            .await;

        Arc::try_unwrap(summary)
            .map(|m| m.into_inner().expect("summary poisoned"))
            .unwrap_or_else(|_| unreachable!("summary still shared after drain"))
    }

    async fn validate_single(
        &self,
        region: &str,
        product_type: &str,
        exchange: &str,
        custom_rule_names: Option<&[String]>,
    ) -> ExchangeOutcome {
        let started = Instant::now();
        tracing::info!(region, product = product_type, exchange, "validating");

        let mut outcome = ExchangeOutcome {
            region: region.to_string(),
            product_type: product_type.to_string(),
            exchange: exchange.to_string(),
            success: false,
            error: None,
            run_id: None,
            duration_ms: 0,
            report: None,
        };

        match self
            .client
            .validate_exchange(
                product_type,
                exchange,
                custom_rule_names,
                DEFAULT_TIMEOUT,
                DEFAULT_MAX_ATTEMPTS,
            )
            .await
        {
            Ok(report) => {
                outcome.duration_ms = started.elapsed().as_millis() as i64;
                outcome.success = report.success;
                if !report.success {
                    outcome.error = Some(format!(
                        "Validation failed: {} out of {} expectations failed ({} passed)",
                        report.failed, report.total, report.successful
                    ));
                }

                if let Some(repo) = &self.repository {
                    let api_url = self.client.validate_url(product_type, exchange);
                    let record = RunRecord {
                        region,
                        report: &report,
                        custom_rule_names: custom_rule_names
                            .filter(|n| !n.is_empty())
                            .map(|n| n.join(",")),
                        api_url: &api_url,
                        duration_ms: outcome.duration_ms,
                    };
                    match repo.save_run(&record).await {
                        Ok(run_id) => outcome.run_id = Some(run_id),
                        Err(e) => {
                            // Validation stands; the run is just not recorded.
                            tracing::error!(
                                region,
                                exchange,
                                error = %e,
                                "validated but not persisted"
                            );
                        }
                    }
                }
                outcome.report = Some(report);
            }
            Err(e) => {
                outcome.duration_ms = started.elapsed().as_millis() as i64;
                outcome.error = Some(e.to_string());
                tracing::error!(region, product = product_type, exchange, error = %e, "validation task failed");
            }
        }

        outcome
    }
}
