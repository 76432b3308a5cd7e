//! Run persistence: one transaction per completed validation.
//!
//! Three tables are written atomically: the run header, one batched insert
//! for the expectation results, and one batched insert for the applied
//! rules. On any failure the transaction rolls back and the caller still
//! returns the validation outcome, annotated as not persisted. Persistence
//! errors never mask validation results.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::engine::ValidationReport;
use crate::error::{DomainError, DomainResult};

/// Everything the run header needs beyond the report itself.
pub struct RunRecord<'a> {
    pub region: &'a str,
    pub report: &'a ValidationReport,
    pub custom_rule_names: Option<String>,
    pub api_url: &'a str,
    pub duration_ms: i64,
}

/// Where completed runs are recorded.
///
/// The orchestrator only depends on this capability; the Postgres
/// repository below is the production implementation.
#[async_trait]
pub trait RunStore: Send + Sync {
    /// Persist one run and return its assigned id.
    async fn save_run(&self, run: &RunRecord<'_>) -> DomainResult<i64>;
}

pub struct ValidationRepository {
    pool: PgPool,
}

impl ValidationRepository {
    pub async fn connect(connection_string: &str) -> DomainResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(4)
            .connect(connection_string)
            .await
            .map_err(|e| DomainError::Persistence(format!("cannot connect: {e}")))?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn test_connection(&self) -> bool {
        sqlx::query_scalar::<_, i32>("SELECT 1").fetch_one(&self.pool).await.is_ok()
    }

    /// Persist one run. Returns the strictly-monotonic `run_id` assigned by
    /// the database.
    pub async fn save_run(&self, run: &RunRecord<'_>) -> DomainResult<i64> {
        let report = run.report;
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DomainError::Persistence(format!("begin failed: {e}")))?;

        let run_id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO "GeValidationRuns" (
                timestamp, region, product_type, exchange,
                success, total, successful, failed,
                rules_applied_label, custom_rule_names, api_url, duration_ms
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING run_id
            "#,
        )
        .bind(Utc::now())
        .bind(run.region)
        .bind(&report.product_type)
        .bind(&report.exchange)
        .bind(report.success)
        .bind(report.total as i64)
        .bind(report.successful as i64)
        .bind(report.failed as i64)
        .bind(&report.rules_applied_label)
        .bind(&run.custom_rule_names)
        .bind(run.api_url)
        .bind(run.duration_ms)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| DomainError::Persistence(format!("run insert failed: {e}")))?;

        // Child rows go in as one multi-row statement per table.
        if !report.results.is_empty() {
            let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
                r#"INSERT INTO "GeExpectationResults" (
                    run_id, "column", expectation_type, success,
                    element_count, unexpected_count, unexpected_percent,
                    missing_count, missing_percent, result_details_json
                ) "#,
            );
            builder.push_values(&report.results, |mut b, result| {
                b.push_bind(run_id)
                    .push_bind(&result.column)
                    .push_bind(&result.expectation_type)
                    .push_bind(result.success)
                    .push_bind(result.element_count as i64)
                    .push_bind(result.unexpected_count as i64)
                    .push_bind(result.unexpected_percent)
                    .push_bind(result.missing_count as i64)
                    .push_bind(result.missing_percent)
                    .push_bind(result.details_json().to_string());
            });
            builder
                .build()
                .execute(&mut *tx)
                .await
                .map_err(|e| DomainError::Persistence(format!("result batch insert failed: {e}")))?;
        }

        if !report.rules_applied.is_empty() {
            let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
                r#"INSERT INTO "GeValidationRulesApplied" (
                    run_id, rule_name, rule_type, rule_level, rule_source
                ) "#,
            );
            builder.push_values(&report.rules_applied, |mut b, rule| {
                b.push_bind(run_id)
                    .push_bind(&rule.name)
                    .push_bind(&rule.rule_type)
                    .push_bind(&rule.level)
                    .push_bind(&rule.source);
            });
            builder
                .build()
                .execute(&mut *tx)
                .await
                .map_err(|e| DomainError::Persistence(format!("rule batch insert failed: {e}")))?;
        }

        tx.commit()
            .await
            .map_err(|e| DomainError::Persistence(format!("commit failed: {e}")))?;

        tracing::info!(
            run_id,
            exchange = %report.exchange,
            product = %report.product_type,
            "validation run persisted"
        );
        Ok(run_id)
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl RunStore for ValidationRepository {
    async fn save_run(&self, run: &RunRecord<'_>) -> DomainResult<i64> {
        ValidationRepository::save_run(self, run).await
    }
}
