//! Regional sweep behavior against a scripted validation API.

use async_trait::async_trait;
use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use pretty_assertions::assert_eq;
use refguard::batch::{ApiClient, BatchValidator, RegionsConfig};
use refguard::engine::{ExpectationResult, ValidationReport};
use refguard::error::DomainResult;
use refguard::persistence::{RunRecord, RunStore};
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Tracks how many validate requests run at once, to observe the worker
/// bound from the server side.
#[derive(Default)]
struct Gauge {
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

#[derive(Clone)]
struct Script {
    gauge: Arc<Gauge>,
    failing_exchange: &'static str,
}

fn expectation(success: bool) -> ExpectationResult {
    ExpectationResult {
        column: "MasterId".into(),
        expectation_type: "ColumnUnique".into(),
        success,
        element_count: 3,
        unexpected_count: if success { 0 } else { 2 },
        unexpected_percent: if success { 0.0 } else { 66.7 },
        missing_count: 0,
        missing_percent: 0.0,
        partial_unexpected: vec![],
    }
}

async fn scripted_validate(
    State(script): State<Script>,
    Path((product, exchange)): Path<(String, String)>,
) -> Json<ValidationReport> {
    let current = script.gauge.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
    script.gauge.max_in_flight.fetch_max(current, Ordering::SeqCst);
    // Hold the request open long enough for the pool to overlap tasks.
    tokio::time::sleep(Duration::from_millis(50)).await;
    script.gauge.in_flight.fetch_sub(1, Ordering::SeqCst);

    let passed = exchange != script.failing_exchange;
    Json(ValidationReport::from_results(
        &exchange,
        &product,
        vec![expectation(passed)],
        vec![],
        "exchange",
    ))
}

async fn spawn_server(failing_exchange: &'static str) -> (String, Arc<Gauge>) {
    let gauge = Arc::new(Gauge::default());
    let script = Script { gauge: gauge.clone(), failing_exchange };
    let app = Router::new()
        .route("/health", get(|| async { "ok" }))
        .route(
            "/api/v1/rules/validate/:product/:exchange",
            get(scripted_validate),
        )
        .with_state(script);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}"), gauge)
}

/// In-memory run store standing in for the Postgres repository.
#[derive(Default)]
struct MemoryRunStore {
    next_id: AtomicI64,
    saved: Mutex<Vec<(String, String, bool)>>,
}

#[async_trait]
impl RunStore for MemoryRunStore {
    async fn save_run(&self, run: &RunRecord<'_>) -> DomainResult<i64> {
        self.saved.lock().unwrap().push((
            run.region.to_string(),
            run.report.exchange.clone(),
            run.report.success,
        ));
        Ok(self.next_id.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

fn apac_regions() -> RegionsConfig {
    RegionsConfig::from_yaml_str("apac:\n  stock: [XHKG, XTKS, XNSE]\n").unwrap()
}

#[tokio::test]
async fn one_failing_exchange_tallies_and_persists_all_three_runs() {
    let (base_url, gauge) = spawn_server("XTKS").await;
    let store = Arc::new(MemoryRunStore::default());
    let validator = BatchValidator::new(
        apac_regions(),
        ApiClient::new(&base_url),
        Some(store.clone() as Arc<dyn RunStore>),
        2,
    );

    let summary = validator.validate_region("apac", None).await;

    assert_eq!(summary.total, 3);
    assert_eq!(summary.successful, 2);
    assert_eq!(summary.failed, 1);
    assert!(summary.error.is_none());
    assert_eq!(summary.results.len(), 3);

    // Every run was recorded, pass and fail alike.
    assert_eq!(summary.saved_run_ids().len(), 3);
    let saved = store.saved.lock().unwrap();
    assert_eq!(saved.len(), 3);
    assert_eq!(saved.iter().filter(|(_, _, success)| !success).count(), 1);

    let failed = summary
        .results
        .iter()
        .find(|o| !o.success)
        .expect("one failing outcome");
    assert_eq!(failed.exchange, "XTKS");
    assert!(failed
        .error
        .as_deref()
        .unwrap()
        .contains("1 out of 1 expectations failed"));
    assert!(failed.run_id.is_some());

    // The bounded pool never exceeded its two workers.
    assert!(gauge.max_in_flight.load(Ordering::SeqCst) <= 2);
}

#[tokio::test]
async fn persistence_failure_does_not_lose_the_validation_outcome() {
    struct FailingStore;

    #[async_trait]
    impl RunStore for FailingStore {
        async fn save_run(&self, _run: &RunRecord<'_>) -> DomainResult<i64> {
            Err(refguard::error::DomainError::Persistence("disk full".into()))
        }
    }

    let (base_url, _) = spawn_server("none").await;
    let validator = BatchValidator::new(
        apac_regions(),
        ApiClient::new(&base_url),
        Some(Arc::new(FailingStore) as Arc<dyn RunStore>),
        2,
    );

    let summary = validator.validate_region("apac", None).await;
    assert_eq!(summary.successful, 3);
    assert_eq!(summary.saved_run_ids().len(), 0);
    assert!(summary.results.iter().all(|o| o.report.is_some()));
}

#[tokio::test]
async fn unreachable_api_marks_the_region_unavailable() {
    let validator =
        BatchValidator::new(apac_regions(), ApiClient::new("http://127.0.0.1:9"), None, 2);

    let summary = validator.validate_region("apac", None).await;
    assert_eq!(summary.error.as_deref(), Some("API unavailable"));
    assert_eq!(summary.total, 0);
    assert!(summary.results.is_empty());
}
