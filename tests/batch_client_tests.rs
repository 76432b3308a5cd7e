//! Retry behavior of the batch API client against a scripted server.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use pretty_assertions::assert_eq;
use refguard::batch::ApiClient;
use refguard::engine::ValidationReport;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Clone)]
struct Script {
    hits: Arc<AtomicUsize>,
    failures_before_success: usize,
}

async fn scripted_validate(
    State(script): State<Script>,
) -> Result<Json<ValidationReport>, StatusCode> {
    let attempt = script.hits.fetch_add(1, Ordering::SeqCst);
    if attempt < script.failures_before_success {
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    }
    Ok(Json(ValidationReport::from_results("XHKG", "stock", vec![], vec![], "base")))
}

async fn spawn_server(failures_before_success: usize) -> (String, Arc<AtomicUsize>) {
    let hits = Arc::new(AtomicUsize::new(0));
    let script = Script { hits: hits.clone(), failures_before_success };
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
    (format!("http://{addr}"), hits)
}

#[tokio::test]
async fn two_503s_then_success_takes_exactly_three_requests() {
    let (base_url, hits) = spawn_server(2).await;
    let client = ApiClient::new(&base_url);

    let started = Instant::now();
    let report = client
        .validate_exchange("stock", "XHKG", None, Duration::from_secs(5), 3)
        .await
        .unwrap();
    let elapsed = started.elapsed();

    assert_eq!(hits.load(Ordering::SeqCst), 3);
    assert!(report.success);
    assert_eq!(report.exchange, "XHKG");
    // Backoff slept 1 s then 2 s between the three attempts.
    assert!(elapsed >= Duration::from_secs(3), "elapsed was {elapsed:?}");
}

#[tokio::test]
async fn persistent_503_exhausts_attempts_and_surfaces() {
    let (base_url, hits) = spawn_server(usize::MAX).await;
    let client = ApiClient::new(&base_url);

    let err = client
        .validate_exchange("stock", "XHKG", None, Duration::from_secs(5), 3)
        .await
        .unwrap_err();
    assert_eq!(hits.load(Ordering::SeqCst), 3);
    assert!(err.to_string().contains("503"));
}

#[tokio::test]
async fn health_check_reflects_server_state() {
    let (base_url, _) = spawn_server(0).await;
    assert!(ApiClient::new(&base_url).health_check().await);
    assert!(!ApiClient::new("http://127.0.0.1:9").health_check().await);
}
