//! HTTP client for the validation API.
//!
//! One persistent `reqwest::Client` (connection pooling at the HTTP layer),
//! a per-attempt timeout, and exponential backoff for transient failures:
//! retryable statuses (429, 5xx) and connect/timeout errors. Everything
//! else surfaces immediately.

use std::time::Duration;

use crate::engine::ValidationReport;
use crate::error::{DomainError, DomainResult};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);
pub const DEFAULT_MAX_ATTEMPTS: usize = 3;

/// Sleep between successive retries, in seconds.
const RETRY_BACKOFF_SECS: [u64; 3] = [1, 2, 4];

/// HTTP status codes that are safe to retry.
const RETRYABLE_STATUS: [u16; 5] = [429, 500, 502, 503, 504];

pub struct ApiClient {
    base_url: String,
    http: reqwest::Client,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn validate_url(&self, product_type: &str, exchange: &str) -> String {
        format!("{}/api/v1/rules/validate/{product_type}/{exchange}", self.base_url)
    }

    /// True when the API answers its liveness probe.
    pub async fn health_check(&self) -> bool {
        let url = format!("{}/health", self.base_url);
        match self.http.get(&url).timeout(Duration::from_secs(5)).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }

    /// Call the layered validation endpoint with retry and backoff.
    pub async fn validate_exchange(
        &self,
        product_type: &str,
        exchange: &str,
        custom_rule_names: Option<&[String]>,
        timeout: Duration,
        max_attempts: usize,
    ) -> DomainResult<ValidationReport> {
        let url = self.validate_url(product_type, exchange);
        let context = format!("{product_type}/{exchange}");

        for attempt in 0..max_attempts {
            let mut request = self.http.get(&url).timeout(timeout);
            if let Some(names) = custom_rule_names {
                if !names.is_empty() {
                    request = request.query(&[("custom_rule_names", names.join(","))]);
                }
            }

            match request.send().await {
                Ok(resp) => {
                    let status = resp.status();
                    if RETRYABLE_STATUS.contains(&status.as_u16()) && attempt + 1 < max_attempts {
                        let delay = backoff_delay(attempt);
                        tracing::warn!(
                            status = status.as_u16(),
                            %context,
                            attempt = attempt + 1,
                            max_attempts,
                            delay_secs = delay.as_secs(),
                            "retryable response, backing off"
                        );
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    if !status.is_success() {
                        let body = resp.text().await.unwrap_or_default();
                        let preview: String = body.chars().take(200).collect();
                        return Err(DomainError::Other(format!(
                            "HTTP {} for {context}: {preview}",
                            status.as_u16()
                        )));
                    }
                    return resp.json::<ValidationReport>().await.map_err(|e| {
                        DomainError::Other(format!("invalid JSON response for {context}: {e}"))
                    });
                }
                Err(err) if (err.is_timeout() || err.is_connect()) && attempt + 1 < max_attempts => {
                    let delay = backoff_delay(attempt);
                    tracing::warn!(
                        %context,
                        attempt = attempt + 1,
                        max_attempts,
                        delay_secs = delay.as_secs(),
                        error = %err,
                        "transient transport error, backing off"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) if err.is_timeout() => {
                    return Err(DomainError::Other(format!(
                        "request timed out after {max_attempts} attempts: {url}"
                    )));
                }
                Err(err) => return Err(DomainError::Http(err)),
            }
        }

        Err(DomainError::Other(format!("failed after {max_attempts} attempts: {url}")))
    }
}

/// Delay before retrying `attempt` (0-based): 1 s, 2 s, 4 s, capped.
pub fn backoff_delay(attempt: usize) -> Duration {
    let index = attempt.min(RETRY_BACKOFF_SECS.len() - 1);
    Duration::from_secs(RETRY_BACKOFF_SECS[index])
}
