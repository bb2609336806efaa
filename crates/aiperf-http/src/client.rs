//! Shared HTTP client construction (§5 Resource policy).

use crate::error::{HttpError, Result};
use reqwest::{Client, ClientBuilder};
use std::time::Duration;
use tracing::{debug, warn};

/// Per-worker HTTP client configuration. One client is built at
/// `ProfileConfigure` time and reused for every credit the worker serves.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct HttpClientConfig {
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub pool_max_idle_per_host: usize,
    pub pool_idle_timeout_secs: u64,
    pub max_retries: u32,
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 600,
            connect_timeout_secs: 10,
            pool_max_idle_per_host: 32,
            pool_idle_timeout_secs: 90,
            max_retries: 0,
            user_agent: format!("aiperf/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Build a client tuned for first-byte-timing accuracy: `TCP_NODELAY` set,
/// idle connections expired before the endpoint closes them out from under
/// the pool (the failure mode otherwise is a request hanging on a dead
/// connection the pool thought was still live).
pub fn create_client(config: &HttpClientConfig) -> Result<Client> {
    ClientBuilder::new()
        .timeout(Duration::from_secs(config.timeout_secs))
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .pool_max_idle_per_host(config.pool_max_idle_per_host)
        .pool_idle_timeout(Duration::from_secs(config.pool_idle_timeout_secs))
        .tcp_nodelay(true)
        .user_agent(&config.user_agent)
        .use_rustls_tls()
        .build()
        .map_err(|e| HttpError::Config(format!("failed to create HTTP client: {e}")))
}

/// Benchmark runs generally want exactly one attempt per credit — a retried
/// request would corrupt the timing it's trying to measure — but transient
/// connect failures during warmup are worth one bounded retry.
pub async fn with_retry<F, Fut, T>(max_retries: u32, operation: F) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let mut last_error = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            let backoff_ms = 2u64.pow(attempt - 1) * 100;
            debug!(backoff_ms, attempt, max_retries, "retrying request");
            tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
        }

        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) => {
                let should_retry = match &e {
                    HttpError::Request(req_err) => req_err.is_connect() || req_err.is_timeout(),
                    HttpError::Endpoint { status, .. } => matches!(status, 429 | 500 | 502 | 503 | 504),
                    HttpError::Timeout(_) => true,
                    _ => false,
                };

                if should_retry && attempt < max_retries {
                    warn!(attempt = attempt + 1, max_retries, error = %e, "request failed");
                    last_error = Some(e);
                } else {
                    return Err(e);
                }
            }
        }
    }

    Err(last_error.unwrap_or_else(|| HttpError::Config("retry loop exited unexpectedly".into())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_favors_single_attempt_measurement() {
        let config = HttpClientConfig::default();
        assert_eq!(config.max_retries, 0);
        assert!(config.user_agent.starts_with("aiperf/"));
    }

    #[test]
    fn create_client_succeeds() {
        let config = HttpClientConfig::default();
        assert!(create_client(&config).is_ok());
    }

    #[tokio::test]
    async fn retry_returns_first_success() {
        let result = with_retry(3, || async { Ok::<i32, HttpError>(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn retry_does_not_retry_config_errors() {
        let attempts = std::sync::atomic::AtomicU32::new(0);
        let result = with_retry(3, || {
            attempts.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            async { Err::<i32, HttpError>(HttpError::Config("bad config".into())) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(attempts.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retry_retries_retryable_endpoint_errors() {
        let attempts = std::sync::atomic::AtomicU32::new(0);
        let result = with_retry(2, || {
            let n = attempts.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(HttpError::Endpoint { status: 503, message: "busy".into() })
                } else {
                    Ok(1)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 1);
    }
}
