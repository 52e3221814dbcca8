//! Shared HTTP plumbing for the Azure clients: client construction, bounded retries and
//! mapping of HTTP failures onto upstream error kinds.

use serde::de::DeserializeOwned;
use std::future::Future;
use std::time::Duration;

use crate::error::{Error, Result, Stage, UpstreamKind};

const BASE_BACKOFF_MS: u64 = 500;

/// Build a client with the per-call deadline
pub(crate) fn build_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| Error::Internal(format!("Failed to build HTTP client: {}", e)))
}

const MAX_BACKOFF_SHIFT: u32 = 6;

/// Honour `Retry-After` (seconds) when present, otherwise back off exponentially
pub(crate) fn retry_delay(response: &reqwest::Response, attempt: u32) -> Duration {
    let retry_after = response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok());
    delay_for(retry_after, attempt)
}

/// A server-supplied delay never exceeds the largest backoff step
fn delay_for(retry_after_secs: Option<u64>, attempt: u32) -> Duration {
    match retry_after_secs {
        Some(secs) => Duration::from_secs(secs).min(backoff(MAX_BACKOFF_SHIFT)),
        None => backoff(attempt),
    }
}

fn backoff(attempt: u32) -> Duration {
    Duration::from_millis(BASE_BACKOFF_MS << attempt.min(MAX_BACKOFF_SHIFT))
}

/// Send a request, retrying up to `max_retries` times on rate limiting or unavailability
///
/// Returns the first successful response. Non-transient failures return immediately with
/// the status and response body in the error message.
pub(crate) async fn send_with_retry<F, Fut>(
    stage: Stage,
    provider: &str,
    max_retries: u32,
    mut f: F,
) -> Result<reqwest::Response>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<reqwest::Response, reqwest::Error>>,
{
    let mut attempt = 0u32;
    loop {
        match f().await {
            Ok(response) if response.status().is_success() => return Ok(response),
            Ok(response) => {
                let status = response.status();
                let kind = UpstreamKind::from_status(status);
                if kind.is_transient() && attempt < max_retries {
                    let delay = retry_delay(&response, attempt);
                    tracing::warn!(
                        "{} {} ({}), retrying in {}ms ({}/{})",
                        provider,
                        kind,
                        status,
                        delay.as_millis(),
                        attempt + 1,
                        max_retries
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                    continue;
                }
                let body = response.text().await.unwrap_or_default();
                return Err(Error::upstream(
                    stage,
                    kind,
                    format!("{} request failed ({}): {}", provider, status, body),
                ));
            }
            Err(e) => {
                let kind = UpstreamKind::from_transport(&e);
                if kind.is_transient() && attempt < max_retries {
                    let delay = backoff(attempt);
                    tracing::warn!(
                        "{} request error: {}, retrying in {}ms ({}/{})",
                        provider,
                        e,
                        delay.as_millis(),
                        attempt + 1,
                        max_retries
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                    continue;
                }
                return Err(Error::upstream(
                    stage,
                    kind,
                    format!("{} request failed: {}", provider, e),
                ));
            }
        }
    }
}

/// Deserialize a successful response body
pub(crate) async fn parse_json<T: DeserializeOwned>(
    stage: Stage,
    provider: &str,
    response: reqwest::Response,
) -> Result<T> {
    let bytes = response.bytes().await.map_err(|e| {
        Error::upstream(
            stage,
            UpstreamKind::from_transport(&e),
            format!("Failed to read {} response: {}", provider, e),
        )
    })?;
    serde_json::from_slice(&bytes).map_err(|e| {
        Error::upstream(
            stage,
            UpstreamKind::MalformedResponse,
            format!("Failed to parse {} response: {}", provider, e),
        )
    })
}

/// Join a base endpoint and a path without doubling slashes
pub(crate) fn join_url(endpoint: &str, path: &str) -> String {
    format!(
        "{}/{}",
        endpoint.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_join_url() {
        assert_eq!(join_url("https://x.com/", "/a/b"), "https://x.com/a/b");
        assert_eq!(join_url("https://x.com", "a"), "https://x.com/a");
    }

    #[test]
    fn test_backoff_is_exponential_and_capped() {
        assert_eq!(backoff(0), Duration::from_millis(500));
        assert_eq!(backoff(1), Duration::from_millis(1000));
        assert_eq!(backoff(20), backoff(6));
    }

    #[test]
    fn test_retry_after_is_capped() {
        assert_eq!(delay_for(Some(2), 0), Duration::from_secs(2));
        assert_eq!(delay_for(Some(3600), 0), backoff(MAX_BACKOFF_SHIFT));
        assert_eq!(delay_for(None, 2), Duration::from_millis(2000));
    }

    #[tokio::test]
    async fn test_retry_after_header_is_read() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "3600"))
            .mount(&server)
            .await;

        let response = reqwest::get(format!("{}/x", server.uri())).await.unwrap();
        assert_eq!(retry_delay(&response, 0), Duration::from_secs(32));
    }

    #[tokio::test]
    async fn test_retries_rate_limit_then_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/x"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "0"))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/x"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let url = format!("{}/x", server.uri());
        let response = send_with_retry(Stage::Search, "test", 2, || client.get(&url).send())
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
    }

    #[tokio::test]
    async fn test_auth_failure_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/x"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .expect(1)
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let url = format!("{}/x", server.uri());
        let err = send_with_retry(Stage::Embedding, "test", 3, || client.get(&url).send())
            .await
            .unwrap_err();

        assert_eq!(err.upstream_kind(), Some(UpstreamKind::AuthFailure));
        assert_eq!(err.stage(), Some(Stage::Embedding));
        assert!(err.to_string().contains("bad key"));
    }

    #[tokio::test]
    async fn test_rate_limit_exhausts_retries() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "0"))
            .expect(2)
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let url = format!("{}/x", server.uri());
        let err = send_with_retry(Stage::Completion, "test", 1, || client.get(&url).send())
            .await
            .unwrap_err();
        assert_eq!(err.upstream_kind(), Some(UpstreamKind::RateLimited));
    }
}
