//! Retrying HTTP transport shared by both inventory clients.

use anyhow::{Context, Result, anyhow};
use log::{debug, info, warn};
use reqwest::header::HeaderMap;
use reqwest::{Client, StatusCode};
use serde_json::Value;

use super::request::{ApiRequest, Method};
use super::retry::{ApiError, AttemptOutcome, RetryPolicy};

/// A configured connection to one remote API: base address, fixed header
/// set (credentials baked in at construction) and retry policy.
///
/// Never mutated after construction, so one session is safely reused across
/// any number of logical calls.
#[derive(Clone)]
pub struct ClientSession {
    base_url: String,
    client: Client,
    policy: RetryPolicy,
}

impl ClientSession {
    /// Builds a session whose every request carries the given headers.
    pub fn new(
        base_url: impl Into<String>,
        headers: HeaderMap,
        policy: RetryPolicy,
    ) -> Result<Self> {
        let client = Client::builder()
            .user_agent("snipiter")
            .default_headers(headers)
            .build()
            .context("Failed to build HTTP client")?;

        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self {
            base_url,
            client,
            policy,
        })
    }

    /// Joins a path onto the session's base address.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Executes one logical API call, hiding transient failures behind the
    /// session's retry policy.
    ///
    /// Returns `Ok(Some(body))` for a response in the 2xx class with a JSON
    /// body, `Ok(None)` for a 404 when `tolerate_not_found` is set, and
    /// `Err(ApiError::Unavailable)` once the attempt budget is spent.
    /// Non-2xx responses, connection failures and unparsable 2xx bodies all
    /// consume one attempt and are retried after an exponentially growing
    /// delay; none of them reach the caller directly.
    #[tracing::instrument(skip(self, request), fields(url = %request.url))]
    pub async fn send(
        &self,
        request: &ApiRequest,
        tolerate_not_found: bool,
    ) -> Result<Option<Value>, ApiError> {
        let issued = self.policy.attempts.saturating_sub(1);

        for attempt in 1..self.policy.attempts {
            match self.attempt(request, tolerate_not_found).await {
                AttemptOutcome::Success(body) => return Ok(Some(body)),
                AttemptOutcome::NotFoundTolerated => {
                    debug!("{} returned 404, treated as an absent record", request.url);
                    return Ok(None);
                }
                AttemptOutcome::RetryableFailure(cause) => {
                    warn!(
                        "{} {} failed (attempt {}/{}): {:#}",
                        request.method, request.url, attempt, issued, cause
                    );
                }
                AttemptOutcome::EncodingFailure(cause) => {
                    warn!(
                        "{} {} returned an unparsable body (attempt {}/{}): {:#}",
                        request.method, request.url, attempt, issued, cause
                    );
                }
            }

            let delay = self.policy.delay_after(attempt);
            info!("Sleeping for {:.2}s", delay.as_secs_f64());
            tokio::time::sleep(delay).await;
        }

        Err(ApiError::Unavailable)
    }

    /// One network call, classified. Never fails outright: every failure
    /// mode maps onto an [`AttemptOutcome`] variant for the retry loop to
    /// match on.
    async fn attempt(&self, request: &ApiRequest, tolerate_not_found: bool) -> AttemptOutcome {
        let mut builder = match request.method {
            Method::Get => self.client.get(&request.url),
            Method::Post => self.client.post(&request.url),
            Method::Patch => self.client.patch(&request.url),
        };
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(payload) = &request.payload {
            builder = builder.json(payload);
        }

        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => {
                return AttemptOutcome::RetryableFailure(
                    anyhow::Error::from(e).context("Failed to send request"),
                );
            }
        };

        let status = response.status();
        if status.is_success() {
            // The whole 2xx class counts, not an enumerated set of codes.
            return match response.json::<Value>().await {
                Ok(body) => AttemptOutcome::Success(body),
                Err(e) => AttemptOutcome::EncodingFailure(
                    anyhow::Error::from(e).context("Failed to parse JSON response"),
                ),
            };
        }

        if tolerate_not_found && status == StatusCode::NOT_FOUND {
            return AttemptOutcome::NotFoundTolerated;
        }

        AttemptOutcome::RetryableFailure(anyhow!("HTTP {} from {}", status, request.url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    fn fast_session(base_url: &str, attempts: u32) -> ClientSession {
        ClientSession::new(
            base_url,
            HeaderMap::new(),
            RetryPolicy {
                attempts,
                base_delay: Duration::from_millis(5),
                multiplier: 1.8,
            },
        )
        .unwrap()
    }

    #[test]
    fn test_endpoint_joins_slashes() {
        let session = fast_session("http://example.invalid/api/", 3);
        assert_eq!(
            session.endpoint("/hardware/1"),
            "http://example.invalid/api/hardware/1"
        );
        assert_eq!(
            session.endpoint("computers"),
            "http://example.invalid/api/computers"
        );
    }

    #[tokio::test]
    async fn test_success_short_circuits() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/thing")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"a": 1}"#)
            .expect(1)
            .create_async()
            .await;

        let session = fast_session(&server.url(), 3);
        let request = ApiRequest::get(session.endpoint("thing"));
        let body = session.send(&request, false).await.unwrap();

        mock.assert_async().await;
        assert_eq!(body, Some(json!({"a": 1})));
    }

    #[tokio::test]
    async fn test_tolerated_not_found_is_not_an_error() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/thing")
            .with_status(404)
            .expect(1)
            .create_async()
            .await;

        let session = fast_session(&server.url(), 3);
        let request = ApiRequest::get(session.endpoint("thing"));
        let body = session.send(&request, true).await.unwrap();

        mock.assert_async().await;
        assert_eq!(body, None);
    }

    #[tokio::test]
    async fn test_untolerated_not_found_consumes_attempts() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/thing")
            .with_status(404)
            .expect(2)
            .create_async()
            .await;

        let session = fast_session(&server.url(), 3);
        let request = ApiRequest::get(session.endpoint("thing"));
        let result = session.send(&request, false).await;

        mock.assert_async().await;
        assert!(matches!(result, Err(ApiError::Unavailable)));
    }

    #[tokio::test]
    async fn test_attempt_budget_issues_one_less_call() {
        let mut server = mockito::Server::new_async().await;
        // A budget of 4 issues exactly 3 network calls.
        let mock = server
            .mock("GET", "/thing")
            .with_status(500)
            .expect(3)
            .create_async()
            .await;

        let session = fast_session(&server.url(), 4);
        let request = ApiRequest::get(session.endpoint("thing"));
        let result = session.send(&request, false).await;

        mock.assert_async().await;
        assert!(matches!(result, Err(ApiError::Unavailable)));
    }

    #[tokio::test]
    async fn test_malformed_json_on_2xx_is_retried() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/thing")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body("not json at all")
            .expect(2)
            .create_async()
            .await;

        let session = fast_session(&server.url(), 3);
        let request = ApiRequest::get(session.endpoint("thing"));
        let result = session.send(&request, false).await;

        mock.assert_async().await;
        assert!(matches!(result, Err(ApiError::Unavailable)));
    }

    #[tokio::test]
    async fn test_any_2xx_status_is_success() {
        for status in [200, 201, 299] {
            let mut server = mockito::Server::new_async().await;
            let _mock = server
                .mock("GET", "/thing")
                .with_status(status)
                .with_body("{}")
                .create_async()
                .await;

            let session = fast_session(&server.url(), 3);
            let request = ApiRequest::get(session.endpoint("thing"));
            let body = session.send(&request, false).await.unwrap();
            assert_eq!(body, Some(json!({})), "status {} must succeed", status);
        }
    }

    #[tokio::test]
    async fn test_non_2xx_statuses_are_failures() {
        for status in [301, 404, 500] {
            let mut server = mockito::Server::new_async().await;
            let _mock = server
                .mock("GET", "/thing")
                .with_status(status)
                .with_body("{}")
                .create_async()
                .await;

            let session = fast_session(&server.url(), 2);
            let request = ApiRequest::get(session.endpoint("thing"));
            let result = session.send(&request, false).await;
            assert!(
                matches!(result, Err(ApiError::Unavailable)),
                "status {} must fail",
                status
            );
        }
    }

    #[tokio::test]
    async fn test_post_sends_json_payload() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/hardware/1/checkout")
            .match_header("content-type", "application/json")
            .match_body(mockito::Matcher::Json(
                json!({"checkout_to_type": "user", "assigned_user": 9}),
            ))
            .with_status(200)
            .with_body(r#"{"status": "success"}"#)
            .create_async()
            .await;

        let session = fast_session(&server.url(), 3);
        let request = ApiRequest::post(
            session.endpoint("hardware/1/checkout"),
            Some(json!({"checkout_to_type": "user", "assigned_user": 9})),
        );
        let body = session.send(&request, false).await.unwrap();

        mock.assert_async().await;
        assert_eq!(body, Some(json!({"status": "success"})));
    }

    #[tokio::test]
    async fn test_query_parameters_are_encoded() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/models")
            .match_query(mockito::Matcher::UrlEncoded(
                "search".into(),
                "MacBookPro18,3".into(),
            ))
            .with_status(200)
            .with_body(r#"{"rows": []}"#)
            .create_async()
            .await;

        let session = fast_session(&server.url(), 3);
        let request =
            ApiRequest::get_with_query(session.endpoint("models"), &[("search", "MacBookPro18,3")]);
        let body = session.send(&request, false).await.unwrap();

        mock.assert_async().await;
        assert_eq!(body, Some(json!({"rows": []})));
    }

    #[tokio::test]
    async fn test_connection_failure_is_retried_then_unavailable() {
        // Nothing listens on this port; every attempt is a transport error.
        let session = fast_session("http://127.0.0.1:9", 3);
        let request = ApiRequest::get(session.endpoint("thing"));
        let result = session.send(&request, false).await;
        assert!(matches!(result, Err(ApiError::Unavailable)));
    }

    #[tokio::test]
    async fn test_server_error_then_success() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;

        // First call sees a 500, the retry sees the real body.
        Mock::given(method("GET"))
            .and(path("/thing"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/thing"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "success"})))
            .expect(1)
            .mount(&server)
            .await;

        let session = fast_session(&server.uri(), 3);
        let request = ApiRequest::get(session.endpoint("thing"));

        let started = std::time::Instant::now();
        let body = session.send(&request, false).await.unwrap();

        assert_eq!(body, Some(json!({"status": "success"})));
        // One backoff sleep of the base delay happened in between.
        assert!(started.elapsed() >= Duration::from_millis(5));
    }
}
