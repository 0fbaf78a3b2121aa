//! HTTP fetching with bounded retry and user-agent rotation.
//!
//! This module is the only place that talks to the network. Everything above
//! it (page summaries, articles, feeds, search) goes through [`Fetcher`].
//!
//! # Architecture
//!
//! - [`SendRequest`]: one HTTP exchange, no retry, no status checks
//! - [`ReqwestTransport`]: the real implementation over a persistent `reqwest::Client`
//! - [`Fetcher`]: owns a transport plus the user-agent pool and runs the retry loop
//!
//! # Retry Strategy
//!
//! - `max_retries + 1` attempts in total
//! - Fixed delay between attempts (no exponential growth, no jitter)
//! - A fresh user agent is drawn before every attempt when rotation is on
//! - Any status outside `200..=399` counts as a failed attempt

use rand::{Rng, rng};
use reqwest::header::{HeaderMap, USER_AGENT};
use reqwest::{Client, ClientBuilder, Method};
use std::fmt;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};

use crate::error::{ConfigError, FetchError};

/// Browser signatures used when no pool is configured.
pub const DEFAULT_USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:109.0) Gecko/20100101 Firefox/119.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Edge/119.0.0.0",
    "Mozilla/5.0 (X11; Ubuntu; Linux x86_64; rv:109.0) Gecko/20100101 Firefox/119.0",
];

/// Timeout and retry settings for one call.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchPolicy {
    /// Per-attempt timeout.
    pub timeout: Duration,
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Fixed pause between attempts.
    pub retry_delay: Duration,
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            max_retries: 3,
            retry_delay: Duration::from_secs(1),
        }
    }
}

impl FetchPolicy {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Request payload.
#[derive(Debug, Clone)]
pub enum RequestBody {
    Json(serde_json::Value),
    Text(String),
    Form(Vec<(String, String)>),
}

/// Extra headers, query parameters and payload passed through to the request.
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    pub headers: Vec<(String, String)>,
    pub query: Vec<(String, String)>,
    pub body: Option<RequestBody>,
}

/// A single HTTP exchange as handed to a [`SendRequest`] implementation.
#[derive(Debug)]
pub struct FetchRequest<'a> {
    pub method: &'a Method,
    pub url: &'a str,
    pub user_agent: &'a str,
    pub timeout: Duration,
    pub options: &'a FetchOptions,
}

/// Status, headers and raw body of a response.
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl FetchResult {
    /// Body decoded as UTF-8, invalid sequences replaced.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn is_success(&self) -> bool {
        (200..400).contains(&self.status)
    }
}

/// Trait for performing one HTTP exchange.
///
/// Implementors return whatever the server answered, including error
/// statuses; deciding what counts as a failure is up to [`Fetcher`].
pub trait SendRequest {
    async fn send(&self, request: &FetchRequest<'_>) -> Result<FetchResult, FetchError>;
}

/// [`SendRequest`] over a persistent `reqwest::Client`.
///
/// The client keeps its connection pool and cookie jar for as long as the
/// transport lives, which is what makes consecutive requests share a session.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, FetchError> {
        Self::from_builder(client_builder())
    }

    fn from_builder(builder: ClientBuilder) -> Result<Self, FetchError> {
        let client = builder
            .build()
            .map_err(|e| FetchError::transport("<client>", &e))?;
        Ok(Self { client })
    }
}

/// Client settings shared by every session: a cookie jar that lives as long as the client.
fn client_builder() -> ClientBuilder {
    Client::builder().cookie_store(true)
}

impl SendRequest for ReqwestTransport {
    async fn send(&self, request: &FetchRequest<'_>) -> Result<FetchResult, FetchError> {
        let options = request.options;
        let mut builder = self
            .client
            .request(request.method.clone(), request.url)
            .header(USER_AGENT, request.user_agent)
            .timeout(request.timeout);

        for (name, value) in &options.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if !options.query.is_empty() {
            builder = builder.query(&options.query);
        }
        builder = match &options.body {
            Some(RequestBody::Json(value)) => builder.json(value),
            Some(RequestBody::Text(text)) => builder.body(text.clone()),
            Some(RequestBody::Form(pairs)) => builder.form(pairs),
            None => builder,
        };

        let response = builder
            .send()
            .await
            .map_err(|e| FetchError::transport(request.url, &e))?;
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|e| FetchError::transport(request.url, &e))?
            .to_vec();

        Ok(FetchResult {
            status,
            headers,
            body,
        })
    }
}

/// HTTP client with a rotating identity and a bounded, fixed-delay retry loop.
///
/// The transport is acquired at construction and released by [`Fetcher::close`]
/// or when the fetcher is dropped, whichever comes first. Rotation mutates the
/// fetcher, so every call takes `&mut self`; a concurrent crawler needs one
/// fetcher per worker.
pub struct Fetcher<T> {
    transport: Option<T>,
    user_agents: Vec<String>,
    rotate: bool,
    current: usize,
}

impl<T> fmt::Debug for Fetcher<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fetcher")
            .field("open", &self.transport.is_some())
            .field("user_agents", &self.user_agents.len())
            .field("rotate", &self.rotate)
            .field("current", &self.current)
            .finish()
    }
}

impl<T> Fetcher<T> {
    /// User agent that the next attempt will send unless rotation replaces it.
    pub fn user_agent(&self) -> &str {
        &self.user_agents[self.current]
    }

    pub fn user_agents(&self) -> &[String] {
        &self.user_agents
    }

    #[cfg(test)]
    pub fn is_closed(&self) -> bool {
        self.transport.is_none()
    }

    #[cfg(test)]
    pub fn transport(&self) -> Option<&T> {
        self.transport.as_ref()
    }

    /// Release the session. Calling it again is a no-op.
    pub fn close(&mut self) {
        if self.transport.take().is_some() {
            debug!("Fetcher session closed");
        }
    }

    /// Draw the next identity: uniformly from the pool with rotation, the first entry without.
    pub fn rotate_user_agent(&mut self) {
        self.current = if self.rotate {
            rng().random_range(0..self.user_agents.len())
        } else {
            0
        };
    }
}

impl<T> Drop for Fetcher<T> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<T> Fetcher<T>
where
    T: SendRequest,
{
    /// Wrap a transport with a user-agent pool.
    ///
    /// # Errors
    ///
    /// [`ConfigError::EmptyUserAgentPool`] when `user_agents` is empty.
    pub fn new(transport: T, user_agents: Vec<String>, rotate: bool) -> Result<Self, ConfigError> {
        if user_agents.is_empty() {
            return Err(ConfigError::EmptyUserAgentPool);
        }
        let mut fetcher = Self {
            transport: Some(transport),
            user_agents,
            rotate,
            current: 0,
        };
        fetcher.rotate_user_agent();
        Ok(fetcher)
    }

    /// Wrap a transport with [`DEFAULT_USER_AGENTS`] and rotation on.
    #[cfg(test)]
    pub fn with_default_agents(transport: T) -> Self {
        let mut fetcher = Self {
            transport: Some(transport),
            user_agents: DEFAULT_USER_AGENTS.iter().map(|s| s.to_string()).collect(),
            rotate: true,
            current: 0,
        };
        fetcher.rotate_user_agent();
        fetcher
    }

    /// Perform a request, retrying failed attempts.
    ///
    /// A user agent is drawn before every attempt when rotation is on. An
    /// attempt fails on a transport error or a status outside `200..=399`;
    /// failed attempts are followed by a `policy.retry_delay` pause.
    ///
    /// # Arguments
    ///
    /// * `method` - HTTP method
    /// * `url` - Absolute URL to request
    /// * `policy` - Per-attempt timeout, retry budget and pause
    /// * `options` - Headers, query parameters and body passed through unchanged
    ///
    /// # Returns
    ///
    /// The first successful response, with its status, headers and raw body.
    ///
    /// # Errors
    ///
    /// - [`FetchError::Closed`] right away if the session was released
    /// - [`FetchError::RetriesExhausted`] once `policy.max_retries + 1` attempts
    ///   have failed; its source is the last failure
    #[instrument(level = "info", skip_all, fields(%method, %url))]
    pub async fn fetch(
        &mut self,
        method: Method,
        url: &str,
        policy: &FetchPolicy,
        options: &FetchOptions,
    ) -> Result<FetchResult, FetchError> {
        let total_t0 = Instant::now();
        let mut attempt: u32 = 0;

        loop {
            if self.rotate {
                self.rotate_user_agent();
            }
            let Some(transport) = self.transport.as_ref() else {
                return Err(FetchError::Closed);
            };
            let request = FetchRequest {
                method: &method,
                url,
                user_agent: &self.user_agents[self.current],
                timeout: policy.timeout,
                options,
            };

            let attempt_t0 = Instant::now();
            let outcome = transport
                .send(&request)
                .await
                .and_then(|result| check_status(url, result));

            match outcome {
                Ok(result) => {
                    debug!(
                        status = result.status,
                        bytes = result.body.len(),
                        attempt = attempt.saturating_add(1),
                        "Fetched"
                    );
                    return Ok(result);
                }
                Err(e) => {
                    let attempt_dt = attempt_t0.elapsed();
                    let total_dt = total_t0.elapsed();

                    if attempt >= policy.max_retries {
                        error!(
                            attempts = attempt.saturating_add(1),
                            elapsed_ms_attempt = attempt_dt.as_millis(),
                            elapsed_ms_total = total_dt.as_millis(),
                            error = %e,
                            "fetch exhausted retries"
                        );
                        return Err(FetchError::RetriesExhausted {
                            url: url.to_string(),
                            attempts: attempt.saturating_add(1),
                            source: Box::new(e),
                        });
                    }

                    warn!(
                        attempt = attempt.saturating_add(1),
                        max = policy.max_retries.saturating_add(1),
                        elapsed_ms_attempt = attempt_dt.as_millis(),
                        delay = ?policy.retry_delay,
                        error = %e,
                        "fetch attempt failed; retrying"
                    );
                    sleep(policy.retry_delay).await;
                    attempt += 1;
                }
            }
        }
    }

    pub async fn get(&mut self, url: &str, policy: &FetchPolicy) -> Result<FetchResult, FetchError> {
        self.fetch(Method::GET, url, policy, &FetchOptions::default())
            .await
    }

    pub async fn post(
        &mut self,
        url: &str,
        policy: &FetchPolicy,
        options: &FetchOptions,
    ) -> Result<FetchResult, FetchError> {
        self.fetch(Method::POST, url, policy, options).await
    }

    /// GET `url` and return the body as text.
    pub async fn get_text(&mut self, url: &str, policy: &FetchPolicy) -> Result<String, FetchError> {
        let result = self.get(url, policy).await?;
        info!(%url, status = result.status, bytes = result.body.len(), "Downloaded page");
        Ok(result.text())
    }
}

fn check_status(url: &str, result: FetchResult) -> Result<FetchResult, FetchError> {
    if result.is_success() {
        Ok(result)
    } else {
        Err(FetchError::HttpStatus {
            url: url.to_string(),
            status: result.status,
        })
    }
}



#[cfg(test)]
mod http_tests {
    //! [`ReqwestTransport`] against a local mock server.

    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    const AGENT: &str = "awful-test-agent/1.0";

    fn transport() -> ReqwestTransport {
        ReqwestTransport::from_builder(client_builder().no_proxy()).unwrap()
    }

    fn fetcher() -> Fetcher<ReqwestTransport> {
        Fetcher::new(transport(), vec![AGENT.to_string()], false).unwrap()
    }

    fn policy(max_retries: u32) -> FetchPolicy {
        FetchPolicy {
            timeout: Duration::from_secs(5),
            max_retries,
            retry_delay: Duration::ZERO,
        }
    }

    #[tokio::test]
    async fn test_get_sends_user_agent_and_returns_response() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/page").header("user-agent", AGENT);
                then.status(200)
                    .header("content-type", "text/html; charset=utf-8")
                    .body("<html><title>ok</title></html>");
            })
            .await;

        let mut fetcher = fetcher();
        let result = fetcher.get(&server.url("/page"), &policy(0)).await.unwrap();

        mock.assert_async().await;
        assert_eq!(result.status, 200);
        assert_eq!(result.text(), "<html><title>ok</title></html>");
        assert_eq!(
            result.headers.get("content-type").unwrap(),
            "text/html; charset=utf-8"
        );
    }

    #[tokio::test]
    async fn test_headers_and_query_are_passed_through() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/api")
                    .header("x-api-key", "secret")
                    .query_param("q", "rust")
                    .query_param("page", "2");
                then.status(200).body("found");
            })
            .await;

        let options = FetchOptions {
            headers: vec![("x-api-key".to_string(), "secret".to_string())],
            query: vec![
                ("q".to_string(), "rust".to_string()),
                ("page".to_string(), "2".to_string()),
            ],
            body: None,
        };
        let mut fetcher = fetcher();
        let result = fetcher
            .fetch(Method::GET, &server.url("/api"), &policy(0), &options)
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(result.text(), "found");
    }

    #[tokio::test]
    async fn test_post_bodies_are_encoded() {
        let server = MockServer::start_async().await;
        let json_mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/json")
                    .header("content-type", "application/json")
                    .json_body(json!({"title": "Le Monde", "count": 2}));
                then.status(201);
            })
            .await;
        let form_mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/form")
                    .header("content-type", "application/x-www-form-urlencoded")
                    .body("name=lemonde&lang=fr");
                then.status(200);
            })
            .await;
        let text_mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/text").body("plain payload");
                then.status(200);
            })
            .await;

        let mut fetcher = fetcher();
        let json_options = FetchOptions {
            body: Some(RequestBody::Json(json!({"title": "Le Monde", "count": 2}))),
            ..FetchOptions::default()
        };
        let form_options = FetchOptions {
            body: Some(RequestBody::Form(vec![
                ("name".to_string(), "lemonde".to_string()),
                ("lang".to_string(), "fr".to_string()),
            ])),
            ..FetchOptions::default()
        };
        let text_options = FetchOptions {
            body: Some(RequestBody::Text("plain payload".to_string())),
            ..FetchOptions::default()
        };

        let created = fetcher
            .post(&server.url("/json"), &policy(0), &json_options)
            .await
            .unwrap();
        fetcher
            .post(&server.url("/form"), &policy(0), &form_options)
            .await
            .unwrap();
        fetcher
            .post(&server.url("/text"), &policy(0), &text_options)
            .await
            .unwrap();

        assert_eq!(created.status, 201);
        json_mock.assert_async().await;
        form_mock.assert_async().await;
        text_mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_client_error_is_reported_with_status() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/missing");
                then.status(404).body("not here");
            })
            .await;

        let mut fetcher = fetcher();
        let err = fetcher
            .get(&server.url("/missing"), &policy(0))
            .await
            .unwrap_err();

        mock.assert_async().await;
        assert_eq!(err.status(), Some(404));
    }

    #[tokio::test]
    async fn test_server_error_uses_every_attempt() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/broken");
                then.status(500);
            })
            .await;

        let mut fetcher = fetcher();
        let err = fetcher
            .get(&server.url("/broken"), &policy(2))
            .await
            .unwrap_err();

        mock.assert_hits_async(3).await;
        assert!(matches!(err, FetchError::RetriesExhausted { attempts: 3, .. }));
        assert_eq!(err.status(), Some(500));
    }

    #[tokio::test]
    async fn test_cookies_persist_across_requests() {
        let server = MockServer::start_async().await;
        let login = server
            .mock_async(|when, then| {
                when.method(GET).path("/login");
                then.status(200).header("set-cookie", "session=abc123; Path=/");
            })
            .await;
        let account = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/account")
                    .header("cookie", "session=abc123");
                then.status(200).body("welcome back");
            })
            .await;

        let mut fetcher = fetcher();
        fetcher.get(&server.url("/login"), &policy(0)).await.unwrap();
        let result = fetcher.get(&server.url("/account"), &policy(0)).await.unwrap();

        login.assert_async().await;
        account.assert_async().await;
        assert_eq!(result.text(), "welcome back");
    }

    #[tokio::test]
    async fn test_unavailable_then_ok_is_retried() {
        let server = MockServer::start_async().await;
        // Mocks match in creation order: the retry carries the cookie set by the 503.
        let recovered = server
            .mock_async(|when, then| {
                when.method(GET).path("/flaky").header("cookie", "attempt=1");
                then.status(200).body("recovered");
            })
            .await;
        let unavailable = server
            .mock_async(|when, then| {
                when.method(GET).path("/flaky");
                then.status(503).header("set-cookie", "attempt=1; Path=/");
            })
            .await;

        let mut fetcher = fetcher();
        let result = fetcher.get(&server.url("/flaky"), &policy(3)).await.unwrap();

        assert_eq!(result.status, 200);
        assert_eq!(result.text(), "recovered");
        unavailable.assert_async().await;
        recovered.assert_async().await;
    }

    #[tokio::test]
    async fn test_connection_failure_is_a_transport_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/gone", listener.local_addr().unwrap());
        drop(listener);

        let mut fetcher = fetcher();
        let err = fetcher.get(&url, &policy(1)).await.unwrap_err();

        match err {
            FetchError::RetriesExhausted { attempts, source, .. } => {
                assert_eq!(attempts, 2);
                assert!(matches!(*source, FetchError::Transport { .. }));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
