//! Resilient HTTP requests using retry and timeout middleware.
//!
//! Every logical upstream call runs through a [`seatbelt`] stack: a retry layer over a
//! per-attempt timeout layer. Transient failures (timeouts, connection errors, 5xx) are
//! retried with exponential backoff. Permanent failures (404, other 4xx, undecodable
//! bodies) and rate limiting end the call immediately.

use core::fmt::{Display, Formatter};
use core::time::Duration;
use layered::{Execute, Service, Stack};
use ohno::IntoAppError;
use reqwest::header::HeaderMap;
use reqwest::{Request, RequestBuilder, Response, StatusCode};
use seatbelt::retry::{Backoff, Retry};
use seatbelt::timeout::Timeout;
use seatbelt::{RecoveryInfo, ResilienceContext};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tick::Clock;

const LOG_TARGET: &str = " transport";

/// Default timeout for a single attempt.
pub const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default number of attempts, including the first one.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default delay before the first retry.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);

/// Error bodies are kept for diagnostics, but only this many characters of them.
const MAX_ERROR_BODY_CHARS: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of attempts for one logical call. Zero is treated as one.
    pub max_attempts: u32,

    /// Delay before the first retry; every further retry doubles it.
    pub base_delay: Duration,

    /// Upper bound on a single attempt.
    pub attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
            attempt_timeout: DEFAULT_ATTEMPT_TIMEOUT,
        }
    }
}

impl RetryPolicy {
    /// Retries allowed on top of the first attempt.
    #[must_use]
    pub const fn max_retries(&self) -> u32 {
        self.max_attempts.saturating_sub(1)
    }
}

/// Why an upstream call did not produce a usable response.
#[derive(Debug)]
pub enum TransportError {
    /// An attempt ran longer than the per-attempt timeout.
    Timeout(Duration),

    /// The request could not be sent or the response body could not be read.
    Connection(ohno::AppError),

    /// The upstream answered with a 5xx status.
    Server { status: StatusCode, body: String },

    /// The upstream answered 404.
    NotFound,

    /// The upstream answered with a 4xx status other than 404 and 429.
    ClientError { status: StatusCode, body: String },

    /// The upstream answered 429, or signalled an exhausted rate-limit quota.
    RateLimited { retry_after: Option<Duration> },

    /// The response arrived but could not be interpreted.
    Malformed(ohno::AppError),
}

impl TransportError {
    /// Whether another attempt could plausibly succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Connection(_) | Self::Server { .. })
    }

    /// Build a [`TransportError::Malformed`] from any message.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed(ohno::app_err!("{}", message.into()))
    }
}

impl Display for TransportError {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Timeout(after) => write!(f, "request timed out after {}ms", after.as_millis()),
            Self::Connection(e) => write!(f, "connection failed: {e}"),
            Self::Server { status, .. } => write!(f, "upstream error: HTTP {status}"),
            Self::NotFound => f.write_str("not found"),
            Self::ClientError { status, .. } => write!(f, "request rejected: HTTP {status}"),
            Self::RateLimited { retry_after: Some(after) } => write!(f, "rate limited, retry after {}s", after.as_secs()),
            Self::RateLimited { retry_after: None } => f.write_str("rate limited"),
            Self::Malformed(e) => write!(f, "malformed response: {e}"),
        }
    }
}

impl core::error::Error for TransportError {}

/// An HTTP client that applies a [`RetryPolicy`] to every logical call.
#[derive(Debug, Clone)]
pub struct RetryingTransport {
    client: reqwest::Client,
    policy: RetryPolicy,
}

impl RetryingTransport {
    /// Create a transport with its own HTTP client.
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialized
    pub fn new(user_agent: &str, policy: RetryPolicy) -> crate::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .build()
            .into_app_err("unable to create HTTP client")?;

        Ok(Self::with_client(client, policy))
    }

    #[must_use]
    pub const fn with_client(client: reqwest::Client, policy: RetryPolicy) -> Self {
        Self { client, policy }
    }

    /// The client the transport sends with, for building requests passed to
    /// [`RetryingTransport::send_json`].
    #[must_use]
    pub const fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// Run one logical call through the retry and timeout layers.
    ///
    /// `attempt_fn` is called once per attempt with a clone of `input`. Each attempt is
    /// bounded by the policy's attempt timeout and only transient errors are retried.
    ///
    /// # Errors
    ///
    /// Returns the first non-transient error, or the last error once attempts are exhausted
    pub async fn call<In, Out, F, Fut>(&self, name: &'static str, input: In, attempt_fn: F) -> Result<Out, TransportError>
    where
        In: Clone + Send + Sync + 'static,
        Out: Send + 'static,
        Fut: Future<Output = Result<Out, TransportError>> + Send,
        F: Fn(In) -> Fut + Send + Sync + Clone + 'static,
    {
        let clock = Clock::new_tokio();
        let context = ResilienceContext::new(&clock).name(name);
        let attempt_timeout = self.policy.attempt_timeout;

        let service = (
            Retry::layer("retry", &context)
                .clone_input()
                .recovery_with(|result: &Result<Out, TransportError>, _| match result {
                    Err(e) if e.is_transient() => RecoveryInfo::retry(),
                    _ => RecoveryInfo::never(),
                })
                .max_retry_attempts(self.policy.max_retries())
                .base_delay(self.policy.base_delay)
                .backoff(Backoff::Exponential)
                .on_retry(move |_output, args| {
                    log::debug!(
                        target: LOG_TARGET,
                        "retrying {name} (attempt {}, delay {}ms)",
                        args.attempt().index() + 1,
                        args.retry_delay().as_millis(),
                    );
                }),
            Timeout::layer("timeout", &context)
                .timeout_error(move |_| TransportError::Timeout(attempt_timeout))
                .timeout(attempt_timeout),
            Execute::new(move |input: In| {
                let f = attempt_fn.clone();
                async move { f(input).await }
            }),
        )
            .into_service();

        service.execute(input).await
    }

    /// GET `url` and decode the JSON body.
    ///
    /// # Errors
    ///
    /// See [`RetryingTransport::call`]
    pub async fn get_json<T>(&self, url: &str) -> Result<T, TransportError>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let client = self.client.clone();
        self.call("http_get_json", url.to_string(), move |url: String| {
            let request = client.get(url);
            async move { read_json(request).await }
        })
        .await
    }

    /// GET `url` and return the body as text.
    ///
    /// # Errors
    ///
    /// See [`RetryingTransport::call`]
    pub async fn get_text(&self, url: &str) -> Result<String, TransportError> {
        let client = self.client.clone();
        self.call("http_get_text", url.to_string(), move |url: String| {
            let request = client.get(url);
            async move {
                let response = send(request).await?;
                response
                    .text()
                    .await
                    .map_err(|e| TransportError::Connection(ohno::AppError::from(e)))
            }
        })
        .await
    }

    /// Send `request` and decode the JSON response, replaying it on every attempt.
    ///
    /// Use this when the request needs a method, headers or a body the GET helpers do
    /// not set. Build it from [`RetryingTransport::client`].
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Malformed`] if the request cannot be built or replayed,
    /// otherwise see [`RetryingTransport::call`]
    pub async fn send_json<T>(&self, request: RequestBuilder) -> Result<T, TransportError>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let request = request
            .build()
            .map_err(|e| TransportError::malformed(format!("invalid request: {e}")))?;

        let client = self.client.clone();
        self.call("http_send_json", Arc::new(request), move |request: Arc<Request>| {
            let client = client.clone();
            async move {
                let request = request
                    .try_clone()
                    .ok_or_else(|| TransportError::malformed("request body cannot be replayed"))?;
                read_json(RequestBuilder::from_parts(client, request)).await
            }
        })
        .await
    }
}

async fn read_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, TransportError> {
    let response = send(request).await?;
    let bytes = response
        .bytes()
        .await
        .map_err(|e| TransportError::Connection(ohno::AppError::from(e)))?;

    serde_json::from_slice(&bytes).map_err(|e| TransportError::Malformed(ohno::AppError::new(e)))
}

/// Send a request and classify the response status.
async fn send(request: RequestBuilder) -> Result<Response, TransportError> {
    let response = request
        .send()
        .await
        .map_err(|e| TransportError::Connection(ohno::AppError::from(e)))?;

    classify_response(response).await
}

async fn classify_response(response: Response) -> Result<Response, TransportError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    if status == StatusCode::TOO_MANY_REQUESTS || (status == StatusCode::FORBIDDEN && quota_exhausted(response.headers())) {
        return Err(TransportError::RateLimited {
            retry_after: parse_retry_after(response.headers()).map(Duration::from_secs),
        });
    }

    if status == StatusCode::NOT_FOUND {
        return Err(TransportError::NotFound);
    }

    let body: String = response
        .text()
        .await
        .unwrap_or_else(|_| String::from("<unable to read body>"))
        .chars()
        .take(MAX_ERROR_BODY_CHARS)
        .collect();

    if status.is_server_error() {
        Err(TransportError::Server { status, body })
    } else {
        Err(TransportError::ClientError { status, body })
    }
}

/// Parse the `Retry-After` header value as seconds.
fn parse_retry_after(headers: &HeaderMap) -> Option<u64> {
    let s = headers.get(reqwest::header::RETRY_AFTER).and_then(|h| h.to_str().ok())?;
    s.trim().parse::<u64>().ok()
}

/// GitHub-style quota headers report an exhausted budget with a 403.
fn quota_exhausted(headers: &HeaderMap) -> bool {
    headers
        .get("x-ratelimit-remaining")
        .and_then(|h| h.to_str().ok())
        .is_some_and(|remaining| remaining.trim() == "0")
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::sync::atomic::{AtomicU32, Ordering};
    use reqwest::header::HeaderValue;

    fn fast_transport(max_attempts: u32, attempt_timeout: Duration) -> RetryingTransport {
        RetryingTransport::with_client(
            reqwest::Client::new(),
            RetryPolicy {
                max_attempts,
                base_delay: Duration::from_millis(1),
                attempt_timeout,
            },
        )
    }

    fn server_error() -> TransportError {
        TransportError::Server {
            status: StatusCode::BAD_GATEWAY,
            body: String::new(),
        }
    }

    /// Runs `call` with an attempt function that returns `outcome(attempt)`, counting attempts.
    async fn run_counted<T, O>(transport: &RetryingTransport, outcome: O) -> (Result<T, TransportError>, u32)
    where
        T: Send + 'static,
        O: Fn(u32) -> Result<T, TransportError> + Send + Sync + Clone + 'static,
    {
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&attempts);
        let result = transport
            .call("test", (), move |()| {
                let attempt = counter.fetch_add(1, Ordering::SeqCst) + 1;
                let result = outcome(attempt);
                async move { result }
            })
            .await;

        (result, attempts.load(Ordering::SeqCst))
    }

    #[test]
    fn retries_exclude_the_first_attempt() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries(), 2);

        let none = RetryPolicy {
            max_attempts: 0,
            ..RetryPolicy::default()
        };
        assert_eq!(none.max_retries(), 0);
    }

    #[test]
    fn classification_of_errors() {
        assert!(TransportError::Timeout(Duration::from_secs(1)).is_transient());
        assert!(server_error().is_transient());
        assert!(!TransportError::NotFound.is_transient());
        assert!(!TransportError::RateLimited { retry_after: None }.is_transient());
        assert!(!TransportError::malformed("bad json").is_transient());
        assert!(
            !TransportError::ClientError {
                status: StatusCode::BAD_REQUEST,
                body: String::new()
            }
            .is_transient()
        );
    }

    #[tokio::test]
    async fn two_failures_then_success_takes_three_attempts() {
        let transport = fast_transport(3, Duration::from_secs(1));
        let (result, attempts) = run_counted(&transport, |attempt| if attempt < 3 { Err(server_error()) } else { Ok(attempt) }).await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(attempts, 3);
    }

    #[tokio::test]
    async fn transient_failures_exhaust_attempts() {
        let transport = fast_transport(3, Duration::from_secs(1));
        let (result, attempts) = run_counted::<(), _>(&transport, |_| Err(server_error())).await;

        assert!(matches!(result, Err(TransportError::Server { .. })));
        assert_eq!(attempts, 3);
    }

    #[tokio::test]
    async fn permanent_failure_is_not_retried() {
        let transport = fast_transport(3, Duration::from_secs(1));
        let (result, attempts) = run_counted::<(), _>(&transport, |_| Err(TransportError::NotFound)).await;

        assert!(matches!(result, Err(TransportError::NotFound)));
        assert_eq!(attempts, 1);
    }

    #[tokio::test]
    async fn rate_limit_is_not_retried() {
        let transport = fast_transport(3, Duration::from_secs(1));
        let (result, attempts) = run_counted::<(), _>(&transport, |_| {
            Err(TransportError::RateLimited {
                retry_after: Some(Duration::from_secs(5)),
            })
        })
        .await;

        assert!(matches!(result, Err(TransportError::RateLimited { .. })));
        assert_eq!(attempts, 1);
    }

    #[tokio::test]
    async fn slow_attempts_time_out_and_exhaust_retries() {
        let transport = fast_transport(2, Duration::from_millis(20));
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&attempts);

        let result: Result<(), _> = transport
            .call("slow", (), move |()| {
                let _ = counter.fetch_add(1, Ordering::SeqCst);
                async {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    Ok(())
                }
            })
            .await;

        assert!(matches!(result, Err(TransportError::Timeout(after)) if after == Duration::from_millis(20)));
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn zero_attempts_still_tries_once() {
        let transport = fast_transport(0, Duration::from_secs(1));
        let (result, attempts) = run_counted::<(), _>(&transport, |_| Err(server_error())).await;

        assert!(matches!(result, Err(TransportError::Server { .. })));
        assert_eq!(attempts, 1);
    }

    #[test]
    fn retry_after_and_quota_headers() {
        let mut headers = HeaderMap::new();
        assert_eq!(parse_retry_after(&headers), None);
        assert!(!quota_exhausted(&headers));

        let _ = headers.insert(reqwest::header::RETRY_AFTER, HeaderValue::from_static("7"));
        let _ = headers.insert("x-ratelimit-remaining", HeaderValue::from_static("0"));
        assert_eq!(parse_retry_after(&headers), Some(7));
        assert!(quota_exhausted(&headers));
    }

    #[test]
    fn display_messages() {
        assert_eq!(TransportError::NotFound.to_string(), "not found");
        assert_eq!(
            TransportError::RateLimited {
                retry_after: Some(Duration::from_secs(3))
            }
            .to_string(),
            "rate limited, retry after 3s"
        );
        assert_eq!(TransportError::Timeout(Duration::from_millis(1500)).to_string(), "request timed out after 1500ms");
    }
}
