//! Integration tests for the retrying transport against a mock HTTP server

use core::time::Duration;
use profile_rollup::stats::{RetryPolicy, RetryingTransport, TransportError};
use serde_json::{Value, json};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn transport(max_attempts: u32, attempt_timeout: Duration) -> RetryingTransport {
    RetryingTransport::new(
        "profile-rollup-tests",
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(5),
            attempt_timeout,
        },
    )
    .unwrap()
}

async fn request_count(server: &MockServer) -> usize {
    server.received_requests().await.unwrap().len()
}

#[tokio::test]
async fn transient_failures_are_retried_until_success() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .mount(&server)
        .await;

    let value: Value = transport(3, Duration::from_secs(5))
        .get_json(&format!("{}/flaky", server.uri()))
        .await
        .unwrap();

    assert_eq!(value, json!({"ok": true}));
    assert_eq!(request_count(&server).await, 3);
}

#[tokio::test]
async fn exhausted_attempts_return_the_last_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/down"))
        .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
        .mount(&server)
        .await;

    let err = transport(2, Duration::from_secs(5))
        .get_json::<Value>(&format!("{}/down", server.uri()))
        .await
        .unwrap_err();

    assert!(matches!(err, TransportError::Server { ref body, .. } if body == "bad gateway"), "{err:?}");
    assert_eq!(request_count(&server).await, 2);
}

#[tokio::test]
async fn not_found_is_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let err = transport(3, Duration::from_secs(5))
        .get_json::<Value>(&format!("{}/missing", server.uri()))
        .await
        .unwrap_err();

    assert!(matches!(err, TransportError::NotFound), "{err:?}");
}

#[tokio::test]
async fn slow_attempts_time_out() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})).set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;

    let err = transport(2, Duration::from_millis(100))
        .get_json::<Value>(&format!("{}/slow", server.uri()))
        .await
        .unwrap_err();

    assert!(matches!(err, TransportError::Timeout(after) if after == Duration::from_millis(100)), "{err:?}");
}

#[tokio::test]
async fn rate_limits_are_reported_with_retry_after() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/limited"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "30"))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/quota"))
        .respond_with(ResponseTemplate::new(403).insert_header("x-ratelimit-remaining", "0"))
        .expect(1)
        .mount(&server)
        .await;

    let transport = transport(3, Duration::from_secs(5));

    let err = transport.get_json::<Value>(&format!("{}/limited", server.uri())).await.unwrap_err();
    assert!(
        matches!(err, TransportError::RateLimited { retry_after: Some(after) } if after == Duration::from_secs(30)),
        "{err:?}"
    );

    let err = transport.get_json::<Value>(&format!("{}/quota", server.uri())).await.unwrap_err();
    assert!(matches!(err, TransportError::RateLimited { retry_after: None }), "{err:?}");
}

#[tokio::test]
async fn malformed_bodies_are_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/garbage"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>definitely not json</html>"))
        .expect(1)
        .mount(&server)
        .await;

    let err = transport(3, Duration::from_secs(5))
        .get_json::<Value>(&format!("{}/garbage", server.uri()))
        .await
        .unwrap_err();

    assert!(matches!(err, TransportError::Malformed(_)), "{err:?}");
}

#[tokio::test]
async fn text_bodies_are_returned_verbatim() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/page"))
        .respond_with(ResponseTemplate::new(200).set_body_string("hello"))
        .mount(&server)
        .await;

    let text = transport(1, Duration::from_secs(5))
        .get_text(&format!("{}/page", server.uri()))
        .await
        .unwrap();
    assert_eq!(text, "hello");
}
