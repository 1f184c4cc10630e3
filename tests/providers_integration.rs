//! Integration tests for the built-in providers against mock upstream services

use chrono::{Days, NaiveDate, NaiveTime};
use core::time::Duration;
use profile_rollup::stats::providers::{AtCoderProvider, CodeChefProvider, CodeforcesProvider, GitHubProvider, LeetCodeProvider};
use profile_rollup::stats::{Provider, ProviderResult, RetryPolicy, RetryingTransport};
use serde_json::{Value, json};
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const WINDOW_DAYS: u32 = 30;

fn transport() -> RetryingTransport {
    RetryingTransport::new(
        "profile-rollup-tests",
        RetryPolicy {
            max_attempts: 2,
            base_delay: Duration::from_millis(5),
            attempt_timeout: Duration::from_secs(5),
        },
    )
    .unwrap()
}

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 6, 15).unwrap()
}

/// Unix timestamp of midnight UTC, `days_ago` days before [`today`].
fn midnight(days_ago: u64) -> i64 {
    let date = today().checked_sub_days(Days::new(days_ago)).unwrap();
    date.and_time(NaiveTime::MIN).and_utc().timestamp()
}

fn payload(result: &ProviderResult) -> &Value {
    result.payload().unwrap_or_else(|| panic!("expected Ok, got {result:?}"))
}

fn activity_total(payload: &Value) -> u64 {
    payload["activity"]["days"]
        .as_object()
        .map_or(0, |days| days.values().filter_map(Value::as_u64).sum())
}

async fn mount_json(server: &MockServer, route: &str, status: u16, body: Value) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(status).set_body_json(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn codeforces_combines_info_rating_and_submissions() {
    let server = MockServer::start().await;
    let recent = midnight(1) + 3600;

    Mock::given(method("GET"))
        .and(path("/user.info"))
        .and(query_param("handles", "tourist"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "OK",
            "result": [{
                "handle": "tourist",
                "rating": 3800,
                "maxRating": 4000,
                "rank": "legendary grandmaster",
                "maxRank": "legendary grandmaster",
                "friendOfCount": 70000
            }]
        })))
        .mount(&server)
        .await;

    mount_json(
        &server,
        "/user.rating",
        200,
        json!({"status": "OK", "result": [{"contestId": 1}, {"contestId": 2}, {"contestId": 2}]}),
    )
    .await;

    mount_json(
        &server,
        "/user.status",
        200,
        json!({"status": "OK", "result": [
            {"creationTimeSeconds": recent, "verdict": "OK", "problem": {"contestId": 1, "index": "A"}},
            {"creationTimeSeconds": recent, "verdict": "OK", "problem": {"contestId": 1, "index": "A"}},
            {"creationTimeSeconds": recent, "verdict": "WRONG_ANSWER", "problem": {"contestId": 1, "index": "B"}},
            {"creationTimeSeconds": recent, "verdict": "OK", "problem": {"contestId": 2, "index": "C"}},
            {"creationTimeSeconds": 1_000_000, "verdict": "OK", "problem": {"contestId": 3, "index": "D"}}
        ]}),
    )
    .await;

    let provider = CodeforcesProvider::new(transport(), Some(&server.uri()), WINDOW_DAYS);
    let result = provider.fetch("tourist", today()).await;
    let payload = payload(&result);

    assert_eq!(payload["handle"], "tourist");
    assert_eq!(payload["rating"], 3800);
    assert_eq!(payload["friends"], 70000);
    assert_eq!(payload["solved"], 3);
    assert_eq!(payload["contests"], 2);
    assert_eq!(payload["activity"]["estimated"], false);
    assert_eq!(activity_total(payload), 4);
}

#[tokio::test]
async fn codeforces_unknown_handle_fails() {
    let server = MockServer::start().await;
    let body = json!({"status": "FAILED", "comment": "handles: User with handle ghost not found"});
    for route in ["/user.info", "/user.rating", "/user.status"] {
        mount_json(&server, route, 400, body.clone()).await;
    }

    let provider = CodeforcesProvider::new(transport(), Some(&server.uri()), WINDOW_DAYS);
    assert_eq!(
        provider.fetch("ghost", today()).await,
        ProviderResult::failed("handle 'ghost' not found on codeforces")
    );
}

#[tokio::test]
async fn leetcode_reads_graphql_profile() {
    let server = MockServer::start().await;
    let calendar = format!(r#"{{"{}": 3, "{}": 2}}"#, midnight(0), midnight(2));

    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(body_partial_json(json!({"variables": {"username": "alice"}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "matchedUser": {
                    "username": "alice",
                    "profile": {"ranking": 1234},
                    "submitStatsGlobal": {"acSubmissionNum": [
                        {"difficulty": "All", "count": 60},
                        {"difficulty": "Easy", "count": 30},
                        {"difficulty": "Medium", "count": 25},
                        {"difficulty": "Hard", "count": 5}
                    ]},
                    "submissionCalendar": calendar
                },
                "userContestRanking": {"attendedContestsCount": 8, "rating": 1750.5}
            }
        })))
        .mount(&server)
        .await;

    let provider = LeetCodeProvider::new(transport(), Some(&server.uri()), WINDOW_DAYS);
    let result = provider.fetch("alice", today()).await;
    let payload = payload(&result);

    assert_eq!(payload["solved"], 60);
    assert_eq!(payload["medium"], 25);
    assert_eq!(payload["ranking"], 1234);
    assert_eq!(payload["contests"], 8);
    assert_eq!(activity_total(payload), 5);
}

#[tokio::test]
async fn leetcode_activity_window_ends_at_requested_day() {
    let server = MockServer::start().await;
    let calendar = format!(r#"{{"{}": 3, "{}": 2}}"#, midnight(0), midnight(2));

    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"matchedUser": {"username": "alice", "submissionCalendar": calendar}}
        })))
        .mount(&server)
        .await;

    let provider = LeetCodeProvider::new(transport(), Some(&server.uri()), WINDOW_DAYS);

    let result = provider.fetch("alice", today()).await;
    assert_eq!(activity_total(payload(&result)), 5);

    let later = today().checked_add_days(Days::new(u64::from(WINDOW_DAYS) + 10)).unwrap();
    let result = provider.fetch("alice", later).await;
    assert_eq!(activity_total(payload(&result)), 0);
}

#[tokio::test]
async fn leetcode_missing_user_fails() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"matchedUser": null, "userContestRanking": null}})))
        .mount(&server)
        .await;

    let provider = LeetCodeProvider::new(transport(), Some(&server.uri()), WINDOW_DAYS);
    assert_eq!(
        provider.fetch("nobody", today()).await,
        ProviderResult::failed("handle 'nobody' not found on leetcode")
    );
}

#[tokio::test]
async fn leetcode_rate_limit_is_reported_without_retry() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "60"))
        .expect(1)
        .mount(&server)
        .await;

    let provider = LeetCodeProvider::new(transport(), Some(&server.uri()), WINDOW_DAYS);
    let result = provider.fetch("alice", today()).await;
    assert_eq!(result, ProviderResult::rate_limited("rate limited, retry after 60s"));
}

#[tokio::test]
async fn github_sends_token_and_reads_counters() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/users/octocat"))
        .and(header("authorization", "Bearer secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "login": "octocat",
            "name": "The Octocat",
            "followers": 9000,
            "following": 9,
            "public_repos": 8
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = GitHubProvider::new(transport(), Some("secret"), Some(&server.uri()));
    let result = provider.fetch("octocat", today()).await;
    let payload = payload(&result);

    assert_eq!(payload["followers"], 9000);
    assert_eq!(payload["public_repos"], 8);
    assert_eq!(provider.metric_fields().followers, Some("/followers"));
    assert_eq!(provider.metric_fields().solved, None);
}

#[tokio::test]
async fn github_exhausted_quota_is_rate_limited() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/users/octocat"))
        .respond_with(ResponseTemplate::new(403).insert_header("x-ratelimit-remaining", "0"))
        .mount(&server)
        .await;

    let provider = GitHubProvider::new(transport(), None, Some(&server.uri()));
    assert!(matches!(provider.fetch("octocat", today()).await, ProviderResult::RateLimited(_)));
}

#[tokio::test]
async fn atcoder_merges_history_and_accepted_count() {
    let server = MockServer::start().await;

    mount_json(
        &server,
        "/users/chokudai/history/json",
        200,
        json!([
            {"IsRated": true, "NewRating": 2000, "ContestName": "ABC 100"},
            {"IsRated": true, "NewRating": 2600, "ContestName": "ARC 50"},
            {"IsRated": true, "NewRating": 2400, "ContestName": "AGC 10"},
            {"IsRated": false, "NewRating": 0, "ContestName": "Unrated Special"}
        ]),
    )
    .await;

    Mock::given(method("GET"))
        .and(path("/atcoder-api/v3/user/ac_rank"))
        .and(query_param("user", "chokudai"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"count": 120, "rank": 5})))
        .mount(&server)
        .await;

    let provider = AtCoderProvider::new(transport(), Some(&server.uri()), WINDOW_DAYS);
    let result = provider.fetch("chokudai", today()).await;
    let payload = payload(&result);

    assert_eq!(payload["solved"], 120);
    assert_eq!(payload["solved_rank"], 5);
    assert_eq!(payload["contests"], 4);
    assert_eq!(payload["rating"], 2400);
    assert_eq!(payload["max_rating"], 2600);
    assert_eq!(payload["last_contest"], "Unrated Special");
    assert_eq!(payload["activity"]["estimated"], true);
}

#[tokio::test]
async fn atcoder_without_accepted_submissions_has_zero_solved() {
    let server = MockServer::start().await;
    mount_json(&server, "/users/newbie/history/json", 200, json!([])).await;
    mount_json(&server, "/atcoder-api/v3/user/ac_rank", 404, json!({})).await;

    let provider = AtCoderProvider::new(transport(), Some(&server.uri()), WINDOW_DAYS);
    let result = provider.fetch("newbie", today()).await;
    let payload = payload(&result);

    assert_eq!(payload["solved"], 0);
    assert_eq!(payload["contests"], 0);
    assert_eq!(payload["rating"], Value::Null);
}

#[tokio::test]
async fn codechef_scrapes_profile_page() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/users/gennady"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<html>
                <div class="rating-number">3100</div>
                <h3>Total Problems Solved: 250</h3>
                <div>No. of Contests Participated: <b>40</b></div>
            </html>"#,
        ))
        .mount(&server)
        .await;

    let provider = CodeChefProvider::new(transport(), Some(&server.uri()), WINDOW_DAYS);
    let result = provider.fetch("gennady", today()).await;
    let payload = payload(&result);

    assert_eq!(payload["solved"], 250);
    assert_eq!(payload["rating"], 3100);
    assert_eq!(payload["contests"], 40);
    assert_eq!(payload["activity"]["estimated"], true);
}

#[tokio::test]
async fn codechef_page_without_profile_fails() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/users/ghost"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html><title>CodeChef</title></html>"))
        .mount(&server)
        .await;

    let provider = CodeChefProvider::new(transport(), Some(&server.uri()), WINDOW_DAYS);
    assert_eq!(
        provider.fetch("ghost", today()).await,
        ProviderResult::failed("handle 'ghost' not found on codechef")
    );
}
