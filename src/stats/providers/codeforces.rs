use super::{endpoint, into_result};
use crate::stats::activity::ActivitySeries;
use crate::stats::resilient_http::{RetryingTransport, TransportError};
use crate::stats::{Payload, Provider, ProviderResult};
use async_trait::async_trait;
use chrono::{Days, NaiveDate};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::collections::HashSet;

const LOG_TARGET: &str = "codeforces";

pub const CODEFORCES_BASE_URL: &str = "https://codeforces.com/api";

/// Every Codeforces API response is wrapped in this envelope.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    status: String,
    comment: Option<String>,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserInfo {
    handle: String,
    rating: Option<i64>,
    max_rating: Option<i64>,
    rank: Option<String>,
    max_rank: Option<String>,
    #[serde(default)]
    friend_of_count: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RatingChange {
    contest_id: u64,
}

#[derive(Debug, Deserialize)]
struct Problem {
    #[serde(rename = "contestId")]
    contest_id: Option<u64>,
    index: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Submission {
    creation_time_seconds: i64,
    verdict: Option<String>,
    problem: Problem,
}

/// Codeforces statistics from the public API: user info, rating history, and submissions.
///
/// Payload: `handle`, `rating`, `max_rating`, `rank`, `max_rank`, `friends`, `solved`,
/// `contests`, and a measured `activity` series built from submission times.
#[derive(Debug, Clone)]
pub struct CodeforcesProvider {
    transport: RetryingTransport,
    base_url: String,
    window_days: u32,
}

impl CodeforcesProvider {
    #[must_use]
    pub fn new(transport: RetryingTransport, base_url: Option<&str>, window_days: u32) -> Self {
        Self {
            transport,
            base_url: base_url.unwrap_or(CODEFORCES_BASE_URL).to_string(),
            window_days,
        }
    }

    async fn call<T: DeserializeOwned + Send + 'static>(&self, method: &str, params: &[(&str, &str)]) -> Result<T, TransportError> {
        let url = endpoint(&self.base_url, method, params)?;
        let envelope: Envelope<T> = self.transport.get_json(&url).await.map_err(|e| match e {
            // Unknown handles come back as 400 with a "not found" comment
            TransportError::ClientError { ref body, .. } if body.contains("not found") => TransportError::NotFound,
            other => other,
        })?;

        match (envelope.status.as_str(), envelope.result) {
            ("OK", Some(result)) => Ok(result),
            _ => {
                let comment = envelope.comment.unwrap_or_default();
                if comment.contains("not found") {
                    Err(TransportError::NotFound)
                } else {
                    Err(TransportError::malformed(format!("{method} returned status {}: {comment}", envelope.status)))
                }
            }
        }
    }

    async fn fetch_core(&self, handle: &str, today: NaiveDate) -> Result<Payload, TransportError> {
        log::info!(target: LOG_TARGET, "Querying '{}' for Codeforces user '{handle}'", self.base_url);

        let info_params = [("handles", handle)];
        let handle_params = [("handle", handle)];
        let (info, rating, status) = tokio::join!(
            self.call::<Vec<UserInfo>>("user.info", &info_params),
            self.call::<Vec<RatingChange>>("user.rating", &handle_params),
            self.call::<Vec<Submission>>("user.status", &handle_params),
        );

        let info = info?.into_iter().next().ok_or(TransportError::NotFound)?;
        let rating = rating?;
        let submissions = status?;

        let solved: HashSet<(Option<u64>, &str)> = submissions
            .iter()
            .filter(|s| s.verdict.as_deref() == Some("OK"))
            .map(|s| (s.problem.contest_id, s.problem.index.as_str()))
            .collect();

        let contests: HashSet<u64> = rating.iter().map(|r| r.contest_id).collect();

        let mut activity = ActivitySeries::from_timestamps(submissions.iter().map(|s| (s.creation_time_seconds, 1)));
        if let Some(start) = today.checked_sub_days(Days::new(u64::from(self.window_days))) {
            activity.days.retain(|day, _| *day > start);
        }

        Ok(json!({
            "handle": info.handle,
            "rating": info.rating,
            "max_rating": info.max_rating,
            "rank": info.rank,
            "max_rank": info.max_rank,
            "friends": info.friend_of_count,
            "solved": solved.len(),
            "contests": contests.len(),
            "activity": activity,
        }))
    }
}

#[async_trait]
impl Provider for CodeforcesProvider {
    fn name(&self) -> &'static str {
        "codeforces"
    }

    async fn fetch(&self, handle: &str, today: NaiveDate) -> ProviderResult {
        into_result(self.name(), handle, self.fetch_core(handle, today).await)
    }
}
