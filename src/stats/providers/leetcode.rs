use super::{endpoint, into_result};
use crate::stats::activity::ActivitySeries;
use crate::stats::resilient_http::{RetryingTransport, TransportError};
use crate::stats::{Payload, Provider, ProviderResult};
use async_trait::async_trait;
use chrono::{Days, NaiveDate};
use reqwest::header::REFERER;
use serde::Deserialize;
use serde_json::json;
use std::collections::BTreeMap;

const LOG_TARGET: &str = "  leetcode";

pub const LEETCODE_BASE_URL: &str = "https://leetcode.com";

const PROFILE_QUERY: &str = "query userProfile($username: String!) {
  matchedUser(username: $username) {
    username
    profile { ranking }
    submitStatsGlobal { acSubmissionNum { difficulty count } }
    submissionCalendar
  }
  userContestRanking(username: $username) { attendedContestsCount rating }
}";

#[derive(Debug, Deserialize)]
struct Response {
    data: Option<Data>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Data {
    matched_user: Option<MatchedUser>,
    user_contest_ranking: Option<ContestRanking>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MatchedUser {
    username: String,
    profile: Option<Profile>,
    submit_stats_global: Option<SubmitStats>,

    /// A JSON object encoded as a string, mapping Unix day timestamps to submission counts.
    submission_calendar: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Profile {
    ranking: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmitStats {
    ac_submission_num: Vec<DifficultyCount>,
}

#[derive(Debug, Deserialize)]
struct DifficultyCount {
    difficulty: String,
    count: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContestRanking {
    attended_contests_count: Option<u64>,
    rating: Option<f64>,
}

/// LeetCode statistics from the GraphQL profile query.
///
/// Payload: `handle`, `ranking`, `solved`, `easy`, `medium`, `hard`, `contests`,
/// `contest_rating`, and a measured `activity` series from the submission calendar.
#[derive(Debug, Clone)]
pub struct LeetCodeProvider {
    transport: RetryingTransport,
    base_url: String,
    window_days: u32,
}

impl LeetCodeProvider {
    #[must_use]
    pub fn new(transport: RetryingTransport, base_url: Option<&str>, window_days: u32) -> Self {
        Self {
            transport,
            base_url: base_url.unwrap_or(LEETCODE_BASE_URL).to_string(),
            window_days,
        }
    }

    async fn fetch_core(&self, handle: &str, today: NaiveDate) -> Result<Payload, TransportError> {
        log::info!(target: LOG_TARGET, "Querying '{}' for LeetCode user '{handle}'", self.base_url);

        let url = endpoint(&self.base_url, "graphql", &[])?;
        let body = json!({
            "query": PROFILE_QUERY,
            "variables": { "username": handle },
        });

        let request = self.transport.client().post(&url).header(REFERER, &self.base_url).json(&body);
        let response: Response = self.transport.send_json(request).await?;

        let data = response.data.ok_or_else(|| TransportError::malformed("GraphQL response carried no data"))?;
        let user = data.matched_user.ok_or(TransportError::NotFound)?;

        let by_difficulty: BTreeMap<String, u64> = user
            .submit_stats_global
            .map(|stats| stats.ac_submission_num.into_iter().map(|d| (d.difficulty.to_lowercase(), d.count)).collect())
            .unwrap_or_default();
        let difficulty = |name: &str| by_difficulty.get(name).copied().unwrap_or(0);

        let mut activity = parse_calendar(user.submission_calendar.as_deref())?;
        if let Some(start) = today.checked_sub_days(Days::new(u64::from(self.window_days))) {
            activity.days.retain(|day, _| *day > start);
        }

        let (contests, contest_rating) = data
            .user_contest_ranking
            .map_or((0, None), |r| (r.attended_contests_count.unwrap_or(0), r.rating));

        Ok(json!({
            "handle": user.username,
            "ranking": user.profile.and_then(|p| p.ranking),
            "solved": difficulty("all"),
            "easy": difficulty("easy"),
            "medium": difficulty("medium"),
            "hard": difficulty("hard"),
            "contests": contests,
            "contest_rating": contest_rating,
            "activity": activity,
        }))
    }
}

fn parse_calendar(text: Option<&str>) -> Result<ActivitySeries, TransportError> {
    let Some(text) = text.filter(|t| !t.trim().is_empty()) else {
        return Ok(ActivitySeries::default());
    };

    let raw: BTreeMap<String, u32> =
        serde_json::from_str(text).map_err(|e| TransportError::malformed(format!("unreadable submission calendar: {e}")))?;

    Ok(ActivitySeries::from_timestamps(
        raw.into_iter().filter_map(|(ts, count)| ts.parse::<i64>().ok().map(|ts| (ts, count))),
    ))
}

#[async_trait]
impl Provider for LeetCodeProvider {
    fn name(&self) -> &'static str {
        "leetcode"
    }

    async fn fetch(&self, handle: &str, today: NaiveDate) -> ProviderResult {
        into_result(self.name(), handle, self.fetch_core(handle, today).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn calendar_string_is_decoded() {
        let series = parse_calendar(Some(r#"{"1704067200": 3, "1704153600": 1}"#)).unwrap();
        assert_eq!(series.days[&NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()], 3);
        assert_eq!(series.days[&NaiveDate::from_ymd_opt(2024, 1, 2).unwrap()], 1);
        assert!(!series.estimated);
    }

    #[test]
    fn missing_calendar_is_empty() {
        assert_eq!(parse_calendar(None).unwrap(), ActivitySeries::default());
        assert_eq!(parse_calendar(Some("")).unwrap(), ActivitySeries::default());
        let _ = parse_calendar(Some("[1, 2]")).unwrap_err();
    }
}
