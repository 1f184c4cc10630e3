use super::{endpoint, into_result, path_segment};
use crate::stats::activity::ActivitySeries;
use crate::stats::resilient_http::{RetryingTransport, TransportError};
use crate::stats::{Payload, Provider, ProviderResult};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;

const LOG_TARGET: &str = "   atcoder";

pub const ATCODER_BASE_URL: &str = "https://atcoder.jp";
pub const KENKOOOO_BASE_URL: &str = "https://kenkoooo.com";

#[derive(Debug, Deserialize)]
struct AcRank {
    count: u64,
    rank: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ContestResult {
    is_rated: bool,
    new_rating: i64,
    contest_name: Option<String>,
}

/// AtCoder statistics: accepted count from the kenkoooo problems API and contest history
/// from atcoder.jp.
///
/// Payload: `handle`, `solved`, `solved_rank`, `contests`, `rating`, `max_rating`,
/// `last_contest`, and an estimated `activity` series spread from the solved count.
#[derive(Debug, Clone)]
pub struct AtCoderProvider {
    transport: RetryingTransport,
    atcoder_base_url: String,
    kenkoooo_base_url: String,
    window_days: u32,
}

impl AtCoderProvider {
    /// `base_url` replaces both upstream hosts, which is only useful against a mock server.
    #[must_use]
    pub fn new(transport: RetryingTransport, base_url: Option<&str>, window_days: u32) -> Self {
        Self {
            transport,
            atcoder_base_url: base_url.unwrap_or(ATCODER_BASE_URL).to_string(),
            kenkoooo_base_url: base_url.unwrap_or(KENKOOOO_BASE_URL).to_string(),
            window_days,
        }
    }

    async fn fetch_core(&self, handle: &str, today: NaiveDate) -> Result<Payload, TransportError> {
        log::info!(target: LOG_TARGET, "Querying '{}' for AtCoder user '{handle}'", self.atcoder_base_url);

        let history_url = endpoint(&self.atcoder_base_url, &format!("users/{}/history/json", path_segment(handle)), &[])?;
        let rank_url = endpoint(&self.kenkoooo_base_url, "atcoder-api/v3/user/ac_rank", &[("user", handle)])?;

        let (history, rank) = tokio::join!(
            self.transport.get_json::<Vec<ContestResult>>(&history_url),
            self.transport.get_json::<AcRank>(&rank_url),
        );

        let history = history?;
        let (solved, solved_rank) = match rank {
            Ok(rank) => (rank.count, rank.rank),
            // kenkoooo has no entry for users without accepted submissions
            Err(TransportError::NotFound) => (0, None),
            Err(e) => return Err(e),
        };

        let rated: Vec<&ContestResult> = history.iter().filter(|c| c.is_rated).collect();
        let rating = rated.last().map(|c| c.new_rating);
        let max_rating = rated.iter().map(|c| c.new_rating).max();
        let last_contest = history.last().and_then(|c| c.contest_name.clone());

        let activity = ActivitySeries::estimate(&format!("atcoder:{}", handle.to_lowercase()), solved, today, self.window_days);

        Ok(json!({
            "handle": handle,
            "solved": solved,
            "solved_rank": solved_rank,
            "contests": history.len(),
            "rating": rating,
            "max_rating": max_rating,
            "last_contest": last_contest,
            "activity": activity,
        }))
    }
}

#[async_trait]
impl Provider for AtCoderProvider {
    fn name(&self) -> &'static str {
        "atcoder"
    }

    async fn fetch(&self, handle: &str, today: NaiveDate) -> ProviderResult {
        into_result(self.name(), handle, self.fetch_core(handle, today).await)
    }
}
