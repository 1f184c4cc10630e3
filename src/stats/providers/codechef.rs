use super::{endpoint, into_result, path_segment};
use crate::stats::activity::ActivitySeries;
use crate::stats::resilient_http::{RetryingTransport, TransportError};
use crate::stats::{Payload, Provider, ProviderResult};
use async_trait::async_trait;
use chrono::NaiveDate;
use regex::Regex;
use serde_json::json;
use std::sync::LazyLock;

const LOG_TARGET: &str = "  codechef";

pub const CODECHEF_BASE_URL: &str = "https://www.codechef.com";

static SOLVED_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Total Problems Solved:\s*(?:<[^>]*>\s*)*(\d+)").expect("invalid regex"));

static RATING_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"class="rating-number"[^>]*>\s*(\d+)"#).expect("invalid regex"));

static CONTESTS_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Contests Participated:\s*(?:<[^>]*>\s*)*(\d+)").expect("invalid regex"));

/// CodeChef statistics scraped from the public profile page.
///
/// Payload: `handle`, `solved`, `rating`, `contests`, and an estimated `activity` series.
#[derive(Debug, Clone)]
pub struct CodeChefProvider {
    transport: RetryingTransport,
    base_url: String,
    window_days: u32,
}

impl CodeChefProvider {
    #[must_use]
    pub fn new(transport: RetryingTransport, base_url: Option<&str>, window_days: u32) -> Self {
        Self {
            transport,
            base_url: base_url.unwrap_or(CODECHEF_BASE_URL).to_string(),
            window_days,
        }
    }

    async fn fetch_core(&self, handle: &str, today: NaiveDate) -> Result<Payload, TransportError> {
        log::info!(target: LOG_TARGET, "Querying '{}' for CodeChef user '{handle}'", self.base_url);

        let url = endpoint(&self.base_url, &format!("users/{}", path_segment(handle)), &[])?;
        let page = self.transport.get_text(&url).await?;
        let stats = parse_profile(&page).ok_or(TransportError::NotFound)?;

        let activity = ActivitySeries::estimate(
            &format!("codechef:{}", handle.to_lowercase()),
            stats.solved,
            today,
            self.window_days,
        );

        Ok(json!({
            "handle": handle,
            "solved": stats.solved,
            "rating": stats.rating,
            "contests": stats.contests,
            "activity": activity,
        }))
    }
}

#[derive(Debug, PartialEq, Eq)]
struct PageStats {
    solved: u64,
    rating: Option<u64>,
    contests: u64,
}

/// Unknown users are redirected to a generic page that lacks the solved counter.
fn parse_profile(page: &str) -> Option<PageStats> {
    let capture = |regex: &Regex| regex.captures(page).and_then(|c| c.get(1)).and_then(|m| m.as_str().parse::<u64>().ok());

    Some(PageStats {
        solved: capture(&SOLVED_REGEX)?,
        rating: capture(&RATING_REGEX),
        contests: capture(&CONTESTS_REGEX).unwrap_or(0),
    })
}

#[async_trait]
impl Provider for CodeChefProvider {
    fn name(&self) -> &'static str {
        "codechef"
    }

    async fn fetch(&self, handle: &str, today: NaiveDate) -> ProviderResult {
        into_result(self.name(), handle, self.fetch_core(handle, today).await)
    }
}
