use crate::stats::{Provider, ProviderResult};
use async_trait::async_trait;
use chrono::NaiveDate;

const REASON: &str = "HackerRank offers no public profile data source";

/// HackerRank has no public API or stable profile page to read from.
#[derive(Debug, Clone, Copy, Default)]
pub struct HackerRankProvider;

#[async_trait]
impl Provider for HackerRankProvider {
    fn name(&self) -> &'static str {
        "hackerrank"
    }

    fn unavailable_reason(&self) -> Option<&str> {
        Some(REASON)
    }

    async fn fetch(&self, _handle: &str, _today: NaiveDate) -> ProviderResult {
        ProviderResult::unavailable(REASON)
    }
}
