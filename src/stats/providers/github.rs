use super::{endpoint, into_result, path_segment};
use crate::stats::resilient_http::{RetryingTransport, TransportError};
use crate::stats::{MetricFields, Payload, Provider, ProviderResult};
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use serde::Deserialize;
use serde_json::json;

const LOG_TARGET: &str = "    github";

pub const GITHUB_API_BASE_URL: &str = "https://api.github.com";

#[derive(Debug, Deserialize)]
struct User {
    login: String,
    name: Option<String>,
    #[serde(default)]
    followers: u64,
    #[serde(default)]
    following: u64,
    #[serde(default)]
    public_repos: u64,
}

/// GitHub profile counters from the REST API.
///
/// Payload: `handle`, `name`, `followers`, `following`, `public_repos`. No activity series.
#[derive(Clone)]
pub struct GitHubProvider {
    transport: RetryingTransport,
    token: Option<String>,
    base_url: String,
}

impl core::fmt::Debug for GitHubProvider {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("GitHubProvider")
            .field("base_url", &self.base_url)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish_non_exhaustive()
    }
}

impl GitHubProvider {
    #[must_use]
    pub fn new(transport: RetryingTransport, token: Option<&str>, base_url: Option<&str>) -> Self {
        Self {
            transport,
            token: token.filter(|t| !t.is_empty()).map(str::to_string),
            base_url: base_url.unwrap_or(GITHUB_API_BASE_URL).to_string(),
        }
    }

    async fn fetch_core(&self, handle: &str) -> Result<Payload, TransportError> {
        log::info!(target: LOG_TARGET, "Querying '{}' for GitHub user '{handle}'", self.base_url);

        let url = endpoint(&self.base_url, &format!("users/{}", path_segment(handle)), &[])?;
        let request = self.transport.client().get(&url).header(ACCEPT, "application/vnd.github+json");
        let request = match &self.token {
            Some(token) => request.header(AUTHORIZATION, format!("Bearer {token}")),
            None => request,
        };
        let user: User = self.transport.send_json(request).await?;

        Ok(json!({
            "handle": user.login,
            "name": user.name,
            "followers": user.followers,
            "following": user.following,
            "public_repos": user.public_repos,
        }))
    }
}

#[async_trait]
impl Provider for GitHubProvider {
    fn name(&self) -> &'static str {
        "github"
    }

    fn metric_fields(&self) -> MetricFields {
        MetricFields {
            followers: Some("/followers"),
            ..MetricFields::default()
        }
    }

    async fn fetch(&self, handle: &str, _today: NaiveDate) -> ProviderResult {
        into_result(self.name(), handle, self.fetch_core(handle).await)
    }
}
