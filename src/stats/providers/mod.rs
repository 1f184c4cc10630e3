//! Concrete providers for the platforms profile-rollup knows about.
//!
//! Every network provider goes through a shared [`RetryingTransport`] and accepts an
//! optional base URL so it can be pointed at a mock server.

mod atcoder;
mod codechef;
mod codeforces;
mod github;
mod hackerrank;
mod leetcode;

pub use atcoder::AtCoderProvider;
pub use codechef::CodeChefProvider;
pub use codeforces::CodeforcesProvider;
pub use github::GitHubProvider;
pub use hackerrank::HackerRankProvider;
pub use leetcode::LeetCodeProvider;

use super::resilient_http::{RetryingTransport, TransportError};
use super::{Payload, ProviderRegistry, ProviderResult};
use url::Url;

/// Settings shared by the built-in providers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderOptions {
    /// Token sent to the GitHub API, raising its rate limit.
    pub github_token: Option<String>,

    /// Length of the activity series providers produce, in days.
    pub activity_window_days: u32,
}

/// A registry holding every built-in provider, talking to the real services.
#[must_use]
pub fn standard_registry(transport: &RetryingTransport, options: &ProviderOptions) -> ProviderRegistry {
    let window = options.activity_window_days;
    ProviderRegistry::new()
        .with(CodeforcesProvider::new(transport.clone(), None, window))
        .with(LeetCodeProvider::new(transport.clone(), None, window))
        .with(GitHubProvider::new(transport.clone(), options.github_token.as_deref(), None))
        .with(AtCoderProvider::new(transport.clone(), None, window))
        .with(CodeChefProvider::new(transport.clone(), None, window))
        .with(HackerRankProvider)
}

/// Convert the outcome of a provider's network work into a [`ProviderResult`].
pub(crate) fn into_result(provider: &str, handle: &str, outcome: Result<Payload, TransportError>) -> ProviderResult {
    match outcome {
        Ok(payload) => ProviderResult::Ok(payload),
        Err(TransportError::NotFound) => ProviderResult::failed(format!("handle '{handle}' not found on {provider}")),
        Err(e @ TransportError::RateLimited { .. }) => ProviderResult::rate_limited(e.to_string()),
        Err(e) => ProviderResult::failed(e.to_string()),
    }
}

/// Join `path` onto `base` and append query parameters.
pub(crate) fn endpoint(base: &str, path: &str, params: &[(&str, &str)]) -> Result<String, TransportError> {
    let text = format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'));
    let url = if params.is_empty() {
        Url::parse(&text)
    } else {
        Url::parse_with_params(&text, params)
    };

    url.map(String::from)
        .map_err(|e| TransportError::malformed(format!("invalid endpoint '{text}': {e}")))
}

/// Percent-encode `handle` for use as one URL path segment.
pub(crate) fn path_segment(handle: &str) -> String {
    url::form_urlencoded::byte_serialize(handle.as_bytes()).collect::<String>().replace('+', "%20")
}
