use core::fmt::{Display, Formatter};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// The JSON document a provider produces. Its shape is provider-specific.
pub type Payload = serde_json::Value;

/// Outcome of asking one provider about one handle.
///
/// "Not found" and "rate limited" are ordinary outcomes, never errors, so that
/// batch handling stays uniform across providers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum ProviderResult {
    /// The provider returned data for the handle.
    Ok(Payload),

    /// The provider could not produce data (handle not found, upstream down, bad response).
    Failed(Arc<str>),

    /// The upstream service asked us to slow down.
    RateLimited(Arc<str>),

    /// The platform has no data source we can query.
    Unavailable(Arc<str>),
}

impl ProviderResult {
    pub fn failed(reason: impl Into<Arc<str>>) -> Self {
        Self::Failed(reason.into())
    }

    pub fn rate_limited(reason: impl Into<Arc<str>>) -> Self {
        Self::RateLimited(reason.into())
    }

    pub fn unavailable(reason: impl Into<Arc<str>>) -> Self {
        Self::Unavailable(reason.into())
    }

    /// Returns `true` if the result is `Ok`.
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        matches!(self, Self::Ok(_))
    }

    /// Returns a reference to the payload if `Ok`, otherwise `None`.
    #[must_use]
    pub const fn payload(&self) -> Option<&Payload> {
        match self {
            Self::Ok(payload) => Some(payload),
            _ => None,
        }
    }

    /// The reason attached to a non-`Ok` result.
    #[must_use]
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Ok(_) => None,
            Self::Failed(reason) | Self::RateLimited(reason) | Self::Unavailable(reason) => Some(reason),
        }
    }

    /// Split into the payload or the non-`Ok` result itself.
    ///
    /// # Errors
    ///
    /// Returns `self` unchanged when it is not `Ok`
    pub fn into_payload(self) -> Result<Payload, Self> {
        match self {
            Self::Ok(payload) => Ok(payload),
            other => Err(other),
        }
    }

    /// Short lowercase name of the active variant.
    #[must_use]
    pub const fn status(&self) -> &'static str {
        match self {
            Self::Ok(_) => "ok",
            Self::Failed(_) => "failed",
            Self::RateLimited(_) => "rate_limited",
            Self::Unavailable(_) => "unavailable",
        }
    }
}

impl Display for ProviderResult {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self.reason() {
            Some(reason) => write!(f, "{}: {reason}", self.status()),
            None => f.write_str(self.status()),
        }
    }
}
