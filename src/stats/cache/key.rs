use core::fmt::{Display, Formatter};
use serde::{Deserialize, Serialize};

/// Identifies one cached provider result in every tier.
///
/// The textual form is `"{provider}:{handle}"` with the handle trimmed and lower-cased,
/// so `Alice` and ` alice ` share one entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    #[must_use]
    pub fn new(provider: &str, handle: &str) -> Self {
        Self(format!("{provider}:{}", handle.trim().to_lowercase()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}
