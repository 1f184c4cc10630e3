use super::ProviderResult;
use async_trait::async_trait;
use chrono::NaiveDate;
use core::fmt::Debug;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Where a provider's payload keeps the numbers that are summed across providers.
///
/// Each field is a JSON pointer (RFC 6901) into the payload, or `None` when the
/// platform has no such metric.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricFields {
    pub solved: Option<&'static str>,
    pub contests: Option<&'static str>,
    pub followers: Option<&'static str>,
    pub activity: Option<&'static str>,
}

impl MetricFields {
    /// The layout shared by every built-in provider.
    pub const STANDARD: Self = Self {
        solved: Some("/solved"),
        contests: Some("/contests"),
        followers: None,
        activity: Some("/activity"),
    };
}

/// One upstream data source.
///
/// `fetch` never fails in the `Result` sense: a missing handle, a rate limit, or an
/// unreachable upstream all come back as [`ProviderResult`] variants.
#[async_trait]
pub trait Provider: Send + Sync + Debug {
    /// Name used in requests, cache keys and reports.
    fn name(&self) -> &'static str;

    fn metric_fields(&self) -> MetricFields {
        MetricFields::STANDARD
    }

    /// Why this provider can never produce data, if that is the case.
    ///
    /// Unavailable providers are skipped without touching the cache or the network.
    fn unavailable_reason(&self) -> Option<&str> {
        None
    }

    /// Fetch the profile of `handle`. Activity is reported for the window ending at `today`.
    async fn fetch(&self, handle: &str, today: NaiveDate) -> ProviderResult;
}

/// The set of providers a batch can address, keyed by name.
#[derive(Debug, Clone, Default)]
pub struct ProviderRegistry {
    providers: BTreeMap<&'static str, Arc<dyn Provider>>,
}

impl ProviderRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a provider, replacing any provider registered under the same name.
    pub fn register(&mut self, provider: Arc<dyn Provider>) {
        let _ = self.providers.insert(provider.name(), provider);
    }

    #[must_use]
    pub fn with(mut self, provider: impl Provider + 'static) -> Self {
        self.register(Arc::new(provider));
        self
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Provider>> {
        self.providers.get(name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.providers.contains_key(name)
    }

    /// Registered names in alphabetical order.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.providers.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Provider>> {
        self.providers.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// The metric layout of every registered provider.
    #[must_use]
    pub fn metric_rules(&self) -> BTreeMap<String, MetricFields> {
        self.providers
            .iter()
            .map(|(name, provider)| ((*name).to_string(), provider.metric_fields()))
            .collect()
    }

    /// The registered name closest to `name`, if any is reasonably close.
    #[must_use]
    pub fn suggest(&self, name: &str) -> Option<&'static str> {
        let name = name.to_lowercase();
        self.providers
            .keys()
            .map(|candidate| (*candidate, strsim::jaro_winkler(&name, candidate)))
            .filter(|(_, score)| *score >= 0.8)
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(candidate, _)| candidate)
    }
}
