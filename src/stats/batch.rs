use super::ProviderRegistry;
use crate::Result;
use ohno::{IntoAppError, app_err, bail};
use serde_json::Value;
use std::collections::BTreeSet;

/// The (provider, handle) pairs requested together.
///
/// A request is validated against a [`ProviderRegistry`] when it is built, so every
/// error a caller can cause surfaces here, before any I/O.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchRequest {
    pairs: Vec<(String, String)>,
}

impl BatchRequest {
    /// Parse a request document: a JSON object mapping provider name to handle.
    ///
    /// # Errors
    ///
    /// See [`BatchRequest::from_json`]
    pub fn parse(text: &str, registry: &ProviderRegistry) -> Result<Self> {
        let value: Value = serde_json::from_str(text).into_app_err("request is not valid JSON")?;
        Self::from_json(&value, registry)
    }

    /// Build a request from a JSON object mapping provider name to handle.
    ///
    /// `null` handles are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is not an object, names an unknown provider, carries a
    /// handle that is not a non-empty string, or requests nothing
    pub fn from_json(value: &Value, registry: &ProviderRegistry) -> Result<Self> {
        let Value::Object(map) = value else {
            bail!("request must be a JSON object mapping provider names to handles");
        };

        let mut pairs = Vec::with_capacity(map.len());
        for (provider, handle) in map {
            let handle = match handle {
                Value::Null => continue,
                Value::String(handle) => handle,
                other => bail!("handle for '{provider}' must be a string, found {}", json_kind(other)),
            };
            pairs.push((provider.clone(), handle.clone()));
        }

        Self::from_pairs(pairs, registry)
    }

    /// Build a request from explicit pairs, keeping their order.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown providers, empty handles, a provider named twice, or
    /// an empty list
    pub fn from_pairs(pairs: impl IntoIterator<Item = (String, String)>, registry: &ProviderRegistry) -> Result<Self> {
        let mut seen = BTreeSet::new();
        let mut validated = Vec::new();

        for (provider, handle) in pairs {
            if !registry.contains(&provider) {
                return Err(match registry.suggest(&provider) {
                    Some(suggestion) => app_err!("unknown provider '{provider}', did you mean '{suggestion}'?"),
                    None => app_err!("unknown provider '{provider}'"),
                });
            }

            let handle = handle.trim();
            if handle.is_empty() {
                bail!("handle for '{provider}' must not be empty");
            }

            if !seen.insert(provider.clone()) {
                bail!("provider '{provider}' is requested more than once");
            }

            validated.push((provider, handle.to_string()));
        }

        if validated.is_empty() {
            bail!("request does not name any provider");
        }

        Ok(Self { pairs: validated })
    }

    #[must_use]
    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

const fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
