use crate::Result;
use camino::{Utf8Path, Utf8PathBuf};
use core::time::Duration;
use ohno::{IntoAppError, app_err, bail};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;

/// The default configuration YAML content, embedded from `default_config.yml`
pub const DEFAULT_CONFIG_YAML: &str = include_str!("../../default_config.yml");

/// Prefix of the environment variables that override configuration values.
pub const ENV_PREFIX: &str = "ROLLUP_";

/// File names searched, in order, when no explicit configuration path is given.
const DEFAULT_CONFIG_FILES: [&str; 4] = ["rollup.toml", "rollup.yml", "rollup.yaml", "rollup.json"];

/// Chunk sizes above this are accepted but are likely to trip upstream rate limits.
const MAX_REASONABLE_CHUNK_SIZE: usize = 16;

/// Retry counts above this make a single failing provider dominate batch latency.
const MAX_REASONABLE_RETRY_ATTEMPTS: u32 = 10;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Redis URL of the shared cache tier. When absent, only the in-process tier is used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shared_cache_url: Option<String>,

    /// Upper bound on a single shared-tier round trip, in milliseconds
    pub shared_cache_timeout_ms: u64,

    /// Timeout applied to each individual HTTP attempt, in seconds
    pub request_timeout_secs: u64,

    /// Total number of attempts for one logical upstream call
    pub retry_attempts: u32,

    /// Delay before the first retry, in milliseconds; doubles on every further retry
    pub retry_base_delay_ms: u64,

    /// Number of provider calls in flight at once
    pub chunk_size: usize,

    /// Pause between two consecutive chunks, in milliseconds
    pub chunk_delay_ms: u64,

    /// Shared-tier time-to-live of a provider result, in seconds
    pub cache_ttl_secs: u64,

    /// In-process tier time-to-live, in seconds
    pub memory_ttl_secs: u64,

    /// Maximum number of entries held by the in-process tier
    pub memory_capacity: u64,

    /// How long an expired in-process entry is retained for stale serving, in seconds
    pub stale_grace_secs: u64,

    /// Length of the trailing activity calendar, in days
    pub activity_window_days: u32,

    /// Optional wall-clock budget for a whole batch, in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_deadline_secs: Option<u64>,

    /// User agent sent to every upstream service
    pub user_agent: String,
}

impl Config {
    /// Load configuration from a file or use defaults
    ///
    /// When `config_path` is `None`, the well-known file names are searched in `base_path`.
    /// Returns the configuration together with any validation warnings.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if a value is unusable
    pub fn load(base_path: &Utf8Path, config_path: Option<&Utf8PathBuf>) -> Result<(Self, Vec<String>)> {
        let (final_path, text) = if let Some(path) = config_path {
            let text = fs::read_to_string(path).into_app_err_with(|| format!("reading profile-rollup configuration from {path}"))?;
            (path.clone(), text)
        } else {
            let mut found = None;
            for name in DEFAULT_CONFIG_FILES {
                let path = base_path.join(name);
                match fs::read_to_string(&path) {
                    Ok(text) => {
                        found = Some((path, text));
                        break;
                    }
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                    Err(e) => return Err(e).into_app_err_with(|| format!("reading profile-rollup configuration from {path}")),
                }
            }

            let Some(result) = found else {
                let config = Self::default_config()?;
                let warnings = config.validate()?;
                return Ok((config, warnings));
            };
            result
        };

        let config = Self::parse(&final_path, &text)?;
        let warnings = config.validate()?;
        Ok((config, warnings))
    }

    /// Parse configuration text, picking the format from the file extension.
    ///
    /// Keys missing from the text keep their default values.
    ///
    /// # Errors
    ///
    /// Returns an error if the text does not parse or the extension is not supported
    pub fn parse(path: &Utf8Path, text: &str) -> Result<Self> {
        let extension = path.extension().unwrap_or_default();
        let overrides: serde_json::Value = match extension {
            "toml" => toml::from_str(text).into_app_err_with(|| format!("parsing TOML configuration from {path}"))?,
            "yml" | "yaml" => serde_yaml::from_str(text).into_app_err_with(|| format!("parsing YAML configuration from {path}"))?,
            "json" => serde_json::from_str(text).into_app_err_with(|| format!("parsing JSON configuration from {path}"))?,
            _ => return Err(app_err!("unsupported configuration file extension: {extension}")),
        };

        let mut merged = serde_json::to_value(Self::default_config()?).into_app_err("serializing default configuration")?;
        match (&mut merged, overrides) {
            (serde_json::Value::Object(base), serde_json::Value::Object(overrides)) => {
                for (key, value) in overrides {
                    let _ = base.insert(key, value);
                }
            }
            (_, serde_json::Value::Null) => {}
            _ => bail!("configuration in {path} must be a table of settings"),
        }

        serde_json::from_value(merged).into_app_err_with(|| format!("interpreting configuration from {path}"))
    }

    /// The configuration embedded in the binary.
    ///
    /// # Errors
    ///
    /// Returns an error only if `default_config.yml` is broken, which the build script prevents
    pub fn default_config() -> Result<Self> {
        serde_yaml::from_str(DEFAULT_CONFIG_YAML).into_app_err("parsing embedded default configuration")
    }

    /// Apply `ROLLUP_*` overrides obtained through `lookup`.
    ///
    /// The variable name is the upper-cased field name with the [`ENV_PREFIX`], for example
    /// `ROLLUP_CHUNK_SIZE`. An empty `ROLLUP_SHARED_CACHE_URL` disables the shared tier.
    ///
    /// # Errors
    ///
    /// Returns an error naming the variable when a value does not parse
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        fn parse_var<T: core::str::FromStr>(name: &str, value: &str) -> Result<T>
        where
            T::Err: core::fmt::Display,
        {
            value
                .trim()
                .parse::<T>()
                .map_err(|e| app_err!("invalid value '{value}' for environment variable {name}: {e}"))
        }

        let var = |field: &str| {
            let name = format!("{ENV_PREFIX}{}", field.to_ascii_uppercase());
            lookup(&name).map(|value| (name, value))
        };

        if let Some((_, value)) = var("shared_cache_url") {
            self.shared_cache_url = if value.trim().is_empty() { None } else { Some(value) };
        }
        if let Some((name, value)) = var("shared_cache_timeout_ms") {
            self.shared_cache_timeout_ms = parse_var(&name, &value)?;
        }
        if let Some((name, value)) = var("request_timeout_secs") {
            self.request_timeout_secs = parse_var(&name, &value)?;
        }
        if let Some((name, value)) = var("retry_attempts") {
            self.retry_attempts = parse_var(&name, &value)?;
        }
        if let Some((name, value)) = var("retry_base_delay_ms") {
            self.retry_base_delay_ms = parse_var(&name, &value)?;
        }
        if let Some((name, value)) = var("chunk_size") {
            self.chunk_size = parse_var(&name, &value)?;
        }
        if let Some((name, value)) = var("chunk_delay_ms") {
            self.chunk_delay_ms = parse_var(&name, &value)?;
        }
        if let Some((name, value)) = var("cache_ttl_secs") {
            self.cache_ttl_secs = parse_var(&name, &value)?;
        }
        if let Some((name, value)) = var("memory_ttl_secs") {
            self.memory_ttl_secs = parse_var(&name, &value)?;
        }
        if let Some((name, value)) = var("memory_capacity") {
            self.memory_capacity = parse_var(&name, &value)?;
        }
        if let Some((name, value)) = var("stale_grace_secs") {
            self.stale_grace_secs = parse_var(&name, &value)?;
        }
        if let Some((name, value)) = var("activity_window_days") {
            self.activity_window_days = parse_var(&name, &value)?;
        }
        if let Some((name, value)) = var("batch_deadline_secs") {
            self.batch_deadline_secs = if value.trim().is_empty() { None } else { Some(parse_var(&name, &value)?) };
        }
        if let Some((_, value)) = var("user_agent") {
            self.user_agent = value;
        }

        Ok(())
    }

    /// Save configuration to a file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or serialization fails
    pub fn save(&self, output_path: &Utf8Path) -> Result<()> {
        let extension = output_path.extension().unwrap_or_default();
        let text = match extension {
            "toml" => toml::to_string_pretty(self)
                .into_app_err_with(|| format!("serializing configuration to TOML for saving to {output_path}"))?,
            "yml" | "yaml" => serde_yaml::to_string(self)
                .into_app_err_with(|| format!("serializing configuration to YAML for saving to {output_path}"))?,
            "json" => serde_json::to_string_pretty(self)
                .into_app_err_with(|| format!("serializing configuration to JSON for saving to {output_path}"))?,
            _ => return Err(app_err!("unsupported configuration file extension: {extension}")),
        };

        fs::write(output_path, text).into_app_err_with(|| format!("writing configuration to {output_path}"))?;
        Ok(())
    }

    /// Save the default configuration, keeping the comments when writing YAML
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written
    pub fn save_default(output_path: &Utf8Path) -> Result<()> {
        if matches!(output_path.extension(), Some("yml" | "yaml")) {
            fs::write(output_path, DEFAULT_CONFIG_YAML).into_app_err_with(|| format!("writing default configuration to {output_path}"))?;
            Ok(())
        } else {
            Self::default_config()?.save(output_path)
        }
    }

    #[must_use]
    pub const fn shared_cache_timeout(&self) -> Duration {
        Duration::from_millis(self.shared_cache_timeout_ms)
    }

    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    #[must_use]
    pub const fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    #[must_use]
    pub const fn chunk_delay(&self) -> Duration {
        Duration::from_millis(self.chunk_delay_ms)
    }

    #[must_use]
    pub const fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    #[must_use]
    pub const fn memory_ttl(&self) -> Duration {
        Duration::from_secs(self.memory_ttl_secs)
    }

    #[must_use]
    pub const fn stale_grace(&self) -> Duration {
        Duration::from_secs(self.stale_grace_secs)
    }

    #[must_use]
    pub fn batch_deadline(&self) -> Option<Duration> {
        self.batch_deadline_secs.map(Duration::from_secs)
    }

    /// Check the configuration for unusable values (errors) and questionable ones (warnings)
    ///
    /// # Errors
    ///
    /// Returns an error describing the first unusable value
    pub fn validate(&self) -> Result<Vec<String>> {
        if self.chunk_size == 0 {
            bail!("chunk_size must be at least 1");
        }
        if self.retry_attempts == 0 {
            bail!("retry_attempts must be at least 1");
        }
        if self.request_timeout_secs == 0 {
            bail!("request_timeout_secs must be greater than zero");
        }
        if self.cache_ttl_secs == 0 || self.memory_ttl_secs == 0 {
            bail!("cache_ttl_secs and memory_ttl_secs must be greater than zero");
        }
        if self.memory_capacity == 0 {
            bail!("memory_capacity must be at least 1");
        }
        if self.activity_window_days == 0 {
            bail!("activity_window_days must be at least 1");
        }
        if self.batch_deadline_secs == Some(0) {
            bail!("batch_deadline_secs must be greater than zero when set");
        }

        let mut warnings = Vec::new();

        if self.memory_ttl_secs > self.cache_ttl_secs {
            warnings.push(format!(
                "memory_ttl_secs ({}) exceeds cache_ttl_secs ({}); in-process entries are capped at the shared TTL",
                self.memory_ttl_secs, self.cache_ttl_secs
            ));
        }
        if self.chunk_size > MAX_REASONABLE_CHUNK_SIZE {
            warnings.push(format!(
                "chunk_size ({}) is above {MAX_REASONABLE_CHUNK_SIZE}; upstream services may start rate limiting",
                self.chunk_size
            ));
        }
        if self.retry_attempts > MAX_REASONABLE_RETRY_ATTEMPTS {
            warnings.push(format!(
                "retry_attempts ({}) is above {MAX_REASONABLE_RETRY_ATTEMPTS}; failing providers will stall batches",
                self.retry_attempts
            ));
        }
        if let Some(url) = &self.shared_cache_url
            && !(url.starts_with("redis://") || url.starts_with("rediss://") || url.starts_with("redis+unix://"))
        {
            warnings.push(format!("shared_cache_url '{url}' does not look like a Redis URL"));
        }

        Ok(warnings)
    }
}
