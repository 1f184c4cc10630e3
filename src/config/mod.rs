//! Configuration for profile-rollup.
//!
//! Values come from four layers, each overriding the previous one: the embedded
//! `default_config.yml`, an optional configuration file, `ROLLUP_*` environment
//! variables, and finally command-line flags.

#[expect(clippy::module_inception, reason = "mirrors the file layout of the other top-level modules")]
mod config;

pub use config::{Config, DEFAULT_CONFIG_YAML, ENV_PREFIX};
