#![doc(hidden)]
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Core library for profile-rollup
//!
//! This library gathers competitive-programming and developer-profile statistics for a
//! user from many unreliable upstream services and folds them into one report.
//!
//! # Module Organization
//!
//! - [`commands`]: Command-line interface and orchestration
//! - [`config`]: Layered configuration (embedded defaults, file, environment)
//! - [`stats`]: Providers, two-tier caching, batched fetching and aggregation
//! - [`reports`]: Rendering of batch responses

pub type Result<T, E = ohno::AppError> = core::result::Result<T, E>;

pub mod commands;
pub mod config;
pub mod reports;
pub mod stats;

pub use crate::commands::{Host, run};
