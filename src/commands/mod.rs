//! Command-line interface and orchestration for profile-rollup
//!
//! # Commands
//!
//! - **fetch**: Build a batch from `--handle` pairs or a request file, run it through the
//!   cache and the providers, and render a console or JSON report
//! - **providers**: List the supported providers and their availability
//! - **init**: Generate a default configuration file
//! - **validate**: Check a configuration file and the `ROLLUP_*` overrides
//!
//! The `run` function parses command-line arguments using clap and routes to the
//! appropriate handler. All output goes through the [`Host`] trait so that commands can be
//! exercised in tests without touching the real terminal or exiting the process.

mod common;
mod fetch;
mod host;
mod init;
mod progress_reporter;
mod providers;
mod run;
mod validate;

pub use common::{ColorMode, LogLevel};
pub use fetch::{FetchArgs, OutputFormat, process_fetch};
pub use host::Host;
pub use init::{InitArgs, init_config};
pub use progress_reporter::ProgressReporter;
pub use providers::{ProvidersArgs, list_providers};
pub use run::run;
pub use validate::{ValidateArgs, validate_config};
