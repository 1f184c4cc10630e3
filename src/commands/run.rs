//! Command dispatch logic for profile-rollup

use super::{
    FetchArgs, InitArgs, ProvidersArgs, ValidateArgs, init_config, list_providers, process_fetch, validate_config,
};
use crate::{Host, Result};
use clap::builder::Styles;
use clap::builder::styling::{AnsiColor, Effects};
use clap::{Parser, Subcommand};

const CLAP_STYLES: Styles = Styles::styled()
    .header(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .usage(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .literal(AnsiColor::Cyan.on_default().effects(Effects::BOLD))
    .placeholder(AnsiColor::Cyan.on_default());

#[derive(Parser, Debug)]
#[command(name = "profile-rollup", version, author, long_about = None)]
#[command(about = "Combine competitive-programming profile statistics from many platforms")]
#[command(styles = CLAP_STYLES)]
struct Cli {
    #[command(subcommand)]
    command: RollupSubcommand,
}

#[derive(Subcommand, Debug)]
enum RollupSubcommand {
    /// Fetch statistics for a set of provider handles and report them
    Fetch(Box<FetchArgs>),
    /// List the supported providers
    Providers(ProvidersArgs),
    /// Generate a default configuration file
    Init(InitArgs),
    /// Validate a configuration file
    Validate(ValidateArgs),
}

/// Dispatch command-line arguments to the appropriate handler
///
/// # Errors
///
/// Returns an error if the executed command fails
pub async fn run<I, T, H>(host: &mut H, args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
    H: Host,
{
    let cli = Cli::parse_from(args);

    match &cli.command {
        RollupSubcommand::Fetch(fetch_args) => process_fetch(host, fetch_args).await,
        RollupSubcommand::Providers(providers_args) => list_providers(host, providers_args),
        RollupSubcommand::Init(init_args) => init_config(host, init_args),
        RollupSubcommand::Validate(validate_args) => validate_config(host, validate_args),
    }
}
