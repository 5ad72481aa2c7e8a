// Rust 1.92 compiler bug: false positives for thiserror/miette derive macro fields
// https://github.com/rust-lang/rust/issues/147648
#![allow(unused_assignments)]

//! godyl - batch installer for statically compiled CLI tools.
//!
//! The binary is a thin shell over this library: [`cli`] parses arguments,
//! [`config`] merges them with the environment and the config file, and
//! [`execute`] dispatches to the [`commands`].

pub mod cli;
pub mod commands;
pub mod config;
pub mod logging;
pub mod progress;
pub mod shutdown;

use tracing::instrument;
use godyl_core::processor::ProcessReport;
use tokio_util::sync::CancellationToken;

use crate::cli::{Cli, CliError, Commands};
use crate::commands::Session;
use crate::config::Settings;

/// What a command produced.
#[derive(Debug)]
pub enum Output {
    /// Text for stdout.
    Text(String),
    /// Results of an install run.
    Report(ProcessReport),
}

/// Run the parsed command line.
#[instrument(name = "command", skip_all, fields(correlation_id = %crate::logging::correlation_id()))]
pub async fn execute(cli: &Cli, cancel: CancellationToken) -> Result<Output, CliError> {
    if matches!(cli.command, Commands::Version) {
        return Ok(Output::Text(commands::version::version_text()));
    }

    let settings = Settings::resolve(&cli.settings)?;
    let session = Session::new(settings, cli.json, cancel)?;

    match &cli.command {
        Commands::Install { files } => commands::install::execute(&session, files)
            .await
            .map(Output::Report),
        Commands::Download { specs } => commands::download::execute(&session, specs)
            .await
            .map(Output::Report),
        Commands::Dump { what } => commands::dump::execute(&session, what)
            .await
            .map(Output::Text),
        Commands::Cache { action } => commands::cache::execute(&session, action)
            .await
            .map(Output::Text),
        Commands::Status { files } => commands::status::execute(&session, files)
            .await
            .map(Output::Text),
        Commands::Version => Ok(Output::Text(commands::version::version_text())),
    }
}

