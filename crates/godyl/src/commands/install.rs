//! `godyl install`: run every manifest tool through the processor.

use godyl_core::processor::ProcessReport;
use godyl_core::tool::{Tool, manifest};
use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};

use super::Session;
use crate::cli::CliError;

/// Load manifests, `-` meaning stdin, in the order given.
pub async fn load_manifests(files: &[PathBuf]) -> Result<Vec<Tool>, CliError> {
    if let Some(missing) = files
        .iter()
        .find(|f| f.as_path() != Path::new("-") && !f.exists())
    {
        return Err(CliError::config_with_help(
            format!("manifest {} not found", missing.display()),
            "Pass a manifest path, or `-` to read one from stdin",
        ));
    }

    let files = files.to_vec();
    let tools = tokio::task::spawn_blocking(move || manifest::load_all(&files))
        .await
        .map_err(|e| CliError::other(format!("manifest loader stopped: {e}")))??;
    Ok(tools)
}

/// Install every tool in `files`.
#[instrument(skip(session))]
pub async fn execute(session: &Session, files: &[PathBuf]) -> Result<ProcessReport, CliError> {
    let tools = load_manifests(files).await?;
    if tools.is_empty() {
        warn!("No tools to install");
    }
    info!(tools = tools.len(), "Loaded manifests");

    let processor = session.processor()?;
    Ok(processor.collect(tools).await)
}
