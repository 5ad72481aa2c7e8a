//! `godyl download`: install tools named on the command line.
//!
//! - `owner/repo` or `owner/repo@v1.2.3` installs from GitHub releases
//! - an `http(s)://` or `file://` URL downloads that asset directly
//!
//! Both use `find` mode: the executable is located inside the asset.

use godyl_core::install::Mode;
use godyl_core::processor::ProcessReport;
use godyl_core::sources::{SourceType, split_owner_repo};
use godyl_core::tool::Tool;
use tracing::{info, instrument};

use super::Session;
use crate::cli::CliError;

const ARCHIVE_SUFFIXES: &[&str] = &[
    ".tar.gz", ".tgz", ".tar.xz", ".txz", ".tar.bz2", ".tbz", ".zip", ".gz", ".xz", ".bz2",
    ".exe",
];

/// Build a tool from one command-line spec.
pub fn tool_for_spec(spec: &str) -> Result<Tool, CliError> {
    let spec = spec.trim();

    if is_url(spec) {
        let exe = exe_from_url(spec).ok_or_else(|| {
            CliError::config(format!("cannot derive an executable name from {spec}"))
        })?;
        let mut tool = Tool::named(&exe);
        tool.source.kind = SourceType::Url.to_string();
        tool.path = spec.to_string();
        tool.exe.name = exe;
        tool.mode = Some(Mode::Find);
        return Ok(tool);
    }

    let (repo, version) = match spec.split_once('@') {
        Some((repo, version)) => (repo, version),
        None => (spec, ""),
    };
    if split_owner_repo(repo).is_none() {
        return Err(CliError::config_with_help(
            format!("'{spec}' is neither owner/repo nor a URL"),
            "Use owner/repo, owner/repo@version or an http(s) URL",
        ));
    }

    let mut tool = Tool::named(repo);
    tool.source.kind = SourceType::Github.to_string();
    tool.version.requested = version.to_string();
    tool.mode = Some(Mode::Find);
    Ok(tool)
}

fn is_url(spec: &str) -> bool {
    ["http://", "https://", "file://"]
        .iter()
        .any(|scheme| spec.starts_with(scheme))
}

/// `https://x/dl/tool_1.0_linux_amd64.tar.gz` => `tool`.
fn exe_from_url(url: &str) -> Option<String> {
    let file = url
        .split(['?', '#'])
        .next()?
        .trim_end_matches('/')
        .rsplit('/')
        .next()?;
    let mut stem = file;
    for suffix in ARCHIVE_SUFFIXES {
        if let Some(stripped) = stem.strip_suffix(suffix) {
            stem = stripped;
            break;
        }
    }
    let name = stem
        .split(['_', '-'])
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or(stem);
    (!name.is_empty()).then(|| name.to_string())
}

/// Install each spec.
#[instrument(skip(session))]
pub async fn execute(session: &Session, specs: &[String]) -> Result<ProcessReport, CliError> {
    let tools = specs
        .iter()
        .map(|spec| tool_for_spec(spec))
        .collect::<Result<Vec<_>, _>>()?;
    info!(tools = tools.len(), "Downloading");

    let processor = session.processor()?;
    Ok(processor.collect(tools).await)
}
