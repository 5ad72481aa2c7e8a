//! `godyl dump`: print effective data as YAML (or JSON with `--json`).

use godyl_core::platform::Platform;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::debug;

use super::Session;
use super::install::load_manifests;
use crate::cli::{CliError, DumpCommands, OkEnvelope};

fn render<T: Serialize>(value: &T, json: bool) -> Result<String, CliError> {
    if json {
        serde_json::to_string_pretty(&OkEnvelope::new(value))
            .map_err(|e| CliError::other(format!("failed to serialize output: {e}")))
    } else {
        serde_yaml::to_string(value)
            .map_err(|e| CliError::other(format!("failed to serialize output: {e}")))
    }
}

/// Render the requested dump.
pub async fn execute(session: &Session, what: &DumpCommands) -> Result<String, CliError> {
    debug!(?what, "Dumping");
    match what {
        DumpCommands::Config => render(&session.settings, session.json),
        DumpCommands::Defaults => render(session.defaults.as_ref(), session.json),
        DumpCommands::Env => {
            render(&masked_env(std::env::vars()), session.json)
        }
        DumpCommands::Platform => render(&Platform::detect(), session.json),
        DumpCommands::Tools { files } => tools(session, files).await,
    }
}

/// Environment with token values hidden.
fn masked_env(vars: impl Iterator<Item = (String, String)>) -> BTreeMap<String, String> {
    vars.map(|(key, value)| {
        let secret = key.to_uppercase().contains("TOKEN") && !value.is_empty();
        (key, if secret { "***".to_string() } else { value })
    })
    .collect()
}

/// Manifest tools with defaults applied and names resolved.
async fn tools(session: &Session, files: &[PathBuf]) -> Result<String, CliError> {
    let resolver = session.resolver(None);
    let mut tools = load_manifests(files).await?;
    for tool in &mut tools {
        match resolver.prepare(tool) {
            Ok(()) => {}
            Err(e) if e.is_skip() => debug!(tool = %tool.name, reason = %e, "Would be skipped"),
            Err(e) => return Err(e.into()),
        }
    }
    render(&tools, session.json)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_masked_env() {
        let env = masked_env(
            [
                ("GITHUB_TOKEN".to_string(), "ghp_x".to_string()),
                ("PATH".to_string(), "/bin".to_string()),
            ]
            .into_iter(),
        );
        assert_eq!(env["GITHUB_TOKEN"], "***");
        assert_eq!(env["PATH"], "/bin");
    }

    #[test]
    fn test_render_json_envelope() {
        let out = render(&BTreeMap::from([("a", 1)]), true).unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["status"], "ok");
        assert_eq!(value["data"]["a"], 1);
    }
}
