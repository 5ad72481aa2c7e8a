//! `godyl status`: which manifest tools are installed, and at what version.

use godyl_core::cache::{CacheBackend, cache_id};
use godyl_core::tool::Tool;
use godyl_core::version;
use serde::Serialize;
use std::fmt::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::instrument;

use super::Session;
use super::install::load_manifests;
use crate::cli::{CliError, OkEnvelope};

/// State of one manifest tool on this machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolStatus {
    pub name: String,
    pub path: PathBuf,
    pub exists: bool,
    /// Version reported by the executable itself.
    pub installed: Option<String>,
    /// Version recorded in the cache.
    pub cached: Option<String>,
    /// Why the tool would be skipped, if it would.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skipped: Option<String>,
}

/// Inspect one prepared tool.
pub async fn inspect(tool: &Tool, cache: Option<&Arc<dyn CacheBackend>>) -> ToolStatus {
    let path = tool.exe_path();
    let exists = path.is_file();
    let installed = if exists {
        version::probe(&path, &tool.version).await
    } else {
        None
    };
    let cached = cache
        .and_then(|c| c.get(&cache_id(&tool.name, Path::new(&tool.output))).ok().flatten())
        .map(|item| item.version.version);

    ToolStatus {
        name: tool.name.clone(),
        path,
        exists,
        installed,
        cached,
        skipped: None,
    }
}

/// Report on every tool in `files`.
#[instrument(skip(session))]
pub async fn execute(session: &Session, files: &[PathBuf]) -> Result<String, CliError> {
    let cache = session.cache_if_enabled()?;
    let resolver = session.resolver(cache.clone());

    let mut statuses = Vec::new();
    for mut tool in load_manifests(files).await? {
        match resolver.prepare(&mut tool) {
            Ok(()) => statuses.push(inspect(&tool, cache.as_ref()).await),
            Err(e) if e.is_skip() => {
                let mut status = inspect(&tool, cache.as_ref()).await;
                status.skipped = Some(e.to_string());
                statuses.push(status);
            }
            Err(e) => return Err(e.into()),
        }
    }

    if session.json {
        return serde_json::to_string_pretty(&OkEnvelope::new(&statuses))
            .map_err(|e| CliError::other(format!("failed to serialize output: {e}")));
    }
    Ok(table(&statuses))
}

fn table(statuses: &[ToolStatus]) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<32} {:<9} {:<12} {:<12} PATH",
        "TOOL", "PRESENT", "INSTALLED", "CACHED"
    );
    for status in statuses {
        let present = match (&status.skipped, status.exists) {
            (Some(_), _) => "skipped",
            (None, true) => "yes",
            (None, false) => "no",
        };
        let _ = writeln!(
            out,
            "{:<32} {:<9} {:<12} {:<12} {}",
            status.name,
            present,
            status.installed.as_deref().unwrap_or("-"),
            status.cached.as_deref().unwrap_or("-"),
            status.path.display()
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use godyl_core::cache::{self, CacheItem, CacheType};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_inspect_missing_and_cached() {
        let dir = TempDir::new().unwrap();
        let store = cache::open(CacheType::File, &dir.path().join("cache")).unwrap();
        let mut tool = Tool::named("jq");
        tool.output = dir.path().display().to_string();
        tool.exe.name = "jq".into();
        store
            .save(CacheItem::new("jq", tool.exe_path(), "1.7.1", &tool.version))
            .unwrap();

        let status = inspect(&tool, Some(&store)).await;
        assert!(!status.exists);
        assert_eq!(status.installed, None);
        assert_eq!(status.cached.as_deref(), Some("1.7.1"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_inspect_probes_installed_version() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let exe = dir.path().join("fake");
        std::fs::write(&exe, "#!/bin/sh\necho \"fake version 2.3.4\"\n").unwrap();
        std::fs::set_permissions(&exe, std::fs::Permissions::from_mode(0o755)).unwrap();

        let mut tool = Tool::named("fake");
        tool.output = dir.path().display().to_string();
        tool.exe.name = "fake".into();

        let status = inspect(&tool, None).await;
        assert!(status.exists);
        assert_eq!(status.installed.as_deref(), Some("2.3.4"));
        assert!(table(&[status]).contains("2.3.4"));
    }
}
