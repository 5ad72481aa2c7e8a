//! `godyl cache`: inspect and maintain the installed-tool cache.

use godyl_core::cache::{self, CacheBackend};
use std::fmt::Write;
use tracing::info;

use super::Session;
use crate::cli::{CacheCommands, CliError, OkEnvelope};

/// Run a cache subcommand and return its output.
pub async fn execute(session: &Session, action: &CacheCommands) -> Result<String, CliError> {
    let settings = &session.settings;
    let path = settings.cache_dir.join(settings.cache_type.file_name());

    match action {
        CacheCommands::Path => Ok(format!("{}\n", path.display())),
        CacheCommands::Clean => {
            let store = session.cache()?;
            let report = cache::clean(store.as_ref()).await?;
            store.close()?;
            if session.json {
                return Ok(json(&serde_json::json!({
                    "removed": report.removed,
                    "updated": report.updated,
                })));
            }
            let mut out = String::new();
            for id in &report.removed {
                let _ = writeln!(out, "removed  {id}");
            }
            for id in &report.updated {
                let _ = writeln!(out, "updated  {id}");
            }
            let _ = writeln!(
                out,
                "{} removed, {} updated",
                report.removed.len(),
                report.updated.len()
            );
            Ok(out)
        }
        CacheCommands::Remove { names } => {
            let store = session.cache()?;
            let removed = remove(store.as_ref(), names)?;
            store.close()?;
            info!(count = removed.len(), "Removed cache entries");
            if session.json {
                return Ok(json(&serde_json::json!({ "removed": removed })));
            }
            let mut out = String::new();
            for id in &removed {
                let _ = writeln!(out, "removed  {id}");
            }
            Ok(out)
        }
    }
}

/// Delete entries whose name or id is in `names`; every entry when empty.
pub fn remove(store: &dyn CacheBackend, names: &[String]) -> godyl_core::Result<Vec<String>> {
    let mut removed = Vec::new();
    for item in store.get_all()? {
        let selected =
            names.is_empty() || names.iter().any(|n| *n == item.name || *n == item.id);
        if selected && store.delete(&item.id)? {
            removed.push(item.id);
        }
    }
    Ok(removed)
}

fn json(value: &serde_json::Value) -> String {
    serde_json::to_string_pretty(&OkEnvelope::new(value)).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use godyl_core::cache::{CacheItem, CacheType};
    use godyl_core::version::VersionSpec;
    use tempfile::TempDir;

    #[test]
    fn test_remove_by_name_or_all() {
        let dir = TempDir::new().unwrap();
        let store = cache::open(CacheType::File, dir.path()).unwrap();
        let spec = VersionSpec::default();
        store
            .save(CacheItem::new("jq", "/opt/bin/jq", "1.7.1", &spec))
            .unwrap();
        store
            .save(CacheItem::new("jq", "/usr/local/bin/jq", "1.7.1", &spec))
            .unwrap();
        store
            .save(CacheItem::new("yq", "/opt/bin/yq", "4.44.1", &spec))
            .unwrap();

        let removed = remove(store.as_ref(), &["jq".to_string()]).unwrap();
        assert_eq!(removed.len(), 2);
        assert_eq!(store.get_all().unwrap().len(), 1);

        let removed = remove(store.as_ref(), &[]).unwrap();
        assert_eq!(removed, vec!["yq@/opt/bin".to_string()]);
        assert!(store.get_all().unwrap().is_empty());
    }
}
