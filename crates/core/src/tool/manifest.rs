//! Loading tool manifests.
//!
//! A manifest is a YAML sequence. Each entry is either a mapping in the
//! [`Tool`] shape or a bare string, read as `{ name: <string> }`.

use serde::Deserialize;
use std::io::Read;
use std::path::Path;
use tracing::debug;

use super::Tool;
use crate::{Error, Result};

/// Parse manifest text.
pub fn from_yaml(text: &str, path: Option<&Path>) -> Result<Vec<Tool>> {
    use serde_yaml::Value;

    let document: Value =
        serde_yaml::from_str(text).map_err(|e| Error::manifest(path, e.to_string()))?;

    let entries = match document {
        Value::Null => return Ok(Vec::new()),
        Value::Sequence(entries) => entries,
        _ => {
            return Err(Error::manifest(
                path,
                "expected a list of tools at the top level",
            ));
        }
    };

    entries
        .into_iter()
        .enumerate()
        .map(|(index, entry)| {
            let tool = match entry {
                Value::String(name) => Tool::named(name),
                other => Tool::deserialize(other)
                    .map_err(|e| Error::manifest(path, format!("entry {}: {e}", index + 1)))?,
            };
            if tool.name.trim().is_empty() {
                return Err(Error::manifest(
                    path,
                    format!("entry {}: missing name", index + 1),
                ));
            }
            Ok(tool)
        })
        .collect()
}

/// Read a manifest file, or stdin when `path` is `-`.
pub fn load(path: &Path) -> Result<Vec<Tool>> {
    if path == Path::new("-") {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .map_err(|e| Error::io_without_path(e, "read stdin"))?;
        return from_yaml(&text, None);
    }

    let text = std::fs::read_to_string(path).map_err(|e| Error::io(e, path, "read"))?;
    let tools = from_yaml(&text, Some(path))?;
    debug!(path = %path.display(), count = tools.len(), "Loaded manifest");
    Ok(tools)
}

/// Load several manifests, concatenating their tools in order.
pub fn load_all<P: AsRef<Path>>(paths: &[P]) -> Result<Vec<Tool>> {
    let mut tools = Vec::new();
    for path in paths {
        tools.extend(load(path.as_ref())?);
    }
    Ok(tools)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_mixed_entries() {
        let tools = from_yaml(
            "- jq\n- name: mikefarah/yq\n  aliases: y\n- kubectl\n",
            None,
        )
        .unwrap();
        let names: Vec<_> = tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, ["jq", "mikefarah/yq", "kubectl"]);
        assert_eq!(tools[1].aliases.to_vec(), vec!["y"]);
    }

    #[test]
    fn test_empty_document() {
        assert!(from_yaml("", None).unwrap().is_empty());
    }

    #[test]
    fn test_errors_name_the_entry() {
        let err = from_yaml("- jq\n- name: yq\n  unknown: 1\n", None).unwrap_err();
        assert!(err.to_string().contains("entry 2"));

        let err = from_yaml("- description: nameless\n", None).unwrap_err();
        assert!(err.to_string().contains("missing name"));

        assert!(from_yaml("name: jq\n", None).is_err());
    }

    #[test]
    fn test_load_all_keeps_order() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.yml");
        let b = dir.path().join("b.yml");
        std::fs::write(&a, "- one\n- two\n").unwrap();
        std::fs::write(&b, "- three\n").unwrap();

        let tools = load_all(&[a, b]).unwrap();
        let names: Vec<_> = tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, ["one", "two", "three"]);
    }

    #[test]
    fn test_load_missing_file() {
        let err = load(Path::new("/nonexistent/tools.yml")).unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }
}
