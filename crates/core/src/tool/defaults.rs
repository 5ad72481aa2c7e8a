//! Defaults groups and how they merge into tools.
//!
//! A defaults document maps group names to tool-shaped records. Each tool
//! merges the group named by its `inherit` key: empty fields are copied,
//! maps merge without overwriting keys the tool sets, booleans combine.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

use super::{DEFAULT_GROUP, Tool};
use crate::sources::Source;
use crate::{Error, Result};

/// All defaults groups, by name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DefaultsSet(pub BTreeMap<String, Tool>);

impl DefaultsSet {
    /// Parse a defaults document.
    pub fn from_yaml(text: &str, path: Option<&Path>) -> Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        let groups: Option<BTreeMap<String, Tool>> =
            serde_yaml::from_str(text).map_err(|e| Error::manifest(path, e.to_string()))?;
        let mut set = Self(groups.unwrap_or_default());
        for group in set.0.values_mut() {
            group.name.clear();
            group.description.clear();
        }
        Ok(set)
    }

    /// Read and parse a defaults file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| Error::io(e, path, "read"))?;
        debug!(path = %path.display(), "Loaded defaults");
        Self::from_yaml(&text, Some(path))
    }

    #[must_use]
    pub fn get(&self, group: &str) -> Option<&Tool> {
        self.0.get(group)
    }

    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.0.keys().map(String::as_str).collect()
    }

    /// Overwrite every group with the non-empty fields of `overrides`.
    ///
    /// Used for command-line flags, which take precedence over defaults
    /// files but not over values set on a tool.
    pub fn apply_overrides(&mut self, overrides: &Tool) {
        self.0.entry(DEFAULT_GROUP.to_string()).or_default();
        for group in self.0.values_mut() {
            let mut merged = overrides.clone();
            merged.merge_from(group);
            *group = merged;
        }
    }

    /// Merge the tool's group into it.
    ///
    /// A missing `default` group is not an error; a missing group named
    /// explicitly through `inherit` is.
    pub fn apply(&self, tool: &mut Tool) -> Result<()> {
        let group = tool.inherit_group().to_string();
        match self.0.get(&group) {
            Some(defaults) => {
                tool.merge_from(defaults);
                Ok(())
            }
            None if group == DEFAULT_GROUP => Ok(()),
            None => Err(Error::configuration(format!(
                "{}: defaults group '{group}' does not exist (available: {})",
                tool.name,
                self.names().join(", ")
            ))),
        }
    }
}

fn fill(field: &mut String, from: &str) {
    if field.is_empty() {
        from.clone_into(field);
    }
}

fn fill_vec<T: Clone>(field: &mut Vec<T>, from: &[T]) {
    if field.is_empty() {
        *field = from.to_vec();
    }
}

fn merge_map<V: Clone>(into: &mut BTreeMap<String, V>, from: &BTreeMap<String, V>) {
    for (key, value) in from {
        into.entry(key.clone()).or_insert_with(|| value.clone());
    }
}

/// Merge YAML values, recursing into mappings present on both sides.
fn merge_values(
    into: &mut BTreeMap<String, serde_yaml::Value>,
    from: &BTreeMap<String, serde_yaml::Value>,
) {
    use serde_yaml::Value;

    for (key, value) in from {
        match (into.get_mut(key), value) {
            (None, _) => {
                into.insert(key.clone(), value.clone());
            }
            (Some(Value::Mapping(ours)), Value::Mapping(theirs)) => {
                for (k, v) in theirs {
                    if !ours.contains_key(k) {
                        ours.insert(k.clone(), v.clone());
                    }
                }
            }
            (Some(_), _) => {}
        }
    }
}

impl Source {
    /// Fill empty fields from `other`.
    pub fn merge_from(&mut self, other: &Self) {
        fill(&mut self.kind, &other.kind);

        fill(&mut self.github.repo, &other.github.repo);
        fill(&mut self.github.owner, &other.github.owner);
        fill(&mut self.github.token, &other.github.token);
        self.github.pre |= other.github.pre;

        fill(&mut self.gitlab.repo, &other.gitlab.repo);
        fill(&mut self.gitlab.owner, &other.gitlab.owner);
        fill(&mut self.gitlab.token, &other.gitlab.token);
        fill(&mut self.gitlab.server, &other.gitlab.server);
        self.gitlab.pre |= other.gitlab.pre;

        fill(&mut self.url.url, &other.url.url);
        fill(&mut self.url.token, &other.url.token);
        merge_map(&mut self.url.headers, &other.url.headers);

        fill(&mut self.go.command, &other.go.command);

        fill_vec(&mut self.commands.commands, &other.commands.commands);
        self.commands.allow_failure |= other.commands.allow_failure;
    }
}

impl Tool {
    /// Fill empty fields from `defaults`.
    pub fn merge_from(&mut self, defaults: &Self) {
        fill(&mut self.version.requested, &defaults.version.requested);
        fill_vec(&mut self.version.commands, &defaults.version.commands);
        fill_vec(&mut self.version.patterns, &defaults.version.patterns);

        fill(&mut self.path, &defaults.path);
        fill(&mut self.output, &defaults.output);

        fill(&mut self.exe.name, &defaults.exe.name);
        fill_vec(&mut self.exe.patterns, &defaults.exe.patterns);

        self.platform.merge(&defaults.platform);

        fill_vec(&mut self.aliases, &defaults.aliases);
        merge_values(&mut self.values, &defaults.values);
        fill_vec(&mut self.fallbacks, &defaults.fallbacks);
        fill_vec(&mut self.hints, &defaults.hints);

        self.source.merge_from(&defaults.source);

        fill_vec(&mut self.tags, &defaults.tags);
        if self.strategy.is_none() {
            self.strategy = defaults.strategy;
        }
        fill_vec(&mut self.extensions, &defaults.extensions);
        fill_vec(&mut self.skip, &defaults.skip);

        fill_vec(&mut self.commands.pre, &defaults.commands.pre);
        fill_vec(&mut self.commands.post, &defaults.commands.post);
        self.commands.allow_failure |= defaults.commands.allow_failure;

        if self.mode.is_none() {
            self.mode = defaults.mode;
        }
        merge_map(&mut self.env, &defaults.env);
        self.no_verify_ssl |= defaults.no_verify_ssl;
        self.no_cache |= defaults.no_cache;
        fill(&mut self.checksum, &defaults.checksum);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::Strategy;

    const DEFAULTS: &str = r#"
default:
  output: ~/.local/bin
  strategy: none
  source:
    type: github
    url:
      headers:
        Accept: application/octet-stream
  values:
    channel: stable
    nested:
      a: 1
  env:
    GOFLAGS: -trimpath
  extensions: [.tar.gz, .zip]
linux:
  output: /opt/bin
  mode: extract
"#;

    #[test]
    fn test_apply_fills_empty_fields() {
        let set = DefaultsSet::from_yaml(DEFAULTS, None).unwrap();
        let mut tool: Tool = serde_yaml::from_str(
            "name: jq\nstrategy: sync\nvalues:\n  channel: edge\n  nested:\n    b: 2\nenv:\n  GOFLAGS: -v\n",
        )
        .unwrap();
        set.apply(&mut tool).unwrap();

        assert_eq!(tool.output, "~/.local/bin");
        assert_eq!(tool.strategy(), Strategy::Sync);
        assert_eq!(tool.source.kind, "github");
        assert_eq!(tool.env["GOFLAGS"], "-v");
        assert_eq!(tool.values["channel"], serde_yaml::Value::from("edge"));
        let nested = tool.values["nested"].as_mapping().unwrap();
        assert_eq!(nested.len(), 2);
        assert_eq!(tool.extensions.to_vec(), vec![".tar.gz", ".zip"]);
        assert_eq!(
            tool.source.url.headers["Accept"],
            "application/octet-stream"
        );
    }

    #[test]
    fn test_apply_named_group() {
        let set = DefaultsSet::from_yaml(DEFAULTS, None).unwrap();
        let mut tool = Tool::named("jq");
        tool.inherit = "linux".into();
        set.apply(&mut tool).unwrap();
        assert_eq!(tool.output, "/opt/bin");
        assert!(tool.source.kind.is_empty());
    }

    #[test]
    fn test_apply_missing_group() {
        let set = DefaultsSet::from_yaml(DEFAULTS, None).unwrap();
        let mut tool = Tool::named("jq");
        tool.inherit = "windows".into();
        let err = set.apply(&mut tool).unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));

        let mut tool = Tool::named("jq");
        assert!(DefaultsSet::default().apply(&mut tool).is_ok());
    }

    #[test]
    fn test_identity_ignored() {
        let set = DefaultsSet::from_yaml("default:\n  name: x\n  description: y\n", None).unwrap();
        assert!(set.get("default").unwrap().name.is_empty());
    }

    #[test]
    fn test_overrides_beat_defaults_not_tools() {
        let mut set = DefaultsSet::from_yaml(DEFAULTS, None).unwrap();
        let mut overrides = Tool::default();
        overrides.output = "/flag/bin".into();
        overrides.strategy = Some(Strategy::Force);
        set.apply_overrides(&overrides);

        let mut plain = Tool::named("a");
        set.apply(&mut plain).unwrap();
        assert_eq!(plain.output, "/flag/bin");
        assert_eq!(plain.strategy(), Strategy::Force);
        assert_eq!(plain.source.kind, "github");

        let mut explicit = Tool::named("b");
        explicit.output = "/tool/bin".into();
        set.apply(&mut explicit).unwrap();
        assert_eq!(explicit.output, "/tool/bin");
    }

    #[test]
    fn test_unknown_key_in_defaults() {
        assert!(DefaultsSet::from_yaml("default:\n  outptu: x\n", None).is_err());
    }
}
