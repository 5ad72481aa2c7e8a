//! The manifest model.
//!
//! A [`Tool`] is one manifest entry. It is loaded from YAML
//! ([`manifest`]), completed from a defaults group ([`defaults`]) and then
//! filled in by the resolution pipeline ([`resolve`]) before it is handed
//! to a source provider for installation.

pub mod defaults;
pub mod manifest;
pub mod resolve;
pub mod strategy;
pub mod tags;

pub use defaults::DefaultsSet;
pub use resolve::Resolver;
pub use strategy::Strategy;
pub use tags::TagFilter;

use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::install::Mode;
use crate::matcher::Hint;
use crate::platform::Platform;
use crate::sources::{Source, SourceType};
use crate::template::Template;
use crate::unmarshal::OneOrMany;
use crate::version::VersionSpec;

/// Name of the defaults group merged when a tool does not set `inherit`.
pub const DEFAULT_GROUP: &str = "default";

/// Executable name and the patterns locating it inside an asset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Exe {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub patterns: OneOrMany<String>,
}

impl From<String> for Exe {
    fn from(name: String) -> Self {
        Self {
            name,
            patterns: OneOrMany::default(),
        }
    }
}

/// A condition under which the tool is skipped.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Skip {
    pub condition: Template<bool>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reason: String,
}

impl Skip {
    /// Whether the rendered condition is true.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.condition.get().copied().unwrap_or(false)
    }
}

/// Shell snippets run around the install.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Commands {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pre: OneOrMany<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub post: OneOrMany<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub allow_failure: bool,
}

/// One manifest entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Tool {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(
        default,
        deserialize_with = "scalar_or_struct",
        skip_serializing_if = "is_default"
    )]
    pub version: VersionSpec,
    /// Download URL template; empty lets the source decide.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub path: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub output: String,
    #[serde(
        default,
        deserialize_with = "scalar_or_struct",
        skip_serializing_if = "is_default"
    )]
    pub exe: Exe,
    #[serde(default, skip_serializing_if = "is_default")]
    pub platform: Platform,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: OneOrMany<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub values: BTreeMap<String, serde_yaml::Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fallbacks: OneOrMany<SourceType>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hints: Vec<Hint>,
    #[serde(default, skip_serializing_if = "is_default")]
    pub source: Source,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: OneOrMany<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<Strategy>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extensions: OneOrMany<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skip: OneOrMany<Skip>,
    #[serde(default, skip_serializing_if = "is_default")]
    pub commands: Commands,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<Mode>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub no_verify_ssl: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub no_cache: bool,
    /// `sha256:<hex>` or bare hex digest of the downloaded asset.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub checksum: String,
    /// Defaults group to merge.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub inherit: String,
}

fn is_default<T: Default + PartialEq>(value: &T) -> bool {
    *value == T::default()
}

/// Accept either a bare scalar (converted with `From<String>`) or the full
/// mapping form.
///
/// Floats are rejected: YAML has already dropped their source text, so
/// `1.20` would silently become `1.2`.
fn scalar_or_struct<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + From<String> + Default,
{
    use serde_yaml::Value;

    match Value::deserialize(deserializer)? {
        Value::Null => Ok(T::default()),
        Value::String(s) => Ok(T::from(s)),
        Value::Number(n) if n.is_f64() => Err(D::Error::custom(format!(
            "unquoted decimal {n} may have lost digits; quote it as a string"
        ))),
        Value::Number(n) => Ok(T::from(n.to_string())),
        Value::Bool(b) => Ok(T::from(b.to_string())),
        value @ Value::Mapping(_) => T::deserialize(value).map_err(D::Error::custom),
        other => Err(D::Error::custom(format!(
            "expected a string or a mapping, found {other:?}"
        ))),
    }
}

impl Tool {
    /// A tool with only a name set.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// The effective strategy.
    #[must_use]
    pub fn strategy(&self) -> Strategy {
        self.strategy.unwrap_or_default()
    }

    /// The effective placement mode.
    #[must_use]
    pub fn mode(&self) -> Mode {
        self.mode.unwrap_or_default()
    }

    /// Defaults group this tool merges.
    #[must_use]
    pub fn inherit_group(&self) -> &str {
        if self.inherit.is_empty() {
            DEFAULT_GROUP
        } else {
            &self.inherit
        }
    }

    /// Executable file name with the platform extension appended.
    #[must_use]
    pub fn exe_file_name(&self) -> String {
        with_extension(&self.exe.name, &self.platform.extension)
    }

    /// Where the executable is (or will be) installed.
    #[must_use]
    pub fn exe_path(&self) -> PathBuf {
        PathBuf::from(&self.output).join(self.exe_file_name())
    }

    /// The configured checksum, if any.
    #[must_use]
    pub fn checksum(&self) -> Option<String> {
        let trimmed = self.checksum.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    }
}

/// Append `extension` unless `name` already ends with it.
#[must_use]
pub fn with_extension(name: &str, extension: &str) -> String {
    if extension.is_empty() || name.is_empty() || name.ends_with(extension) {
        name.to_string()
    } else {
        format!("{name}{extension}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_shorthands() {
        let tool: Tool = serde_yaml::from_str("name: jq\nversion: v1.7.1\nexe: jq-cli\n").unwrap();
        assert_eq!(tool.version.requested, "v1.7.1");
        assert_eq!(tool.exe.name, "jq-cli");

        let tool: Tool = serde_yaml::from_str("name: go\nversion: '1.20'\n").unwrap();
        assert_eq!(tool.version.requested, "1.20");

        let tool: Tool = serde_yaml::from_str("name: go\nversion: 2\n").unwrap();
        assert_eq!(tool.version.requested, "2");
    }

    #[test]
    fn test_unquoted_float_version_is_rejected() {
        let err = serde_yaml::from_str::<Tool>("name: go\nversion: 1.20\n").unwrap_err();
        assert!(err.to_string().contains("quote it"), "{err}");
    }

    #[test]
    fn test_full_forms() {
        let yaml = r#"
name: mikefarah/yq
version:
  version: v4.44.1
  commands: [--version]
  patterns: 'version v(\d+\.\d+\.\d+)'
exe:
  name: yq
  patterns: ['^yq_.*']
aliases: y
fallbacks: [go]
hints:
  - pattern: musl
    weight: 2
skip:
  - condition: "{{ OS == 'windows' }}"
    reason: not on windows
commands:
  post: yq --version
strategy: sync
mode: extract
"#;
        let tool: Tool = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(tool.version.commands.to_vec(), vec!["--version"]);
        assert_eq!(tool.version.patterns.len(), 1);
        assert_eq!(tool.exe.patterns.to_vec(), vec!["^yq_.*"]);
        assert_eq!(tool.aliases.to_vec(), vec!["y"]);
        assert_eq!(tool.fallbacks.to_vec(), vec![SourceType::Go]);
        assert_eq!(tool.skip[0].reason, "not on windows");
        assert_eq!(tool.commands.post.to_vec(), vec!["yq --version"]);
        assert_eq!(tool.strategy(), Strategy::Sync);
        assert_eq!(tool.mode(), Mode::Extract);
    }

    #[test]
    fn test_unknown_keys_rejected() {
        assert!(serde_yaml::from_str::<Tool>("name: jq\nbogus: true\n").is_err());
        assert!(serde_yaml::from_str::<Tool>("name: jq\nexe:\n  nam: jq\n").is_err());
    }

    #[test]
    fn test_exe_path_appends_extension() {
        let mut tool = Tool::named("tool");
        tool.exe.name = "tool".into();
        tool.output = "/opt/bin".into();
        tool.platform.extension = ".exe".into();
        assert_eq!(tool.exe_path(), PathBuf::from("/opt/bin/tool.exe"));

        tool.exe.name = "tool.exe".into();
        assert_eq!(tool.exe_file_name(), "tool.exe");
    }

    #[test]
    fn test_inherit_group() {
        let mut tool = Tool::named("x");
        assert_eq!(tool.inherit_group(), "default");
        tool.inherit = "linux".into();
        assert_eq!(tool.inherit_group(), "linux");
    }
}
