//! Source kinds and the provider trait they implement.
//!
//! A tool's `source` block selects one [`SourceType`]. The behaviour for
//! each kind lives behind [`SourceProvider`]; providers are registered in a
//! [`SourceRegistry`] and looked up by type during resolution. The
//! resolution pipeline and the processor never branch on the kind itself.

mod none;
mod registry;

pub use none::NoneProvider;
pub use registry::SourceRegistry;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

use crate::install::{self, InstallData, InstallOutcome};
use crate::matcher::Requirements;
use crate::unmarshal::OneOrMany;
use crate::{Error, Result};

/// The closed set of source kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Github,
    Gitlab,
    Url,
    Go,
    Command,
    None,
}

impl SourceType {
    pub const ALL: [Self; 6] = [
        Self::Github,
        Self::Gitlab,
        Self::Url,
        Self::Go,
        Self::Command,
        Self::None,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Github => "github",
            Self::Gitlab => "gitlab",
            Self::Url => "url",
            Self::Go => "go",
            Self::Command => "command",
            Self::None => "none",
        }
    }

    /// Whether this kind downloads a file from `path`.
    #[must_use]
    pub const fn downloads(self) -> bool {
        matches!(self, Self::Github | Self::Gitlab | Self::Url)
    }
}

impl FromStr for SourceType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let lower = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == lower)
            .ok_or_else(|| {
                Error::configuration(format!(
                    "unknown source type '{s}', expected one of: github, gitlab, url, go, command, none"
                ))
            })
    }
}

impl std::fmt::Display for SourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// GitHub release settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GithubSource {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub repo: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub owner: String,
    #[serde(default, skip_serializing)]
    pub token: String,
    /// Consider pre-releases when picking the latest release.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub pre: bool,
}

/// GitLab release settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GitlabSource {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub repo: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub owner: String,
    #[serde(default, skip_serializing)]
    pub token: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub pre: bool,
    /// Base URL of the GitLab instance.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub server: String,
}

/// Plain URL settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UrlSource {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub url: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    #[serde(default, skip_serializing)]
    pub token: String,
}

/// `go install` settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GoSource {
    /// Explicit package path, disabling the module fallbacks.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub command: String,
}

/// Shell recipe settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommandSource {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub commands: OneOrMany<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub allow_failure: bool,
}

/// A tool's `source` block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Source {
    /// Source type; templatable, so kept as text until resolution.
    #[serde(rename = "type", default, skip_serializing_if = "String::is_empty")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "is_default")]
    pub github: GithubSource,
    #[serde(default, skip_serializing_if = "is_default")]
    pub gitlab: GitlabSource,
    #[serde(default, skip_serializing_if = "is_default")]
    pub url: UrlSource,
    #[serde(default, skip_serializing_if = "is_default")]
    pub go: GoSource,
    #[serde(default, skip_serializing_if = "is_default")]
    pub commands: CommandSource,
}

fn is_default<T: Default + PartialEq>(value: &T) -> bool {
    *value == T::default()
}

impl Source {
    /// The parsed source type.
    pub fn source_type(&self) -> Result<SourceType> {
        self.kind.parse()
    }

    /// Every templatable string in the block.
    pub fn strings_mut(&mut self) -> impl Iterator<Item = &mut String> {
        [
            &mut self.github.repo,
            &mut self.github.owner,
            &mut self.github.token,
            &mut self.gitlab.repo,
            &mut self.gitlab.owner,
            &mut self.gitlab.token,
            &mut self.gitlab.server,
            &mut self.url.url,
            &mut self.url.token,
            &mut self.go.command,
        ]
        .into_iter()
        .chain(self.url.headers.values_mut())
        .chain(self.commands.commands.iter_mut())
    }
}

/// Split `owner/repo`, ignoring any leading host segments.
#[must_use]
pub fn split_owner_repo(name: &str) -> Option<(String, String)> {
    let mut parts = name.trim_matches('/').rsplitn(2, '/');
    let repo = parts.next().filter(|s| !s.is_empty())?;
    let owner = parts
        .next()
        .map(|rest| rest.rsplit('/').next().unwrap_or(rest))
        .filter(|s| !s.is_empty())?;
    Some((owner.to_string(), repo.to_string()))
}

/// Inputs for [`SourceProvider::select_asset`].
#[derive(Debug, Clone, Copy)]
pub struct AssetRequest<'a> {
    pub name: &'a str,
    pub version: &'a str,
    pub extensions: &'a [String],
    pub requirements: &'a Requirements,
}

/// Behaviour of one source kind.
///
/// # Example
///
/// ```ignore
/// pub struct GithubProvider { /* ... */ }
///
/// #[async_trait]
/// impl SourceProvider for GithubProvider {
///     fn source_type(&self) -> SourceType { SourceType::Github }
///     // ...
/// }
/// ```
#[async_trait]
pub trait SourceProvider: Send + Sync {
    /// The kind this provider serves.
    fn source_type(&self) -> SourceType;

    /// Human-readable description for help text.
    fn description(&self) -> &'static str;

    /// Parse identity from the tool name into the source block.
    fn initialize(&self, name: &str, source: &mut Source) -> Result<()>;

    /// Executable name to use when the manifest gives none.
    fn default_exe_name(&self, name: &str, source: &Source) -> String;

    /// Latest version tag.
    async fn discover_version(&self, source: &Source) -> Result<String>;

    /// Download URL (or module path) for the requested version.
    async fn select_asset(&self, source: &Source, request: &AssetRequest<'_>) -> Result<String>;

    /// Extra headers sent when downloading the selected asset.
    fn download_headers(&self, source: &Source) -> BTreeMap<String, String> {
        let _ = source;
        BTreeMap::new()
    }

    /// Fetch and place the tool.
    ///
    /// Defaults to downloading `data.path` and placing the executable.
    async fn install(&self, source: &Source, data: &InstallData) -> Result<InstallOutcome> {
        let _ = source;
        install::install(data).await
    }

    /// Fail fast when a required local program is missing.
    async fn check_prerequisites(&self) -> Result<()> {
        Ok(())
    }
}

/// Last path segment of a name, used as a default executable name.
#[must_use]
pub fn base_name(name: &str) -> String {
    name.trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(name)
        .to_string()
}
