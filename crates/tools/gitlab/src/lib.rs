//! GitLab releases source provider for godyl.
//!
//! Talks to `<server>/api/v4`, so self-hosted instances work by setting
//! `source.gitlab.server`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use godyl_core::matcher::{self, Asset};
use godyl_core::sources::{
    AssetRequest, Source, SourceProvider, SourceType, base_name, split_owner_repo,
};
use godyl_core::{Error, Result};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// gitlab.com, used when no server is configured.
pub const DEFAULT_SERVER: &str = "https://gitlab.com";

const TOKEN_HEADER: &str = "PRIVATE-TOKEN";

#[derive(Debug, Deserialize)]
struct Release {
    tag_name: String,
    #[serde(default)]
    released_at: Option<DateTime<Utc>>,
    #[serde(default)]
    assets: Assets,
}

#[derive(Debug, Default, Deserialize)]
struct Assets {
    #[serde(default)]
    links: Vec<Link>,
}

#[derive(Debug, Deserialize)]
struct Link {
    name: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    direct_asset_url: String,
    #[serde(default)]
    link_type: String,
}

impl Link {
    fn download_url(&self) -> &str {
        if self.direct_asset_url.is_empty() {
            &self.url
        } else {
            &self.direct_asset_url
        }
    }
}

/// Source provider for GitLab releases.
pub struct GitlabProvider {
    client: Client,
}

impl GitlabProvider {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("godyl/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::configuration(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// `<server>/api/v4/projects/<id>`.
    fn project_url(source: &Source) -> Result<String> {
        let gitlab = &source.gitlab;
        if gitlab.owner.is_empty() || gitlab.repo.is_empty() {
            return Err(Error::tool_resolution(
                "gitlab source requires an owner and a repo",
            ));
        }
        let server = if gitlab.server.is_empty() {
            DEFAULT_SERVER
        } else {
            gitlab.server.trim_end_matches('/')
        };
        Ok(format!(
            "{server}/api/v4/projects/{}",
            project_id(&format!("{}/{}", gitlab.owner, gitlab.repo))
        ))
    }

    async fn get<T: DeserializeOwned>(&self, url: &str, token: &str) -> Result<T> {
        debug!(%url, "GitLab API request");
        let mut request = self.client.get(url);
        if !token.is_empty() {
            request = request.header(TOKEN_HEADER, token);
        }
        let response = request
            .send()
            .await
            .map_err(|e| Error::http(url, e.to_string()))?;

        match response.status() {
            status if status.is_success() => response
                .json()
                .await
                .map_err(|e| Error::http(url, format!("invalid JSON: {e}"))),
            StatusCode::NOT_FOUND => Err(Error::tool_resolution(format!("not found: {url}"))),
            status => Err(Error::http(url, format!("HTTP {status}"))),
        }
    }
}

/// URL-encode a project path for use as an id.
fn project_id(path: &str) -> String {
    urlencoding::encode(path).into_owned()
}

#[async_trait]
impl SourceProvider for GitlabProvider {
    fn source_type(&self) -> SourceType {
        SourceType::Gitlab
    }

    fn description(&self) -> &'static str {
        "Install tools from GitLab releases"
    }

    fn initialize(&self, name: &str, source: &mut Source) -> Result<()> {
        let gitlab = &mut source.gitlab;
        if !gitlab.owner.is_empty() && !gitlab.repo.is_empty() {
            return Ok(());
        }
        let (owner, repo) = split_owner_repo(name).ok_or_else(|| {
            Error::tool_resolution_with_help(
                format!("{name}: gitlab source needs 'owner/repo'"),
                "Name the tool 'owner/repo' or set source.gitlab.owner and source.gitlab.repo",
            )
        })?;
        if gitlab.owner.is_empty() {
            gitlab.owner = owner;
        }
        if gitlab.repo.is_empty() {
            gitlab.repo = repo;
        }
        Ok(())
    }

    fn default_exe_name(&self, name: &str, source: &Source) -> String {
        if source.gitlab.repo.is_empty() {
            base_name(name)
        } else {
            source.gitlab.repo.clone()
        }
    }

    async fn discover_version(&self, source: &Source) -> Result<String> {
        let project = Self::project_url(source)?;
        let token = &source.gitlab.token;

        let tag = if source.gitlab.pre {
            let releases: Vec<Release> = self
                .get(&format!("{project}/releases?per_page=100"), token)
                .await?;
            releases
                .into_iter()
                .max_by_key(|r| r.released_at)
                .map(|r| r.tag_name)
                .ok_or_else(|| {
                    Error::tool_resolution(format!(
                        "{}/{}: no releases found",
                        source.gitlab.owner, source.gitlab.repo
                    ))
                })?
        } else {
            let release: Release = self
                .get(&format!("{project}/releases/permalink/latest"), token)
                .await?;
            release.tag_name
        };

        info!(project = %project, %tag, "Discovered GitLab release");
        Ok(tag)
    }

    async fn select_asset(&self, source: &Source, request: &AssetRequest<'_>) -> Result<String> {
        let project = Self::project_url(source)?;
        let release: Release = self
            .get(
                &format!("{project}/releases/{}", project_id(request.version)),
                &source.gitlab.token,
            )
            .await?;

        let assets: Vec<Asset> = release
            .assets
            .links
            .iter()
            .map(|link| Asset {
                name: link.name.clone(),
                content_type: link.link_type.clone(),
                size: 0,
            })
            .collect();
        let chosen = matcher::select(&assets, request.requirements, request.extensions)?;

        release
            .assets
            .links
            .iter()
            .find(|link| link.name == chosen.name)
            .map(|link| link.download_url().to_string())
            .ok_or_else(|| Error::tool_resolution(format!("asset '{}' vanished", chosen.name)))
    }

    fn download_headers(&self, source: &Source) -> BTreeMap<String, String> {
        let mut headers = BTreeMap::new();
        if !source.gitlab.token.is_empty() {
            headers.insert(TOKEN_HEADER.to_string(), source.gitlab.token.clone());
        }
        headers
    }
}
