//! GitHub releases source provider for godyl.
//!
//! Resolves `owner/repo` tools against the GitHub REST API:
//! - the latest release, or the newest pre-release when `pre` is set
//! - a redirect-based fallback when the API is rate limited
//! - asset selection over the release's asset list

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use godyl_core::matcher::{self, Asset};
use godyl_core::sources::{
    AssetRequest, Source, SourceProvider, SourceType, base_name, split_owner_repo,
};
use godyl_core::{Error, Result};
use reqwest::header::{ACCEPT, AUTHORIZATION, LOCATION};
use reqwest::{Client, Response, StatusCode, redirect};
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Public GitHub REST API.
pub const API_BASE: &str = "https://api.github.com";
/// Public GitHub web host, used for the redirect fallback.
pub const WEB_BASE: &str = "https://github.com";

/// GitHub release metadata from the API.
#[derive(Debug, Deserialize)]
struct Release {
    tag_name: String,
    #[serde(default)]
    published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    assets: Vec<ReleaseAsset>,
}

/// GitHub release asset.
#[derive(Debug, Deserialize)]
struct ReleaseAsset {
    name: String,
    browser_download_url: String,
    #[serde(default)]
    content_type: String,
    #[serde(default)]
    size: u64,
}

/// Source provider for GitHub releases.
pub struct GithubProvider {
    client: Client,
    /// Client that reports redirects instead of following them.
    head_client: Client,
    api_base: String,
    web_base: String,
}

impl GithubProvider {
    /// Provider against the public GitHub instance.
    pub fn new() -> Result<Self> {
        Self::with_base(API_BASE, WEB_BASE)
    }

    /// Provider against custom API and web hosts.
    pub fn with_base(api_base: impl Into<String>, web_base: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("godyl/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::configuration(format!("failed to build HTTP client: {e}")))?;
        let head_client = Client::builder()
            .user_agent(concat!("godyl/", env!("CARGO_PKG_VERSION")))
            .redirect(redirect::Policy::none())
            .build()
            .map_err(|e| Error::configuration(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            head_client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            web_base: web_base.into().trim_end_matches('/').to_string(),
        })
    }

    fn repo(source: &Source) -> Result<(&str, &str)> {
        let github = &source.github;
        if github.owner.is_empty() || github.repo.is_empty() {
            return Err(Error::configuration(
                "github source requires an owner and a repo",
            ));
        }
        Ok((&github.owner, &github.repo))
    }

    async fn get(&self, url: &str, token: &str) -> Result<Response> {
        debug!(%url, "GitHub API request");
        let mut request = self
            .client
            .get(url)
            .header(ACCEPT, "application/vnd.github+json");
        if !token.is_empty() {
            request = request.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        request
            .send()
            .await
            .map_err(|e| Error::http(url, e.to_string()))
    }

    async fn release(&self, url: &str, token: &str) -> Result<Release> {
        let response = self.get(url, token).await?;
        let response = check(url, response)?;
        response
            .json()
            .await
            .map_err(|e| Error::http(url, format!("invalid release JSON: {e}")))
    }

    async fn latest(&self, owner: &str, repo: &str, token: &str) -> Result<String> {
        let url = format!("{}/repos/{owner}/{repo}/releases/latest", self.api_base);
        let response = self.get(&url, token).await?;

        match response.status() {
            StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS => {
                warn!(
                    %owner,
                    %repo,
                    status = %response.status(),
                    "GitHub API rate limited, using release redirect"
                );
                self.latest_from_redirect(owner, repo).await
            }
            _ => {
                let release: Release = check(&url, response)?
                    .json()
                    .await
                    .map_err(|e| Error::http(&url, format!("invalid release JSON: {e}")))?;
                Ok(release.tag_name)
            }
        }
    }

    /// Read the latest tag from the web redirect, which is not rate limited.
    async fn latest_from_redirect(&self, owner: &str, repo: &str) -> Result<String> {
        let url = format!("{}/{owner}/{repo}/releases/latest", self.web_base);
        let response = self
            .head_client
            .head(&url)
            .send()
            .await
            .map_err(|e| Error::http(&url, e.to_string()))?;

        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                Error::tool_resolution(format!(
                    "{owner}/{repo}: no redirect from {url} (HTTP {})",
                    response.status()
                ))
            })?;

        tag_from_location(location).ok_or_else(|| {
            Error::tool_resolution(format!(
                "{owner}/{repo}: no release tag in redirect to {location}"
            ))
        })
    }

    async fn newest_prerelease(&self, owner: &str, repo: &str, token: &str) -> Result<String> {
        let url = format!("{}/repos/{owner}/{repo}/releases?per_page=100", self.api_base);
        let response = check(&url, self.get(&url, token).await?)?;
        let releases: Vec<Release> = response
            .json()
            .await
            .map_err(|e| Error::http(&url, format!("invalid release list JSON: {e}")))?;

        releases
            .into_iter()
            .max_by_key(|r| r.published_at)
            .map(|r| r.tag_name)
            .ok_or_else(|| Error::tool_resolution(format!("{owner}/{repo}: no releases found")))
    }
}

/// Map non-success statuses to errors.
fn check(url: &str, response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::NOT_FOUND {
        return Err(Error::tool_resolution(format!("not found: {url}")));
    }
    Err(Error::http(url, format!("HTTP {status}")))
}

/// `.../releases/tag/v1.2.3` ⇒ `v1.2.3`.
fn tag_from_location(location: &str) -> Option<String> {
    let (_, tag) = location.trim_end_matches('/').rsplit_once("/tag/")?;
    (!tag.is_empty()).then(|| tag.to_string())
}

#[async_trait]
impl SourceProvider for GithubProvider {
    fn source_type(&self) -> SourceType {
        SourceType::Github
    }

    fn description(&self) -> &'static str {
        "Install tools from GitHub releases"
    }

    fn initialize(&self, name: &str, source: &mut Source) -> Result<()> {
        let github = &mut source.github;
        if !github.owner.is_empty() && !github.repo.is_empty() {
            return Ok(());
        }
        let (owner, repo) = split_owner_repo(name).ok_or_else(|| {
            Error::tool_resolution_with_help(
                format!("{name}: github source needs 'owner/repo'"),
                "Name the tool 'owner/repo' or set source.github.owner and source.github.repo",
            )
        })?;
        if github.owner.is_empty() {
            github.owner = owner;
        }
        if github.repo.is_empty() {
            github.repo = repo;
        }
        Ok(())
    }

    fn default_exe_name(&self, name: &str, source: &Source) -> String {
        if source.github.repo.is_empty() {
            base_name(name)
        } else {
            source.github.repo.clone()
        }
    }

    async fn discover_version(&self, source: &Source) -> Result<String> {
        let (owner, repo) = Self::repo(source)?;
        let token = &source.github.token;
        let tag = if source.github.pre {
            self.newest_prerelease(owner, repo, token).await?
        } else {
            self.latest(owner, repo, token).await?
        };
        info!(%owner, %repo, %tag, "Discovered GitHub release");
        Ok(tag)
    }

    async fn select_asset(&self, source: &Source, request: &AssetRequest<'_>) -> Result<String> {
        let (owner, repo) = Self::repo(source)?;
        let url = format!(
            "{}/repos/{owner}/{repo}/releases/tags/{}",
            self.api_base, request.version
        );
        let release = self.release(&url, &source.github.token).await?;

        let assets: Vec<Asset> = release
            .assets
            .iter()
            .map(|a| Asset {
                name: a.name.clone(),
                content_type: a.content_type.clone(),
                size: a.size,
            })
            .collect();
        let chosen = matcher::select(&assets, request.requirements, request.extensions)?;

        release
            .assets
            .into_iter()
            .find(|a| a.name == chosen.name)
            .map(|a| a.browser_download_url)
            .ok_or_else(|| Error::tool_resolution(format!("asset '{}' vanished", chosen.name)))
    }

    fn download_headers(&self, source: &Source) -> BTreeMap<String, String> {
        let mut headers = BTreeMap::new();
        if !source.github.token.is_empty() {
            headers.insert(
                AUTHORIZATION.to_string(),
                format!("Bearer {}", source.github.token),
            );
        }
        headers
    }
}
