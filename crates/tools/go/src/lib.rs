//! `go install` source provider for godyl.
//!
//! Versions come from the Go module proxy. Installation delegates to a
//! local `go` toolchain; when none is on `PATH`, the latest stable release
//! is downloaded from go.dev into the godyl cache directory and reused.

use async_trait::async_trait;
use godyl_core::download::{self, ArchiveKind, DownloadOptions};
use godyl_core::install::{self, InstallData, InstallOutcome};
use godyl_core::sources::{
    AssetRequest, Source, SourceProvider, SourceType, base_name, split_owner_repo,
};
use godyl_core::{Error, Result, paths};
use reqwest::Client;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Public Go module proxy.
pub const PROXY: &str = "https://proxy.golang.org";
/// Go release downloads; `?mode=json` lists releases.
pub const DOWNLOADS: &str = "https://go.dev/dl";

#[derive(Debug, Deserialize)]
struct ModuleInfo {
    #[serde(rename = "Version")]
    version: String,
}

#[derive(Debug, Deserialize)]
struct GoRelease {
    version: String,
    #[serde(default)]
    stable: bool,
    #[serde(default)]
    files: Vec<GoFile>,
}

#[derive(Debug, Deserialize)]
struct GoFile {
    filename: String,
    os: String,
    arch: String,
    #[serde(default)]
    sha256: String,
    #[serde(default)]
    kind: String,
}

/// Source provider building tools with `go install`.
pub struct GoProvider {
    client: Client,
    proxy: String,
    downloads: String,
    toolchain_dir: PathBuf,
    /// Located `go` binary; the lock serializes discovery and bootstrap.
    go: Mutex<Option<PathBuf>>,
}

impl GoProvider {
    /// Provider using the public proxy, bootstrapping into `<cache dir>/go`.
    pub fn new() -> Result<Self> {
        Self::with_endpoints(PROXY, DOWNLOADS, paths::cache_dir()?.join("go"))
    }

    pub fn with_endpoints(
        proxy: impl Into<String>,
        downloads: impl Into<String>,
        toolchain_dir: impl Into<PathBuf>,
    ) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("godyl/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::configuration(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            proxy: proxy.into().trim_end_matches('/').to_string(),
            downloads: downloads.into().trim_end_matches('/').to_string(),
            toolchain_dir: toolchain_dir.into(),
            go: Mutex::new(None),
        })
    }

    /// Use `go` instead of searching for one.
    #[must_use]
    pub fn with_go(self, go: impl Into<PathBuf>) -> Self {
        Self {
            go: Mutex::new(Some(go.into())),
            ..self
        }
    }

    /// Find `go`, bootstrapping a toolchain when there is none.
    async fn locate_go(&self) -> Result<PathBuf> {
        let mut guard = self.go.lock().await;
        if let Some(go) = guard.as_ref() {
            return Ok(go.clone());
        }

        let go = if let Ok(found) = which::which("go") {
            debug!(go = %found.display(), "Using go from PATH");
            found
        } else {
            let cached = self.toolchain_binary();
            if cached.is_file() {
                debug!(go = %cached.display(), "Using cached go toolchain");
                cached
            } else {
                self.bootstrap().await?
            }
        };
        *guard = Some(go.clone());
        Ok(go)
    }

    fn toolchain_binary(&self) -> PathBuf {
        self.toolchain_dir
            .join("go")
            .join("bin")
            .join(format!("go{}", std::env::consts::EXE_SUFFIX))
    }

    /// Download and unpack the latest stable toolchain for the host.
    async fn bootstrap(&self) -> Result<PathBuf> {
        let index = format!("{}/?mode=json", self.downloads);
        let releases: Vec<GoRelease> = self
            .client
            .get(&index)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| Error::http(&index, e.to_string()))?
            .json()
            .await
            .map_err(|e| Error::http(&index, format!("invalid release index: {e}")))?;

        let (os, arch) = host_platform();
        let (release, file) = releases
            .iter()
            .filter(|r| r.stable)
            .find_map(|r| {
                r.files
                    .iter()
                    .find(|f| f.os == os && f.arch == arch && f.kind == "archive")
                    .map(|f| (r, f))
            })
            .ok_or_else(|| {
                Error::install(format!("no stable go toolchain archive for {os}/{arch}"))
            })?;

        info!(version = %release.version, file = %file.filename, "Bootstrapping go toolchain");

        let work = tempfile::Builder::new()
            .prefix("godyl-go-")
            .tempdir()
            .map_err(|e| Error::io_without_path(e, "create temp dir"))?;
        let url = format!("{}/{}", self.downloads, file.filename);
        let options = DownloadOptions {
            label: format!("go {}", release.version),
            checksum: (!file.sha256.is_empty()).then(|| file.sha256.clone()),
            ..DownloadOptions::default()
        };
        let archive = download::fetch(&url, work.path(), &options).await?;
        let kind = ArchiveKind::detect(&file.filename).ok_or_else(|| {
            Error::install(format!("unsupported go toolchain archive {}", file.filename))
        })?;

        install::remove_dir(&self.toolchain_dir)?;
        let dest = self.toolchain_dir.clone();
        tokio::task::spawn_blocking(move || download::unpack(&archive, kind, &dest))
            .await
            .map_err(|e| Error::install(format!("toolchain extraction panicked: {e}")))??;

        let go = self.toolchain_binary();
        if !go.is_file() {
            return Err(Error::install(format!(
                "go toolchain unpacked but {} is missing",
                go.display()
            )));
        }
        Ok(go)
    }

    async fn go_install(
        &self,
        go: &Path,
        target: &str,
        gobin: &Path,
        data: &InstallData,
    ) -> Result<std::result::Result<String, String>> {
        debug!(%target, "go install");
        let output = Command::new(go)
            .arg("install")
            .arg(target)
            .envs(&data.env)
            .env("GOBIN", gobin)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| Error::io(e, go, "execute"))?;

        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&output.stderr));
        let text = text.trim().to_string();
        Ok(if output.status.success() {
            Ok(text)
        } else {
            Err(text)
        })
    }
}

/// Module path for the source.
fn module(source: &Source) -> Result<String> {
    if !source.go.command.is_empty() {
        let command = &source.go.command;
        return Ok(command
            .split_once('@')
            .map_or(command.as_str(), |(path, _)| path)
            .to_string());
    }
    let github = &source.github;
    if github.owner.is_empty() || github.repo.is_empty() {
        return Err(Error::tool_resolution(
            "go source requires 'owner/repo' or source.go.command",
        ));
    }
    Ok(format!("github.com/{}/{}", github.owner, github.repo))
}

/// Module proxy case-escaping: `A` becomes `!a`.
fn escape_module(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    for c in path.chars() {
        if c.is_ascii_uppercase() {
            out.push('!');
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// `go install` targets in the order they are tried.
fn targets(module: &str, version: &str, source: &Source) -> Vec<String> {
    let version = if version.is_empty() { "latest" } else { version };
    if !source.go.command.is_empty() {
        return vec![if source.go.command.contains('@') {
            source.go.command.clone()
        } else {
            format!("{module}@{version}")
        }];
    }
    let repo = &source.github.repo;
    vec![
        format!("{module}@{version}"),
        format!("{module}/cmd/{repo}@{version}"),
        format!("{module}/cmd@{version}"),
    ]
}

/// Name `go install` gives the binary built from `target`: the last path
/// element, skipping a trailing major-version suffix such as `/v2`.
fn binary_name(target: &str) -> &str {
    let path = target.split_once('@').map_or(target, |(path, _)| path);
    let mut elements = path.rsplit('/');
    let last = elements.next().unwrap_or(path);
    let is_major = last.len() > 1
        && last.starts_with('v')
        && last[1..].bytes().all(|b| b.is_ascii_digit());
    match elements.next() {
        Some(previous) if is_major => previous,
        _ => last,
    }
}

/// Exe patterns for a finished `go install`, extended with the binary name
/// the target produces.
fn patterns_for(target: &str, data: &InstallData) -> Vec<String> {
    let mut patterns = data.patterns_or_default();
    let built = format!(
        "^{}{}$",
        regex::escape(binary_name(target)),
        regex::escape(&data.extension)
    );
    if !patterns.contains(&built) {
        patterns.push(built);
    }
    patterns
}

/// Host platform in go.dev naming.
fn host_platform() -> (&'static str, &'static str) {
    let os = match std::env::consts::OS {
        "macos" => "darwin",
        other => other,
    };
    let arch = match std::env::consts::ARCH {
        "x86_64" => "amd64",
        "aarch64" => "arm64",
        "x86" => "386",
        "arm" => "armv6l",
        "powerpc64" => "ppc64le",
        other => other,
    };
    (os, arch)
}

#[async_trait]
impl SourceProvider for GoProvider {
    fn source_type(&self) -> SourceType {
        SourceType::Go
    }

    fn description(&self) -> &'static str {
        "Build tools with go install"
    }

    fn initialize(&self, name: &str, source: &mut Source) -> Result<()> {
        if !source.github.owner.is_empty() && !source.github.repo.is_empty() {
            return Ok(());
        }
        match split_owner_repo(name) {
            Some((owner, repo)) => {
                if source.github.owner.is_empty() {
                    source.github.owner = owner;
                }
                if source.github.repo.is_empty() {
                    source.github.repo = repo;
                }
                Ok(())
            }
            None if !source.go.command.is_empty() => Ok(()),
            None => Err(Error::tool_resolution_with_help(
                format!("{name}: go source needs 'owner/repo'"),
                "Name the tool 'owner/repo' or set source.go.command",
            )),
        }
    }

    fn default_exe_name(&self, name: &str, source: &Source) -> String {
        if !source.go.command.is_empty() {
            return module(source).map_or_else(|_| base_name(name), |m| base_name(&m));
        }
        if source.github.repo.is_empty() {
            base_name(name)
        } else {
            source.github.repo.clone()
        }
    }

    async fn discover_version(&self, source: &Source) -> Result<String> {
        let module = module(source)?;
        let url = format!("{}/{}/@latest", self.proxy, escape_module(&module));
        debug!(%url, "Querying module proxy");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::http(&url, e.to_string()))?;
        if !response.status().is_success() {
            return Err(Error::tool_resolution(format!(
                "module proxy has no version for {module} (HTTP {})",
                response.status()
            )));
        }
        let info: ModuleInfo = response
            .json()
            .await
            .map_err(|e| Error::http(&url, format!("invalid module info: {e}")))?;
        Ok(info.version)
    }

    async fn select_asset(&self, source: &Source, _request: &AssetRequest<'_>) -> Result<String> {
        module(source)
    }

    async fn install(&self, source: &Source, data: &InstallData) -> Result<InstallOutcome> {
        let go = self.locate_go().await?;
        let gobin = tempfile::Builder::new()
            .prefix("godyl-gobin-")
            .tempdir()
            .map_err(|e| Error::io_without_path(e, "create temp dir"))?;

        let mut failures = Vec::new();
        for target in targets(&data.path, &data.version, source) {
            match self.go_install(&go, &target, gobin.path(), data).await? {
                Ok(output) => {
                    info!(tool = %data.name, %target, "go install succeeded");
                    let gobin_root = gobin.path().to_path_buf();
                    let mut data_owned = data.clone();
                    data_owned.patterns = patterns_for(&target, data);
                    let found = tokio::task::spawn_blocking(move || {
                        install::place_from_dir(&gobin_root, &data_owned)
                    })
                    .await
                    .map_err(|e| Error::install(format!("placement panicked: {e}")))??;
                    return Ok(InstallOutcome {
                        output,
                        found: Some(found),
                    });
                }
                Err(output) => {
                    warn!(tool = %data.name, %target, "go install failed");
                    failures.push(format!("{target}: {output}"));
                }
            }
        }

        Err(Error::install(format!(
            "go install failed for every candidate:\n{}",
            failures.join("\n")
        )))
    }
}
