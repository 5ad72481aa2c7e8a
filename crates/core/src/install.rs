//! Downloading an asset and placing its executable.
//!
//! [`install`] fetches `path` into a temporary directory, unpacks archives
//! by suffix and then either extracts everything into the output directory
//! ([`Mode::Extract`]) or searches the unpacked tree for the executable and
//! copies it into place with its aliases ([`Mode::Find`]).

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::download::{self, ArchiveKind, DownloadOptions, NoProgress, ProgressReporter};
use crate::fsutil;
use crate::{Error, Result};

/// How a downloaded asset is placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Locate the executable inside the asset and copy it to the output.
    #[default]
    Find,
    /// Unpack the whole asset into the output.
    Extract,
}

impl FromStr for Mode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "find" => Ok(Self::Find),
            "extract" => Ok(Self::Extract),
            other => Err(Error::configuration(format!(
                "unknown mode '{other}', expected find or extract"
            ))),
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Find => "find",
            Self::Extract => "extract",
        })
    }
}

/// Everything needed to fetch and place one tool.
#[derive(Clone)]
pub struct InstallData {
    /// Download URL.
    pub path: String,
    pub name: String,
    /// Resolved version, empty for sources without one.
    pub version: String,
    /// Executable file name, including the platform extension.
    pub exe: String,
    /// Regexes locating the executable inside an unpacked asset.
    pub patterns: Vec<String>,
    pub output: PathBuf,
    pub aliases: Vec<String>,
    pub mode: Mode,
    pub env: BTreeMap<String, String>,
    pub headers: BTreeMap<String, String>,
    pub no_verify_ssl: bool,
    pub checksum: Option<String>,
    pub timeout: Duration,
    pub progress: Arc<dyn ProgressReporter>,
    pub cancel: CancellationToken,
    /// Platform executable extension, `.exe` on windows.
    pub extension: String,
}

impl Default for InstallData {
    fn default() -> Self {
        Self {
            path: String::new(),
            name: String::new(),
            version: String::new(),
            exe: String::new(),
            patterns: Vec::new(),
            output: PathBuf::new(),
            aliases: Vec::new(),
            mode: Mode::default(),
            env: BTreeMap::new(),
            headers: BTreeMap::new(),
            no_verify_ssl: false,
            checksum: None,
            timeout: download::DEFAULT_TIMEOUT,
            progress: Arc::new(NoProgress),
            cancel: CancellationToken::new(),
            extension: String::new(),
        }
    }
}

impl std::fmt::Debug for InstallData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstallData")
            .field("path", &self.path)
            .field("name", &self.name)
            .field("version", &self.version)
            .field("exe", &self.exe)
            .field("output", &self.output)
            .field("aliases", &self.aliases)
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

impl InstallData {
    /// Final location of the executable.
    #[must_use]
    pub fn exe_path(&self) -> PathBuf {
        self.output.join(&self.exe)
    }

    #[must_use]
    pub fn download_options(&self) -> DownloadOptions {
        DownloadOptions {
            label: self.name.clone(),
            headers: self.headers.clone(),
            no_verify_ssl: self.no_verify_ssl,
            timeout: self.timeout,
            checksum: self.checksum.clone(),
            progress: Arc::clone(&self.progress),
            cancel: self.cancel.clone(),
        }
    }

    /// Patterns used to find the executable.
    ///
    /// Defaults to the exe name with and without the platform extension.
    #[must_use]
    pub fn patterns_or_default(&self) -> Vec<String> {
        if !self.patterns.is_empty() {
            return self.patterns.clone();
        }
        let mut patterns = vec![format!("^{}$", regex::escape(&self.exe))];
        if !self.extension.is_empty()
            && let Some(stem) = self.exe.strip_suffix(&self.extension)
        {
            patterns.push(format!("^{}$", regex::escape(stem)));
        }
        patterns
    }
}

/// Result of an install.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallOutcome {
    /// Output captured from commands, if any.
    pub output: String,
    /// The placed executable, when one exists.
    pub found: Option<PathBuf>,
}

/// Download `data.path` and place the executable.
pub async fn install(data: &InstallData) -> Result<InstallOutcome> {
    if data.path.is_empty() {
        return Err(Error::validation(format!(
            "{}: no download path resolved",
            data.name
        )));
    }

    let work = tempfile::Builder::new()
        .prefix("godyl-")
        .tempdir()
        .map_err(|e| Error::io_without_path(e, "create temp dir"))?;

    let file = download::fetch(
        &data.path,
        &work.path().join("download"),
        &data.download_options(),
    )
    .await?;

    let owned = data.clone();
    let work_dir = work.path().to_path_buf();
    let found = tokio::task::spawn_blocking(move || place(&file, &work_dir, &owned))
        .await
        .map_err(|e| Error::install(format!("placement task failed: {e}")))??;

    Ok(InstallOutcome {
        output: String::new(),
        found,
    })
}

/// Place a downloaded file according to `data.mode`.
fn place(file: &Path, work: &Path, data: &InstallData) -> Result<Option<PathBuf>> {
    let name = file
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    let kind = ArchiveKind::detect(name);

    match (data.mode, kind) {
        (_, Some(kind)) if kind.is_single_file() => {
            let decompressed = work.join("decompressed");
            download::decompress(file, kind, &decompressed)?;
            install_single(&decompressed, data).map(Some)
        }
        (Mode::Extract, Some(kind)) => {
            download::unpack(file, kind, &data.output)?;
            let exe = data.exe_path();
            Ok(exe.is_file().then_some(exe))
        }
        (Mode::Find, Some(kind)) => {
            let extracted = work.join("extract");
            download::unpack(file, kind, &extracted)?;
            let root = fsutil::single_subdir(&extracted)?.unwrap_or(extracted);
            place_from_dir(&root, data).map(Some)
        }
        (_, None) => install_single(file, data).map(Some),
    }
}

/// Install a bare executable under the configured exe name.
fn install_single(file: &Path, data: &InstallData) -> Result<PathBuf> {
    let exe = data.exe_path();
    fsutil::install_file(file, &exe)?;
    link_aliases(&exe, data)?;
    info!(tool = %data.name, path = %exe.display(), "Installed executable");
    Ok(exe)
}

/// Find the executable under `root` and place it with its aliases.
pub fn place_from_dir(root: &Path, data: &InstallData) -> Result<PathBuf> {
    let source = find_executable(root, &data.patterns_or_default())?.ok_or_else(|| {
        Error::install(format!(
            "executable '{}' not found in {}",
            data.exe,
            root.display()
        ))
    })?;

    let exe = data.exe_path();
    fsutil::install_file(&source, &exe)?;
    link_aliases(&exe, data)?;
    info!(tool = %data.name, path = %exe.display(), "Installed executable");
    Ok(exe)
}

/// First regular file matching the first pattern that matches anything.
///
/// Patterns are regexes tested against the file name and the path
/// relative to `root`.
pub fn find_executable(root: &Path, patterns: &[String]) -> Result<Option<PathBuf>> {
    for pattern in patterns {
        let regex = Regex::new(pattern)
            .map_err(|e| Error::configuration(format!("invalid exe pattern '{pattern}': {e}")))?;

        let hit = WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_map(std::result::Result::ok)
            .filter(|entry| entry.file_type().is_file())
            .find(|entry| {
                let relative = entry
                    .path()
                    .strip_prefix(root)
                    .unwrap_or(entry.path())
                    .to_string_lossy()
                    .replace('\\', "/");
                let file_name = entry.file_name().to_string_lossy();
                regex.is_match(&file_name) || regex.is_match(&relative)
            });

        if let Some(entry) = hit {
            debug!(%pattern, path = %entry.path().display(), "Located executable");
            return Ok(Some(entry.into_path()));
        }
    }
    Ok(None)
}

fn link_aliases(exe: &Path, data: &InstallData) -> Result<()> {
    for alias in &data.aliases {
        if alias.is_empty() || *alias == data.exe {
            continue;
        }
        let link = data.output.join(alias);
        let kind = fsutil::link_or_copy(exe, &link)?;
        debug!(alias = %link.display(), ?kind, "Linked alias");
    }
    Ok(())
}

/// Remove a directory tree, ignoring a missing directory.
pub fn remove_dir(path: &Path) -> Result<()> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::io(e, path, "remove")),
    }
}
