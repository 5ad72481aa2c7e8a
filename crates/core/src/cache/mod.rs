//! Persistent record of installed tools.
//!
//! Two backends implement [`CacheBackend`]: a JSON file ([`FileCache`]) and
//! an SQLite database ([`SqliteCache`]). Both are safe to share between the
//! processor's workers behind an `Arc`.

mod file;
mod sqlite;

pub use file::FileCache;
pub use sqlite::SqliteCache;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info};

use crate::version::{self, VersionSpec};
use crate::{Error, Result};

/// Installed version and the probe settings used to read it back.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledVersion {
    pub version: String,
    #[serde(default)]
    pub commands: Vec<String>,
    #[serde(default)]
    pub patterns: Vec<String>,
}

impl InstalledVersion {
    /// Probe settings for re-reading the version.
    #[must_use]
    pub fn probe_spec(&self) -> VersionSpec {
        VersionSpec {
            requested: String::new(),
            commands: self.commands.clone().into(),
            patterns: self.patterns.clone().into(),
        }
    }
}

/// One installed tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheItem {
    /// Tool name plus output directory.
    pub id: String,
    pub name: String,
    /// Installed executable.
    pub path: PathBuf,
    pub version: InstalledVersion,
    #[serde(rename = "time")]
    pub updated: DateTime<Utc>,
}

impl CacheItem {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        path: impl Into<PathBuf>,
        version: impl Into<String>,
        spec: &VersionSpec,
    ) -> Self {
        let name = name.into();
        let path = path.into();
        let output = path.parent().unwrap_or_else(|| Path::new(""));
        Self {
            id: cache_id(&name, output),
            name,
            version: InstalledVersion {
                version: version.into(),
                commands: spec.commands.to_vec(),
                patterns: spec.patterns.to_vec(),
            },
            path,
            updated: Utc::now(),
        }
    }
}

/// Cache key for a tool installed into `output`.
///
/// `output` is cleaned lexically, so `bin`, `bin/` and `./bin` share a key.
#[must_use]
pub fn cache_id(name: &str, output: &Path) -> String {
    format!("{name}@{}", crate::paths::clean(output).display())
}

/// Storage for [`CacheItem`]s.
pub trait CacheBackend: Send + Sync + std::fmt::Debug {
    /// Look up one item by id.
    fn get(&self, id: &str) -> Result<Option<CacheItem>>;

    /// Every stored item.
    fn get_all(&self) -> Result<Vec<CacheItem>>;

    /// Insert or replace an item.
    fn save(&self, item: CacheItem) -> Result<()>;

    /// Remove an item; returns whether it existed.
    fn delete(&self, id: &str) -> Result<bool>;

    /// Flush and release the backend.
    fn close(&self) -> Result<()>;
}

/// Available cache backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheType {
    #[default]
    File,
    Sqlite,
}

impl CacheType {
    /// File name of the backing store inside the cache directory.
    #[must_use]
    pub const fn file_name(self) -> &'static str {
        match self {
            Self::File => "godyl.json",
            Self::Sqlite => "godyl.db",
        }
    }
}

impl FromStr for CacheType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "file" | "json" => Ok(Self::File),
            "sqlite" | "db" => Ok(Self::Sqlite),
            other => Err(Error::configuration(format!(
                "unknown cache type '{other}', expected 'file' or 'sqlite'"
            ))),
        }
    }
}

impl std::fmt::Display for CacheType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::File => write!(f, "file"),
            Self::Sqlite => write!(f, "sqlite"),
        }
    }
}

/// Open the backend of `kind` inside `dir`, creating the directory.
pub fn open(kind: CacheType, dir: &Path) -> Result<Arc<dyn CacheBackend>> {
    std::fs::create_dir_all(dir).map_err(|e| Error::io(e, dir, "create"))?;
    let path = dir.join(kind.file_name());
    debug!(cache = %kind, path = %path.display(), "Opening cache");
    Ok(match kind {
        CacheType::File => Arc::new(FileCache::open(&path)?),
        CacheType::Sqlite => Arc::new(SqliteCache::open(&path)?),
    })
}

/// Outcome of [`clean`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CleanReport {
    /// Ids whose executable no longer exists.
    pub removed: Vec<String>,
    /// Ids whose recorded version was refreshed.
    pub updated: Vec<String>,
}

/// Drop entries whose executable is gone and refresh versions of the rest.
pub async fn clean(cache: &dyn CacheBackend) -> Result<CleanReport> {
    let mut report = CleanReport::default();

    for mut item in cache.get_all()? {
        if !item.path.exists() {
            cache.delete(&item.id)?;
            info!(tool = %item.name, path = %item.path.display(), "Removed stale cache entry");
            report.removed.push(item.id);
            continue;
        }

        let Some(current) = version::probe(&item.path, &item.version.probe_spec()).await else {
            continue;
        };
        if current != item.version.version && !version::equal(&current, &item.version.version) {
            info!(
                tool = %item.name,
                cached = %item.version.version,
                installed = %current,
                "Refreshed cached version"
            );
            item.version.version = current;
            item.updated = Utc::now();
            report.updated.push(item.id.clone());
            cache.save(item)?;
        }
    }

    Ok(report)
}
