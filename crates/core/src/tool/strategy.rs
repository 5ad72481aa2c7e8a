//! Deciding whether a tool needs work.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use tracing::debug;

use crate::cache::CacheItem;
use crate::version::{self, VersionSpec};
use crate::{Error, Result};

/// Installation strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Skip when the executable already exists.
    #[default]
    None,
    /// Skip when the installed version equals the target.
    Sync,
    /// Always install.
    Force,
}

impl FromStr for Strategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "none" => Ok(Self::None),
            "sync" => Ok(Self::Sync),
            "force" => Ok(Self::Force),
            other => Err(Error::configuration(format!(
                "unknown strategy '{other}', expected none, sync or force"
            ))),
        }
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::None => "none",
            Self::Sync => "sync",
            Self::Force => "force",
        })
    }
}

impl Strategy {
    /// Fail with [`Error::AlreadyExists`] when strategy `none` finds `exe`.
    pub fn check_exists(self, exe: &Path) -> Result<()> {
        if self == Self::None && exe.exists() {
            return Err(Error::AlreadyExists { path: exe.into() });
        }
        Ok(())
    }

    /// Fail with [`Error::UpToDate`] when strategy `sync` finds the target
    /// version installed.
    ///
    /// The cached record is consulted first; the binary is probed only when
    /// there is no record.
    pub async fn check_sync(
        self,
        target: &str,
        exe: &Path,
        cached: Option<&CacheItem>,
        spec: &VersionSpec,
    ) -> Result<()> {
        if self != Self::Sync || !exe.exists() {
            return Ok(());
        }

        let installed = match cached {
            Some(item) => Some(item.version.version.clone()),
            None => version::probe(exe, spec).await,
        };

        match installed {
            Some(installed) if version::equal(&installed, target) => {
                Err(Error::UpToDate { version: installed })
            }
            installed => {
                debug!(
                    exe = %exe.display(),
                    ?installed,
                    %target,
                    "Installed version differs from target"
                );
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_check_exists() {
        let dir = TempDir::new().unwrap();
        let exe = dir.path().join("tool");
        assert!(Strategy::None.check_exists(&exe).is_ok());

        std::fs::write(&exe, "").unwrap();
        let err = Strategy::None.check_exists(&exe).unwrap_err();
        assert!(matches!(err, Error::AlreadyExists { .. }));
        assert!(err.is_skip());
        assert!(Strategy::Sync.check_exists(&exe).is_ok());
        assert!(Strategy::Force.check_exists(&exe).is_ok());
    }

    #[tokio::test]
    async fn test_check_sync_uses_cache() {
        let dir = TempDir::new().unwrap();
        let exe = dir.path().join("tool");
        std::fs::write(&exe, "").unwrap();

        let item = CacheItem::new("tool", &exe, "v1.2", &VersionSpec::default());
        let err = Strategy::Sync
            .check_sync("1.2.0", &exe, Some(&item), &VersionSpec::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UpToDate { .. }));

        assert!(
            Strategy::Sync
                .check_sync("1.3.0", &exe, Some(&item), &VersionSpec::default())
                .await
                .is_ok()
        );
        assert!(
            Strategy::Force
                .check_sync("1.2.0", &exe, Some(&item), &VersionSpec::default())
                .await
                .is_ok()
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_check_sync_probes_without_cache() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let exe = dir.path().join("tool");
        std::fs::write(&exe, "#!/bin/sh\necho tool version 2.1.0\n").unwrap();
        std::fs::set_permissions(&exe, std::fs::Permissions::from_mode(0o755)).unwrap();

        let err = Strategy::Sync
            .check_sync("v2.1.0", &exe, None, &VersionSpec::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UpToDate { version } if version == "2.1.0"));
    }

    #[tokio::test]
    async fn test_check_sync_missing_exe() {
        let dir = TempDir::new().unwrap();
        assert!(
            Strategy::Sync
                .check_sync("1.0.0", &dir.path().join("nope"), None, &VersionSpec::default())
                .await
                .is_ok()
        );
    }

    #[test]
    fn test_parse() {
        assert_eq!("SYNC".parse::<Strategy>().unwrap(), Strategy::Sync);
        assert!("upgrade".parse::<Strategy>().is_err());
    }
}
