//! Centralized path management for godyl directories.
//!
//! | Platform | Config Dir | Cache Dir |
//! |----------|------------|-----------|
//! | **macOS** | `~/Library/Application Support/godyl` | `~/Library/Caches/godyl` |
//! | **Linux** | `~/.config/godyl` (XDG_CONFIG_HOME) | `~/.cache/godyl` (XDG_CACHE_HOME) |
//! | **Windows** | `%APPDATA%\godyl` | `%LOCALAPPDATA%\godyl` |
//!
//! Environment variable overrides:
//! - `GODYL_CONFIG_DIR` - Override config directory
//! - `GODYL_CACHE_DIR` - Override cache directory

use crate::{Error, Result};
use std::path::{Component, Path, PathBuf};

/// Get the configuration directory for godyl.
///
/// Resolution order:
/// 1. `GODYL_CONFIG_DIR` environment variable
/// 2. Platform config directory + `/godyl`
///
/// # Errors
///
/// Returns an error if the config directory cannot be determined.
pub fn config_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("GODYL_CONFIG_DIR")
        && !dir.is_empty()
    {
        return Ok(PathBuf::from(dir));
    }

    let base = dirs::config_dir()
        .ok_or_else(|| Error::configuration("Could not determine config directory"))?;

    Ok(base.join("godyl"))
}

/// Get the cache directory for godyl.
///
/// Holds the installed-tool cache (`godyl.json` or `godyl.db`) and the
/// bootstrapped Go toolchain.
///
/// Resolution order:
/// 1. `GODYL_CACHE_DIR` environment variable
/// 2. Platform cache directory + `/godyl`
///
/// # Errors
///
/// Returns an error if the cache directory cannot be determined.
pub fn cache_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("GODYL_CACHE_DIR")
        && !dir.is_empty()
    {
        return Ok(PathBuf::from(dir));
    }

    let base = dirs::cache_dir()
        .ok_or_else(|| Error::configuration("Could not determine cache directory"))?;

    Ok(base.join("godyl"))
}

/// Default location of the optional YAML config file.
pub fn config_file() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.yml"))
}

/// Expand a leading `~` to the user's home directory.
#[must_use]
pub fn expand_home(path: &str) -> PathBuf {
    if path == "~" {
        return dirs::home_dir().unwrap_or_else(|| PathBuf::from(path));
    }
    if let Some(rest) = path.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(rest);
    }
    PathBuf::from(path)
}

/// Lexically normalise a path: drop `.` segments and trailing separators,
/// fold `..` into the preceding segment. The filesystem is not consulted.
#[must_use]
pub fn clean(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            other => out.push(other),
        }
    }
    if out.as_os_str().is_empty() && !path.as_os_str().is_empty() {
        out.push(".");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_dir_default() {
        temp_env::with_var_unset("GODYL_CONFIG_DIR", || {
            let dir = config_dir().expect("config_dir should succeed");
            assert!(dir.ends_with("godyl"), "Should end with godyl: {:?}", dir);
        });
    }

    #[test]
    fn test_config_dir_override() {
        let test_dir = "/tmp/godyl-test-config";
        temp_env::with_var("GODYL_CONFIG_DIR", Some(test_dir), || {
            let dir = config_dir().expect("config_dir should succeed");
            assert_eq!(dir, PathBuf::from(test_dir));
            assert_eq!(
                config_file().expect("config_file should succeed"),
                PathBuf::from(test_dir).join("config.yml")
            );
        });
    }

    #[test]
    fn test_cache_dir_default() {
        temp_env::with_var_unset("GODYL_CACHE_DIR", || {
            let dir = cache_dir().expect("cache_dir should succeed");
            assert!(dir.ends_with("godyl"), "Should end with godyl: {:?}", dir);
        });
    }

    #[test]
    fn test_cache_dir_override() {
        let test_dir = "/tmp/godyl-test-cache";
        temp_env::with_var("GODYL_CACHE_DIR", Some(test_dir), || {
            let dir = cache_dir().expect("cache_dir should succeed");
            assert_eq!(dir, PathBuf::from(test_dir));
        });
    }

    #[test]
    fn test_empty_override_is_ignored() {
        temp_env::with_var("GODYL_CACHE_DIR", Some(""), || {
            let dir = cache_dir().expect("cache_dir should succeed");
            assert!(dir.ends_with("godyl"));
        });
    }

    #[test]
    fn test_expand_home() {
        assert_eq!(expand_home("/opt/bin"), PathBuf::from("/opt/bin"));
        assert_eq!(expand_home("relative/bin"), PathBuf::from("relative/bin"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_home("~/.local/bin"), home.join(".local/bin"));
            assert_eq!(expand_home("~"), home);
        }
    }

    #[test]
    fn test_clean() {
        assert_eq!(clean(Path::new("/opt/bin/")), PathBuf::from("/opt/bin"));
        assert_eq!(clean(Path::new("/opt/./bin//")), PathBuf::from("/opt/bin"));
        assert_eq!(clean(Path::new("/opt/lib/../bin")), PathBuf::from("/opt/bin"));
        assert_eq!(clean(Path::new("/../bin")), PathBuf::from("/bin"));
        assert_eq!(clean(Path::new("../bin/")), PathBuf::from("../bin"));
        assert_eq!(clean(Path::new("./")), PathBuf::from("."));
        assert_eq!(clean(Path::new("")), PathBuf::new());
    }
}
