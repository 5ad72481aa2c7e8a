//! Filesystem helpers for placing executables.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::{Error, Result};

/// How an alias ended up on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    Symlink,
    Hardlink,
    Copy,
}

/// Link `alias` to `target`, falling back from symlink to hard link to copy.
///
/// Symlinks are relative when both paths share a directory. An existing
/// file at `alias` is replaced.
pub fn link_or_copy(target: &Path, alias: &Path) -> Result<LinkKind> {
    if alias.symlink_metadata().is_ok() {
        fs::remove_file(alias).map_err(|e| Error::io(e, alias, "remove"))?;
    }

    let link_target = match (target.parent(), alias.parent(), target.file_name()) {
        (Some(a), Some(b), Some(name)) if a == b => PathBuf::from(name),
        _ => target.to_path_buf(),
    };

    if symlink(&link_target, alias).is_ok() {
        return Ok(LinkKind::Symlink);
    }
    if fs::hard_link(target, alias).is_ok() {
        return Ok(LinkKind::Hardlink);
    }
    fs::copy(target, alias).map_err(|e| Error::io(e, alias, "copy"))?;
    Ok(LinkKind::Copy)
}

#[cfg(unix)]
fn symlink(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn symlink(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::windows::fs::symlink_file(target, link)
}

#[cfg(not(any(unix, windows)))]
fn symlink(_target: &Path, _link: &Path) -> std::io::Result<()> {
    Err(std::io::Error::from(std::io::ErrorKind::Unsupported))
}

/// Mark a file executable (0755 on unix; no-op elsewhere).
pub fn make_executable(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = fs::metadata(path)
            .map_err(|e| Error::io(e, path, "stat"))?
            .permissions();
        perms.set_mode(0o755);
        fs::set_permissions(path, perms).map_err(|e| Error::io(e, path, "chmod"))?;
    }
    #[cfg(not(unix))]
    let _ = path;
    Ok(())
}

/// Copy `src` to `dst`, replacing `dst`, and mark it executable.
pub fn install_file(src: &Path, dst: &Path) -> Result<()> {
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::io(e, parent, "create"))?;
    }
    if dst.symlink_metadata().is_ok() {
        fs::remove_file(dst).map_err(|e| Error::io(e, dst, "remove"))?;
    }
    fs::copy(src, dst).map_err(|e| Error::io(e, dst, "copy"))?;
    make_executable(dst)?;
    debug!(from = %src.display(), to = %dst.display(), "Installed file");
    Ok(())
}

/// If `dir` holds exactly one directory and no files, return that directory.
pub fn single_subdir(dir: &Path) -> Result<Option<PathBuf>> {
    let mut only = None;
    for entry in fs::read_dir(dir).map_err(|e| Error::io(e, dir, "read"))? {
        let entry = entry.map_err(|e| Error::io(e, dir, "read"))?;
        let is_dir = entry
            .file_type()
            .map_err(|e| Error::io(e, entry.path(), "stat"))?
            .is_dir();
        if !is_dir || only.is_some() {
            return Ok(None);
        }
        only = Some(entry.path());
    }
    Ok(only)
}

/// Move `src` to `dst`, copying across filesystems when rename fails.
pub fn move_file(src: &Path, dst: &Path) -> Result<()> {
    if fs::rename(src, dst).is_ok() {
        return Ok(());
    }
    fs::copy(src, dst).map_err(|e| Error::io(e, dst, "copy"))?;
    fs::remove_file(src).map_err(|e| Error::io(e, src, "remove"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_link_or_copy_replaces_existing() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("tool");
        let alias = dir.path().join("t");
        fs::write(&target, "bin").unwrap();
        fs::write(&alias, "old").unwrap();

        let kind = link_or_copy(&target, &alias).unwrap();
        assert_eq!(fs::read_to_string(&alias).unwrap(), "bin");
        #[cfg(unix)]
        {
            assert_eq!(kind, LinkKind::Symlink);
            assert_eq!(fs::read_link(&alias).unwrap(), PathBuf::from("tool"));
        }
        let _ = kind;
    }

    #[test]
    fn test_single_subdir() {
        let dir = TempDir::new().unwrap();
        assert_eq!(single_subdir(dir.path()).unwrap(), None);

        let sub = dir.path().join("tool-1.0");
        fs::create_dir(&sub).unwrap();
        assert_eq!(single_subdir(dir.path()).unwrap(), Some(sub.clone()));

        fs::write(dir.path().join("README"), "").unwrap();
        assert_eq!(single_subdir(dir.path()).unwrap(), None);
    }

    #[test]
    fn test_install_file_is_executable() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src");
        let dst = dir.path().join("out/bin/tool");
        fs::write(&src, "x").unwrap();
        install_file(&src, &dst).unwrap();
        assert!(dst.exists());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&dst).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o755);
        }
    }
}
