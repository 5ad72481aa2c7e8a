//! Archive extraction.

use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::Path;
use tracing::{debug, info};

use crate::{Error, Result};

/// Archive formats recognised by file suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    Tar,
    TarGz,
    TarBz2,
    TarXz,
    Zip,
    /// A single gzip-compressed file.
    Gz,
    /// A single xz-compressed file.
    Xz,
    /// A single bzip2-compressed file.
    Bz2,
}

impl ArchiveKind {
    /// Detect the format from a file name.
    #[must_use]
    pub fn detect(name: &str) -> Option<Self> {
        let lower = name.to_lowercase();
        let kind = if lower.ends_with(".tar.gz") || lower.ends_with(".tgz") {
            Self::TarGz
        } else if lower.ends_with(".tar.bz2") || lower.ends_with(".tbz2") || lower.ends_with(".tbz")
        {
            Self::TarBz2
        } else if lower.ends_with(".tar.xz") || lower.ends_with(".txz") {
            Self::TarXz
        } else if lower.ends_with(".tar") {
            Self::Tar
        } else if lower.ends_with(".zip") {
            Self::Zip
        } else if lower.ends_with(".gz") {
            Self::Gz
        } else if lower.ends_with(".xz") {
            Self::Xz
        } else if lower.ends_with(".bz2") {
            Self::Bz2
        } else {
            return None;
        };
        Some(kind)
    }

    /// Whether the asset is one compressed file rather than an archive.
    #[must_use]
    pub const fn is_single_file(self) -> bool {
        matches!(self, Self::Gz | Self::Xz | Self::Bz2)
    }

    const fn suffix(self) -> &'static str {
        match self {
            Self::Gz => ".gz",
            Self::Xz => ".xz",
            Self::Bz2 => ".bz2",
            Self::Tar => ".tar",
            Self::TarGz => ".tar.gz",
            Self::TarBz2 => ".tar.bz2",
            Self::TarXz => ".tar.xz",
            Self::Zip => ".zip",
        }
    }
}

/// Extract `archive` into `dest`.
pub fn unpack(archive: &Path, kind: ArchiveKind, dest: &Path) -> Result<()> {
    info!(
        archive = %archive.display(),
        dest = %dest.display(),
        ?kind,
        "Extracting archive"
    );
    fs::create_dir_all(dest).map_err(|e| Error::io(e, dest, "create"))?;

    let open = || -> Result<BufReader<File>> {
        File::open(archive)
            .map(BufReader::new)
            .map_err(|e| Error::io(e, archive, "open"))
    };

    match kind {
        ArchiveKind::Tar => unpack_tar(open()?, dest),
        ArchiveKind::TarGz => unpack_tar(flate2::read::GzDecoder::new(open()?), dest),
        ArchiveKind::TarBz2 => unpack_tar(bzip2::read::BzDecoder::new(open()?), dest),
        ArchiveKind::TarXz => unpack_tar(xz2::read::XzDecoder::new(open()?), dest),
        ArchiveKind::Zip => unpack_zip(archive, dest),
        ArchiveKind::Gz | ArchiveKind::Xz | ArchiveKind::Bz2 => {
            let name = archive
                .file_name()
                .and_then(|n| n.to_str())
                .map_or("download", |n| n.strip_suffix(kind.suffix()).unwrap_or(n));
            decompress(archive, kind, &dest.join(name))
        }
    }
}

/// Decompress a single-file asset into `out`.
pub fn decompress(archive: &Path, kind: ArchiveKind, out: &Path) -> Result<()> {
    let reader = BufReader::new(File::open(archive).map_err(|e| Error::io(e, archive, "open"))?);
    let mut decoder: Box<dyn Read> = match kind {
        ArchiveKind::Gz => Box::new(flate2::read::GzDecoder::new(reader)),
        ArchiveKind::Xz => Box::new(xz2::read::XzDecoder::new(reader)),
        ArchiveKind::Bz2 => Box::new(bzip2::read::BzDecoder::new(reader)),
        other => {
            return Err(Error::install(format!(
                "{} is an archive, not a compressed file",
                other.suffix()
            )));
        }
    };
    let mut file = File::create(out).map_err(|e| Error::io(e, out, "create"))?;
    io::copy(&mut decoder, &mut file).map_err(|e| Error::io(e, out, "write"))?;
    debug!(out = %out.display(), ?kind, "Decompressed single file");
    Ok(())
}

fn unpack_tar<R: Read>(reader: R, dest: &Path) -> Result<()> {
    let mut archive = tar::Archive::new(reader);
    archive.set_preserve_permissions(true);
    archive
        .unpack(dest)
        .map_err(|e| Error::install(format!("failed to extract tar archive: {e}")))?;
    debug!("TAR extraction complete");
    Ok(())
}

fn unpack_zip(path: &Path, dest: &Path) -> Result<()> {
    let file = File::open(path).map_err(|e| Error::io(e, path, "open"))?;
    let mut archive = zip::ZipArchive::new(file)
        .map_err(|e| Error::install(format!("failed to open zip {}: {e}", path.display())))?;

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| Error::install(format!("failed to read zip entry: {e}")))?;
        let Some(relative) = entry.enclosed_name() else {
            debug!("Skipping unsafe path in zip");
            continue;
        };
        let out = dest.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&out).map_err(|e| Error::io(e, &out, "create"))?;
            continue;
        }
        if let Some(parent) = out.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::io(e, parent, "create"))?;
        }
        let mut file = File::create(&out).map_err(|e| Error::io(e, &out, "create"))?;
        io::copy(&mut entry, &mut file).map_err(|e| Error::io(e, &out, "write"))?;

        #[cfg(unix)]
        if let Some(mode) = entry.unix_mode() {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&out, fs::Permissions::from_mode(mode))
                .map_err(|e| Error::io(e, &out, "chmod"))?;
        }
    }

    debug!("ZIP extraction complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_detect() {
        assert_eq!(ArchiveKind::detect("a.tar.gz"), Some(ArchiveKind::TarGz));
        assert_eq!(ArchiveKind::detect("a.TGZ"), Some(ArchiveKind::TarGz));
        assert_eq!(ArchiveKind::detect("a.tar.xz"), Some(ArchiveKind::TarXz));
        assert_eq!(ArchiveKind::detect("a.tar.bz2"), Some(ArchiveKind::TarBz2));
        assert_eq!(ArchiveKind::detect("a.tar"), Some(ArchiveKind::Tar));
        assert_eq!(ArchiveKind::detect("a.zip"), Some(ArchiveKind::Zip));
        assert_eq!(ArchiveKind::detect("a.gz"), Some(ArchiveKind::Gz));
        assert_eq!(ArchiveKind::detect("a.xz"), Some(ArchiveKind::Xz));
        assert_eq!(ArchiveKind::detect("a.bz2"), Some(ArchiveKind::Bz2));
        assert!(ArchiveKind::Xz.is_single_file());
        assert!(!ArchiveKind::TarXz.is_single_file());
        assert_eq!(ArchiveKind::detect("a.exe"), None);
        assert_eq!(ArchiveKind::detect("tool"), None);
    }

    #[test]
    fn test_unpack_tar_gz() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("tool.tar.gz");
        {
            let file = File::create(&archive).unwrap();
            let enc = flate2::write::GzEncoder::new(file, flate2::Compression::default());
            let mut builder = tar::Builder::new(enc);
            let data = b"#!/bin/sh\necho hi\n";
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o755);
            header.set_cksum();
            builder
                .append_data(&mut header, "tool-1.0/bin/tool", &data[..])
                .unwrap();
            builder.into_inner().unwrap().finish().unwrap();
        }

        let out = dir.path().join("out");
        unpack(&archive, ArchiveKind::TarGz, &out).unwrap();
        assert!(out.join("tool-1.0/bin/tool").is_file());
    }

    #[test]
    fn test_unpack_zip() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("tool.zip");
        {
            let file = File::create(&archive).unwrap();
            let mut zip = zip::ZipWriter::new(file);
            zip.start_file("tool.exe", zip::write::SimpleFileOptions::default())
                .unwrap();
            zip.write_all(b"MZ").unwrap();
            zip.finish().unwrap();
        }

        let out = dir.path().join("out");
        unpack(&archive, ArchiveKind::Zip, &out).unwrap();
        assert_eq!(fs::read(out.join("tool.exe")).unwrap(), b"MZ");
    }

    #[test]
    fn test_unpack_single_gz() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("tool.gz");
        {
            let file = File::create(&archive).unwrap();
            let mut enc = flate2::write::GzEncoder::new(file, flate2::Compression::default());
            enc.write_all(b"binary").unwrap();
            enc.finish().unwrap();
        }

        let out = dir.path().join("out");
        unpack(&archive, ArchiveKind::Gz, &out).unwrap();
        assert_eq!(fs::read(out.join("tool")).unwrap(), b"binary");
    }

    #[test]
    fn test_decompress_single_xz() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("tool-linux.xz");
        {
            let file = File::create(&archive).unwrap();
            let mut enc = xz2::write::XzEncoder::new(file, 6);
            enc.write_all(b"xz binary").unwrap();
            enc.finish().unwrap();
        }

        let out = dir.path().join("out");
        unpack(&archive, ArchiveKind::Xz, &out).unwrap();
        assert_eq!(fs::read(out.join("tool-linux")).unwrap(), b"xz binary");

        let err = decompress(&archive, ArchiveKind::Zip, &dir.path().join("x")).unwrap_err();
        assert!(matches!(err, Error::Install { .. }));
    }
}
