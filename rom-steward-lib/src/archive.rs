//! Archive adapters for scanning and hashing archive members.
//!
//! ZIP goes through the `zip` crate natively. Every other supported
//! format (7z, RAR read-only, TAR, GZ, BZ2, XZ, LZ) is streamed through
//! a system 7-Zip binary: `7z l -slt` for listing, `7z x -so` to pipe a
//! single entry's bytes to stdout. The entry stream is fully consumed and
//! released before the next entry is touched, so the archive handle's
//! lifetime bounds every read.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::OnceLock;

use tokio_util::sync::CancellationToken;

use crate::buffer::BufferPool;
use crate::error::HashError;
use crate::hasher::{self, HashOutput, ProgressFn};

/// Supported archive container formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    Zip,
    SevenZ,
    Rar,
    Tar,
    Gz,
    Bz2,
    Xz,
    Lz,
}

impl ArchiveKind {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "zip" => Some(ArchiveKind::Zip),
            "7z" => Some(ArchiveKind::SevenZ),
            "rar" => Some(ArchiveKind::Rar),
            "tar" => Some(ArchiveKind::Tar),
            "gz" | "tgz" => Some(ArchiveKind::Gz),
            "bz2" => Some(ArchiveKind::Bz2),
            "xz" => Some(ArchiveKind::Xz),
            "lz" => Some(ArchiveKind::Lz),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ArchiveKind::Zip => "zip",
            ArchiveKind::SevenZ => "7z",
            ArchiveKind::Rar => "rar",
            ArchiveKind::Tar => "tar",
            ArchiveKind::Gz => "gz",
            ArchiveKind::Bz2 => "bz2",
            ArchiveKind::Xz => "xz",
            ArchiveKind::Lz => "lz",
        }
    }
}

/// True when the path's extension names a supported archive container.
pub fn is_archive_path(path: &Path) -> bool {
    ArchiveKind::from_path(path).is_some()
}

/// One file entry inside an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub path_in_archive: String,
    pub size: u64,
}

/// List the file entries of an archive.
pub fn list_entries(path: &Path) -> Result<Vec<ArchiveEntry>, HashError> {
    match ArchiveKind::from_path(path) {
        Some(ArchiveKind::Zip) => list_zip_entries(path),
        Some(_) => list_via_seven_zip(path),
        None => Err(HashError::UnsupportedFormat(
            path.to_string_lossy().to_string(),
        )),
    }
}

/// Hash one entry of an archive, skipping `skip_bytes` of its content.
pub fn hash_entry(
    archive: &Path,
    entry: &str,
    skip_bytes: u64,
    pool: &BufferPool,
    progress: Option<ProgressFn<'_>>,
    cancel: &CancellationToken,
) -> Result<HashOutput, HashError> {
    match ArchiveKind::from_path(archive) {
        Some(ArchiveKind::Zip) => hash_zip_entry(archive, entry, skip_bytes, pool, progress, cancel),
        Some(_) => hash_via_seven_zip(archive, entry, skip_bytes, pool, progress, cancel),
        None => Err(HashError::UnsupportedFormat(
            archive.to_string_lossy().to_string(),
        )),
    }
}

// ── ZIP (native) ────────────────────────────────────────────────────────────

fn open_zip(path: &Path) -> Result<zip::ZipArchive<std::fs::File>, HashError> {
    let file = std::fs::File::open(path).map_err(|e| HashError::from_io_at(e, path))?;
    zip::ZipArchive::new(file).map_err(|e| HashError::tool(format!("ZIP open failed: {e}")))
}

fn list_zip_entries(path: &Path) -> Result<Vec<ArchiveEntry>, HashError> {
    let mut archive = open_zip(path)?;
    let mut entries = Vec::new();
    for i in 0..archive.len() {
        let entry = archive
            .by_index(i)
            .map_err(|e| HashError::tool(format!("ZIP entry {i} unreadable: {e}")))?;
        if entry.is_file() {
            entries.push(ArchiveEntry {
                path_in_archive: entry.name().to_string(),
                size: entry.size(),
            });
        }
    }
    Ok(entries)
}

fn hash_zip_entry(
    path: &Path,
    entry_name: &str,
    skip_bytes: u64,
    pool: &BufferPool,
    progress: Option<ProgressFn<'_>>,
    cancel: &CancellationToken,
) -> Result<HashOutput, HashError> {
    let mut archive = open_zip(path)?;
    let mut entry = match archive.by_name(entry_name) {
        Ok(e) => e,
        Err(zip::result::ZipError::FileNotFound) => {
            return Err(HashError::EntryNotFound {
                archive: path.to_path_buf(),
                entry: entry_name.to_string(),
            })
        }
        Err(e) => return Err(HashError::tool(format!("ZIP entry open failed: {e}"))),
    };
    let total = entry.size().saturating_sub(skip_bytes);
    hasher::hash_reader(&mut entry, skip_bytes, total, pool, progress, cancel)
}

// ── Everything else (7-Zip CLI) ─────────────────────────────────────────────

/// Locate a 7-Zip binary once per process.
fn seven_zip_binary() -> Option<&'static Path> {
    static BINARY: OnceLock<Option<PathBuf>> = OnceLock::new();
    BINARY
        .get_or_init(|| {
            ["7z", "7za", "7zz"]
                .iter()
                .find_map(|name| which::which(name).ok())
        })
        .as_deref()
}

fn require_seven_zip() -> Result<&'static Path, HashError> {
    seven_zip_binary().ok_or_else(|| {
        HashError::tool("No 7z/7za/7zz binary found on PATH for non-ZIP archives")
    })
}

/// Parse `7z l -slt` output: entries are `Key = Value` blocks separated
/// by blank lines, directories flagged by a `D` attribute.
fn list_via_seven_zip(path: &Path) -> Result<Vec<ArchiveEntry>, HashError> {
    let binary = require_seven_zip()?;
    let output = Command::new(binary)
        .arg("l")
        .arg("-slt")
        .arg("-ba")
        .arg(path)
        .stdin(Stdio::null())
        .output()
        .map_err(|e| HashError::tool(format!("Failed to run 7z: {e}")))?;

    if !output.status.success() {
        return Err(HashError::tool(format!(
            "7z listing failed for {}: {}",
            path.display(),
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    let text = String::from_utf8_lossy(&output.stdout);
    let mut entries = Vec::new();
    let mut current_path: Option<String> = None;
    let mut current_size: u64 = 0;
    let mut is_dir = false;

    let mut flush = |path: &mut Option<String>, size: &mut u64, dir: &mut bool| {
        if let Some(p) = path.take() {
            if !*dir {
                entries.push(ArchiveEntry {
                    path_in_archive: p,
                    size: *size,
                });
            }
        }
        *size = 0;
        *dir = false;
    };

    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            flush(&mut current_path, &mut current_size, &mut is_dir);
            continue;
        }
        if let Some((key, value)) = trimmed.split_once(" = ") {
            match key {
                "Path" => {
                    flush(&mut current_path, &mut current_size, &mut is_dir);
                    current_path = Some(value.to_string());
                }
                "Size" => current_size = value.parse().unwrap_or(0),
                "Attributes" => is_dir = value.contains('D'),
                "Folder" => is_dir = is_dir || value == "+",
                _ => {}
            }
        }
    }
    flush(&mut current_path, &mut current_size, &mut is_dir);

    Ok(entries)
}

/// Stream one entry's bytes through 7z to stdout and hash them.
fn hash_via_seven_zip(
    archive: &Path,
    entry: &str,
    skip_bytes: u64,
    pool: &BufferPool,
    progress: Option<ProgressFn<'_>>,
    cancel: &CancellationToken,
) -> Result<HashOutput, HashError> {
    let binary = require_seven_zip()?;
    let mut child = Command::new(binary)
        .arg("x")
        .arg("-so")
        .arg(archive)
        .arg(entry)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| HashError::tool(format!("Failed to run 7z: {e}")))?;

    let mut stdout = child
        .stdout
        .take()
        .ok_or_else(|| HashError::tool("7z produced no stdout pipe"))?;

    let result = hasher::hash_reader(&mut stdout, skip_bytes, 0, pool, progress, cancel);

    // Consume any remainder so the child can exit, then reap it
    if result.is_err() {
        let _ = std::io::copy(&mut stdout, &mut std::io::sink());
    }
    drop(stdout);
    let status = child
        .wait()
        .map_err(|e| HashError::tool(format!("7z did not exit cleanly: {e}")))?;

    let output = result?;
    if !status.success() {
        return Err(HashError::tool(format!(
            "7z extraction failed for {} ({})",
            entry,
            status.code().map(|c| c.to_string()).unwrap_or_default()
        )));
    }
    if output.data_size == 0 && skip_bytes == 0 {
        // 7z exits zero for a missing member but writes nothing
        return Err(HashError::EntryNotFound {
            archive: archive.to_path_buf(),
            entry: entry.to_string(),
        });
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn make_zip(dir: &Path, name: &str, members: &[(&str, &[u8])]) -> PathBuf {
        let path = dir.join(name);
        let file = std::fs::File::create(&path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Stored);
        for (member, data) in members {
            writer.start_file(*member, options).unwrap();
            writer.write_all(data).unwrap();
        }
        writer.finish().unwrap();
        path
    }

    #[test]
    fn test_kind_from_extension() {
        assert_eq!(
            ArchiveKind::from_path(Path::new("a/b/set.ZIP")),
            Some(ArchiveKind::Zip)
        );
        assert_eq!(
            ArchiveKind::from_path(Path::new("set.7z")),
            Some(ArchiveKind::SevenZ)
        );
        assert_eq!(ArchiveKind::from_path(Path::new("rom.nes")), None);
        assert!(is_archive_path(Path::new("x.tar")));
        assert!(!is_archive_path(Path::new("x")));
    }

    #[test]
    fn test_unsupported_extension() {
        let err = list_entries(Path::new("whatever.cab")).unwrap_err();
        assert!(matches!(err, HashError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_zip_listing() {
        let dir = tempfile::tempdir().unwrap();
        let zip_path = make_zip(
            dir.path(),
            "set.zip",
            &[("a.bin", b"abc"), ("sub/b.bin", b"defgh")],
        );

        let mut entries = list_zip_entries(&zip_path).unwrap();
        entries.sort_by(|a, b| a.path_in_archive.cmp(&b.path_in_archive));
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].path_in_archive, "a.bin");
        assert_eq!(entries[0].size, 3);
        assert_eq!(entries[1].path_in_archive, "sub/b.bin");
        assert_eq!(entries[1].size, 5);
    }

    #[test]
    fn test_zip_entry_hash_matches_raw() {
        let dir = tempfile::tempdir().unwrap();
        let zip_path = make_zip(dir.path(), "set.zip", &[("a.bin", b"abc")]);

        let pool = BufferPool::default();
        let out = hash_entry(
            &zip_path,
            "a.bin",
            0,
            &pool,
            None,
            &CancellationToken::new(),
        )
        .unwrap();
        assert_eq!(out.fingerprint.crc32(), Some("352441c2"));
        assert_eq!(out.data_size, 3);
    }

    #[test]
    fn test_zip_missing_entry() {
        let dir = tempfile::tempdir().unwrap();
        let zip_path = make_zip(dir.path(), "set.zip", &[("a.bin", b"abc")]);

        let pool = BufferPool::default();
        let err = hash_entry(
            &zip_path,
            "missing.bin",
            0,
            &pool,
            None,
            &CancellationToken::new(),
        )
        .unwrap_err();
        assert!(matches!(err, HashError::EntryNotFound { .. }));
    }

    #[test]
    fn test_zip_entry_with_skip() {
        let dir = tempfile::tempdir().unwrap();
        let mut data = vec![0xEE; 16];
        data.extend_from_slice(b"abc");
        let zip_path = make_zip(dir.path(), "set.zip", &[("h.nes", &data)]);

        let pool = BufferPool::default();
        let out = hash_entry(&zip_path, "h.nes", 16, &pool, None, &CancellationToken::new())
            .unwrap();
        assert_eq!(out.fingerprint.crc32(), Some("352441c2"));
    }
}
