//! Copier/dumper header detection.
//!
//! Several cartridge formats circulate with an extra header prepended by
//! the original dumping hardware. Catalog hashes cover only the ROM data,
//! so the header must be detected and skipped before hashing. Detection
//! reads at most 128 bytes and always restores the stream position,
//! including on error paths.

use std::collections::BTreeMap;
use std::io::{Read, Seek, SeekFrom};

use crate::error::HashError;
use crate::hasher::ReadSeek;

/// A detected header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderInfo {
    /// Bytes to skip before hashing.
    pub size: u32,
    /// Short format tag, e.g. "iNES" or "SMC".
    pub format: &'static str,
    pub description: &'static str,
    /// False for headers that are detected but not part of the format's
    /// standard (e.g. a copier header on a `.sfc` file).
    pub is_standard: bool,
    /// Format-specific details extracted from the header bytes.
    pub metadata: BTreeMap<String, String>,
}

const PROBE_SIZE: usize = 128;

const INES_MAGIC: [u8; 4] = [0x4E, 0x45, 0x53, 0x1A];
const FDS_MAGIC: [u8; 4] = [0x46, 0x44, 0x53, 0x1A];
const A78_MAGIC: &[u8; 9] = b"ATARI7800";
const LYNX_MAGIC: &[u8; 4] = b"LYNX";

/// Extensions the detector knows about. Files with other extensions are
/// never probed.
pub fn is_known_extension(ext: &str) -> bool {
    matches!(
        ext.to_ascii_lowercase().as_str(),
        "nes" | "fds"
            | "smc"
            | "swc"
            | "fig"
            | "sfc"
            | "smd"
            | "md"
            | "gen"
            | "a78"
            | "lnx"
            | "gb"
            | "gbc"
            | "gba"
            | "n64"
            | "z64"
            | "v64"
            | "sms"
            | "gg"
            | "pce"
            | "ws"
            | "wsc"
    )
}

/// Detect an optional header for a file with the given extension.
///
/// Returns `Ok(None)` when the extension is recognized but no header is
/// present, and for extensions whose standard header size is zero.
pub fn detect_header(
    reader: &mut dyn ReadSeek,
    extension: &str,
    file_size: u64,
) -> Result<Option<HeaderInfo>, HashError> {
    let ext = extension.to_ascii_lowercase();
    if !is_known_extension(&ext) {
        return Ok(None);
    }

    let start_pos = reader.stream_position()?;
    let result = detect_inner(reader, &ext, file_size);
    // Restore position on every exit path
    let restore = reader.seek(SeekFrom::Start(start_pos));
    match (result, restore) {
        (Ok(info), Ok(_)) => Ok(info),
        (Err(e), _) => Err(e),
        (_, Err(e)) => Err(e.into()),
    }
}

fn detect_inner(
    reader: &mut dyn ReadSeek,
    ext: &str,
    file_size: u64,
) -> Result<Option<HeaderInfo>, HashError> {
    let mut probe = [0u8; PROBE_SIZE];
    reader.seek(SeekFrom::Start(0))?;
    let filled = read_up_to(reader, &mut probe)?;
    let probe = &probe[..filled];

    let info = match ext {
        "nes" => detect_ines(probe),
        "fds" => detect_fds(probe),
        "a78" => detect_a78(probe),
        "lnx" => detect_lynx(probe),
        "smc" | "swc" | "fig" => detect_snes_copier(ext, file_size),
        "sfc" => detect_sfc_nonstandard(file_size),
        "smd" => detect_smd(probe, file_size),
        // Recognized formats with no header convention
        _ => None,
    };

    Ok(info)
}

fn read_up_to(reader: &mut dyn ReadSeek, buf: &mut [u8]) -> Result<usize, HashError> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

fn detect_ines(probe: &[u8]) -> Option<HeaderInfo> {
    if probe.len() < 16 || probe[..4] != INES_MAGIC {
        return None;
    }
    let mut metadata = BTreeMap::new();
    metadata.insert("prg_rom_banks".to_string(), probe[4].to_string());
    metadata.insert("chr_rom_banks".to_string(), probe[5].to_string());
    // NES 2.0 sets bits 2-3 of byte 7 to 0b10
    let nes2 = (probe[7] & 0x0C) == 0x08;
    metadata.insert("nes2".to_string(), nes2.to_string());

    Some(HeaderInfo {
        size: 16,
        format: "iNES",
        description: "iNES header",
        is_standard: true,
        metadata,
    })
}

fn detect_fds(probe: &[u8]) -> Option<HeaderInfo> {
    if probe.len() < 16 || probe[..4] != FDS_MAGIC {
        return None;
    }
    let mut metadata = BTreeMap::new();
    metadata.insert("disk_sides".to_string(), probe[4].to_string());

    Some(HeaderInfo {
        size: 16,
        format: "FDS",
        description: "fwNES disk-image header",
        is_standard: true,
        metadata,
    })
}

fn detect_a78(probe: &[u8]) -> Option<HeaderInfo> {
    if probe.len() < 10 || &probe[1..10] != A78_MAGIC {
        return None;
    }
    Some(HeaderInfo {
        size: 128,
        format: "A78",
        description: "Atari 7800 cartridge header",
        is_standard: true,
        metadata: BTreeMap::new(),
    })
}

fn detect_lynx(probe: &[u8]) -> Option<HeaderInfo> {
    if probe.len() < 4 || &probe[..4] != LYNX_MAGIC {
        return None;
    }
    Some(HeaderInfo {
        size: 64,
        format: "LNX",
        description: "Atari Lynx cartridge header",
        is_standard: true,
        metadata: BTreeMap::new(),
    })
}

/// SNES copier formats: a 512-byte header leaves the file 512 bytes past
/// a multiple of 1024.
fn detect_snes_copier(ext: &str, file_size: u64) -> Option<HeaderInfo> {
    if file_size > 512 && file_size % 1024 == 512 {
        let (format, description): (&'static str, &'static str) = match ext {
            "swc" => ("SWC", "Super Wild Card copier header"),
            "fig" => ("FIG", "Pro Fighter copier header"),
            _ => ("SMC", "Super Magicom copier header"),
        };
        Some(HeaderInfo {
            size: 512,
            format,
            description,
            is_standard: true,
            metadata: BTreeMap::new(),
        })
    } else {
        None
    }
}

/// `.sfc` is defined headerless; a copier remainder on one is flagged
/// non-standard so callers can warn.
fn detect_sfc_nonstandard(file_size: u64) -> Option<HeaderInfo> {
    if file_size > 512 && file_size % 1024 == 512 {
        Some(HeaderInfo {
            size: 512,
            format: "SMC",
            description: "Copier header on headerless .sfc",
            is_standard: false,
            metadata: BTreeMap::new(),
        })
    } else {
        None
    }
}

/// Super Magic Drive interleaved dumps: the 512-byte header stores a
/// 16 KiB block count at offset 0 (little-endian u16). The count must be
/// positive and fit the file.
fn detect_smd(probe: &[u8], file_size: u64) -> Option<HeaderInfo> {
    if probe.len() < 2 || file_size <= 512 {
        return None;
    }
    let block_count = probe[0] as u64 | (probe[1] as u64) << 8;
    let max_blocks = (file_size - 512) / 16384 + 1;
    if block_count == 0 || block_count > max_blocks {
        return None;
    }
    let mut metadata = BTreeMap::new();
    metadata.insert("block_count".to_string(), block_count.to_string());

    Some(HeaderInfo {
        size: 512,
        format: "SMD",
        description: "Super Magic Drive header",
        is_standard: true,
        metadata,
    })
}

/// Bytes to skip when hashing a file on disk: the detected header size,
/// or 0 when there is no header or the file cannot be probed.
pub fn skip_for_file(path: &std::path::Path, file_size: u64) -> u64 {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default();
    if !is_known_extension(ext) {
        return 0;
    }
    let Ok(mut file) = std::fs::File::open(path) else {
        return 0;
    };
    match detect_header(&mut file, ext, file_size) {
        Ok(Some(info)) => info.size as u64,
        _ => 0,
    }
}
