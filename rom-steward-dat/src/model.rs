//! The normalized aggregate both parsers produce.

use rom_steward_core::EntryStatus;

/// Callback invoked with the running game count as parsing progresses.
/// Parsers call it every [`PROGRESS_CHUNK`] games and once at the end.
pub type ProgressFn<'a> = dyn Fn(usize) + 'a;

/// How often (in games) parsers report progress.
pub const PROGRESS_CHUNK: usize = 500;

/// Header metadata from the DAT file.
#[derive(Debug, Clone, Default)]
pub struct DatHeader {
    pub name: String,
    pub description: String,
    pub version: String,
    pub author: String,
    pub url: String,
    pub date: String,
}

/// A parsed DAT file: header plus games in document order.
#[derive(Debug, Clone, Default)]
pub struct DatFile {
    pub header: DatHeader,
    pub games: Vec<DatGame>,
}

impl DatFile {
    /// Total ROM rows across all games.
    pub fn rom_count(&self) -> usize {
        self.games.iter().map(|g| g.roms.len()).sum()
    }

    /// Sum of declared ROM sizes.
    pub fn total_size(&self) -> u64 {
        self.games
            .iter()
            .flat_map(|g| g.roms.iter())
            .map(|r| r.size)
            .sum()
    }
}

/// One `game`/`machine` block.
#[derive(Debug, Clone, Default)]
pub struct DatGame {
    pub name: String,
    pub description: String,
    pub year: Option<String>,
    pub publisher: Option<String>,
    pub region: Option<String>,
    pub languages: Option<String>,
    pub category: Option<String>,
    /// Parent game name within the same DAT, unresolved.
    pub clone_of: Option<String>,
    pub rom_of: Option<String>,
    pub sample_of: Option<String>,
    pub is_bios: bool,
    pub is_device: bool,
    pub is_mechanical: bool,
    pub roms: Vec<DatRom>,
}

/// One `rom`/`disk` row. Hashes are lowercase hex; empty attribute values
/// are treated as absent. A game may legitimately contain several ROMs
/// with the same name; document order is preserved.
#[derive(Debug, Clone, Default)]
pub struct DatRom {
    pub name: String,
    pub size: u64,
    pub crc: Option<String>,
    pub md5: Option<String>,
    pub sha1: Option<String>,
    pub status: EntryStatus,
    pub serial: Option<String>,
    pub merge: Option<String>,
}

/// Lowercase a hash attribute, mapping empty to absent.
pub(crate) fn normalize_hash(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_ascii_lowercase())
    }
}
