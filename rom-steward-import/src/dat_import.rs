//! Import a DAT file into the catalog store.
//!
//! Parses the DAT (format auto-detected), maps its games and ROM rows to
//! store models, and bulk-inserts them in chunked transactions under
//! bulk-mode pragmas. ROM rows without a single usable hash are counted
//! as errors and skipped; everything else lands even when some chunks
//! fail, and the catalog row records the final aggregate counts.

use std::path::Path;

use thiserror::Error;

use rom_steward_catalog::name_parser;
use rom_steward_core::{
    Catalog, CatalogEntry, CatalogProvider, ErrorKind, Fingerprint, GameEntry,
};
use rom_steward_dat::{DatError, DatFile};
use rom_steward_db::{operations, BulkMode, Connection, OperationError};
use rom_steward_lib::MemoryMonitor;

use crate::progress::ImportProgress;

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("DAT error: {0}")]
    Dat(#[from] DatError),
    #[error("Database error: {0}")]
    Db(#[from] OperationError),
}

impl ImportError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ImportError::Dat(e) => e.kind(),
            ImportError::Db(e) => e.kind(),
        }
    }
}

/// Aggregate counts from a single DAT import.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImportStats {
    pub total_games: u64,
    pub games_inserted: u64,
    pub roms_inserted: u64,
    pub errors: u64,
}

#[derive(Debug)]
pub struct ImportOutcome {
    pub catalog: Catalog,
    pub stats: ImportStats,
}

/// Parse and import one DAT file.
///
/// `category_path` overrides the slash-delimited grouping path derived
/// from the DAT header. The memory monitor, when given, shrinks chunk
/// sizes under pressure.
pub fn import_dat_file(
    conn: &Connection,
    path: &Path,
    category_path: Option<&str>,
    progress: Option<&dyn ImportProgress>,
    memory: Option<&MemoryMonitor>,
) -> Result<ImportOutcome, ImportError> {
    if let Some(p) = progress {
        p.on_phase(&format!("Parsing {}", path.display()));
    }

    let parse_progress = |n: usize| {
        if let Some(p) = progress {
            p.on_progress(n, "games parsed");
        }
    };
    let dat = rom_steward_dat::parse_dat_file(path, Some(&parse_progress))?;

    let catalog = catalog_from_dat(&dat, path, category_path);
    operations::insert_catalog(conn, &catalog)?;

    let (games, entries, mut stats) = map_games(&dat, &catalog.id);
    stats.total_games = dat.games.len() as u64;

    let game_chunk = recommended(memory, rom_steward_db::GAME_CHUNK_SIZE);
    let entry_chunk = recommended(memory, rom_steward_db::ENTRY_CHUNK_SIZE);

    if let Some(p) = progress {
        p.on_phase(&format!(
            "Importing {} games / {} ROM entries",
            games.len(),
            entries.len()
        ));
    }

    {
        let _bulk = BulkMode::enter(conn)?;

        let game_progress = |n: u64| {
            if let Some(p) = progress {
                p.on_progress(n as usize, "games inserted");
            }
        };
        let game_stats =
            operations::bulk_insert_games(conn, &games, game_chunk, Some(&game_progress))?;
        stats.games_inserted = game_stats.inserted;
        stats.errors += game_stats.errors;

        let entry_progress = |n: u64| {
            if let Some(p) = progress {
                p.on_progress(n as usize, "entries inserted");
            }
        };
        let entry_stats =
            operations::bulk_insert_entries(conn, &entries, entry_chunk, Some(&entry_progress))?;
        stats.roms_inserted = entry_stats.inserted;
        stats.errors += entry_stats.errors;
    }

    let total_size: u64 = entries.iter().map(|e| e.expected_size).sum();
    operations::update_catalog_counts(
        conn,
        &catalog.id,
        stats.games_inserted,
        stats.roms_inserted,
        total_size,
    )?;

    let catalog = rom_steward_db::get_catalog(conn, &catalog.id)?
        .ok_or_else(|| OperationError::not_found("catalog", &catalog.id))?;

    if let Some(p) = progress {
        p.on_complete(&format!(
            "Imported {}: {} games, {} ROM entries, {} errors",
            catalog.display_name, stats.games_inserted, stats.roms_inserted, stats.errors
        ));
    }

    Ok(ImportOutcome { catalog, stats })
}

fn recommended(memory: Option<&MemoryMonitor>, default: usize) -> usize {
    match memory {
        Some(m) => m.recommended_batch_size(default),
        None => default,
    }
}

fn catalog_from_dat(dat: &DatFile, path: &Path, category_path: Option<&str>) -> Catalog {
    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("catalog.dat")
        .to_string();
    let display_name = if dat.header.name.is_empty() {
        path.file_stem()
            .and_then(|n| n.to_str())
            .unwrap_or("Unnamed catalog")
            .to_string()
    } else {
        dat.header.name.clone()
    };
    let provider = CatalogProvider::infer(&format!(
        "{} {} {}",
        dat.header.name, dat.header.description, dat.header.url
    ));

    Catalog {
        id: uuid::Uuid::new_v4().to_string(),
        filename,
        display_name: display_name.clone(),
        description: nonempty(&dat.header.description),
        version: nonempty(&dat.header.version),
        provider,
        category_path: category_path
            .map(|s| s.to_string())
            .unwrap_or_else(|| display_name.replace(" - ", "/")),
        system: nonempty(&dat.header.name),
        game_count: 0,
        rom_count: 0,
        total_size: 0,
        is_enabled: true,
        imported_at: chrono::Utc::now(),
    }
}

fn nonempty(s: &str) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

/// Map parsed games to store models. Regions, languages, and release
/// categories missing from the DAT are recovered from the game name.
fn map_games(dat: &DatFile, catalog_id: &str) -> (Vec<GameEntry>, Vec<CatalogEntry>, ImportStats) {
    let mut games = Vec::with_capacity(dat.games.len());
    let mut entries = Vec::new();
    let mut stats = ImportStats::default();

    for game in &dat.games {
        if game.name.is_empty() {
            log::warn!("Skipping DAT game with empty name");
            stats.errors += 1;
            continue;
        }

        let parsed = name_parser::parse_name(&game.name);
        let game_id = uuid::Uuid::new_v4().to_string();

        let region = game.region.clone().or_else(|| {
            if parsed.regions.is_empty() {
                None
            } else {
                Some(parsed.regions.join(", "))
            }
        });
        let languages = game
            .languages
            .clone()
            .or_else(|| parsed.languages_string());
        let category = game.category.clone().or_else(|| release_category(&parsed));

        games.push(GameEntry {
            id: game_id.clone(),
            catalog_id: catalog_id.to_string(),
            name: game.name.clone(),
            description: nonempty(&game.description),
            year: game.year.clone(),
            publisher: game.publisher.clone(),
            region,
            languages,
            clone_of: game.clone_of.clone(),
            rom_of: game.rom_of.clone(),
            is_bios: game.is_bios,
            is_device: game.is_device,
            is_mechanical: game.is_mechanical,
            category,
        });

        for rom in &game.roms {
            let fingerprint = match Fingerprint::new_required(
                rom.crc.as_deref(),
                rom.md5.as_deref(),
                rom.sha1.as_deref(),
            ) {
                Ok(fp) => fp,
                Err(e) => {
                    log::warn!("Skipping ROM '{}' in '{}': {e}", rom.name, game.name);
                    stats.errors += 1;
                    continue;
                }
            };

            entries.push(CatalogEntry {
                id: uuid::Uuid::new_v4().to_string(),
                game_id: game_id.clone(),
                name: rom.name.clone(),
                expected_size: rom.size,
                fingerprint,
                status: rom.status,
                serial: rom.serial.clone(),
                is_bios: game.is_bios,
                merge: rom.merge.clone(),
            });
        }
    }

    (games, entries, stats)
}

fn release_category(parsed: &name_parser::ParsedName) -> Option<String> {
    use rom_steward_catalog::DumpFlag;
    for flag in &parsed.flags {
        let label = match flag {
            DumpFlag::Unlicensed => "Unlicensed",
            DumpFlag::Prototype => "Prototype",
            DumpFlag::Beta => "Beta",
            DumpFlag::Sample => "Sample",
            DumpFlag::Demo => "Demo",
            DumpFlag::PublicDomain => "Public Domain",
            _ => continue,
        };
        return Some(label.to_string());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use rom_steward_db::open_memory;

    const SAMPLE_DAT: &str = r#"<?xml version="1.0"?>
<datafile>
    <header>
        <name>Nintendo - Nintendo Entertainment System</name>
        <description>No-Intro set</description>
        <version>20240101</version>
    </header>
    <game name="Donkey Kong (World)">
        <description>Donkey Kong (World)</description>
        <rom name="Donkey Kong (World).nes" size="40976" crc="d445f698" md5="811b027eaf99c2def7b933c5208636de" sha1="facee9c577a5262dbee256de7740d2d87e85f3e0"/>
    </game>
    <game name="Hashless Game (Japan)">
        <rom name="nothing.nes" size="123"/>
    </game>
    <game name="Ice Climber (USA, Europe) (En,Fr)">
        <rom name="Ice Climber (USA, Europe).nes" size="24592" crc="6e8ea569"/>
    </game>
</datafile>"#;

    fn write_dat(dir: &Path) -> std::path::PathBuf {
        let path = dir.join("nes.xml");
        std::fs::write(&path, SAMPLE_DAT).unwrap();
        path
    }

    #[test]
    fn test_import_and_lookup_by_sha1() {
        let dir = tempfile::tempdir().unwrap();
        let conn = open_memory().unwrap();
        let outcome =
            import_dat_file(&conn, &write_dat(dir.path()), None, None, None).unwrap();

        assert_eq!(outcome.stats.total_games, 3);
        assert_eq!(outcome.stats.games_inserted, 3);
        // The hashless ROM is skipped and counted as an error
        assert_eq!(outcome.stats.roms_inserted, 2);
        assert_eq!(outcome.stats.errors, 1);
        assert_eq!(outcome.catalog.provider, CatalogProvider::NoIntro);
        assert_eq!(outcome.catalog.game_count, 3);
        assert_eq!(outcome.catalog.rom_count, 2);

        // Spec reference scenario: the SHA-1 resolves to exactly one
        // entry whose parent game is Donkey Kong
        let fp = Fingerprint::new(
            None,
            None,
            Some("facee9c577a5262dbee256de7740d2d87e85f3e0"),
        )
        .unwrap();
        let matches = rom_steward_db::find_entries_by_fingerprint(&conn, &fp).unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].game_name, "Donkey Kong (World)");
        assert_eq!(matches[0].entry.expected_size, 40976);
    }

    #[test]
    fn test_name_derived_region_and_languages() {
        let dir = tempfile::tempdir().unwrap();
        let conn = open_memory().unwrap();
        import_dat_file(&conn, &write_dat(dir.path()), None, None, None).unwrap();

        let (region, languages): (Option<String>, Option<String>) = conn
            .query_row(
                "SELECT region, languages FROM games WHERE name LIKE 'Ice Climber%'",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert_eq!(region.as_deref(), Some("USA, Europe"));
        assert_eq!(languages.as_deref(), Some("En,Fr"));
    }

    #[test]
    fn test_category_path_override() {
        let dir = tempfile::tempdir().unwrap();
        let conn = open_memory().unwrap();
        let outcome = import_dat_file(
            &conn,
            &write_dat(dir.path()),
            Some("Consoles/Nintendo/NES"),
            None,
            None,
        )
        .unwrap();
        assert_eq!(outcome.catalog.category_path, "Consoles/Nintendo/NES");
    }

    #[test]
    fn test_unreadable_dat_is_error() {
        let conn = open_memory().unwrap();
        let err = import_dat_file(
            &conn,
            Path::new("/no/such/file.dat"),
            None,
            None,
            None,
        )
        .unwrap_err();
        assert!(matches!(err, ImportError::Dat(_)));
    }
}
