//! SQLite schema creation and migration.

use rusqlite::Connection;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Migration error: expected version {expected}, found {found}")]
    VersionMismatch { expected: i32, found: i32 },
}

/// Current schema version. Increment when adding migrations.
pub const CURRENT_VERSION: i32 = 1;

/// Create all tables and indexes if they don't exist.
///
/// Idempotent — safe to call on an existing database.
pub fn create_schema(conn: &Connection) -> Result<(), SchemaError> {
    conn.execute_batch(SCHEMA_SQL)?;
    set_schema_version(conn, CURRENT_VERSION)?;
    Ok(())
}

/// Open or create a database at the given path.
pub fn open_database(path: &std::path::Path) -> Result<Connection, SchemaError> {
    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    let conn = Connection::open(path)?;
    conn.execute_batch(
        "PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL; PRAGMA foreign_keys=ON;",
    )?;

    let version = get_schema_version(&conn)?;
    if version == 0 {
        create_schema(&conn)?;
    } else if version < CURRENT_VERSION {
        migrate(&conn, version)?;
    }

    Ok(conn)
}

/// Open an in-memory database with the full schema. Useful for testing.
pub fn open_memory() -> Result<Connection, SchemaError> {
    let conn = Connection::open_in_memory()?;
    conn.execute_batch("PRAGMA foreign_keys=ON;")?;
    create_schema(&conn)?;
    Ok(conn)
}

fn get_schema_version(conn: &Connection) -> Result<i32, SchemaError> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
        [],
        |row| row.get(0),
    )?;

    if !exists {
        return Ok(0);
    }

    let version: i32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )?;
    Ok(version)
}

fn set_schema_version(conn: &Connection, version: i32) -> Result<(), SchemaError> {
    conn.execute(
        "INSERT INTO schema_version (version) VALUES (?1)",
        [version],
    )?;
    Ok(())
}

fn migrate(conn: &Connection, from_version: i32) -> Result<(), SchemaError> {
    if from_version > CURRENT_VERSION {
        return Err(SchemaError::VersionMismatch {
            expected: CURRENT_VERSION,
            found: from_version,
        });
    }

    let mut version = from_version;
    while version < CURRENT_VERSION {
        // No migrations yet
        version += 1;
        set_schema_version(conn, version)?;
    }

    Ok(())
}

const SCHEMA_SQL: &str = r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER NOT NULL,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Imported DAT catalogs
CREATE TABLE IF NOT EXISTS catalogs (
    id TEXT PRIMARY KEY,
    filename TEXT NOT NULL,
    display_name TEXT NOT NULL,
    description TEXT,
    version TEXT,
    provider TEXT NOT NULL,
    category_path TEXT NOT NULL DEFAULT '',
    system TEXT,
    game_count INTEGER NOT NULL DEFAULT 0,
    rom_count INTEGER NOT NULL DEFAULT 0,
    total_size INTEGER NOT NULL DEFAULT 0,
    is_enabled BOOLEAN NOT NULL DEFAULT 1,
    imported_at TEXT NOT NULL
);

-- Games within a catalog
CREATE TABLE IF NOT EXISTS games (
    id TEXT PRIMARY KEY,
    catalog_id TEXT NOT NULL REFERENCES catalogs(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    description TEXT,
    year TEXT,
    publisher TEXT,
    region TEXT,
    languages TEXT,
    clone_of TEXT,
    rom_of TEXT,
    is_bios BOOLEAN NOT NULL DEFAULT 0,
    is_device BOOLEAN NOT NULL DEFAULT 0,
    is_mechanical BOOLEAN NOT NULL DEFAULT 0,
    category TEXT
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_games_catalog_name ON games(catalog_id, name);
CREATE INDEX IF NOT EXISTS idx_games_clone_of ON games(catalog_id, clone_of);

-- ROM rows within a game
CREATE TABLE IF NOT EXISTS entries (
    id TEXT PRIMARY KEY,
    game_id TEXT NOT NULL REFERENCES games(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    size INTEGER NOT NULL DEFAULT 0,
    crc32 TEXT,
    md5 TEXT,
    sha1 TEXT,
    status TEXT NOT NULL DEFAULT 'good',
    serial TEXT,
    is_bios BOOLEAN NOT NULL DEFAULT 0,
    merge TEXT
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_entries_game_name ON entries(game_id, name);
CREATE INDEX IF NOT EXISTS idx_entries_crc32 ON entries(crc32);
CREATE INDEX IF NOT EXISTS idx_entries_md5 ON entries(md5);
CREATE INDEX IF NOT EXISTS idx_entries_sha1 ON entries(sha1);

-- Registered storage volumes
CREATE TABLE IF NOT EXISTS volumes (
    id TEXT PRIMARY KEY,
    label TEXT NOT NULL,
    root_path TEXT NOT NULL UNIQUE,
    kind TEXT NOT NULL DEFAULT 'unknown',
    is_online BOOLEAN NOT NULL DEFAULT 1,
    last_seen_at TEXT NOT NULL,
    total_size INTEGER,
    free_space INTEGER,
    auto_scan BOOLEAN NOT NULL DEFAULT 0
);

-- Files found on volumes (possibly inside archives)
CREATE TABLE IF NOT EXISTS rom_files (
    id TEXT PRIMARY KEY,
    volume_id TEXT NOT NULL REFERENCES volumes(id) ON DELETE CASCADE,
    relative_path TEXT NOT NULL,
    filename TEXT NOT NULL,
    size INTEGER NOT NULL DEFAULT 0,
    crc32 TEXT,
    md5 TEXT,
    sha1 TEXT,
    scanned_at TEXT NOT NULL,
    hashed_at TEXT,
    last_modified INTEGER NOT NULL DEFAULT 0,
    is_archived BOOLEAN NOT NULL DEFAULT 0,
    archive_path TEXT,
    path_in_archive TEXT,
    verification_status TEXT NOT NULL DEFAULT 'unknown',
    matched_catalog_id TEXT,
    matched_entry_id TEXT
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_rom_files_identity
    ON rom_files(volume_id, relative_path, COALESCE(path_in_archive, ''));
CREATE INDEX IF NOT EXISTS idx_rom_files_crc32 ON rom_files(crc32);
CREATE INDEX IF NOT EXISTS idx_rom_files_md5 ON rom_files(md5);
CREATE INDEX IF NOT EXISTS idx_rom_files_sha1 ON rom_files(sha1);
CREATE INDEX IF NOT EXISTS idx_rom_files_status ON rom_files(verification_status);

-- Scan job lifecycle
CREATE TABLE IF NOT EXISTS scan_jobs (
    id TEXT PRIMARY KEY,
    kind TEXT NOT NULL DEFAULT 'full',
    target_volume_id TEXT,
    target_path TEXT,
    status TEXT NOT NULL DEFAULT 'queued',
    queued_at TEXT NOT NULL,
    started_at TEXT,
    completed_at TEXT,
    processed_items INTEGER NOT NULL DEFAULT 0,
    total_items INTEGER NOT NULL DEFAULT 0,
    processed_bytes INTEGER NOT NULL DEFAULT 0,
    total_bytes INTEGER NOT NULL DEFAULT 0,
    last_processed_path TEXT,
    resume_count INTEGER NOT NULL DEFAULT 0,
    phase TEXT
);
CREATE INDEX IF NOT EXISTS idx_scan_jobs_status ON scan_jobs(status);

-- Organization runs and their rollback journals (JSON)
CREATE TABLE IF NOT EXISTS organization_ops (
    id TEXT PRIMARY KEY,
    performed_at TEXT NOT NULL,
    source_root TEXT NOT NULL,
    destination_root TEXT NOT NULL,
    template_name TEXT NOT NULL,
    was_move BOOLEAN NOT NULL DEFAULT 0,
    file_count INTEGER NOT NULL DEFAULT 0,
    total_bytes INTEGER NOT NULL DEFAULT 0,
    can_rollback BOOLEAN NOT NULL DEFAULT 0,
    rollback_entries TEXT NOT NULL DEFAULT '[]',
    is_rolled_back BOOLEAN NOT NULL DEFAULT 0,
    rolled_back_at TEXT
);
"#;
