//! Write operations: CRUD plus chunked bulk import.
//!
//! Bulk import commits one transaction per chunk: a failed chunk rolls
//! back alone and is reported, while prior chunks stay committed. Bulk
//! mode swaps the journal pragmas for the duration of an import and
//! restores WAL on exit.

use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use thiserror::Error;

use rom_steward_core::{
    Catalog, CatalogEntry, ErrorKind, GameEntry, OrganizationOperation, RollbackEntry, ScanJob,
    StoredRomFile, Volume,
};

#[derive(Debug, Error)]
pub enum OperationError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Entity not found: {entity_type} with id '{id}'")]
    NotFound { entity_type: String, id: String },
    #[error("Journal serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl OperationError {
    pub fn not_found(entity_type: &str, id: &str) -> Self {
        Self::NotFound {
            entity_type: entity_type.to_string(),
            id: id.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            OperationError::Sqlite(_) => ErrorKind::Io,
            OperationError::NotFound { .. } => ErrorKind::NotFound,
            OperationError::Json(_) => ErrorKind::Internal,
        }
    }
}

/// Default chunk sizes for transactional bulk insertion.
pub const ENTRY_CHUNK_SIZE: usize = 1000;
pub const GAME_CHUNK_SIZE: usize = 500;
pub const ROM_FILE_CHUNK_SIZE: usize = 1000;

/// Per-chunk command timeout.
const CHUNK_BUSY_TIMEOUT: Duration = Duration::from_secs(60);

pub(crate) fn ts(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

pub(crate) fn ts_opt(dt: Option<DateTime<Utc>>) -> Option<String> {
    dt.map(ts)
}

// ── Catalogs ────────────────────────────────────────────────────────────────

pub fn insert_catalog(conn: &Connection, catalog: &Catalog) -> Result<(), OperationError> {
    conn.execute(
        "INSERT INTO catalogs (id, filename, display_name, description, version, provider,
                               category_path, system, game_count, rom_count, total_size,
                               is_enabled, imported_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        params![
            catalog.id,
            catalog.filename,
            catalog.display_name,
            catalog.description,
            catalog.version,
            catalog.provider.as_str(),
            catalog.category_path,
            catalog.system,
            catalog.game_count as i64,
            catalog.rom_count as i64,
            catalog.total_size as i64,
            catalog.is_enabled,
            ts(catalog.imported_at),
        ],
    )?;
    Ok(())
}

/// Refresh a catalog's aggregate counts after import.
pub fn update_catalog_counts(
    conn: &Connection,
    catalog_id: &str,
    game_count: u64,
    rom_count: u64,
    total_size: u64,
) -> Result<(), OperationError> {
    let updated = conn.execute(
        "UPDATE catalogs SET game_count = ?2, rom_count = ?3, total_size = ?4 WHERE id = ?1",
        params![
            catalog_id,
            game_count as i64,
            rom_count as i64,
            total_size as i64
        ],
    )?;
    if updated == 0 {
        return Err(OperationError::not_found("catalog", catalog_id));
    }
    Ok(())
}

pub fn set_catalog_enabled(
    conn: &Connection,
    catalog_id: &str,
    enabled: bool,
) -> Result<(), OperationError> {
    let updated = conn.execute(
        "UPDATE catalogs SET is_enabled = ?2 WHERE id = ?1",
        params![catalog_id, enabled],
    )?;
    if updated == 0 {
        return Err(OperationError::not_found("catalog", catalog_id));
    }
    Ok(())
}

/// Delete a catalog and (via cascade) its games and entries.
pub fn delete_catalog(conn: &Connection, catalog_id: &str) -> Result<(), OperationError> {
    let deleted = conn.execute("DELETE FROM catalogs WHERE id = ?1", params![catalog_id])?;
    if deleted == 0 {
        return Err(OperationError::not_found("catalog", catalog_id));
    }
    Ok(())
}

// ── Bulk import ─────────────────────────────────────────────────────────────

/// Guard that holds the connection in bulk-insert mode. Pragmas are
/// switched on entry and restored when the guard drops.
pub struct BulkMode<'a> {
    conn: &'a Connection,
}

impl<'a> BulkMode<'a> {
    pub fn enter(conn: &'a Connection) -> Result<Self, OperationError> {
        conn.busy_timeout(CHUNK_BUSY_TIMEOUT)?;
        conn.execute_batch(
            "PRAGMA journal_mode=OFF; PRAGMA synchronous=OFF; PRAGMA temp_store=MEMORY;",
        )?;
        Ok(Self { conn })
    }
}

impl Drop for BulkMode<'_> {
    fn drop(&mut self) {
        if let Err(e) = self
            .conn
            .execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
        {
            log::warn!("Failed to restore journal pragmas after bulk mode: {e}");
        }
    }
}

/// Aggregate result of a chunked bulk insert.
#[derive(Debug, Default, Clone, Copy)]
pub struct BulkStats {
    pub inserted: u64,
    pub errors: u64,
    pub chunks_committed: u64,
    pub chunks_failed: u64,
}

/// Insert games in chunked transactions. A failing chunk rolls back and
/// counts its rows as errors; subsequent chunks still run. `progress`
/// receives the running inserted count after each chunk.
pub fn bulk_insert_games(
    conn: &Connection,
    games: &[GameEntry],
    chunk_size: usize,
    progress: Option<&dyn Fn(u64)>,
) -> Result<BulkStats, OperationError> {
    bulk_chunks(conn, games, chunk_size, progress, insert_game)
}

/// Insert catalog entries in chunked transactions. Duplicate
/// (game_id, name) rows keep the first inserted row.
pub fn bulk_insert_entries(
    conn: &Connection,
    entries: &[CatalogEntry],
    chunk_size: usize,
    progress: Option<&dyn Fn(u64)>,
) -> Result<BulkStats, OperationError> {
    bulk_chunks(conn, entries, chunk_size, progress, insert_entry)
}

/// Upsert stored ROM files in chunked transactions.
pub fn bulk_insert_rom_files(
    conn: &Connection,
    files: &[StoredRomFile],
    chunk_size: usize,
    progress: Option<&dyn Fn(u64)>,
) -> Result<BulkStats, OperationError> {
    bulk_chunks(conn, files, chunk_size, progress, upsert_rom_file)
}

fn bulk_chunks<T>(
    conn: &Connection,
    rows: &[T],
    chunk_size: usize,
    progress: Option<&dyn Fn(u64)>,
    insert: fn(&Connection, &T) -> Result<(), OperationError>,
) -> Result<BulkStats, OperationError> {
    let mut stats = BulkStats::default();
    let chunk_size = chunk_size.max(1);

    for chunk in rows.chunks(chunk_size) {
        let result = (|| -> Result<(), OperationError> {
            let tx = conn.unchecked_transaction()?;
            for row in chunk {
                insert(&tx, row)?;
            }
            tx.commit()?;
            Ok(())
        })();

        match result {
            Ok(()) => {
                stats.inserted += chunk.len() as u64;
                stats.chunks_committed += 1;
            }
            Err(e) => {
                log::warn!("Bulk chunk of {} rows failed: {e}", chunk.len());
                stats.errors += chunk.len() as u64;
                stats.chunks_failed += 1;
            }
        }
        if let Some(p) = progress {
            p(stats.inserted);
        }
    }

    Ok(stats)
}

fn insert_game(conn: &Connection, game: &GameEntry) -> Result<(), OperationError> {
    conn.execute(
        "INSERT INTO games (id, catalog_id, name, description, year, publisher, region,
                            languages, clone_of, rom_of, is_bios, is_device, is_mechanical,
                            category)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
        params![
            game.id,
            game.catalog_id,
            game.name,
            game.description,
            game.year,
            game.publisher,
            game.region,
            game.languages,
            game.clone_of,
            game.rom_of,
            game.is_bios,
            game.is_device,
            game.is_mechanical,
            game.category,
        ],
    )?;
    Ok(())
}

fn insert_entry(conn: &Connection, entry: &CatalogEntry) -> Result<(), OperationError> {
    conn.execute(
        "INSERT OR IGNORE INTO entries (id, game_id, name, size, crc32, md5, sha1, status,
                                        serial, is_bios, merge)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            entry.id,
            entry.game_id,
            entry.name,
            entry.expected_size as i64,
            entry.fingerprint.crc32(),
            entry.fingerprint.md5(),
            entry.fingerprint.sha1(),
            entry.status.as_str(),
            entry.serial,
            entry.is_bios,
            entry.merge,
        ],
    )?;
    Ok(())
}

// ── Volumes ─────────────────────────────────────────────────────────────────

pub fn upsert_volume(conn: &Connection, volume: &Volume) -> Result<(), OperationError> {
    conn.execute(
        "INSERT INTO volumes (id, label, root_path, kind, is_online, last_seen_at,
                              total_size, free_space, auto_scan)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
         ON CONFLICT(root_path) DO UPDATE SET
             label = excluded.label,
             kind = excluded.kind,
             is_online = excluded.is_online,
             last_seen_at = excluded.last_seen_at,
             total_size = excluded.total_size,
             free_space = excluded.free_space,
             auto_scan = excluded.auto_scan",
        params![
            volume.id,
            volume.label,
            volume.root_path,
            volume.kind.as_str(),
            volume.is_online,
            ts(volume.last_seen_at),
            volume.total_size.map(|v| v as i64),
            volume.free_space.map(|v| v as i64),
            volume.auto_scan,
        ],
    )?;
    Ok(())
}

/// Flip a volume's online flag on poll. Offline volumes keep all their
/// ROM records.
pub fn set_volume_online(
    conn: &Connection,
    volume_id: &str,
    is_online: bool,
    seen_at: DateTime<Utc>,
) -> Result<(), OperationError> {
    let updated = conn.execute(
        "UPDATE volumes SET is_online = ?2, last_seen_at = ?3 WHERE id = ?1",
        params![volume_id, is_online, ts(seen_at)],
    )?;
    if updated == 0 {
        return Err(OperationError::not_found("volume", volume_id));
    }
    Ok(())
}

// ── Stored ROM files ────────────────────────────────────────────────────────

/// Insert or refresh a stored file, keyed by its on-volume identity
/// (volume, relative path, archive member).
pub fn upsert_rom_file(conn: &Connection, file: &StoredRomFile) -> Result<(), OperationError> {
    let fp = file.fingerprint.as_ref();
    conn.execute(
        "INSERT INTO rom_files (id, volume_id, relative_path, filename, size, crc32, md5,
                                sha1, scanned_at, hashed_at, last_modified, is_archived,
                                archive_path, path_in_archive, verification_status,
                                matched_catalog_id, matched_entry_id)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)
         ON CONFLICT(volume_id, relative_path, COALESCE(path_in_archive, '')) DO UPDATE SET
             size = excluded.size,
             crc32 = excluded.crc32,
             md5 = excluded.md5,
             sha1 = excluded.sha1,
             scanned_at = excluded.scanned_at,
             hashed_at = excluded.hashed_at,
             last_modified = excluded.last_modified,
             verification_status = excluded.verification_status,
             matched_catalog_id = excluded.matched_catalog_id,
             matched_entry_id = excluded.matched_entry_id",
        params![
            file.id,
            file.volume_id,
            file.relative_path,
            file.filename,
            file.size as i64,
            fp.and_then(|f| f.crc32()),
            fp.and_then(|f| f.md5()),
            fp.and_then(|f| f.sha1()),
            ts(file.scanned_at),
            ts_opt(file.hashed_at),
            file.last_modified,
            file.is_archived,
            file.archive_path,
            file.path_in_archive,
            file.verification_status.as_str(),
            file.matched_catalog_id,
            file.matched_entry_id,
        ],
    )?;
    Ok(())
}

/// Record a verification outcome.
pub fn update_rom_file_verification(
    conn: &Connection,
    file_id: &str,
    status: rom_steward_core::VerificationStatus,
    matched_catalog_id: Option<&str>,
    matched_entry_id: Option<&str>,
) -> Result<(), OperationError> {
    let updated = conn.execute(
        "UPDATE rom_files SET verification_status = ?2, matched_catalog_id = ?3,
                              matched_entry_id = ?4
         WHERE id = ?1",
        params![file_id, status.as_str(), matched_catalog_id, matched_entry_id],
    )?;
    if updated == 0 {
        return Err(OperationError::not_found("rom_file", file_id));
    }
    Ok(())
}

/// Remove records for files that vanished from a volume.
pub fn delete_rom_files(conn: &Connection, file_ids: &[String]) -> Result<u64, OperationError> {
    let mut deleted = 0u64;
    for id in file_ids {
        deleted += conn.execute("DELETE FROM rom_files WHERE id = ?1", params![id])? as u64;
    }
    Ok(deleted)
}

// ── Scan jobs ───────────────────────────────────────────────────────────────

pub fn insert_scan_job(conn: &Connection, job: &ScanJob) -> Result<(), OperationError> {
    conn.execute(
        "INSERT INTO scan_jobs (id, kind, target_volume_id, target_path, status, queued_at,
                                started_at, completed_at, processed_items, total_items,
                                processed_bytes, total_bytes, last_processed_path,
                                resume_count, phase)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
        params![
            job.id,
            job.kind.as_str(),
            job.target_volume_id,
            job.target_path,
            job.status.as_str(),
            ts(job.queued_at),
            ts_opt(job.started_at),
            ts_opt(job.completed_at),
            job.processed_items as i64,
            job.total_items as i64,
            job.processed_bytes as i64,
            job.total_bytes as i64,
            job.last_processed_path,
            job.resume_count,
            job.phase,
        ],
    )?;
    Ok(())
}

pub fn update_scan_job(conn: &Connection, job: &ScanJob) -> Result<(), OperationError> {
    let updated = conn.execute(
        "UPDATE scan_jobs SET status = ?2, started_at = ?3, completed_at = ?4,
                              processed_items = ?5, total_items = ?6, processed_bytes = ?7,
                              total_bytes = ?8, last_processed_path = ?9, resume_count = ?10,
                              phase = ?11
         WHERE id = ?1",
        params![
            job.id,
            job.status.as_str(),
            ts_opt(job.started_at),
            ts_opt(job.completed_at),
            job.processed_items as i64,
            job.total_items as i64,
            job.processed_bytes as i64,
            job.total_bytes as i64,
            job.last_processed_path,
            job.resume_count,
            job.phase,
        ],
    )?;
    if updated == 0 {
        return Err(OperationError::not_found("scan_job", &job.id));
    }
    Ok(())
}

// ── Organization operations ─────────────────────────────────────────────────

pub fn insert_operation(
    conn: &Connection,
    op: &OrganizationOperation,
) -> Result<(), OperationError> {
    let journal = serde_json::to_string(&op.rollback_entries)?;
    conn.execute(
        "INSERT INTO organization_ops (id, performed_at, source_root, destination_root,
                                       template_name, was_move, file_count, total_bytes,
                                       can_rollback, rollback_entries, is_rolled_back,
                                       rolled_back_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            op.id,
            ts(op.performed_at),
            op.source_root,
            op.destination_root,
            op.template_name,
            op.was_move,
            op.file_count as i64,
            op.total_bytes as i64,
            op.can_rollback,
            journal,
            op.is_rolled_back,
            ts_opt(op.rolled_back_at),
        ],
    )?;
    Ok(())
}

/// Replace an operation's journal and headline counts. Called before the
/// first file operation and after every journal entry, so a crash leaves
/// the system recoverable.
pub fn update_operation_journal(
    conn: &Connection,
    op_id: &str,
    entries: &[RollbackEntry],
    file_count: u64,
    total_bytes: u64,
    can_rollback: bool,
) -> Result<(), OperationError> {
    let journal = serde_json::to_string(entries)?;
    let updated = conn.execute(
        "UPDATE organization_ops SET rollback_entries = ?2, file_count = ?3,
                                     total_bytes = ?4, can_rollback = ?5
         WHERE id = ?1",
        params![
            op_id,
            journal,
            file_count as i64,
            total_bytes as i64,
            can_rollback
        ],
    )?;
    if updated == 0 {
        return Err(OperationError::not_found("organization_op", op_id));
    }
    Ok(())
}

pub fn mark_operation_rolled_back(
    conn: &Connection,
    op_id: &str,
    at: DateTime<Utc>,
) -> Result<(), OperationError> {
    let updated = conn.execute(
        "UPDATE organization_ops SET is_rolled_back = 1, can_rollback = 0, rolled_back_at = ?2
         WHERE id = ?1",
        params![op_id, ts(at)],
    )?;
    if updated == 0 {
        return Err(OperationError::not_found("organization_op", op_id));
    }
    Ok(())
}
