//! Read queries: hash-indexed lookup, duplicates, jobs, and listings.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};

use rom_steward_core::{
    Catalog, CatalogEntry, CatalogProvider, EntryStatus, Fingerprint, MatchTier,
    OrganizationOperation, ScanJob, ScanJobKind, ScanJobStatus, StoredRomFile,
    VerificationStatus, Volume, VolumeKind,
};

use crate::operations::OperationError;

// ── Column constants ────────────────────────────────────────────────────────

const CATALOG_COLUMNS: &str =
    "id, filename, display_name, description, version, provider, category_path, system, \
     game_count, rom_count, total_size, is_enabled, imported_at";

const ENTRY_COLUMNS: &str =
    "id, game_id, name, size, crc32, md5, sha1, status, serial, is_bios, merge";

const ROM_FILE_COLUMNS: &str =
    "id, volume_id, relative_path, filename, size, crc32, md5, sha1, scanned_at, hashed_at, \
     last_modified, is_archived, archive_path, path_in_archive, verification_status, \
     matched_catalog_id, matched_entry_id";

const SCAN_JOB_COLUMNS: &str =
    "id, kind, target_volume_id, target_path, status, queued_at, started_at, completed_at, \
     processed_items, total_items, processed_bytes, total_bytes, last_processed_path, \
     resume_count, phase";

const VOLUME_COLUMNS: &str =
    "id, label, root_path, kind, is_online, last_seen_at, total_size, free_space, auto_scan";

const OP_COLUMNS: &str =
    "id, performed_at, source_root, destination_root, template_name, was_move, file_count, \
     total_bytes, can_rollback, rollback_entries, is_rolled_back, rolled_back_at";

// ── Row mappers ─────────────────────────────────────────────────────────────

fn parse_ts(value: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&value)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| DateTime::<Utc>::UNIX_EPOCH)
}

fn parse_ts_opt(value: Option<String>) -> Option<DateTime<Utc>> {
    value.map(parse_ts)
}

fn fingerprint_from_parts(
    crc32: Option<String>,
    md5: Option<String>,
    sha1: Option<String>,
) -> Option<Fingerprint> {
    let fp = Fingerprint::new(crc32.as_deref(), md5.as_deref(), sha1.as_deref()).ok()?;
    if fp.is_empty() {
        None
    } else {
        Some(fp)
    }
}

fn row_to_catalog(row: &Row<'_>) -> rusqlite::Result<Catalog> {
    Ok(Catalog {
        id: row.get(0)?,
        filename: row.get(1)?,
        display_name: row.get(2)?,
        description: row.get(3)?,
        version: row.get(4)?,
        provider: CatalogProvider::parse_str(&row.get::<_, String>(5)?),
        category_path: row.get(6)?,
        system: row.get(7)?,
        game_count: row.get::<_, i64>(8)? as u64,
        rom_count: row.get::<_, i64>(9)? as u64,
        total_size: row.get::<_, i64>(10)? as u64,
        is_enabled: row.get(11)?,
        imported_at: parse_ts(row.get(12)?),
    })
}

fn row_to_entry(row: &Row<'_>) -> rusqlite::Result<CatalogEntry> {
    let fingerprint = fingerprint_from_parts(row.get(4)?, row.get(5)?, row.get(6)?)
        .unwrap_or_default();
    Ok(CatalogEntry {
        id: row.get(0)?,
        game_id: row.get(1)?,
        name: row.get(2)?,
        expected_size: row.get::<_, i64>(3)? as u64,
        fingerprint,
        status: EntryStatus::parse_str(&row.get::<_, String>(7)?),
        serial: row.get(8)?,
        is_bios: row.get(9)?,
        merge: row.get(10)?,
    })
}

fn row_to_rom_file(row: &Row<'_>) -> rusqlite::Result<StoredRomFile> {
    Ok(StoredRomFile {
        id: row.get(0)?,
        volume_id: row.get(1)?,
        relative_path: row.get(2)?,
        filename: row.get(3)?,
        size: row.get::<_, i64>(4)? as u64,
        fingerprint: fingerprint_from_parts(row.get(5)?, row.get(6)?, row.get(7)?),
        scanned_at: parse_ts(row.get(8)?),
        hashed_at: parse_ts_opt(row.get(9)?),
        last_modified: row.get(10)?,
        is_archived: row.get(11)?,
        archive_path: row.get(12)?,
        path_in_archive: row.get(13)?,
        verification_status: VerificationStatus::parse_str(&row.get::<_, String>(14)?),
        matched_catalog_id: row.get(15)?,
        matched_entry_id: row.get(16)?,
    })
}

fn row_to_scan_job(row: &Row<'_>) -> rusqlite::Result<ScanJob> {
    Ok(ScanJob {
        id: row.get(0)?,
        kind: ScanJobKind::parse_str(&row.get::<_, String>(1)?),
        target_volume_id: row.get(2)?,
        target_path: row.get(3)?,
        status: ScanJobStatus::parse_str(&row.get::<_, String>(4)?),
        queued_at: parse_ts(row.get(5)?),
        started_at: parse_ts_opt(row.get(6)?),
        completed_at: parse_ts_opt(row.get(7)?),
        processed_items: row.get::<_, i64>(8)? as u64,
        total_items: row.get::<_, i64>(9)? as u64,
        processed_bytes: row.get::<_, i64>(10)? as u64,
        total_bytes: row.get::<_, i64>(11)? as u64,
        last_processed_path: row.get(12)?,
        resume_count: row.get(13)?,
        phase: row.get(14)?,
    })
}

fn row_to_volume(row: &Row<'_>) -> rusqlite::Result<Volume> {
    Ok(Volume {
        id: row.get(0)?,
        label: row.get(1)?,
        root_path: row.get(2)?,
        kind: VolumeKind::parse_str(&row.get::<_, String>(3)?),
        is_online: row.get(4)?,
        last_seen_at: parse_ts(row.get(5)?),
        total_size: row.get::<_, Option<i64>>(6)?.map(|v| v as u64),
        free_space: row.get::<_, Option<i64>>(7)?.map(|v| v as u64),
        auto_scan: row.get(8)?,
    })
}

fn row_to_operation(row: &Row<'_>) -> rusqlite::Result<OrganizationOperation> {
    let journal: String = row.get(9)?;
    let rollback_entries = serde_json::from_str(&journal).unwrap_or_default();
    Ok(OrganizationOperation {
        id: row.get(0)?,
        performed_at: parse_ts(row.get(1)?),
        source_root: row.get(2)?,
        destination_root: row.get(3)?,
        template_name: row.get(4)?,
        was_move: row.get(5)?,
        file_count: row.get::<_, i64>(6)? as u64,
        total_bytes: row.get::<_, i64>(7)? as u64,
        can_rollback: row.get(8)?,
        rollback_entries,
        is_rolled_back: row.get(10)?,
        rolled_back_at: parse_ts_opt(row.get(11)?),
    })
}

// ── Catalog & entry lookups ─────────────────────────────────────────────────

pub fn get_catalog(conn: &Connection, id: &str) -> Result<Option<Catalog>, OperationError> {
    let sql = format!("SELECT {CATALOG_COLUMNS} FROM catalogs WHERE id = ?1");
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query_map(params![id], row_to_catalog)?;
    rows.next().transpose().map_err(Into::into)
}

pub fn list_catalogs(conn: &Connection) -> Result<Vec<Catalog>, OperationError> {
    let sql = format!("SELECT {CATALOG_COLUMNS} FROM catalogs ORDER BY rowid");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], row_to_catalog)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
}

const GAME_COLUMNS: &str =
    "id, catalog_id, name, description, year, publisher, region, languages, clone_of, \
     rom_of, is_bios, is_device, is_mechanical, category";

fn row_to_game(row: &Row<'_>) -> rusqlite::Result<rom_steward_core::GameEntry> {
    Ok(rom_steward_core::GameEntry {
        id: row.get(0)?,
        catalog_id: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        year: row.get(4)?,
        publisher: row.get(5)?,
        region: row.get(6)?,
        languages: row.get(7)?,
        clone_of: row.get(8)?,
        rom_of: row.get(9)?,
        is_bios: row.get(10)?,
        is_device: row.get(11)?,
        is_mechanical: row.get(12)?,
        category: row.get(13)?,
    })
}

/// All games of a catalog, in name order.
pub fn games_for_catalog(
    conn: &Connection,
    catalog_id: &str,
) -> Result<Vec<rom_steward_core::GameEntry>, OperationError> {
    let sql = format!("SELECT {GAME_COLUMNS} FROM games WHERE catalog_id = ?1 ORDER BY name");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![catalog_id], row_to_game)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
}

/// A catalog entry matched by fingerprint, with its ranking context.
#[derive(Debug, Clone)]
pub struct EntryMatch {
    pub entry: CatalogEntry,
    pub game_name: String,
    pub catalog_id: String,
    pub catalog_enabled: bool,
    pub tier: MatchTier,
    catalog_order: i64,
}

/// Find all catalog entries where any hash component matches the
/// fingerprint's corresponding component. Results are ranked: SHA-1
/// matches first, then MD5, then CRC32; within a tier, enabled catalogs
/// before disabled, then catalog insertion order.
pub fn find_entries_by_fingerprint(
    conn: &Connection,
    fingerprint: &Fingerprint,
) -> Result<Vec<EntryMatch>, OperationError> {
    let mut matches: Vec<EntryMatch> = Vec::new();
    let mut seen: std::collections::HashSet<String> = std::collections::HashSet::new();

    let probes: [(MatchTier, &str, Option<&str>); 3] = [
        (MatchTier::Sha1, "sha1", fingerprint.sha1()),
        (MatchTier::Md5, "md5", fingerprint.md5()),
        (MatchTier::Crc32, "crc32", fingerprint.crc32()),
    ];

    for (tier, column, value) in probes {
        let Some(value) = value else { continue };
        let sql = format!(
            "SELECT {cols}, g.name, g.catalog_id, c.is_enabled, c.rowid
             FROM entries e
             JOIN games g ON e.game_id = g.id
             JOIN catalogs c ON g.catalog_id = c.id
             WHERE e.{column} = ?1",
            cols = entry_cols_aliased(),
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![value], |row| {
            let entry = row_to_entry(row)?;
            Ok(EntryMatch {
                entry,
                game_name: row.get(11)?,
                catalog_id: row.get(12)?,
                catalog_enabled: row.get(13)?,
                tier,
                catalog_order: row.get(14)?,
            })
        })?;
        for m in rows {
            let m = m?;
            // First tier wins for an entry seen under several hashes
            if seen.insert(m.entry.id.clone()) {
                matches.push(m);
            }
        }
    }

    matches.sort_by(|a, b| {
        a.tier
            .cmp(&b.tier)
            .then_with(|| b.catalog_enabled.cmp(&a.catalog_enabled))
            .then_with(|| a.catalog_order.cmp(&b.catalog_order))
            .then_with(|| a.entry.id.cmp(&b.entry.id))
    });

    Ok(matches)
}

fn entry_cols_aliased() -> String {
    ENTRY_COLUMNS
        .split(", ")
        .map(|c| format!("e.{c}"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Batch lookup. Issues one query per distinct hash column value set
/// (chunked), not one per fingerprint; results are returned positionally.
pub fn find_entries_by_fingerprints(
    conn: &Connection,
    fingerprints: &[Fingerprint],
) -> Result<Vec<Vec<EntryMatch>>, OperationError> {
    // hash value → matches, per column
    let mut by_sha1: HashMap<String, Vec<EntryMatch>> = HashMap::new();
    let mut by_md5: HashMap<String, Vec<EntryMatch>> = HashMap::new();
    let mut by_crc: HashMap<String, Vec<EntryMatch>> = HashMap::new();

    let collect = |values: Vec<&str>,
                   column: &str,
                   tier: MatchTier,
                   out: &mut HashMap<String, Vec<EntryMatch>>|
     -> Result<(), OperationError> {
        // SQLite parameter limit is 999; stay well below it
        for chunk in values.chunks(500) {
            if chunk.is_empty() {
                continue;
            }
            let placeholders = (1..=chunk.len())
                .map(|i| format!("?{i}"))
                .collect::<Vec<_>>()
                .join(", ");
            let sql = format!(
                "SELECT {cols}, g.name, g.catalog_id, c.is_enabled, c.rowid, e.{column}
                 FROM entries e
                 JOIN games g ON e.game_id = g.id
                 JOIN catalogs c ON g.catalog_id = c.id
                 WHERE e.{column} IN ({placeholders})",
                cols = entry_cols_aliased(),
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(rusqlite::params_from_iter(chunk.iter().copied()), |row| {
                let entry = row_to_entry(row)?;
                let key: String = row.get(15)?;
                Ok((
                    key,
                    EntryMatch {
                        entry,
                        game_name: row.get(11)?,
                        catalog_id: row.get(12)?,
                        catalog_enabled: row.get(13)?,
                        tier,
                        catalog_order: row.get(14)?,
                    },
                ))
            })?;
            for item in rows {
                let (key, m) = item?;
                out.entry(key).or_default().push(m);
            }
        }
        Ok(())
    };

    fn distinct(values: Vec<Option<&str>>) -> Vec<&str> {
        let mut out: Vec<&str> = values.into_iter().flatten().collect();
        out.sort_unstable();
        out.dedup();
        out
    }

    collect(
        distinct(fingerprints.iter().map(|f| f.sha1()).collect()),
        "sha1",
        MatchTier::Sha1,
        &mut by_sha1,
    )?;
    collect(
        distinct(fingerprints.iter().map(|f| f.md5()).collect()),
        "md5",
        MatchTier::Md5,
        &mut by_md5,
    )?;
    collect(
        distinct(fingerprints.iter().map(|f| f.crc32()).collect()),
        "crc32",
        MatchTier::Crc32,
        &mut by_crc,
    )?;

    let mut results = Vec::with_capacity(fingerprints.len());
    for fp in fingerprints {
        let mut matches: Vec<EntryMatch> = Vec::new();
        let mut seen: std::collections::HashSet<String> = std::collections::HashSet::new();
        for (value, map) in [
            (fp.sha1(), &by_sha1),
            (fp.md5(), &by_md5),
            (fp.crc32(), &by_crc),
        ] {
            if let Some(found) = value.and_then(|v| map.get(v)) {
                for m in found {
                    if seen.insert(m.entry.id.clone()) {
                        matches.push(m.clone());
                    }
                }
            }
        }
        matches.sort_by(|a, b| {
            a.tier
                .cmp(&b.tier)
                .then_with(|| b.catalog_enabled.cmp(&a.catalog_enabled))
                .then_with(|| a.catalog_order.cmp(&b.catalog_order))
                .then_with(|| a.entry.id.cmp(&b.entry.id))
        });
        results.push(matches);
    }

    Ok(results)
}

// ── Duplicates ──────────────────────────────────────────────────────────────

/// A set of stored files sharing one full fingerprint.
#[derive(Debug, Clone)]
pub struct DuplicateGroup {
    pub fingerprint: Fingerprint,
    pub count: u64,
    pub total_bytes: u64,
    /// Everything beyond the largest member is reclaimable.
    pub wasted_bytes: u64,
    pub file_ids: Vec<String>,
}

/// Group stored files by fingerprint; groups of two or more are
/// duplicates. Ordered by wasted bytes descending, then group size.
pub fn duplicate_groups(conn: &Connection) -> Result<Vec<DuplicateGroup>, OperationError> {
    let mut stmt = conn.prepare(
        "SELECT COALESCE(sha1, ''), COALESCE(md5, ''), COALESCE(crc32, ''),
                COUNT(*), SUM(size), MAX(size), GROUP_CONCAT(id)
         FROM rom_files
         WHERE sha1 IS NOT NULL OR md5 IS NOT NULL OR crc32 IS NOT NULL
         GROUP BY COALESCE(sha1, ''), COALESCE(md5, ''), COALESCE(crc32, '')
         HAVING COUNT(*) >= 2
         ORDER BY (SUM(size) - MAX(size)) DESC, COUNT(*) DESC",
    )?;

    let rows = stmt.query_map([], |row| {
        let sha1: String = row.get(0)?;
        let md5: String = row.get(1)?;
        let crc32: String = row.get(2)?;
        let count: i64 = row.get(3)?;
        let total: i64 = row.get(4)?;
        let largest: i64 = row.get(5)?;
        let ids: String = row.get(6)?;
        Ok((sha1, md5, crc32, count, total, largest, ids))
    })?;

    let mut groups = Vec::new();
    for row in rows {
        let (sha1, md5, crc32, count, total, largest, ids) = row?;
        let fingerprint = Fingerprint::new(
            nonempty(&crc32),
            nonempty(&md5),
            nonempty(&sha1),
        )
        .unwrap_or_default();
        groups.push(DuplicateGroup {
            fingerprint,
            count: count as u64,
            total_bytes: total as u64,
            wasted_bytes: (total - largest).max(0) as u64,
            file_ids: ids.split(',').map(|s| s.to_string()).collect(),
        });
    }
    Ok(groups)
}

fn nonempty(s: &str) -> Option<&str> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

// ── Stored ROM files ────────────────────────────────────────────────────────

pub fn get_rom_file(conn: &Connection, id: &str) -> Result<Option<StoredRomFile>, OperationError> {
    let sql = format!("SELECT {ROM_FILE_COLUMNS} FROM rom_files WHERE id = ?1");
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query_map(params![id], row_to_rom_file)?;
    rows.next().transpose().map_err(Into::into)
}

pub fn rom_files_for_volume(
    conn: &Connection,
    volume_id: &str,
) -> Result<Vec<StoredRomFile>, OperationError> {
    let sql = format!(
        "SELECT {ROM_FILE_COLUMNS} FROM rom_files WHERE volume_id = ?1 ORDER BY relative_path"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![volume_id], row_to_rom_file)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
}

/// The incremental-scan snapshot for a volume: absolute path →
/// (mtime, size). Archive members are excluded; the archive file itself
/// carries the snapshot key.
pub fn rom_file_snapshot(
    conn: &Connection,
    volume_id: &str,
    volume_root: &Path,
) -> Result<HashMap<PathBuf, (i64, u64)>, OperationError> {
    let mut stmt = conn.prepare(
        "SELECT relative_path, last_modified, size FROM rom_files
         WHERE volume_id = ?1 AND is_archived = 0",
    )?;
    let rows = stmt.query_map(params![volume_id], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, i64>(1)?,
            row.get::<_, i64>(2)?,
        ))
    })?;

    let mut snapshot = HashMap::new();
    for row in rows {
        let (relative, mtime, size) = row?;
        snapshot.insert(volume_root.join(relative), (mtime, size as u64));
    }
    Ok(snapshot)
}

/// Per-status counts for reporting.
#[derive(Debug, Clone, Copy, Default)]
pub struct VerificationCounts {
    pub unknown: u64,
    pub verified: u64,
    pub unverified: u64,
    pub not_in_catalog: u64,
    pub bad_dump: u64,
}

pub fn verification_counts(
    conn: &Connection,
    volume_id: Option<&str>,
) -> Result<VerificationCounts, OperationError> {
    let sql = match volume_id {
        Some(_) => {
            "SELECT verification_status, COUNT(*) FROM rom_files WHERE volume_id = ?1 \
             GROUP BY verification_status"
        }
        None => "SELECT verification_status, COUNT(*) FROM rom_files GROUP BY verification_status",
    };
    let mut stmt = conn.prepare(sql)?;

    let mapper = |row: &Row<'_>| -> rusqlite::Result<(String, i64)> {
        Ok((row.get(0)?, row.get(1)?))
    };
    let rows: Vec<(String, i64)> = match volume_id {
        Some(id) => stmt
            .query_map(params![id], mapper)?
            .collect::<Result<_, _>>()?,
        None => stmt.query_map([], mapper)?.collect::<Result<_, _>>()?,
    };

    let mut counts = VerificationCounts::default();
    for (status, count) in rows {
        let count = count as u64;
        match VerificationStatus::parse_str(&status) {
            VerificationStatus::Unknown => counts.unknown += count,
            VerificationStatus::Verified => counts.verified += count,
            VerificationStatus::Unverified => counts.unverified += count,
            VerificationStatus::NotInCatalog => counts.not_in_catalog += count,
            VerificationStatus::BadDump => counts.bad_dump += count,
        }
    }
    Ok(counts)
}

/// Per-catalog matched-file counts for the status report.
#[derive(Debug, Clone)]
pub struct CatalogSummary {
    pub catalog: Catalog,
    pub matched_files: u64,
}

pub fn catalog_summaries(conn: &Connection) -> Result<Vec<CatalogSummary>, OperationError> {
    let catalogs = list_catalogs(conn)?;
    let mut stmt =
        conn.prepare("SELECT COUNT(*) FROM rom_files WHERE matched_catalog_id = ?1")?;

    let mut summaries = Vec::with_capacity(catalogs.len());
    for catalog in catalogs {
        let matched_files: i64 = stmt.query_row(params![catalog.id], |row| row.get(0))?;
        summaries.push(CatalogSummary {
            catalog,
            matched_files: matched_files as u64,
        });
    }
    Ok(summaries)
}

// ── Volumes ─────────────────────────────────────────────────────────────────

pub fn get_volume(conn: &Connection, id: &str) -> Result<Option<Volume>, OperationError> {
    let sql = format!("SELECT {VOLUME_COLUMNS} FROM volumes WHERE id = ?1");
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query_map(params![id], row_to_volume)?;
    rows.next().transpose().map_err(Into::into)
}

pub fn list_volumes(conn: &Connection) -> Result<Vec<Volume>, OperationError> {
    let sql = format!("SELECT {VOLUME_COLUMNS} FROM volumes ORDER BY label");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], row_to_volume)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
}

// ── Scan jobs ───────────────────────────────────────────────────────────────

pub fn get_scan_job(conn: &Connection, id: &str) -> Result<Option<ScanJob>, OperationError> {
    let sql = format!("SELECT {SCAN_JOB_COLUMNS} FROM scan_jobs WHERE id = ?1");
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query_map(params![id], row_to_scan_job)?;
    rows.next().transpose().map_err(Into::into)
}

pub fn list_scan_jobs(conn: &Connection) -> Result<Vec<ScanJob>, OperationError> {
    let sql = format!("SELECT {SCAN_JOB_COLUMNS} FROM scan_jobs ORDER BY queued_at DESC");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], row_to_scan_job)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
}

/// Active (non-terminal) jobs targeting a volume.
pub fn active_jobs_for_volume(
    conn: &Connection,
    volume_id: &str,
) -> Result<Vec<ScanJob>, OperationError> {
    let sql = format!(
        "SELECT {SCAN_JOB_COLUMNS} FROM scan_jobs
         WHERE target_volume_id = ?1 AND status IN ('queued', 'running', 'paused')
         ORDER BY queued_at"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![volume_id], row_to_scan_job)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
}

/// Guard for starting new scans: true while any job for the volume is
/// queued, running, or paused.
pub fn has_active_job_for_volume(
    conn: &Connection,
    volume_id: &str,
) -> Result<bool, OperationError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM scan_jobs
         WHERE target_volume_id = ?1 AND status IN ('queued', 'running', 'paused')",
        params![volume_id],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

// ── Organization operations ─────────────────────────────────────────────────

pub fn get_operation(
    conn: &Connection,
    id: &str,
) -> Result<Option<OrganizationOperation>, OperationError> {
    let sql = format!("SELECT {OP_COLUMNS} FROM organization_ops WHERE id = ?1");
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query_map(params![id], row_to_operation)?;
    rows.next().transpose().map_err(Into::into)
}

pub fn list_operations(conn: &Connection) -> Result<Vec<OrganizationOperation>, OperationError> {
    let sql = format!("SELECT {OP_COLUMNS} FROM organization_ops ORDER BY performed_at DESC");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], row_to_operation)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
}
