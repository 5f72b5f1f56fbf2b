//! Verification of stored files against the catalog store.
//!
//! A file's fingerprint is looked up across all catalogs; the outcome is
//! `verified` on the highest-tier clean match, `badDump` when any
//! matching entry is flagged as a bad dump (the bad-dump entry wins as
//! the matched entry), and `notInCatalog` when nothing matches. Filename
//! dump markers combine with the catalog verdict to attribute the
//! bad-dump source.

use rom_steward_catalog::name_parser;
use rom_steward_core::{EntryStatus, Fingerprint, MatchTier, VerificationStatus};
use rom_steward_db::{operations, queries, Connection, EntryMatch, OperationError};

use crate::progress::ImportProgress;

/// Where a bad-dump verdict came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BadDumpSource {
    /// The matched catalog entry is flagged baddump.
    DatFile,
    /// Only the filename carries a bad-dump marker.
    Filename,
    /// Both the catalog entry and the filename agree.
    Combined,
}

#[derive(Debug, Clone)]
pub struct VerificationOutcome {
    pub status: VerificationStatus,
    pub matched_catalog_id: Option<String>,
    pub matched_entry_id: Option<String>,
    pub tier: Option<MatchTier>,
    pub bad_dump_source: Option<BadDumpSource>,
}

/// Classify one fingerprint. `filename` supplies the dump markers.
pub fn verify_fingerprint(
    conn: &Connection,
    fingerprint: &Fingerprint,
    filename: &str,
) -> Result<VerificationOutcome, OperationError> {
    let matches = queries::find_entries_by_fingerprint(conn, fingerprint)?;
    Ok(classify(&matches, filename))
}

fn classify(matches: &[EntryMatch], filename: &str) -> VerificationOutcome {
    let filename_bad = name_parser::parse_name(filename).is_bad_dump();

    if matches.is_empty() {
        return VerificationOutcome {
            status: VerificationStatus::NotInCatalog,
            matched_catalog_id: None,
            matched_entry_id: None,
            tier: None,
            bad_dump_source: filename_bad.then_some(BadDumpSource::Filename),
        };
    }

    // A bad-dump entry anywhere in the match set taints the file; the
    // best-ranked bad-dump match becomes the matched entry.
    if let Some(bad) = matches.iter().find(|m| m.entry.status == EntryStatus::BadDump) {
        let source = if filename_bad {
            BadDumpSource::Combined
        } else {
            BadDumpSource::DatFile
        };
        return VerificationOutcome {
            status: VerificationStatus::BadDump,
            matched_catalog_id: Some(bad.catalog_id.clone()),
            matched_entry_id: Some(bad.entry.id.clone()),
            tier: Some(bad.tier),
            bad_dump_source: Some(source),
        };
    }

    let best = &matches[0];
    VerificationOutcome {
        status: VerificationStatus::Verified,
        matched_catalog_id: Some(best.catalog_id.clone()),
        matched_entry_id: Some(best.entry.id.clone()),
        tier: Some(best.tier),
        bad_dump_source: None,
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct VerifyStats {
    pub files_checked: u64,
    pub verified: u64,
    pub bad_dumps: u64,
    pub not_in_catalog: u64,
    pub unhashed: u64,
}

/// Verify every stored file on a volume, updating each record. Files
/// without a fingerprint are marked `unverified`. Lookups are batched so
/// the store sees O(distinct hashes) queries, not one per file.
pub fn verify_volume(
    conn: &Connection,
    volume_id: &str,
    progress: Option<&dyn ImportProgress>,
) -> Result<VerifyStats, OperationError> {
    let files = queries::rom_files_for_volume(conn, volume_id)?;
    let mut stats = VerifyStats::default();

    if let Some(p) = progress {
        p.on_phase(&format!("Verifying {} files", files.len()));
    }

    let hashed: Vec<&rom_steward_core::StoredRomFile> =
        files.iter().filter(|f| f.fingerprint.is_some()).collect();
    let fingerprints: Vec<Fingerprint> = hashed
        .iter()
        .filter_map(|f| f.fingerprint.clone())
        .collect();
    let all_matches = queries::find_entries_by_fingerprints(conn, &fingerprints)?;

    for (file, matches) in hashed.iter().zip(all_matches.iter()) {
        let outcome = classify(matches, &file.filename);
        operations::update_rom_file_verification(
            conn,
            &file.id,
            outcome.status,
            outcome.matched_catalog_id.as_deref(),
            outcome.matched_entry_id.as_deref(),
        )?;

        stats.files_checked += 1;
        match outcome.status {
            VerificationStatus::Verified => stats.verified += 1,
            VerificationStatus::BadDump => stats.bad_dumps += 1,
            VerificationStatus::NotInCatalog => stats.not_in_catalog += 1,
            _ => {}
        }
        if let Some(p) = progress {
            p.on_progress(stats.files_checked as usize, "files verified");
        }
    }

    for file in files.iter().filter(|f| f.fingerprint.is_none()) {
        operations::update_rom_file_verification(
            conn,
            &file.id,
            VerificationStatus::Unverified,
            None,
            None,
        )?;
        stats.files_checked += 1;
        stats.unhashed += 1;
    }

    if let Some(p) = progress {
        p.on_complete(&format!(
            "Verified {}: {} good, {} bad dumps, {} unknown to catalogs",
            stats.files_checked, stats.verified, stats.bad_dumps, stats.not_in_catalog
        ));
    }

    Ok(stats)
}
