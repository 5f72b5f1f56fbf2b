//! Catalog, collection, and job models.
//!
//! Aggregates own their children by value (catalog → games → entries);
//! cross-aggregate references are stable string ids only. Timestamps are
//! UTC; file modification times are unix seconds, which is what both the
//! hash cache and the incremental scanner compare against.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::fingerprint::Fingerprint;

// ── Catalogs ────────────────────────────────────────────────────────────────

/// Which preservation project published a DAT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CatalogProvider {
    NoIntro,
    Redump,
    Tosec,
    Mame,
    Custom,
}

impl CatalogProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            CatalogProvider::NoIntro => "no-intro",
            CatalogProvider::Redump => "redump",
            CatalogProvider::Tosec => "tosec",
            CatalogProvider::Mame => "mame",
            CatalogProvider::Custom => "custom",
        }
    }

    pub fn parse_str(s: &str) -> Self {
        match s {
            "no-intro" => CatalogProvider::NoIntro,
            "redump" => CatalogProvider::Redump,
            "tosec" => CatalogProvider::Tosec,
            "mame" => CatalogProvider::Mame,
            _ => CatalogProvider::Custom,
        }
    }

    /// Guess the provider from a DAT header name/description line.
    pub fn infer(header_name: &str) -> Self {
        let lower = header_name.to_lowercase();
        if lower.contains("no-intro") || lower.contains("nointro") {
            CatalogProvider::NoIntro
        } else if lower.contains("redump") {
            CatalogProvider::Redump
        } else if lower.contains("tosec") {
            CatalogProvider::Tosec
        } else if lower.contains("mame") {
            CatalogProvider::Mame
        } else {
            CatalogProvider::Custom
        }
    }
}

/// An imported DAT file and its aggregate counts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Catalog {
    /// UUIDv4.
    pub id: String,
    /// Original DAT filename.
    pub filename: String,
    pub display_name: String,
    pub description: Option<String>,
    pub version: Option<String>,
    pub provider: CatalogProvider,
    /// Slash-delimited grouping path, e.g. "Nintendo/NES".
    pub category_path: String,
    pub system: Option<String>,
    pub game_count: u64,
    pub rom_count: u64,
    pub total_size: u64,
    pub is_enabled: bool,
    pub imported_at: DateTime<Utc>,
}

/// Dump status of a catalog entry as declared by the DAT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    #[default]
    Good,
    Verified,
    BadDump,
    NoDump,
}

impl EntryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryStatus::Good => "good",
            EntryStatus::Verified => "verified",
            EntryStatus::BadDump => "baddump",
            EntryStatus::NoDump => "nodump",
        }
    }

    pub fn parse_str(s: &str) -> Self {
        match s {
            "verified" => EntryStatus::Verified,
            "baddump" => EntryStatus::BadDump,
            "nodump" => EntryStatus::NoDump,
            _ => EntryStatus::Good,
        }
    }
}

/// A game inside a catalog. `clone_of`/`rom_of` reference another game's
/// name within the same catalog; resolution is lazy (see the parent/clone
/// index in rom-steward-catalog).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameEntry {
    pub id: String,
    pub catalog_id: String,
    /// Unique within the catalog.
    pub name: String,
    pub description: Option<String>,
    pub year: Option<String>,
    pub publisher: Option<String>,
    pub region: Option<String>,
    pub languages: Option<String>,
    pub clone_of: Option<String>,
    pub rom_of: Option<String>,
    pub is_bios: bool,
    pub is_device: bool,
    pub is_mechanical: bool,
    pub category: Option<String>,
}

/// A ROM row inside a game. Carries at least one hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub id: String,
    pub game_id: String,
    pub name: String,
    pub expected_size: u64,
    pub fingerprint: Fingerprint,
    pub status: EntryStatus,
    pub serial: Option<String>,
    pub is_bios: bool,
    /// Merge target name for split/merged MAME sets.
    pub merge: Option<String>,
}

// ── Volumes & stored files ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VolumeKind {
    Fixed,
    Removable,
    Network,
    Optical,
    #[default]
    Unknown,
}

impl VolumeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            VolumeKind::Fixed => "fixed",
            VolumeKind::Removable => "removable",
            VolumeKind::Network => "network",
            VolumeKind::Optical => "optical",
            VolumeKind::Unknown => "unknown",
        }
    }

    pub fn parse_str(s: &str) -> Self {
        match s {
            "fixed" => VolumeKind::Fixed,
            "removable" => VolumeKind::Removable,
            "network" => VolumeKind::Network,
            "optical" => VolumeKind::Optical,
            _ => VolumeKind::Unknown,
        }
    }
}

/// A registered storage root. Going offline never deletes the volume or
/// its ROM records; `is_online` just flips on poll.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Volume {
    pub id: String,
    pub label: String,
    pub root_path: String,
    pub kind: VolumeKind,
    pub is_online: bool,
    pub last_seen_at: DateTime<Utc>,
    pub total_size: Option<u64>,
    pub free_space: Option<u64>,
    pub auto_scan: bool,
}

/// Verification outcome for a stored file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VerificationStatus {
    #[default]
    Unknown,
    Verified,
    Unverified,
    NotInCatalog,
    BadDump,
}

impl VerificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationStatus::Unknown => "unknown",
            VerificationStatus::Verified => "verified",
            VerificationStatus::Unverified => "unverified",
            VerificationStatus::NotInCatalog => "notInCatalog",
            VerificationStatus::BadDump => "badDump",
        }
    }

    pub fn parse_str(s: &str) -> Self {
        match s {
            "verified" => VerificationStatus::Verified,
            "unverified" => VerificationStatus::Unverified,
            "notInCatalog" => VerificationStatus::NotInCatalog,
            "badDump" => VerificationStatus::BadDump,
            _ => VerificationStatus::Unknown,
        }
    }
}

/// A file found on a volume, possibly inside an archive.
///
/// Invariant: `is_archived` implies both `archive_path` and
/// `path_in_archive` are set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredRomFile {
    pub id: String,
    pub volume_id: String,
    /// Path relative to the volume root.
    pub relative_path: String,
    pub filename: String,
    pub size: u64,
    /// Absent until the file has been hashed.
    pub fingerprint: Option<Fingerprint>,
    pub scanned_at: DateTime<Utc>,
    pub hashed_at: Option<DateTime<Utc>>,
    /// Unix seconds.
    pub last_modified: i64,
    pub is_archived: bool,
    pub archive_path: Option<String>,
    pub path_in_archive: Option<String>,
    pub verification_status: VerificationStatus,
    pub matched_catalog_id: Option<String>,
    pub matched_entry_id: Option<String>,
}

// ── Scan jobs ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanJobKind {
    Full,
    Incremental,
}

impl ScanJobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanJobKind::Full => "full",
            ScanJobKind::Incremental => "incremental",
        }
    }

    pub fn parse_str(s: &str) -> Self {
        match s {
            "incremental" => ScanJobKind::Incremental,
            _ => ScanJobKind::Full,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanJobStatus {
    #[default]
    Queued,
    Running,
    Paused,
    Completed,
    Failed,
    Cancelled,
}

impl ScanJobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanJobStatus::Queued => "queued",
            ScanJobStatus::Running => "running",
            ScanJobStatus::Paused => "paused",
            ScanJobStatus::Completed => "completed",
            ScanJobStatus::Failed => "failed",
            ScanJobStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse_str(s: &str) -> Self {
        match s {
            "running" => ScanJobStatus::Running,
            "paused" => ScanJobStatus::Paused,
            "completed" => ScanJobStatus::Completed,
            "failed" => ScanJobStatus::Failed,
            "cancelled" => ScanJobStatus::Cancelled,
            _ => ScanJobStatus::Queued,
        }
    }

    /// Completed, failed, and cancelled jobs never transition again.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ScanJobStatus::Completed | ScanJobStatus::Failed | ScanJobStatus::Cancelled
        )
    }

    /// Valid transitions of the scan-job state machine.
    pub fn can_transition_to(&self, next: ScanJobStatus) -> bool {
        match (self, next) {
            (ScanJobStatus::Queued, ScanJobStatus::Running) => true,
            (ScanJobStatus::Queued, ScanJobStatus::Cancelled) => true,
            (
                ScanJobStatus::Running,
                ScanJobStatus::Paused
                | ScanJobStatus::Completed
                | ScanJobStatus::Failed
                | ScanJobStatus::Cancelled,
            ) => true,
            (ScanJobStatus::Paused | ScanJobStatus::Failed, ScanJobStatus::Running) => true,
            (ScanJobStatus::Paused, ScanJobStatus::Cancelled) => true,
            _ => false,
        }
    }
}

/// A persisted scan job. Resume continues from the checkpoint; jobs never
/// restart from zero once they have run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanJob {
    pub id: String,
    pub kind: ScanJobKind,
    pub target_volume_id: Option<String>,
    pub target_path: Option<String>,
    pub status: ScanJobStatus,
    pub queued_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub processed_items: u64,
    pub total_items: u64,
    pub processed_bytes: u64,
    pub total_bytes: u64,
    pub last_processed_path: Option<String>,
    pub resume_count: u32,
    pub phase: Option<String>,
}

// ── Hash jobs ───────────────────────────────────────────────────────────────

/// Priority levels for the hash-job pool, weakest first so `Ord` sorts
/// background below critical.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HashPriority {
    Background,
    Normal,
    High,
    Critical,
}

impl HashPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            HashPriority::Background => "background",
            HashPriority::Normal => "normal",
            HashPriority::High => "high",
            HashPriority::Critical => "critical",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HashJobState {
    Queued,
    InProgress,
    Completed,
    Failed,
    Cancelled,
}

impl HashJobState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            HashJobState::Completed | HashJobState::Failed | HashJobState::Cancelled
        )
    }
}

// ── Organization ────────────────────────────────────────────────────────────

/// One restorable move recorded by the organizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollbackEntry {
    /// Where the file is now (the organize destination).
    pub current_path: String,
    /// Where it came from.
    pub original_path: String,
    pub was_moved: bool,
}

/// A completed (or in-flight) organization run and its rollback journal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrganizationOperation {
    /// UUIDv4.
    pub id: String,
    pub performed_at: DateTime<Utc>,
    pub source_root: String,
    pub destination_root: String,
    pub template_name: String,
    pub was_move: bool,
    pub file_count: u64,
    pub total_bytes: u64,
    pub can_rollback: bool,
    pub rollback_entries: Vec<RollbackEntry>,
    pub is_rolled_back: bool,
    pub rolled_back_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_job_transitions() {
        use ScanJobStatus::*;
        assert!(Queued.can_transition_to(Running));
        assert!(Running.can_transition_to(Paused));
        assert!(Paused.can_transition_to(Running));
        assert!(Failed.can_transition_to(Running));
        assert!(!Completed.can_transition_to(Running));
        assert!(!Paused.can_transition_to(Completed));
        assert!(!Cancelled.can_transition_to(Running));
    }

    #[test]
    fn test_priority_ordering() {
        assert!(HashPriority::Background < HashPriority::Normal);
        assert!(HashPriority::High < HashPriority::Critical);
    }

    #[test]
    fn test_provider_inference() {
        assert_eq!(
            CatalogProvider::infer("Nintendo - Game Boy (No-Intro 2024)"),
            CatalogProvider::NoIntro
        );
        assert_eq!(
            CatalogProvider::infer("Sony PlayStation - Redump.org"),
            CatalogProvider::Redump
        );
        assert_eq!(CatalogProvider::infer("My Own Set"), CatalogProvider::Custom);
    }

    #[test]
    fn test_status_round_trip() {
        for s in [
            VerificationStatus::Unknown,
            VerificationStatus::Verified,
            VerificationStatus::Unverified,
            VerificationStatus::NotInCatalog,
            VerificationStatus::BadDump,
        ] {
            assert_eq!(VerificationStatus::parse_str(s.as_str()), s);
        }
    }
}
