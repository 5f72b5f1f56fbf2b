//! SQLite persistence layer.
//!
//! Provides schema creation, CRUD and bulk-import operations, and the
//! hash-indexed lookup queries, backed by SQLite (rusqlite with the
//! bundled feature).

pub mod operations;
pub mod queries;
pub mod schema;

pub use operations::{
    bulk_insert_entries, bulk_insert_games, bulk_insert_rom_files, delete_catalog,
    delete_rom_files, insert_catalog, insert_operation, insert_scan_job,
    mark_operation_rolled_back, set_catalog_enabled, set_volume_online, update_catalog_counts,
    update_operation_journal, update_rom_file_verification, update_scan_job, upsert_rom_file,
    upsert_volume, BulkMode, BulkStats, OperationError, ENTRY_CHUNK_SIZE, GAME_CHUNK_SIZE,
    ROM_FILE_CHUNK_SIZE,
};
pub use queries::{
    active_jobs_for_volume, catalog_summaries, duplicate_groups, find_entries_by_fingerprint,
    find_entries_by_fingerprints, games_for_catalog, get_catalog, get_operation, get_rom_file,
    get_scan_job, get_volume, has_active_job_for_volume, list_catalogs, list_operations,
    list_scan_jobs, list_volumes, rom_file_snapshot, rom_files_for_volume,
    verification_counts, CatalogSummary, DuplicateGroup, EntryMatch, VerificationCounts,
};
pub use rusqlite::Connection;
pub use schema::{open_database, open_memory};
