use chrono::Utc;

use rom_steward_core::*;
use rom_steward_db::*;

fn catalog(id: &str, name: &str) -> Catalog {
    Catalog {
        id: id.to_string(),
        filename: format!("{name}.dat"),
        display_name: name.to_string(),
        description: None,
        version: Some("20240101".to_string()),
        provider: CatalogProvider::NoIntro,
        category_path: "Nintendo/NES".to_string(),
        system: Some("NES".to_string()),
        game_count: 0,
        rom_count: 0,
        total_size: 0,
        is_enabled: true,
        imported_at: Utc::now(),
    }
}

fn game(id: &str, catalog_id: &str, name: &str) -> GameEntry {
    GameEntry {
        id: id.to_string(),
        catalog_id: catalog_id.to_string(),
        name: name.to_string(),
        description: None,
        year: None,
        publisher: None,
        region: None,
        languages: None,
        clone_of: None,
        rom_of: None,
        is_bios: false,
        is_device: false,
        is_mechanical: false,
        category: None,
    }
}

fn entry(id: &str, game_id: &str, name: &str, crc: &str) -> CatalogEntry {
    CatalogEntry {
        id: id.to_string(),
        game_id: game_id.to_string(),
        name: name.to_string(),
        expected_size: 1024,
        fingerprint: Fingerprint::new(Some(crc), None, None).unwrap(),
        status: EntryStatus::Good,
        serial: None,
        is_bios: false,
        merge: None,
    }
}

fn volume(id: &str, root: &str) -> Volume {
    Volume {
        id: id.to_string(),
        label: format!("vol-{id}"),
        root_path: root.to_string(),
        kind: VolumeKind::Fixed,
        is_online: true,
        last_seen_at: Utc::now(),
        total_size: None,
        free_space: None,
        auto_scan: false,
    }
}

fn rom_file(id: &str, volume_id: &str, rel: &str, size: u64) -> StoredRomFile {
    StoredRomFile {
        id: id.to_string(),
        volume_id: volume_id.to_string(),
        relative_path: rel.to_string(),
        filename: rel.rsplit('/').next().unwrap_or(rel).to_string(),
        size,
        fingerprint: None,
        scanned_at: Utc::now(),
        hashed_at: None,
        last_modified: 1700000000,
        is_archived: false,
        archive_path: None,
        path_in_archive: None,
        verification_status: VerificationStatus::Unknown,
        matched_catalog_id: None,
        matched_entry_id: None,
    }
}

#[test]
fn test_catalog_crud() {
    let conn = open_memory().unwrap();
    insert_catalog(&conn, &catalog("cat-1", "NES")).unwrap();

    update_catalog_counts(&conn, "cat-1", 10, 12, 4096).unwrap();
    let loaded = get_catalog(&conn, "cat-1").unwrap().unwrap();
    assert_eq!(loaded.game_count, 10);
    assert_eq!(loaded.rom_count, 12);
    assert_eq!(loaded.total_size, 4096);

    set_catalog_enabled(&conn, "cat-1", false).unwrap();
    assert!(!get_catalog(&conn, "cat-1").unwrap().unwrap().is_enabled);

    delete_catalog(&conn, "cat-1").unwrap();
    assert!(get_catalog(&conn, "cat-1").unwrap().is_none());
}

#[test]
fn test_bulk_insert_commits_per_chunk() {
    let conn = open_memory().unwrap();
    insert_catalog(&conn, &catalog("cat-1", "NES")).unwrap();

    let games: Vec<GameEntry> = (0..25)
        .map(|i| game(&format!("g{i}"), "cat-1", &format!("Game {i:02}")))
        .collect();

    let stats = bulk_insert_games(&conn, &games, 10, None).unwrap();
    assert_eq!(stats.inserted, 25);
    assert_eq!(stats.errors, 0);
    assert_eq!(stats.chunks_committed, 3);
}

#[test]
fn test_bulk_insert_failed_chunk_keeps_prior_chunks() {
    let conn = open_memory().unwrap();
    insert_catalog(&conn, &catalog("cat-1", "NES")).unwrap();

    // Chunk 1 is clean; chunk 2 contains a duplicate primary key and
    // rolls back as a unit; chunk 3 is clean again.
    let mut games: Vec<GameEntry> = (0..4)
        .map(|i| game(&format!("g{i}"), "cat-1", &format!("Game {i}")))
        .collect();
    games.push(game("g0", "cat-1", "Duplicate Id"));
    games.push(game("g5", "cat-1", "Game 5"));
    games.push(game("g6", "cat-1", "Game 6"));
    games.push(game("g7", "cat-1", "Game 7"));
    games.push(game("g8", "cat-1", "Game 8"));

    let stats = bulk_insert_games(&conn, &games, 4, None).unwrap();
    assert_eq!(stats.chunks_committed, 2);
    assert_eq!(stats.chunks_failed, 1);
    assert_eq!(stats.inserted, 4 + 1); // first chunk + trailing chunk of one
    assert_eq!(stats.errors, 4);

    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM games", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count as u64, stats.inserted);
}

#[test]
fn test_bulk_progress_reports_running_count() {
    let conn = open_memory().unwrap();
    insert_catalog(&conn, &catalog("cat-1", "NES")).unwrap();
    let games: Vec<GameEntry> = (0..30)
        .map(|i| game(&format!("g{i}"), "cat-1", &format!("Game {i:02}")))
        .collect();

    let reports = std::cell::RefCell::new(Vec::new());
    let progress = |n: u64| reports.borrow_mut().push(n);
    bulk_insert_games(&conn, &games, 10, Some(&progress)).unwrap();
    assert_eq!(*reports.borrow(), vec![10, 20, 30]);
}

#[test]
fn test_duplicate_entry_names_keep_first() {
    let conn = open_memory().unwrap();
    insert_catalog(&conn, &catalog("cat-1", "NES")).unwrap();
    bulk_insert_games(&conn, &[game("g1", "cat-1", "Game")], 100, None).unwrap();

    let entries = vec![
        entry("e1", "g1", "same.bin", "00000001"),
        entry("e2", "g1", "same.bin", "00000002"),
    ];
    bulk_insert_entries(&conn, &entries, 100, None).unwrap();

    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM entries", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 1);
    let kept: String = conn
        .query_row("SELECT crc32 FROM entries", [], |row| row.get(0))
        .unwrap();
    assert_eq!(kept, "00000001");
}

#[test]
fn test_bulk_mode_restores_pragmas() {
    let dir = tempfile::tempdir().unwrap();
    let conn = open_database(&dir.path().join("t.db")).unwrap();

    {
        let _bulk = BulkMode::enter(&conn).unwrap();
        let mode: String = conn
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap();
        assert_eq!(mode.to_lowercase(), "off");
    }

    let mode: String = conn
        .query_row("PRAGMA journal_mode", [], |row| row.get(0))
        .unwrap();
    assert_eq!(mode.to_lowercase(), "wal");
}

#[test]
fn test_volume_upsert_and_poll() {
    let conn = open_memory().unwrap();
    upsert_volume(&conn, &volume("v1", "/mnt/roms")).unwrap();

    set_volume_online(&conn, "v1", false, Utc::now()).unwrap();
    let vol = get_volume(&conn, "v1").unwrap().unwrap();
    assert!(!vol.is_online);

    // Same root upserts in place
    let mut again = volume("v1", "/mnt/roms");
    again.label = "renamed".to_string();
    upsert_volume(&conn, &again).unwrap();
    assert_eq!(list_volumes(&conn).unwrap().len(), 1);
    assert_eq!(get_volume(&conn, "v1").unwrap().unwrap().label, "renamed");
}

#[test]
fn test_rom_file_upsert_identity() {
    let conn = open_memory().unwrap();
    upsert_volume(&conn, &volume("v1", "/mnt/roms")).unwrap();

    let mut file = rom_file("f1", "v1", "nes/game.nes", 1024);
    upsert_rom_file(&conn, &file).unwrap();

    // Same identity with new hashes updates the row in place
    file.fingerprint = Some(
        Fingerprint::new(Some("d445f698"), None, None).unwrap(),
    );
    file.size = 2048;
    upsert_rom_file(&conn, &file).unwrap();

    let all = rom_files_for_volume(&conn, "v1").unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].size, 2048);
    assert_eq!(
        all[0].fingerprint.as_ref().and_then(|f| f.crc32()),
        Some("d445f698")
    );
}

#[test]
fn test_rom_file_verification_update() {
    let conn = open_memory().unwrap();
    upsert_volume(&conn, &volume("v1", "/mnt/roms")).unwrap();
    upsert_rom_file(&conn, &rom_file("f1", "v1", "a.nes", 10)).unwrap();

    update_rom_file_verification(
        &conn,
        "f1",
        VerificationStatus::Verified,
        Some("cat-1"),
        Some("e1"),
    )
    .unwrap();

    let file = get_rom_file(&conn, "f1").unwrap().unwrap();
    assert_eq!(file.verification_status, VerificationStatus::Verified);
    assert_eq!(file.matched_catalog_id.as_deref(), Some("cat-1"));
    assert_eq!(file.matched_entry_id.as_deref(), Some("e1"));
}

#[test]
fn test_scan_job_round_trip() {
    let conn = open_memory().unwrap();
    let mut job = ScanJob {
        id: "job-1".to_string(),
        kind: ScanJobKind::Incremental,
        target_volume_id: Some("v1".to_string()),
        target_path: Some("/mnt/roms".to_string()),
        status: ScanJobStatus::Queued,
        queued_at: Utc::now(),
        started_at: None,
        completed_at: None,
        processed_items: 0,
        total_items: 0,
        processed_bytes: 0,
        total_bytes: 0,
        last_processed_path: None,
        resume_count: 0,
        phase: None,
    };
    insert_scan_job(&conn, &job).unwrap();

    job.status = ScanJobStatus::Paused;
    job.processed_items = 42;
    job.last_processed_path = Some("/mnt/roms/file42".to_string());
    job.resume_count = 1;
    update_scan_job(&conn, &job).unwrap();

    let loaded = get_scan_job(&conn, "job-1").unwrap().unwrap();
    assert_eq!(loaded.status, ScanJobStatus::Paused);
    assert_eq!(loaded.kind, ScanJobKind::Incremental);
    assert_eq!(loaded.processed_items, 42);
    assert_eq!(loaded.resume_count, 1);
}

#[test]
fn test_active_job_guard() {
    let conn = open_memory().unwrap();
    let mut job = ScanJob {
        id: "job-1".to_string(),
        kind: ScanJobKind::Full,
        target_volume_id: Some("v1".to_string()),
        target_path: None,
        status: ScanJobStatus::Running,
        queued_at: Utc::now(),
        started_at: Some(Utc::now()),
        completed_at: None,
        processed_items: 0,
        total_items: 0,
        processed_bytes: 0,
        total_bytes: 0,
        last_processed_path: None,
        resume_count: 0,
        phase: None,
    };
    insert_scan_job(&conn, &job).unwrap();

    assert!(has_active_job_for_volume(&conn, "v1").unwrap());
    assert!(!has_active_job_for_volume(&conn, "v2").unwrap());
    assert_eq!(active_jobs_for_volume(&conn, "v1").unwrap().len(), 1);

    job.status = ScanJobStatus::Completed;
    job.completed_at = Some(Utc::now());
    update_scan_job(&conn, &job).unwrap();
    assert!(!has_active_job_for_volume(&conn, "v1").unwrap());
}

#[test]
fn test_operation_journal_round_trip() {
    let conn = open_memory().unwrap();
    let mut op = OrganizationOperation {
        id: "op-1".to_string(),
        performed_at: Utc::now(),
        source_root: "/src".to_string(),
        destination_root: "/dst".to_string(),
        template_name: "by-system".to_string(),
        was_move: true,
        file_count: 0,
        total_bytes: 0,
        can_rollback: false,
        rollback_entries: Vec::new(),
        is_rolled_back: false,
        rolled_back_at: None,
    };
    insert_operation(&conn, &op).unwrap();

    op.rollback_entries.push(RollbackEntry {
        current_path: "/dst/a.nes".to_string(),
        original_path: "/src/a.nes".to_string(),
        was_moved: true,
    });
    update_operation_journal(&conn, "op-1", &op.rollback_entries, 1, 1024, true).unwrap();

    let loaded = get_operation(&conn, "op-1").unwrap().unwrap();
    assert!(loaded.can_rollback);
    assert_eq!(loaded.rollback_entries.len(), 1);
    assert_eq!(loaded.rollback_entries[0].original_path, "/src/a.nes");

    mark_operation_rolled_back(&conn, "op-1", Utc::now()).unwrap();
    let loaded = get_operation(&conn, "op-1").unwrap().unwrap();
    assert!(loaded.is_rolled_back);
    assert!(!loaded.can_rollback);
    assert!(loaded.rolled_back_at.is_some());
}
