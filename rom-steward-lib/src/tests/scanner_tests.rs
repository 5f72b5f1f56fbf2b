use std::path::Path;

use super::*;
use rom_steward_core::{ScanJobKind, ScanJobStatus};

fn new_job(id: &str) -> ScanJob {
    ScanJob {
        id: id.to_string(),
        kind: ScanJobKind::Full,
        target_volume_id: None,
        target_path: None,
        status: ScanJobStatus::Queued,
        queued_at: chrono::Utc::now(),
        started_at: None,
        completed_at: None,
        processed_items: 0,
        total_items: 0,
        processed_bytes: 0,
        total_bytes: 0,
        last_processed_path: None,
        resume_count: 0,
        phase: None,
    }
}

fn collect_sink(names: &mut Vec<String>) -> impl FnMut(ScannedFile) + '_ {
    move |file: ScannedFile| {
        let mut label = file
            .path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("?")
            .to_string();
        if let Some(inner) = file.path_in_archive {
            label.push_str("::");
            label.push_str(&inner);
        }
        names.push(label)
    }
}

fn options(compute_hashes: bool) -> ScanOptions {
    ScanOptions {
        compute_hashes,
        ..ScanOptions::default()
    }
}

fn write_files(root: &Path, names: &[&str]) {
    for name in names {
        let path = root.join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, format!("content of {name}")).unwrap();
    }
}

#[test]
fn test_lexicographic_emission_order() {
    let dir = tempfile::tempdir().unwrap();
    write_files(dir.path(), &["b.nes", "a.nes", "c.nes", "sub/z.nes", "sub/y.nes"]);

    let cp_dir = dir.path().join(".checkpoints");
    let scanner = Scanner::new(options(false), cp_dir).unwrap();
    let mut names = Vec::new();
    let mut job = new_job("order");
    let outcome = scanner
        .run(
            &mut job,
            dir.path(),
            &ScanSnapshot::new(),
            &mut collect_sink(&mut names),
        )
        .unwrap();

    assert_eq!(outcome.termination, ScanTermination::Completed);
    assert_eq!(names, vec!["a.nes", "b.nes", "c.nes", "y.nes", "z.nes"]);
    assert_eq!(job.status, ScanJobStatus::Completed);
    assert_eq!(job.processed_items, 5);
}

#[test]
fn test_non_recursive_skips_subdirs() {
    let dir = tempfile::tempdir().unwrap();
    write_files(dir.path(), &["a.nes", "sub/b.nes"]);

    let opts = ScanOptions {
        recursive: false,
        ..options(false)
    };
    let scanner = Scanner::new(opts, dir.path().join(".cp")).unwrap();
    let mut names = Vec::new();
    let mut job = new_job("nonrec");
    scanner
        .run(
            &mut job,
            dir.path(),
            &ScanSnapshot::new(),
            &mut collect_sink(&mut names),
        )
        .unwrap();

    assert_eq!(names, vec!["a.nes"]);
}

#[test]
fn test_include_exclude_globs() {
    let dir = tempfile::tempdir().unwrap();
    write_files(dir.path(), &["a.nes", "b.smc", "c.txt", "backup.nes"]);

    let opts = ScanOptions {
        include_globs: vec!["*.nes".to_string(), "*.smc".to_string()],
        exclude_globs: vec!["backup*".to_string()],
        ..options(false)
    };
    let scanner = Scanner::new(opts, dir.path().join(".cp")).unwrap();
    let mut names = Vec::new();
    let mut job = new_job("globs");
    scanner
        .run(
            &mut job,
            dir.path(),
            &ScanSnapshot::new(),
            &mut collect_sink(&mut names),
        )
        .unwrap();

    assert_eq!(names, vec!["a.nes", "b.smc"]);
}

#[test]
fn test_bad_glob_is_parse_error() {
    let opts = ScanOptions {
        include_globs: vec!["[".to_string()],
        ..options(false)
    };
    let err = Scanner::new(opts, std::env::temp_dir()).unwrap_err();
    assert!(matches!(err, ScanAbort::GlobParse { .. }));
}

#[test]
fn test_hashes_computed_and_cached() {
    let dir = tempfile::tempdir().unwrap();
    write_files(dir.path(), &["a.bin"]);

    let cache = HashCache::in_memory();
    let scanner = Scanner::new(options(true), dir.path().join(".cp"))
        .unwrap()
        .with_cache(&cache);

    let mut fingerprints = Vec::new();
    let mut sink = |file: ScannedFile| fingerprints.push(file.fingerprint);
    let mut job = new_job("hash");
    scanner
        .run(&mut job, dir.path(), &ScanSnapshot::new(), &mut sink)
        .unwrap();

    assert_eq!(fingerprints.len(), 1);
    assert!(fingerprints[0].is_some());
    assert_eq!(cache.len(), 1);
    assert_eq!(
        cache.get_cached(&dir.path().join("a.bin")),
        fingerprints[0].clone()
    );
}

#[test]
fn test_incremental_second_pass_skips_all() {
    let dir = tempfile::tempdir().unwrap();
    write_files(dir.path(), &["a.bin", "b.bin", "sub/c.bin"]);

    // First pass builds the snapshot
    let mut snapshot = ScanSnapshot::new();
    {
        let scanner = Scanner::new(options(false), dir.path().join(".cp")).unwrap();
        let mut sink = |file: ScannedFile| {
            snapshot.insert(file.path.clone(), (file.mtime, file.size));
        };
        let mut job = new_job("inc1");
        scanner
            .run(&mut job, dir.path(), &ScanSnapshot::new(), &mut sink)
            .unwrap();
    }
    assert_eq!(snapshot.len(), 3);

    // Second pass with no changes: everything skipped
    let opts = ScanOptions {
        incremental_only: true,
        ..options(false)
    };
    let scanner = Scanner::new(opts, dir.path().join(".cp")).unwrap();
    let mut names = Vec::new();
    let mut job = new_job("inc2");
    let outcome = scanner
        .run(&mut job, dir.path(), &snapshot, &mut collect_sink(&mut names))
        .unwrap();

    assert_eq!(outcome.stats.files_scanned, 0);
    assert_eq!(outcome.stats.files_skipped, 3);
    assert!(names.is_empty());
}

#[test]
fn test_incremental_detects_new_modified_deleted() {
    let dir = tempfile::tempdir().unwrap();
    write_files(dir.path(), &["a.bin", "b.bin"]);

    let mut snapshot = ScanSnapshot::new();
    {
        let scanner = Scanner::new(options(false), dir.path().join(".cp")).unwrap();
        let mut sink = |file: ScannedFile| {
            snapshot.insert(file.path.clone(), (file.mtime, file.size));
        };
        let mut job = new_job("delta1");
        scanner
            .run(&mut job, dir.path(), &ScanSnapshot::new(), &mut sink)
            .unwrap();
    }

    // b grows, c appears, a disappears
    std::fs::write(dir.path().join("b.bin"), "a much longer body than before").unwrap();
    write_files(dir.path(), &["c.bin"]);
    std::fs::remove_file(dir.path().join("a.bin")).unwrap();

    let opts = ScanOptions {
        incremental_only: true,
        ..options(false)
    };
    let scanner = Scanner::new(opts, dir.path().join(".cp")).unwrap();
    let mut names = Vec::new();
    let mut job = new_job("delta2");
    let outcome = scanner
        .run(&mut job, dir.path(), &snapshot, &mut collect_sink(&mut names))
        .unwrap();

    assert_eq!(outcome.stats.new_files_found, 1);
    assert_eq!(outcome.stats.modified_files_found, 1);
    assert_eq!(outcome.stats.deleted_files_detected, 1);
    assert_eq!(names, vec!["b.bin", "c.bin"]);
}

#[test]
fn test_pause_and_resume_emits_remainder_once() {
    let dir = tempfile::tempdir().unwrap();
    let all: Vec<String> = (0..10).map(|i| format!("file{i}.bin")).collect();
    let refs: Vec<&str> = all.iter().map(String::as_str).collect();
    write_files(dir.path(), &refs);

    let cp_dir = dir.path().join(".cp");
    let opts = ScanOptions {
        checkpoint_every_n: 3,
        ..options(false)
    };

    let mut job = new_job("resume");
    let mut first_names: Vec<String> = Vec::new();
    {
        let scanner = Scanner::new(opts.clone(), cp_dir.clone()).unwrap();
        let pause = scanner.pause_token();
        let mut count = 0;
        let mut sink = |file: ScannedFile| {
            count += 1;
            first_names.push(
                file.path
                    .file_name()
                    .unwrap()
                    .to_string_lossy()
                    .to_string(),
            );
            if count == 5 {
                pause.cancel();
            }
        };
        let outcome = scanner
            .run(&mut job, dir.path(), &ScanSnapshot::new(), &mut sink)
            .unwrap();
        assert_eq!(outcome.termination, ScanTermination::Paused);
    }

    assert_eq!(job.status, ScanJobStatus::Paused);
    assert_eq!(first_names.len(), 5);
    assert_eq!(
        job.last_processed_path.as_deref(),
        Some(
            dir.path()
                .join("file4.bin")
                .to_string_lossy()
                .as_ref()
        )
    );

    // Resume picks up after file4 and finishes the rest exactly once
    let mut second_names: Vec<String> = Vec::new();
    {
        let scanner = Scanner::new(opts, cp_dir.clone()).unwrap();
        let outcome = scanner
            .resume(
                &mut job,
                dir.path(),
                &ScanSnapshot::new(),
                &mut collect_sink(&mut second_names),
            )
            .unwrap();
        assert_eq!(outcome.termination, ScanTermination::Completed);
    }

    assert_eq!(job.resume_count, 1);
    assert_eq!(job.status, ScanJobStatus::Completed);
    assert_eq!(
        second_names,
        vec![
            "file5.bin",
            "file6.bin",
            "file7.bin",
            "file8.bin",
            "file9.bin"
        ]
    );

    // Union of both runs covers every file with no duplicates
    let mut union = first_names;
    union.extend(second_names);
    union.sort();
    let mut expected = all.clone();
    expected.sort();
    assert_eq!(union, expected);

    // Checkpoint removed on completion
    assert!(checkpoint::load(&cp_dir, &job.id).unwrap().is_none());
}

#[test]
fn test_cancel_terminates_with_partial_results() {
    let dir = tempfile::tempdir().unwrap();
    write_files(dir.path(), &["a.bin", "b.bin", "c.bin", "d.bin"]);

    let scanner = Scanner::new(options(false), dir.path().join(".cp")).unwrap();
    let cancel = scanner.cancel_token();
    let mut count = 0;
    let mut sink = |_: ScannedFile| {
        count += 1;
        if count == 2 {
            cancel.cancel();
        }
    };
    let mut job = new_job("cancel");
    let outcome = scanner
        .run(&mut job, dir.path(), &ScanSnapshot::new(), &mut sink)
        .unwrap();

    assert_eq!(outcome.termination, ScanTermination::Cancelled);
    assert_eq!(job.status, ScanJobStatus::Cancelled);
    assert_eq!(count, 2);
}

#[test]
fn test_missing_root_fails_job() {
    let dir = tempfile::tempdir().unwrap();
    let scanner = Scanner::new(options(false), dir.path().join(".cp")).unwrap();
    let mut job = new_job("noroot");
    let err = scanner
        .run(
            &mut job,
            &dir.path().join("nope"),
            &ScanSnapshot::new(),
            &mut |_: ScannedFile| {},
        )
        .unwrap_err();
    assert!(matches!(err, ScanAbort::RootNotFound(_)));
    assert_eq!(job.status, ScanJobStatus::Failed);
}

#[test]
fn test_terminal_job_cannot_rerun() {
    let dir = tempfile::tempdir().unwrap();
    let scanner = Scanner::new(options(false), dir.path().join(".cp")).unwrap();
    let mut job = new_job("done");
    job.status = ScanJobStatus::Completed;
    let err = scanner
        .run(
            &mut job,
            dir.path(),
            &ScanSnapshot::new(),
            &mut |_: ScannedFile| {},
        )
        .unwrap_err();
    assert!(matches!(err, ScanAbort::InvalidState(_)));
}

#[test]
fn test_headered_rom_hashes_without_header() {
    let dir = tempfile::tempdir().unwrap();

    // A headered iNES dump and the same ROM data as a raw .bin
    let body: Vec<u8> = (0..32 * 1024).map(|i| (i % 251) as u8).collect();
    let mut headered = vec![0x4E, 0x45, 0x53, 0x1A, 2, 1, 0, 0];
    headered.resize(16, 0);
    headered.extend_from_slice(&body);
    std::fs::write(dir.path().join("game.nes"), &headered).unwrap();
    std::fs::write(dir.path().join("game.bin"), &body).unwrap();

    let scanner = Scanner::new(options(true), dir.path().join(".cp")).unwrap();
    let mut fingerprints = std::collections::HashMap::new();
    let mut sink = |file: ScannedFile| {
        let ext = file.path.extension().unwrap().to_str().unwrap().to_string();
        fingerprints.insert(ext, file.fingerprint);
    };
    let mut job = new_job("header");
    scanner
        .run(&mut job, dir.path(), &ScanSnapshot::new(), &mut sink)
        .unwrap();

    // The iNES header is stripped, so both fingerprints agree
    assert!(fingerprints["nes"].is_some());
    assert_eq!(fingerprints["nes"], fingerprints["bin"]);
}

#[test]
fn test_archive_contents_emitted() {
    use std::io::Write;

    let dir = tempfile::tempdir().unwrap();
    write_files(dir.path(), &["loose.bin"]);

    let zip_path = dir.path().join("pack.zip");
    {
        let file = std::fs::File::create(&zip_path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        let opts = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Stored);
        writer.start_file("inner1.nes", opts).unwrap();
        writer.write_all(b"abc").unwrap();
        writer.start_file("inner2.nes", opts).unwrap();
        writer.write_all(b"defg").unwrap();
        writer.finish().unwrap();
    }

    let opts = ScanOptions {
        scan_archive_contents: true,
        ..options(true)
    };
    let scanner = Scanner::new(opts, dir.path().join(".cp")).unwrap();
    let mut records: Vec<ScannedFile> = Vec::new();
    let mut sink = |file: ScannedFile| records.push(file);
    let mut job = new_job("zip");
    let outcome = scanner
        .run(&mut job, dir.path(), &ScanSnapshot::new(), &mut sink)
        .unwrap();

    assert_eq!(outcome.stats.files_scanned, 3);
    let archived: Vec<&ScannedFile> = records.iter().filter(|r| r.is_archived).collect();
    assert_eq!(archived.len(), 2);
    assert!(archived
        .iter()
        .all(|r| r.path == zip_path && r.path_in_archive.is_some()));
    // Member hashes are over decompressed content
    let inner1 = archived
        .iter()
        .find(|r| r.path_in_archive.as_deref() == Some("inner1.nes"))
        .unwrap();
    assert_eq!(
        inner1.fingerprint.as_ref().and_then(|f| f.crc32()),
        Some("352441c2")
    );
}
