use std::collections::BTreeMap;
use std::path::Path;

use tokio_util::sync::CancellationToken;

use super::*;
use crate::execute::execute_plan;
use crate::journal::MemoryJournal;
use crate::plan::{build_plan, OrganizeRequest};
use crate::template::OrganizeTemplate;

fn request(source: &Path, dest: &Path) -> OrganizeRequest {
    OrganizeRequest {
        source_path: source.to_path_buf(),
        destination_path: dest.to_path_buf(),
        move_files: true,
        process_archives: false,
        extract_archives: false,
        delete_empty_folders: true,
        include_globs: Vec::new(),
        exclude_globs: Vec::new(),
    }
}

fn template() -> OrganizeTemplate {
    OrganizeTemplate::builtin("by-system").unwrap()
}

/// Snapshot (relative path → contents) of all files under a root.
fn snapshot(root: &Path) -> BTreeMap<String, Vec<u8>> {
    fn walk(root: &Path, dir: &Path, out: &mut BTreeMap<String, Vec<u8>>) {
        for entry in std::fs::read_dir(dir).unwrap().flatten() {
            let path = entry.path();
            if path.is_dir() {
                walk(root, &path, out);
            } else {
                let rel = path.strip_prefix(root).unwrap().to_string_lossy().to_string();
                out.insert(rel, std::fs::read(&path).unwrap());
            }
        }
    }
    let mut out = BTreeMap::new();
    walk(root, root, &mut out);
    out
}

#[test]
fn test_rollback_restores_pre_execute_state() {
    let src = tempfile::tempdir().unwrap();
    let dst = tempfile::tempdir().unwrap();
    std::fs::write(src.path().join("Super Mario Bros. (USA).nes"), b"mario").unwrap();
    std::fs::write(src.path().join("Tetris (World).gb"), b"tetris").unwrap();
    let before = snapshot(src.path());

    let plan = build_plan(&request(src.path(), dst.path()), &template()).unwrap();
    let journal = MemoryJournal::new();
    let result = execute_plan(&plan, &journal, &CancellationToken::new()).unwrap();
    assert!(result.can_rollback);

    let rollback = rollback_operation(&journal, &result.operation_id).unwrap();
    assert!(rollback.success);
    assert_eq!(rollback.entries_restored, 2);
    assert_eq!(rollback.entries_failed, 0);

    // Source tree is byte-identical to the pre-execute state
    assert_eq!(snapshot(src.path()), before);
    // Destination tree is empty again (folders pruned)
    assert_eq!(snapshot(dst.path()).len(), 0);

    let op = journal.load(&result.operation_id).unwrap().unwrap();
    assert!(op.is_rolled_back);
    assert!(op.rolled_back_at.is_some());
}

#[test]
fn test_rollback_after_partial_execute_restores_moved_files_only() {
    let src = tempfile::tempdir().unwrap();
    let dst = tempfile::tempdir().unwrap();
    for name in ["A Game (USA).nes", "B Game (USA).nes", "C Game (USA).nes"] {
        std::fs::write(src.path().join(name), name.as_bytes()).unwrap();
    }
    let nes_dir = dst.path().join("Nintendo Entertainment System");
    std::fs::create_dir_all(&nes_dir).unwrap();
    std::fs::write(nes_dir.join("B Game (USA).nes"), b"occupied").unwrap();

    let plan = build_plan(&request(src.path(), dst.path()), &template()).unwrap();
    let journal = MemoryJournal::new();
    let result = execute_plan(&plan, &journal, &CancellationToken::new()).unwrap();
    assert_eq!(result.files_processed, 2);
    assert_eq!(result.files_failed, 1);

    let rollback = rollback_operation(&journal, &result.operation_id).unwrap();
    assert!(rollback.success);
    assert_eq!(rollback.entries_restored, 2);

    // A and C are back; B never moved and its blocker survives
    assert!(src.path().join("A Game (USA).nes").exists());
    assert!(src.path().join("B Game (USA).nes").exists());
    assert!(src.path().join("C Game (USA).nes").exists());
    assert_eq!(
        std::fs::read(nes_dir.join("B Game (USA).nes")).unwrap(),
        b"occupied"
    );
}

#[test]
fn test_rollback_is_best_effort() {
    let src = tempfile::tempdir().unwrap();
    let dst = tempfile::tempdir().unwrap();
    std::fs::write(src.path().join("A Game (USA).nes"), b"a").unwrap();
    std::fs::write(src.path().join("B Game (USA).nes"), b"b").unwrap();

    let plan = build_plan(&request(src.path(), dst.path()), &template()).unwrap();
    let journal = MemoryJournal::new();
    let result = execute_plan(&plan, &journal, &CancellationToken::new()).unwrap();

    // Someone deletes one moved file before rollback
    std::fs::remove_file(
        dst.path()
            .join("Nintendo Entertainment System")
            .join("A Game (USA).nes"),
    )
    .unwrap();

    let rollback = rollback_operation(&journal, &result.operation_id).unwrap();
    assert!(!rollback.success);
    assert_eq!(rollback.entries_restored, 1);
    assert_eq!(rollback.entries_failed, 1);
    assert!(rollback.errors[0].contains("Missing at destination"));
    // The surviving file still came back
    assert!(src.path().join("B Game (USA).nes").exists());
}

#[test]
fn test_rollback_never_overwrites() {
    let src = tempfile::tempdir().unwrap();
    let dst = tempfile::tempdir().unwrap();
    std::fs::write(src.path().join("A Game (USA).nes"), b"original").unwrap();

    let plan = build_plan(&request(src.path(), dst.path()), &template()).unwrap();
    let journal = MemoryJournal::new();
    let result = execute_plan(&plan, &journal, &CancellationToken::new()).unwrap();

    // A new file appears at the original path
    std::fs::write(src.path().join("A Game (USA).nes"), b"newcomer").unwrap();

    let rollback = rollback_operation(&journal, &result.operation_id).unwrap();
    assert!(!rollback.success);
    assert!(rollback.errors[0].contains("occupied"));
    assert_eq!(
        std::fs::read(src.path().join("A Game (USA).nes")).unwrap(),
        b"newcomer"
    );
}

#[test]
fn test_rollback_twice_is_rejected() {
    let src = tempfile::tempdir().unwrap();
    let dst = tempfile::tempdir().unwrap();
    std::fs::write(src.path().join("A Game (USA).nes"), b"a").unwrap();

    let plan = build_plan(&request(src.path(), dst.path()), &template()).unwrap();
    let journal = MemoryJournal::new();
    let result = execute_plan(&plan, &journal, &CancellationToken::new()).unwrap();

    rollback_operation(&journal, &result.operation_id).unwrap();
    let err = rollback_operation(&journal, &result.operation_id).unwrap_err();
    assert!(matches!(err, crate::OrganizeError::NotRollbackable(_)));
}

#[test]
fn test_rollback_unknown_operation() {
    let journal = MemoryJournal::new();
    let err = rollback_operation(&journal, "nope").unwrap_err();
    assert!(matches!(err, crate::OrganizeError::OperationNotFound(_)));
}

#[test]
fn test_copy_operation_is_not_rollbackable() {
    let src = tempfile::tempdir().unwrap();
    let dst = tempfile::tempdir().unwrap();
    std::fs::write(src.path().join("A Game (USA).nes"), b"a").unwrap();

    let mut req = request(src.path(), dst.path());
    req.move_files = false;
    let plan = build_plan(&req, &template()).unwrap();
    let journal = MemoryJournal::new();
    let result = execute_plan(&plan, &journal, &CancellationToken::new()).unwrap();

    let err = rollback_operation(&journal, &result.operation_id).unwrap_err();
    assert!(matches!(err, crate::OrganizeError::NotRollbackable(_)));
}
