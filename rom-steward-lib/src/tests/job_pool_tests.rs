use std::sync::Arc;
use std::time::Duration;

use super::*;

async fn wait_for_state(
    pool: &HashJobPool,
    job_id: &str,
    wanted: HashJobState,
) -> HashJob {
    for _ in 0..200 {
        if let Some(job) = pool.status(job_id) {
            if job.state == wanted {
                return job;
            }
            if job.state.is_terminal() && job.state != wanted {
                panic!("job ended in {:?}, wanted {:?}: {:?}", job.state, wanted, job.error);
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {job_id} never reached {wanted:?}");
}

#[tokio::test]
async fn test_enqueue_and_complete() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("rom.bin");
    std::fs::write(&file, b"abc").unwrap();

    let cache = Arc::new(HashCache::in_memory());
    let pool = HashJobPool::start(HashPoolConfig::default(), cache.clone());

    let job_id = pool
        .enqueue(&file, HashPriority::Normal, 0)
        .unwrap();
    let job = wait_for_state(&pool, &job_id, HashJobState::Completed).await;

    assert_eq!(job.total_bytes, 3);
    let fingerprint = pool.result(&job_id).unwrap();
    assert_eq!(fingerprint.crc32(), Some("352441c2"));

    // Completion published to the cache
    assert_eq!(cache.get_cached(&file), Some(fingerprint));

    pool.shutdown();
}

#[tokio::test]
async fn test_enqueue_missing_file_is_not_found() {
    let cache = Arc::new(HashCache::in_memory());
    let pool = HashJobPool::start(HashPoolConfig::default(), cache);

    let err = pool
        .enqueue(
            std::path::Path::new("/no/such/rom.bin"),
            HashPriority::Normal,
            0,
        )
        .unwrap_err();
    assert!(matches!(err, HashError::NotFound(_)));

    pool.shutdown();
}

#[tokio::test]
async fn test_skip_bytes_recorded_in_total() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("headered.nes");
    let mut data = vec![0xEE; 16];
    data.extend_from_slice(b"abc");
    std::fs::write(&file, &data).unwrap();

    let cache = Arc::new(HashCache::in_memory());
    let pool = HashJobPool::start(HashPoolConfig::default(), cache);

    let job_id = pool.enqueue(&file, HashPriority::High, 16).unwrap();
    let job = wait_for_state(&pool, &job_id, HashJobState::Completed).await;

    assert_eq!(job.total_bytes, 3);
    assert_eq!(
        pool.result(&job_id).unwrap().crc32(),
        Some("352441c2")
    );

    pool.shutdown();
}

#[tokio::test]
async fn test_result_only_for_completed() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("rom.bin");
    std::fs::write(&file, b"abc").unwrap();

    let cache = Arc::new(HashCache::in_memory());
    let pool = HashJobPool::start(
        HashPoolConfig { max_concurrency: 1 },
        cache,
    );

    let job_id = pool.enqueue(&file, HashPriority::Normal, 0).unwrap();
    // Immediately after enqueue the job may be queued or running, but a
    // non-completed job never yields a result
    if let Some(job) = pool.status(&job_id) {
        if job.state != HashJobState::Completed {
            assert!(pool.result(&job_id).is_none());
        }
    }
    wait_for_state(&pool, &job_id, HashJobState::Completed).await;
    assert!(pool.result(&job_id).is_some());

    pool.shutdown();
}

#[tokio::test]
async fn test_cancel_queued_job() {
    let dir = tempfile::tempdir().unwrap();
    // A pile of work on one worker so the tail stays queued
    let files: Vec<_> = (0..20)
        .map(|i| {
            let f = dir.path().join(format!("rom{i}.bin"));
            std::fs::write(&f, vec![0u8; 1024 * 1024]).unwrap();
            f
        })
        .collect();

    let cache = Arc::new(HashCache::in_memory());
    let pool = HashJobPool::start(
        HashPoolConfig { max_concurrency: 1 },
        cache,
    );

    let mut ids = Vec::new();
    for f in &files {
        ids.push(pool.enqueue(f, HashPriority::Background, 0).unwrap());
    }

    // Cancel the last job; it is almost certainly still queued
    let last = ids.last().unwrap();
    let cancelled = pool.cancel(last);
    assert!(cancelled);

    let job = wait_for_state(&pool, last, HashJobState::Cancelled).await;
    assert!(job.result.is_none());
    assert!(pool.result(last).is_none());

    pool.shutdown();
}

#[tokio::test]
async fn test_cancel_terminal_job_returns_false() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("rom.bin");
    std::fs::write(&file, b"abc").unwrap();

    let cache = Arc::new(HashCache::in_memory());
    let pool = HashJobPool::start(HashPoolConfig::default(), cache);

    let job_id = pool.enqueue(&file, HashPriority::Critical, 0).unwrap();
    wait_for_state(&pool, &job_id, HashJobState::Completed).await;
    assert!(!pool.cancel(&job_id));

    pool.shutdown();
}

#[tokio::test]
async fn test_batch_enqueue_and_cancel() {
    let dir = tempfile::tempdir().unwrap();
    let present: Vec<_> = (0..5)
        .map(|i| {
            let f = dir.path().join(format!("rom{i}.bin"));
            std::fs::write(&f, vec![1u8; 512 * 1024]).unwrap();
            f
        })
        .collect();
    let mut paths = present.clone();
    paths.push(dir.path().join("missing.bin"));

    let cache = Arc::new(HashCache::in_memory());
    let pool = HashJobPool::start(
        HashPoolConfig { max_concurrency: 1 },
        cache,
    );

    let batch_id = pool.enqueue_batch(&paths, HashPriority::Background).unwrap();
    let jobs = pool.batch_jobs(&batch_id);
    assert_eq!(jobs.len(), 6);
    // The missing file is born failed with an error message
    assert!(jobs
        .iter()
        .any(|j| j.state == HashJobState::Failed && j.error.is_some()));

    let cancelled = pool.cancel_batch(&batch_id);
    assert!(cancelled >= 1);

    // Eventually nothing in the batch is left non-terminal
    for _ in 0..200 {
        if pool
            .batch_jobs(&batch_id)
            .iter()
            .all(|j| j.state.is_terminal())
        {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(pool
        .batch_jobs(&batch_id)
        .iter()
        .all(|j| j.state.is_terminal()));

    pool.shutdown();
}

#[tokio::test]
async fn test_events_emitted() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("rom.bin");
    std::fs::write(&file, vec![5u8; 200_000]).unwrap();

    let cache = Arc::new(HashCache::in_memory());
    let pool = HashJobPool::start(HashPoolConfig::default(), cache);
    let mut events = pool.subscribe();

    let job_id = pool.enqueue(&file, HashPriority::Normal, 0).unwrap();

    let mut saw_progress = false;
    let mut saw_completed = false;
    for _ in 0..100 {
        match tokio::time::timeout(Duration::from_secs(1), events.recv()).await {
            Ok(Ok(PoolEvent::JobProgress { job_id: id, .. })) if id == job_id => {
                saw_progress = true;
            }
            Ok(Ok(PoolEvent::JobCompleted { job_id: id, state })) if id == job_id => {
                assert_eq!(state, HashJobState::Completed);
                saw_completed = true;
                break;
            }
            Ok(Ok(_)) => {}
            _ => break,
        }
    }
    assert!(saw_progress);
    assert!(saw_completed);

    pool.shutdown();
}

#[tokio::test]
async fn test_priority_dispatch_prefers_critical() {
    let dir = tempfile::tempdir().unwrap();
    let make = |name: &str| {
        let f = dir.path().join(name);
        std::fs::write(&f, vec![9u8; 1024 * 1024]).unwrap();
        f
    };

    let cache = Arc::new(HashCache::in_memory());
    let pool = HashJobPool::start(
        HashPoolConfig { max_concurrency: 1 },
        cache,
    );
    let mut events = pool.subscribe();

    // Fill the background queue, then drop one critical job in. The
    // single worker must pick the critical job ahead of the queued
    // background tail.
    let mut background_ids = Vec::new();
    for i in 0..10 {
        background_ids.push(
            pool.enqueue(&make(&format!("bg{i}.bin")), HashPriority::Background, 0)
                .unwrap(),
        );
    }
    let critical_id = pool
        .enqueue(&make("critical.bin"), HashPriority::Critical, 0)
        .unwrap();

    let mut completion_order = Vec::new();
    while completion_order.len() < 11 {
        match tokio::time::timeout(Duration::from_secs(5), events.recv()).await {
            Ok(Ok(PoolEvent::JobCompleted { job_id, .. })) => completion_order.push(job_id),
            Ok(Ok(_)) => {}
            Ok(Err(_)) | Err(_) => break,
        }
    }

    let critical_pos = completion_order
        .iter()
        .position(|id| *id == critical_id)
        .expect("critical job completed");
    // Ahead of the queued background tail
    assert!(
        critical_pos <= 3,
        "critical completed at position {critical_pos}"
    );

    pool.shutdown();
}
