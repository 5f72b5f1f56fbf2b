//! Priority-aware hash job pool.
//!
//! Four priority queues feed a small set of persistent tokio workers
//! (bounded by `max_concurrency`, default 2). Dispatch checks critical
//! and high first, then normal, then background; an idle worker parks on
//! the urgent queues with a one-second bounded wait so newly queued
//! urgent work wakes it immediately while lower levels still get polled.
//!
//! Work queues use `async-channel` — its `Receiver` is `Clone`, so each
//! worker holds its own handle and no mutexed receiver is needed. Events
//! go out on a tokio broadcast channel; observers may attach at any time
//! and receive subsequent updates.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use rom_steward_core::{Fingerprint, HashJobState, HashPriority};

use crate::buffer::BufferPool;
use crate::cache::{self, HashCache};
use crate::error::HashError;
use crate::hasher;

/// How long an idle worker parks on the urgent queues before re-polling
/// the lower-priority ones.
const IDLE_WAIT: Duration = Duration::from_secs(1);

/// A hash job's externally visible state. Snapshots are returned by
/// value; the pool owns the live record.
#[derive(Debug, Clone)]
pub struct HashJob {
    pub id: String,
    pub file_path: PathBuf,
    pub priority: HashPriority,
    pub skip_bytes: u32,
    pub state: HashJobState,
    pub batch_id: Option<String>,
    pub queued_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub total_bytes: u64,
    pub bytes_processed: u64,
    pub result: Option<Fingerprint>,
    pub error: Option<String>,
}

/// Events published by the pool.
#[derive(Debug, Clone)]
pub enum PoolEvent {
    JobProgress {
        job_id: String,
        bytes_processed: u64,
        total_bytes: u64,
    },
    JobCompleted {
        job_id: String,
        state: HashJobState,
    },
}

#[derive(Debug, Clone)]
pub struct HashPoolConfig {
    pub max_concurrency: usize,
}

impl Default for HashPoolConfig {
    fn default() -> Self {
        Self { max_concurrency: 2 }
    }
}

struct JobRecord {
    job: HashJob,
    cancel: CancellationToken,
}

type JobMap = Arc<Mutex<HashMap<String, JobRecord>>>;

pub struct HashJobPool {
    jobs: JobMap,
    senders: [async_channel::Sender<String>; 4],
    events: broadcast::Sender<PoolEvent>,
    cache: Arc<HashCache>,
    shutdown: CancellationToken,
    _workers: Vec<JoinHandle<()>>,
}

impl HashJobPool {
    /// Spawn the worker tasks. Must be called inside a tokio runtime.
    pub fn start(config: HashPoolConfig, cache: Arc<HashCache>) -> Self {
        let jobs: JobMap = Arc::new(Mutex::new(HashMap::new()));
        let (events, _) = broadcast::channel(256);
        let shutdown = CancellationToken::new();
        let pool = Arc::new(BufferPool::default());

        let (critical_tx, critical_rx) = async_channel::unbounded::<String>();
        let (high_tx, high_rx) = async_channel::unbounded::<String>();
        let (normal_tx, normal_rx) = async_channel::unbounded::<String>();
        let (background_tx, background_rx) = async_channel::unbounded::<String>();

        let workers = (0..config.max_concurrency.max(1))
            .map(|_| {
                let ctx = WorkerContext {
                    jobs: jobs.clone(),
                    critical_rx: critical_rx.clone(),
                    high_rx: high_rx.clone(),
                    normal_rx: normal_rx.clone(),
                    background_rx: background_rx.clone(),
                    events: events.clone(),
                    cache: cache.clone(),
                    pool: pool.clone(),
                    shutdown: shutdown.clone(),
                };
                tokio::spawn(worker_loop(ctx))
            })
            .collect();

        Self {
            jobs,
            senders: [background_tx, normal_tx, high_tx, critical_tx],
            events,
            cache,
            shutdown,
            _workers: workers,
        }
    }

    fn sender(&self, priority: HashPriority) -> &async_channel::Sender<String> {
        &self.senders[priority as usize]
    }

    /// Queue a single file. Fails with `not_found` when the file is
    /// absent; `total_bytes` is recorded as size minus the header skip.
    pub fn enqueue(
        &self,
        path: &Path,
        priority: HashPriority,
        skip_bytes: u32,
    ) -> Result<String, HashError> {
        self.enqueue_with_batch(path, priority, skip_bytes, None)
    }

    fn enqueue_with_batch(
        &self,
        path: &Path,
        priority: HashPriority,
        skip_bytes: u32,
        batch_id: Option<String>,
    ) -> Result<String, HashError> {
        let meta = std::fs::metadata(path).map_err(|e| HashError::from_io_at(e, path))?;
        let total_bytes = meta.len().saturating_sub(skip_bytes as u64);

        let id = uuid::Uuid::new_v4().to_string();
        let job = HashJob {
            id: id.clone(),
            file_path: path.to_path_buf(),
            priority,
            skip_bytes,
            state: HashJobState::Queued,
            batch_id,
            queued_at: Utc::now(),
            started_at: None,
            completed_at: None,
            total_bytes,
            bytes_processed: 0,
            result: None,
            error: None,
        };

        {
            let mut jobs = self.jobs.lock().unwrap_or_else(|e| e.into_inner());
            jobs.insert(
                id.clone(),
                JobRecord {
                    job,
                    cancel: self.shutdown.child_token(),
                },
            );
        }

        // Unbounded queue: try_send only fails when the pool is shut down
        self.sender(priority)
            .try_send(id.clone())
            .map_err(|_| HashError::tool("Hash pool is shut down"))?;

        Ok(id)
    }

    /// Queue many files under one batch id. Missing files become jobs
    /// that are born failed, so the batch result reports them.
    pub fn enqueue_batch(
        &self,
        paths: &[PathBuf],
        priority: HashPriority,
    ) -> Result<String, HashError> {
        let batch_id = uuid::Uuid::new_v4().to_string();
        for path in paths {
            if let Err(e) = self.enqueue_with_batch(path, priority, 0, Some(batch_id.clone())) {
                let id = uuid::Uuid::new_v4().to_string();
                let job = HashJob {
                    id: id.clone(),
                    file_path: path.clone(),
                    priority,
                    skip_bytes: 0,
                    state: HashJobState::Failed,
                    batch_id: Some(batch_id.clone()),
                    queued_at: Utc::now(),
                    started_at: None,
                    completed_at: Some(Utc::now()),
                    total_bytes: 0,
                    bytes_processed: 0,
                    result: None,
                    error: Some(e.to_string()),
                };
                let mut jobs = self.jobs.lock().unwrap_or_else(|e| e.into_inner());
                jobs.insert(
                    id,
                    JobRecord {
                        job,
                        cancel: CancellationToken::new(),
                    },
                );
            }
        }
        Ok(batch_id)
    }

    /// Snapshot a job's state.
    pub fn status(&self, job_id: &str) -> Option<HashJob> {
        let jobs = self.jobs.lock().unwrap_or_else(|e| e.into_inner());
        jobs.get(job_id).map(|r| r.job.clone())
    }

    /// The fingerprint of a completed job; `None` otherwise.
    pub fn result(&self, job_id: &str) -> Option<Fingerprint> {
        let jobs = self.jobs.lock().unwrap_or_else(|e| e.into_inner());
        let record = jobs.get(job_id)?;
        if record.job.state == HashJobState::Completed {
            record.job.result.clone()
        } else {
            None
        }
    }

    /// All jobs belonging to a batch.
    pub fn batch_jobs(&self, batch_id: &str) -> Vec<HashJob> {
        let jobs = self.jobs.lock().unwrap_or_else(|e| e.into_inner());
        jobs.values()
            .filter(|r| r.job.batch_id.as_deref() == Some(batch_id))
            .map(|r| r.job.clone())
            .collect()
    }

    /// Cancel a queued or running job. Running jobs abort at the next
    /// chunk boundary. Returns false for unknown or terminal jobs.
    pub fn cancel(&self, job_id: &str) -> bool {
        let mut jobs = self.jobs.lock().unwrap_or_else(|e| e.into_inner());
        let Some(record) = jobs.get_mut(job_id) else {
            return false;
        };
        match record.job.state {
            HashJobState::Queued => {
                record.job.state = HashJobState::Cancelled;
                record.job.completed_at = Some(Utc::now());
                record.cancel.cancel();
                let _ = self.events.send(PoolEvent::JobCompleted {
                    job_id: job_id.to_string(),
                    state: HashJobState::Cancelled,
                });
                true
            }
            HashJobState::InProgress => {
                record.cancel.cancel();
                true
            }
            _ => false,
        }
    }

    /// Cancel every non-terminal job in a batch. Returns how many were
    /// cancelled.
    pub fn cancel_batch(&self, batch_id: &str) -> usize {
        let ids: Vec<String> = {
            let jobs = self.jobs.lock().unwrap_or_else(|e| e.into_inner());
            jobs.values()
                .filter(|r| {
                    r.job.batch_id.as_deref() == Some(batch_id) && !r.job.state.is_terminal()
                })
                .map(|r| r.job.id.clone())
                .collect()
        };
        ids.iter().filter(|id| self.cancel(id)).count()
    }

    /// Subscribe to job events.
    pub fn subscribe(&self) -> broadcast::Receiver<PoolEvent> {
        self.events.subscribe()
    }

    pub fn cache(&self) -> &HashCache {
        &self.cache
    }

    /// Stop the workers. Queued jobs stay queued; running jobs abort.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
        for sender in &self.senders {
            sender.close();
        }
    }
}

struct WorkerContext {
    jobs: JobMap,
    critical_rx: async_channel::Receiver<String>,
    high_rx: async_channel::Receiver<String>,
    normal_rx: async_channel::Receiver<String>,
    background_rx: async_channel::Receiver<String>,
    events: broadcast::Sender<PoolEvent>,
    cache: Arc<HashCache>,
    pool: Arc<BufferPool>,
    shutdown: CancellationToken,
}

async fn worker_loop(ctx: WorkerContext) {
    loop {
        if ctx.shutdown.is_cancelled() {
            break;
        }

        // Urgent first, then the lower levels
        let job_id = if let Ok(id) = ctx.critical_rx.try_recv() {
            Some(id)
        } else if let Ok(id) = ctx.high_rx.try_recv() {
            Some(id)
        } else if let Ok(id) = ctx.normal_rx.try_recv() {
            Some(id)
        } else if let Ok(id) = ctx.background_rx.try_recv() {
            Some(id)
        } else {
            None
        };

        match job_id {
            Some(id) => process_job(&ctx, id).await,
            None => {
                // Park on the urgent queues with a bounded wait so the
                // lower levels are re-polled at least once a second.
                tokio::select! {
                    _ = ctx.shutdown.cancelled() => break,
                    received = ctx.critical_rx.recv() => {
                        match received {
                            Ok(id) => process_job(&ctx, id).await,
                            Err(_) => break, // channel closed
                        }
                    }
                    received = ctx.high_rx.recv() => {
                        match received {
                            Ok(id) => process_job(&ctx, id).await,
                            Err(_) => break,
                        }
                    }
                    _ = tokio::time::sleep(IDLE_WAIT) => {}
                }
            }
        }
    }
}

async fn process_job(ctx: &WorkerContext, job_id: String) {
    // Claim the job; a cancel may have landed while it was queued.
    let (path, skip_bytes, cancel) = {
        let mut jobs = ctx.jobs.lock().unwrap_or_else(|e| e.into_inner());
        let Some(record) = jobs.get_mut(&job_id) else {
            return;
        };
        if record.job.state != HashJobState::Queued {
            return;
        }
        record.job.state = HashJobState::InProgress;
        record.job.started_at = Some(Utc::now());
        (
            record.job.file_path.clone(),
            record.job.skip_bytes as u64,
            record.cancel.clone(),
        )
    };

    let jobs = ctx.jobs.clone();
    let events = ctx.events.clone();
    let pool = ctx.pool.clone();
    let progress_id = job_id.clone();

    let outcome = tokio::task::spawn_blocking(move || {
        let progress = move |bytes_processed: u64, total: u64| {
            {
                let mut jobs = jobs.lock().unwrap_or_else(|e| e.into_inner());
                if let Some(record) = jobs.get_mut(&progress_id) {
                    record.job.bytes_processed = bytes_processed;
                }
            }
            let _ = events.send(PoolEvent::JobProgress {
                job_id: progress_id.clone(),
                bytes_processed,
                total_bytes: total,
            });
        };
        hasher::hash_file(&path, skip_bytes, &pool, Some(&progress), &cancel)
    })
    .await;

    let result = match outcome {
        Ok(r) => r,
        Err(join_err) => Err(HashError::tool(format!("Hash task panicked: {join_err}"))),
    };

    let state = {
        let mut jobs = ctx.jobs.lock().unwrap_or_else(|e| e.into_inner());
        let Some(record) = jobs.get_mut(&job_id) else {
            return;
        };
        record.job.completed_at = Some(Utc::now());
        match result {
            Ok(out) => {
                record.job.state = HashJobState::Completed;
                record.job.bytes_processed = out.data_size;
                record.job.result = Some(out.fingerprint.clone());
                // Publish to the hash cache with the file's current key
                if let Some((mtime, size)) = cache::stat_key(&record.job.file_path) {
                    ctx.cache
                        .publish(&record.job.file_path, out.fingerprint, mtime, size);
                }
                HashJobState::Completed
            }
            Err(HashError::Cancelled) => {
                record.job.state = HashJobState::Cancelled;
                HashJobState::Cancelled
            }
            Err(e) => {
                record.job.state = HashJobState::Failed;
                record.job.error = Some(e.to_string());
                HashJobState::Failed
            }
        }
    };

    let _ = ctx.events.send(PoolEvent::JobCompleted { job_id, state });
}

#[cfg(test)]
#[path = "tests/job_pool_tests.rs"]
mod tests;
