//! Index Lifecycle Manager: the per-user state machine, pending-work
//! queue, and background worker that drives (re)indexing.
//!
//! Mirrors the coordination shape of the Python background service this
//! was distilled from — a lock-guarded per-user status map, a pending set
//! drained by a single worker loop, linear retry backoff — rebuilt with
//! `dashmap`/`parking_lot` in place of a `threading.Lock`-guarded dict and
//! a `tokio` task in place of a daemon thread.

pub mod state;

use chrono::Utc;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::models::IndexStatus;
use state::IndexState;

/// Outcome of a single successful index pass for a user.
#[derive(Debug, Clone, Default)]
pub struct IndexRunOutcome {
    pub email_count: u64,
    pub new_emails: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum IndexingError {
    #[error("transient indexing failure: {0}")]
    Transient(String),
    #[error("upstream rate limited")]
    RateLimited,
}

/// The actual work of indexing a user (chunking, embedding, vector-store
/// writes, cache invalidation). Supplied at construction so the lifecycle
/// manager depends only on this narrow contract, not the indexing
/// subsystem's internals.
#[rocket::async_trait]
pub trait IndexExecutor: Send + Sync {
    async fn index_user(&self, user_id: i32) -> Result<IndexRunOutcome, IndexingError>;
}

struct WorkerHandle {
    cancel: CancellationToken,
    join: JoinHandle<()>,
}

/// Serializes indexing work per user, enforces the state machine, and
/// exposes non-blocking query entry points.
pub struct IndexLifecycleManager {
    states: DashMap<i32, IndexState>,
    pending: Mutex<HashSet<i32>>,
    executor: Arc<dyn IndexExecutor>,
    reindex_interval: Duration,
    retry_delay: Duration,
    max_retries: u32,
    rate_limit_cooldown: Duration,
    worker: Mutex<Option<WorkerHandle>>,
}

impl IndexLifecycleManager {
    pub fn new(
        executor: Arc<dyn IndexExecutor>,
        reindex_interval: Duration,
        retry_delay: Duration,
        max_retries: u32,
        rate_limit_cooldown: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            states: DashMap::new(),
            pending: Mutex::new(HashSet::new()),
            executor,
            reindex_interval,
            retry_delay,
            max_retries,
            rate_limit_cooldown,
            worker: Mutex::new(None),
        })
    }

    /// Start the background worker. Idempotent: a second call while
    /// already running is a no-op.
    pub fn start(self: &Arc<Self>) {
        let mut worker = self.worker.lock();
        if worker.is_some() {
            log::info!("index lifecycle worker already running");
            return;
        }

        let cancel = CancellationToken::new();
        let manager = Arc::clone(self);
        let worker_cancel = cancel.clone();
        let join = tokio::spawn(async move {
            manager.run_worker_loop(worker_cancel).await;
        });

        *worker = Some(WorkerHandle { cancel, join });
        log::info!("index lifecycle worker started");
    }

    /// Signal graceful exit and wait bounded time for the worker to stop.
    pub async fn stop(&self) {
        let handle = self.worker.lock().take();
        if let Some(handle) = handle {
            log::info!("stopping index lifecycle worker");
            handle.cancel.cancel();
            let _ = tokio::time::timeout(Duration::from_secs(10), handle.join).await;
            log::info!("index lifecycle worker stopped");
        }
    }

    /// Add a user to the pending set. Never blocks, never fails.
    pub fn request_index(&self, user_id: i32) {
        let mut pending = self.pending.lock();
        let inserted = pending.insert(user_id);
        drop(pending);
        if inserted {
            log::info!("queued index for user {}", user_id);
        }
    }

    /// Current state snapshot, resolving any expired rate-limit cooldown.
    pub fn status(&self, user_id: i32) -> IndexState {
        let now = Utc::now();
        let mut entry = self.states.entry(user_id).or_default();
        let effective = entry.effective_status(now);
        if effective != entry.status {
            entry.status = effective;
            entry.rate_limited_until = None;
        }
        entry.clone()
    }

    pub fn is_ready(&self, user_id: i32) -> bool {
        self.status(user_id).status == IndexStatus::Ready
    }

    pub fn is_worker_running(&self) -> bool {
        self.worker.lock().is_some()
    }

    /// Record an LLM rate-limit signal observed for this user's query path.
    pub fn mark_rate_limited(&self, user_id: i32) {
        let mut entry = self.states.entry(user_id).or_default();
        entry.status = IndexStatus::RateLimited;
        entry.rate_limited_until = Some(Utc::now() + self.rate_limit_cooldown);
    }

    async fn run_worker_loop(&self, cancel: CancellationToken) {
        // Brief startup delay so dependent services finish initializing.
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_secs(3)) => {}
            _ = cancel.cancelled() => return,
        }

        loop {
            let pending: Vec<i32> = {
                let mut pending = self.pending.lock();
                pending.drain().collect()
            };

            for user_id in pending {
                if cancel.is_cancelled() {
                    return;
                }
                self.index_user_with_retry(user_id, &cancel).await;
            }

            let ready_users: Vec<i32> = self
                .states
                .iter()
                .filter(|entry| entry.status == IndexStatus::Ready)
                .map(|entry| *entry.key())
                .collect();

            for user_id in ready_users {
                if cancel.is_cancelled() {
                    return;
                }
                self.request_index(user_id);
            }

            tokio::select! {
                _ = tokio::time::sleep(self.reindex_interval) => {}
                _ = cancel.cancelled() => return,
            }
        }
    }

    async fn index_user_with_retry(&self, user_id: i32, cancel: &CancellationToken) {
        for attempt in 1..=self.max_retries {
            if cancel.is_cancelled() {
                return;
            }

            {
                let mut entry = self.states.entry(user_id).or_default();
                entry.status = IndexStatus::Indexing;
                entry.attempt = attempt;
            }

            match self.executor.index_user(user_id).await {
                Ok(outcome) => {
                    let mut entry = self.states.entry(user_id).or_default();
                    entry.status = IndexStatus::Ready;
                    entry.attempt = 0;
                    entry.last_indexed_at = Some(Utc::now());
                    entry.emails_indexed = outcome.email_count;
                    entry.new_emails = outcome.new_emails;
                    entry.last_error = None;
                    log::info!(
                        "index run complete for user {}: {} emails ({} new)",
                        user_id,
                        outcome.email_count,
                        outcome.new_emails
                    );
                    return;
                }
                Err(IndexingError::RateLimited) => {
                    log::warn!("index run rate limited for user {}", user_id);
                    self.mark_rate_limited(user_id);
                    return;
                }
                Err(err) => {
                    log::error!(
                        "index attempt {}/{} failed for user {}: {}",
                        attempt,
                        self.max_retries,
                        user_id,
                        err
                    );

                    if attempt < self.max_retries {
                        let backoff = self.retry_delay * attempt;
                        log::info!("retrying user {} in {:?}", user_id, backoff);
                        tokio::select! {
                            _ = tokio::time::sleep(backoff) => {}
                            _ = cancel.cancelled() => return,
                        }
                    } else {
                        let mut entry = self.states.entry(user_id).or_default();
                        entry.status = IndexStatus::Error;
                        entry.last_error = Some(err.to_string());
                        log::error!(
                            "indexing permanently failed for user {}; degraded query path remains available",
                            user_id
                        );
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingExecutor {
        calls: AtomicUsize,
        fail_times: usize,
    }

    #[rocket::async_trait]
    impl IndexExecutor for CountingExecutor {
        async fn index_user(&self, _user_id: i32) -> Result<IndexRunOutcome, IndexingError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.fail_times {
                Err(IndexingError::Transient("boom".into()))
            } else {
                Ok(IndexRunOutcome {
                    email_count: 5,
                    new_emails: 2,
                })
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn transitions_idle_to_ready_on_success() {
        let executor = Arc::new(CountingExecutor {
            calls: AtomicUsize::new(0),
            fail_times: 0,
        });
        let manager = IndexLifecycleManager::new(
            executor,
            Duration::from_secs(300),
            Duration::from_millis(1),
            3,
            Duration::from_secs(7200),
        );

        assert_eq!(manager.status(1).status, IndexStatus::Idle);
        manager.index_user_with_retry(1, &CancellationToken::new()).await;
        let state = manager.status(1);
        assert_eq!(state.status, IndexStatus::Ready);
        assert_eq!(state.emails_indexed, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_then_errors_on_exhaustion() {
        let executor = Arc::new(CountingExecutor {
            calls: AtomicUsize::new(0),
            fail_times: 10,
        });
        let manager = IndexLifecycleManager::new(
            executor,
            Duration::from_secs(300),
            Duration::from_millis(1),
            3,
            Duration::from_secs(7200),
        );

        manager.index_user_with_retry(7, &CancellationToken::new()).await;
        let state = manager.status(7);
        assert_eq!(state.status, IndexStatus::Error);
        assert!(state.last_error.is_some());
    }

    #[test]
    fn request_index_is_idempotent_before_pickup() {
        let executor = Arc::new(CountingExecutor {
            calls: AtomicUsize::new(0),
            fail_times: 0,
        });
        let manager = IndexLifecycleManager::new(
            executor,
            Duration::from_secs(300),
            Duration::from_secs(30),
            3,
            Duration::from_secs(7200),
        );

        manager.request_index(42);
        manager.request_index(42);
        manager.request_index(42);
        assert_eq!(manager.pending.lock().len(), 1);
    }
}
