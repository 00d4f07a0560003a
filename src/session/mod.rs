//! `Session` (C7, `spec.md` §4.5) — one authenticated user's worker thread,
//! task queue, and idle-TTL lifetime.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use thiserror::Error;

use crate::buffer::{BlockBuffer, BufferPool, Payload};
use crate::ports::StorageBackend;
use crate::tasks::{QueuedTask, Task};
use crate::types::DataBlock;
use crate::users::{User, UserCache};

/// Errors raised by [`Session`] operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// `Session::start` was given a username/credential pair the user
    /// cache doesn't recognize.
    #[error("authentication failed for user {username:?}")]
    AuthenticationFailed {
        /// The username that failed to authenticate.
        username: String,
    },

    /// `submit` was called after `stop` (or after the session's idle TTL
    /// expired on its own). Resolves `spec.md` §9 O1: rather than silently
    /// dropping the task, submission after stop is a reported error.
    #[error("session is not running")]
    NotRunning,
}

/// A single authenticated user's session: an owned task queue drained by
/// a dedicated worker thread, with an idle-TTL lifetime.
///
/// Ports `original_source/src/threadPoolRole.cpp`'s `Session` class — the
/// `CLOCK_MONOTONIC`-based `run()` variant is the one reflected here
/// (`spec.md` §9 O3 names it as the correct one; the `CLOCK_REALTIME` and
/// `rc >= ttl` variants in the original's commented-out code are dead and
/// not carried forward).
pub struct Session {
    username: String,
    /// The credential this session authenticated with. Bound at `start`
    /// and never changed; `SessionRegistry::check_user_process` matches
    /// against it directly rather than re-querying the user cache.
    credential: String,
    user_id: i64,
    started_at: chrono::DateTime<chrono::Utc>,
    ttl: Duration,
    queue_capacity: usize,
    queue: Mutex<VecDeque<QueuedTask>>,
    queue_not_empty: Condvar,
    queue_not_full: Condvar,
    stopped: AtomicBool,
    handle: Mutex<Option<JoinHandle<()>>>,

    cache: Arc<UserCache>,
    buffer_pool: Arc<BufferPool>,
    backend: Arc<dyn StorageBackend>,
    table_headers_path: String,
}

impl Session {
    /// Authenticate `username`/`credential` against `cache` and, on
    /// success, spawn the session's worker thread (`start`, `spec.md`
    /// §4.5).
    #[allow(clippy::too_many_arguments)]
    pub fn start(
        username: impl Into<String>,
        credential: &str,
        ttl: Duration,
        queue_capacity: usize,
        table_headers_path: impl Into<String>,
        cache: Arc<UserCache>,
        buffer_pool: Arc<BufferPool>,
        backend: Arc<dyn StorageBackend>,
    ) -> Result<Arc<Session>, SessionError> {
        let username = username.into();
        let user_id = cache
            .get_user_id_from_cache(&username, credential)
            .map_err(|_| SessionError::AuthenticationFailed { username: username.clone() })?;

        let session = Arc::new(Session {
            username,
            credential: credential.to_string(),
            user_id,
            started_at: chrono::Utc::now(),
            ttl,
            queue_capacity,
            queue: Mutex::new(VecDeque::new()),
            queue_not_empty: Condvar::new(),
            queue_not_full: Condvar::new(),
            stopped: AtomicBool::new(false),
            handle: Mutex::new(None),
            cache,
            buffer_pool,
            backend,
            table_headers_path: table_headers_path.into(),
        });

        let worker = Arc::clone(&session);
        let handle = thread::spawn(move || worker.run());
        *session.handle.lock() = Some(handle);

        Ok(session)
    }

    /// Username this session authenticated as.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Credential this session authenticated with (`checkUserProcess`'s
    /// match target, `spec.md` §6).
    pub fn credential(&self) -> &str {
        &self.credential
    }

    /// Id of the user this session authenticated as.
    pub fn user_id(&self) -> i64 {
        self.user_id
    }

    /// UTC timestamp this session was started, for activity diagnostics.
    pub fn started_at(&self) -> chrono::DateTime<chrono::Utc> {
        self.started_at
    }

    /// Whether the worker thread has stopped (either via [`Session::stop`]
    /// or idle-TTL expiry).
    pub fn is_running(&self) -> bool {
        !self.stopped.load(Ordering::Acquire)
    }

    /// Enqueue a task for this session's worker thread (`submit`,
    /// `spec.md` §4.5). Blocks while the queue is at capacity; returns
    /// [`SessionError::NotRunning`] once the session has stopped.
    pub fn submit(&self, task: Task, caller_address: Option<String>) -> Result<(), SessionError> {
        let queued = match caller_address {
            Some(addr) => QueuedTask::with_caller_address(task, addr),
            None => QueuedTask::new(task),
        };

        let mut queue = self.queue.lock();
        loop {
            if self.stopped.load(Ordering::Acquire) {
                return Err(SessionError::NotRunning);
            }
            if queue.len() < self.queue_capacity {
                break;
            }
            self.queue_not_full.wait(&mut queue);
        }
        queue.push_back(queued);
        self.queue_not_empty.notify_one();
        Ok(())
    }

    /// Stop the session: idempotent, matching the original's atomic
    /// compare-and-exchange guard in `Session::stop`. Blocks until the
    /// worker thread has exited.
    pub fn stop(&self) {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return;
        }
        self.queue_not_empty.notify_all();
        self.queue_not_full.notify_all();
        if let Some(handle) = self.handle.lock().take() {
            let _ = handle.join();
        }
    }

    fn run(self: Arc<Self>) {
        log::info!(
            "session '{}' (user {}) worker started at {}",
            self.username,
            self.user_id,
            self.started_at.to_rfc3339()
        );

        // Absolute and computed once, per `spec.md` §4.5: "any task arrival
        // does not extend it." Recomputing this inside the loop would turn
        // a steady task stream into a session that never expires.
        let deadline = Instant::now() + self.ttl;

        loop {
            let queued = {
                let mut queue = self.queue.lock();
                loop {
                    if let Some(queued) = queue.pop_front() {
                        break Some(queued);
                    }
                    if self.stopped.load(Ordering::Acquire) {
                        break None;
                    }
                    let result = self.queue_not_empty.wait_until(&mut queue, deadline);
                    if result.timed_out() && queue.is_empty() {
                        break None;
                    }
                }
            };

            match queued {
                Some(queued) => {
                    self.queue_not_full.notify_one();
                    self.dispatch(queued);
                }
                None => {
                    if !self.stopped.swap(true, Ordering::AcqRel) {
                        log::info!("session '{}' idle TTL expired, stopping", self.username);
                    }
                    break;
                }
            }
        }

        log::info!("session '{}' worker stopped", self.username);
    }

    fn dispatch(&self, queued: QueuedTask) {
        log::debug!(
            "session '{}' dispatching {} task (caller={:?})",
            self.username,
            queued.task.kind(),
            queued.caller_address
        );

        match queued.task {
            Task::AddUser { user_id, username, credential, email, use_hash } => {
                let user = User { id: user_id, username, credential, email, hash_on_set: use_hash };
                if let Err(err) = self.cache.add_user(user) {
                    log::error!("add_user task failed: {err}");
                }
            }
            Task::AddTuple { table_id, values, null_bitmap } => {
                let transaction_id = self.backend.get_transaction_and_increment();
                match self.backend.add_tuple_to_buffer(
                    &self.table_headers_path,
                    table_id,
                    &values,
                    &null_bitmap,
                    transaction_id,
                ) {
                    Ok(()) => self.admit_block(table_id, transaction_id),
                    Err(err) => log::error!("add_tuple task failed: {err}"),
                }
            }
            Task::AddTableHeader { header } => {
                if let Err(err) = self.backend.add_table_to_buffer(&self.table_headers_path, &header) {
                    log::error!("add_table_header task failed: {err}");
                }
            }
        }
    }

    fn admit_block(&self, table_id: i32, block_number: i64) {
        let block = BlockBuffer::new(table_id, block_number, 1, false, Payload::Data(DataBlock::zeroed()));
        if let Some(stale) = self.buffer_pool.try_admit(block.clone()) {
            log::debug!("admitted table {table_id} block into free slot {stale}");
            return;
        }
        if let Err(err) = self.buffer_pool.cache_hint(block) {
            log::error!("buffer pool admission failed for table {table_id}: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::BufferPool;
    use crate::ports::InMemoryStorageBackend;
    use crate::types::ColumnValue;

    fn setup() -> (Arc<UserCache>, Arc<BufferPool>, Arc<dyn StorageBackend>) {
        let cache = Arc::new(UserCache::new());
        let allocator = crate::users::UserIdAllocator::new();
        let id = allocator.next_user_id();
        cache.add_user(User::new(id, "adminQkDB", "Quake17", "admin@quakedb.test")).unwrap();
        let pool = Arc::new(BufferPool::new(4));
        let backend: Arc<dyn StorageBackend> = Arc::new(InMemoryStorageBackend::new());
        (cache, pool, backend)
    }

    #[test]
    fn start_fails_for_unknown_credentials() {
        let (cache, pool, backend) = setup();
        let err = Session::start(
            "adminQkDB",
            "wrong-password",
            Duration::from_secs(60),
            16,
            "data/tablesData/",
            cache,
            pool,
            backend,
        )
        .unwrap_err();
        assert!(matches!(err, SessionError::AuthenticationFailed { .. }));
    }

    #[test]
    fn submit_after_stop_returns_not_running() {
        let (cache, pool, backend) = setup();
        let session = Session::start(
            "adminQkDB",
            "Quake17",
            Duration::from_secs(60),
            16,
            "data/tablesData/",
            cache,
            pool,
            backend,
        )
        .unwrap();

        session.stop();

        let err = session
            .submit(Task::AddTuple { table_id: 1, values: vec![ColumnValue::Int(1)], null_bitmap: vec![false] }, None)
            .unwrap_err();
        assert_eq!(err, SessionError::NotRunning);
    }

    #[test]
    fn submitted_tuple_reaches_the_backend() {
        let (cache, pool, backend) = setup();
        let session = Session::start(
            "adminQkDB",
            "Quake17",
            Duration::from_secs(60),
            16,
            "data/tablesData/",
            cache,
            pool,
            Arc::clone(&backend),
        )
        .unwrap();

        session
            .submit(
                Task::AddTuple { table_id: 7, values: vec![ColumnValue::Text("hi".into())], null_bitmap: vec![false] },
                Some("127.0.0.1".to_string()),
            )
            .unwrap();

        session.stop();
    }

    #[test]
    fn session_expires_after_short_ttl() {
        let (cache, pool, backend) = setup();
        let session = Session::start(
            "adminQkDB",
            "Quake17",
            Duration::from_millis(100),
            16,
            "data/tablesData/",
            cache,
            pool,
            backend,
        )
        .unwrap();

        std::thread::sleep(Duration::from_millis(400));
        assert!(!session.is_running());
    }

    #[test]
    fn ttl_deadline_is_absolute_and_not_extended_by_task_arrival() {
        let (cache, pool, backend) = setup();
        let session = Session::start(
            "adminQkDB",
            "Quake17",
            Duration::from_millis(150),
            16,
            "data/tablesData/",
            cache,
            pool,
            backend,
        )
        .unwrap();

        // Keep submitting work past the TTL. A sliding deadline would reset
        // on every arrival and the session would never expire.
        let give_up_at = std::time::Instant::now() + Duration::from_millis(500);
        while std::time::Instant::now() < give_up_at && session.is_running() {
            let _ = session.submit(
                Task::AddTuple { table_id: 1, values: vec![ColumnValue::Int(1)], null_bitmap: vec![false] },
                None,
            );
            std::thread::sleep(Duration::from_millis(20));
        }

        assert!(!session.is_running(), "a steady task stream must not prevent TTL expiry");
    }
}
