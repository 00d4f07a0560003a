//! # quakedb-core
//!
//! Session runtime and buffer-pool core for a small embedded database
//! back end.
//!
//! ## Architecture
//!
//! - `users`: registered-user cache and id allocation (C1/C2)
//! - `buffer`: fixed-capacity block buffer pool and its eviction worker
//!   (C3-C5)
//! - `tasks`: the unit of work a session dispatches (C6)
//! - `session`: one authenticated user's worker thread and task queue (C7)
//! - `registry`: the process-wide session table and dispatch API (C8/C9)
//! - `ports`: the external-collaborator seam (durable storage, transaction
//!   ids)
//! - `config`: process-wide tunables
//! - `error`: crate-level error aggregation
//!
//! [`Runtime`] is the single composition root: it owns the user cache,
//! buffer pool, eviction worker, and session registry, and takes an
//! injected [`ports::StorageBackend`]. This replaces the free-standing
//! globals (`id`, `idMutex`, `userCache`, `processBuffer`, `buffers`,
//! `tablesPath`) the original prototype scattered across translation
//! units.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod buffer;
pub mod config;
pub mod error;
pub mod ports;
pub mod registry;
pub mod session;
pub mod tasks;
pub mod types;
pub mod users;

use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::OnceCell;

use buffer::{BufferPool, EvictionWorker};
use config::RuntimeConfig;
use error::QuakeError;
use ports::StorageBackend;
use registry::SessionRegistry;
use session::Session;
use types::ColumnValue;
use users::{UserCache, UserIdAllocator};

/// Optional process-wide handle, for callers that would rather reach a
/// single global `Runtime` than thread an `Arc<Runtime>` through their own
/// call stack. Nothing in this crate relies on it being set.
static GLOBAL_RUNTIME: OnceCell<Runtime> = OnceCell::new();

/// The single composition root: bundles every subsystem and exposes the
/// dispatch API callers drive the database through.
pub struct Runtime {
    cache: Arc<UserCache>,
    allocator: Arc<UserIdAllocator>,
    buffer_pool: Arc<BufferPool>,
    eviction_worker: EvictionWorker,
    registry: SessionRegistry,
}

impl Runtime {
    /// Build a runtime over the given configuration and storage backend,
    /// spawning the eviction worker immediately.
    pub fn new(config: RuntimeConfig, backend: Arc<dyn StorageBackend>) -> Self {
        let cache = Arc::new(UserCache::new());
        let allocator = Arc::new(UserIdAllocator::new());
        let buffer_pool = Arc::new(BufferPool::new(config.buffer_pool_capacity));
        let eviction_worker = EvictionWorker::spawn(Arc::clone(&buffer_pool), Arc::clone(&backend));
        let registry = SessionRegistry::new(
            Arc::clone(&cache),
            Arc::clone(&allocator),
            Arc::clone(&buffer_pool),
            backend,
            config,
        );

        Self { cache, allocator, buffer_pool, eviction_worker, registry }
    }

    /// Seed a user directly into the cache, bypassing session dispatch.
    ///
    /// `add_buser` below requires an already-running session to dispatch
    /// through, which makes it unusable to create the very first user in
    /// the system. The original prototype's own test suite resolves this
    /// the same way: `UnitTestRoleThreadManager.cpp`'s `setupUser` helper
    /// calls `addUserToCache` directly, before any `startSession` call.
    pub fn bootstrap_user(
        &self,
        username: impl Into<String>,
        credential: impl Into<String>,
        email: impl Into<String>,
    ) -> Result<i64, users::cache::UserCacheError> {
        let id = self.allocator.next_user_id();
        self.cache.add_user(users::User::new(id, username, credential, email)).map(|u| u.id)
    }

    /// Register a new user by dispatching an add-user task through the
    /// session bound to `(session_username, session_credential)`
    /// (`addBuser`).
    #[allow(clippy::too_many_arguments)]
    pub fn add_buser(
        &self,
        new_username: impl Into<String>,
        new_credential: impl Into<String>,
        new_email: impl Into<String>,
        use_hash: bool,
        session_username: &str,
        session_credential: &str,
    ) -> Result<i64, QuakeError> {
        self.registry
            .add_buser(new_username, new_credential, new_email, use_hash, session_username, session_credential)
            .map_err(QuakeError::Registry)
    }

    /// Authenticate and start a session (`startSession`).
    pub fn start_session(
        &self,
        username: &str,
        credential: &str,
        ttl: Option<Duration>,
    ) -> Result<Arc<Session>, QuakeError> {
        self.registry.start_session(username, credential, ttl).map_err(QuakeError::Session)
    }

    /// Submit an add-tuple task to the session bound to
    /// `(session_username, session_credential)`.
    #[allow(clippy::too_many_arguments)]
    pub fn add_tuple(
        &self,
        session_username: &str,
        session_credential: &str,
        table_id: i32,
        values: Vec<ColumnValue>,
        null_bitmap: Vec<bool>,
        caller_address: Option<String>,
    ) -> Result<(), QuakeError> {
        self.registry
            .add_tuple(session_username, session_credential, table_id, values, null_bitmap, caller_address)
            .map_err(QuakeError::Registry)
    }

    /// Assemble a table-header descriptor and submit it to the session
    /// bound to `(session_username, session_credential)` (`addTable`).
    #[allow(clippy::too_many_arguments)]
    pub fn add_table(
        &self,
        session_username: &str,
        session_credential: &str,
        column_types: Vec<i8>,
        column_nullable: Vec<i8>,
        column_names: Vec<String>,
        table_id: i32,
        caller_address: Option<String>,
    ) -> Result<(), QuakeError> {
        self.registry
            .add_table(
                session_username,
                session_credential,
                column_types,
                column_nullable,
                column_names,
                table_id,
                caller_address,
            )
            .map_err(QuakeError::Registry)
    }

    /// Whether a session bound to `(username, credential)` is currently
    /// running.
    pub fn check_user_process(&self, username: &str, credential: &str) -> bool {
        self.registry.check_user_process(username, credential)
    }

    /// Stop every registered session; the registry itself is retained.
    pub fn wait_for_all_processes_to_finish(&self) {
        self.registry.wait_for_all_processes_to_finish();
    }

    /// Access the underlying user cache, e.g. for direct lookups.
    pub fn user_cache(&self) -> &UserCache {
        &self.cache
    }

    /// Access the underlying buffer pool, e.g. for diagnostics.
    pub fn buffer_pool(&self) -> &BufferPool {
        &self.buffer_pool
    }

    /// Diagnostic snapshot of every registered user
    /// (supplements `showUserCache`, SPEC_FULL.md §4.10).
    pub fn debug_dump_users(&self) -> Vec<String> {
        self.cache.debug_dump()
    }

    /// Diagnostic snapshot of every registered session
    /// (supplements `showProcessBuffer`, SPEC_FULL.md §4.10).
    pub fn debug_dump_sessions(&self) -> Vec<(String, bool)> {
        self.registry.debug_dump()
    }

    /// Install this runtime as the process-wide global handle. Fails,
    /// returning the runtime unchanged, if one is already installed.
    pub fn install_global(self) -> Result<(), Runtime> {
        GLOBAL_RUNTIME.set(self)
    }

    /// Borrow the process-wide global handle, if one has been installed
    /// via [`Runtime::install_global`].
    pub fn global() -> Option<&'static Runtime> {
        GLOBAL_RUNTIME.get()
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        self.registry.wait_for_all_processes_to_finish();
        self.eviction_worker.stop(&self.buffer_pool);
    }
}
