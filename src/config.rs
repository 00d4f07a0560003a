//! Runtime configuration.
//!
//! Bundles the knobs that `spec.md` leaves as scattered constructor
//! parameters (buffer pool capacity, default session TTL, table base path)
//! into one `Default`-able value, following the teacher's
//! `DatabaseConfig`/`CollectorConfig` convention: a plain struct with a
//! hand-written `Default` impl, no external config-file crate.

/// Process-wide tunables for a [`crate::Runtime`].
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Number of slots in the buffer pool (C4 capacity).
    pub buffer_pool_capacity: usize,

    /// Default session idle TTL, in seconds, used by `start_session` when
    /// the caller doesn't override it.
    pub default_session_ttl_secs: u64,

    /// Bound on a session's task queue. `spec.md` describes the queue as
    /// "bounded" (§3 C7) without naming a number; submissions beyond this
    /// bound block the caller rather than growing the queue unboundedly.
    pub session_queue_capacity: usize,

    /// Base directory for table-header appends (`addTableToBuffer`'s
    /// `basePath` in spec.md §6), mirroring the original's
    /// `"data/tablesData/"` literal.
    pub table_headers_path: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            buffer_pool_capacity: 64,
            default_session_ttl_secs: 3600,
            session_queue_capacity: 256,
            table_headers_path: "data/tablesData/".to_string(),
        }
    }
}
