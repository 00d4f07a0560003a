//! The external-collaborator seam (`spec.md` §6).
//!
//! `addUserToCache`, `getUserIdFromCache`, and `checkUserProcess` are core
//! operations — §2 of `spec.md` places them on C2/C8 — and live directly on
//! [`crate::users::cache::UserCache`] / [`crate::registry::SessionRegistry`].
//! Everything that touches durable storage or the MVCC transaction-id
//! allocator is genuinely external and is collected here behind one
//! object-safe trait, the same shape the teacher uses for its
//! `database::connection_pool::HealthCheck` and
//! `scheduling::worker::TaskHandler` traits (small trait, `Arc<dyn ...>`
//! at the call site, made synchronous here since the core has no async
//! runtime — see `spec.md` §5's "no cooperative runtime" constraint).

use crate::buffer::block::BlockBuffer;
use crate::types::{ColumnValue, TableHeaderDescriptor};
use parking_lot::Mutex;
use std::io;

/// Durable-side collaborators the core dispatches to but does not own.
///
/// Implementations may do disk or network I/O; none of these calls are on
/// a path the core itself blocks a caller on except `cache_hint`'s direct
/// admission, which never reaches `add_buffer_data_to_file`.
pub trait StorageBackend: Send + Sync {
    /// Durable-side tuple append (`addTupleToBuffer`, `spec.md` §6).
    fn add_tuple_to_buffer(
        &self,
        path: &str,
        table_id: i32,
        values: &[ColumnValue],
        null_bitmap: &[bool],
        transaction_id: i64,
    ) -> io::Result<()>;

    /// Durable-side table-header append (`addTableToBuffer`, `spec.md` §6).
    fn add_table_to_buffer(&self, base_path: &str, header: &TableHeaderDescriptor) -> io::Result<()>;

    /// Write a (dirty or live) block buffer to its backing file
    /// (`addBufferDataToFile`, `spec.md` §6). Failure is logged by the
    /// eviction worker and does not abort eviction — see `spec.md` §7 and
    /// DESIGN.md's O5 decision.
    fn add_buffer_data_to_file(&self, buffer: &BlockBuffer) -> io::Result<()>;

    /// Monotonic transaction-id allocator, distinct from the user-id
    /// allocator (`getTransactionAndIncrement`, `spec.md` §6).
    fn get_transaction_and_increment(&self) -> i64;
}

/// An in-memory [`StorageBackend`] double for tests and the demo binary.
///
/// Records every call it receives instead of touching a filesystem, so
/// tests can assert on write-back behavior (P10 in `spec.md` §8) without
/// real disk I/O. Grounded on the teacher's habit of pairing a trait with
/// an in-process fake in its own test modules (e.g. `database::cache`'s
/// tests construct a bare `CacheManager` rather than mocking a network
/// cache tier).
pub struct InMemoryStorageBackend {
    state: Mutex<BackendState>,
}

#[derive(Default)]
struct BackendState {
    /// Cumulative bytes "written" per table id, keyed the way P10 checks
    /// "backing file size before and after eviction".
    table_file_sizes: std::collections::HashMap<i32, u64>,
    tuples_written: Vec<(String, i32, Vec<ColumnValue>, Vec<bool>, i64)>,
    table_headers_written: Vec<TableHeaderDescriptor>,
    next_transaction_id: i64,
}

impl InMemoryStorageBackend {
    /// Construct an empty backend with transaction ids starting at 1.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(BackendState {
                next_transaction_id: 1,
                ..Default::default()
            }),
        }
    }

    /// Current recorded file size for a table id (0 if never written).
    pub fn file_size(&self, table_id: i32) -> u64 {
        self.state
            .lock()
            .table_file_sizes
            .get(&table_id)
            .copied()
            .unwrap_or(0)
    }

    /// Number of tuple appends recorded so far.
    pub fn tuple_count(&self) -> usize {
        self.state.lock().tuples_written.len()
    }

    /// Number of table-header appends recorded so far.
    pub fn table_header_count(&self) -> usize {
        self.state.lock().table_headers_written.len()
    }
}

impl Default for InMemoryStorageBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageBackend for InMemoryStorageBackend {
    fn add_tuple_to_buffer(
        &self,
        path: &str,
        table_id: i32,
        values: &[ColumnValue],
        null_bitmap: &[bool],
        transaction_id: i64,
    ) -> io::Result<()> {
        let mut state = self.state.lock();
        state.tuples_written.push((
            path.to_string(),
            table_id,
            values.to_vec(),
            null_bitmap.to_vec(),
            transaction_id,
        ));
        Ok(())
    }

    fn add_table_to_buffer(&self, _base_path: &str, header: &TableHeaderDescriptor) -> io::Result<()> {
        if log::log_enabled!(log::Level::Debug) {
            match serde_json::to_string(header) {
                Ok(json) => log::debug!("table header appended: {json}"),
                Err(err) => log::debug!("table header appended (unserializable: {err})"),
            }
        }
        self.state.lock().table_headers_written.push(header.clone());
        Ok(())
    }

    fn add_buffer_data_to_file(&self, buffer: &BlockBuffer) -> io::Result<()> {
        let mut state = self.state.lock();
        let entry = state.table_file_sizes.entry(buffer.table_id).or_insert(0);
        *entry += buffer.approx_payload_size() as u64;
        Ok(())
    }

    fn get_transaction_and_increment(&self) -> i64 {
        let mut state = self.state.lock();
        let id = state.next_transaction_id;
        state.next_transaction_id += 1;
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::block::{BlockBuffer, Payload};
    use crate::types::DataBlock;

    #[test]
    fn transaction_ids_are_monotonic() {
        let backend = InMemoryStorageBackend::new();
        let a = backend.get_transaction_and_increment();
        let b = backend.get_transaction_and_increment();
        assert!(b > a);
    }

    #[test]
    fn write_back_grows_recorded_file_size() {
        let backend = InMemoryStorageBackend::new();
        assert_eq!(backend.file_size(700), 0);

        let buf = BlockBuffer::new(700, 1, 1, true, Payload::Data(DataBlock::zeroed()));
        backend.add_buffer_data_to_file(&buf).unwrap();

        assert!(backend.file_size(700) > 0);
    }
}
