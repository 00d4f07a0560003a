//! `BufferPool` (C4, `spec.md` §4.3) — the fixed-capacity slot array shared
//! between callers that add blocks and the eviction worker that reclaims
//! room for them.

use parking_lot::{Condvar, Mutex};
use thiserror::Error;

use super::block::BlockBuffer;

/// Errors raised by [`BufferPool`] operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    /// `add_to_free_slot` was given a slot index outside the pool.
    #[error("slot index {0} out of range")]
    SlotOutOfRange(usize),

    /// The pool was asked to admit a block while a prior admission hint
    /// was still pending (`spec.md` §4.3 allows only one outstanding
    /// cache-hint at a time).
    #[error("an admission is already pending")]
    AdmissionAlreadyPending,
}

struct PoolState {
    slots: Vec<Option<BlockBuffer>>,
    /// The block waiting on the eviction worker to free a slot for it.
    pending_admission: Option<BlockBuffer>,
    stopped: bool,
}

/// Fixed-capacity pool of cache-resident blocks (C4).
///
/// Translates `original_source/src/sysThreadPool.h`'s
/// `SysThreadPool<Cache, VectorType>` template — generic over a cache type
/// and a backing vector type — into one concrete, owned `Vec<Option<...>>`
/// guarded by a `parking_lot::Mutex`, with a `Condvar` standing in for the
/// original's bare pthread signaling between the cache-hint caller and the
/// eviction thread.
pub struct BufferPool {
    capacity: usize,
    state: Mutex<PoolState>,
    /// Signaled whenever a slot frees up or the pool stops, so callers
    /// blocked in `add_to_free_slot`'s caller (the eviction worker) notice.
    slot_freed: Condvar,
    /// Signaled whenever `cache_hint` posts a pending admission or the
    /// pool stops, so the eviction worker's wait loop wakes up.
    hint_posted: Condvar,
}

impl BufferPool {
    /// Build an empty pool with `capacity` slots, all initially free.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            state: Mutex::new(PoolState {
                slots: (0..capacity).map(|_| None).collect(),
                pending_admission: None,
                stopped: false,
            }),
            slot_freed: Condvar::new(),
            hint_posted: Condvar::new(),
        }
    }

    /// Number of slots in the pool.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether every slot is occupied (`isFull`, `spec.md` §4.3).
    pub fn is_full(&self) -> bool {
        self.state.lock().slots.iter().all(|s| s.is_some())
    }

    /// Number of occupied slots.
    pub fn len(&self) -> usize {
        self.state.lock().slots.iter().filter(|s| s.is_some()).count()
    }

    /// Directly admit a block into the first free slot, if one exists.
    /// Returns the slot index it landed in, or `None` if the pool is full
    /// (the caller should fall back to [`BufferPool::cache_hint`]).
    pub fn try_admit(&self, buffer: BlockBuffer) -> Option<usize> {
        let mut state = self.state.lock();
        let free = state.slots.iter().position(|s| s.is_none())?;
        state.slots[free] = Some(buffer);
        Some(free)
    }

    /// Post a block as awaiting admission once the eviction worker frees a
    /// slot for it (`cacheHint`, `spec.md` §4.3). Only one admission may be
    /// pending at a time.
    pub fn cache_hint(&self, buffer: BlockBuffer) -> Result<(), PoolError> {
        let mut state = self.state.lock();
        if state.pending_admission.is_some() {
            return Err(PoolError::AdmissionAlreadyPending);
        }
        state.pending_admission = Some(buffer);
        self.hint_posted.notify_one();
        Ok(())
    }

    /// Block until a cache hint is posted or the pool stops, returning the
    /// pending block (and clearing it) in the former case. Called only by
    /// the eviction worker.
    pub fn wait_for_hint(&self) -> Option<BlockBuffer> {
        let mut state = self.state.lock();
        loop {
            if let Some(buffer) = state.pending_admission.take() {
                return Some(buffer);
            }
            if state.stopped {
                return None;
            }
            self.hint_posted.wait(&mut state);
        }
    }

    /// Install `buffer` into `slot`, which the eviction worker has just
    /// freed (`addToFreeSlot`, `spec.md` §4.3 step 8).
    pub fn add_to_free_slot(&self, slot: usize, buffer: BlockBuffer) -> Result<(), PoolError> {
        let mut state = self.state.lock();
        let entry = state.slots.get_mut(slot).ok_or(PoolError::SlotOutOfRange(slot))?;
        *entry = Some(buffer);
        drop(state);
        self.slot_freed.notify_all();
        Ok(())
    }

    /// Evict the block at `slot`, leaving it empty, and return what was
    /// there. Used by the eviction worker after write-back succeeds (or is
    /// logged as failed — see `spec.md` §7 / DESIGN.md's O5 decision).
    pub fn take_slot(&self, slot: usize) -> Result<Option<BlockBuffer>, PoolError> {
        let mut state = self.state.lock();
        let entry = state.slots.get_mut(slot).ok_or(PoolError::SlotOutOfRange(slot))?;
        Ok(entry.take())
    }

    /// Run `f` over a read-only view of the occupied slots, used by the
    /// eviction worker's victim-selection pass (§4.4 steps 1-4) and by
    /// diagnostics.
    pub fn with_slots<R>(&self, f: impl FnOnce(&[Option<BlockBuffer>]) -> R) -> R {
        let state = self.state.lock();
        f(&state.slots)
    }

    /// Wake up anything waiting on this pool and mark it stopped, so the
    /// eviction worker's wait loop exits.
    pub fn stop(&self) {
        let mut state = self.state.lock();
        state.stopped = true;
        drop(state);
        self.hint_posted.notify_all();
        self.slot_freed.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DataBlock;
    use crate::buffer::block::Payload;

    fn block(table_id: i32) -> BlockBuffer {
        BlockBuffer::new(table_id, 0, 0, false, Payload::Data(DataBlock::zeroed()))
    }

    #[test]
    fn try_admit_fills_free_slots_then_reports_full() {
        let pool = BufferPool::new(2);
        assert!(!pool.is_full());
        assert_eq!(pool.try_admit(block(1)), Some(0));
        assert_eq!(pool.try_admit(block(2)), Some(1));
        assert!(pool.is_full());
        assert_eq!(pool.try_admit(block(3)), None);
    }

    #[test]
    fn cache_hint_rejects_second_pending_admission() {
        let pool = BufferPool::new(1);
        pool.cache_hint(block(1)).unwrap();
        let err = pool.cache_hint(block(2)).unwrap_err();
        assert_eq!(err, PoolError::AdmissionAlreadyPending);
    }

    #[test]
    fn add_to_free_slot_rejects_out_of_range_index() {
        let pool = BufferPool::new(1);
        let err = pool.add_to_free_slot(5, block(1)).unwrap_err();
        assert_eq!(err, PoolError::SlotOutOfRange(5));
    }

    #[test]
    fn wait_for_hint_returns_none_after_stop() {
        let pool = BufferPool::new(1);
        pool.stop();
        assert!(pool.wait_for_hint().is_none());
    }
}
