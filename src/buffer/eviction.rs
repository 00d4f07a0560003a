//! `EvictionWorker` (C5, `spec.md` §4.4) — the background thread that
//! reclaims a pool slot whenever a cache hint is posted.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;

use super::block::BlockBuffer;
use super::pool::BufferPool;
use crate::ports::StorageBackend;

/// Select the victim slot among `slots` per `spec.md` §4.4 steps 1-4:
/// the lowest use count wins; on a tie, prefer evicting a clean block over
/// a dirty one; on a further tie, the lowest (leftmost) index wins.
///
/// Ported from the live branch of `original_source/src/sysThreadPool.h`'s
/// `run()` — the commented-out `cachePtr->erase`-based variant is dead
/// code per `spec.md` §9 O3 and is not reflected here.
fn select_victim(slots: &[Option<BlockBuffer>]) -> Option<usize> {
    let mut best: Option<usize> = None;

    for (idx, slot) in slots.iter().enumerate() {
        let Some(candidate) = slot else { continue };
        let Some(best_idx) = best else {
            best = Some(idx);
            continue;
        };
        let incumbent = slots[best_idx].as_ref().expect("best index always occupied");

        let better = match candidate.use_count.cmp(&incumbent.use_count) {
            std::cmp::Ordering::Less => true,
            std::cmp::Ordering::Greater => false,
            std::cmp::Ordering::Equal => !candidate.dirty && incumbent.dirty,
        };
        if better {
            best = Some(idx);
        }
    }

    best
}

/// Background thread that turns cache hints into freed, admitted slots.
///
/// Grounded on `src/enterprise/analytics/collector.rs`'s `thread::spawn` +
/// `Arc<AtomicBool>` running-flag idiom for shaping a long-lived worker
/// thread in this codebase's voice; the victim-selection and write-back
/// logic itself is ported from `sysThreadPool.h`'s `run()`.
pub struct EvictionWorker {
    running: Arc<AtomicBool>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl EvictionWorker {
    /// Spawn the worker thread, which immediately begins waiting on
    /// `pool`'s cache-hint condvar.
    pub fn spawn(pool: Arc<BufferPool>, backend: Arc<dyn StorageBackend>) -> Self {
        let running = Arc::new(AtomicBool::new(true));
        let worker_running = Arc::clone(&running);

        let handle = thread::spawn(move || {
            log::info!("eviction worker started");
            while worker_running.load(Ordering::Acquire) {
                let Some(incoming) = pool.wait_for_hint() else {
                    break;
                };
                Self::evict_and_admit(&pool, &backend, incoming);
            }
            log::info!("eviction worker stopped");
        });

        Self { running, handle: Mutex::new(Some(handle)) }
    }

    fn evict_and_admit(pool: &BufferPool, backend: &Arc<dyn StorageBackend>, incoming: BlockBuffer) {
        let victim_slot = pool.with_slots(select_victim);

        let Some(slot) = victim_slot else {
            log::error!("eviction requested but pool has no occupied slots to evict");
            return;
        };

        if let Ok(Some(victim)) = pool.take_slot(slot) {
            if let Err(err) = backend.add_buffer_data_to_file(&victim) {
                log::error!(
                    "write-back failed for table {} block {}: {err}",
                    victim.table_id,
                    victim.block_number
                );
            }
        }

        if let Err(err) = pool.add_to_free_slot(slot, incoming) {
            log::error!("failed to install evicted slot {slot}: {err}");
        }
    }

    /// Signal the worker to stop and join its thread. Idempotent.
    pub fn stop(&self, pool: &BufferPool) {
        self.running.store(false, Ordering::Release);
        pool.stop();
        if let Some(handle) = self.handle.lock().take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::block::Payload;
    use crate::ports::InMemoryStorageBackend;
    use crate::types::DataBlock;
    use std::time::Duration;

    fn block(table_id: i32, use_count: u32, dirty: bool) -> BlockBuffer {
        BlockBuffer::new(table_id, 0, use_count, dirty, Payload::Data(DataBlock::zeroed()))
    }

    #[test]
    fn lowest_use_count_wins() {
        let slots = vec![Some(block(1, 5, false)), Some(block(2, 1, false)), Some(block(3, 9, false))];
        assert_eq!(select_victim(&slots), Some(1));
    }

    #[test]
    fn tie_prefers_clean_over_dirty() {
        let slots = vec![Some(block(1, 2, true)), Some(block(2, 2, false))];
        assert_eq!(select_victim(&slots), Some(1));
    }

    #[test]
    fn full_tie_prefers_leftmost() {
        let slots = vec![Some(block(1, 2, false)), Some(block(2, 2, false))];
        assert_eq!(select_victim(&slots), Some(0));
    }

    #[test]
    fn empty_pool_has_no_victim() {
        let slots: Vec<Option<BlockBuffer>> = vec![None, None];
        assert_eq!(select_victim(&slots), None);
    }

    #[test]
    fn worker_evicts_and_writes_back_on_hint() {
        let pool = Arc::new(BufferPool::new(1));
        pool.try_admit(block(42, 0, true)).unwrap();

        let backend: Arc<dyn StorageBackend> = Arc::new(InMemoryStorageBackend::new());
        let worker = EvictionWorker::spawn(Arc::clone(&pool), Arc::clone(&backend));

        pool.cache_hint(block(99, 0, false)).unwrap();

        // Give the worker thread a moment to process the hint.
        std::thread::sleep(Duration::from_millis(200));

        worker.stop(&pool);

        assert_eq!(pool.len(), 1);
    }
}
