//! The block buffer pool and its eviction worker (C3-C5, `spec.md` §4.3-4.4).

pub mod block;
pub mod eviction;
pub mod pool;

pub use block::{BlockBuffer, Payload};
pub use eviction::EvictionWorker;
pub use pool::{BufferPool, PoolError};
