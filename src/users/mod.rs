//! User identity and the process-wide user cache (C1/C2, `spec.md` §4.1-4.2).

pub mod cache;
pub mod user;

pub use cache::{UserCache, UserCacheError};
pub use user::{User, UserIdAllocator};
