//! `User` (C1) and the process-wide user-id allocator (§4.1).

use parking_lot::Mutex;

/// A registered user. Immutable after construction — updates happen by
/// replacing the `Arc<User>` held in [`crate::users::cache::UserCache`],
/// not by mutating fields in place.
///
/// Grounded on `original_source/src/buser.h`'s `buser` class. The original
/// stores a `useHashing` flag alongside the password and calls a hashing
/// routine only when it's set; that routine is never implemented in the
/// prototype, so `hash_on_set` is carried here as an inert flag rather than
/// invented hashing logic — see SPEC_FULL.md §3.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    /// Id allocated by [`UserIdAllocator::next_user_id`].
    pub id: i64,
    /// Login name, unique within the cache.
    pub username: String,
    /// Credential compared against on session start. Stored as supplied;
    /// no hashing is performed (see `hash_on_set`).
    pub credential: String,
    /// Contact email, carried through unchanged from the original.
    pub email: String,
    /// Whether the credential should be hashed before storage. The
    /// original prototype accepts this flag but never implements the
    /// hashing step it gates, so this crate honors the same contract:
    /// the flag is recorded, not acted on.
    pub hash_on_set: bool,
}

impl User {
    /// Construct a new user record with an allocated id.
    pub fn new(id: i64, username: impl Into<String>, credential: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id,
            username: username.into(),
            credential: credential.into(),
            email: email.into(),
            hash_on_set: true,
        }
    }
}

/// Monotonic, mutex-guarded allocator for user ids.
///
/// Replaces the original's free-standing `int64_t id` / `pthread_mutex_t
/// idMutex` globals (`original_source/src/buser.h`) with one owned value,
/// per Design Notes §9's "fold ad hoc globals into a single runtime value."
#[derive(Debug)]
pub struct UserIdAllocator {
    next: Mutex<i64>,
}

impl UserIdAllocator {
    /// Build an allocator whose first id will be `1`.
    pub fn new() -> Self {
        Self { next: Mutex::new(1) }
    }

    /// Allocate the next user id. Matches the original's `getNextUserId`:
    /// lock, read, increment, unlock, return the pre-increment value.
    pub fn next_user_id(&self) -> i64 {
        let mut guard = self.next.lock();
        let id = *guard;
        *guard += 1;
        id
    }
}

impl Default for UserIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}
