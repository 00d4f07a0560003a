//! `UserCache` (C2, `spec.md` §4.2).

use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;

use super::user::User;

/// Errors raised by [`UserCache`] operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UserCacheError {
    /// No cached user matched the supplied username/credential pair.
    #[error("authentication failed for user {username:?}")]
    AuthenticationFailed {
        /// The username that failed to authenticate.
        username: String,
    },

    /// `add_user` was called with a username already present in the cache.
    #[error("user {username:?} is already registered")]
    DuplicateUsername {
        /// The username that already existed.
        username: String,
    },
}

/// Process-wide cache of registered users (C2).
///
/// Generalizes the original's free-standing `registeredUsers` vector and
/// `usersMutex` global (`original_source/src/sessionManager.h`) into one
/// owning type, per Design Notes §9.
#[derive(Debug)]
pub struct UserCache {
    users: Mutex<Vec<Arc<User>>>,
}

impl UserCache {
    /// Construct an empty cache.
    pub fn new() -> Self {
        Self { users: Mutex::new(Vec::new()) }
    }

    /// Register a new user (`addUserToCache`, `spec.md` §6). Rejects a
    /// duplicate username rather than silently shadowing it — the original
    /// prototype never guards against this, but an unguarded duplicate
    /// would make `get_user_id_from_cache` ambiguous.
    pub fn add_user(&self, user: User) -> Result<Arc<User>, UserCacheError> {
        let mut users = self.users.lock();
        if users.iter().any(|u| u.username == user.username) {
            return Err(UserCacheError::DuplicateUsername { username: user.username });
        }
        let user = Arc::new(user);
        users.push(Arc::clone(&user));
        Ok(user)
    }

    /// Look up a user id by username and credential (`getUserIdFromCache`,
    /// `spec.md` §6), mirroring the linear scan performed under lock in
    /// `original_source/src/threadPoolRole.cpp`'s `Session::checkUser`.
    pub fn get_user_id_from_cache(&self, username: &str, credential: &str) -> Result<i64, UserCacheError> {
        let users = self.users.lock();
        users
            .iter()
            .find(|u| u.username == username && u.credential == credential)
            .map(|u| u.id)
            .ok_or_else(|| {
                log::debug!("authentication failed for user '{username}'");
                UserCacheError::AuthenticationFailed { username: username.to_string() }
            })
    }

    /// Fetch a user record by id, if cached.
    pub fn find_by_id(&self, user_id: i64) -> Option<Arc<User>> {
        self.users.lock().iter().find(|u| u.id == user_id).cloned()
    }

    /// Number of cached users.
    pub fn len(&self) -> usize {
        self.users.lock().len()
    }

    /// Whether the cache currently holds no users.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of all usernames, for diagnostics (`showUserCache` in the
    /// original's `main.cpp`, supplemented per SPEC_FULL.md §4.10).
    pub fn debug_dump(&self) -> Vec<String> {
        self.users.lock().iter().map(|u| format!("{}#{}", u.username, u.id)).collect()
    }
}

impl Default for UserCache {
    fn default() -> Self {
        Self::new()
    }
}
