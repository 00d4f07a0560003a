//! Crate-level error aggregation.
//!
//! Each subsystem defines its own error enum (see `users::cache`,
//! `session`, `registry`); this module collects them behind one type so
//! callers that don't care which subsystem failed can use `?` freely.

use thiserror::Error;

use crate::registry::RegistryError;
use crate::session::SessionError;

/// Errors that can cross the top-level `Runtime` API surface.
#[derive(Error, Debug)]
pub enum QuakeError {
    /// A session-level failure (authentication, not-running, ...).
    #[error("session error: {0}")]
    Session(#[from] SessionError),

    /// A registry-level failure (no matching session for credentials).
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),
}

/// Convenience result alias for crate-level operations.
pub type Result<T> = std::result::Result<T, QuakeError>;
