//! `Task` (C6, `spec.md` §3) — the unit of work a session's worker thread
//! pulls off its queue and dispatches.

use serde::{Deserialize, Serialize};

use crate::types::{ColumnValue, TableHeaderDescriptor};

/// One unit of work submitted to a [`crate::session::Session`].
///
/// `original_source/src/threadPoolRole.h` represents this as `struct Task
/// { int type; int payload; ... }` with a type tag and several fields that
/// are only meaningful for some tags. Design Notes §9 calls for a tagged,
/// closed variant instead — the all-fields-absent and
/// more-than-one-payload-populated states this invites are unrepresentable
/// here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Task {
    /// Register a new user (`addBuser` dispatched through a session).
    AddUser {
        /// Id pre-allocated by the registry before the task was built —
        /// the worker thread binds it as-is rather than allocating its own.
        user_id: i64,
        /// The new user's chosen login name.
        username: String,
        /// The new user's credential.
        credential: String,
        /// The new user's contact email.
        email: String,
        /// Whether the credential should be hashed before storage
        /// (`useHash` in `addBuser`'s original signature).
        use_hash: bool,
    },
    /// Append a tuple to a table (`INSERT`-equivalent).
    AddTuple {
        /// Table being inserted into.
        table_id: i32,
        /// Column values, positional.
        values: Vec<ColumnValue>,
        /// Per-column null markers, parallel to `values`.
        null_bitmap: Vec<bool>,
    },
    /// Create a table (`addTable`'s submitted task).
    AddTableHeader {
        /// The constructed header descriptor.
        header: TableHeaderDescriptor,
    },
}

impl Task {
    /// Short machine-stable name of this task's variant, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Task::AddUser { .. } => "add_user",
            Task::AddTuple { .. } => "add_tuple",
            Task::AddTableHeader { .. } => "add_table_header",
        }
    }
}

/// An envelope pairing a [`Task`] with diagnostic context about its
/// caller, matching `roleThreadManager.cpp`'s `t.userIp` field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuedTask {
    /// The work to perform.
    pub task: Task,
    /// Caller address recorded for diagnostics, if supplied. `spec.md` §3
    /// treats this as optional.
    pub caller_address: Option<String>,
}

impl QueuedTask {
    /// Wrap a task with no caller-address context.
    pub fn new(task: Task) -> Self {
        Self { task, caller_address: None }
    }

    /// Wrap a task with caller-address context attached.
    pub fn with_caller_address(task: Task, caller_address: impl Into<String>) -> Self {
        Self { task, caller_address: Some(caller_address.into()) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_names_match_variant() {
        let t = Task::AddUser {
            user_id: 1,
            username: "a".into(),
            credential: "b".into(),
            email: "c".into(),
            use_hash: false,
        };
        assert_eq!(t.kind(), "add_user");
    }

    #[test]
    fn queued_task_without_caller_has_no_address() {
        let q = QueuedTask::new(Task::AddTuple { table_id: 1, values: vec![], null_bitmap: vec![] });
        assert!(q.caller_address.is_none());
    }
}
