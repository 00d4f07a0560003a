//! Shared value types that flow between tasks, buffers, and the storage
//! backend — table ids, column values, and the table-header descriptor.
//!
//! Grounded on `original_source/src/sessionManager.h`'s `allVars`/`allTable`
//! usage (`data`/`bitmap` parameters of `INSERT`) and
//! `original_source/test/UnitTestRoleThreadManager.cpp`'s `addTable` call
//! shape (`types`, `typesWithNull`, `columnNames`).

use serde::{Deserialize, Serialize};

/// Size in bytes of one fixed-size data block (C3's "fixed-size data
/// block" payload variant). 4096 matches the page size used throughout
/// the buffer-pool reference material in `other_examples/`.
pub const DATA_BLOCK_SIZE: usize = 4096;

/// One column value as carried by an add-tuple task.
///
/// The original C++ prototype's `allVars` held either an integer or a
/// string (see `sessionManager.h`'s `executeCommandInProcess`, which tries
/// `std::stoi` before falling back to the raw string). This is a closed,
/// exhaustively-matched equivalent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ColumnValue {
    /// A signed 32-bit integer column value.
    Int(i32),
    /// A UTF-8 text column value.
    Text(String),
    /// An explicit SQL-style null (distinct from an empty string).
    Null,
}

/// Descriptor for one table's header, as constructed by `addTable` (§4.6)
/// before being submitted as an add-table-header task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableHeaderDescriptor {
    /// Table this header belongs to.
    pub table_id: i32,
    /// Transaction id allocated for the table-creation task.
    pub transaction_id: i64,
    /// Id of the user who created the table.
    pub user_id: i64,
    /// Per-column type tags (opaque to the core; interpreted by the
    /// storage backend).
    pub column_types: Vec<i8>,
    /// Per-column nullability flags, parallel to `column_types`.
    pub column_nullable: Vec<i8>,
    /// Per-column names, parallel to `column_types`.
    pub column_names: Vec<String>,
}

/// A fixed-size, opaque data block — the other of C3's two mutually
/// exclusive payload variants.
#[derive(Clone, Serialize, Deserialize)]
pub struct DataBlock(pub Vec<u8>);

impl DataBlock {
    /// Build a zero-filled block of the standard size.
    pub fn zeroed() -> Self {
        Self(vec![0u8; DATA_BLOCK_SIZE])
    }
}

impl std::fmt::Debug for DataBlock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataBlock")
            .field("len", &self.0.len())
            .finish()
    }
}
