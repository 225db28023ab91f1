//! Wire types returned by sessions

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One result row: column name to raw column bytes
pub type Row = HashMap<String, Vec<u8>>;

/// Outcome of a statement that returns no rows
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecResult {
    /// Rows inserted, updated or deleted
    pub rows_affected: u64,
    /// Last generated key, when the driver reports one
    pub last_insert_id: i64,
}

impl ExecResult {
    /// Result affecting `rows_affected` rows with no generated key
    pub fn affected(rows_affected: u64) -> Self {
        Self {
            rows_affected,
            last_insert_id: 0,
        }
    }
}
