// ============================================================================
// Row Deltas
// ============================================================================
//
// A delta describes one change that has already been applied to local table
// state. Persisting it remotely is the caller's job.
//
// ============================================================================

use crate::core::Row;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum RowDelta {
    /// A row was inserted at `path`
    Insert { path: String, row: Row },

    /// The row at `path` was removed
    Delete { path: String, row: Row },

    /// One field of the row at `path` changed
    UpdateCell {
        path: String,
        field: String,
        old_value: Option<Value>,
        new_value: Value,
    },
}

impl RowDelta {
    /// Backend path of the affected row
    pub fn path(&self) -> &str {
        match self {
            RowDelta::Insert { path, .. } => path,
            RowDelta::Delete { path, .. } => path,
            RowDelta::UpdateCell { path, .. } => path,
        }
    }

    /// Id of the affected row (last path segment)
    pub fn row_id(&self) -> &str {
        self.path().rsplit('/').next().unwrap_or_default()
    }
}
