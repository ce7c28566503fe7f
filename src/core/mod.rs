pub mod error;
pub mod types;

pub use error::{GridError, Result};
pub use types::{AuditUser, Row, RowIdType, RowRef, TableSettings, TableType, UserRoles, ADMIN_ROLE};
