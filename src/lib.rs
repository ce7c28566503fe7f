// ============================================================================
// gridscope Library
// ============================================================================

pub mod core;
pub mod storage;
pub mod connection;
pub mod transaction;
pub mod executor;
pub mod persist;
pub mod facade;
pub mod logging;

// Re-export main types for convenience
pub use crate::core::{
    ADMIN_ROLE, AuditUser, GridError, Result, Row, RowIdType, RowRef, TableSettings, TableType,
    UserRoles,
};
pub use crate::facade::{Affordance, Breadcrumbs, DescriptionTooltip, RowActions, TableSession};
pub use crate::storage::{CellKey, CellSubscription, Scope, ScopeStore, TableCatalog, TableScope};
pub use crate::transaction::RowDelta;

pub use crate::connection::{
    AUDIT_CHANGE_ROUTE, Backend, BackendHandle,
    auth::{AccessDecision, READ_ONLY_ADMIN_TOOLTIP, READ_ONLY_TOOLTIP},
    config::{AUDIT_MIN_VERSION, GridConfig},
    version::{BackendVersion, is_compatible},
};
pub use crate::executor::{
    ActionOutcome, ConfirmColor, ConfirmDialog, ConfirmationPolicy, ConfirmationRequest,
    RowAction, RowMutationEngine,
};
pub use crate::logging::{LogFormat, init_logging};
pub use crate::persist::{
    AuditChangeType, AuditChangeWatcher, AuditData, AuditEvent, AuditReporter, AuditTarget,
};

/// Opens a session configured from `GRIDSCOPE_*` variables and installs logging.
///
/// # Examples
///
/// ```
/// use gridscope::{ConfirmDialog, ConfirmationRequest, TableSettings};
/// use std::sync::Arc;
///
/// struct AlwaysConfirm;
///
/// impl ConfirmDialog for AlwaysConfirm {
///     fn request_confirmation(&self, request: ConfirmationRequest) {
///         request.confirm();
///     }
/// }
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let mut session = gridscope::open_session(Arc::new(AlwaysConfirm))?;
/// session.set_tables(vec![TableSettings::new("tasks", "Tasks", "tasks")])?;
/// session.select_table("tasks")?;
///
/// let delta = session.add_row()?;
/// assert_eq!(session.rows().len(), 1);
/// assert!(delta.path().starts_with("tasks/"));
/// # Ok(())
/// # }
/// ```
pub fn open_session(dialog: std::sync::Arc<dyn ConfirmDialog>) -> Result<TableSession> {
    let config = GridConfig::from_env()?;
    init_logging(&config.log_level, config.log_format)?;
    Ok(TableSession::new(config, dialog))
}
