//! Named cells shared across the crate.

use super::catalog::TableCatalog;
use super::scope::{CellKey, Scope};
use crate::connection::BackendHandle;
use crate::core::{AuditUser, Row, TableSettings, UserRoles};

// Global scope
pub const TABLES: CellKey<TableCatalog> = CellKey::new("tables", Scope::Global);
pub const USER_ROLES: CellKey<UserRoles> = CellKey::new("userRoles", Scope::Global);
pub const CURRENT_USER: CellKey<AuditUser> = CellKey::new("currentUser", Scope::Global);
pub const TABLE_DESCRIPTION_DISMISSED: CellKey<Vec<String>> =
    CellKey::new("tableDescriptionDismissed", Scope::Global);
pub const BACKEND: CellKey<BackendHandle> = CellKey::new("backend", Scope::Global);
/// Version reported by the connected backend build
pub const BACKEND_VERSION: CellKey<String> = CellKey::new("backendVersion", Scope::Global);

// Project scope
/// True while the fast-bypass modifier key is held
pub const ALT_PRESS: CellKey<bool> = CellKey::new("altPress", Scope::Project);

// Table scope
pub const TABLE_SETTINGS: CellKey<TableSettings> = CellKey::new("tableSettings", Scope::Table);
pub const TABLE_ROWS: CellKey<im::Vector<Row>> = CellKey::new("tableRows", Scope::Table);
