pub mod catalog;
pub mod cells;
pub mod scope;

pub use catalog::{TableCatalog, resolve_table_settings};
pub use scope::{CellKey, CellSubscription, Scope, ScopeStore, TableScope};
