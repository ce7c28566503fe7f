use super::cells::TABLES;
use super::scope::ScopeStore;
use crate::core::TableSettings;
use std::sync::Arc;

/// Global table registry.
///
/// Immutable once built, so cloning is cheap. A registry update replaces the
/// whole catalog; readers holding the old one keep a consistent snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableCatalog {
    tables: Arc<Vec<TableSettings>>,
}

impl TableCatalog {
    /// Builds a catalog from a registry snapshot as delivered by the backend.
    pub fn from_tables(tables: Vec<TableSettings>) -> Self {
        Self {
            tables: Arc::new(tables),
        }
    }

    /// Linear lookup by identifier
    pub fn get_table(&self, id: &str) -> Option<&TableSettings> {
        self.tables.iter().find(|t| t.id == id)
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

/// Resolves the settings of `id` from the registry held in the global scope.
///
/// `None` covers both an unpopulated registry and an unknown id; callers render
/// nothing in either case.
pub fn resolve_table_settings(store: &ScopeStore, id: &str) -> Option<TableSettings> {
    store
        .read(TABLES)
        .and_then(|catalog| catalog.get_table(id).cloned())
}
