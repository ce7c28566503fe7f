use crate::connection::auth::AccessDecision;
use crate::connection::config::GridConfig;
use crate::core::{GridError, Result, Row, RowIdType, RowRef, TableSettings};
use crate::persist::audit::{AUDIT_CHANGE, AuditChangeType, AuditData};
use crate::storage::TableScope;
use crate::storage::cells::{TABLE_ROWS, TABLE_SETTINGS, USER_ROLES};
use crate::transaction::RowDelta;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Picks the id strategy for a new row.
///
/// Custom ids cannot be copied verbatim without colliding, so a table
/// configured for custom ids falls back to decrementing numeric ids. Any other
/// table uses its configured strategy, whatever the caller asked for.
pub fn resolve_id_strategy(configured: RowIdType, requested: RowIdType) -> RowIdType {
    let resolved = match configured {
        RowIdType::Custom => RowIdType::Decrement,
        other => other,
    };
    if resolved != requested {
        debug!(%configured, %requested, %resolved, "row id strategy overridden");
    }
    resolved
}

/// Next id of the decrement strategy: one below the smallest numeric row id.
pub fn next_decrement_id(rows: &im::Vector<Row>, seed: i64) -> Result<String> {
    let smallest = rows
        .iter()
        .filter_map(|row| row.id()?.parse::<i64>().ok())
        .min();
    let next = match smallest {
        Some(id) => id
            .checked_sub(1)
            .ok_or_else(|| GridError::Unsupported("decrement id space exhausted".into()))?,
        None => seed,
    };
    Ok(next.to_string())
}

/// Applies row-level edits to the table-scope row collection.
///
/// Every operation is synchronous and optimistic: local rows change first,
/// the returned [`RowDelta`] is what the persisting layer must write, and the
/// audit reporter (if one is installed) is notified last. The engine is bound
/// to the table epoch it was created in and refuses to act after a switch.
#[derive(Clone)]
pub struct RowMutationEngine {
    table: TableScope,
    config: Arc<GridConfig>,
}

impl RowMutationEngine {
    pub fn new(table: TableScope, config: Arc<GridConfig>) -> Self {
        Self { table, config }
    }

    pub fn rows(&self) -> im::Vector<Row> {
        self.table.read(TABLE_ROWS).unwrap_or_default()
    }

    pub fn settings(&self) -> Result<TableSettings> {
        self.table.read(TABLE_SETTINGS).ok_or(GridError::NoActiveTable)
    }

    fn writable_settings(&self) -> Result<TableSettings> {
        let settings = self.settings()?;
        let roles = self.table.store().read(USER_ROLES).unwrap_or_default();
        if !AccessDecision::evaluate(&roles, &settings).can_mutate {
            return Err(GridError::ReadOnly(settings.id));
        }
        Ok(settings)
    }

    /// Inserts a row carrying `source`'s fields (never its reference).
    pub fn add_row(&self, source: &Row, requested: RowIdType) -> Result<RowDelta> {
        let settings = self.insertable_settings()?;
        let strategy = resolve_id_strategy(settings.add_row_id_type, requested);
        let seed = self.config.decrement_seed;

        self.insert(&settings, source, |rows| match strategy {
            RowIdType::Random => Ok(Uuid::new_v4().simple().to_string()),
            RowIdType::Decrement | RowIdType::Custom => next_decrement_id(rows, seed),
        })
    }

    /// Inserts a row under an id chosen by the user.
    pub fn add_row_with_id(&self, source: &Row, id: &str) -> Result<RowDelta> {
        if id.is_empty() || id.contains('/') {
            return Err(GridError::InvalidTarget(format!("'{}' is not a row id", id)));
        }
        let settings = self.insertable_settings()?;
        self.insert(&settings, source, |_| Ok(id.to_string()))
    }

    /// Copies `row` into a new row using the table's resolved id strategy.
    pub fn duplicate_row(&self, row: &Row) -> Result<RowDelta> {
        let settings = self.settings()?;
        self.add_row(row, settings.add_row_id_type)
    }

    /// Removes the row at `path`.
    ///
    /// An empty path is not a deletable target and leaves state untouched.
    pub fn delete_row(&self, path: &str) -> Result<Option<RowDelta>> {
        if path.is_empty() {
            return Ok(None);
        }
        let settings = self.writable_settings()?;

        let mut removed = None;
        let applied = self.table.try_update(TABLE_ROWS, |rows| {
            let mut rows = rows.unwrap_or_default();
            let index = rows.iter().position(|r| r.path() == Some(path))?;
            removed = Some(rows.remove(index));
            Some(rows)
        })?;
        if !applied {
            return Err(GridError::NoActiveTable);
        }
        let row = removed.ok_or_else(|| GridError::RowNotFound(path.to_string()))?;

        let delta = RowDelta::Delete {
            path: path.to_string(),
            row,
        };
        debug!(table_id = %settings.id, path, "row deleted");
        self.audit(AuditChangeType::DeleteRow, &delta, None);
        Ok(Some(delta))
    }

    /// Sets one field of the row at `path`. Last write wins.
    pub fn update_cell(&self, path: &str, field: &str, value: Value) -> Result<RowDelta> {
        if path.is_empty() {
            return Err(GridError::InvalidTarget("row has no reference path".into()));
        }
        let settings = self.writable_settings()?;

        let mut previous = None;
        let mut found = false;
        let applied = self.table.try_update(TABLE_ROWS, |rows| {
            let mut rows = rows.unwrap_or_default();
            let row = rows.iter_mut().find(|r| r.path() == Some(path))?;
            found = true;
            previous = row.fields.insert(field.to_string(), value.clone());
            Some(rows)
        })?;
        if !applied {
            return Err(GridError::NoActiveTable);
        }
        if !found {
            return Err(GridError::RowNotFound(path.to_string()));
        }

        let delta = RowDelta::UpdateCell {
            path: path.to_string(),
            field: field.to_string(),
            old_value: previous,
            new_value: value,
        };
        debug!(table_id = %settings.id, path, field, "cell updated");
        self.audit(
            AuditChangeType::UpdateCell,
            &delta,
            Some(AuditData::updated_field(field)),
        );
        Ok(delta)
    }

    fn insertable_settings(&self) -> Result<TableSettings> {
        let settings = self.writable_settings()?;
        if settings.is_collection_group() {
            return Err(GridError::Unsupported(format!(
                "cannot add rows to collection group table '{}'",
                settings.id
            )));
        }
        if settings.collection.is_empty() {
            return Err(GridError::InvalidTarget(format!(
                "table '{}' has no collection path",
                settings.id
            )));
        }
        Ok(settings)
    }

    fn insert<F>(&self, settings: &TableSettings, source: &Row, assign_id: F) -> Result<RowDelta>
    where
        F: FnOnce(&im::Vector<Row>) -> Result<String>,
    {
        let mut outcome: Result<RowDelta> = Err(GridError::NoActiveTable);
        let applied = self.table.try_update(TABLE_ROWS, |rows| {
            let mut rows = rows.unwrap_or_default();
            outcome = assign_id(&rows).and_then(|id| {
                let path = format!("{}/{}", settings.collection, id);
                if rows.iter().any(|r| r.path() == Some(path.as_str())) {
                    return Err(GridError::DuplicateRowId(id));
                }
                let row = Row {
                    reference: Some(RowRef::new(path.clone())),
                    fields: source.fields.clone(),
                };
                // New rows go on top.
                rows.push_front(row.clone());
                Ok(RowDelta::Insert { path, row })
            });
            outcome.is_ok().then_some(rows)
        })?;
        if !applied {
            return Err(GridError::NoActiveTable);
        }
        let delta = outcome?;

        debug!(table_id = %settings.id, path = delta.path(), "row added");
        self.audit(AuditChangeType::AddRow, &delta, None);
        Ok(delta)
    }

    fn audit(&self, change_type: AuditChangeType, delta: &RowDelta, data: Option<AuditData>) {
        if let Some(reporter) = self.table.read(AUDIT_CHANGE) {
            // Detached; the outcome never reaches the caller.
            let _ = reporter.report(change_type, delta.row_id(), data);
        }
    }
}
