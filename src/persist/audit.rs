// ============================================================================
// Audit Change Reporter
// ============================================================================
//
// The reporter is derived from (table settings, backend, backend version) and
// lives in the table scope. It is cleared before every re-derivation and on
// teardown, so a reporter never outlives the table it was built for.
// Dispatch runs on a detached task; failures are logged and dropped.
//
// ============================================================================

use crate::connection::BackendHandle;
use crate::connection::config::GridConfig;
use crate::connection::version::is_compatible;
use crate::core::types::StampedAuditUser;
use crate::core::{Result, TableSettings};
use crate::storage::cells::{BACKEND, BACKEND_VERSION, CURRENT_USER, TABLE_SETTINGS};
use crate::storage::{CellKey, CellSubscription, Scope, ScopeStore, TableScope};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Active reporter of the current table. Absent means reporting is off.
pub const AUDIT_CHANGE: CellKey<AuditReporter> = CellKey::new("auditChange", Scope::Table);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditChangeType {
    AddRow,
    UpdateCell,
    DeleteRow,
}

impl fmt::Display for AuditChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::AddRow => "ADD_ROW",
            Self::UpdateCell => "UPDATE_CELL",
            Self::DeleteRow => "DELETE_ROW",
        };
        write!(f, "{label}")
    }
}

/// Where the audited change happened
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditTarget {
    pub row_path: String,
    pub row_id: String,
    pub table_id: String,
    pub collection_path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_field: Option<String>,
}

impl AuditData {
    pub fn updated_field(field: impl Into<String>) -> Self {
        Self {
            updated_field: Some(field.into()),
        }
    }
}

/// Body posted to the audit route
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEvent {
    #[serde(rename = "type")]
    pub change_type: AuditChangeType,
    pub rowy_user: StampedAuditUser,
    #[serde(rename = "ref")]
    pub target: AuditTarget,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<AuditData>,
}

/// Reports row changes of one table to the backend audit route.
#[derive(Clone)]
pub struct AuditReporter {
    backend: BackendHandle,
    route: String,
    table_id: String,
    collection: String,
    table: TableScope,
}

impl fmt::Debug for AuditReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuditReporter")
            .field("route", &self.route)
            .field("table_id", &self.table_id)
            .field("collection", &self.collection)
            .field("epoch", &self.table.epoch())
            .finish()
    }
}

impl AuditReporter {
    pub fn table_id(&self) -> &str {
        &self.table_id
    }

    /// False once the table this reporter was built for has been torn down
    pub fn is_current(&self) -> bool {
        self.table.is_current()
    }

    /// Builds the event for a change, stamped with the current user and time.
    pub fn event(
        &self,
        change_type: AuditChangeType,
        row_id: &str,
        data: Option<AuditData>,
    ) -> AuditEvent {
        let user = self.table.store().read(CURRENT_USER).unwrap_or_default();
        AuditEvent {
            change_type,
            rowy_user: user.stamped(Utc::now()),
            target: AuditTarget {
                // The backend resolves the document from the collection path plus row id.
                row_path: self.collection.clone(),
                row_id: row_id.to_string(),
                table_id: self.table_id.clone(),
                collection_path: self.collection.clone(),
            },
            data,
        }
    }

    /// Fire-and-forget dispatch of one audit event.
    ///
    /// Returns the handle of the detached task, or `None` when nothing was sent
    /// (stale reporter, no runtime, unserializable event). Dropping the handle
    /// does not cancel the request.
    pub fn report(
        &self,
        change_type: AuditChangeType,
        row_id: &str,
        data: Option<AuditData>,
    ) -> Option<JoinHandle<()>> {
        if !self.is_current() {
            debug!(table_id = %self.table_id, %change_type, "stale audit reporter ignored");
            return None;
        }

        let event = self.event(change_type, row_id, data);
        let body = match serde_json::to_value(&event) {
            Ok(body) => body,
            Err(err) => {
                warn!(table_id = %self.table_id, error = %err, "audit event not serializable");
                return None;
            }
        };

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(_) => {
                warn!(table_id = %self.table_id, %change_type, "no async runtime, audit event dropped");
                return None;
            }
        };

        let backend = Arc::clone(&self.backend);
        let route = self.route.clone();
        let table_id = self.table_id.clone();
        let row_id = row_id.to_string();
        Some(runtime.spawn(async move {
            if let Err(err) = backend.run(&route, body).await {
                warn!(%table_id, %row_id, %change_type, error = %err, "audit change dispatch failed");
            }
        }))
    }
}

/// Derives the reporter for the table scope, `None` when reporting must be off.
///
/// Active only when the settings are resolved, name a collection, enable
/// auditing, and the backend is connected at a compatible version.
pub fn derive_audit_reporter(table: &TableScope, config: &GridConfig) -> Option<AuditReporter> {
    let settings: TableSettings = table.read(TABLE_SETTINGS)?;
    if settings.id.is_empty() || settings.collection.is_empty() || !settings.audit {
        return None;
    }

    let store = table.store();
    let version = store.read(BACKEND_VERSION);
    if !is_compatible(version.as_deref(), &config.audit_min_version) {
        return None;
    }
    let backend = store.read(BACKEND)?;

    Some(AuditReporter {
        backend,
        route: config.audit_route.clone(),
        table_id: settings.id,
        collection: settings.collection,
        table: table.clone(),
    })
}

/// Keeps [`AUDIT_CHANGE`] in step with its inputs for one table lifecycle.
pub struct AuditChangeWatcher {
    table: TableScope,
    config: Arc<GridConfig>,
    settings: CellSubscription,
    backend: CellSubscription,
    version: CellSubscription,
}

impl AuditChangeWatcher {
    /// Subscribes to the inputs and installs the initial reporter.
    pub fn install(store: &ScopeStore, config: Arc<GridConfig>) -> Result<Self> {
        let mut watcher = Self {
            table: store.table_scope(),
            config,
            settings: store.subscribe(TABLE_SETTINGS)?,
            backend: store.subscribe(BACKEND)?,
            version: store.subscribe(BACKEND_VERSION)?,
        };
        watcher.rederive()?;
        Ok(watcher)
    }

    pub fn is_active(&self) -> bool {
        self.table.read(AUDIT_CHANGE).is_some()
    }

    /// Re-derives the reporter if any input changed since the last call.
    ///
    /// Returns whether reporting is active afterwards.
    pub fn sync(&mut self) -> Result<bool> {
        let dirty =
            self.settings.has_changed() || self.backend.has_changed() || self.version.has_changed();
        if dirty {
            self.rederive()?;
        }
        Ok(self.is_active())
    }

    /// Follows input changes until the table scope is torn down.
    pub async fn follow(mut self) -> Result<()> {
        loop {
            let changed = tokio::select! {
                r = self.settings.changed() => r,
                r = self.backend.changed() => r,
                r = self.version.changed() => r,
            };
            if !self.table.is_current() {
                return Ok(());
            }
            changed?;
            self.rederive()?;
        }
    }

    fn rederive(&mut self) -> Result<()> {
        self.settings.mark_seen();
        self.backend.mark_seen();
        self.version.mark_seen();

        // The previous reporter must be gone before its replacement exists.
        self.table.clear(AUDIT_CHANGE)?;
        match derive_audit_reporter(&self.table, &self.config) {
            Some(reporter) => {
                debug!(table_id = %reporter.table_id, "audit reporting active");
                self.table.write(AUDIT_CHANGE, reporter)?;
            }
            None => debug!(epoch = self.table.epoch(), "audit reporting inactive"),
        }
        Ok(())
    }
}

impl Drop for AuditChangeWatcher {
    fn drop(&mut self) {
        let _ = self.table.clear(AUDIT_CHANGE);
    }
}
