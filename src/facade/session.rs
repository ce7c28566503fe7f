use crate::connection::BackendHandle;
use crate::connection::auth::AccessDecision;
use crate::connection::config::GridConfig;
use crate::core::{AuditUser, GridError, Result, Row, TableSettings, UserRoles};
use crate::executor::{
    ActionOutcome, ConfirmDialog, ConfirmationPolicy, RowAction, RowMutationEngine,
};
use crate::persist::AuditChangeWatcher;
use crate::storage::cells::{
    ALT_PRESS, BACKEND, BACKEND_VERSION, CURRENT_USER, TABLE_DESCRIPTION_DISMISSED, TABLE_ROWS,
    TABLE_SETTINGS, TABLES, USER_ROLES,
};
use crate::storage::{ScopeStore, TableCatalog, resolve_table_settings};
use crate::transaction::RowDelta;
use regex::Regex;
use serde_json::Value;
use std::sync::{Arc, OnceLock};
use tracing::{debug, info_span};

/// One control in the row action column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Affordance {
    pub tooltip: &'static str,
    pub enabled: bool,
}

/// Controls shown in a row's final column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowActions {
    pub menu: Affordance,
    pub duplicate: Affordance,
    pub delete: Affordance,
}

/// Info tooltip carrying the table description
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescriptionTooltip {
    pub markdown: String,
    pub button_label: &'static str,
    /// Open until the user dismisses it once for this table
    pub default_open: bool,
}

/// Breadcrumb header of the active table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Breadcrumbs {
    pub section: String,
    /// Link target of the section crumb on the home page
    pub section_href: String,
    pub name: String,
    pub read_only_tooltip: Option<&'static str>,
    pub description: Option<DescriptionTooltip>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CharClass {
    Upper,
    Lower,
    Digit,
}

impl CharClass {
    fn of(c: char) -> Self {
        if c.is_numeric() {
            CharClass::Digit
        } else if c.is_uppercase() {
            CharClass::Upper
        } else {
            CharClass::Lower
        }
    }
}

/// Splits `input` into words: runs of letters and digits, further split at
/// case changes, letter/digit boundaries and before the last capital of an
/// acronym that is followed by a word (`XMLHttp` is `XML`, `Http`).
fn words(input: &str) -> Vec<&str> {
    static RUNS: OnceLock<Regex> = OnceLock::new();
    let runs = RUNS.get_or_init(|| Regex::new(r"[\p{L}\p{N}]+").expect("static regex is valid"));

    let mut out = Vec::new();
    for run in runs.find_iter(input) {
        let run = run.as_str();
        let chars: Vec<(usize, CharClass)> = run
            .char_indices()
            .map(|(at, c)| (at, CharClass::of(c)))
            .collect();

        let mut start = 0;
        for i in 1..chars.len() {
            let (at, cur) = chars[i];
            let prev = chars[i - 1].1;
            let next = chars.get(i + 1).map(|&(_, class)| class);
            let split = match (prev, cur) {
                (CharClass::Digit, CharClass::Digit) => false,
                (CharClass::Digit, _) | (_, CharClass::Digit) => true,
                (CharClass::Lower, CharClass::Upper) => true,
                (CharClass::Upper, CharClass::Upper) => next == Some(CharClass::Lower),
                _ => false,
            };
            if split {
                out.push(&run[start..at]);
                start = at;
            }
        }
        out.push(&run[start..]);
    }
    out
}

/// `lodash`-style camelCase, used for section anchors on the home page.
pub fn camel_case(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for (i, word) in words(input).into_iter().enumerate() {
        let lower = word.to_lowercase();
        if i == 0 {
            out.push_str(&lower);
            continue;
        }
        let mut chars = lower.chars();
        if let Some(first) = chars.next() {
            out.extend(first.to_uppercase());
            out.push_str(chars.as_str());
        }
    }
    out
}

/// Table view session.
///
/// Owns the scope store handle, tracks the active table and keeps the audit
/// reporter in step with its inputs. Every setter that feeds the reporter
/// re-derives it before returning.
pub struct TableSession {
    store: ScopeStore,
    config: Arc<GridConfig>,
    confirm: ConfirmationPolicy,
    active_table: Option<String>,
    audit: Option<AuditChangeWatcher>,
}

impl TableSession {
    pub fn new(config: GridConfig, dialog: Arc<dyn ConfirmDialog>) -> Self {
        Self::with_store(ScopeStore::new(), config, dialog)
    }

    /// Session over an existing store, sharing its global and project cells.
    pub fn with_store(store: ScopeStore, config: GridConfig, dialog: Arc<dyn ConfirmDialog>) -> Self {
        Self {
            confirm: ConfirmationPolicy::new(store.clone(), dialog),
            store,
            config: Arc::new(config),
            active_table: None,
            audit: None,
        }
    }

    pub fn store(&self) -> &ScopeStore {
        &self.store
    }

    pub fn config(&self) -> &GridConfig {
        &self.config
    }

    pub fn active_table(&self) -> Option<&str> {
        self.active_table.as_deref()
    }

    // ------------------------------------------------------------------
    // Global and project inputs
    // ------------------------------------------------------------------

    /// Replaces the table registry and re-resolves the active table.
    pub fn set_tables(&mut self, tables: Vec<TableSettings>) -> Result<()> {
        self.store.write(TABLES, TableCatalog::from_tables(tables))?;
        self.refresh_settings()
    }

    pub fn set_user_roles(&mut self, roles: UserRoles) -> Result<()> {
        self.store.write(USER_ROLES, roles)
    }

    pub fn set_current_user(&mut self, user: AuditUser) -> Result<()> {
        self.store.write(CURRENT_USER, user)
    }

    pub fn set_backend(&mut self, backend: BackendHandle) -> Result<()> {
        self.store.write(BACKEND, backend)?;
        self.sync_audit()
    }

    pub fn disconnect_backend(&mut self) -> Result<()> {
        self.store.clear(BACKEND)?;
        self.store.clear(BACKEND_VERSION)?;
        self.sync_audit()
    }

    pub fn set_backend_version(&mut self, version: &str) -> Result<()> {
        self.store.write(BACKEND_VERSION, version.to_string())?;
        self.sync_audit()
    }

    /// Tracks the bypass modifier key
    pub fn set_fast_bypass(&mut self, held: bool) -> Result<()> {
        self.store.write(ALT_PRESS, held)
    }

    // ------------------------------------------------------------------
    // Table lifecycle
    // ------------------------------------------------------------------

    /// Switches to table `id`.
    ///
    /// The outgoing reporter is removed before the table scope is torn down, and
    /// a new one is derived only after the incoming settings are in place.
    /// Selecting the table that is already active keeps its scope and only
    /// re-resolves its settings. Returns `None` when the id is unknown; the
    /// session then shows nothing.
    pub fn select_table(&mut self, id: &str) -> Result<Option<TableSettings>> {
        let _span = info_span!("select_table", table_id = id).entered();

        if self.active_table.as_deref() == Some(id) {
            self.refresh_settings()?;
            return Ok(self.table_settings());
        }

        self.audit = None;
        self.store.teardown_table()?;
        self.active_table = Some(id.to_string());

        let settings = resolve_table_settings(&self.store, id);
        if let Some(settings) = &settings {
            self.store.write(TABLE_SETTINGS, settings.clone())?;
        } else {
            debug!("table not found in registry");
        }
        self.store.write(TABLE_ROWS, im::Vector::new())?;
        self.audit = Some(AuditChangeWatcher::install(&self.store, self.config.clone())?);
        Ok(settings)
    }

    /// Leaves the active table.
    pub fn close_table(&mut self) -> Result<()> {
        self.audit = None;
        self.active_table = None;
        self.store.teardown_table()?;
        Ok(())
    }

    /// Replaces the rows of the active table with a fresh snapshot.
    pub fn load_rows(&mut self, rows: Vec<Row>) -> Result<()> {
        if self.active_table.is_none() {
            return Err(GridError::NoActiveTable);
        }
        self.store.write(TABLE_ROWS, rows.into_iter().collect())
    }

    pub fn rows(&self) -> im::Vector<Row> {
        self.store.read(TABLE_ROWS).unwrap_or_default()
    }

    pub fn table_settings(&self) -> Option<TableSettings> {
        self.store.read(TABLE_SETTINGS)
    }

    pub fn audit_active(&self) -> bool {
        self.audit.as_ref().is_some_and(AuditChangeWatcher::is_active)
    }

    fn refresh_settings(&mut self) -> Result<()> {
        let Some(id) = self.active_table.clone() else {
            return Ok(());
        };
        let table = self.store.table_scope();
        match resolve_table_settings(&self.store, &id) {
            Some(settings) => {
                if table.read(TABLE_SETTINGS).as_ref() != Some(&settings) {
                    table.write(TABLE_SETTINGS, settings)?;
                }
            }
            None => {
                table.clear(TABLE_SETTINGS)?;
            }
        }
        self.sync_audit()
    }

    fn sync_audit(&mut self) -> Result<()> {
        if let Some(watcher) = self.audit.as_mut() {
            watcher.sync()?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Authorization and affordances
    // ------------------------------------------------------------------

    pub fn access(&self) -> Option<AccessDecision> {
        let settings = self.table_settings()?;
        let roles = self.store.read(USER_ROLES).unwrap_or_default();
        Some(AccessDecision::evaluate(&roles, &settings))
    }

    /// Mutation engine bound to the current table epoch.
    pub fn engine(&self) -> Option<RowMutationEngine> {
        self.active_table.as_ref()?;
        Some(RowMutationEngine::new(
            self.store.table_scope(),
            self.config.clone(),
        ))
    }

    /// Controls of the final column for `row`; `None` means the column is empty.
    pub fn row_actions(&self, row: &Row) -> Option<RowActions> {
        let settings = self.table_settings()?;
        if !self.access()?.can_mutate {
            return None;
        }
        let fast_bypass = self.confirm.fast_bypass();
        Some(RowActions {
            menu: Affordance {
                tooltip: "Row menu",
                enabled: true,
            },
            duplicate: Affordance {
                tooltip: RowAction::Duplicate.tooltip(fast_bypass),
                enabled: !settings.is_collection_group(),
            },
            delete: Affordance {
                tooltip: RowAction::Delete.tooltip(fast_bypass),
                enabled: row.path().is_some(),
            },
        })
    }

    fn checked_actions(&self, row: &Row) -> Result<RowActions> {
        let settings = self.table_settings().ok_or(GridError::NoActiveTable)?;
        self.row_actions(row)
            .ok_or_else(|| GridError::ReadOnly(settings.id))
    }

    // ------------------------------------------------------------------
    // Row actions
    // ------------------------------------------------------------------

    /// Duplicate button: confirms unless bypassed, then copies the row.
    pub fn request_duplicate(&self, row: &Row) -> Result<ActionOutcome> {
        if !self.checked_actions(row)?.duplicate.enabled {
            return Err(GridError::Unsupported(
                "rows of a collection group table cannot be duplicated".into(),
            ));
        }
        let engine = self.engine().ok_or(GridError::NoActiveTable)?;
        let source = row.clone();
        let path = row.path().unwrap_or_default().to_string();
        self.confirm.guard(RowAction::Duplicate, &path, move || {
            engine.duplicate_row(&source).map(Some)
        })
    }

    /// Delete button: confirms unless bypassed, then removes the row.
    pub fn request_delete(&self, row: &Row) -> Result<ActionOutcome> {
        if !self.checked_actions(row)?.delete.enabled {
            return Err(GridError::InvalidTarget("row has no reference path".into()));
        }
        let engine = self.engine().ok_or(GridError::NoActiveTable)?;
        let path = row.path().unwrap_or_default().to_string();
        let target = path.clone();
        self.confirm
            .guard(RowAction::Delete, &path, move || engine.delete_row(&target))
    }

    /// Adds a blank row using the table's id strategy.
    pub fn add_row(&self) -> Result<RowDelta> {
        let engine = self.engine().ok_or(GridError::NoActiveTable)?;
        let settings = engine.settings()?;
        engine.add_row(&Row::new(), settings.add_row_id_type)
    }

    pub fn update_cell(&self, path: &str, field: &str, value: Value) -> Result<RowDelta> {
        let engine = self.engine().ok_or(GridError::NoActiveTable)?;
        engine.update_cell(path, field, value)
    }

    // ------------------------------------------------------------------
    // Breadcrumbs
    // ------------------------------------------------------------------

    /// Header of the active table, `None` when it does not resolve.
    ///
    /// Reads the global registry rather than the table scope, so it also works
    /// from navigation chrome outside the table view.
    pub fn breadcrumbs(&self) -> Option<Breadcrumbs> {
        let id = self.active_table.as_deref()?;
        let settings = resolve_table_settings(&self.store, id)?;
        let roles = self.store.read(USER_ROLES).unwrap_or_default();
        let dismissed = self
            .store
            .read(TABLE_DESCRIPTION_DISMISSED)
            .unwrap_or_default();

        let read_only_tooltip = AccessDecision::evaluate(&roles, &settings).read_only_tooltip;
        let description = settings
            .description
            .as_ref()
            .filter(|d| !d.is_empty())
            .map(|markdown| DescriptionTooltip {
                markdown: markdown.clone(),
                button_label: "Table info",
                default_open: !dismissed.contains(&settings.id),
            });

        Some(Breadcrumbs {
            section_href: format!("/#{}", camel_case(&settings.section)),
            section: settings.section,
            name: settings.name,
            read_only_tooltip,
            description,
        })
    }

    /// Remembers that the description tooltip of the active table was closed.
    pub fn dismiss_description(&mut self) -> Result<()> {
        let Some(id) = self.active_table.clone() else {
            return Ok(());
        };
        self.store.update(TABLE_DESCRIPTION_DISMISSED, |dismissed| {
            let mut dismissed = dismissed.unwrap_or_default();
            if !dismissed.contains(&id) {
                dismissed.push(id);
            }
            dismissed
        })
    }
}
