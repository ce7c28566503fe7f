use crate::core::Result;
use crate::storage::ScopeStore;
use crate::storage::cells::ALT_PRESS;
use crate::transaction::RowDelta;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Color hint for the primary button of a confirmation dialog
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmColor {
    Primary,
    Error,
}

/// Guarded row action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowAction {
    Duplicate,
    Delete,
}

impl RowAction {
    pub fn title(&self) -> &'static str {
        match self {
            RowAction::Duplicate => "Duplicate row?",
            RowAction::Delete => "Delete row?",
        }
    }

    pub fn confirm_label(&self) -> &'static str {
        match self {
            RowAction::Duplicate => "Duplicate",
            RowAction::Delete => "Delete",
        }
    }

    pub fn confirm_color(&self) -> Option<ConfirmColor> {
        match self {
            RowAction::Duplicate => None,
            RowAction::Delete => Some(ConfirmColor::Error),
        }
    }

    /// Button tooltip. The ellipsis on delete signals that a dialog follows.
    pub fn tooltip(&self, fast_bypass: bool) -> &'static str {
        match (self, fast_bypass) {
            (RowAction::Duplicate, _) => "Duplicate row",
            (RowAction::Delete, true) => "Delete row",
            (RowAction::Delete, false) => "Delete row…",
        }
    }
}

impl fmt::Display for RowAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RowAction::Duplicate => "duplicate",
            RowAction::Delete => "delete",
        };
        write!(f, "{label}")
    }
}

type ConfirmCallback = Box<dyn FnOnce() + Send>;

/// Request handed to the confirmation dialog.
///
/// The mutation runs only through [`ConfirmationRequest::confirm`]. Dropping
/// or dismissing the request leaves state untouched.
pub struct ConfirmationRequest {
    pub title: String,
    pub body: String,
    /// Row path quoted in the body, for operator verification
    pub row_path: String,
    pub confirm_label: String,
    pub confirm_color: Option<ConfirmColor>,
    on_confirm: Option<ConfirmCallback>,
}

impl ConfirmationRequest {
    fn new(action: RowAction, row_path: &str, on_confirm: ConfirmCallback) -> Self {
        Self {
            title: action.title().to_string(),
            body: format!("Row path:\n{}", row_path),
            row_path: row_path.to_string(),
            confirm_label: action.confirm_label().to_string(),
            confirm_color: action.confirm_color(),
            on_confirm: Some(on_confirm),
        }
    }

    /// Runs the guarded action. Consumes the request, so it runs at most once.
    pub fn confirm(mut self) {
        if let Some(on_confirm) = self.on_confirm.take() {
            on_confirm();
        }
    }

    pub fn dismiss(self) {
        debug!(row_path = %self.row_path, "confirmation dismissed");
    }
}

impl fmt::Debug for ConfirmationRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfirmationRequest")
            .field("title", &self.title)
            .field("row_path", &self.row_path)
            .field("confirm_label", &self.confirm_label)
            .field("confirm_color", &self.confirm_color)
            .finish()
    }
}

/// Dialog collaborator that renders requests and calls `confirm` on approval
pub trait ConfirmDialog: Send + Sync {
    fn request_confirmation(&self, request: ConfirmationRequest);
}

/// Result of triggering a guarded action
#[derive(Debug, Clone, PartialEq)]
pub enum ActionOutcome {
    /// Ran immediately on the fast path
    Applied(Option<RowDelta>),
    /// Waiting on the dialog; nothing has changed yet
    AwaitingConfirmation,
}

/// Routes guarded actions through the dialog unless the bypass key is held.
#[derive(Clone)]
pub struct ConfirmationPolicy {
    store: ScopeStore,
    dialog: Arc<dyn ConfirmDialog>,
}

impl ConfirmationPolicy {
    pub fn new(store: ScopeStore, dialog: Arc<dyn ConfirmDialog>) -> Self {
        Self { store, dialog }
    }

    /// Whether the bypass modifier is held right now
    pub fn fast_bypass(&self) -> bool {
        self.store.read(ALT_PRESS).unwrap_or(false)
    }

    /// Runs `apply` now on the fast path, otherwise defers it to the dialog.
    ///
    /// Errors from a deferred `apply` have nowhere to go but the log.
    pub fn guard<F>(&self, action: RowAction, row_path: &str, apply: F) -> Result<ActionOutcome>
    where
        F: FnOnce() -> Result<Option<RowDelta>> + Send + 'static,
    {
        if self.fast_bypass() {
            debug!(%action, row_path, "fast bypass, applying without confirmation");
            return apply().map(ActionOutcome::Applied);
        }

        let path = row_path.to_string();
        let on_confirm: ConfirmCallback = Box::new(move || {
            if let Err(err) = apply() {
                warn!(%action, row_path = %path, error = %err, "confirmed row action failed");
            }
        });
        self.dialog
            .request_confirmation(ConfirmationRequest::new(action, row_path, on_confirm));
        Ok(ActionOutcome::AwaitingConfirmation)
    }
}
