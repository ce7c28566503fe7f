use crate::core::{TableSettings, UserRoles};

/// Tooltip of the read-only badge as seen by a non-admin
pub const READ_ONLY_TOOLTIP: &str = "Table is read-only";
/// Tooltip of the read-only badge as seen by an admin
pub const READ_ONLY_ADMIN_TOOLTIP: &str = "Table is read-only for non-ADMIN users";

/// What the current principal may see and do on a table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessDecision {
    /// Mutation affordances exist at all. When false they are absent, not disabled.
    pub can_mutate: bool,
    pub show_read_only_badge: bool,
    pub read_only_tooltip: Option<&'static str>,
}

impl AccessDecision {
    /// Derives access from roles and settings.
    ///
    /// `ADMIN` only lifts the read-only restriction in the UI; the backend still
    /// enforces its own write permissions.
    pub fn evaluate(roles: &UserRoles, settings: &TableSettings) -> Self {
        if !settings.read_only {
            return Self {
                can_mutate: true,
                show_read_only_badge: false,
                read_only_tooltip: None,
            };
        }

        let is_admin = roles.is_admin();
        Self {
            can_mutate: is_admin,
            show_read_only_badge: true,
            read_only_tooltip: Some(if is_admin {
                READ_ONLY_ADMIN_TOOLTIP
            } else {
                READ_ONLY_TOOLTIP
            }),
        }
    }
}
