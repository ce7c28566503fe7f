use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Role tag that lifts table-level read-only enforcement in the UI.
pub const ADMIN_ROLE: &str = "ADMIN";

/// Kind of collection a table is bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TableType {
    #[default]
    Primary,
    /// Virtual table spanning every collection with the same id.
    /// Rows may live in heterogeneous parents, so duplication is meaningless.
    CollectionGroup,
}

/// Policy used to assign an identifier to a new row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RowIdType {
    /// Random id generated locally
    #[default]
    Random,
    /// Numeric id one below the smallest numeric id in the table
    Decrement,
    /// Id supplied by the user
    Custom,
}

impl fmt::Display for RowIdType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Random => "random",
            Self::Decrement => "decrement",
            Self::Custom => "custom",
        };
        write!(f, "{label}")
    }
}

/// Configuration record for one data-grid table.
///
/// Field names follow the backend's table registry document so a registry
/// snapshot can be deserialized directly.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableSettings {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub section: String,
    /// Path of the backing collection
    #[serde(default)]
    pub collection: String,
    #[serde(default)]
    pub table_type: TableType,
    #[serde(default)]
    pub read_only: bool,
    #[serde(default)]
    pub audit: bool,
    /// Markdown description shown in the table info tooltip
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub add_row_id_type: RowIdType,
}

impl TableSettings {
    pub fn new(id: impl Into<String>, name: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            collection: collection.into(),
            ..Self::default()
        }
    }

    pub fn section(mut self, section: impl Into<String>) -> Self {
        self.section = section.into();
        self
    }

    pub fn table_type(mut self, table_type: TableType) -> Self {
        self.table_type = table_type;
        self
    }

    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    pub fn audit(mut self, audit: bool) -> Self {
        self.audit = audit;
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn add_row_id_type(mut self, id_type: RowIdType) -> Self {
        self.add_row_id_type = id_type;
        self
    }

    pub fn is_collection_group(&self) -> bool {
        self.table_type == TableType::CollectionGroup
    }
}

/// Backend document reference of a row
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RowRef {
    pub path: String,
}

impl RowRef {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }

    /// Last segment of the path.
    pub fn id(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or_default()
    }
}

/// One grid row: user fields plus the backend reference it was loaded from.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Row {
    #[serde(rename = "_rowy_ref", default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<RowRef>,
    #[serde(flatten)]
    pub fields: BTreeMap<String, Value>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_path(path: impl Into<String>) -> Self {
        Self {
            reference: Some(RowRef::new(path)),
            fields: BTreeMap::new(),
        }
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Reference path, `None` when absent or empty.
    pub fn path(&self) -> Option<&str> {
        self.reference
            .as_ref()
            .map(|r| r.path.as_str())
            .filter(|p| !p.is_empty())
    }

    pub fn id(&self) -> Option<&str> {
        self.path().and(self.reference.as_ref().map(RowRef::id))
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }
}

/// Role tags held by the current principal
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UserRoles(BTreeSet<String>);

impl UserRoles {
    pub fn new<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(roles.into_iter().map(Into::into).collect())
    }

    pub fn contains(&self, role: &str) -> bool {
        self.0.contains(role)
    }

    #[inline]
    pub fn is_admin(&self) -> bool {
        self.contains(ADMIN_ROLE)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

/// Acting principal as embedded in audit events
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditUser {
    pub uid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default)]
    pub email_verified: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(rename = "photoURL", default, skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
}

impl AuditUser {
    pub fn new(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            ..Self::default()
        }
    }

    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Stamps the user with the time the action is reported.
    pub fn stamped(&self, at: DateTime<Utc>) -> StampedAuditUser {
        StampedAuditUser {
            user: self.clone(),
            timestamp: at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StampedAuditUser {
    #[serde(flatten)]
    pub user: AuditUser,
    pub timestamp: DateTime<Utc>,
}
