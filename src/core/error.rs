use thiserror::Error;

#[derive(Error, Debug)]
pub enum GridError {
    #[error("No table is selected")]
    NoActiveTable,

    #[error("Table '{0}' is read-only")]
    ReadOnly(String),

    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    #[error("Row '{0}' not found")]
    RowNotFound(String),

    #[error("Row id '{0}' already exists")]
    DuplicateRowId(String),

    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Lock error: {0}")]
    LockError(String),
}

pub type Result<T> = std::result::Result<T, GridError>;

impl<T> From<std::sync::PoisonError<T>> for GridError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::LockError(err.to_string())
    }
}

impl From<serde_json::Error> for GridError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
