pub mod audit;

pub use audit::{
    AUDIT_CHANGE, AuditChangeType, AuditChangeWatcher, AuditData, AuditEvent, AuditReporter,
    AuditTarget, derive_audit_reporter,
};
