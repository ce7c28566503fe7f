pub mod auth;
pub mod config;
pub mod version;

use crate::core::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// Route of the backend operation that records audit events
pub const AUDIT_CHANGE_ROUTE: &str = "/auditChange";

/// RPC contract of the remote backend.
///
/// Transport, authentication and retries belong to the implementor. A failed
/// call surfaces as `Err`; callers in this crate never retry.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Invokes a named backend operation with a JSON body
    async fn run(&self, route: &str, body: Value) -> Result<Value>;
}

/// Shared handle on the connected backend
pub type BackendHandle = Arc<dyn Backend>;
