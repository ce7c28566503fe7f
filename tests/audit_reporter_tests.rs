/// Audit reporter tests
///
/// Activation gating, table switches and fire-and-forget dispatch.
/// Run with: cargo test --test audit_reporter_tests
mod common;

use common::{RecordingBackend, RecordingDialog, session_with, settle, tasks_table};
use gridscope::persist::AUDIT_CHANGE;
use gridscope::{
    AUDIT_CHANGE_ROUTE, AuditUser, BackendHandle, GridConfig, Row, TableSession, TableSettings,
};
use serde_json::json;
use std::sync::Arc;

fn audited() -> TableSettings {
    tasks_table().audit(true)
}

fn connected(tables: Vec<TableSettings>, backend: &Arc<RecordingBackend>) -> TableSession {
    let mut session = session_with(tables, RecordingDialog::new());
    let handle: BackendHandle = backend.clone();
    session.set_backend(handle).unwrap();
    session.set_backend_version("1.1.1").unwrap();
    session
        .set_current_user(AuditUser::new("uid-7").email("ops@example.com"))
        .unwrap();
    session
}

#[tokio::test]
async fn test_active_only_when_every_condition_holds() {
    let backend = RecordingBackend::new();
    let mut session = connected(vec![audited()], &backend);
    session.select_table("tasks").unwrap();
    assert!(session.audit_active());

    // Backend too old
    session.set_backend_version("1.1.0").unwrap();
    assert!(!session.audit_active());
    session.set_backend_version("1.2.0").unwrap();
    assert!(session.audit_active());

    // Audit flag off
    session.set_tables(vec![tasks_table().audit(false)]).unwrap();
    assert!(!session.audit_active());
    session.set_tables(vec![audited()]).unwrap();
    assert!(session.audit_active());

    // No collection path
    session
        .set_tables(vec![TableSettings::new("tasks", "Tasks", "").audit(true)])
        .unwrap();
    assert!(!session.audit_active());
    session.set_tables(vec![audited()]).unwrap();
    assert!(session.audit_active());

    // Settings unresolved
    session.set_tables(vec![]).unwrap();
    assert!(!session.audit_active());
    session.set_tables(vec![audited()]).unwrap();
    assert!(session.audit_active());

    // Backend gone
    session.disconnect_backend().unwrap();
    assert!(!session.audit_active());
}

#[tokio::test]
async fn test_switch_from_unaudited_to_audited_table() {
    let backend = RecordingBackend::new();
    let table_a = TableSettings::new("a", "A", "alpha").audit(false);
    let table_b = TableSettings::new("b", "B", "beta").audit(true);
    let mut session = connected(vec![table_a, table_b], &backend);

    session.select_table("a").unwrap();
    assert!(!session.audit_active());
    session.add_row().unwrap();
    settle(&backend, 0).await;
    assert!(backend.calls().is_empty());

    session.select_table("b").unwrap();
    assert!(session.audit_active());
    let delta = session.add_row().unwrap();
    settle(&backend, 1).await;

    let calls = backend.calls();
    assert_eq!(calls.len(), 1);
    let (route, body) = &calls[0];
    assert_eq!(route, AUDIT_CHANGE_ROUTE);
    assert_eq!(body["type"], "ADD_ROW");
    assert_eq!(body["ref"]["tableId"], "b");
    assert_eq!(body["ref"]["collectionPath"], "beta");
    assert_eq!(body["ref"]["rowId"], json!(delta.row_id()));
    assert_eq!(body["rowyUser"]["uid"], "uid-7");
    assert_eq!(body["rowyUser"]["email"], "ops@example.com");
    assert!(body["rowyUser"]["timestamp"].is_string());
    assert!(body.get("data").is_none());
}

#[tokio::test]
async fn test_each_mutation_emits_matching_event() {
    let backend = RecordingBackend::new();
    let mut session = connected(vec![audited()], &backend);
    session.select_table("tasks").unwrap();
    session
        .load_rows(vec![Row::with_path("tasks/1").field("title", "a")])
        .unwrap();
    session.set_fast_bypass(true).unwrap();

    session.update_cell("tasks/1", "title", json!("b")).unwrap();
    session.request_delete(&Row::with_path("tasks/1")).unwrap();
    settle(&backend, 2).await;

    let bodies = backend.bodies();
    assert_eq!(bodies.len(), 2);
    assert_eq!(bodies[0]["type"], "UPDATE_CELL");
    assert_eq!(bodies[0]["data"]["updatedField"], "title");
    assert_eq!(bodies[0]["ref"]["rowId"], "1");
    assert_eq!(bodies[1]["type"], "DELETE_ROW");
    assert_eq!(bodies[1]["ref"]["rowId"], "1");
}

#[tokio::test]
async fn test_dispatch_failure_never_reaches_caller() {
    let backend = RecordingBackend::failing();
    let mut session = connected(vec![audited()], &backend);
    session.select_table("tasks").unwrap();

    let delta = session.add_row().unwrap();
    settle(&backend, 1).await;

    assert_eq!(backend.calls().len(), 1);
    assert_eq!(session.rows().len(), 1);
    assert_eq!(session.rows()[0].path(), Some(delta.path()));
    assert!(session.audit_active());
}

#[tokio::test]
async fn test_row_exists_locally_before_dispatch_runs() {
    let backend = RecordingBackend::new();
    let mut session = connected(vec![audited()], &backend);
    session.select_table("tasks").unwrap();

    let delta = session.add_row().unwrap();
    // Nothing has been dispatched yet: the task only runs once we yield.
    assert!(backend.calls().is_empty());
    assert_eq!(session.rows()[0].path(), Some(delta.path()));

    settle(&backend, 1).await;
    assert_eq!(backend.calls().len(), 1);
}

#[tokio::test]
async fn test_reporter_from_previous_table_is_inert() {
    let backend = RecordingBackend::new();
    let other = TableSettings::new("people", "People", "people").audit(true);
    let mut session = connected(vec![audited(), other], &backend);
    session.select_table("tasks").unwrap();

    let stale = session.store().read(AUDIT_CHANGE).unwrap();
    assert_eq!(stale.table_id(), "tasks");

    session.select_table("people").unwrap();
    assert!(!stale.is_current());
    assert!(stale
        .report(gridscope::AuditChangeType::AddRow, "1", None)
        .is_none());

    let current = session.store().read(AUDIT_CHANGE).unwrap();
    assert_eq!(current.table_id(), "people");
    settle(&backend, 0).await;
    assert!(backend.calls().is_empty());
}

#[tokio::test]
async fn test_custom_route_and_min_version_from_config() {
    let backend = RecordingBackend::new();
    let config = GridConfig::new()
        .audit_route("/audit/v2")
        .audit_min_version("2.0.0");
    let mut session = TableSession::new(config, RecordingDialog::new());
    session.set_tables(vec![audited()]).unwrap();
    let handle: BackendHandle = backend.clone();
    session.set_backend(handle).unwrap();
    session.set_backend_version("1.9.9").unwrap();
    session.select_table("tasks").unwrap();
    assert!(!session.audit_active());

    session.set_backend_version("2.0.0").unwrap();
    assert!(session.audit_active());
    session.add_row().unwrap();
    settle(&backend, 1).await;
    assert_eq!(backend.calls()[0].0, "/audit/v2");
}

#[tokio::test]
async fn test_watcher_follows_changes_until_teardown() {
    let backend = RecordingBackend::new();
    let store = gridscope::ScopeStore::new();
    let config = Arc::new(GridConfig::default());
    store
        .write(
            gridscope::storage::cells::TABLES,
            gridscope::TableCatalog::from_tables(vec![audited()]),
        )
        .unwrap();
    store
        .write(gridscope::storage::cells::TABLE_SETTINGS, audited())
        .unwrap();
    let handle: BackendHandle = backend.clone();
    store.write(gridscope::storage::cells::BACKEND, handle).unwrap();

    let watcher = gridscope::AuditChangeWatcher::install(&store, config).unwrap();
    assert!(!watcher.is_active());
    let task = tokio::spawn(watcher.follow());

    store
        .write(gridscope::storage::cells::BACKEND_VERSION, "1.1.1".to_string())
        .unwrap();
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
    assert!(store.read(AUDIT_CHANGE).is_some());

    store.teardown_table().unwrap();
    task.await.unwrap().unwrap();
    assert!(store.read(AUDIT_CHANGE).is_none());
}
