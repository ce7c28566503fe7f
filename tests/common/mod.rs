#![allow(dead_code)]

use async_trait::async_trait;
use gridscope::{
    Backend, ConfirmDialog, ConfirmationRequest, GridConfig, GridError, Result, TableSession,
    TableSettings,
};
use serde_json::{Value, json};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Backend double that records every call and can be told to fail.
#[derive(Default)]
pub struct RecordingBackend {
    calls: Mutex<Vec<(String, Value)>>,
    fail: AtomicBool,
}

impl RecordingBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        let backend = Self::default();
        backend.fail.store(true, Ordering::SeqCst);
        Arc::new(backend)
    }

    pub fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn bodies(&self) -> Vec<Value> {
        self.calls().into_iter().map(|(_, body)| body).collect()
    }
}

#[async_trait]
impl Backend for RecordingBackend {
    async fn run(&self, route: &str, body: Value) -> Result<Value> {
        self.calls.lock().unwrap().push((route.to_string(), body));
        if self.fail.load(Ordering::SeqCst) {
            return Err(GridError::Backend("audit service unavailable".into()));
        }
        Ok(json!({ "success": true }))
    }
}

/// Dialog double that parks requests until the test decides.
#[derive(Default)]
pub struct RecordingDialog {
    pending: Mutex<Vec<ConfirmationRequest>>,
    requested: Mutex<usize>,
}

impl RecordingDialog {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn request_count(&self) -> usize {
        *self.requested.lock().unwrap()
    }

    pub fn take(&self) -> Option<ConfirmationRequest> {
        self.pending.lock().unwrap().pop()
    }
}

impl ConfirmDialog for RecordingDialog {
    fn request_confirmation(&self, request: ConfirmationRequest) {
        *self.requested.lock().unwrap() += 1;
        self.pending.lock().unwrap().push(request);
    }
}

/// Lets detached audit tasks run until `backend` has seen `expected` calls.
pub async fn settle(backend: &RecordingBackend, expected: usize) {
    for _ in 0..200 {
        if backend.calls().len() >= expected {
            break;
        }
        tokio::task::yield_now().await;
    }
    // A few more turns so unexpected extra calls would show up too.
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

pub fn tasks_table() -> TableSettings {
    TableSettings::new("tasks", "Tasks", "tasks").section("Operations")
}

pub fn session_with(tables: Vec<TableSettings>, dialog: Arc<RecordingDialog>) -> TableSession {
    let mut session = TableSession::new(GridConfig::default(), dialog);
    session.set_tables(tables).unwrap();
    session
}
