// ============================================================================
// Scope Store
// ============================================================================
//
// Three independently keyed cell maps (global, project, table). A cell is
// addressed by (name, scope) only. The table map is dropped wholesale on
// teardown and the table epoch advances, so anything bound to the outgoing
// table turns inert.
//
// ============================================================================

use crate::core::{GridError, Result};
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::watch;
use tracing::debug;

/// Isolation domain of a cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    /// Process-wide, survives everything
    Global,
    /// Survives table switches
    Project,
    /// Reset whenever the active table changes
    Table,
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Global => "global",
            Self::Project => "project",
            Self::Table => "table",
        };
        write!(f, "{label}")
    }
}

/// Typed address of a cell.
///
/// The type parameter only guides reads and writes; storage is keyed by
/// `(name, scope)` alone.
pub struct CellKey<T> {
    name: &'static str,
    scope: Scope,
    _marker: PhantomData<fn() -> T>,
}

impl<T> CellKey<T> {
    pub const fn new(name: &'static str, scope: Scope) -> Self {
        Self {
            name,
            scope,
            _marker: PhantomData,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }
}

impl<T> Clone for CellKey<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for CellKey<T> {}

impl<T> fmt::Debug for CellKey<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.scope, self.name)
    }
}

type CellValue = Arc<dyn Any + Send + Sync>;

#[derive(Default)]
struct ScopeCells {
    values: HashMap<&'static str, CellValue>,
    watchers: HashMap<&'static str, watch::Sender<u64>>,
}

impl ScopeCells {
    fn notify(&mut self, name: &'static str) {
        self.watchers
            .entry(name)
            .or_insert_with(|| watch::channel(0).0)
            .send_modify(|revision| *revision += 1);
    }

    fn receiver(&mut self, name: &'static str) -> watch::Receiver<u64> {
        self.watchers
            .entry(name)
            .or_insert_with(|| watch::channel(0).0)
            .subscribe()
    }
}

#[derive(Default)]
struct StoreInner {
    global: ScopeCells,
    project: ScopeCells,
    table: ScopeCells,
    table_epoch: u64,
}

impl StoreInner {
    fn cells(&self, scope: Scope) -> &ScopeCells {
        match scope {
            Scope::Global => &self.global,
            Scope::Project => &self.project,
            Scope::Table => &self.table,
        }
    }

    fn cells_mut(&mut self, scope: Scope) -> &mut ScopeCells {
        match scope {
            Scope::Global => &mut self.global,
            Scope::Project => &mut self.project,
            Scope::Table => &mut self.table,
        }
    }
}

/// Partitioned reactive key-value state.
///
/// Cloning yields another handle to the same cells.
#[derive(Clone, Default)]
pub struct ScopeStore {
    inner: Arc<RwLock<StoreInner>>,
}

impl ScopeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current table-scope lifecycle counter
    pub fn table_epoch(&self) -> u64 {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .table_epoch
    }

    /// Reads a cell. Absent cells, and cells holding another type, read as `None`.
    pub fn read<T>(&self, key: CellKey<T>) -> Option<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner
            .cells(key.scope)
            .values
            .get(key.name)
            .and_then(|value| value.downcast_ref::<T>())
            .cloned()
    }

    pub fn write<T>(&self, key: CellKey<T>, value: T) -> Result<()>
    where
        T: Send + Sync + 'static,
    {
        let mut inner = self.inner.write()?;
        let cells = inner.cells_mut(key.scope);
        cells.values.insert(key.name, Arc::new(value));
        cells.notify(key.name);
        Ok(())
    }

    /// Applies `updater` to the current value and stores the result.
    ///
    /// The read and the write happen under one lock, so concurrent updaters
    /// never lose each other's changes.
    pub fn update<T, F>(&self, key: CellKey<T>, updater: F) -> Result<()>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce(Option<T>) -> T,
    {
        let mut inner = self.inner.write()?;
        let cells = inner.cells_mut(key.scope);
        let current = cells
            .values
            .get(key.name)
            .and_then(|value| value.downcast_ref::<T>())
            .cloned();
        cells.values.insert(key.name, Arc::new(updater(current)));
        cells.notify(key.name);
        Ok(())
    }

    /// Removes a cell, returning it to the uninitialized state.
    pub fn clear<T>(&self, key: CellKey<T>) -> Result<()> {
        let mut inner = self.inner.write()?;
        let cells = inner.cells_mut(key.scope);
        if cells.values.remove(key.name).is_some() {
            cells.notify(key.name);
        }
        Ok(())
    }

    /// Subscribes to changes of one cell.
    ///
    /// A table-scoped subscription belongs to the current table epoch and goes
    /// quiet once the table scope is torn down.
    pub fn subscribe<T>(&self, key: CellKey<T>) -> Result<CellSubscription> {
        let mut inner = self.inner.write()?;
        let epoch = inner.table_epoch;
        let receiver = inner.cells_mut(key.scope).receiver(key.name);
        Ok(CellSubscription {
            store: self.clone(),
            scope: key.scope,
            name: key.name,
            epoch,
            receiver,
        })
    }

    /// Drops every table-scoped cell and starts a new table epoch.
    ///
    /// Watch senders are dropped too, closing every outstanding table
    /// subscription.
    pub fn teardown_table(&self) -> Result<u64> {
        let mut inner = self.inner.write()?;
        inner.table = ScopeCells::default();
        inner.table_epoch += 1;
        debug!(epoch = inner.table_epoch, "table scope torn down");
        Ok(inner.table_epoch)
    }

    /// Handle on the table scope bound to the current epoch.
    pub fn table_scope(&self) -> TableScope {
        TableScope {
            store: self.clone(),
            epoch: self.table_epoch(),
        }
    }
}

/// Table-scope view pinned to one epoch.
///
/// Reads return `None` and writes are dropped once the epoch it was created in
/// has ended.
#[derive(Clone)]
pub struct TableScope {
    store: ScopeStore,
    epoch: u64,
}

impl TableScope {
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn is_current(&self) -> bool {
        self.store.table_epoch() == self.epoch
    }

    pub fn store(&self) -> &ScopeStore {
        &self.store
    }

    pub fn read<T>(&self, key: CellKey<T>) -> Option<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        if !self.is_current() {
            return None;
        }
        self.store.read(key)
    }

    /// Writes through the pinned epoch. Returns `false` when the handle is stale.
    pub fn write<T>(&self, key: CellKey<T>, value: T) -> Result<bool>
    where
        T: Send + Sync + 'static,
    {
        self.guarded(key, |inner| {
            let cells = inner.cells_mut(key.scope);
            cells.values.insert(key.name, Arc::new(value));
            cells.notify(key.name);
        })
    }

    /// Read-modify-write under one lock. An updater returning `None` declines
    /// the change: the cell keeps its value and subscribers are not notified.
    pub fn try_update<T, F>(&self, key: CellKey<T>, updater: F) -> Result<bool>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce(Option<T>) -> Option<T>,
    {
        self.guarded(key, |inner| {
            let cells = inner.cells_mut(key.scope);
            let current = cells
                .values
                .get(key.name)
                .and_then(|value| value.downcast_ref::<T>())
                .cloned();
            if let Some(next) = updater(current) {
                cells.values.insert(key.name, Arc::new(next));
                cells.notify(key.name);
            }
        })
    }

    pub fn clear<T>(&self, key: CellKey<T>) -> Result<bool> {
        self.guarded(key, |inner| {
            let cells = inner.cells_mut(key.scope);
            if cells.values.remove(key.name).is_some() {
                cells.notify(key.name);
            }
        })
    }

    fn guarded<T>(&self, key: CellKey<T>, apply: impl FnOnce(&mut StoreInner)) -> Result<bool> {
        let mut inner = self.store.inner.write()?;
        // Non-table cells are not tied to the table lifecycle.
        if key.scope == Scope::Table && inner.table_epoch != self.epoch {
            return Ok(false);
        }
        apply(&mut inner);
        Ok(true)
    }
}

/// Change feed for one cell.
pub struct CellSubscription {
    store: ScopeStore,
    scope: Scope,
    name: &'static str,
    epoch: u64,
    receiver: watch::Receiver<u64>,
}

impl CellSubscription {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    /// `false` for a table subscription whose epoch has ended.
    pub fn is_live(&self) -> bool {
        self.scope != Scope::Table || self.store.table_epoch() == self.epoch
    }

    /// Whether the cell was written since the last `mark_seen`.
    pub fn has_changed(&self) -> bool {
        self.is_live() && self.receiver.has_changed().unwrap_or(false)
    }

    pub fn mark_seen(&mut self) {
        self.receiver.borrow_and_update();
    }

    /// Waits for the next write. Fails once the subscription can no longer fire.
    pub async fn changed(&mut self) -> Result<()> {
        if !self.is_live() {
            return Err(self.outlived());
        }
        self.receiver.changed().await.map_err(|_| self.outlived())?;
        if !self.is_live() {
            return Err(self.outlived());
        }
        Ok(())
    }

    fn outlived(&self) -> GridError {
        GridError::Unsupported(format!(
            "subscription to {}:{} outlived its table",
            self.scope, self.name
        ))
    }
}
