//! In-memory row store.
//!
//! Backs the `memory` storage type and the test suites. Units of work write
//! straight into the shared table and keep an undo log, so rollback restores
//! the previous positions in reverse order.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard, OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};
use tracing::{debug, warn};

use crate::interfaces::{Result, RowStore, StorageError, UnitOfWork};
use crate::query::{Aggregate, Column, Direction, Filter, LockScope, SortOrder};
use crate::row::{GroupValues, NewRow, Row, RowKey, Value};

type Table = Arc<RwLock<BTreeMap<RowKey, Row>>>;

/// Failure switches shared with open units of work.
#[derive(Default)]
struct Faults {
    fail_on_update: RwLock<bool>,
    fail_on_shift: RwLock<bool>,
}

/// Row store that keeps rows in memory.
pub struct InMemoryRowStore {
    rows: Table,
    collection: Arc<RwLock<()>>,
    groups: Mutex<HashMap<GroupValues, Arc<Mutex<()>>>>,
    next_key: Mutex<i64>,
    faults: Arc<Faults>,
}

impl Default for InMemoryRowStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRowStore {
    pub fn new() -> Self {
        Self {
            rows: Arc::new(RwLock::new(BTreeMap::new())),
            collection: Arc::new(RwLock::new(())),
            groups: Mutex::new(HashMap::new()),
            next_key: Mutex::new(1),
            faults: Arc::new(Faults::default()),
        }
    }

    /// Fail every `update_position` until cleared.
    pub async fn set_fail_on_update(&self, fail: bool) {
        *self.faults.fail_on_update.write().await = fail;
    }

    /// Fail every `shift_positions` until cleared.
    pub async fn set_fail_on_shift(&self, fail: bool) {
        *self.faults.fail_on_shift.write().await = fail;
    }

    /// Persist a new row, assigning an integer key when none is set.
    ///
    /// Rows without a position are stored at 0; run the creation hook first
    /// to place them at the end of their group.
    pub async fn insert(&self, row: NewRow) -> Result<RowKey> {
        let mut next_key = self.next_key.lock().await;
        let key = match row.key.filter(|k| !k.is_blank()) {
            Some(RowKey::Int(n)) => {
                *next_key = (*next_key).max(n + 1);
                RowKey::Int(n)
            }
            Some(key) => key,
            None => {
                let n = *next_key;
                *next_key += 1;
                RowKey::Int(n)
            }
        };

        let stored = Row {
            key: key.clone(),
            position: row.position.unwrap_or(0),
            fields: row.fields,
        };
        self.rows.write().await.insert(key.clone(), stored);
        Ok(key)
    }

    /// Delete a row. Positions of the remaining rows are left as they are.
    pub async fn remove(&self, key: &RowKey) -> bool {
        self.rows.write().await.remove(key).is_some()
    }

    pub async fn get(&self, key: &RowKey) -> Option<Row> {
        self.rows.read().await.get(key).cloned()
    }

    /// All rows in key order.
    pub async fn rows(&self) -> Vec<Row> {
        self.rows.read().await.values().cloned().collect()
    }

    async fn group_lock(&self, group: GroupValues) -> Arc<Mutex<()>> {
        self.groups.lock().await.entry(group).or_default().clone()
    }
}

#[async_trait]
impl RowStore for InMemoryRowStore {
    async fn find_by_key(&self, key: &RowKey, _depth: u8) -> Result<Option<Row>> {
        Ok(self.rows.read().await.get(key).cloned())
    }

    async fn begin(&self, scope: LockScope) -> Result<Box<dyn UnitOfWork>> {
        // Collection before group, always, so two units of work cannot
        // wait on each other.
        let (collection, group) = match scope {
            LockScope::Group(group) => {
                let shared = self.collection.clone().read_owned().await;
                let lock = self.group_lock(group).await;
                (CollectionGuard::Shared(shared), Some(lock.lock_owned().await))
            }
            LockScope::Collection => {
                let exclusive = self.collection.clone().write_owned().await;
                (CollectionGuard::Exclusive(exclusive), None)
            }
        };

        Ok(Box::new(InMemoryUnitOfWork {
            rows: self.rows.clone(),
            faults: self.faults.clone(),
            undo: Vec::new(),
            finished: false,
            _collection: collection,
            _group: group,
        }))
    }
}

enum CollectionGuard {
    Shared(#[allow(dead_code)] OwnedRwLockReadGuard<()>),
    Exclusive(#[allow(dead_code)] OwnedRwLockWriteGuard<()>),
}

struct InMemoryUnitOfWork {
    rows: Table,
    faults: Arc<Faults>,
    undo: Vec<(RowKey, i64)>,
    finished: bool,
    // Held until the unit of work is dropped.
    _collection: CollectionGuard,
    _group: Option<OwnedMutexGuard<()>>,
}

impl InMemoryUnitOfWork {
    fn restore(&mut self, rows: &mut BTreeMap<RowKey, Row>) {
        for (key, position) in self.undo.drain(..).rev() {
            if let Some(row) = rows.get_mut(&key) {
                row.position = position;
            }
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.finished {
            return Err(StorageError::TransactionClosed);
        }
        Ok(())
    }
}

fn matches(row: &Row, filter: &Filter) -> bool {
    if let Some(key) = &filter.key {
        if row.key != *key {
            return false;
        }
    }
    let fields_match = filter.fields.iter().all(|(field, expected)| {
        let actual = row.fields.get(field).unwrap_or(&Value::Null);
        actual == expected
    });
    fields_match
        && filter
            .position
            .map(|bound| bound.admits(row.position))
            .unwrap_or(true)
}

fn compare(a: &Row, b: &Row, order: &SortOrder) -> Ordering {
    for term in order.terms() {
        let ordering = match &term.column {
            Column::Key => a.key.cmp(&b.key),
            Column::Position => a.position.cmp(&b.position),
            Column::Field(name) => {
                let null = Value::Null;
                let left = a.fields.get(name).unwrap_or(&null);
                let right = b.fields.get(name).unwrap_or(&null);
                left.cmp(right)
            }
        };
        let ordering = match term.direction {
            Direction::Asc => ordering,
            Direction::Desc => ordering.reverse(),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    a.key.cmp(&b.key)
}

#[async_trait]
impl UnitOfWork for InMemoryUnitOfWork {
    async fn find_one(
        &mut self,
        filter: &Filter,
        order: &SortOrder,
        depth: u8,
    ) -> Result<Option<Row>> {
        let mut rows = self.find_all(filter, order, Some(1), depth).await?;
        Ok(rows.pop())
    }

    async fn find_all(
        &mut self,
        filter: &Filter,
        order: &SortOrder,
        limit: Option<u64>,
        _depth: u8,
    ) -> Result<Vec<Row>> {
        self.ensure_open()?;
        let rows = self.rows.read().await;
        let mut found: Vec<Row> = rows
            .values()
            .filter(|row| matches(row, filter))
            .cloned()
            .collect();
        found.sort_by(|a, b| compare(a, b, order));
        if let Some(limit) = limit {
            found.truncate(limit as usize);
        }
        Ok(found)
    }

    async fn aggregate(&mut self, filter: &Filter, aggregate: Aggregate) -> Result<Option<i64>> {
        self.ensure_open()?;
        let rows = self.rows.read().await;
        let positions = rows
            .values()
            .filter(|row| matches(row, filter))
            .map(|row| row.position);
        Ok(match aggregate {
            Aggregate::Min => positions.min(),
            Aggregate::Max => positions.max(),
        })
    }

    async fn update_position(&mut self, key: &RowKey, position: i64) -> Result<()> {
        self.ensure_open()?;
        if *self.faults.fail_on_update.read().await {
            return Err(StorageError::Injected("update_position"));
        }
        let mut rows = self.rows.write().await;
        if let Some(row) = rows.get_mut(key) {
            self.undo.push((key.clone(), row.position));
            row.position = position;
        }
        Ok(())
    }

    async fn shift_positions(&mut self, filter: &Filter, delta: i64) -> Result<u64> {
        self.ensure_open()?;
        if *self.faults.fail_on_shift.read().await {
            return Err(StorageError::Injected("shift_positions"));
        }
        let mut rows = self.rows.write().await;
        if let Some(row) = rows
            .values()
            .filter(|row| matches(row, filter))
            .find(|row| row.position.checked_add(delta).is_none())
        {
            return Err(StorageError::PositionOverflow {
                key: row.key.clone(),
                delta,
            });
        }
        let mut changed = 0;
        for row in rows.values_mut().filter(|row| matches(row, filter)) {
            self.undo.push((row.key.clone(), row.position));
            row.position += delta;
            changed += 1;
        }
        Ok(changed)
    }

    async fn commit(mut self: Box<Self>) -> Result<()> {
        self.ensure_open()?;
        debug!(writes = self.undo.len(), "Committed in-memory unit of work");
        self.undo.clear();
        self.finished = true;
        Ok(())
    }

    async fn rollback(mut self: Box<Self>) -> Result<()> {
        self.ensure_open()?;
        let rows = self.rows.clone();
        let mut rows = rows.write().await;
        self.restore(&mut rows);
        self.finished = true;
        Ok(())
    }
}

impl Drop for InMemoryUnitOfWork {
    fn drop(&mut self) {
        if self.finished || self.undo.is_empty() {
            return;
        }
        let rows = self.rows.clone();
        match rows.try_write() {
            Ok(mut rows) => self.restore(&mut rows),
            Err(_) => warn!(
                writes = self.undo.len(),
                "Unit of work dropped while table busy; writes not undone"
            ),
        };
    }
}
