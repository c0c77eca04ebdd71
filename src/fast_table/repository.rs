// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use super::FastTable;

/// Tables of one workflow, by table id.
#[derive(Debug, Default)]
pub struct TableRepository {
    tables: RwLock<HashMap<i64, Arc<FastTable>>>,
}

impl TableRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a table, returning the table previously registered under its id.
    pub fn put(&self, table: Arc<FastTable>) -> Option<Arc<FastTable>> {
        self.tables.write().insert(table.table_id(), table)
    }

    pub fn remove(&self, table_id: i64) -> Option<Arc<FastTable>> {
        self.tables.write().remove(&table_id)
    }

    pub fn get(&self, table_id: i64) -> Option<Arc<FastTable>> {
        self.tables.read().get(&table_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.tables.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FastTable {
    pub fn put_into_repository(self: &Arc<Self>, repository: &TableRepository) {
        repository.put(self.clone());
    }

    /// Remove this table from the repository. Returns whether it was there.
    pub fn remove_from_repository(&self, repository: &TableRepository) -> bool {
        repository.remove(self.table_id).is_some()
    }
}
