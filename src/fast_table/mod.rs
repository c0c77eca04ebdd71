// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

//! Fast tables: immutable row tables backed by a columnar chunk store.
//!
//! A table is either finalized by a writer, in which case its data still sits
//! in the write store, or loaded from a saved record, in which case the read
//! store is opened on first access.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::storage::{
    ChunkStoreFactoryRef, ColumnSelection, ReadCursor, StorageError, StorageResult,
    TableChunkReadStore, TableChunkStore, TableSchema,
};
use crate::types::TableSpec;

mod env;
mod filter;
mod iterator;
mod lazy;
mod persist;
mod repository;

pub use self::env::*;
pub use self::filter::*;
pub use self::iterator::*;
use self::lazy::LazyStore;
pub use self::persist::*;
pub use self::repository::*;

enum TableBackend {
    /// Finalized by a writer.
    Tmp {
        factory: ChunkStoreFactoryRef,
        store: Arc<dyn TableChunkStore>,
        read_store: Arc<dyn TableChunkReadStore>,
    },
    /// Loaded from a saved record.
    Lazy(LazyStore),
}

pub struct FastTable {
    table_id: i64,
    spec: TableSpec,
    mapping: TableSchemaMappingRef,
    size: usize,
    backend: TableBackend,
    cleared: AtomicBool,
}

impl std::fmt::Debug for FastTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FastTable")
            .field("table_id", &self.table_id)
            .field("spec", &self.spec)
            .field("size", &self.size)
            .field("lazy", &self.is_lazy())
            .finish()
    }
}

impl FastTable {
    /// A table over the batches of a closed write store.
    pub fn new_tmp(
        table_id: i64,
        spec: TableSpec,
        mapping: TableSchemaMappingRef,
        factory: ChunkStoreFactoryRef,
        store: Arc<dyn TableChunkStore>,
        size: usize,
    ) -> Self {
        let read_store = store.clone().into_read_store();
        Self {
            table_id,
            spec,
            mapping,
            size,
            backend: TableBackend::Tmp {
                factory,
                store,
                read_store,
            },
            cleared: AtomicBool::new(false),
        }
    }

    fn new_lazy(
        table_id: i64,
        spec: TableSpec,
        mapping: TableSchemaMappingRef,
        store: LazyStore,
        size: usize,
    ) -> Self {
        Self {
            table_id,
            spec,
            mapping,
            size,
            backend: TableBackend::Lazy(store),
            cleared: AtomicBool::new(false),
        }
    }

    pub fn table_id(&self) -> i64 {
        self.table_id
    }

    /// Logical columns, without the row key.
    pub fn spec(&self) -> &TableSpec {
        &self.spec
    }

    /// Physical columns, including the row key if present.
    pub fn schema(&self) -> &TableSchema {
        self.mapping.schema()
    }

    pub fn mapping(&self) -> &TableSchemaMappingRef {
        &self.mapping
    }

    pub fn is_row_key(&self) -> bool {
        self.mapping.is_row_key()
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_lazy(&self) -> bool {
        matches!(self.backend, TableBackend::Lazy(_))
    }

    /// Whether the backing store is open. A finalized table always is.
    pub fn is_open(&self) -> bool {
        match &self.backend {
            TableBackend::Tmp { .. } => !self.cleared.load(Ordering::Acquire),
            TableBackend::Lazy(lazy) => lazy.is_open(),
        }
    }

    /// Open the backing store if that has not happened yet.
    pub fn ensure_open(&self) -> StorageResult<()> {
        self.store().map(|_| ())
    }

    /// The backing store, opening it if needed.
    pub fn store(&self) -> StorageResult<Arc<dyn TableChunkReadStore>> {
        match &self.backend {
            TableBackend::Tmp { read_store, .. } => {
                if self.cleared.load(Ordering::Acquire) {
                    return Err(StorageError::Closed("fast table").into());
                }
                Ok(read_store.clone())
            }
            TableBackend::Lazy(lazy) => lazy.get_or_open(),
        }
    }

    /// Offset of the first data column in the physical schema.
    fn data_column_offset(&self) -> usize {
        self.is_row_key() as usize
    }

    pub fn iterator(&self) -> StorageResult<TableRowIterator> {
        self.iterator_with_filter(&TableFilter::all())
    }

    /// Iterate the rows, materializing only the columns selected by the filter.
    pub fn iterator_with_filter(&self, filter: &TableFilter) -> StorageResult<TableRowIterator> {
        let num_columns = self.spec.num_columns();
        filter.validate(num_columns)?;
        let offset = self.data_column_offset();
        let has_key = self.is_row_key();
        let selected = filter.columns();

        match selected {
            Some(columns) if columns.is_empty() => {
                if !has_key {
                    return Ok(TableRowIterator::EmptyNoKey(EmptyRowIteratorNoKey::new(
                        self.size,
                        num_columns,
                    )));
                }
                let cursor = ReadCursor::with_selection(
                    self.schema(),
                    self.store()?,
                    &ColumnSelection::new([0]),
                )?;
                Ok(TableRowIterator::Empty(EmptyRowIterator::new(
                    cursor,
                    num_columns,
                )))
            }
            Some(columns) if columns.len() < num_columns => {
                let physical = columns.iter().map(|c| c + offset);
                let selection = match has_key {
                    true => ColumnSelection::new(std::iter::once(0).chain(physical)),
                    false => ColumnSelection::new(physical),
                };
                let cursor = ReadCursor::with_selection(self.schema(), self.store()?, &selection)?;
                let mapping = (0..num_columns)
                    .map(|c| columns.contains(&c).then_some(c + offset))
                    .collect();
                debug!(table_id = self.table_id, selected = ?columns, "partial iteration");
                Ok(TableRowIterator::Partial(CursorRowIterator::new(
                    cursor, has_key, mapping,
                )))
            }
            _ => {
                let cursor = ReadCursor::new(self.schema(), self.store()?)?;
                let mapping = (0..num_columns).map(|c| Some(c + offset)).collect();
                Ok(TableRowIterator::Full(CursorRowIterator::new(
                    cursor, has_key, mapping,
                )))
            }
        }
    }

    /// Release the backing store. Only the first call has an effect, errors
    /// are logged and dropped.
    pub fn clear(&self) {
        if self.cleared.swap(true, Ordering::AcqRel) {
            return;
        }
        let result = match &self.backend {
            TableBackend::Tmp { store, .. } => store.close(),
            TableBackend::Lazy(lazy) => lazy.clear(),
        };
        if let Err(e) = result {
            warn!(table_id = self.table_id, "failed to clear table: {}", e);
        }
    }
}
