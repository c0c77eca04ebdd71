// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

//! Forward-only cursors over the batches of a chunk store.
//!
//! A cursor starts before the first row. After every [`ReadCursor::forward`],
//! [`ReadCursor::get`] hands out an accessor for one column at the current
//! row. Accessors are not snapshots: they borrow the cursor and must be
//! re-acquired after the cursor moves.

use std::sync::Arc;

use smallvec::SmallVec;
use tracing::{debug, warn};

use super::chunk::{Chunk, ChunkBatch};
use super::schema::{ColumnAccess, TableSchema};
use super::store::{TableChunkReadStore, TableChunkStore};
use super::{StorageError, StorageResult, TracedStorageError};
use crate::types::{DataCell, RowKey};

/// The physical columns a read cursor keeps live accessors for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSelection {
    selected: Vec<usize>,
}

impl ColumnSelection {
    pub fn all(num_columns: usize) -> Self {
        Self {
            selected: (0..num_columns).collect(),
        }
    }

    pub fn new(columns: impl IntoIterator<Item = usize>) -> Self {
        let mut selected: Vec<usize> = columns.into_iter().collect();
        selected.sort_unstable();
        selected.dedup();
        Self { selected }
    }

    pub fn is_selected(&self, column: usize) -> bool {
        self.selected.binary_search(&column).is_ok()
    }

    pub fn columns(&self) -> &[usize] {
        &self.selected
    }
}

/// Position of a read cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Position {
    BeforeFirst,
    At { batch: usize, row: usize },
}

pub struct ReadCursor {
    store: Arc<dyn TableChunkReadStore>,
    /// Physical column index of every live slot.
    selected: SmallVec<[usize; 8]>,
    /// Maps a physical column to its slot, `None` if not selected.
    slot_of: Vec<Option<usize>>,
    accesses: SmallVec<[Arc<dyn ColumnAccess>; 8]>,
    /// Chunks of the current batch, one per slot.
    chunks: SmallVec<[Arc<Chunk>; 8]>,
    position: Position,
    closed: bool,
}

impl ReadCursor {
    pub fn new(schema: &TableSchema, store: Arc<dyn TableChunkReadStore>) -> StorageResult<Self> {
        Self::with_selection(schema, store, &ColumnSelection::all(schema.num_columns()))
    }

    pub fn with_selection(
        schema: &TableSchema,
        store: Arc<dyn TableChunkReadStore>,
        selection: &ColumnSelection,
    ) -> StorageResult<Self> {
        let mut slot_of = vec![None; schema.num_columns()];
        let mut selected = SmallVec::new();
        let mut accesses = SmallVec::new();
        for &column in selection.columns() {
            if column >= schema.num_columns() {
                return Err(StorageError::InvalidColumn(column).into());
            }
            slot_of[column] = Some(selected.len());
            selected.push(column);
            accesses.push(schema.column_spec(column).create_access());
        }
        Ok(Self {
            store,
            selected,
            slot_of,
            accesses,
            chunks: SmallVec::new(),
            position: Position::BeforeFirst,
            closed: false,
        })
    }

    /// First batch at or after `batch` that has rows.
    fn next_non_empty_batch(&self, batch: usize) -> Option<usize> {
        (batch..self.store.num_batches()).find(|&b| self.store.batch_row_count(b) > 0)
    }

    pub fn can_forward(&self) -> bool {
        if self.closed {
            return false;
        }
        match self.position {
            Position::BeforeFirst => self.next_non_empty_batch(0).is_some(),
            Position::At { batch, row } => {
                row + 1 < self.store.batch_row_count(batch)
                    || self.next_non_empty_batch(batch + 1).is_some()
            }
        }
    }

    /// Move to the next row. Moving past the last row is an error.
    pub fn forward(&mut self) -> StorageResult<()> {
        if self.closed {
            return Err(StorageError::Closed("read cursor").into());
        }
        let next_batch = match self.position {
            Position::At { batch, row } if row + 1 < self.store.batch_row_count(batch) => {
                self.position = Position::At {
                    batch,
                    row: row + 1,
                };
                return Ok(());
            }
            Position::At { batch, .. } => self.next_non_empty_batch(batch + 1),
            Position::BeforeFirst => self.next_non_empty_batch(0),
        };
        let batch = next_batch
            .ok_or_else(|| TracedStorageError::illegal_state("cursor forwarded past the last row"))?;
        self.chunks.clear();
        for &column in &self.selected {
            self.chunks.push(self.store.read_chunk(batch, column)?);
        }
        self.position = Position::At { batch, row: 0 };
        Ok(())
    }

    /// Accessor for a physical column at the current row.
    pub fn get(&self, column: usize) -> StorageResult<ReadValue<'_>> {
        let Position::At { row, .. } = self.position else {
            return Err(TracedStorageError::illegal_state("cursor is not positioned on a row"));
        };
        let slot = self
            .slot_of
            .get(column)
            .ok_or(StorageError::InvalidColumn(column))?
            .ok_or(StorageError::ColumnNotSelected(column))?;
        Ok(ReadValue {
            chunk: &self.chunks[slot],
            access: &self.accesses[slot],
            index: row,
        })
    }

    pub fn is_selected(&self, column: usize) -> bool {
        matches!(self.slot_of.get(column), Some(Some(_)))
    }

    /// Current `(batch, row)`, `None` before the first row.
    pub fn position(&self) -> Option<(usize, usize)> {
        match self.position {
            Position::BeforeFirst => None,
            Position::At { batch, row } => Some((batch, row)),
        }
    }

    /// Release the chunks held by the cursor. Safe to call more than once.
    pub fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.chunks.clear();
        }
    }
}

impl Drop for ReadCursor {
    fn drop(&mut self) {
        self.close();
    }
}

/// Read accessor for one column at the current row of a [`ReadCursor`].
pub struct ReadValue<'a> {
    chunk: &'a Arc<Chunk>,
    access: &'a Arc<dyn ColumnAccess>,
    index: usize,
}

impl<'a> ReadValue<'a> {
    /// Detach the chunk of the current batch from the cursor.
    pub fn source(&self) -> CellSource {
        CellSource {
            chunk: self.chunk.clone(),
            access: self.access.clone(),
        }
    }

    pub fn is_missing(&self) -> bool {
        self.chunk.is_missing(self.index)
    }

    pub fn get_int(&self) -> StorageResult<i32> {
        self.chunk.get_int(self.index)
    }

    pub fn get_long(&self) -> StorageResult<i64> {
        self.chunk.get_long(self.index)
    }

    pub fn get_double(&self) -> StorageResult<f64> {
        self.chunk.get_double(self.index)
    }

    pub fn get_boolean(&self) -> StorageResult<bool> {
        self.chunk.get_boolean(self.index)
    }

    pub fn get_string(&self) -> StorageResult<&'a str> {
        self.chunk.get_string(self.index)
    }

    pub fn get_bytes(&self) -> StorageResult<&'a [u8]> {
        self.chunk.get_bytes(self.index)
    }

    pub fn get_row_key(&self) -> StorageResult<RowKey> {
        Ok(RowKey::new(self.chunk.get_string(self.index)?))
    }

    /// Decode the cell through the column's accessor.
    pub fn get_data_cell(&self) -> StorageResult<DataCell> {
        self.access.read_cell(self.chunk, self.index)
    }
}

/// One column of one batch together with its accessor. Unlike a
/// [`ReadValue`], it stays valid after the cursor moves on.
#[derive(Clone)]
pub struct CellSource {
    chunk: Arc<Chunk>,
    access: Arc<dyn ColumnAccess>,
}

impl CellSource {
    pub fn read_cell(&self, index: usize) -> StorageResult<DataCell> {
        self.access.read_cell(&self.chunk, index)
    }
}

pub struct WriteCursor {
    store: Arc<dyn TableChunkStore>,
    schema: TableSchema,
    accesses: Vec<Arc<dyn ColumnAccess>>,
    chunk_size: usize,
    /// Chunks of the batch being filled.
    chunks: Option<Vec<Chunk>>,
    /// Rows of the current batch, including the current row.
    rows_in_batch: usize,
    closed: bool,
}

impl WriteCursor {
    pub fn new(schema: &TableSchema, store: Arc<dyn TableChunkStore>, chunk_size: usize) -> Self {
        assert!(chunk_size > 0, "chunk size must be positive");
        Self {
            store,
            schema: schema.clone(),
            accesses: (0..schema.num_columns())
                .map(|i| schema.column_spec(i).create_access())
                .collect(),
            chunk_size,
            chunks: None,
            rows_in_batch: 0,
            closed: false,
        }
    }

    fn flush(&mut self) -> StorageResult<()> {
        let Some(mut chunks) = self.chunks.take() else {
            return Ok(());
        };
        if self.rows_in_batch == 0 {
            return Ok(());
        }
        for chunk in &mut chunks {
            chunk.truncate(self.rows_in_batch);
        }
        debug!(rows = self.rows_in_batch, "flushing batch");
        let row_count = std::mem::take(&mut self.rows_in_batch);
        self.store.write_batch(ChunkBatch::new(row_count, chunks))
    }

    /// Move to a new row. A full batch is handed to the store first.
    pub fn forward(&mut self) -> StorageResult<()> {
        if self.closed {
            return Err(StorageError::Closed("write cursor").into());
        }
        if self.rows_in_batch == self.chunk_size {
            self.flush()?;
        }
        if self.chunks.is_none() {
            self.chunks = Some(
                self.schema
                    .chunk_specs()
                    .iter()
                    .map(|spec| spec.create_chunk(self.chunk_size))
                    .collect(),
            );
        }
        self.rows_in_batch += 1;
        Ok(())
    }

    /// Accessor for a physical column at the current row.
    pub fn get(&mut self, column: usize) -> StorageResult<WriteValue<'_>> {
        let index = self.rows_in_batch.checked_sub(1);
        let (Some(chunks), Some(index)) = (self.chunks.as_mut(), index) else {
            return Err(TracedStorageError::illegal_state("cursor is not positioned on a row"));
        };
        let chunk = chunks
            .get_mut(column)
            .ok_or(StorageError::InvalidColumn(column))?;
        Ok(WriteValue {
            chunk,
            access: self.accesses[column].as_ref(),
            index,
        })
    }

    /// Drop the current row, leaving the cursor before it. Used when writing
    /// the row failed halfway.
    pub fn rollback(&mut self) {
        let Some(chunks) = self.chunks.as_mut() else {
            return;
        };
        let Some(index) = self.rows_in_batch.checked_sub(1) else {
            return;
        };
        for chunk in chunks.iter_mut() {
            chunk.reset(index);
        }
        self.rows_in_batch = index;
    }

    /// Hand the trailing partial batch to the store. Only the first call has
    /// an effect.
    pub fn close(&mut self) -> StorageResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.flush()
    }
}

impl Drop for WriteCursor {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("failed to close write cursor: {}", e);
        }
    }
}

/// Write accessor for one column at the current row of a [`WriteCursor`].
pub struct WriteValue<'a> {
    chunk: &'a mut Chunk,
    access: &'a dyn ColumnAccess,
    index: usize,
}

impl<'a> WriteValue<'a> {
    pub fn set_missing(&mut self) {
        self.chunk.set_missing(self.index)
    }

    pub fn set_int(&mut self, value: i32) -> StorageResult<()> {
        self.chunk.set_int(self.index, value)
    }

    pub fn set_long(&mut self, value: i64) -> StorageResult<()> {
        self.chunk.set_long(self.index, value)
    }

    pub fn set_double(&mut self, value: f64) -> StorageResult<()> {
        self.chunk.set_double(self.index, value)
    }

    pub fn set_boolean(&mut self, value: bool) -> StorageResult<()> {
        self.chunk.set_boolean(self.index, value)
    }

    pub fn set_string(&mut self, value: &str) -> StorageResult<()> {
        self.chunk.set_string(self.index, value)
    }

    pub fn set_bytes(&mut self, value: &[u8]) -> StorageResult<()> {
        self.chunk.set_bytes(self.index, value)
    }

    pub fn set_row_key(&mut self, key: &RowKey) -> StorageResult<()> {
        self.chunk.set_string(self.index, key.as_str())
    }

    /// Encode the cell through the column's accessor.
    pub fn set_data_cell(&mut self, cell: &DataCell) -> StorageResult<()> {
        self.access.write_cell(self.chunk, self.index, cell)
    }
}
