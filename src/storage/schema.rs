// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

use std::fmt::Debug;
use std::sync::Arc;

use super::chunk::{Chunk, ChunkSpec};
use super::{StorageResult, TracedStorageError};
use crate::types::DataCell;

/// Converts between the cells of one column and its chunk.
pub trait ColumnAccess: Send + Sync {
    fn read_cell(&self, chunk: &Chunk, index: usize) -> StorageResult<DataCell>;

    fn write_cell(&self, chunk: &mut Chunk, index: usize, cell: &DataCell) -> StorageResult<()>;
}

/// Physical description of one column.
pub trait ColumnSpec: Send + Sync + Debug {
    /// The chunk type backing this column.
    fn chunk_spec(&self) -> ChunkSpec;

    /// Create the accessor a cursor uses for this column.
    fn create_access(&self) -> Arc<dyn ColumnAccess>;
}

pub type ColumnSpecRef = Arc<dyn ColumnSpec>;

/// Physical column layout of a table. If the table has a row key, it is the
/// first column.
#[derive(Debug, Clone)]
pub struct TableSchema {
    columns: Vec<ColumnSpecRef>,
}

impl TableSchema {
    pub fn new(columns: Vec<ColumnSpecRef>) -> Self {
        Self { columns }
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn column_spec(&self, index: usize) -> &ColumnSpecRef {
        &self.columns[index]
    }

    pub fn chunk_specs(&self) -> Vec<ChunkSpec> {
        self.columns.iter().map(|c| c.chunk_spec()).collect()
    }
}

/// The row key column, stored as UTF-8 strings.
#[derive(Debug, Default, Clone, Copy)]
pub struct RowKeyColumnSpec;

impl ColumnSpec for RowKeyColumnSpec {
    fn chunk_spec(&self) -> ChunkSpec {
        ChunkSpec::RowKey
    }

    fn create_access(&self) -> Arc<dyn ColumnAccess> {
        Arc::new(RowKeyColumnSpec)
    }
}

impl ColumnAccess for RowKeyColumnSpec {
    fn read_cell(&self, chunk: &Chunk, index: usize) -> StorageResult<DataCell> {
        Ok(DataCell::String(chunk.get_string(index)?.to_owned()))
    }

    fn write_cell(&self, chunk: &mut Chunk, index: usize, cell: &DataCell) -> StorageResult<()> {
        match cell {
            DataCell::String(key) => chunk.set_string(index, key),
            other => Err(TracedStorageError::illegal_state(format!(
                "row key must be a string, found {other:?}"
            ))),
        }
    }
}
