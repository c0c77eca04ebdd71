// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

//! Row iterators over a fast table.
//!
//! The variant is picked once from the table's row key flag and the column
//! filter. Iterators own their cursor and close it when they are closed or
//! dropped.

use std::sync::Arc;

use crate::storage::{CellSource, ReadCursor, StorageError, StorageResult, TracedStorageError};
use crate::types::{DataCell, DataRow, RowKey};

/// Cell sources of one batch, indexed by data column. Columns left out of the
/// selection have no source.
struct BatchView {
    batch: usize,
    sources: Vec<Option<CellSource>>,
}

#[derive(Clone)]
enum RowCells {
    Loaded { view: Arc<BatchView>, row: usize },
    Unmaterialized { num_cells: usize },
}

/// A row handed out by a [`TableRowIterator`]. Cells are decoded on access.
#[derive(Clone)]
pub struct FastTableRow {
    key: Option<RowKey>,
    cells: RowCells,
}

impl std::fmt::Debug for FastTableRow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FastTableRow")
            .field("key", &self.key)
            .field("num_cells", &self.num_cells())
            .finish()
    }
}

impl DataRow for FastTableRow {
    fn num_cells(&self) -> usize {
        match &self.cells {
            RowCells::Loaded { view, .. } => view.sources.len(),
            RowCells::Unmaterialized { num_cells } => *num_cells,
        }
    }

    fn try_key(&self) -> Option<&RowKey> {
        self.key.as_ref()
    }

    fn cell(&self, index: usize) -> StorageResult<DataCell> {
        if index >= self.num_cells() {
            return Err(StorageError::InvalidColumn(index).into());
        }
        match &self.cells {
            RowCells::Loaded { view, row } => match &view.sources[index] {
                Some(source) => source.read_cell(*row),
                None => Ok(DataCell::Unmaterialized),
            },
            RowCells::Unmaterialized { .. } => Ok(DataCell::Unmaterialized),
        }
    }
}

/// Reads rows through a cursor over the selected columns.
pub struct CursorRowIterator {
    cursor: ReadCursor,
    has_key: bool,
    /// Physical column of every data column, `None` if not selected.
    columns: Vec<Option<usize>>,
    view: Option<Arc<BatchView>>,
}

impl CursorRowIterator {
    pub(super) fn new(cursor: ReadCursor, has_key: bool, columns: Vec<Option<usize>>) -> Self {
        Self {
            cursor,
            has_key,
            columns,
            view: None,
        }
    }

    fn next_row(&mut self) -> StorageResult<FastTableRow> {
        self.cursor.forward()?;
        let (batch, row) = self
            .cursor
            .position()
            .ok_or_else(|| TracedStorageError::illegal_state("cursor is not positioned on a row"))?;
        let key = match self.has_key {
            true => Some(self.cursor.get(0)?.get_row_key()?),
            false => None,
        };
        let cached = self.view.as_ref().filter(|view| view.batch == batch).cloned();
        let view = match cached {
            Some(view) => view,
            None => {
                let sources = self
                    .columns
                    .iter()
                    .map(|column| {
                        column
                            .map(|c| self.cursor.get(c).map(|value| value.source()))
                            .transpose()
                    })
                    .collect::<StorageResult<_>>()?;
                let view = Arc::new(BatchView { batch, sources });
                self.view = Some(view.clone());
                view
            }
        };
        Ok(FastTableRow {
            key,
            cells: RowCells::Loaded { view, row },
        })
    }

    fn close(&mut self) {
        self.view = None;
        self.cursor.close();
    }
}

/// Reads only the row keys, every cell is unmaterialized.
pub struct EmptyRowIterator {
    cursor: ReadCursor,
    num_cells: usize,
}

impl EmptyRowIterator {
    pub(super) fn new(cursor: ReadCursor, num_cells: usize) -> Self {
        Self { cursor, num_cells }
    }

    fn next_row(&mut self) -> StorageResult<FastTableRow> {
        self.cursor.forward()?;
        Ok(FastTableRow {
            key: Some(self.cursor.get(0)?.get_row_key()?),
            cells: RowCells::Unmaterialized {
                num_cells: self.num_cells,
            },
        })
    }
}

/// Returns the same unmaterialized row `size` times without touching the
/// store.
pub struct EmptyRowIteratorNoKey {
    remaining: usize,
    row: FastTableRow,
}

impl EmptyRowIteratorNoKey {
    pub(super) fn new(size: usize, num_cells: usize) -> Self {
        Self {
            remaining: size,
            row: FastTableRow {
                key: None,
                cells: RowCells::Unmaterialized { num_cells },
            },
        }
    }
}

/// Iterator over the rows of a fast table.
pub enum TableRowIterator {
    /// All data columns are materialized.
    Full(CursorRowIterator),
    /// A subset of the data columns is materialized.
    Partial(CursorRowIterator),
    /// No data column is materialized, row keys are read.
    Empty(EmptyRowIterator),
    /// No data column is materialized and the table has no row key.
    EmptyNoKey(EmptyRowIteratorNoKey),
}

impl TableRowIterator {
    pub fn has_next(&self) -> bool {
        match self {
            Self::Full(it) | Self::Partial(it) => it.cursor.can_forward(),
            Self::Empty(it) => it.cursor.can_forward(),
            Self::EmptyNoKey(it) => it.remaining > 0,
        }
    }

    /// Release the cursor. Safe to call more than once.
    pub fn close(&mut self) {
        match self {
            Self::Full(it) | Self::Partial(it) => it.close(),
            Self::Empty(it) => it.cursor.close(),
            Self::EmptyNoKey(it) => it.remaining = 0,
        }
    }
}

impl Iterator for TableRowIterator {
    type Item = StorageResult<FastTableRow>;

    fn next(&mut self) -> Option<Self::Item> {
        if !self.has_next() {
            return None;
        }
        Some(match self {
            Self::Full(it) | Self::Partial(it) => it.next_row(),
            Self::Empty(it) => it.next_row(),
            Self::EmptyNoKey(it) => {
                it.remaining -= 1;
                Ok(it.row.clone())
            }
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match self {
            Self::EmptyNoKey(it) => (it.remaining, Some(it.remaining)),
            _ => (0, None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_no_key_reuses_row() {
        let mut it = TableRowIterator::EmptyNoKey(EmptyRowIteratorNoKey::new(3, 2));
        assert_eq!(it.size_hint(), (3, Some(3)));
        let rows: Vec<_> = it.by_ref().map(|row| row.unwrap()).collect();
        assert_eq!(rows.len(), 3);
        for row in rows {
            assert!(row.try_key().is_none());
            assert_eq!(row.cells().unwrap(), vec![DataCell::Unmaterialized; 2]);
            assert!(row.cell(2).is_err());
        }
        assert!(!it.has_next());
        assert!(it.next().is_none());
    }

    #[test]
    fn test_close_empty_no_key() {
        let mut it = TableRowIterator::EmptyNoKey(EmptyRowIteratorNoKey::new(3, 0));
        it.next().unwrap().unwrap();
        it.close();
        it.close();
        assert!(it.next().is_none());
    }
}
