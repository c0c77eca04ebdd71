// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

use std::fmt;

use super::DataCell;
use crate::storage::{StorageError, StorageResult};

/// Unique identifier of a row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RowKey(String);

impl RowKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for RowKey {
    fn from(key: &str) -> Self {
        Self(key.into())
    }
}

impl From<String> for RowKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

/// An ordered sequence of cells, optionally identified by a key.
pub trait DataRow {
    fn num_cells(&self) -> usize;

    /// The row key, or `None` if the table has no row key.
    fn try_key(&self) -> Option<&RowKey>;

    /// The row key.
    ///
    /// # Panics
    ///
    /// Panics if the table has no row key. Check the table's row key flag first.
    fn key(&self) -> &RowKey {
        self.try_key()
            .unwrap_or_else(|| panic!("row key requested, but not part of table"))
    }

    /// The cell at `index`. Reading a column left out of a partial read
    /// yields [`DataCell::Unmaterialized`].
    fn cell(&self, index: usize) -> StorageResult<DataCell>;

    fn cells(&self) -> StorageResult<Vec<DataCell>> {
        (0..self.num_cells()).map(|i| self.cell(i)).collect()
    }
}

/// A row owning its cells.
#[derive(Debug, Clone, PartialEq)]
pub struct DefaultRow {
    key: Option<RowKey>,
    cells: Vec<DataCell>,
}

impl DefaultRow {
    pub fn new(key: impl Into<RowKey>, cells: Vec<DataCell>) -> Self {
        Self {
            key: Some(key.into()),
            cells,
        }
    }

    pub fn without_key(cells: Vec<DataCell>) -> Self {
        Self { key: None, cells }
    }
}

impl DataRow for DefaultRow {
    fn num_cells(&self) -> usize {
        self.cells.len()
    }

    fn try_key(&self) -> Option<&RowKey> {
        self.key.as_ref()
    }

    fn cell(&self, index: usize) -> StorageResult<DataCell> {
        self.cells
            .get(index)
            .cloned()
            .ok_or_else(|| StorageError::InvalidColumn(index).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_row() {
        let row = DefaultRow::new("r1", vec![1.into(), "a".into()]);
        assert_eq!(row.key().as_str(), "r1");
        assert_eq!(row.cells().unwrap(), vec![DataCell::Int(1), DataCell::from("a")]);
        assert!(row.cell(2).is_err());
    }

    #[test]
    #[should_panic(expected = "row key requested, but not part of table")]
    fn test_key_of_keyless_row() {
        DefaultRow::without_key(vec![]).key();
    }
}
