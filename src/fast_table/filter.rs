// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

use std::collections::BTreeSet;

use crate::storage::{StorageError, StorageResult};

/// Restricts which data columns an iterator materializes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableFilter {
    materialize_columns: Option<BTreeSet<usize>>,
}

impl TableFilter {
    /// A filter materializing every column.
    pub fn all() -> Self {
        Self::default()
    }

    /// Only materialize the given data columns.
    pub fn materialize_columns(columns: impl IntoIterator<Item = usize>) -> Self {
        Self {
            materialize_columns: Some(columns.into_iter().collect()),
        }
    }

    /// The selected data columns, `None` if all columns are materialized.
    pub fn columns(&self) -> Option<&BTreeSet<usize>> {
        self.materialize_columns.as_ref()
    }

    /// Check the selection against a table with `num_columns` data columns.
    pub fn validate(&self, num_columns: usize) -> StorageResult<()> {
        if let Some(&column) = self
            .materialize_columns
            .iter()
            .flatten()
            .find(|&&c| c >= num_columns)
        {
            return Err(StorageError::InvalidColumn(column).into());
        }
        Ok(())
    }
}
