// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

//! Logical, row-oriented view of a table: data types, column descriptions,
//! cells and rows.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

mod cell;
mod row;

pub use self::cell::*;
pub use self::row::*;

/// Logical type of a column.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Int,
    Long,
    Double,
    Boolean,
    String,
    /// A cell class without a built-in columnar mapping.
    Extension(Arc<str>),
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int => write!(f, "INTEGER"),
            Self::Long => write!(f, "LONG"),
            Self::Double => write!(f, "DOUBLE"),
            Self::Boolean => write!(f, "BOOLEAN"),
            Self::String => write!(f, "STRING"),
            Self::Extension(name) => write!(f, "{name}"),
        }
    }
}

/// Name and type of one data column.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnDesc {
    pub name: String,
    pub data_type: DataType,
}

impl ColumnDesc {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}

/// Ordered data columns of a table. The row key is not part of the spec.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableSpec {
    columns: Vec<ColumnDesc>,
}

impl TableSpec {
    pub fn new(columns: Vec<ColumnDesc>) -> Self {
        Self { columns }
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn column(&self, index: usize) -> &ColumnDesc {
        &self.columns[index]
    }

    pub fn columns(&self) -> &[ColumnDesc] {
        &self.columns
    }
}

impl FromIterator<ColumnDesc> for TableSpec {
    fn from_iter<I: IntoIterator<Item = ColumnDesc>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl fmt::Display for TableSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, column) in self.columns.iter().enumerate() {
            if i != 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", column.name, column.data_type)?;
        }
        Ok(())
    }
}
