// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;

/// A cell of a cell class that has no built-in representation. The payload
/// is opaque and handled by the serializer registered under `class_name`.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtensionCell {
    pub class_name: Arc<str>,
    /// Numeric view of the cell, if it has one.
    pub numeric: Option<f64>,
    pub payload: Bytes,
}

impl ExtensionCell {
    pub fn new(class_name: impl Into<Arc<str>>, numeric: Option<f64>, payload: Bytes) -> Self {
        Self {
            class_name: class_name.into(),
            numeric,
            payload,
        }
    }
}

/// One value of a row.
#[derive(Debug, Clone, PartialEq)]
pub enum DataCell {
    Int(i32),
    Long(i64),
    Double(f64),
    Boolean(bool),
    String(String),
    /// A missing value with an optional cause.
    Missing(Option<String>),
    /// A column left out of a partial read.
    Unmaterialized,
    Extension(ExtensionCell),
}

impl DataCell {
    /// The canonical missing cell without a cause.
    pub const MISSING: DataCell = DataCell::Missing(None);

    pub fn missing_with_cause(cause: impl Into<String>) -> Self {
        Self::Missing(Some(cause.into()))
    }

    /// Class name used by the serializer registry. Missing and unmaterialized
    /// cells have no class.
    pub fn class_name(&self) -> Option<&str> {
        match self {
            Self::Int(_) => Some("int"),
            Self::Long(_) => Some("long"),
            Self::Double(_) => Some("double"),
            Self::Boolean(_) => Some("boolean"),
            Self::String(_) => Some("string"),
            Self::Extension(cell) => Some(&cell.class_name),
            Self::Missing(_) | Self::Unmaterialized => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Self::Missing(_))
    }

    pub fn is_unmaterialized(&self) -> bool {
        matches!(self, Self::Unmaterialized)
    }

    pub fn numeric_value(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::Long(v) => Some(*v as f64),
            Self::Double(v) => Some(*v),
            Self::Extension(cell) => cell.numeric,
            _ => None,
        }
    }

    pub fn long_value(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v as i64),
            Self::Long(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for DataCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Long(v) => write!(f, "{v}"),
            Self::Double(v) => write!(f, "{v}"),
            Self::Boolean(v) => write!(f, "{v}"),
            Self::String(v) => write!(f, "{v}"),
            Self::Missing(None) => write!(f, "MISSING"),
            Self::Missing(Some(cause)) => write!(f, "MISSING({cause})"),
            Self::Unmaterialized => write!(f, "?"),
            Self::Extension(cell) => match cell.numeric {
                Some(v) => write!(f, "{}({v})", cell.class_name),
                None => write!(f, "{}[{} bytes]", cell.class_name, cell.payload.len()),
            },
        }
    }
}

impl From<i32> for DataCell {
    fn from(v: i32) -> Self {
        Self::Int(v)
    }
}

impl From<i64> for DataCell {
    fn from(v: i64) -> Self {
        Self::Long(v)
    }
}

impl From<f64> for DataCell {
    fn from(v: f64) -> Self {
        Self::Double(v)
    }
}

impl From<bool> for DataCell {
    fn from(v: bool) -> Self {
        Self::Boolean(v)
    }
}

impl From<&str> for DataCell {
    fn from(v: &str) -> Self {
        Self::String(v.into())
    }
}

impl From<String> for DataCell {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}
