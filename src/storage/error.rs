// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

use std::backtrace::Backtrace;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("{0}({1}) not found")]
    NotFound(&'static str, String),
    #[error("invalid column index: {0}")]
    InvalidColumn(usize),
    #[error("column {0} is not part of the current selection")]
    ColumnNotSelected(usize),
    #[error("column \"{column}\" of type {data_type} has no columnar mapping")]
    UnsupportedColumnType { column: String, data_type: String },
    #[error("invalid settings: {0}")]
    InvalidSettings(String),
    #[error("illegal state: {0}")]
    IllegalState(String),
    #[error("unknown serializer tag {0}, type registry is out of sync with the data")]
    UnknownSerializerTag(i8),
    #[error("too many cell implementations (at most {0} per table)")]
    TooManyCellClasses(usize),
    #[error("{0} has been closed")]
    Closed(&'static str),
    #[error("IO error: {0}")]
    Io(#[from] Box<std::io::Error>),
    #[error("JSON decode error: {0}")]
    JsonDecode(#[from] serde_json::Error),
    #[error("Decode error: {0}")]
    Decode(String),
    #[error("Invalid checksum: found {0}, expected {1}")]
    Checksum(u64, u64),
    #[error("exception while accessing file \"{}\": {source}", path.display())]
    WithPath {
        path: PathBuf,
        source: Box<TracedStorageError>,
    },
    #[error("{0}")]
    Nested(#[from] Arc<TracedStorageError>),
}

impl From<std::io::Error> for TracedStorageError {
    #[inline]
    fn from(e: std::io::Error) -> TracedStorageError {
        StorageError::Io(e.into()).into()
    }
}

impl From<serde_json::Error> for TracedStorageError {
    #[inline]
    fn from(e: serde_json::Error) -> TracedStorageError {
        StorageError::JsonDecode(e).into()
    }
}

impl From<Arc<TracedStorageError>> for TracedStorageError {
    #[inline]
    fn from(e: Arc<TracedStorageError>) -> TracedStorageError {
        StorageError::Nested(e).into()
    }
}

/// [`StorageError`] with backtrace.
pub struct TracedStorageError {
    source: StorageError,
    backtrace: Backtrace,
}

impl From<StorageError> for TracedStorageError {
    #[inline]
    fn from(source: StorageError) -> Self {
        Self {
            source,
            backtrace: Backtrace::capture(),
        }
    }
}

impl std::fmt::Display for TracedStorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.source)
    }
}

impl std::fmt::Debug for TracedStorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}\n{}", self.source, self.backtrace)
    }
}

impl std::error::Error for TracedStorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

impl TracedStorageError {
    /// The error without its backtrace.
    pub fn kind(&self) -> &StorageError {
        &self.source
    }

    pub fn not_found(ty: &'static str, item: impl ToString) -> Self {
        StorageError::NotFound(ty, item.to_string()).into()
    }

    pub fn decode(message: impl ToString) -> Self {
        StorageError::Decode(message.to_string()).into()
    }

    pub fn checksum(found: u64, expected: u64) -> Self {
        StorageError::Checksum(found, expected).into()
    }

    pub fn illegal_state(message: impl ToString) -> Self {
        StorageError::IllegalState(message.to_string()).into()
    }

    pub fn invalid_settings(message: impl ToString) -> Self {
        StorageError::InvalidSettings(message.to_string()).into()
    }

    /// Attach the file being accessed to an error.
    pub fn with_path(self, path: impl Into<PathBuf>) -> Self {
        StorageError::WithPath {
            path: path.into(),
            source: Box::new(self),
        }
        .into()
    }
}

pub type StorageResult<T> = std::result::Result<T, TracedStorageError>;
