// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

use bitvec::prelude::{BitVec, Lsb0};
use bytes::Bytes;

use crate::storage::{StorageResult, TracedStorageError};

/// A fixed-capacity chunk of variable-length byte strings. Strings and row
/// keys are stored as UTF-8 bytes.
#[derive(Clone, Debug, PartialEq)]
pub struct VarLenChunk {
    values: Vec<Bytes>,
    missing: BitVec<u8, Lsb0>,
}

impl VarLenChunk {
    pub fn new(capacity: usize) -> Self {
        Self {
            values: vec![Bytes::new(); capacity],
            missing: BitVec::repeat(true, capacity),
        }
    }

    pub fn from_parts(values: Vec<Bytes>, missing: BitVec<u8, Lsb0>) -> Self {
        assert_eq!(values.len(), missing.len(), "values and bitmap must align");
        Self { values, missing }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get_bytes(&self, index: usize) -> &[u8] {
        &self.values[index]
    }

    pub fn get_str(&self, index: usize) -> StorageResult<&str> {
        std::str::from_utf8(&self.values[index])
            .map_err(|e| TracedStorageError::decode(format!("invalid utf-8 at row {index}: {e}")))
    }

    pub fn set_bytes(&mut self, index: usize, value: &[u8]) {
        self.values[index] = Bytes::copy_from_slice(value);
        self.missing.set(index, false);
    }

    pub fn set_str(&mut self, index: usize, value: &str) {
        self.set_bytes(index, value.as_bytes())
    }

    pub fn is_missing(&self, index: usize) -> bool {
        self.missing[index]
    }

    pub fn set_missing(&mut self, index: usize) {
        self.values[index] = Bytes::new();
        self.missing.set(index, true);
    }

    pub fn truncate(&mut self, len: usize) {
        self.values.truncate(len);
        self.missing.truncate(len);
    }

    pub fn values(&self) -> &[Bytes] {
        &self.values
    }

    pub fn missing(&self) -> &BitVec<u8, Lsb0> {
        &self.missing
    }
}
