// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

use bitvec::prelude::{BitVec, Lsb0};

use super::super::PrimitiveFixedWidthEncode;

/// A fixed-capacity chunk of fixed-width values.
///
/// Every slot starts out missing. Setting a value clears the missing flag of
/// its slot, while [`PrimitiveChunk::set_missing`] resets the slot to the
/// default value.
#[derive(Clone, Debug, PartialEq)]
pub struct PrimitiveChunk<T: PrimitiveFixedWidthEncode> {
    values: Vec<T>,
    missing: BitVec<u8, Lsb0>,
}

pub type IntChunk = PrimitiveChunk<i32>;
pub type LongChunk = PrimitiveChunk<i64>;
pub type DoubleChunk = PrimitiveChunk<f64>;
pub type BooleanChunk = PrimitiveChunk<bool>;

impl<T: PrimitiveFixedWidthEncode> PrimitiveChunk<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            values: vec![*T::DEFAULT_VALUE; capacity],
            missing: BitVec::repeat(true, capacity),
        }
    }

    /// Build a chunk from decoded values and missing flags.
    pub fn from_parts(values: Vec<T>, missing: BitVec<u8, Lsb0>) -> Self {
        assert_eq!(values.len(), missing.len(), "values and bitmap must align");
        Self { values, missing }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, index: usize) -> T {
        self.values[index]
    }

    pub fn set(&mut self, index: usize, value: T) {
        self.values[index] = value;
        self.missing.set(index, false);
    }

    pub fn is_missing(&self, index: usize) -> bool {
        self.missing[index]
    }

    pub fn set_missing(&mut self, index: usize) {
        self.values[index] = *T::DEFAULT_VALUE;
        self.missing.set(index, true);
    }

    /// Shrink the chunk to the rows actually written.
    pub fn truncate(&mut self, len: usize) {
        self.values.truncate(len);
        self.missing.truncate(len);
    }

    pub fn values(&self) -> &[T] {
        &self.values
    }

    pub fn missing(&self) -> &BitVec<u8, Lsb0> {
        &self.missing
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_chunk_is_missing() {
        let mut chunk = IntChunk::new(3);
        assert!((0..3).all(|i| chunk.is_missing(i)));
        chunk.set(1, 42);
        assert!(!chunk.is_missing(1));
        assert_eq!(chunk.get(1), 42);
        chunk.set_missing(1);
        assert!(chunk.is_missing(1));
        assert_eq!(chunk.get(1), 0);
        chunk.truncate(2);
        assert_eq!(chunk.len(), 2);
    }
}
