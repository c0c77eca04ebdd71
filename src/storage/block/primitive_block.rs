// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

use bytes::Buf;

use super::super::chunk::PrimitiveChunk;
use super::super::PrimitiveFixedWidthEncode;
use super::{decode_nullable_block, encode_missing_bitmap, Block};
use crate::storage::{StorageResult, TracedStorageError};

/// Encodes fixed-width data into a block. The layout is an array of little
/// endian fixed-width values, followed by the missing bitmap.
pub fn encode_primitive<T: PrimitiveFixedWidthEncode>(chunk: &PrimitiveChunk<T>, data: &mut Vec<u8>) {
    data.reserve(chunk.len() * T::WIDTH);
    for value in chunk.values() {
        value.encode(data);
    }
    encode_missing_bitmap(chunk.missing(), data);
}

pub fn decode_primitive<T: PrimitiveFixedWidthEncode>(
    data: Block,
    row_count: usize,
) -> StorageResult<PrimitiveChunk<T>> {
    let (inner, missing) = decode_nullable_block(data, row_count)?;
    if inner.len() != row_count * T::WIDTH {
        return Err(TracedStorageError::decode(format!(
            "expected {} bytes of values, found {}",
            row_count * T::WIDTH,
            inner.len()
        )));
    }
    let mut buf = &inner[..];
    let mut values = Vec::with_capacity(row_count);
    while buf.has_remaining() {
        values.push(T::decode(&mut buf));
    }
    Ok(PrimitiveChunk::from_parts(values, missing))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_i32() {
        let mut chunk = PrimitiveChunk::<i32>::new(4);
        chunk.set(0, 1);
        chunk.set(1, 2);
        chunk.set(2, 3);
        let mut data = vec![];
        encode_primitive(&chunk, &mut data);
        // 4 values, 1 bitmap byte, bitmap length
        assert_eq!(data.len(), 16 + 1 + 4);
        let decoded = decode_primitive::<i32>(data.into(), 4).unwrap();
        assert_eq!(decoded.values(), &[1, 2, 3, 0]);
        assert!(decoded.is_missing(3));
    }
}
