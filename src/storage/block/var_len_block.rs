// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

use bytes::{Buf, BufMut};

use super::super::chunk::VarLenChunk;
use super::{decode_nullable_block, encode_missing_bitmap, Block};
use crate::storage::{StorageResult, TracedStorageError};

/// Encodes variable-length data into a block. The layout is the end offset of
/// every value, then the concatenated bytes, then the missing bitmap.
pub fn encode_var_len(chunk: &VarLenChunk, data: &mut Vec<u8>) -> StorageResult<()> {
    let mut end = 0u32;
    for value in chunk.values() {
        end = next_offset(end, value.len())?;
        data.put_u32_le(end);
    }
    for value in chunk.values() {
        data.extend_from_slice(value);
    }
    encode_missing_bitmap(chunk.missing(), data);
    Ok(())
}

/// End offset of a value of `len` bytes starting at `end`. Offsets are 32 bits
/// wide, so the values of one chunk are limited to 4 GiB.
fn next_offset(end: u32, len: usize) -> StorageResult<u32> {
    u32::try_from(len)
        .ok()
        .and_then(|len| end.checked_add(len))
        .ok_or_else(|| TracedStorageError::illegal_state("var-length chunk exceeds 4 GiB"))
}

pub fn decode_var_len(data: Block, row_count: usize) -> StorageResult<VarLenChunk> {
    let (inner, missing) = decode_nullable_block(data, row_count)?;
    let offsets_len = row_count * std::mem::size_of::<u32>();
    if inner.len() < offsets_len {
        return Err(TracedStorageError::decode("truncated offsets of var-length block"));
    }
    let mut offsets = &inner[..offsets_len];
    let content = inner.slice(offsets_len..);
    let mut values = Vec::with_capacity(row_count);
    let mut start = 0;
    for _ in 0..row_count {
        let end = offsets.get_u32_le() as usize;
        if end < start || end > content.len() {
            return Err(TracedStorageError::decode("invalid offset in var-length block"));
        }
        values.push(content.slice(start..end));
        start = end;
    }
    Ok(VarLenChunk::from_parts(values, missing))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_strings() {
        let mut chunk = VarLenChunk::new(3);
        chunk.set_str(0, "233");
        chunk.set_str(2, "2333");
        let mut data = vec![];
        encode_var_len(&chunk, &mut data).unwrap();
        let decoded = decode_var_len(data.into(), 3).unwrap();
        assert_eq!(decoded.get_str(0).unwrap(), "233");
        assert!(decoded.is_missing(1));
        assert_eq!(decoded.get_str(2).unwrap(), "2333");
    }

    #[test]
    fn test_offset_overflow() {
        assert_eq!(next_offset(3, 4).unwrap(), 7);
        assert_eq!(next_offset(0, u32::MAX as usize).unwrap(), u32::MAX);
        assert!(next_offset(u32::MAX, 1).is_err());
        assert!(next_offset(1, u32::MAX as usize).is_err());
        assert!(next_offset(0, u32::MAX as usize + 1).is_err());
    }
}
