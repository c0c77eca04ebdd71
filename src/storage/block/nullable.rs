// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

use bitvec::prelude::{BitVec, Lsb0};
use bytes::{Buf, BufMut};

use super::Block;
use crate::storage::{StorageResult, TracedStorageError};

/// Append the missing bitmap followed by its byte length.
pub fn encode_missing_bitmap(missing: &BitVec<u8, Lsb0>, data: &mut Vec<u8>) {
    data.extend(missing.as_raw_slice().iter());
    data.put_u32_le(missing.as_raw_slice().len() as u32);
}

/// Split a block into its inner data and the missing bitmap of `row_count` rows.
pub fn decode_nullable_block(
    data: Block,
    row_count: usize,
) -> StorageResult<(Block, BitVec<u8, Lsb0>)> {
    if data.len() < 4 {
        return Err(TracedStorageError::decode("missing bitmap length"));
    }
    let mut bitmap_len_buf = &data[data.len() - 4..];
    let bitmap_len = bitmap_len_buf.get_u32_le() as usize;
    if bitmap_len * 8 < row_count || data.len() < 4 + bitmap_len {
        return Err(TracedStorageError::decode("truncated missing bitmap"));
    }
    let bitmap_block = data.slice(data.len() - 4 - bitmap_len..data.len() - 4);
    let inner_block = data.slice(..data.len() - 4 - bitmap_len);
    let mut missing = BitVec::<u8, Lsb0>::from_slice(&bitmap_block);
    missing.truncate(row_count);
    Ok((inner_block, missing))
}
