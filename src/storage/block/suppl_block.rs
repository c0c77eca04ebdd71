// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

use bytes::{Buf, BufMut};

use super::super::chunk::{BinarySupplChunk, ChunkSpec};
use super::{decode_data, decode_var_len, encode_data, encode_var_len, Block};
use crate::storage::{StorageResult, TracedStorageError};

/// Encodes a primitive chunk and its supplement:
///
/// ```plain
/// | primitive_len | primitive data | var-len data |
/// |      4B       |   variable     |   variable   |
/// ```
pub fn encode_suppl(chunk: &BinarySupplChunk, data: &mut Vec<u8>) -> StorageResult<()> {
    let mut primitive = vec![];
    encode_data(&chunk.chunk, &mut primitive)?;
    let primitive_len = u32::try_from(primitive.len())
        .map_err(|_| TracedStorageError::illegal_state("primitive part of chunk exceeds 4 GiB"))?;
    data.put_u32_le(primitive_len);
    data.extend_from_slice(&primitive);
    encode_var_len(&chunk.supplement, data)
}

pub fn decode_suppl(
    inner: &ChunkSpec,
    data: Block,
    row_count: usize,
) -> StorageResult<BinarySupplChunk> {
    if data.len() < 4 {
        return Err(TracedStorageError::decode("missing primitive length"));
    }
    let primitive_len = (&data[..4]).get_u32_le() as usize;
    if data.len() < 4 + primitive_len {
        return Err(TracedStorageError::decode("truncated supplement block"));
    }
    let chunk = decode_data(inner, data.slice(4..4 + primitive_len), row_count)?;
    let supplement = decode_var_len(data.slice(4 + primitive_len..), row_count)?;
    Ok(BinarySupplChunk {
        chunk: Box::new(chunk),
        supplement,
    })
}
