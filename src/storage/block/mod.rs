// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

//! Block builders and decoders
//!
//! A block is the encoded form of one [`Chunk`]. Each chunk of a chunk file is
//! stored as exactly one block. The block encoding scheme is as follows:
//!
//! ```plain
//! |    data     | block_type | cksum_type | cksum  |
//! |  variable   |    4B      |     4B     |   8B   |
//! ```

mod nullable;
mod primitive_block;
mod suppl_block;
mod var_len_block;

use bytes::{Buf, BufMut, Bytes};
pub use nullable::*;
pub use primitive_block::*;
pub use suppl_block::*;
pub use var_len_block::*;

use super::chunk::{Chunk, ChunkSpec};
use super::{build_checksum, verify_checksum, ChecksumType, StorageResult, TracedStorageError};

/// A block is simply a [`Bytes`] array.
pub type Block = Bytes;

/// Layout of the data part of a block.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[repr(i32)]
pub enum BlockType {
    #[default]
    Primitive = 1,
    VarLen = 2,
    BinarySuppl = 3,
}

impl TryFrom<i32> for BlockType {
    type Error = TracedStorageError;

    fn try_from(value: i32) -> StorageResult<Self> {
        match value {
            1 => Ok(Self::Primitive),
            2 => Ok(Self::VarLen),
            3 => Ok(Self::BinarySuppl),
            _ => Err(TracedStorageError::decode("expected valid block type")),
        }
    }
}

impl BlockType {
    fn of(spec: &ChunkSpec) -> Self {
        match spec {
            ChunkSpec::Int | ChunkSpec::Long | ChunkSpec::Double | ChunkSpec::Boolean => {
                Self::Primitive
            }
            ChunkSpec::String | ChunkSpec::RowKey | ChunkSpec::VarBinary => Self::VarLen,
            ChunkSpec::BinarySuppl(_) => Self::BinarySuppl,
        }
    }
}

#[derive(Default, Debug, Clone)]
pub struct BlockMeta {
    pub block_type: BlockType,
    pub checksum_type: ChecksumType,
    pub checksum: u64,
}

pub const BLOCK_META_NON_CHECKSUM_SIZE: usize = 4;
pub const BLOCK_META_CHECKSUM_SIZE: usize = 4 + 8;
pub const BLOCK_META_SIZE: usize = BLOCK_META_NON_CHECKSUM_SIZE + BLOCK_META_CHECKSUM_SIZE;

impl BlockMeta {
    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_i32_le(self.block_type as i32);
        buf.put_i32_le(self.checksum_type as i32);
        buf.put_u64_le(self.checksum);
    }

    pub fn decode(buf: &mut impl Buf) -> StorageResult<Self> {
        if buf.remaining() < BLOCK_META_SIZE {
            return Err(TracedStorageError::decode("expected 16 bytes"));
        }
        Ok(Self {
            block_type: BlockType::try_from(buf.get_i32_le())?,
            checksum_type: ChecksumType::try_from(buf.get_i32_le())?,
            checksum: buf.get_u64_le(),
        })
    }
}

/// Encode the data part of a block.
fn encode_data(chunk: &Chunk, data: &mut Vec<u8>) -> StorageResult<()> {
    match chunk {
        Chunk::Int(c) => encode_primitive(c, data),
        Chunk::Long(c) => encode_primitive(c, data),
        Chunk::Double(c) => encode_primitive(c, data),
        Chunk::Boolean(c) => encode_primitive(c, data),
        Chunk::String(c) | Chunk::RowKey(c) | Chunk::VarBinary(c) => encode_var_len(c, data)?,
        Chunk::BinarySuppl(c) => encode_suppl(c, data)?,
    }
    Ok(())
}

fn decode_data(spec: &ChunkSpec, data: Block, row_count: usize) -> StorageResult<Chunk> {
    Ok(match spec {
        ChunkSpec::Int => Chunk::Int(decode_primitive(data, row_count)?),
        ChunkSpec::Long => Chunk::Long(decode_primitive(data, row_count)?),
        ChunkSpec::Double => Chunk::Double(decode_primitive(data, row_count)?),
        ChunkSpec::Boolean => Chunk::Boolean(decode_primitive(data, row_count)?),
        ChunkSpec::String => Chunk::String(decode_var_len(data, row_count)?),
        ChunkSpec::RowKey => Chunk::RowKey(decode_var_len(data, row_count)?),
        ChunkSpec::VarBinary => Chunk::VarBinary(decode_var_len(data, row_count)?),
        ChunkSpec::BinarySuppl(inner) => Chunk::BinarySuppl(decode_suppl(inner, data, row_count)?),
    })
}

/// Encode a chunk into a complete block, including its meta.
pub fn encode_block(chunk: &Chunk, checksum_type: ChecksumType) -> StorageResult<Vec<u8>> {
    let mut data = vec![];
    encode_data(chunk, &mut data)?;
    let meta = BlockMeta {
        block_type: BlockType::of(&chunk.spec()),
        checksum_type,
        checksum: build_checksum(checksum_type, &data),
    };
    meta.encode(&mut data);
    Ok(data)
}

/// Decode a complete block into a chunk of `row_count` rows.
pub fn decode_block(spec: &ChunkSpec, block: Block, row_count: usize) -> StorageResult<Chunk> {
    if block.len() < BLOCK_META_SIZE {
        return Err(TracedStorageError::decode("block is shorter than its meta"));
    }
    let data = block.slice(..block.len() - BLOCK_META_SIZE);
    let meta = BlockMeta::decode(&mut &block[block.len() - BLOCK_META_SIZE..])?;
    if meta.block_type != BlockType::of(spec) {
        return Err(TracedStorageError::decode(format!(
            "block type {:?} does not match column spec {spec}",
            meta.block_type
        )));
    }
    verify_checksum(meta.checksum_type, &data, meta.checksum)?;
    decode_data(spec, data, row_count)
}
