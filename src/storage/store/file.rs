// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

//! Chunk file layout. All integers are little endian.
//!
//! ```plain
//! | magic | version | blocks... | index | footer |
//! |  4B   |   4B    | variable  |       |        |
//! ```
//!
//! The index stores, for every batch, its row count followed by the
//! `(offset, length)` of the block of every column. The footer is
//!
//! ```plain
//! | column spec tags | num_columns | num_batches | index_offset | magic |
//! |    variable      |     4B      |     4B      |      8B      |  4B   |
//! ```

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use bytes::{Buf, BufMut};
use tracing::debug;

use crate::storage::block::encode_block;
use crate::storage::chunk::{ChunkBatch, ChunkSpec};
use crate::storage::{ChecksumType, StorageResult, TracedStorageError};

pub const CHUNK_FILE_MAGIC: &[u8; 4] = b"FTBL";
pub const CHUNK_FILE_VERSION: u32 = 1;
pub const CHUNK_FILE_HEADER_SIZE: usize = 4 + 4;
/// Size of the fixed part of the footer.
pub const CHUNK_FILE_TAIL_SIZE: usize = 4 + 4 + 8 + 4;

/// Location of one block inside the chunk file.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BlockIndex {
    pub offset: u64,
    pub length: u64,
}

/// Index entry of one batch.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BatchIndex {
    pub row_count: usize,
    pub blocks: Vec<BlockIndex>,
}

impl BatchIndex {
    fn encoded_size(num_columns: usize) -> usize {
        4 + num_columns * 16
    }

    fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u32_le(self.row_count as u32);
        for block in &self.blocks {
            buf.put_u64_le(block.offset);
            buf.put_u64_le(block.length);
        }
    }

    fn decode(buf: &mut impl Buf, num_columns: usize) -> Self {
        let row_count = buf.get_u32_le() as usize;
        let blocks = (0..num_columns)
            .map(|_| BlockIndex {
                offset: buf.get_u64_le(),
                length: buf.get_u64_le(),
            })
            .collect();
        Self { row_count, blocks }
    }
}

/// Fixed-size part of the footer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChunkFileTail {
    pub num_columns: usize,
    pub num_batches: usize,
    pub index_offset: u64,
}

impl ChunkFileTail {
    pub fn decode(mut buf: &[u8]) -> StorageResult<Self> {
        if buf.len() != CHUNK_FILE_TAIL_SIZE {
            return Err(TracedStorageError::decode("truncated chunk file footer"));
        }
        let num_columns = buf.get_u32_le() as usize;
        let num_batches = buf.get_u32_le() as usize;
        let index_offset = buf.get_u64_le();
        if buf != CHUNK_FILE_MAGIC {
            return Err(TracedStorageError::decode("bad magic at the end of chunk file"));
        }
        Ok(Self {
            num_columns,
            num_batches,
            index_offset,
        })
    }

    /// Length of the region starting at `index_offset` and ending before the tail.
    pub fn index_size(&self) -> usize {
        self.num_batches * BatchIndex::encoded_size(self.num_columns)
    }
}

pub fn check_header(mut buf: &[u8]) -> StorageResult<()> {
    if buf.len() < CHUNK_FILE_HEADER_SIZE || &buf[..4] != CHUNK_FILE_MAGIC {
        return Err(TracedStorageError::decode("not a chunk file"));
    }
    buf.advance(4);
    let version = buf.get_u32_le();
    if version != CHUNK_FILE_VERSION {
        return Err(TracedStorageError::decode(format!(
            "unsupported chunk file version {version}"
        )));
    }
    Ok(())
}

/// Decode the index and the column specs, which follow the blocks.
pub fn decode_index_and_specs(
    mut buf: &[u8],
    tail: &ChunkFileTail,
) -> StorageResult<(Vec<BatchIndex>, Vec<ChunkSpec>)> {
    if buf.len() < tail.index_size() {
        return Err(TracedStorageError::decode("truncated chunk file index"));
    }
    let index = (0..tail.num_batches)
        .map(|_| BatchIndex::decode(&mut buf, tail.num_columns))
        .collect();
    let specs = (0..tail.num_columns)
        .map(|_| ChunkSpec::decode(&mut buf))
        .collect::<StorageResult<Vec<_>>>()?;
    if buf.has_remaining() {
        return Err(TracedStorageError::decode("trailing bytes after column specs"));
    }
    Ok((index, specs))
}

/// Write all batches into a chunk file at `path`, returning the file size.
pub fn write_chunk_file(
    path: &Path,
    chunk_specs: &[ChunkSpec],
    batches: &[ChunkBatch],
    checksum_type: ChecksumType,
) -> StorageResult<u64> {
    let mut writer = BufWriter::new(File::create(path)?);
    let mut offset = CHUNK_FILE_HEADER_SIZE as u64;
    writer.write_all(CHUNK_FILE_MAGIC)?;
    writer.write_all(&CHUNK_FILE_VERSION.to_le_bytes())?;

    let mut index = Vec::with_capacity(batches.len());
    for batch in batches {
        let mut blocks = Vec::with_capacity(batch.num_columns());
        for chunk in batch.chunks() {
            let block = encode_block(chunk, checksum_type)?;
            writer.write_all(&block)?;
            blocks.push(BlockIndex {
                offset,
                length: block.len() as u64,
            });
            offset += block.len() as u64;
        }
        index.push(BatchIndex {
            row_count: batch.row_count(),
            blocks,
        });
    }

    let mut footer = vec![];
    for batch in &index {
        batch.encode(&mut footer);
    }
    for spec in chunk_specs {
        spec.encode(&mut footer);
    }
    footer.put_u32_le(chunk_specs.len() as u32);
    footer.put_u32_le(index.len() as u32);
    footer.put_u64_le(offset);
    footer.put_slice(CHUNK_FILE_MAGIC);
    writer.write_all(&footer)?;
    writer.into_inner().map_err(|e| e.into_error())?.sync_data()?;

    let size = offset + footer.len() as u64;
    debug!(path = %path.display(), batches = index.len(), size, "chunk file written");
    Ok(size)
}
