// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
#[cfg(unix)]
use std::os::unix::fs::FileExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use moka::sync::Cache;
use parking_lot::{Mutex, RwLock};
use tracing::debug;

use super::{
    check_header, decode_index_and_specs, BatchIndex, BlockIndex, ChunkFileTail,
    TableChunkReadStore, CHUNK_FILE_HEADER_SIZE, CHUNK_FILE_TAIL_SIZE,
};
use crate::storage::block::decode_block;
use crate::storage::chunk::{Chunk, ChunkSpec};
use crate::storage::{IOBackend, StorageError, StorageResult, StoreOptions, TracedStorageError};

#[derive(Clone)]
pub enum ChunkReadableFile {
    /// For `read_at`
    #[cfg(unix)]
    PositionedRead(Arc<File>),
    /// For `file.lock().seek().read()`
    NormalRead(Arc<Mutex<File>>),
}

impl ChunkReadableFile {
    fn open(path: &Path, io_backend: IOBackend) -> StorageResult<Self> {
        let file = File::open(path)?;
        Ok(match io_backend {
            #[cfg(unix)]
            IOBackend::PositionedRead => Self::PositionedRead(Arc::new(file)),
            _ => Self::NormalRead(Arc::new(Mutex::new(file))),
        })
    }

    fn len(&self) -> StorageResult<u64> {
        Ok(match self {
            #[cfg(unix)]
            Self::PositionedRead(file) => file.metadata()?.len(),
            Self::NormalRead(file) => file.lock().metadata()?.len(),
        })
    }

    fn read(&self, offset: u64, length: u64) -> StorageResult<Bytes> {
        let mut data = vec![0; length as usize];
        match self {
            #[cfg(unix)]
            Self::PositionedRead(file) => file.read_exact_at(&mut data[..], offset)?,
            Self::NormalRead(file) => {
                let mut file = file.lock();
                file.seek(SeekFrom::Start(offset))?;
                file.read_exact(&mut data[..])?;
            }
        }
        Ok(Bytes::from(data))
    }
}

/// A key in chunk cache contains `batch` and `column`.
#[derive(Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub struct ChunkCacheKey {
    pub batch: u32,
    pub column: u32,
}

/// A read store over a chunk file.
///
/// Opening the store only reads the footer and the batch index. Chunks are
/// decoded on first access and kept in a cache shared by all cursors over
/// the store.
pub struct DiskChunkStore {
    path: PathBuf,
    chunk_specs: Vec<ChunkSpec>,
    index: Vec<BatchIndex>,
    file: RwLock<Option<ChunkReadableFile>>,
    chunk_cache: Cache<ChunkCacheKey, Arc<Chunk>>,
}

impl DiskChunkStore {
    pub fn open(
        path: impl AsRef<Path>,
        chunk_specs: &[ChunkSpec],
        options: &StoreOptions,
    ) -> StorageResult<Self> {
        let path = path.as_ref();
        Self::open_inner(path, chunk_specs, options).map_err(|e| e.with_path(path))
    }

    fn open_inner(
        path: &Path,
        chunk_specs: &[ChunkSpec],
        options: &StoreOptions,
    ) -> StorageResult<Self> {
        let file = ChunkReadableFile::open(path, options.io_backend)?;
        let file_len = file.len()?;
        if file_len < (CHUNK_FILE_HEADER_SIZE + CHUNK_FILE_TAIL_SIZE) as u64 {
            return Err(TracedStorageError::decode("chunk file is too short"));
        }
        check_header(&file.read(0, CHUNK_FILE_HEADER_SIZE as u64)?)?;

        let tail_offset = file_len - CHUNK_FILE_TAIL_SIZE as u64;
        let tail = ChunkFileTail::decode(&file.read(tail_offset, CHUNK_FILE_TAIL_SIZE as u64)?)?;
        if tail.index_offset < CHUNK_FILE_HEADER_SIZE as u64 || tail.index_offset > tail_offset {
            return Err(TracedStorageError::decode("index offset out of range"));
        }
        let footer = file.read(tail.index_offset, tail_offset - tail.index_offset)?;
        let (index, file_specs) = decode_index_and_specs(&footer, &tail)?;
        if file_specs != chunk_specs {
            return Err(TracedStorageError::decode(format!(
                "column specs of chunk file [{}] do not match the table schema [{}]",
                itertools::join(&file_specs, ", "),
                itertools::join(chunk_specs, ", "),
            )));
        }
        for block in index.iter().flat_map(|batch| &batch.blocks) {
            match block.offset.checked_add(block.length) {
                Some(end) if end <= tail.index_offset => {}
                _ => return Err(TracedStorageError::decode("block out of range")),
            }
        }

        debug!(
            path = %path.display(),
            batches = index.len(),
            size = file_len,
            "chunk file opened"
        );
        Ok(Self {
            path: path.to_path_buf(),
            chunk_specs: file_specs,
            index,
            file: RwLock::new(Some(file)),
            chunk_cache: Cache::new(options.cache_size),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_block(&self, block: BlockIndex) -> StorageResult<Bytes> {
        let file = self
            .file
            .read()
            .clone()
            .ok_or(StorageError::Closed("chunk store"))?;
        file.read(block.offset, block.length)
    }
}

impl TableChunkReadStore for DiskChunkStore {
    fn chunk_specs(&self) -> &[ChunkSpec] {
        &self.chunk_specs
    }

    fn num_batches(&self) -> usize {
        self.index.len()
    }

    fn batch_row_count(&self, batch: usize) -> usize {
        self.index.get(batch).map_or(0, |b| b.row_count)
    }

    fn read_chunk(&self, batch: usize, column: usize) -> StorageResult<Arc<Chunk>> {
        if self.file.read().is_none() {
            return Err(StorageError::Closed("chunk store").into());
        }
        let batch_index = self
            .index
            .get(batch)
            .ok_or_else(|| TracedStorageError::not_found("batch", batch))?;
        let block_index = *batch_index
            .blocks
            .get(column)
            .ok_or(StorageError::InvalidColumn(column))?;
        let key = ChunkCacheKey {
            batch: batch as u32,
            column: column as u32,
        };
        let chunk = self.chunk_cache.try_get_with(key, || {
            let block = self.read_block(block_index)?;
            debug!(batch, column, length = block.len(), "chunk read");
            let chunk = decode_block(&self.chunk_specs[column], block, batch_index.row_count)
                .map_err(|e| e.with_path(&self.path))?;
            Ok::<_, TracedStorageError>(Arc::new(chunk))
        })?;
        Ok(chunk)
    }

    fn close(&self) -> StorageResult<()> {
        if self.file.write().take().is_some() {
            self.chunk_cache.invalidate_all();
            debug!(path = %self.path.display(), "chunk file closed");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::{MemChunkStore, TableChunkStore};
    use super::*;
    use crate::storage::chunk::ChunkBatch;
    use crate::storage::ChecksumType;

    fn write_sample(path: &Path) {
        let specs = vec![ChunkSpec::RowKey, ChunkSpec::Int];
        let store = MemChunkStore::new(specs, ChecksumType::Crc32);
        for batch in 0..3 {
            let mut key = ChunkSpec::RowKey.create_chunk(2);
            let mut value = ChunkSpec::Int.create_chunk(2);
            for row in 0..2 {
                key.set_string(row, &format!("Row{}", batch * 2 + row))
                    .unwrap();
                value.set_int(row, (batch * 2 + row) as i32).unwrap();
            }
            store.write_batch(ChunkBatch::new(2, vec![key, value])).unwrap();
        }
        store.save_to_file(path).unwrap();
    }

    #[test]
    fn test_open_and_read() {
        let tempdir = tempfile::tempdir().unwrap();
        let path = tempdir.path().join("table.data");
        write_sample(&path);

        let specs = [ChunkSpec::RowKey, ChunkSpec::Int];
        let store = DiskChunkStore::open(&path, &specs, &StoreOptions::default_for_test()).unwrap();
        assert_eq!(store.num_batches(), 3);
        assert_eq!(store.num_rows(), 6);
        assert_eq!(store.read_chunk(2, 0).unwrap().get_string(1).unwrap(), "Row5");
        assert_eq!(store.read_chunk(1, 1).unwrap().get_int(0).unwrap(), 2);
        store.close().unwrap();
        store.close().unwrap();
        assert!(store.read_chunk(0, 0).is_err());
    }

    #[test]
    fn test_schema_mismatch() {
        let tempdir = tempfile::tempdir().unwrap();
        let path = tempdir.path().join("table.data");
        write_sample(&path);

        let specs = [ChunkSpec::RowKey, ChunkSpec::Long];
        let err = DiskChunkStore::open(&path, &specs, &StoreOptions::default_for_test())
            .err()
            .unwrap();
        assert!(matches!(err.kind(), StorageError::WithPath { .. }));
    }

    #[test]
    fn test_block_range_overflow() {
        let tempdir = tempfile::tempdir().unwrap();
        let path = tempdir.path().join("table.data");
        write_sample(&path);

        // point the first block of the first batch at the end of the address space
        let mut data = std::fs::read(&path).unwrap();
        let tail = data.len() - CHUNK_FILE_TAIL_SIZE;
        let index_offset = u64::from_le_bytes(data[tail + 8..tail + 16].try_into().unwrap());
        let first_block = index_offset as usize + 4;
        data[first_block..first_block + 8].copy_from_slice(&(u64::MAX - 1).to_le_bytes());
        std::fs::write(&path, data).unwrap();

        let specs = [ChunkSpec::RowKey, ChunkSpec::Int];
        let err = DiskChunkStore::open(&path, &specs, &StoreOptions::default_for_test())
            .err()
            .unwrap();
        assert!(err.to_string().contains("block out of range"), "{err}");
    }

    #[test]
    fn test_missing_file() {
        let tempdir = tempfile::tempdir().unwrap();
        let path = tempdir.path().join("nope.data");
        assert!(DiskChunkStore::open(&path, &[], &StoreOptions::default_for_test()).is_err());
    }
}
