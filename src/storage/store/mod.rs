// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

//! Chunk stores.
//!
//! A chunk store keeps the batches of a table. Tables are written once through
//! a [`TableChunkStore`], saved to a chunk file, and later reopened through a
//! [`TableChunkReadStore`] that decodes chunks on demand.

mod disk;
mod file;
mod memory;

use std::path::Path;
use std::sync::Arc;

pub use self::disk::*;
pub use self::file::*;
pub use self::memory::*;
use super::chunk::{Chunk, ChunkBatch, ChunkSpec};
use super::{StorageResult, StoreOptions};

/// Read access to the batches of a table.
pub trait TableChunkReadStore: Send + Sync {
    /// Physical column layout of every batch.
    fn chunk_specs(&self) -> &[ChunkSpec];

    fn num_batches(&self) -> usize;

    /// Number of rows in the given batch.
    fn batch_row_count(&self, batch: usize) -> usize;

    fn num_rows(&self) -> usize {
        (0..self.num_batches())
            .map(|batch| self.batch_row_count(batch))
            .sum()
    }

    /// Get one column of one batch. Columns that are never requested are never
    /// read from the backing storage.
    fn read_chunk(&self, batch: usize, column: usize) -> StorageResult<Arc<Chunk>>;

    /// Release the resources held by the store. Calling this more than once
    /// is a no-op.
    fn close(&self) -> StorageResult<()>;
}

/// A chunk store that accepts new batches.
pub trait TableChunkStore: TableChunkReadStore {
    /// Append a complete batch.
    fn write_batch(&self, batch: ChunkBatch) -> StorageResult<()>;

    /// Persist all batches as a chunk file.
    fn save_to_file(&self, path: &Path) -> StorageResult<()>;

    fn into_read_store(self: Arc<Self>) -> Arc<dyn TableChunkReadStore>;
}

/// Creates chunk stores. Factories are registered and persisted by name.
pub trait ChunkStoreFactory: Send + Sync {
    fn name(&self) -> &str;

    fn create_write_store(
        &self,
        chunk_specs: &[ChunkSpec],
        options: &StoreOptions,
    ) -> StorageResult<Arc<dyn TableChunkStore>>;

    fn create_read_store(
        &self,
        chunk_specs: &[ChunkSpec],
        path: &Path,
        options: &StoreOptions,
    ) -> StorageResult<Arc<dyn TableChunkReadStore>>;
}

pub type ChunkStoreFactoryRef = Arc<dyn ChunkStoreFactory>;

/// The default factory: batches are kept in memory while writing and saved
/// to a single chunk file.
#[derive(Debug, Default)]
pub struct ColumnarFileStoreFactory;

impl ColumnarFileStoreFactory {
    pub const NAME: &'static str = "columnar_file";
}

impl ChunkStoreFactory for ColumnarFileStoreFactory {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn create_write_store(
        &self,
        chunk_specs: &[ChunkSpec],
        options: &StoreOptions,
    ) -> StorageResult<Arc<dyn TableChunkStore>> {
        Ok(Arc::new(MemChunkStore::new(
            chunk_specs.to_vec(),
            options.checksum_type,
        )))
    }

    fn create_read_store(
        &self,
        chunk_specs: &[ChunkSpec],
        path: &Path,
        options: &StoreOptions,
    ) -> StorageResult<Arc<dyn TableChunkReadStore>> {
        Ok(Arc::new(DiskChunkStore::open(path, chunk_specs, options)?))
    }
}
