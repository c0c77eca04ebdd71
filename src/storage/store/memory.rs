// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use super::{write_chunk_file, TableChunkReadStore, TableChunkStore};
use crate::storage::chunk::{Chunk, ChunkBatch, ChunkSpec};
use crate::storage::{ChecksumType, StorageError, StorageResult, TracedStorageError};

/// A write store keeping every batch in memory until it is saved.
pub struct MemChunkStore {
    chunk_specs: Vec<ChunkSpec>,
    checksum_type: ChecksumType,
    inner: RwLock<MemChunkStoreInner>,
}

#[derive(Default)]
struct MemChunkStoreInner {
    batches: Vec<ChunkBatch>,
    closed: bool,
}

impl MemChunkStore {
    pub fn new(chunk_specs: Vec<ChunkSpec>, checksum_type: ChecksumType) -> Self {
        Self {
            chunk_specs,
            checksum_type,
            inner: RwLock::new(MemChunkStoreInner::default()),
        }
    }
}

impl TableChunkReadStore for MemChunkStore {
    fn chunk_specs(&self) -> &[ChunkSpec] {
        &self.chunk_specs
    }

    fn num_batches(&self) -> usize {
        self.inner.read().batches.len()
    }

    fn batch_row_count(&self, batch: usize) -> usize {
        self.inner
            .read()
            .batches
            .get(batch)
            .map_or(0, ChunkBatch::row_count)
    }

    fn read_chunk(&self, batch: usize, column: usize) -> StorageResult<Arc<Chunk>> {
        let inner = self.inner.read();
        if inner.closed {
            return Err(StorageError::Closed("chunk store").into());
        }
        let batch = inner
            .batches
            .get(batch)
            .ok_or_else(|| TracedStorageError::not_found("batch", batch))?;
        if column >= batch.num_columns() {
            return Err(StorageError::InvalidColumn(column).into());
        }
        Ok(batch.chunk(column).clone())
    }

    fn close(&self) -> StorageResult<()> {
        let mut inner = self.inner.write();
        inner.batches.clear();
        inner.closed = true;
        Ok(())
    }
}

impl TableChunkStore for MemChunkStore {
    fn write_batch(&self, batch: ChunkBatch) -> StorageResult<()> {
        if batch.num_columns() != self.chunk_specs.len() {
            return Err(TracedStorageError::illegal_state(format!(
                "batch has {} columns, store expects {}",
                batch.num_columns(),
                self.chunk_specs.len()
            )));
        }
        for (chunk, spec) in batch.chunks().iter().zip(&self.chunk_specs) {
            if &chunk.spec() != spec {
                return Err(TracedStorageError::illegal_state(format!(
                    "chunk of type {} written to column of type {spec}",
                    chunk.spec()
                )));
            }
        }
        let mut inner = self.inner.write();
        if inner.closed {
            return Err(StorageError::Closed("chunk store").into());
        }
        debug!(rows = batch.row_count(), batch = inner.batches.len(), "batch written");
        inner.batches.push(batch);
        Ok(())
    }

    fn save_to_file(&self, path: &Path) -> StorageResult<()> {
        let inner = self.inner.read();
        if inner.closed {
            return Err(StorageError::Closed("chunk store").into());
        }
        write_chunk_file(path, &self.chunk_specs, &inner.batches, self.checksum_type)
            .map_err(|e| e.with_path(path))?;
        Ok(())
    }

    fn into_read_store(self: Arc<Self>) -> Arc<dyn TableChunkReadStore> {
        self
    }
}
