// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::storage::{
    ChunkSpec, ChunkStoreFactoryRef, StorageError, StorageResult, StoreOptions,
    TableChunkReadStore,
};

/// Opening a store that takes longer than this is reported at info level.
const SLOW_OPEN_NOTIFY_DELAY: Duration = Duration::from_secs(3);

/// Opens the read store of a persisted table.
pub(super) struct AccessTask {
    pub table_id: i64,
    pub factory: ChunkStoreFactoryRef,
    pub chunk_specs: Vec<ChunkSpec>,
    pub data_file: PathBuf,
    pub options: StoreOptions,
}

impl AccessTask {
    fn run(&self) -> StorageResult<Arc<dyn TableChunkReadStore>> {
        let start = Instant::now();
        let store = self
            .factory
            .create_read_store(&self.chunk_specs, &self.data_file, &self.options)
            .map_err(|e| match e.kind() {
                StorageError::WithPath { .. } => e,
                _ => e.with_path(&self.data_file),
            })?;
        let elapsed = start.elapsed();
        let file_size = std::fs::metadata(&self.data_file).map_or(0, |m| m.len());
        debug!(
            table_id = self.table_id,
            file_size,
            ?elapsed,
            "opened table data file"
        );
        if elapsed > SLOW_OPEN_NOTIFY_DELAY {
            info!(
                table_id = self.table_id,
                path = %self.data_file.display(),
                ?elapsed,
                "table data file took long to open"
            );
        }
        Ok(store)
    }
}

enum LazyState {
    Unopened,
    Open(Arc<dyn TableChunkReadStore>),
    Cleared,
}

/// The read store of a loaded table, opened on first access.
///
/// Callers racing on the first access block until the winner has opened the
/// store. A failed open leaves the store unopened, so the next access tries
/// again.
pub(super) struct LazyStore {
    task: AccessTask,
    state: Mutex<LazyState>,
}

impl LazyStore {
    pub fn new(task: AccessTask) -> Self {
        Self {
            task,
            state: Mutex::new(LazyState::Unopened),
        }
    }

    pub fn get_or_open(&self) -> StorageResult<Arc<dyn TableChunkReadStore>> {
        let mut state = self.state.lock();
        match &*state {
            LazyState::Open(store) => Ok(store.clone()),
            LazyState::Cleared => Err(StorageError::Closed("fast table").into()),
            LazyState::Unopened => {
                let store = self.task.run()?;
                *state = LazyState::Open(store.clone());
                Ok(store)
            }
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(*self.state.lock(), LazyState::Open(_))
    }

    /// Close the store if it was opened. Later accesses fail.
    pub fn clear(&self) -> StorageResult<()> {
        let state = std::mem::replace(&mut *self.state.lock(), LazyState::Cleared);
        match state {
            LazyState::Open(store) => store.close(),
            LazyState::Unopened | LazyState::Cleared => Ok(()),
        }
    }

    pub fn data_file(&self) -> &std::path::Path {
        &self.task.data_file
    }
}
