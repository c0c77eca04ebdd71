// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

use tracing::warn;

use super::ChecksumType;

/// IO Backend of the chunk file readers
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IOBackend {
    /// Use Linux's `pread` API to read from the files.
    PositionedRead,
    /// Use cross-platform API to read from files. Note that this would hurt performance
    NormalRead,
}

/// Options of the chunk stores and cursors.
#[derive(Clone, Debug)]
pub struct StoreOptions {
    /// Number of rows in each chunk
    pub chunk_size: usize,

    /// Number of decoded chunks kept by a read store
    pub cache_size: u64,

    /// I/O Backend used by the read stores
    pub io_backend: IOBackend,

    /// Checksum type used by blocks
    pub checksum_type: ChecksumType,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            chunk_size: 32 * (1 << 10), // 32K rows
            cache_size: 1024,
            io_backend: if cfg!(unix) {
                IOBackend::PositionedRead
            } else {
                warn!("chunk store is running in compatibility mode (NormalRead), which might hurt I/O performance.");
                IOBackend::NormalRead
            },
            checksum_type: ChecksumType::Crc32,
        }
    }
}

impl StoreOptions {
    pub fn default_for_test() -> Self {
        Self {
            chunk_size: 4,
            cache_size: 16,
            io_backend: IOBackend::NormalRead,
            checksum_type: ChecksumType::Crc32,
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        assert!(chunk_size > 0, "chunk size must be positive");
        self.chunk_size = chunk_size;
        self
    }
}
