// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

//! Fast tables: row tables stored in a chunked columnar format.
//!
//! Rows are appended through a [`LegacyRowContainer`], which converts every
//! cell into chunk writes. Closing the container yields a [`FastTable`] that
//! can be iterated with all or a subset of its columns, saved next to a
//! settings record, and loaded back lazily.

#![deny(unused_must_use)]

pub mod fast_table;
pub mod legacy;
pub mod settings;
pub mod storage;
pub mod types;

pub use self::fast_table::{FastTable, FastTableEnv, LoadContext, TableFilter, TableRowIterator};
pub use self::legacy::{LegacyRowContainer, LegacyRowContainerFactory};
pub use self::settings::Settings;
pub use self::storage::{StorageError, StorageResult, StoreOptions, TracedStorageError};
