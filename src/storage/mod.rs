// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

//! Columnar storage of fast tables.
//!
//! Tables are stored as a sequence of batches. Every batch holds one
//! [`Chunk`] per physical column. Chunks are encoded into blocks and saved as
//! a chunk file by a [`TableChunkStore`], and read back on demand by a
//! [`TableChunkReadStore`]. [`ReadCursor`] and [`WriteCursor`] walk the rows
//! of a store, converting between cells and chunks through the
//! [`ColumnAccess`] of each column.

mod block;
mod checksum;
mod chunk;
mod cursor;
mod encode;
mod error;
mod options;
mod schema;
mod store;

pub use self::checksum::*;
pub use self::chunk::*;
pub use self::cursor::*;
pub use self::encode::*;
pub use self::error::*;
pub use self::options::*;
pub use self::schema::*;
pub use self::store::*;
