// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

//! In-memory chunks.
//!
//! A [`Chunk`] holds the values of one column for one batch of rows together
//! with a per-row missing bitmap. A [`ChunkBatch`] is the unit a chunk store
//! reads and writes: one chunk for every physical column of a table.

use std::sync::Arc;

use bytes::{Buf, BufMut};

mod primitive;
mod var_len;

pub use self::primitive::*;
pub use self::var_len::*;
use super::{StorageResult, TracedStorageError};

/// Physical representation of a column.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ChunkSpec {
    Int,
    Long,
    Double,
    Boolean,
    String,
    RowKey,
    VarBinary,
    /// A primitive chunk paired with a supplementary var-binary chunk.
    BinarySuppl(Box<ChunkSpec>),
}

impl ChunkSpec {
    fn tag(&self) -> u8 {
        match self {
            Self::Int => 1,
            Self::Long => 2,
            Self::Double => 3,
            Self::Boolean => 4,
            Self::String => 5,
            Self::RowKey => 6,
            Self::VarBinary => 7,
            Self::BinarySuppl(_) => 8,
        }
    }

    /// Create an empty chunk of this kind, all slots missing.
    pub fn create_chunk(&self, capacity: usize) -> Chunk {
        match self {
            Self::Int => Chunk::Int(IntChunk::new(capacity)),
            Self::Long => Chunk::Long(LongChunk::new(capacity)),
            Self::Double => Chunk::Double(DoubleChunk::new(capacity)),
            Self::Boolean => Chunk::Boolean(BooleanChunk::new(capacity)),
            Self::String => Chunk::String(VarLenChunk::new(capacity)),
            Self::RowKey => Chunk::RowKey(VarLenChunk::new(capacity)),
            Self::VarBinary => Chunk::VarBinary(VarLenChunk::new(capacity)),
            Self::BinarySuppl(inner) => Chunk::BinarySuppl(BinarySupplChunk {
                chunk: Box::new(inner.create_chunk(capacity)),
                supplement: VarLenChunk::new(capacity),
            }),
        }
    }

    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u8(self.tag());
        if let Self::BinarySuppl(inner) = self {
            inner.encode(buf);
        }
    }

    pub fn decode(buf: &mut impl Buf) -> StorageResult<Self> {
        if !buf.has_remaining() {
            return Err(TracedStorageError::decode("truncated column spec"));
        }
        Ok(match buf.get_u8() {
            1 => Self::Int,
            2 => Self::Long,
            3 => Self::Double,
            4 => Self::Boolean,
            5 => Self::String,
            6 => Self::RowKey,
            7 => Self::VarBinary,
            8 => {
                let inner = Self::decode(buf)?;
                if matches!(inner, Self::BinarySuppl(_)) {
                    return Err(TracedStorageError::decode("nested supplement chunk"));
                }
                Self::BinarySuppl(Box::new(inner))
            }
            tag => return Err(TracedStorageError::decode(format!("unknown chunk tag {tag}"))),
        })
    }
}

impl std::fmt::Display for ChunkSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Int => write!(f, "INT"),
            Self::Long => write!(f, "LONG"),
            Self::Double => write!(f, "DOUBLE"),
            Self::Boolean => write!(f, "BOOLEAN"),
            Self::String => write!(f, "STRING"),
            Self::RowKey => write!(f, "ROWKEY"),
            Self::VarBinary => write!(f, "VARBINARY"),
            Self::BinarySuppl(inner) => write!(f, "SUPPL({inner})"),
        }
    }
}

/// A primitive chunk with a supplementary binary chunk of the same length.
#[derive(Clone, Debug, PartialEq)]
pub struct BinarySupplChunk {
    pub chunk: Box<Chunk>,
    pub supplement: VarLenChunk,
}

/// One column of one batch.
#[derive(Clone, Debug, PartialEq)]
pub enum Chunk {
    Int(IntChunk),
    Long(LongChunk),
    Double(DoubleChunk),
    Boolean(BooleanChunk),
    String(VarLenChunk),
    RowKey(VarLenChunk),
    VarBinary(VarLenChunk),
    BinarySuppl(BinarySupplChunk),
}

macro_rules! dispatch {
    ($self:expr, $c:ident => $body:expr) => {
        match $self {
            Chunk::Int($c) => $body,
            Chunk::Long($c) => $body,
            Chunk::Double($c) => $body,
            Chunk::Boolean($c) => $body,
            Chunk::String($c) | Chunk::RowKey($c) | Chunk::VarBinary($c) => $body,
            Chunk::BinarySuppl(BinarySupplChunk { chunk: $c, .. }) => $body,
        }
    };
}

macro_rules! typed_accessors {
    ($get:ident, $set:ident, $variant:ident, $ty:ty) => {
        pub fn $get(&self, index: usize) -> StorageResult<$ty> {
            match self.primitive() {
                Chunk::$variant(c) => Ok(c.get(index)),
                other => Err(other.kind_mismatch(stringify!($variant))),
            }
        }

        pub fn $set(&mut self, index: usize, value: $ty) -> StorageResult<()> {
            match self.primitive_mut() {
                Chunk::$variant(c) => {
                    c.set(index, value);
                    Ok(())
                }
                other => Err(other.kind_mismatch(stringify!($variant))),
            }
        }
    };
}

impl Chunk {
    pub fn spec(&self) -> ChunkSpec {
        match self {
            Self::Int(_) => ChunkSpec::Int,
            Self::Long(_) => ChunkSpec::Long,
            Self::Double(_) => ChunkSpec::Double,
            Self::Boolean(_) => ChunkSpec::Boolean,
            Self::String(_) => ChunkSpec::String,
            Self::RowKey(_) => ChunkSpec::RowKey,
            Self::VarBinary(_) => ChunkSpec::VarBinary,
            Self::BinarySuppl(c) => ChunkSpec::BinarySuppl(Box::new(c.chunk.spec())),
        }
    }

    pub fn len(&self) -> usize {
        dispatch!(self, c => c.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the primitive value at `index` is missing.
    pub fn is_missing(&self, index: usize) -> bool {
        dispatch!(self, c => c.is_missing(index))
    }

    pub fn set_missing(&mut self, index: usize) {
        dispatch!(self, c => c.set_missing(index))
    }

    /// Mark the slot missing again, including its supplement.
    pub fn reset(&mut self, index: usize) {
        if let Self::BinarySuppl(c) = self {
            c.supplement.set_missing(index);
        }
        self.set_missing(index);
    }

    pub fn truncate(&mut self, len: usize) {
        match self {
            Self::BinarySuppl(c) => {
                c.chunk.truncate(len);
                c.supplement.truncate(len);
            }
            _ => dispatch!(self, c => c.truncate(len)),
        }
    }

    /// The chunk holding primitive values: the inner chunk of a supplement
    /// pair, otherwise the chunk itself.
    fn primitive(&self) -> &Chunk {
        match self {
            Self::BinarySuppl(c) => c.chunk.as_ref(),
            other => other,
        }
    }

    fn primitive_mut(&mut self) -> &mut Chunk {
        match self {
            Self::BinarySuppl(c) => c.chunk.as_mut(),
            other => other,
        }
    }

    fn kind_mismatch(&self, expected: &str) -> TracedStorageError {
        TracedStorageError::decode(format!(
            "expected {} chunk, found {}",
            expected.to_uppercase(),
            self.spec()
        ))
    }

    typed_accessors!(get_int, set_int, Int, i32);
    typed_accessors!(get_long, set_long, Long, i64);
    typed_accessors!(get_double, set_double, Double, f64);
    typed_accessors!(get_boolean, set_boolean, Boolean, bool);

    fn var_len(&self) -> StorageResult<&VarLenChunk> {
        match self.primitive() {
            Chunk::String(c) | Chunk::RowKey(c) | Chunk::VarBinary(c) => Ok(c),
            other => Err(other.kind_mismatch("var-length")),
        }
    }

    fn var_len_mut(&mut self) -> StorageResult<&mut VarLenChunk> {
        match self.primitive_mut() {
            Chunk::String(c) | Chunk::RowKey(c) | Chunk::VarBinary(c) => Ok(c),
            other => Err(other.kind_mismatch("var-length")),
        }
    }

    pub fn get_string(&self, index: usize) -> StorageResult<&str> {
        self.var_len()?.get_str(index)
    }

    pub fn set_string(&mut self, index: usize, value: &str) -> StorageResult<()> {
        self.var_len_mut()?.set_str(index, value);
        Ok(())
    }

    pub fn get_bytes(&self, index: usize) -> StorageResult<&[u8]> {
        Ok(self.var_len()?.get_bytes(index))
    }

    pub fn set_bytes(&mut self, index: usize, value: &[u8]) -> StorageResult<()> {
        self.var_len_mut()?.set_bytes(index, value);
        Ok(())
    }

    pub fn supplement(&self) -> StorageResult<&VarLenChunk> {
        match self {
            Self::BinarySuppl(c) => Ok(&c.supplement),
            other => Err(other.kind_mismatch("supplement")),
        }
    }

    pub fn supplement_mut(&mut self) -> StorageResult<&mut VarLenChunk> {
        match self {
            Self::BinarySuppl(c) => Ok(&mut c.supplement),
            other => Err(other.kind_mismatch("supplement")),
        }
    }
}

/// A batch of rows: one chunk per physical column, all of the same length.
#[derive(Clone, Debug, PartialEq)]
pub struct ChunkBatch {
    row_count: usize,
    chunks: Vec<Arc<Chunk>>,
}

impl ChunkBatch {
    /// A batch of `row_count` rows. A table without physical columns still
    /// counts its rows here.
    pub fn new(row_count: usize, chunks: Vec<Chunk>) -> Self {
        assert!(
            chunks.iter().all(|c| c.len() == row_count),
            "chunks of a batch must have the same length"
        );
        Self {
            row_count,
            chunks: chunks.into_iter().map(Arc::new).collect(),
        }
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn num_columns(&self) -> usize {
        self.chunks.len()
    }

    pub fn chunk(&self, column: usize) -> &Arc<Chunk> {
        &self.chunks[column]
    }

    pub fn chunks(&self) -> &[Arc<Chunk>] {
        &self.chunks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_tags() {
        let spec = ChunkSpec::BinarySuppl(Box::new(ChunkSpec::Double));
        let mut buf = vec![];
        spec.encode(&mut buf);
        assert_eq!(buf, [8, 3]);
        assert_eq!(ChunkSpec::decode(&mut &buf[..]).unwrap(), spec);
        assert!(ChunkSpec::decode(&mut &[8u8, 8, 1][..]).is_err());
        assert!(ChunkSpec::decode(&mut &[42u8][..]).is_err());
    }

    #[test]
    fn test_suppl_chunk_accessors() {
        let spec = ChunkSpec::BinarySuppl(Box::new(ChunkSpec::Long));
        let mut chunk = spec.create_chunk(2);
        chunk.set_long(0, 7).unwrap();
        chunk.supplement_mut().unwrap().set_bytes(1, b"cause");
        assert_eq!(chunk.get_long(0).unwrap(), 7);
        assert!(!chunk.is_missing(0));
        assert!(chunk.is_missing(1));
        assert!(chunk.supplement().unwrap().is_missing(0));
        assert!(chunk.get_int(0).is_err());
        assert_eq!(chunk.spec(), spec);
    }

    #[test]
    fn test_batch_row_count() {
        let mut key = ChunkSpec::RowKey.create_chunk(3);
        let mut int = ChunkSpec::Int.create_chunk(3);
        key.set_string(0, "r0").unwrap();
        int.set_int(0, 1).unwrap();
        key.truncate(1);
        int.truncate(1);
        let batch = ChunkBatch::new(1, vec![key, int]);
        assert_eq!(batch.row_count(), 1);
        assert_eq!(batch.chunk(0).get_string(0).unwrap(), "r0");

        let batch = ChunkBatch::new(4, vec![]);
        assert_eq!(batch.row_count(), 4);
        assert_eq!(batch.num_columns(), 0);
    }

    #[test]
    fn test_reset_slot() {
        let spec = ChunkSpec::BinarySuppl(Box::new(ChunkSpec::Double));
        let mut chunk = spec.create_chunk(2);
        chunk.set_double(1, 2.5).unwrap();
        chunk.supplement_mut().unwrap().set_bytes(1, b"cell");
        chunk.reset(1);
        assert!(chunk.is_missing(1));
        assert!(chunk.supplement().unwrap().is_missing(1));
        assert_eq!(chunk.get_double(1).unwrap(), 0.0);
    }
}
