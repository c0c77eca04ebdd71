// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

//! Byte-stream serializers of cell classes.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::{Buf, BufMut, Bytes};

use crate::storage::{StorageResult, TracedStorageError};
use crate::types::{DataCell, ExtensionCell};

/// Strings of at least this many bytes are framed with a 32-bit length.
const LONG_UTF_MARKER: u16 = u16::MAX;

/// Output stream handed to a [`DataCellSerializer`].
#[derive(Debug, Default)]
pub struct CellDataOutput {
    buf: Vec<u8>,
}

impl CellDataOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_u8(&mut self, v: u8) {
        self.buf.put_u8(v);
    }

    pub fn write_i8(&mut self, v: i8) {
        self.buf.put_i8(v);
    }

    pub fn write_bool(&mut self, v: bool) {
        self.buf.put_u8(v as u8);
    }

    pub fn write_i32(&mut self, v: i32) {
        self.buf.put_i32_le(v);
    }

    pub fn write_i64(&mut self, v: i64) {
        self.buf.put_i64_le(v);
    }

    pub fn write_f64(&mut self, v: f64) {
        self.buf.put_f64_le(v);
    }

    /// Write a length-prefixed byte string.
    pub fn write_bytes(&mut self, v: &[u8]) {
        self.buf.put_u32_le(v.len() as u32);
        self.buf.put_slice(v);
    }

    /// Write a UTF-8 string. Short strings carry a 16-bit length, longer ones
    /// the marker `0xFFFF` followed by a 32-bit length.
    pub fn write_utf(&mut self, v: &str) {
        let len = v.len();
        if len < LONG_UTF_MARKER as usize {
            self.buf.put_u16_le(len as u16);
        } else {
            self.buf.put_u16_le(LONG_UTF_MARKER);
            self.buf.put_u32_le(len as u32);
        }
        self.buf.put_slice(v.as_bytes());
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

/// Input stream handed to a [`DataCellSerializer`].
pub struct CellDataInput<'a> {
    buf: &'a [u8],
}

macro_rules! read_fixed {
    ($name:ident, $get:ident, $ty:ty) => {
        pub fn $name(&mut self) -> StorageResult<$ty> {
            self.ensure(std::mem::size_of::<$ty>())?;
            Ok(self.buf.$get())
        }
    };
}

impl<'a> CellDataInput<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    fn ensure(&self, len: usize) -> StorageResult<()> {
        if self.buf.remaining() < len {
            return Err(TracedStorageError::decode(format!(
                "cell payload truncated: need {len} bytes, {} left",
                self.buf.remaining()
            )));
        }
        Ok(())
    }

    read_fixed!(read_u8, get_u8, u8);
    read_fixed!(read_i8, get_i8, i8);
    read_fixed!(read_i32, get_i32_le, i32);
    read_fixed!(read_i64, get_i64_le, i64);
    read_fixed!(read_f64, get_f64_le, f64);

    pub fn read_bool(&mut self) -> StorageResult<bool> {
        Ok(self.read_u8()? != 0)
    }

    fn read_slice(&mut self, len: usize) -> StorageResult<&'a [u8]> {
        self.ensure(len)?;
        let (head, tail) = self.buf.split_at(len);
        self.buf = tail;
        Ok(head)
    }

    pub fn read_bytes(&mut self) -> StorageResult<&'a [u8]> {
        self.ensure(4)?;
        let len = self.buf.get_u32_le() as usize;
        self.read_slice(len)
    }

    pub fn read_utf(&mut self) -> StorageResult<String> {
        self.ensure(2)?;
        let mut len = self.buf.get_u16_le() as usize;
        if len == LONG_UTF_MARKER as usize {
            self.ensure(4)?;
            len = self.buf.get_u32_le() as usize;
        }
        let bytes = self.read_slice(len)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|e| TracedStorageError::decode(format!("invalid utf-8 string: {e}")))
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}

/// Writes and reads the cells of one cell class.
pub trait DataCellSerializer: Send + Sync {
    fn serialize(&self, cell: &DataCell, out: &mut CellDataOutput) -> StorageResult<()>;

    fn deserialize(&self, input: &mut CellDataInput<'_>) -> StorageResult<DataCell>;
}

fn unexpected(serializer: &str, cell: &DataCell) -> TracedStorageError {
    TracedStorageError::illegal_state(format!("{serializer} serializer cannot write {cell:?}"))
}

struct IntCellSerializer;

impl DataCellSerializer for IntCellSerializer {
    fn serialize(&self, cell: &DataCell, out: &mut CellDataOutput) -> StorageResult<()> {
        match cell {
            DataCell::Int(v) => {
                out.write_i32(*v);
                Ok(())
            }
            _ => Err(unexpected("int", cell)),
        }
    }

    fn deserialize(&self, input: &mut CellDataInput<'_>) -> StorageResult<DataCell> {
        Ok(DataCell::Int(input.read_i32()?))
    }
}

struct LongCellSerializer;

impl DataCellSerializer for LongCellSerializer {
    fn serialize(&self, cell: &DataCell, out: &mut CellDataOutput) -> StorageResult<()> {
        match cell {
            DataCell::Long(v) => {
                out.write_i64(*v);
                Ok(())
            }
            _ => Err(unexpected("long", cell)),
        }
    }

    fn deserialize(&self, input: &mut CellDataInput<'_>) -> StorageResult<DataCell> {
        Ok(DataCell::Long(input.read_i64()?))
    }
}

struct DoubleCellSerializer;

impl DataCellSerializer for DoubleCellSerializer {
    fn serialize(&self, cell: &DataCell, out: &mut CellDataOutput) -> StorageResult<()> {
        match cell {
            DataCell::Double(v) => {
                out.write_f64(*v);
                Ok(())
            }
            _ => Err(unexpected("double", cell)),
        }
    }

    fn deserialize(&self, input: &mut CellDataInput<'_>) -> StorageResult<DataCell> {
        Ok(DataCell::Double(input.read_f64()?))
    }
}

struct BooleanCellSerializer;

impl DataCellSerializer for BooleanCellSerializer {
    fn serialize(&self, cell: &DataCell, out: &mut CellDataOutput) -> StorageResult<()> {
        match cell {
            DataCell::Boolean(v) => {
                out.write_bool(*v);
                Ok(())
            }
            _ => Err(unexpected("boolean", cell)),
        }
    }

    fn deserialize(&self, input: &mut CellDataInput<'_>) -> StorageResult<DataCell> {
        Ok(DataCell::Boolean(input.read_bool()?))
    }
}

struct StringCellSerializer;

impl DataCellSerializer for StringCellSerializer {
    fn serialize(&self, cell: &DataCell, out: &mut CellDataOutput) -> StorageResult<()> {
        match cell {
            DataCell::String(v) => {
                out.write_utf(v);
                Ok(())
            }
            _ => Err(unexpected("string", cell)),
        }
    }

    fn deserialize(&self, input: &mut CellDataInput<'_>) -> StorageResult<DataCell> {
        Ok(DataCell::String(input.read_utf()?))
    }
}

/// Serializer of an [`ExtensionCell`] class: the optional numeric view
/// followed by the opaque payload.
pub struct ExtensionCellSerializer {
    class_name: Arc<str>,
}

impl ExtensionCellSerializer {
    pub fn new(class_name: impl Into<Arc<str>>) -> Self {
        Self {
            class_name: class_name.into(),
        }
    }
}

impl DataCellSerializer for ExtensionCellSerializer {
    fn serialize(&self, cell: &DataCell, out: &mut CellDataOutput) -> StorageResult<()> {
        match cell {
            DataCell::Extension(ext) if ext.class_name == self.class_name => {
                out.write_bool(ext.numeric.is_some());
                if let Some(v) = ext.numeric {
                    out.write_f64(v);
                }
                out.write_bytes(&ext.payload);
                Ok(())
            }
            _ => Err(unexpected(&self.class_name, cell)),
        }
    }

    fn deserialize(&self, input: &mut CellDataInput<'_>) -> StorageResult<DataCell> {
        let numeric = match input.read_bool()? {
            true => Some(input.read_f64()?),
            false => None,
        };
        let payload = Bytes::copy_from_slice(input.read_bytes()?);
        Ok(DataCell::Extension(ExtensionCell {
            class_name: self.class_name.clone(),
            numeric,
            payload,
        }))
    }
}

pub type DataCellSerializerRef = Arc<dyn DataCellSerializer>;

/// Maps cell class names to their serializers.
#[derive(Clone)]
pub struct CellSerializerRegistry {
    serializers: HashMap<String, DataCellSerializerRef>,
}

impl Default for CellSerializerRegistry {
    /// A registry with the serializers of the built-in cell classes.
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register("int", Arc::new(IntCellSerializer));
        registry.register("long", Arc::new(LongCellSerializer));
        registry.register("double", Arc::new(DoubleCellSerializer));
        registry.register("boolean", Arc::new(BooleanCellSerializer));
        registry.register("string", Arc::new(StringCellSerializer));
        registry
    }
}

impl CellSerializerRegistry {
    pub fn empty() -> Self {
        Self {
            serializers: HashMap::new(),
        }
    }

    pub fn register(&mut self, class_name: impl Into<String>, serializer: DataCellSerializerRef) {
        self.serializers.insert(class_name.into(), serializer);
    }

    /// Register the serializer of an extension cell class.
    pub fn register_extension(&mut self, class_name: &str) {
        self.register(class_name, Arc::new(ExtensionCellSerializer::new(class_name)));
    }

    pub fn contains(&self, class_name: &str) -> bool {
        self.serializers.contains_key(class_name)
    }

    pub fn get(&self, class_name: &str) -> StorageResult<DataCellSerializerRef> {
        self.serializers
            .get(class_name)
            .cloned()
            .ok_or_else(|| TracedStorageError::not_found("cell serializer", class_name))
    }
}
