// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

use crate::storage::{Chunk, ChunkSpec, PrimitiveFixedWidthEncode, StorageResult};
use crate::types::{DataCell, DataType};

/// The primitive representation of a column type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveMapping {
    Int,
    Long,
    Double,
    Boolean,
    String,
}

impl PrimitiveMapping {
    /// The mapping of a column type, `None` if the type has no primitive
    /// representation.
    pub fn for_type(data_type: &DataType) -> Option<Self> {
        match data_type {
            DataType::Int => Some(Self::Int),
            DataType::Long => Some(Self::Long),
            DataType::Double => Some(Self::Double),
            DataType::Boolean => Some(Self::Boolean),
            DataType::String => Some(Self::String),
            DataType::Extension(_) => None,
        }
    }

    pub fn chunk_spec(&self) -> ChunkSpec {
        match self {
            Self::Int => ChunkSpec::Int,
            Self::Long => ChunkSpec::Long,
            Self::Double => ChunkSpec::Double,
            Self::Boolean => ChunkSpec::Boolean,
            Self::String => ChunkSpec::String,
        }
    }

    /// Class name of the cells this mapping stores natively.
    pub fn cell_class(&self) -> &'static str {
        match self {
            Self::Int => "int",
            Self::Long => "long",
            Self::Double => "double",
            Self::Boolean => "boolean",
            Self::String => "string",
        }
    }

    /// Whether the cell is of the native class of this mapping.
    pub fn matches(&self, cell: &DataCell) -> bool {
        matches!(
            (self, cell),
            (Self::Int, DataCell::Int(_))
                | (Self::Long, DataCell::Long(_))
                | (Self::Double, DataCell::Double(_))
                | (Self::Boolean, DataCell::Boolean(_))
                | (Self::String, DataCell::String(_))
        )
    }

    /// Write the primitive value of a cell. Cells of a foreign class are
    /// projected on a best-effort basis, falling back to the default value.
    pub fn set(&self, chunk: &mut Chunk, index: usize, cell: &DataCell) -> StorageResult<()> {
        match self {
            Self::Int => {
                let v = match cell {
                    DataCell::Int(v) => *v,
                    _ => *i32::DEFAULT_VALUE,
                };
                chunk.set_int(index, v)
            }
            Self::Long => {
                let v = cell.long_value().unwrap_or(*i64::DEFAULT_VALUE);
                chunk.set_long(index, v)
            }
            Self::Double => {
                let v = cell.numeric_value().unwrap_or(*f64::DEFAULT_VALUE);
                chunk.set_double(index, v)
            }
            Self::Boolean => {
                let v = match cell {
                    DataCell::Boolean(v) => *v,
                    _ => *bool::DEFAULT_VALUE,
                };
                chunk.set_boolean(index, v)
            }
            Self::String => match cell {
                DataCell::String(v) => chunk.set_string(index, v),
                other => chunk.set_string(index, &other.to_string()),
            },
        }
    }

    /// Read the primitive value at `index` as a cell of the native class.
    pub fn get(&self, chunk: &Chunk, index: usize) -> StorageResult<DataCell> {
        Ok(match self {
            Self::Int => DataCell::Int(chunk.get_int(index)?),
            Self::Long => DataCell::Long(chunk.get_long(index)?),
            Self::Double => DataCell::Double(chunk.get_double(index)?),
            Self::Boolean => DataCell::Boolean(chunk.get_boolean(index)?),
            Self::String => DataCell::String(chunk.get_string(index)?.to_owned()),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use bytes::Bytes;
    use test_case::test_case;

    use super::*;
    use crate::types::ExtensionCell;

    #[test_case(PrimitiveMapping::Int, DataCell::Int(7))]
    #[test_case(PrimitiveMapping::Long, DataCell::Long(-7))]
    #[test_case(PrimitiveMapping::Double, DataCell::Double(0.5))]
    #[test_case(PrimitiveMapping::Boolean, DataCell::Boolean(true))]
    #[test_case(PrimitiveMapping::String, DataCell::from("x"))]
    fn test_native_cells(mapping: PrimitiveMapping, cell: DataCell) {
        assert!(mapping.matches(&cell));
        assert_eq!(Some(mapping.cell_class()), cell.class_name());
        let mut chunk = mapping.chunk_spec().create_chunk(2);
        mapping.set(&mut chunk, 1, &cell).unwrap();
        assert!(chunk.is_missing(0));
        assert_eq!(mapping.get(&chunk, 1).unwrap(), cell);
    }

    #[test_case(PrimitiveMapping::Double, DataCell::Int(3), DataCell::Double(3.0))]
    #[test_case(PrimitiveMapping::Long, DataCell::Int(3), DataCell::Long(3))]
    #[test_case(PrimitiveMapping::Int, DataCell::Long(3), DataCell::Int(0))]
    #[test_case(PrimitiveMapping::String, DataCell::Int(3), DataCell::from("3"))]
    #[test_case(PrimitiveMapping::Boolean, DataCell::from("true"), DataCell::Boolean(false))]
    fn test_foreign_projection(mapping: PrimitiveMapping, cell: DataCell, projected: DataCell) {
        assert!(!mapping.matches(&cell));
        let mut chunk = mapping.chunk_spec().create_chunk(1);
        mapping.set(&mut chunk, 0, &cell).unwrap();
        assert_eq!(mapping.get(&chunk, 0).unwrap(), projected);
    }

    #[test]
    fn test_extension_numeric_projection() {
        let cell = DataCell::Extension(ExtensionCell::new(
            Arc::<str>::from("complex"),
            Some(2.5),
            Bytes::new(),
        ));
        let mut chunk = ChunkSpec::Double.create_chunk(1);
        PrimitiveMapping::Double.set(&mut chunk, 0, &cell).unwrap();
        assert_eq!(chunk.get_double(0).unwrap(), 2.5);
        assert_eq!(PrimitiveMapping::for_type(&DataType::Extension("complex".into())), None);
    }
}
