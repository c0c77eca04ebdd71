// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

use std::sync::Arc;

use super::{DataCellSerMap, PrimitiveMapping};
use crate::storage::{Chunk, ChunkSpec, ColumnAccess, ColumnSpec, StorageResult, TracedStorageError};
use crate::types::DataCell;

/// A data column stored as a primitive chunk paired with a supplementary
/// binary chunk.
///
/// The supplement carries what the primitive chunk cannot express: cells of a
/// foreign class (serialized with their type tag) and the cause of a missing
/// value. Per row the two missing flags encode:
///
/// | primitive | supplement | cell                               |
/// |-----------|------------|------------------------------------|
/// | value     | missing    | the primitive value                |
/// | value     | bytes      | the serialized cell                |
/// | missing   | bytes      | missing, bytes are the UTF-8 cause |
/// | missing   | missing    | missing without cause              |
#[derive(Clone)]
pub struct LegacyDataCellColumnSpec {
    mapping: PrimitiveMapping,
    ser_map: Arc<DataCellSerMap>,
}

impl std::fmt::Debug for LegacyDataCellColumnSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LegacyDataCellColumnSpec")
            .field("mapping", &self.mapping)
            .finish_non_exhaustive()
    }
}

impl LegacyDataCellColumnSpec {
    pub fn new(mapping: PrimitiveMapping, ser_map: Arc<DataCellSerMap>) -> Self {
        Self { mapping, ser_map }
    }

    pub fn mapping(&self) -> PrimitiveMapping {
        self.mapping
    }
}

impl ColumnSpec for LegacyDataCellColumnSpec {
    fn chunk_spec(&self) -> ChunkSpec {
        ChunkSpec::BinarySuppl(Box::new(self.mapping.chunk_spec()))
    }

    fn create_access(&self) -> Arc<dyn ColumnAccess> {
        Arc::new(DataCellColumnAccess {
            mapping: self.mapping,
            ser_map: self.ser_map.clone(),
        })
    }
}

struct DataCellColumnAccess {
    mapping: PrimitiveMapping,
    ser_map: Arc<DataCellSerMap>,
}

impl ColumnAccess for DataCellColumnAccess {
    fn read_cell(&self, chunk: &Chunk, index: usize) -> StorageResult<DataCell> {
        let supplement = chunk.supplement()?;
        match (chunk.is_missing(index), supplement.is_missing(index)) {
            (false, true) => self.mapping.get(chunk, index),
            (false, false) => self.ser_map.read_data_cell(supplement.get_bytes(index)),
            (true, false) => {
                let cause = String::from_utf8_lossy(supplement.get_bytes(index));
                Ok(DataCell::missing_with_cause(cause))
            }
            (true, true) => Ok(DataCell::MISSING),
        }
    }

    fn write_cell(&self, chunk: &mut Chunk, index: usize, cell: &DataCell) -> StorageResult<()> {
        match cell {
            DataCell::Unmaterialized => {
                return Err(TracedStorageError::illegal_state(
                    "cannot write an unmaterialized cell",
                ))
            }
            DataCell::Missing(cause) => {
                chunk.set_missing(index);
                let supplement = chunk.supplement_mut()?;
                match cause {
                    Some(cause) => supplement.set_str(index, cause),
                    None => supplement.set_missing(index),
                }
            }
            cell if self.mapping.matches(cell) => {
                self.mapping.set(chunk, index, cell)?;
                chunk.supplement_mut()?.set_missing(index);
            }
            cell => {
                // keep the projection for readers of the primitive chunk
                self.mapping.set(chunk, index, cell)?;
                let bytes = self.ser_map.write_data_cell(cell)?;
                chunk.supplement_mut()?.set_bytes(index, &bytes);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;
    use crate::legacy::CellSerializerRegistry;
    use crate::types::ExtensionCell;

    fn spec(mapping: PrimitiveMapping) -> (LegacyDataCellColumnSpec, Arc<DataCellSerMap>) {
        let mut registry = CellSerializerRegistry::default();
        registry.register_extension("complex");
        let ser_map = Arc::new(DataCellSerMap::new(Arc::new(registry)));
        (LegacyDataCellColumnSpec::new(mapping, ser_map.clone()), ser_map)
    }

    fn write_read(mapping: PrimitiveMapping, cell: &DataCell) -> (DataCell, Chunk) {
        let (spec, _) = spec(mapping);
        let access = spec.create_access();
        let mut chunk = spec.chunk_spec().create_chunk(1);
        access.write_cell(&mut chunk, 0, cell).unwrap();
        (access.read_cell(&chunk, 0).unwrap(), chunk)
    }

    #[test]
    fn test_native_cell() {
        let (cell, chunk) = write_read(PrimitiveMapping::Int, &DataCell::Int(4));
        assert_eq!(cell, DataCell::Int(4));
        assert!(chunk.supplement().unwrap().is_missing(0));
    }

    #[test]
    fn test_missing_cells() {
        let (cell, chunk) = write_read(PrimitiveMapping::String, &DataCell::MISSING);
        assert_eq!(cell, DataCell::MISSING);
        assert!(chunk.is_missing(0));
        assert!(chunk.supplement().unwrap().is_missing(0));

        let with_cause = DataCell::missing_with_cause("sensor offline");
        let (cell, chunk) = write_read(PrimitiveMapping::Double, &with_cause);
        assert_eq!(cell, with_cause);
        assert!(chunk.is_missing(0));
        assert_eq!(chunk.supplement().unwrap().get_bytes(0), b"sensor offline");
    }

    #[test]
    fn test_foreign_cell_keeps_exact_type() {
        let (cell, chunk) = write_read(PrimitiveMapping::Double, &DataCell::Int(3));
        assert_eq!(cell, DataCell::Int(3));
        assert_eq!(chunk.get_double(0).unwrap(), 3.0);

        let complex = DataCell::Extension(ExtensionCell::new(
            "complex",
            Some(1.0),
            Bytes::from_static(b"1+1i"),
        ));
        let (cell, chunk) = write_read(PrimitiveMapping::Double, &complex);
        assert_eq!(cell, complex);
        assert_eq!(chunk.get_double(0).unwrap(), 1.0);
    }

    #[test]
    fn test_foreign_cell_registers_tag() {
        let (spec, ser_map) = spec(PrimitiveMapping::Long);
        let access = spec.create_access();
        let mut chunk = spec.chunk_spec().create_chunk(2);
        access.write_cell(&mut chunk, 0, &DataCell::Long(1)).unwrap();
        access.write_cell(&mut chunk, 1, &DataCell::from("x")).unwrap();
        assert_eq!(ser_map.class_names(), vec!["string"]);
        assert_eq!(chunk.supplement().unwrap().get_bytes(1)[0] as i8, i8::MIN);
    }

    #[test]
    fn test_unmaterialized_cannot_be_written() {
        let (spec, _) = spec(PrimitiveMapping::Int);
        let mut chunk = spec.chunk_spec().create_chunk(1);
        assert!(spec
            .create_access()
            .write_cell(&mut chunk, 0, &DataCell::Unmaterialized)
            .is_err());
    }
}
