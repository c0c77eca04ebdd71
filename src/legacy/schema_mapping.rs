// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

use std::sync::Arc;

use super::{CellSerializerRegistry, DataCellSerMap, LegacyDataCellColumnSpec, PrimitiveMapping};
use crate::fast_table::{FastTableEnv, TableSchemaMapping, TableSchemaMappingRef};
use crate::settings::Settings;
use crate::storage::{ColumnSpecRef, RowKeyColumnSpec, StorageError, StorageResult, TableSchema};
use crate::types::TableSpec;

pub const TABLE_SCHEMA_MAPPING_ROWKEY: &str = "TABLE_SCHEMA_MAPPING_ROWKEY";

/// Maps every data column onto a [`LegacyDataCellColumnSpec`]. All columns
/// share one [`DataCellSerMap`].
pub struct LegacySchemaMapping {
    is_row_key: bool,
    schema: TableSchema,
    ser_map: Arc<DataCellSerMap>,
}

impl LegacySchemaMapping {
    pub const NAME: &'static str = "legacy";

    pub fn new(
        spec: &TableSpec,
        is_row_key: bool,
        serializers: Arc<CellSerializerRegistry>,
    ) -> StorageResult<Self> {
        Self::with_ser_map(spec, is_row_key, Arc::new(DataCellSerMap::new(serializers)))
    }

    fn with_ser_map(
        spec: &TableSpec,
        is_row_key: bool,
        ser_map: Arc<DataCellSerMap>,
    ) -> StorageResult<Self> {
        let mut columns: Vec<ColumnSpecRef> = Vec::with_capacity(spec.num_columns() + 1);
        if is_row_key {
            columns.push(Arc::new(RowKeyColumnSpec));
        }
        for column in spec.columns() {
            let mapping = PrimitiveMapping::for_type(&column.data_type).ok_or_else(|| {
                StorageError::UnsupportedColumnType {
                    column: column.name.clone(),
                    data_type: column.data_type.to_string(),
                }
            })?;
            columns.push(Arc::new(LegacyDataCellColumnSpec::new(
                mapping,
                ser_map.clone(),
            )));
        }
        Ok(Self {
            is_row_key,
            schema: TableSchema::new(columns),
            ser_map,
        })
    }

    /// Whether every column of the spec has a primitive mapping.
    pub fn supports(spec: &TableSpec) -> bool {
        spec.columns()
            .iter()
            .all(|c| PrimitiveMapping::for_type(&c.data_type).is_some())
    }

    /// Rebuild the mapping saved by [`TableSchemaMapping::save_to`] for the
    /// same spec.
    pub fn load_from(
        spec: &TableSpec,
        settings: &Settings,
        serializers: Arc<CellSerializerRegistry>,
    ) -> StorageResult<Self> {
        let is_row_key = settings.get_bool(TABLE_SCHEMA_MAPPING_ROWKEY)?;
        let ser_map = DataCellSerMap::load_from(serializers, settings)?;
        Self::with_ser_map(spec, is_row_key, Arc::new(ser_map))
    }

    /// Loader registered in the [`FastTableEnv`].
    pub fn load(
        spec: &TableSpec,
        settings: &Settings,
        env: &FastTableEnv,
    ) -> StorageResult<TableSchemaMappingRef> {
        Ok(Arc::new(Self::load_from(
            spec,
            settings,
            env.serializers.clone(),
        )?))
    }

    pub fn ser_map(&self) -> &Arc<DataCellSerMap> {
        &self.ser_map
    }
}

impl TableSchemaMapping for LegacySchemaMapping {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn schema(&self) -> &TableSchema {
        &self.schema
    }

    fn is_row_key(&self) -> bool {
        self.is_row_key
    }

    fn save_to(&self, settings: &mut Settings) {
        self.ser_map.save_to(settings);
        settings.add_bool(TABLE_SCHEMA_MAPPING_ROWKEY, self.is_row_key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::ChunkSpec;
    use crate::types::{ColumnDesc, DataCell, DataType};

    fn spec() -> TableSpec {
        TableSpec::new(vec![
            ColumnDesc::new("id", DataType::Int),
            ColumnDesc::new("name", DataType::String),
        ])
    }

    #[test]
    fn test_schema_layout() {
        let serializers = Arc::new(CellSerializerRegistry::default());
        let mapping = LegacySchemaMapping::new(&spec(), true, serializers.clone()).unwrap();
        assert_eq!(
            mapping.schema().chunk_specs(),
            vec![
                ChunkSpec::RowKey,
                ChunkSpec::BinarySuppl(Box::new(ChunkSpec::Int)),
                ChunkSpec::BinarySuppl(Box::new(ChunkSpec::String)),
            ]
        );
        let mapping = LegacySchemaMapping::new(&spec(), false, serializers).unwrap();
        assert_eq!(mapping.schema().num_columns(), 2);
        assert!(!mapping.is_row_key());
    }

    #[test]
    fn test_unsupported_column() {
        let spec = TableSpec::new(vec![
            ColumnDesc::new("id", DataType::Int),
            ColumnDesc::new("shape", DataType::Extension("polygon".into())),
        ]);
        assert!(!LegacySchemaMapping::supports(&spec));
        let err = LegacySchemaMapping::new(&spec, true, Arc::default())
            .err()
            .unwrap();
        assert!(matches!(
            err.kind(),
            StorageError::UnsupportedColumnType { column, .. } if column == "shape"
        ));
    }

    #[test]
    fn test_save_and_load() {
        let serializers = Arc::new(CellSerializerRegistry::default());
        let mapping = LegacySchemaMapping::new(&spec(), true, serializers.clone()).unwrap();
        mapping.ser_map().write_data_cell(&DataCell::Long(3)).unwrap();
        mapping.ser_map().write_data_cell(&DataCell::Double(3.0)).unwrap();

        let mut settings = Settings::new();
        mapping.save_to(&mut settings);
        let loaded = LegacySchemaMapping::load_from(&spec(), &settings, serializers).unwrap();
        assert!(loaded.is_row_key());
        assert_eq!(loaded.ser_map().class_names(), vec!["long", "double"]);
        assert_eq!(loaded.schema().chunk_specs(), mapping.schema().chunk_specs());
    }
}
