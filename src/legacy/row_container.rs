// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

use std::sync::Arc;

use tracing::{info, warn};

use super::LegacySchemaMapping;
use crate::fast_table::{FastTable, FastTableEnv, TableSchemaMapping};
use crate::storage::{
    ChunkStoreFactoryRef, StorageError, StorageResult, TableChunkStore, TracedStorageError,
    WriteCursor,
};
use crate::types::{DataRow, RowKey, TableSpec};

/// Write the key and cells of `row` at the current cursor position.
fn write_row(
    cursor: &mut WriteCursor,
    key: Option<&RowKey>,
    row: &(impl DataRow + ?Sized),
) -> StorageResult<()> {
    if let Some(key) = key {
        cursor.get(0)?.set_row_key(key)?;
    }
    let offset = key.is_some() as usize;
    for i in 0..row.num_cells() {
        let cell = row.cell(i)?;
        cursor.get(i + offset)?.set_data_cell(&cell)?;
    }
    Ok(())
}

/// Builds a fast table by appending rows.
///
/// Rows go through the legacy schema mapping into a write store. After
/// [`LegacyRowContainer::close`] the container hands out the finalized table.
pub struct LegacyRowContainer {
    table_id: i64,
    spec: TableSpec,
    mapping: Arc<LegacySchemaMapping>,
    factory: ChunkStoreFactoryRef,
    store: Arc<dyn TableChunkStore>,
    cursor: Option<WriteCursor>,
    size: usize,
    table: Option<Arc<FastTable>>,
}

impl LegacyRowContainer {
    fn new(
        env: &FastTableEnv,
        table_id: i64,
        spec: TableSpec,
        is_row_key: bool,
    ) -> StorageResult<Self> {
        let mapping = Arc::new(LegacySchemaMapping::new(
            &spec,
            is_row_key,
            env.serializers.clone(),
        )?);
        let factory = env.default_factory()?;
        let store = factory.create_write_store(&mapping.schema().chunk_specs(), &env.options)?;
        let cursor = WriteCursor::new(mapping.schema(), store.clone(), env.options.chunk_size);
        Ok(Self {
            table_id,
            spec,
            mapping,
            factory,
            store,
            cursor: Some(cursor),
            size: 0,
            table: None,
        })
    }

    pub fn table_spec(&self) -> &TableSpec {
        &self.spec
    }

    /// Number of rows added so far.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn add_row(&mut self, row: &(impl DataRow + ?Sized)) -> StorageResult<()> {
        let cursor = self
            .cursor
            .as_mut()
            .ok_or(StorageError::Closed("row container"))?;
        if row.num_cells() != self.spec.num_columns() {
            return Err(TracedStorageError::illegal_state(format!(
                "row has {} cells, table has {} columns",
                row.num_cells(),
                self.spec.num_columns()
            )));
        }
        let key = match self.mapping.is_row_key() {
            true => Some(row.try_key().ok_or_else(|| {
                TracedStorageError::illegal_state("row has no key, but the table stores row keys")
            })?),
            false => None,
        };
        cursor.forward()?;
        if let Err(e) = write_row(cursor, key, row) {
            cursor.rollback();
            return Err(e);
        }
        self.size += 1;
        Ok(())
    }

    /// Flush the remaining rows and finalize the table. Closing twice is a
    /// no-op.
    pub fn close(&mut self) -> StorageResult<()> {
        let Some(mut cursor) = self.cursor.take() else {
            return Ok(());
        };
        cursor.close()?;
        let num_batches = self.store.num_batches();
        self.table = Some(Arc::new(FastTable::new_tmp(
            self.table_id,
            self.spec.clone(),
            self.mapping.clone(),
            self.factory.clone(),
            self.store.clone(),
            self.size,
        )));
        info!(
            table_id = self.table_id,
            rows = self.size,
            batches = num_batches,
            "table finalized"
        );
        Ok(())
    }

    /// The finalized table. Fails if the container has not been closed.
    pub fn table(&self) -> StorageResult<Arc<FastTable>> {
        self.table.clone().ok_or_else(|| {
            TracedStorageError::illegal_state("row container must be closed before getting the table")
        })
    }

    /// Release the backing store. Errors are logged and dropped.
    pub fn clear(&mut self) {
        if let Some(table) = &self.table {
            table.clear();
            return;
        }
        if let Some(mut cursor) = self.cursor.take() {
            if let Err(e) = cursor.close() {
                warn!(table_id = self.table_id, "failed to close write cursor: {}", e);
            }
        }
        if let Err(e) = self.store.close() {
            warn!(table_id = self.table_id, "failed to close chunk store: {}", e);
        }
    }
}

/// Creates [`LegacyRowContainer`]s for the tables the legacy mapping can
/// store.
#[derive(Debug, Default, Clone, Copy)]
pub struct LegacyRowContainerFactory;

impl LegacyRowContainerFactory {
    /// Whether every column type has a columnar mapping.
    pub fn supports(&self, spec: &TableSpec) -> bool {
        LegacySchemaMapping::supports(spec)
    }

    pub fn create(
        &self,
        env: &FastTableEnv,
        table_id: i64,
        spec: TableSpec,
        is_row_key: bool,
    ) -> StorageResult<LegacyRowContainer> {
        LegacyRowContainer::new(env, table_id, spec, is_row_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StoreOptions;
    use bytes::Bytes;

    use crate::types::{ColumnDesc, DataCell, DataType, DefaultRow, ExtensionCell};

    fn container(is_row_key: bool) -> LegacyRowContainer {
        let env = FastTableEnv::new(StoreOptions::default_for_test());
        let spec = TableSpec::new(vec![ColumnDesc::new("x", DataType::Long)]);
        LegacyRowContainerFactory
            .create(&env, 7, spec, is_row_key)
            .unwrap()
    }

    #[test]
    fn test_table_before_close() {
        let mut container = container(false);
        container
            .add_row(&DefaultRow::without_key(vec![DataCell::Long(1)]))
            .unwrap();
        let err = container.table().unwrap_err();
        assert!(matches!(err.kind(), StorageError::IllegalState(_)));
        container.close().unwrap();
        container.close().unwrap();
        let table = container.table().unwrap();
        assert_eq!(table.size(), 1);
        assert_eq!(table.table_id(), 7);
        assert!(container
            .add_row(&DefaultRow::without_key(vec![DataCell::Long(2)]))
            .is_err());
    }

    #[test]
    fn test_row_shape_is_checked() {
        let mut container = container(true);
        assert!(container
            .add_row(&DefaultRow::without_key(vec![DataCell::Long(1)]))
            .is_err());
        assert!(container
            .add_row(&DefaultRow::new("r1", vec![]))
            .is_err());
        assert_eq!(container.size(), 0);
        container.clear();
    }

    #[test]
    fn test_failed_row_is_not_stored() {
        let env = FastTableEnv::new(StoreOptions::default_for_test());
        let spec = TableSpec::new(vec![ColumnDesc::new("d", DataType::Double)]);
        let mut container = LegacyRowContainerFactory
            .create(&env, 3, spec, true)
            .unwrap();
        let unregistered =
            DataCell::Extension(ExtensionCell::new("unregistered", Some(1.0), Bytes::new()));
        for i in 0..6 {
            container
                .add_row(&DefaultRow::new(format!("Row{i}"), vec![DataCell::Double(i as f64)]))
                .unwrap();
            assert!(container
                .add_row(&DefaultRow::new("bad", vec![unregistered.clone()]))
                .is_err());
            assert!(container
                .add_row(&DefaultRow::new("bad", vec![DataCell::Unmaterialized]))
                .is_err());
        }
        container.close().unwrap();
        let table = container.table().unwrap();
        assert_eq!(table.size(), 6);

        let rows = table
            .iterator()
            .unwrap()
            .collect::<StorageResult<Vec<_>>>()
            .unwrap();
        assert_eq!(rows.len(), 6);
        for (i, row) in rows.iter().enumerate() {
            assert_eq!(row.key().as_str(), format!("Row{i}"));
            assert_eq!(row.cells().unwrap(), vec![DataCell::Double(i as f64)]);
        }
    }

    #[test]
    fn test_clear_before_close() {
        let mut container = container(true);
        container
            .add_row(&DefaultRow::new("r1", vec![DataCell::Long(1)]))
            .unwrap();
        container.clear();
        container.clear();
        assert!(container.table().is_err());
    }
}
