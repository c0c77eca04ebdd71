// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use super::{CellDataInput, CellDataOutput, CellSerializerRegistry, DataCellSerializerRef};
use crate::settings::Settings;
use crate::storage::{StorageError, StorageResult, TracedStorageError};
use crate::types::DataCell;

pub const TABLE_SCHEMA_MAPPING_TYPES: &str = "TABLE_SCHEMA_MAPPING_TYPES";

/// Maximum number of distinct cell classes in one table.
pub const MAX_CELL_CLASSES: usize = 127;

/// Per-table registry between cell classes and one-byte tags.
///
/// Tags are handed out on first use, starting at `i8::MIN`. The classes are
/// persisted in tag order, so reloading reproduces the tags written into the
/// chunks.
pub struct DataCellSerMap {
    serializers: Arc<CellSerializerRegistry>,
    inner: RwLock<SerMapInner>,
}

#[derive(Default)]
struct SerMapInner {
    by_class: HashMap<String, i8>,
    /// Class names in tag order.
    by_tag: Vec<String>,
}

fn tag_of(index: usize) -> i8 {
    (i8::MIN as i16 + index as i16) as i8
}

fn index_of(tag: i8) -> usize {
    (tag as i16 - i8::MIN as i16) as usize
}

impl SerMapInner {
    fn insert(&mut self, class_name: &str) -> StorageResult<i8> {
        if self.by_tag.len() == MAX_CELL_CLASSES {
            return Err(StorageError::TooManyCellClasses(MAX_CELL_CLASSES).into());
        }
        let tag = tag_of(self.by_tag.len());
        self.by_tag.push(class_name.to_owned());
        self.by_class.insert(class_name.to_owned(), tag);
        Ok(tag)
    }
}

impl DataCellSerMap {
    pub fn new(serializers: Arc<CellSerializerRegistry>) -> Self {
        Self {
            serializers,
            inner: RwLock::new(SerMapInner::default()),
        }
    }

    /// The tag and serializer of a cell, assigning a new tag to an unseen class.
    pub fn serializer_for(&self, cell: &DataCell) -> StorageResult<(i8, DataCellSerializerRef)> {
        let class_name = cell.class_name().ok_or_else(|| {
            TracedStorageError::illegal_state(format!("{cell:?} has no serializer"))
        })?;
        if let Some(&tag) = self.inner.read().by_class.get(class_name) {
            return Ok((tag, self.serializers.get(class_name)?));
        }
        let serializer = self.serializers.get(class_name)?;
        let mut inner = self.inner.write();
        let tag = match inner.by_class.get(class_name) {
            Some(&tag) => tag,
            None => {
                let tag = inner.insert(class_name)?;
                debug!(class_name, tag, "assigned serializer tag");
                tag
            }
        };
        Ok((tag, serializer))
    }

    pub fn serializer_by_tag(&self, tag: i8) -> StorageResult<DataCellSerializerRef> {
        let inner = self.inner.read();
        let class_name = inner
            .by_tag
            .get(index_of(tag))
            .ok_or(StorageError::UnknownSerializerTag(tag))?;
        self.serializers.get(class_name)
    }

    /// Serialize a cell as its tag followed by the serializer's bytes.
    pub fn write_data_cell(&self, cell: &DataCell) -> StorageResult<Vec<u8>> {
        let (tag, serializer) = self.serializer_for(cell)?;
        let mut out = CellDataOutput::new();
        out.write_i8(tag);
        serializer.serialize(cell, &mut out)?;
        Ok(out.into_bytes())
    }

    pub fn read_data_cell(&self, bytes: &[u8]) -> StorageResult<DataCell> {
        let mut input = CellDataInput::new(bytes);
        let tag = input.read_i8()?;
        self.serializer_by_tag(tag)?.deserialize(&mut input)
    }

    /// Class names in tag order.
    pub fn class_names(&self) -> Vec<String> {
        self.inner.read().by_tag.clone()
    }

    pub fn save_to(&self, settings: &mut Settings) {
        settings.add_string_array(TABLE_SCHEMA_MAPPING_TYPES, self.class_names());
    }

    /// Rebuild the map saved by [`DataCellSerMap::save_to`]. Every class must
    /// have a registered serializer.
    pub fn load_from(
        serializers: Arc<CellSerializerRegistry>,
        settings: &Settings,
    ) -> StorageResult<Self> {
        let mut inner = SerMapInner::default();
        for class_name in settings.get_string_array(TABLE_SCHEMA_MAPPING_TYPES)? {
            serializers.get(class_name)?;
            inner.insert(class_name)?;
        }
        Ok(Self {
            serializers,
            inner: RwLock::new(inner),
        })
    }
}
