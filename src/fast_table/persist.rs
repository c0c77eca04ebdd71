// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

//! Saving fast tables and loading them back lazily.
//!
//! A table record is a settings tree next to a chunk file:
//!
//! ```text
//! table_impl               "lazy"
//! table_id                 long
//! table_spec               column names and type keys
//! table_derived_settings
//!   FAST_TABLE_CONTAINER_SIZE   row count
//!   FAST_TABLE_CONTAINER_TYPE   chunk store factory name
//!   FAST_TABLE_MAPPING_TYPE     schema mapping name
//!   FAST_TABLE_SCHEMA_MAPPER    section written by the mapping
//! ```

use std::path::{Path, PathBuf};

use tracing::info;

use super::lazy::{AccessTask, LazyStore};
use super::{FastTable, FastTableEnv, TableBackend};
use crate::settings::Settings;
use crate::storage::{StorageError, StorageResult, TracedStorageError};
use crate::types::{ColumnDesc, DataType, TableSpec};

pub const CFG_TABLE_IMPL: &str = "table_impl";
pub const CFG_TABLE_ID: &str = "table_id";
pub const CFG_TABLE_SPEC: &str = "table_spec";
pub const CFG_TABLE_DERIVED_SETTINGS: &str = "table_derived_settings";
pub const LAZY_TABLE_IMPL: &str = "lazy";

pub const FAST_TABLE_SCHEMA: &str = "FAST_TABLE_SCHEMA_MAPPER";
pub const FAST_TABLE_CONTAINER_SIZE: &str = "FAST_TABLE_CONTAINER_SIZE";
pub const FAST_TABLE_CONTAINER_TYPE: &str = "FAST_TABLE_CONTAINER_TYPE";
pub const FAST_TABLE_MAPPING_TYPE: &str = "FAST_TABLE_MAPPING_TYPE";

const CFG_COLUMN_NAMES: &str = "column_names";
const CFG_COLUMN_TYPES: &str = "column_types";
const EXTENSION_TYPE_PREFIX: &str = "extension:";

fn type_key(data_type: &DataType) -> String {
    match data_type {
        DataType::Int => "int".into(),
        DataType::Long => "long".into(),
        DataType::Double => "double".into(),
        DataType::Boolean => "boolean".into(),
        DataType::String => "string".into(),
        DataType::Extension(name) => format!("{EXTENSION_TYPE_PREFIX}{name}"),
    }
}

fn parse_type_key(key: &str) -> StorageResult<DataType> {
    Ok(match key {
        "int" => DataType::Int,
        "long" => DataType::Long,
        "double" => DataType::Double,
        "boolean" => DataType::Boolean,
        "string" => DataType::String,
        _ => match key.strip_prefix(EXTENSION_TYPE_PREFIX) {
            Some(name) if !name.is_empty() => DataType::Extension(name.into()),
            _ => {
                return Err(TracedStorageError::invalid_settings(format!(
                    "unknown column type \"{key}\""
                )))
            }
        },
    })
}

/// Write a table spec as parallel arrays of names and type keys.
pub fn save_table_spec(spec: &TableSpec, settings: &mut Settings) {
    let columns = spec.columns();
    settings.add_string_array(
        CFG_COLUMN_NAMES,
        columns.iter().map(|c| c.name.clone()).collect(),
    );
    settings.add_string_array(
        CFG_COLUMN_TYPES,
        columns.iter().map(|c| type_key(&c.data_type)).collect(),
    );
}

pub fn load_table_spec(settings: &Settings) -> StorageResult<TableSpec> {
    let names = settings.get_string_array(CFG_COLUMN_NAMES)?;
    let types = settings.get_string_array(CFG_COLUMN_TYPES)?;
    if names.len() != types.len() {
        return Err(TracedStorageError::invalid_settings(format!(
            "{} column names but {} column types",
            names.len(),
            types.len()
        )));
    }
    names
        .iter()
        .zip(types)
        .map(|(name, ty)| Ok(ColumnDesc::new(name.as_str(), parse_type_key(ty)?)))
        .collect()
}

/// What is needed to load a saved table.
#[derive(Debug, Clone)]
pub struct LoadContext {
    pub table_id: i64,
    pub spec: TableSpec,
    /// The derived settings section of the record.
    pub settings: Settings,
    pub data_file: PathBuf,
}

impl LoadContext {
    /// Read the context from a record written by [`FastTable::save_to_file`].
    pub fn from_settings(
        settings: &Settings,
        data_file: impl Into<PathBuf>,
        table_id: i64,
    ) -> StorageResult<Self> {
        let table_impl = settings.get_string(CFG_TABLE_IMPL)?;
        if table_impl != LAZY_TABLE_IMPL {
            return Err(TracedStorageError::invalid_settings(format!(
                "unsupported table implementation \"{table_impl}\""
            )));
        }
        Ok(Self {
            table_id,
            spec: load_table_spec(settings.get_section(CFG_TABLE_SPEC)?)?,
            settings: settings.get_section(CFG_TABLE_DERIVED_SETTINGS)?.clone(),
            data_file: data_file.into(),
        })
    }
}

impl FastTable {
    /// Save the table data to `data_file` and describe the table in
    /// `settings`. Only tables finalized by a writer can be saved.
    pub fn save_to_file(&self, data_file: &Path, settings: &mut Settings) -> StorageResult<()> {
        let TableBackend::Tmp { factory, store, .. } = &self.backend else {
            return Err(TracedStorageError::illegal_state(
                "a loaded table cannot be saved again",
            ));
        };
        if self.cleared.load(std::sync::atomic::Ordering::Acquire) {
            return Err(StorageError::Closed("fast table").into());
        }

        let size = i64::try_from(self.size).map_err(|_| {
            TracedStorageError::illegal_state(format!("table size {} out of range", self.size))
        })?;
        let mut derived = Settings::new();
        derived.add_string(FAST_TABLE_CONTAINER_TYPE, factory.name());
        derived.add_long(FAST_TABLE_CONTAINER_SIZE, size);
        derived.add_string(FAST_TABLE_MAPPING_TYPE, self.mapping.name());
        let mut schema = Settings::new();
        self.mapping.save_to(&mut schema);
        derived.add_section(FAST_TABLE_SCHEMA, schema);

        let mut spec = Settings::new();
        save_table_spec(&self.spec, &mut spec);

        settings.add_string(CFG_TABLE_IMPL, LAZY_TABLE_IMPL);
        settings.add_long(CFG_TABLE_ID, self.table_id);
        settings.add_section(CFG_TABLE_SPEC, spec);
        settings.add_section(CFG_TABLE_DERIVED_SETTINGS, derived);

        store.save_to_file(data_file)?;
        info!(
            table_id = self.table_id,
            rows = self.size,
            path = %data_file.display(),
            "table saved"
        );
        Ok(())
    }

    /// Re-create a saved table. The data file is opened on first access.
    pub fn load(env: &FastTableEnv, ctx: LoadContext) -> StorageResult<Self> {
        let settings = &ctx.settings;
        let size = settings.get_long(FAST_TABLE_CONTAINER_SIZE)?;
        let size = usize::try_from(size).map_err(|_| {
            TracedStorageError::invalid_settings(format!("invalid table size {size}"))
        })?;
        let mapping = env.schema_mappings.load(
            settings.get_string(FAST_TABLE_MAPPING_TYPE)?,
            &ctx.spec,
            settings.get_section(FAST_TABLE_SCHEMA)?,
            env,
        )?;
        let factory = env
            .store_factories
            .get(settings.get_string(FAST_TABLE_CONTAINER_TYPE)?)?;
        info!(
            table_id = ctx.table_id,
            rows = size,
            path = %ctx.data_file.display(),
            "table loaded"
        );
        let task = AccessTask {
            table_id: ctx.table_id,
            factory,
            chunk_specs: mapping.schema().chunk_specs(),
            data_file: ctx.data_file,
            options: env.options.clone(),
        };
        Ok(Self::new_lazy(
            ctx.table_id,
            ctx.spec,
            mapping,
            LazyStore::new(task),
            size,
        ))
    }

    /// The chunk file a loaded table reads from.
    pub fn data_file(&self) -> Option<&Path> {
        match &self.backend {
            TableBackend::Lazy(lazy) => Some(lazy.data_file()),
            TableBackend::Tmp { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_spec_settings() {
        let spec: TableSpec = [
            ColumnDesc::new("a", DataType::Int),
            ColumnDesc::new("b", DataType::Extension("complex".into())),
        ]
        .into_iter()
        .collect();
        let mut settings = Settings::new();
        save_table_spec(&spec, &mut settings);
        assert_eq!(load_table_spec(&settings).unwrap(), spec);

        settings.add_string_array(CFG_COLUMN_TYPES, vec!["int".into(), "extension:".into()]);
        assert!(load_table_spec(&settings).is_err());
        settings.add_string_array(CFG_COLUMN_TYPES, vec!["int".into()]);
        assert!(load_table_spec(&settings).is_err());
    }

    #[test]
    fn test_unknown_table_impl() {
        let mut settings = Settings::new();
        settings.add_string(CFG_TABLE_IMPL, "rowstore");
        let err = LoadContext::from_settings(&settings, "data.bin", 1).unwrap_err();
        assert!(matches!(err.kind(), StorageError::InvalidSettings(_)));
    }
}
