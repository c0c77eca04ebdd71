// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

//! Run-time registries used to create and reload fast tables.

use std::collections::HashMap;
use std::sync::Arc;

use crate::legacy::{CellSerializerRegistry, LegacySchemaMapping};
use crate::settings::Settings;
use crate::storage::{
    ChunkStoreFactoryRef, ColumnarFileStoreFactory, StorageResult, StoreOptions, TableSchema,
    TracedStorageError,
};
use crate::types::TableSpec;

/// Translates a logical table spec into a physical [`TableSchema`].
///
/// Mappings are persisted by [`TableSchemaMapping::name`] and re-created
/// through the [`SchemaMappingRegistry`] when a table is loaded.
pub trait TableSchemaMapping: Send + Sync {
    fn name(&self) -> &str;

    fn schema(&self) -> &TableSchema;

    /// Whether the first physical column holds the row keys.
    fn is_row_key(&self) -> bool;

    /// Persist the state needed to rebuild this mapping for the same spec.
    fn save_to(&self, settings: &mut Settings);
}

pub type TableSchemaMappingRef = Arc<dyn TableSchemaMapping>;

/// Rebuilds a schema mapping from the settings written by
/// [`TableSchemaMapping::save_to`].
pub type SchemaMappingLoader =
    fn(&TableSpec, &Settings, &FastTableEnv) -> StorageResult<TableSchemaMappingRef>;

#[derive(Clone, Default)]
pub struct SchemaMappingRegistry {
    loaders: HashMap<String, SchemaMappingLoader>,
}

impl SchemaMappingRegistry {
    pub fn register(&mut self, name: impl Into<String>, loader: SchemaMappingLoader) {
        self.loaders.insert(name.into(), loader);
    }

    pub fn load(
        &self,
        name: &str,
        spec: &TableSpec,
        settings: &Settings,
        env: &FastTableEnv,
    ) -> StorageResult<TableSchemaMappingRef> {
        let loader = self
            .loaders
            .get(name)
            .ok_or_else(|| TracedStorageError::not_found("schema mapping", name))?;
        loader(spec, settings, env)
    }
}

#[derive(Clone, Default)]
pub struct ChunkStoreFactoryRegistry {
    factories: HashMap<String, ChunkStoreFactoryRef>,
}

impl ChunkStoreFactoryRegistry {
    /// Register a factory under its own name, replacing any previous one.
    pub fn register(&mut self, factory: ChunkStoreFactoryRef) {
        self.factories.insert(factory.name().to_owned(), factory);
    }

    pub fn get(&self, name: &str) -> StorageResult<ChunkStoreFactoryRef> {
        self.factories
            .get(name)
            .cloned()
            .ok_or_else(|| TracedStorageError::not_found("chunk store factory", name))
    }
}

/// Everything needed to create, save and load fast tables.
#[derive(Clone)]
pub struct FastTableEnv {
    pub store_factories: ChunkStoreFactoryRegistry,
    pub schema_mappings: SchemaMappingRegistry,
    pub serializers: Arc<CellSerializerRegistry>,
    pub options: StoreOptions,
    /// Factory used for newly created tables.
    pub default_factory: String,
}

impl Default for FastTableEnv {
    fn default() -> Self {
        Self::new(StoreOptions::default())
    }
}

impl FastTableEnv {
    /// An environment with the built-in store factory, schema mapping and
    /// cell serializers.
    pub fn new(options: StoreOptions) -> Self {
        let mut store_factories = ChunkStoreFactoryRegistry::default();
        store_factories.register(Arc::new(ColumnarFileStoreFactory));
        let mut schema_mappings = SchemaMappingRegistry::default();
        schema_mappings.register(LegacySchemaMapping::NAME, LegacySchemaMapping::load);
        Self {
            store_factories,
            schema_mappings,
            serializers: Arc::new(CellSerializerRegistry::default()),
            options,
            default_factory: ColumnarFileStoreFactory::NAME.to_owned(),
        }
    }

    pub fn with_serializers(mut self, serializers: CellSerializerRegistry) -> Self {
        self.serializers = Arc::new(serializers);
        self
    }

    /// Register a store factory and use it for new tables.
    pub fn with_default_factory(mut self, factory: ChunkStoreFactoryRef) -> Self {
        self.default_factory = factory.name().to_owned();
        self.store_factories.register(factory);
        self
    }

    pub fn default_factory(&self) -> StorageResult<ChunkStoreFactoryRef> {
        self.store_factories.get(&self.default_factory)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StorageError;

    #[test]
    fn test_builtin_registrations() {
        let env = FastTableEnv::new(StoreOptions::default_for_test());
        assert_eq!(env.default_factory().unwrap().name(), "columnar_file");
        assert!(env.serializers.contains("string"));
        let err = env.store_factories.get("arrow").err().unwrap();
        assert!(matches!(err.kind(), StorageError::NotFound("chunk store factory", _)));
        let err = env
            .schema_mappings
            .load("row", &TableSpec::default(), &Settings::new(), &env)
            .err()
            .unwrap();
        assert!(matches!(err.kind(), StorageError::NotFound("schema mapping", _)));
    }
}
