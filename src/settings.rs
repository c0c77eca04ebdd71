// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

//! A tree of named settings, used to persist table records.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::storage::{StorageResult, TracedStorageError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettingsValue {
    String(String),
    Int(i32),
    Long(i64),
    Bool(bool),
    StringArray(Vec<String>),
    Section(Settings),
}

impl SettingsValue {
    fn type_name(&self) -> &'static str {
        match self {
            Self::String(_) => "string",
            Self::Int(_) => "int",
            Self::Long(_) => "long",
            Self::Bool(_) => "bool",
            Self::StringArray(_) => "string array",
            Self::Section(_) => "section",
        }
    }
}

/// Ordered map from keys to values or nested sections.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Settings {
    entries: BTreeMap<String, SettingsValue>,
}

macro_rules! settings_accessors {
    ($add:ident, $get:ident, $variant:ident, $in:ty, $out:ty, |$v:ident| $conv:expr) => {
        pub fn $add(&mut self, key: impl Into<String>, value: $in) {
            self.entries
                .insert(key.into(), SettingsValue::$variant(value.into()));
        }

        pub fn $get(&self, key: &str) -> StorageResult<$out> {
            match self.entry(key)? {
                SettingsValue::$variant($v) => Ok($conv),
                other => Err(Self::type_mismatch(key, stringify!($variant), other)),
            }
        }
    };
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    fn entry(&self, key: &str) -> StorageResult<&SettingsValue> {
        self.entries
            .get(key)
            .ok_or_else(|| TracedStorageError::invalid_settings(format!("no entry for key \"{key}\"")))
    }

    fn type_mismatch(key: &str, expected: &str, found: &SettingsValue) -> TracedStorageError {
        TracedStorageError::invalid_settings(format!(
            "entry \"{key}\" is a {}, expected {}",
            found.type_name(),
            expected.to_lowercase()
        ))
    }

    settings_accessors!(add_string, get_string, String, &str, &str, |v| v.as_str());
    settings_accessors!(add_int, get_int, Int, i32, i32, |v| *v);
    settings_accessors!(add_long, get_long, Long, i64, i64, |v| *v);
    settings_accessors!(add_bool, get_bool, Bool, bool, bool, |v| *v);

    pub fn add_string_array(&mut self, key: impl Into<String>, values: Vec<String>) {
        self.entries
            .insert(key.into(), SettingsValue::StringArray(values));
    }

    pub fn get_string_array(&self, key: &str) -> StorageResult<&[String]> {
        match self.entry(key)? {
            SettingsValue::StringArray(v) => Ok(v),
            other => Err(Self::type_mismatch(key, "string array", other)),
        }
    }

    /// Add a nested section, replacing any previous entry of that key.
    pub fn add_section(&mut self, key: impl Into<String>, section: Settings) {
        self.entries
            .insert(key.into(), SettingsValue::Section(section));
    }

    pub fn get_section(&self, key: &str) -> StorageResult<&Settings> {
        match self.entry(key)? {
            SettingsValue::Section(v) => Ok(v),
            other => Err(Self::type_mismatch(key, "section", other)),
        }
    }

    pub fn save_to_file(&self, path: impl AsRef<Path>) -> StorageResult<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(|e| TracedStorageError::from(e).with_path(path))
    }

    pub fn load_from_file(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref();
        let load = || -> StorageResult<Self> {
            let json = std::fs::read_to_string(path)?;
            Ok(serde_json::from_str(&json)?)
        };
        load().map_err(|e| e.with_path(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StorageError;

    #[test]
    fn test_accessors() {
        let mut settings = Settings::new();
        settings.add_string("type", "columnar_file");
        settings.add_int("size", 3);
        settings.add_long("id", 1 << 40);
        settings.add_bool("row_key", true);
        settings.add_string_array("classes", vec!["int".into(), "double".into()]);
        let mut schema = Settings::new();
        schema.add_bool("row_key", false);
        settings.add_section("schema", schema);

        assert_eq!(settings.get_string("type").unwrap(), "columnar_file");
        assert_eq!(settings.get_int("size").unwrap(), 3);
        assert_eq!(settings.get_long("id").unwrap(), 1 << 40);
        assert!(settings.get_bool("row_key").unwrap());
        assert_eq!(settings.get_string_array("classes").unwrap().len(), 2);
        assert!(!settings.get_section("schema").unwrap().get_bool("row_key").unwrap());

        let err = settings.get_int("type").unwrap_err();
        assert!(matches!(err.kind(), StorageError::InvalidSettings(_)));
        assert!(settings.get_bool("nope").is_err());
    }

    #[test]
    fn test_file_roundtrip() {
        let tempdir = tempfile::tempdir().unwrap();
        let path = tempdir.path().join("record.json");
        let mut settings = Settings::new();
        settings.add_string("name", "t");
        let mut nested = Settings::new();
        nested.add_int("x", -1);
        settings.add_section("nested", nested);
        settings.save_to_file(&path).unwrap();
        assert_eq!(Settings::load_from_file(&path).unwrap(), settings);
        assert!(Settings::load_from_file(tempdir.path().join("missing.json")).is_err());
    }
}
