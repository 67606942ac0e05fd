// xarf-schema-tools/src/definitions.rs

use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fs, path::{Path, PathBuf}};

use crate::error::ConfigError;

/// The XARF v4 catalog shipped with the tool.
pub const BUILTIN_DEFINITIONS: &str = include_str!("../definitions/xarf-v4-types.toml");
const BUILTIN_ORIGIN: &str = "<builtin type catalog>";

/// Metadata for one incident type.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct TypeDefinition {
    pub description: String,
    #[serde(default)]
    pub required_fields: Vec<String>,
    /// Condition name -> fields required when it holds (informational, not emitted).
    #[serde(default)]
    pub conditional_required: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub specific_fields: Vec<String>,
}

/// category -> type -> definition, iterated in sorted order.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct TypeTable {
    categories: BTreeMap<String, BTreeMap<String, TypeDefinition>>,
}

#[derive(Clone, Copy, Debug)]
pub struct TypeEntry<'a> {
    pub category: &'a str,
    pub type_name: &'a str,
    pub definition: &'a TypeDefinition,
}

impl TypeEntry<'_> {
    pub fn file_name(&self) -> String { schema_file_name(self.category, self.type_name) }
}

/// `<category>-<type>.json`, underscores in the type turned into hyphens.
pub fn schema_file_name(category: &str, type_name: &str) -> String {
    format!("{}-{}.json", category, type_name.replace('_', "-"))
}

impl TypeTable {
    pub fn builtin() -> Result<Self, ConfigError> {
        Self::from_toml_str(BUILTIN_DEFINITIONS, Path::new(BUILTIN_ORIGIN))
    }

    pub fn from_toml_str(text: &str, origin: &Path) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|source| ConfigError::Parse { path: origin.to_path_buf(), source })
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
        Self::from_toml_str(&text, path)
    }

    /// The configured table, or the embedded catalog when none is configured.
    pub fn load_or_builtin(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => Self::load(p),
            None => Self::builtin(),
        }
    }

    pub fn insert(&mut self, category: impl Into<String>, type_name: impl Into<String>, definition: TypeDefinition) {
        self.categories.entry(category.into()).or_default().insert(type_name.into(), definition);
    }

    pub fn get(&self, category: &str, type_name: &str) -> Option<&TypeDefinition> {
        self.categories.get(category)?.get(type_name)
    }

    pub fn entries(&self) -> impl Iterator<Item = TypeEntry<'_>> {
        self.categories.iter().flat_map(|(category, types)| {
            types.iter().map(move |(type_name, definition)| TypeEntry { category, type_name, definition })
        })
    }

    pub fn categories(&self) -> impl Iterator<Item = &str> { self.categories.keys().map(String::as_str) }
    pub fn len(&self) -> usize { self.categories.values().map(BTreeMap::len).sum() }
    pub fn is_empty(&self) -> bool { self.len() == 0 }

    /// Generated file names, one per entry.
    pub fn file_names(&self) -> Vec<PathBuf> {
        self.entries().map(|e| PathBuf::from(e.file_name())).collect()
    }
}
