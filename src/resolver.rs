// xarf-schema-tools/src/resolver.rs

use serde_json::{Map, Value};
use std::{collections::HashMap, fs, path::{Path, PathBuf}};
use tracing::{debug, warn};

use crate::{config::DEFAULT_EXTERNAL_PREFIXES, error::{FileError, SchemaError}, files};

pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Inlines local `$ref` targets into a single self-contained schema.
///
/// Relative references resolve against the directory of the file that holds
/// them. Each file is read and resolved at most once per resolver; references
/// that cannot be followed are kept verbatim and recorded as warnings. A file
/// that (transitively) references itself fails with
/// [`SchemaError::CyclicReference`].
pub struct RefResolver {
    external_prefixes: Vec<String>,
    max_depth: usize,
    cache: HashMap<PathBuf, Value>,
    stack: Vec<PathBuf>,
    files_loaded: usize,
    warnings: Vec<String>,
}

impl Default for RefResolver {
    fn default() -> Self { Self::new() }
}

impl RefResolver {
    pub fn new() -> Self {
        Self {
            external_prefixes: DEFAULT_EXTERNAL_PREFIXES.iter().map(|s| s.to_string()).collect(),
            max_depth: DEFAULT_MAX_DEPTH,
            cache: HashMap::new(),
            stack: Vec::new(),
            files_loaded: 0,
            warnings: Vec::new(),
        }
    }

    /// `$ref` values starting with any of these are left for the validator.
    pub fn with_external_prefixes(mut self, prefixes: Vec<String>) -> Self {
        self.external_prefixes = prefixes;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Number of files read from disk so far.
    pub fn files_loaded(&self) -> usize { self.files_loaded }

    pub fn warnings(&self) -> &[String] { &self.warnings }

    /// Loads and fully resolves `path`. Failing to read the entry file itself is an error.
    pub fn resolve_file(&mut self, path: &Path) -> Result<Value, SchemaError> {
        let canonical = fs::canonicalize(path)
            .map_err(|source| FileError::Read { path: path.to_path_buf(), source })?;
        self.resolve_document(&canonical)
    }

    /// Resolves an in-memory document whose relative references point into `base_dir`.
    pub fn resolve_value(&mut self, value: &Value, base_dir: &Path) -> Result<Value, SchemaError> {
        self.walk(value, base_dir)
    }

    fn resolve_document(&mut self, path: &Path) -> Result<Value, SchemaError> {
        if let Some(done) = self.cache.get(path) {
            return Ok(done.clone());
        }
        if let Some(start) = self.stack.iter().position(|p| p == path) {
            let mut chain = self.stack[start..].to_vec();
            chain.push(path.to_path_buf());
            return Err(SchemaError::CyclicReference { chain });
        }
        if self.stack.len() >= self.max_depth {
            return Err(SchemaError::DepthExceeded { limit: self.max_depth, path: path.to_path_buf() });
        }

        let raw = files::read_json(path)?;
        self.files_loaded += 1;
        debug!(path = %path.display(), "loaded schema file");

        let base = path.parent().map(Path::to_path_buf).unwrap_or_default();
        self.stack.push(path.to_path_buf());
        let resolved = self.walk(&raw, &base);
        self.stack.pop();

        let resolved = resolved?;
        self.cache.insert(path.to_path_buf(), resolved.clone());
        Ok(resolved)
    }

    fn walk(&mut self, node: &Value, base: &Path) -> Result<Value, SchemaError> {
        match node {
            Value::Object(map) => {
                if let Some(Value::String(reference)) = map.get("$ref") {
                    return Ok(self.follow(reference, base)?.unwrap_or_else(|| node.clone()));
                }
                let mut out = Map::with_capacity(map.len());
                for (key, value) in map {
                    out.insert(key.clone(), self.walk(value, base)?);
                }
                Ok(Value::Object(out))
            }
            Value::Array(items) => items
                .iter()
                .map(|item| self.walk(item, base))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            other => Ok(other.clone()),
        }
    }

    /// `Ok(None)` means "keep the `$ref` node as written".
    fn follow(&mut self, reference: &str, base: &Path) -> Result<Option<Value>, SchemaError> {
        if reference.starts_with('#') || self.is_external(reference) {
            return Ok(None);
        }
        let (file_part, pointer) = match reference.split_once('#') {
            Some((file, pointer)) => (file, Some(pointer)),
            None => (reference, None),
        };

        let target = match fs::canonicalize(base.join(file_part)) {
            Ok(target) => target,
            Err(err) => {
                self.warn(format!("Could not resolve reference {reference}: {err}"));
                return Ok(None);
            }
        };
        let document = match self.resolve_document(&target) {
            Ok(document) => document,
            Err(SchemaError::File(err)) => {
                self.warn(format!("Could not resolve reference {reference}: {err}"));
                return Ok(None);
            }
            Err(err) => return Err(err),
        };

        match pointer {
            None | Some("") => Ok(Some(document)),
            Some(pointer) => match document.pointer(pointer) {
                Some(fragment) => Ok(Some(fragment.clone())),
                None => {
                    self.warn(format!("Could not resolve reference {reference}: no value at {pointer}"));
                    Ok(None)
                }
            },
        }
    }

    fn is_external(&self, reference: &str) -> bool {
        self.external_prefixes.iter().any(|p| reference.starts_with(p.as_str()))
    }

    fn warn(&mut self, message: String) {
        warn!("{message}");
        self.warnings.push(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn write(dir: &Path, name: &str, value: Value) -> PathBuf {
        let path = dir.join(name);
        if let Some(parent) = path.parent() { fs::create_dir_all(parent).unwrap(); }
        fs::write(&path, serde_json::to_string_pretty(&value).unwrap()).unwrap();
        path
    }

    #[test]
    fn shared_file_is_read_once() {
        let temp = tempdir().unwrap();
        write(temp.path(), "core.json", json!({ "type": "object", "required": ["category"] }));
        let master = write(temp.path(), "master.json", json!({
            "allOf": [ { "$ref": "core.json" } ],
            "properties": {
                "a": { "$ref": "core.json" },
                "b": { "items": [ { "$ref": "core.json" } ] }
            }
        }));

        let mut resolver = RefResolver::new();
        let resolved = resolver.resolve_file(&master).unwrap();
        assert_eq!(resolver.files_loaded(), 2);
        let core = json!({ "type": "object", "required": ["category"] });
        assert_eq!(resolved["allOf"][0], core);
        assert_eq!(resolved["properties"]["a"], core);
        assert_eq!(resolved["properties"]["b"]["items"][0], core);
        assert!(resolver.warnings().is_empty());
    }

    #[test]
    fn nested_refs_resolve_relative_to_their_own_file() {
        let temp = tempdir().unwrap();
        write(temp.path(), "xarf-core.json", json!({ "required": ["reporter"] }));
        write(temp.path(), "types/content-phishing.json", json!({
            "allOf": [ { "$ref": "../xarf-core.json" }, { "required": ["url"] } ]
        }));
        let master = write(temp.path(), "master.json", json!({
            "oneOf": [ { "$ref": "types/content-phishing.json" } ]
        }));

        let resolved = RefResolver::new().resolve_file(&master).unwrap();
        assert_eq!(resolved["oneOf"][0]["allOf"][0], json!({ "required": ["reporter"] }));
        assert_eq!(resolved["oneOf"][0]["allOf"][1], json!({ "required": ["url"] }));
    }

    #[test]
    fn external_fragment_and_missing_refs_stay_put() {
        let temp = tempdir().unwrap();
        let master = write(temp.path(), "master.json", json!({
            "a": { "$ref": "https://json-schema.org/draft/2020-12/schema" },
            "b": { "$ref": "#/$defs/thing" },
            "c": { "$ref": "missing.json" },
            "$defs": { "thing": { "type": "string" } }
        }));

        let mut resolver = RefResolver::new();
        let resolved = resolver.resolve_file(&master).unwrap();
        assert_eq!(resolved["a"]["$ref"], "https://json-schema.org/draft/2020-12/schema");
        assert_eq!(resolved["b"]["$ref"], "#/$defs/thing");
        assert_eq!(resolved["c"]["$ref"], "missing.json");
        assert_eq!(resolver.warnings().len(), 1);
        assert!(resolver.warnings()[0].contains("missing.json"));
    }

    #[test]
    fn malformed_referenced_file_is_a_warning() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("broken.json"), "{").unwrap();
        let master = write(temp.path(), "master.json", json!({ "allOf": [ { "$ref": "broken.json" } ] }));

        let mut resolver = RefResolver::new();
        let resolved = resolver.resolve_file(&master).unwrap();
        assert_eq!(resolved["allOf"][0]["$ref"], "broken.json");
        assert_eq!(resolver.warnings().len(), 1);
    }

    #[test]
    fn pointer_into_another_file() {
        let temp = tempdir().unwrap();
        write(temp.path(), "defs.json", json!({ "$defs": { "port": { "type": "integer", "maximum": 65535 } } }));
        let master = write(temp.path(), "master.json", json!({
            "properties": { "source_port": { "$ref": "defs.json#/$defs/port" } }
        }));

        let resolved = RefResolver::new().resolve_file(&master).unwrap();
        assert_eq!(resolved["properties"]["source_port"], json!({ "type": "integer", "maximum": 65535 }));
    }

    #[test]
    fn cycles_fail_with_the_chain() {
        let temp = tempdir().unwrap();
        write(temp.path(), "a.json", json!({ "allOf": [ { "$ref": "b.json" } ] }));
        write(temp.path(), "b.json", json!({ "items": { "$ref": "a.json" } }));
        let master = write(temp.path(), "master.json", json!({ "$ref": "a.json" }));

        let err = RefResolver::new().resolve_file(&master).unwrap_err();
        match err {
            SchemaError::CyclicReference { chain } => {
                let names: Vec<String> = chain.iter().map(|p| files::display_name(p)).collect();
                assert_eq!(names, vec!["a.json", "b.json", "a.json"]);
            }
            other => panic!("expected a cycle, got {other}"),
        }
    }

    #[test]
    fn depth_limit_applies() {
        let temp = tempdir().unwrap();
        write(temp.path(), "c.json", json!({ "type": "string" }));
        write(temp.path(), "b.json", json!({ "$ref": "c.json" }));
        let master = write(temp.path(), "a.json", json!({ "$ref": "b.json" }));

        let err = RefResolver::new().with_max_depth(2).resolve_file(&master).unwrap_err();
        assert!(matches!(err, SchemaError::DepthExceeded { limit: 2, .. }));
        assert_eq!(RefResolver::new().resolve_file(&master).unwrap(), json!({ "type": "string" }));
    }

    #[test]
    fn missing_entry_file_is_an_error() {
        let temp = tempdir().unwrap();
        let err = RefResolver::new().resolve_file(&temp.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, SchemaError::File(FileError::Read { .. })));
    }
}
