// xarf-schema-tools/src/config.rs

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::{Path, PathBuf}};
use tracing::{debug, warn};

use crate::error::ConfigError;

pub const DEFAULT_SCHEMAS_DIR: &str = "schemas/v4";
pub const DEFAULT_TYPES_DIR: &str = "schemas/v4/types";
pub const DEFAULT_SAMPLES_DIR: &str = "samples/v4";
pub const DEFAULT_MASTER_SCHEMA: &str = "xarf-v4-master.json";
pub const DEFAULT_PATCH_PATTERN: &str = "connection-*.json";
pub const DEFAULT_PATCH_EXCLUDE: &[&str] = &["connection-ddos.json"];
pub const DEFAULT_EXTERNAL_PREFIXES: &[&str] = &["http://", "https://"];
pub const WORKSPACE_CONFIG_FILE: &str = "xarf-schema.toml";

/// Config is merged: user -> workspace -> explicit file -> runtime (command line)
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ToolConfig {
    pub paths: PathsConfig,
    pub patch: PatchConfig,
    pub validate: ValidateConfig,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PathsConfig {
    pub schemas_dir: Option<PathBuf>,
    pub types_dir: Option<PathBuf>,
    pub samples_dir: Option<PathBuf>,
    /// Relative to `schemas_dir` unless absolute.
    pub master_schema: Option<PathBuf>,
    /// Type definition table (TOML); the embedded catalog is used when unset.
    pub definitions: Option<PathBuf>,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PatchConfig {
    pub pattern: Option<String>,
    pub exclude: Option<Vec<String>>,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ValidateConfig {
    pub color: Option<bool>,
    pub validate_formats: Option<bool>,
    pub external_ref_prefixes: Option<Vec<String>>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Scope { User, Workspace, Explicit, Runtime }

fn merge(a: &mut ToolConfig, b: &ToolConfig) {
    let overlay = |dst: &mut Option<PathBuf>, src: &Option<PathBuf>| { if src.is_some() { *dst = src.clone(); } };
    overlay(&mut a.paths.schemas_dir, &b.paths.schemas_dir);
    overlay(&mut a.paths.types_dir, &b.paths.types_dir);
    overlay(&mut a.paths.samples_dir, &b.paths.samples_dir);
    overlay(&mut a.paths.master_schema, &b.paths.master_schema);
    overlay(&mut a.paths.definitions, &b.paths.definitions);

    if b.patch.pattern.is_some() { a.patch.pattern = b.patch.pattern.clone(); }
    if b.patch.exclude.is_some() { a.patch.exclude = b.patch.exclude.clone(); }

    if b.validate.color.is_some() { a.validate.color = b.validate.color; }
    if b.validate.validate_formats.is_some() { a.validate.validate_formats = b.validate.validate_formats; }
    if b.validate.external_ref_prefixes.is_some() {
        a.validate.external_ref_prefixes = b.validate.external_ref_prefixes.clone();
    }
}

fn config_paths(root: &Path) -> Vec<(Scope, PathBuf)> {
    let mut paths = Vec::new();
    if let Some(proj) = ProjectDirs::from("org", "xarf", "xarf-schema") {
        paths.push((Scope::User, proj.config_dir().join("config.toml")));
    }
    paths.push((Scope::Workspace, root.join(WORKSPACE_CONFIG_FILE)));
    paths
}

#[derive(Clone, Debug)]
pub struct ConfigManager {
    root: PathBuf,
    merged: ToolConfig,
    layers: Vec<(Scope, PathBuf)>,
}

impl ConfigManager {
    /// Loads the user and workspace layers found under `root`, then `explicit` if given.
    /// Broken optional layers are skipped; a broken or missing explicit file is an error.
    pub fn load(root: impl AsRef<Path>, explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let root = root.as_ref().to_path_buf();
        let mut me = Self { merged: ToolConfig::default(), layers: Vec::new(), root };
        for (scope, path) in config_paths(&me.root) {
            match Self::read_file(&path) {
                Ok(Some(layer)) => me.push_layer(scope, path, &layer),
                Ok(None) => {}
                Err(err) => warn!(%err, ?scope, "skipping config layer"),
            }
        }
        if let Some(path) = explicit {
            let layer = Self::read_file(path)?
                .ok_or_else(|| ConfigError::MissingPath { what: "config file", path: path.to_path_buf() })?;
            me.push_layer(Scope::Explicit, path.to_path_buf(), &layer);
        }
        Ok(me)
    }

    /// Defaults only, no files consulted.
    pub fn with_root(root: impl AsRef<Path>) -> Self {
        Self { root: root.as_ref().to_path_buf(), merged: ToolConfig::default(), layers: Vec::new() }
    }

    fn read_file(path: &Path) -> Result<Option<ToolConfig>, ConfigError> {
        if !path.is_file() { return Ok(None); }
        let text = fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
        let cfg = toml::from_str(&text).map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })?;
        Ok(Some(cfg))
    }

    fn push_layer(&mut self, scope: Scope, path: PathBuf, layer: &ToolConfig) {
        debug!(?scope, path = %path.display(), "loaded config layer");
        merge(&mut self.merged, layer);
        self.layers.push((scope, path));
    }

    /// In-memory overlay (command-line flags); not persisted.
    pub fn apply_runtime_overlay(&mut self, patch: &ToolConfig) {
        self.push_layer(Scope::Runtime, PathBuf::from("<command line>"), patch);
    }

    pub fn get(&self) -> &ToolConfig { &self.merged }
    pub fn root(&self) -> &Path { &self.root }
    pub fn layers(&self) -> &[(Scope, PathBuf)] { &self.layers }

    fn resolve(&self, p: &Path) -> PathBuf {
        if p.is_absolute() { p.to_path_buf() } else { self.root.join(p) }
    }

    fn path_or(&self, p: &Option<PathBuf>, default: &str) -> PathBuf {
        self.resolve(p.as_deref().unwrap_or(Path::new(default)))
    }

    pub fn schemas_dir(&self) -> PathBuf { self.path_or(&self.merged.paths.schemas_dir, DEFAULT_SCHEMAS_DIR) }
    pub fn types_dir(&self) -> PathBuf { self.path_or(&self.merged.paths.types_dir, DEFAULT_TYPES_DIR) }
    pub fn samples_dir(&self) -> PathBuf { self.path_or(&self.merged.paths.samples_dir, DEFAULT_SAMPLES_DIR) }

    pub fn master_schema(&self) -> PathBuf {
        let name = self.merged.paths.master_schema.as_deref().unwrap_or(Path::new(DEFAULT_MASTER_SCHEMA));
        if name.is_absolute() { name.to_path_buf() } else { self.schemas_dir().join(name) }
    }

    pub fn definitions(&self) -> Option<PathBuf> {
        self.merged.paths.definitions.as_deref().map(|p| self.resolve(p))
    }

    pub fn patch_pattern(&self) -> String {
        self.merged.patch.pattern.clone().unwrap_or_else(|| DEFAULT_PATCH_PATTERN.into())
    }

    pub fn patch_exclude(&self) -> Vec<String> {
        self.merged.patch.exclude.clone()
            .unwrap_or_else(|| DEFAULT_PATCH_EXCLUDE.iter().map(|s| s.to_string()).collect())
    }

    pub fn color(&self) -> bool { self.merged.validate.color.unwrap_or(true) }
    pub fn validate_formats(&self) -> bool { self.merged.validate.validate_formats.unwrap_or(true) }

    pub fn external_ref_prefixes(&self) -> Vec<String> {
        self.merged.validate.external_ref_prefixes.clone()
            .unwrap_or_else(|| DEFAULT_EXTERNAL_PREFIXES.iter().map(|s| s.to_string()).collect())
    }
}
