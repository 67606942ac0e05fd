// xarf-schema-tools/src/files.rs

use globset::Glob;
use serde_json::Value;
use std::{fs, path::{Path, PathBuf}};

use crate::error::FileError;

pub fn read_json(path: &Path) -> Result<Value, FileError> {
    let text = fs::read_to_string(path)
        .map_err(|source| FileError::Read { path: path.to_path_buf(), source })?;
    serde_json::from_str(&text).map_err(|source| FileError::Parse { path: path.to_path_buf(), source })
}

/// Writes `value` pretty-printed with 2-space indentation, no trailing newline.
pub fn write_json_pretty(path: &Path, value: &Value) -> Result<(), FileError> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|source| FileError::Parse { path: path.to_path_buf(), source })?;
    fs::write(path, text).map_err(|source| FileError::Write { path: path.to_path_buf(), source })
}

/// Regular files directly inside `dir` whose name matches `pattern`, sorted by name.
pub fn matching_files(dir: &Path, pattern: &str) -> Result<Vec<PathBuf>, FileError> {
    let matcher = Glob::new(pattern)
        .map_err(|source| FileError::Pattern { pattern: pattern.to_string(), source })?
        .compile_matcher();
    let entries = fs::read_dir(dir).map_err(|source| FileError::Read { path: dir.to_path_buf(), source })?;
    let mut files = Vec::new();
    for entry in entries {
        let path = entry.map_err(|source| FileError::Read { path: dir.to_path_buf(), source })?.path();
        if !path.is_file() { continue; }
        if path.file_name().is_some_and(|name| matcher.is_match(name)) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// File name as a display string; falls back to the full path.
pub fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
