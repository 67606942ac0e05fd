// xarf-schema-tools/src/error.rs

use std::{io, path::PathBuf};
use thiserror::Error;

/// Failures touching a single file on disk.
#[derive(Debug, Error)]
pub enum FileError {
    #[error("error reading {}: {source}", .path.display())]
    Read { path: PathBuf, #[source] source: io::Error },
    #[error("invalid JSON in {}: {source}", .path.display())]
    Parse { path: PathBuf, #[source] source: serde_json::Error },
    #[error("error writing {}: {source}", .path.display())]
    Write { path: PathBuf, #[source] source: io::Error },
    #[error("invalid file pattern '{pattern}': {source}")]
    Pattern { pattern: String, #[source] source: globset::Error },
}

/// Reference resolution failures that abort a resolution pass.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error(transparent)]
    File(#[from] FileError),
    #[error("cyclic reference: {}", render_chain(.chain))]
    CyclicReference { chain: Vec<PathBuf> },
    #[error("reference nesting deeper than {limit} files at {}", .path.display())]
    DepthExceeded { limit: usize, path: PathBuf },
}

#[derive(Debug, Error)]
pub enum PatchError {
    #[error(transparent)]
    File(#[from] FileError),
    #[error("{}: unexpected schema structure ({reason})", .path.display())]
    StructureMismatch { path: PathBuf, reason: &'static str },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("error reading {}: {source}", .path.display())]
    Read { path: PathBuf, #[source] source: io::Error },
    #[error("invalid TOML in {}: {source}", .path.display())]
    Parse { path: PathBuf, #[source] source: toml::de::Error },
    #[error("{what} not found: {}", .path.display())]
    MissingPath { what: &'static str, path: PathBuf },
}

#[derive(Debug, Error)]
pub enum ValidateError {
    #[error(transparent)]
    File(#[from] FileError),
    #[error("{what} not found: {}", .path.display())]
    MissingPath { what: &'static str, path: PathBuf },
    #[error("failed to load master schema: {0}")]
    Master(#[source] SchemaError),
    #[error("failed to compile master schema: {message}")]
    Compile { message: String },
}

fn render_chain(chain: &[PathBuf]) -> String {
    chain.iter().map(|p| p.display().to_string()).collect::<Vec<_>>().join(" -> ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cyclic_reference_lists_the_whole_chain() {
        let err = SchemaError::CyclicReference {
            chain: vec!["a.json".into(), "b.json".into(), "a.json".into()],
        };
        assert_eq!(err.to_string(), "cyclic reference: a.json -> b.json -> a.json");
    }

    #[test]
    fn structure_mismatch_names_the_file() {
        let err = PatchError::StructureMismatch { path: "types/x.json".into(), reason: "no allOf array" };
        assert_eq!(err.to_string(), "types/x.json: unexpected schema structure (no allOf array)");
    }
}
