use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;
use jsonschema::Validator;
use xarf_schema_tools::{validator::compile_schema, RefResolver};

#[derive(Parser)]
#[command(name = "xtask", about = "xarf-schema-tools workspace tasks")]
struct Cli {
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Resolve and compile every *.json schema under a schema tree
    CheckSchemas {
        #[arg(long, default_value = "schemas/v4")]
        schemas_dir: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.cmd {
        Cmd::CheckSchemas { schemas_dir } => check_schemas(&schemas_dir),
    }
}

fn check_schemas(dir: &Path) -> Result<()> {
    let mut failed = 0usize;
    let mut checked = 0usize;
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.with_context(|| format!("walk {}", dir.display()))?;
        let path = entry.path();
        if !entry.file_type().is_file() || path.extension().is_none_or(|e| e != "json") {
            continue;
        }
        checked += 1;
        match compile(path) {
            Ok(_) => println!("OK: {}", path.display()),
            Err(err) => {
                failed += 1;
                eprintln!("Invalid: {}", path.display());
                eprintln!("- {err:#}");
            }
        }
    }
    println!("{checked} schemas checked, {failed} failed");
    if failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}

/// Same dialect and format assertion as `xarf-schema validate`.
fn compile(path: &Path) -> Result<Validator> {
    let mut resolver = RefResolver::new();
    let resolved = resolver.resolve_file(path)?;
    for warning in resolver.warnings() {
        eprintln!("  warning: {warning}");
    }
    Ok(compile_schema(&resolved, true)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn compiles_like_validate_does() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("core.json"), r#"{"properties":{"timestamp":{"format":"date-time"}}}"#).unwrap();
        let master = temp.path().join("master.json");
        fs::write(&master, r#"{"allOf":[{"$ref":"core.json"}]}"#).unwrap();

        let validator = compile(&master).unwrap();
        assert!(validator.is_valid(&json!({ "timestamp": "2024-01-15T10:30:00Z" })));
        assert!(!validator.is_valid(&json!({ "timestamp": "yesterday" })));
    }

    #[test]
    fn dangling_reference_fails_to_compile() {
        let temp = tempdir().unwrap();
        let master = temp.path().join("master.json");
        fs::write(&master, r#"{"properties":{"extra":{"$ref":"missing.json"}}}"#).unwrap();
        assert!(compile(&master).is_err());
    }
}
