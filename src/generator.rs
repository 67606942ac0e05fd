// xarf-schema-tools/src/generator.rs

use serde_json::{json, Value};
use std::{fs, path::{Path, PathBuf}};
use tracing::{debug, info};

use crate::{
    definitions::{TypeEntry, TypeTable},
    error::FileError,
    files,
    report::{Reporter, Status},
};

pub const SCHEMA_DIALECT: &str = "https://json-schema.org/draft/2020-12/schema";
pub const TYPE_ID_BASE: &str = "https://xarf.org/schemas/v4/types/";
/// Shared base schema, relative to the types directory.
pub const CORE_SCHEMA_REF: &str = "../xarf-core.json";

/// Builds the schema for one catalog entry. Deterministic in its input.
pub fn build_type_schema(entry: &TypeEntry<'_>) -> Value {
    json!({
        "$schema": SCHEMA_DIALECT,
        "$id": format!("{TYPE_ID_BASE}{}", entry.file_name()),
        "title": format!(
            "XARF v4 {} - {} Type Schema",
            title_case(entry.category),
            title_case(&entry.type_name.replace('_', " "))
        ),
        "description": format!("Schema for {}", entry.definition.description),
        "allOf": [
            { "$ref": CORE_SCHEMA_REF },
            {
                "type": "object",
                "properties": {
                    "class": { "const": entry.category },
                    "type": { "const": entry.type_name }
                },
                "required": entry.definition.required_fields
            }
        ]
    })
}

/// Upper-cases the first letter of every space-separated word, lower-cases the rest.
fn title_case(text: &str) -> String {
    text.split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GenerateReport {
    pub created: Vec<String>,
    pub skipped: Vec<String>,
    /// Every `*.json` in the types directory after the run.
    pub present: Vec<String>,
}

pub struct Generator<'a> {
    table: &'a TypeTable,
    types_dir: PathBuf,
    dry_run: bool,
}

impl<'a> Generator<'a> {
    pub fn new(table: &'a TypeTable, types_dir: impl Into<PathBuf>) -> Self {
        Self { table, types_dir: types_dir.into(), dry_run: false }
    }

    /// Report what would be created without writing anything.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn types_dir(&self) -> &Path { &self.types_dir }

    /// Writes a schema for every catalog entry whose file does not exist yet.
    /// Existing files are never touched.
    pub fn run(&self, reporter: &mut dyn Reporter) -> Result<GenerateReport, FileError> {
        if !self.dry_run {
            fs::create_dir_all(&self.types_dir)
                .map_err(|source| FileError::Write { path: self.types_dir.clone(), source })?;
        }
        let mut report = GenerateReport::default();
        for entry in self.table.entries() {
            let name = entry.file_name();
            let path = self.types_dir.join(&name);
            if path.exists() {
                reporter.line(Status::Warning, &format!("Skipping {name} (already exists)"));
                report.skipped.push(name);
                continue;
            }
            if self.dry_run {
                reporter.line(Status::Info, &format!("Would create {name}"));
            } else {
                files::write_json_pretty(&path, &build_type_schema(&entry))?;
                debug!(path = %path.display(), "wrote type schema");
                reporter.line(Status::Success, &format!("Created {name}"));
            }
            report.created.push(name);
        }

        reporter.blank();
        let verb = if self.dry_run { "Would generate" } else { "Generated" };
        reporter.line(Status::Info, &format!("{verb} {} new type schemas", report.created.len()));
        info!(created = report.created.len(), skipped = report.skipped.len(), dry_run = self.dry_run, "type schema generation finished");

        if self.types_dir.is_dir() {
            report.present = files::matching_files(&self.types_dir, "*.json")?
                .iter()
                .map(|p| files::display_name(p))
                .collect();
            reporter.blank();
            reporter.line(Status::Info, &format!("Total type schemas: {}", report.present.len()));
            for name in &report.present {
                reporter.line(Status::Plain, &format!("  - {name}"));
            }
        }
        Ok(report)
    }
}
