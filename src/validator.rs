// xarf-schema-tools/src/validator.rs

use jsonschema::{Draft, Validator};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::{
    config::ConfigManager,
    error::ValidateError,
    files,
    report::{Reporter, Status},
    resolver::RefResolver,
};

#[derive(Clone, Debug)]
pub struct ValidatorSettings {
    pub samples_dir: PathBuf,
    pub schemas_dir: PathBuf,
    pub master_schema: PathBuf,
    pub validate_formats: bool,
    pub external_ref_prefixes: Vec<String>,
}

impl ValidatorSettings {
    pub fn from_config(cfg: &ConfigManager) -> Self {
        Self {
            samples_dir: cfg.samples_dir(),
            schemas_dir: cfg.schemas_dir(),
            master_schema: cfg.master_schema(),
            validate_formats: cfg.validate_formats(),
            external_ref_prefixes: cfg.external_ref_prefixes(),
        }
    }
}

/// Outcome for one sample file. `errors` holds load failures and schema violations alike.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SampleReport {
    pub name: String,
    pub category: Option<String>,
    pub type_name: Option<String>,
    pub errors: Vec<String>,
}

impl SampleReport {
    pub fn is_valid(&self) -> bool { self.errors.is_empty() }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ValidationSummary {
    pub samples: Vec<SampleReport>,
}

impl ValidationSummary {
    pub fn total(&self) -> usize { self.samples.len() }
    pub fn valid(&self) -> usize { self.samples.iter().filter(|s| s.is_valid()).count() }
    pub fn invalid(&self) -> usize { self.total() - self.valid() }
    pub fn all_valid(&self) -> bool { self.invalid() == 0 }

    pub fn failed(&self) -> impl Iterator<Item = &str> {
        self.samples.iter().filter(|s| !s.is_valid()).map(|s| s.name.as_str())
    }
}

/// Renders a JSON pointer as `a → 0 → b`, or `root` for the document itself.
pub fn render_instance_path(pointer: &str) -> String {
    let segments: Vec<String> = pointer
        .split('/')
        .skip(1)
        .map(|s| s.replace("~1", "/").replace("~0", "~"))
        .collect();
    if segments.is_empty() { "root".into() } else { segments.join(" → ") }
}

fn check_paths(settings: &ValidatorSettings) -> Result<(), ValidateError> {
    let checks: [(&'static str, &Path, bool); 3] = [
        ("Samples directory", settings.samples_dir.as_path(), settings.samples_dir.is_dir()),
        ("Schemas directory", settings.schemas_dir.as_path(), settings.schemas_dir.is_dir()),
        ("Master schema", settings.master_schema.as_path(), settings.master_schema.is_file()),
    ];
    for (what, path, ok) in checks {
        if !ok {
            return Err(ValidateError::MissingPath { what, path: path.to_path_buf() });
        }
    }
    Ok(())
}

/// Compiles `schema` against the 2020-12 dialect, asserting formats when asked.
pub fn compile_schema(schema: &Value, validate_formats: bool) -> Result<Validator, ValidateError> {
    jsonschema::options()
        .with_draft(Draft::Draft202012)
        .should_validate_formats(validate_formats)
        .build(schema)
        .map_err(|err| ValidateError::Compile { message: err.to_string() })
}

/// Resolves the master schema and compiles it against the 2020-12 dialect.
pub fn compile_master(settings: &ValidatorSettings, reporter: &mut dyn Reporter) -> Result<Validator, ValidateError> {
    let mut resolver = RefResolver::new().with_external_prefixes(settings.external_ref_prefixes.clone());
    let resolved = resolver.resolve_file(&settings.master_schema).map_err(ValidateError::Master)?;
    for warning in resolver.warnings() {
        reporter.line(Status::Warning, &format!("Warning: {warning}"));
    }
    debug!(files = resolver.files_loaded(), "master schema resolved");
    compile_schema(&resolved, settings.validate_formats)
}

/// Validates one sample file. Never fails: problems become entries in `errors`.
pub fn validate_sample(validator: &Validator, path: &Path) -> SampleReport {
    check_sample(Ok(validator), path)
}

/// Loads a sample that cannot be checked because the master schema did not compile.
/// A load error still wins over the compile error.
pub fn unvalidated_sample(message: &str, path: &Path) -> SampleReport {
    check_sample(Err(message), path)
}

fn check_sample(validator: Result<&Validator, &str>, path: &Path) -> SampleReport {
    let name = files::display_name(path);
    let sample = match files::read_json(path) {
        Ok(sample) => sample,
        Err(err) => {
            return SampleReport { name, category: None, type_name: None, errors: vec![format!("Load error: {err}")] };
        }
    };
    let field = |key: &str| sample.get(key).and_then(Value::as_str).filter(|s| !s.is_empty()).map(str::to_string);
    let errors = match validator {
        Ok(validator) => validator
            .iter_errors(&sample)
            .map(|err| format!("  • {}: {}", render_instance_path(&err.instance_path.to_string()), err))
            .collect(),
        Err(message) => vec![format!("Validation error: {message}")],
    };
    SampleReport { name, category: field("category"), type_name: field("type"), errors }
}

/// Validates every `*.json` sample against the resolved master schema and prints the tally.
pub fn run(settings: &ValidatorSettings, reporter: &mut dyn Reporter) -> Result<ValidationSummary, ValidateError> {
    reporter.line(Status::Info, "XARF Schema Validation");
    reporter.blank();
    check_paths(settings)?;

    let samples = files::matching_files(&settings.samples_dir, "*.json")?;
    if samples.is_empty() {
        reporter.line(Status::Warning, "No sample files found");
        return Ok(ValidationSummary::default());
    }
    reporter.line(Status::Info, &format!("Found {} sample files to validate", samples.len()));
    reporter.blank();

    reporter.line(Status::Info, "Loading and resolving master schema...");
    // A schema the compiler rejects (dangling refs included) fails each sample, not the run.
    let compiled = match compile_master(settings, reporter) {
        Ok(validator) => Ok(validator),
        Err(err @ ValidateError::Compile { .. }) => {
            warn!(error = %err, "master schema did not compile, every sample will be marked invalid");
            reporter.line(Status::Error, &err.to_string());
            Err(err.to_string())
        }
        Err(err) => return Err(err),
    };
    reporter.blank();

    let mut summary = ValidationSummary::default();
    for path in &samples {
        let name = files::display_name(path);
        reporter.line(Status::Progress, &format!("Validating {name}"));
        let sample = match &compiled {
            Ok(validator) => validate_sample(validator, path),
            Err(message) => unvalidated_sample(message, path),
        };
        if let (Some(category), Some(type_name)) = (&sample.category, &sample.type_name) {
            reporter.line(Status::Plain, &format!("   Category: {category}, Type: {type_name}"));
        }
        if sample.is_valid() {
            reporter.line(Status::Success, &format!("Valid: {name}"));
        } else {
            reporter.line(Status::Error, &format!("Invalid: {name}"));
            for error in &sample.errors {
                reporter.line(Status::Plain, error);
            }
        }
        reporter.blank();
        summary.samples.push(sample);
    }

    reporter.line(Status::Info, "Validation Summary");
    reporter.line(Status::Plain, &format!("Total samples: {}", summary.total()));
    reporter.line(Status::Plain, &format!("Valid samples: {}", summary.valid()));
    reporter.line(Status::Plain, &format!("Invalid samples: {}", summary.invalid()));
    if summary.all_valid() {
        reporter.line(Status::Success, "All samples validate successfully against their schemas!");
    } else {
        reporter.line(Status::Error, &format!("{} sample(s) failed validation", summary.invalid()));
        reporter.blank();
        reporter.line(Status::Warning, "Failed samples:");
        for name in summary.failed() {
            reporter.line(Status::Plain, &format!("  • {name}"));
        }
    }
    info!(total = summary.total(), valid = summary.valid(), invalid = summary.invalid(), "sample validation finished");
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn instance_paths_render_with_arrows() {
        assert_eq!(render_instance_path(""), "root");
        assert_eq!(render_instance_path("/evidence/0/content_type"), "evidence → 0 → content_type");
        assert_eq!(render_instance_path("/a~1b/c~0d"), "a/b → c~d");
    }

    fn compiled(schema: Value) -> Validator {
        compile_schema(&schema, true).unwrap()
    }

    #[test]
    fn required_enum_and_conditional_violations_are_located() {
        let validator = compiled(json!({
            "type": "object",
            "properties": {
                "protocol": { "enum": ["tcp", "udp", "icmp", "sctp"] },
                "source_identifier": { "type": "string" }
            },
            "required": ["protocol", "first_seen"],
            "if": {
                "properties": { "source_identifier": { "anyOf": [ { "format": "ipv4" }, { "format": "ipv6" } ] } },
                "required": ["source_identifier"]
            },
            "then": { "required": ["source_port"] }
        }));
        let temp = tempdir().unwrap();
        let path = temp.path().join("sample.json");
        fs::write(&path, r#"{"category":"connection","type":"port_scan","protocol":"gre","source_identifier":"192.0.2.1"}"#).unwrap();

        let report = validate_sample(&validator, &path);
        assert_eq!(report.category.as_deref(), Some("connection"));
        assert_eq!(report.type_name.as_deref(), Some("port_scan"));
        assert!(report.errors.iter().any(|e| e.starts_with("  • protocol:")), "{:?}", report.errors);
        assert!(report.errors.iter().any(|e| e.contains("first_seen")), "{:?}", report.errors);
        assert!(report.errors.iter().any(|e| e.contains("source_port")), "{:?}", report.errors);

        fs::write(&path, r#"{"protocol":"tcp","first_seen":"2024-01-15T10:30:00Z","source_identifier":"bot.example"}"#).unwrap();
        assert!(validate_sample(&validator, &path).is_valid());
    }

    #[test]
    fn malformed_sample_becomes_a_load_error() {
        let validator = compiled(json!({ "type": "object" }));
        let temp = tempdir().unwrap();
        let path = temp.path().join("broken.json");
        fs::write(&path, "{ nope").unwrap();
        let report = validate_sample(&validator, &path);
        assert!(!report.is_valid());
        assert!(report.errors[0].starts_with("Load error: "));
    }
}
