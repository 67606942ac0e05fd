// xarf-schema-tools/src/patcher.rs

use serde_json::{json, Map, Value};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::{
    error::PatchError,
    files,
    report::{Reporter, Status},
};

/// Required list every patched connection schema ends up with.
pub const CONNECTION_REQUIRED: [&str; 2] = ["protocol", "first_seen"];

/// Properties merged into every connection schema's discriminator element.
pub fn common_connection_properties() -> Map<String, Value> {
    let value = json!({
        "destination_ip": {
            "type": "string",
            "anyOf": [
                { "format": "ipv4" },
                { "format": "ipv6" }
            ],
            "description": "Target IP address (optional victim context)"
        },
        "destination_port": {
            "type": "integer",
            "minimum": 1,
            "maximum": 65535,
            "description": "Target port number"
        },
        "protocol": {
            "type": "string",
            "enum": ["tcp", "udp", "icmp", "sctp"],
            "description": "Network protocol used in the attack"
        },
        "first_seen": {
            "type": "string",
            "format": "date-time",
            "description": "When attack activity was first observed"
        },
        "last_seen": {
            "type": "string",
            "format": "date-time",
            "description": "When attack activity was last observed"
        }
    });
    into_map(value)
}

/// `source_port` becomes required when `source_identifier` is an IP address.
pub fn source_port_requirement() -> Map<String, Value> {
    let value = json!({
        "if": {
            "properties": {
                "source_identifier": {
                    "anyOf": [
                        { "format": "ipv4" },
                        { "format": "ipv6" }
                    ]
                }
            }
        },
        "then": {
            "required": ["source_port"]
        }
    });
    into_map(value)
}

fn into_map(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// The `allOf` element whose `properties` carries the `class` discriminator.
fn discriminator_element(schema: &mut Value) -> Result<&mut Map<String, Value>, &'static str> {
    let all_of = schema
        .get_mut("allOf")
        .and_then(Value::as_array_mut)
        .ok_or("no allOf array")?;
    all_of
        .iter_mut()
        .filter_map(Value::as_object_mut)
        .find(|item| {
            item.get("properties")
                .and_then(Value::as_object)
                .is_some_and(|props| props.contains_key("class"))
        })
        .ok_or("no allOf element declares a class property")
}

/// Applies the connection normalization in memory. Unrelated keys are kept.
pub fn patch_schema(schema: &mut Value) -> Result<(), &'static str> {
    let item = discriminator_element(schema)?;
    if let Some(Value::Object(props)) = item.get_mut("properties") {
        props.extend(common_connection_properties());
    }
    item.insert("required".into(), json!(CONNECTION_REQUIRED));
    item.extend(source_port_requirement());
    Ok(())
}

/// Patches one file in place. A file without the expected shape is left untouched.
pub fn patch_file(path: &Path) -> Result<(), PatchError> {
    let mut schema = files::read_json(path)?;
    patch_schema(&mut schema)
        .map_err(|reason| PatchError::StructureMismatch { path: path.to_path_buf(), reason })?;
    files::write_json_pretty(path, &schema)?;
    Ok(())
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PatchReport {
    pub patched: Vec<String>,
    pub excluded: Vec<String>,
    /// (file name, reason)
    pub mismatched: Vec<(String, String)>,
}

impl PatchReport {
    pub fn is_clean(&self) -> bool { self.mismatched.is_empty() }
}

pub struct Patcher {
    types_dir: PathBuf,
    pattern: String,
    exclude: Vec<String>,
}

impl Patcher {
    pub fn new(types_dir: impl Into<PathBuf>, pattern: impl Into<String>) -> Self {
        Self { types_dir: types_dir.into(), pattern: pattern.into(), exclude: Vec::new() }
    }

    /// File names (exact match) to leave alone.
    pub fn exclude(mut self, names: impl IntoIterator<Item = String>) -> Self {
        self.exclude.extend(names);
        self
    }

    /// Patches every matching file. Structure mismatches are collected and the batch
    /// continues; unreadable or malformed files abort the run.
    pub fn run(&self, reporter: &mut dyn Reporter) -> Result<PatchReport, PatchError> {
        let mut report = PatchReport::default();
        for path in files::matching_files(&self.types_dir, &self.pattern)? {
            let name = files::display_name(&path);
            if self.exclude.iter().any(|e| *e == name) {
                reporter.line(Status::Warning, &format!("Skipping {name} (excluded)"));
                report.excluded.push(name);
                continue;
            }
            reporter.line(Status::Progress, &format!("Fixing {name}..."));
            match patch_file(&path) {
                Ok(()) => {
                    debug!(path = %path.display(), "patched schema");
                    reporter.line(Status::Success, &format!("Fixed {name}"));
                    report.patched.push(name);
                }
                Err(PatchError::StructureMismatch { reason, .. }) => {
                    warn!(path = %path.display(), reason, "schema left unpatched");
                    reporter.line(Status::Error, &format!("Not patched {name}: {reason}"));
                    report.mismatched.push((name, reason.to_string()));
                }
                Err(err) => return Err(err),
            }
        }
        info!(
            patched = report.patched.len(),
            excluded = report.excluded.len(),
            mismatched = report.mismatched.len(),
            "connection schema patch finished"
        );
        reporter.line(
            if report.is_clean() { Status::Info } else { Status::Error },
            &format!(
                "Fixed {} connection schemas ({} excluded, {} with unexpected structure)",
                report.patched.len(),
                report.excluded.len(),
                report.mismatched.len()
            ),
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn port_scan() -> Value {
        json!({
            "$schema": "https://json-schema.org/draft/2020-12/schema",
            "allOf": [
                { "$ref": "../xarf-core.json" },
                {
                    "type": "object",
                    "properties": {
                        "class": { "const": "connection" },
                        "type": { "const": "port_scan" },
                        "scanned_ports": { "type": "array" },
                        "protocol": { "type": "string" }
                    },
                    "required": ["destination_ip"]
                }
            ]
        })
    }

    #[test]
    fn merge_is_additive_and_required_is_replaced() {
        let mut schema = port_scan();
        patch_schema(&mut schema).unwrap();
        let item = &schema["allOf"][1];
        let props = item["properties"].as_object().unwrap();
        for key in ["class", "type", "scanned_ports", "destination_ip", "destination_port", "protocol", "first_seen", "last_seen"] {
            assert!(props.contains_key(key), "missing {key}");
        }
        assert_eq!(props["protocol"]["enum"], json!(["tcp", "udp", "icmp", "sctp"]));
        assert_eq!(item["required"], json!(["protocol", "first_seen"]));
        assert_eq!(item["then"]["required"], json!(["source_port"]));
        assert!(item["if"]["properties"]["source_identifier"]["anyOf"].is_array());
        assert_eq!(schema["allOf"][0], json!({"$ref": "../xarf-core.json"}));
    }

    #[test]
    fn existing_keys_keep_their_position() {
        let mut schema = port_scan();
        patch_schema(&mut schema).unwrap();
        let keys: Vec<&str> = schema["allOf"][1]["properties"].as_object().unwrap().keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            vec!["class", "type", "scanned_ports", "protocol", "destination_ip", "destination_port", "first_seen", "last_seen"]
        );
    }

    #[test]
    fn patching_twice_is_stable() {
        let mut once = port_scan();
        patch_schema(&mut once).unwrap();
        let mut twice = once.clone();
        patch_schema(&mut twice).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn missing_discriminator_is_reported() {
        let mut no_all_of = json!({ "type": "object" });
        assert_eq!(patch_schema(&mut no_all_of), Err("no allOf array"));

        let mut no_class = json!({ "allOf": [ { "properties": { "type": {} } } ] });
        assert_eq!(patch_schema(&mut no_class), Err("no allOf element declares a class property"));
        assert_eq!(no_class, json!({ "allOf": [ { "properties": { "type": {} } } ] }));
    }
}
