//! # Schema Validation
//!
//! Runtime validation of configuration documents against caller-supplied
//! JSON Schema files. The draft is taken from each schema's `$schema`
//! keyword (Draft 2020-12 when absent), and every schema is checked
//! against its meta-schema while it is compiled.
//!
//! ## Reference Resolution
//!
//! External `$ref`s resolve, in order, against:
//!
//! 1. the `$id` of any supplied schema,
//! 2. the file name of any supplied schema,
//! 3. a file of that name in the directory of any supplied schema.
//!
//! Anything else is a load error. Internal `#/definitions/...` and
//! `#/$defs/...` references are handled by the jsonschema crate natively.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use jsonschema::{Retrieve, Uri, Validator};
use serde_json::Value;
use thiserror::Error;

/// Local retriever that resolves `$ref` URIs to schemas on disk.
///
/// Prevents the jsonschema crate from making network requests.
#[derive(Clone, Default)]
struct LocalSchemaRetriever {
    /// Map from `$id` URI or file name to schema value.
    schemas_by_uri: HashMap<String, Value>,
    /// Directories of the supplied schemas, searched for sibling files.
    search_dirs: Vec<PathBuf>,
}

impl Retrieve for LocalSchemaRetriever {
    fn retrieve(
        &self,
        uri: &Uri<&str>,
    ) -> Result<Value, Box<dyn std::error::Error + Send + Sync>> {
        let uri_str = uri.as_str();

        if let Some(value) = self.schemas_by_uri.get(uri_str) {
            return Ok(value.clone());
        }

        let filename = uri_str.rsplit('/').next().unwrap_or(uri_str);
        if let Some(value) = self.schemas_by_uri.get(filename) {
            return Ok(value.clone());
        }

        for dir in &self.search_dirs {
            let candidate = dir.join(filename);
            if candidate.is_file() {
                tracing::debug!(uri = uri_str, path = %candidate.display(), "resolved sibling schema");
                return Ok(wfconf_core::load_document(&candidate)?);
            }
        }

        Err(format!("cannot resolve schema reference '{uri_str}' locally").into())
    }
}

/// Error during schema loading or validation.
#[derive(Error, Debug)]
pub enum SchemaValidationError {
    /// The document did not conform to one or more schemas.
    #[error("JSON validation failed against {}:\n{violations}", quoted_list(.schema_names))]
    ValidationFailed {
        /// Names of the schemas that reported violations.
        schema_names: Vec<String>,
        /// Structured list of individual violations.
        violations: ValidationViolations,
    },

    /// The schema file is missing, unreadable, not JSON, or not a valid
    /// JSON Schema.
    #[error("schema load error for '{schema_name}': {reason}")]
    SchemaLoadError {
        /// Schema path as given.
        schema_name: String,
        /// Reason the schema could not be loaded.
        reason: String,
    },
}

impl SchemaValidationError {
    /// True for constraint violations, false for load failures.
    pub fn is_validation_failure(&self) -> bool {
        matches!(self, SchemaValidationError::ValidationFailed { .. })
    }
}

fn quoted_list(names: &[String]) -> String {
    names
        .iter()
        .map(|n| format!("'{n}'"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// A single validation violation with structured context.
#[derive(Debug, Clone, PartialEq)]
pub struct Violation {
    /// Name of the schema that reported the violation.
    pub schema_name: String,
    /// JSON Pointer path to the violating field in the instance.
    pub instance_path: String,
    /// JSON Pointer path within the schema that triggered the error.
    pub schema_path: String,
    /// Human-readable description of the violation.
    pub message: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let location = if self.instance_path.is_empty() {
            "(root)"
        } else {
            self.instance_path.as_str()
        };
        write!(
            f,
            "  {location}: {} [{}#{}]",
            self.message, self.schema_name, self.schema_path
        )
    }
}

/// Collection of validation violations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationViolations {
    violations: Vec<Violation>,
}

impl ValidationViolations {
    pub fn len(&self) -> usize {
        self.violations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }
}

impl fmt::Display for ValidationViolations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, v) in self.violations.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{v}")?;
        }
        Ok(())
    }
}

/// How many schemas to check once one has failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValidationMode {
    /// Check every schema and report all violations.
    #[default]
    AllSchemas,
    /// Stop after the first schema that reports violations.
    FailFast,
}

struct CompiledSchema {
    name: String,
    validator: Validator,
}

/// The compiled schemas for one invocation.
///
/// An empty set accepts every document.
pub struct SchemaSet {
    schemas: Vec<CompiledSchema>,
}

impl fmt::Debug for SchemaSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaSet")
            .field("schemas", &self.names())
            .finish()
    }
}

impl SchemaSet {
    /// A set with no schemas.
    pub fn empty() -> Self {
        Self { schemas: Vec::new() }
    }

    /// Load and compile every schema in `paths`, in order.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaValidationError::SchemaLoadError`] for the first
    /// schema that is missing, unreadable, not JSON, has an unresolvable
    /// `$ref`, or fails its meta-schema.
    pub fn load<P: AsRef<Path>>(paths: &[P]) -> Result<Self, SchemaValidationError> {
        let mut documents = Vec::with_capacity(paths.len());
        for path in paths {
            let path = path.as_ref();
            let value = wfconf_core::load_document(path).map_err(|e| {
                SchemaValidationError::SchemaLoadError {
                    schema_name: path.display().to_string(),
                    reason: if e.is_not_found() {
                        "file not found".to_string()
                    } else {
                        e.to_string()
                    },
                }
            })?;
            documents.push((path.to_path_buf(), value));
        }

        let retriever = build_retriever(&documents);

        let mut schemas = Vec::with_capacity(documents.len());
        for (path, value) in &documents {
            let name = path.display().to_string();
            let mut opts = jsonschema::options();
            opts.with_retriever(retriever.clone());
            let validator =
                opts.build(value)
                    .map_err(|e| SchemaValidationError::SchemaLoadError {
                        schema_name: name.clone(),
                        reason: format!("invalid JSON Schema: {e}"),
                    })?;
            tracing::debug!(schema = %name, "compiled schema");
            schemas.push(CompiledSchema { name, validator });
        }

        Ok(Self { schemas })
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    /// Schema names in load order.
    pub fn names(&self) -> Vec<&str> {
        self.schemas.iter().map(|s| s.name.as_str()).collect()
    }

    /// Validate `instance` against the loaded schemas.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaValidationError::ValidationFailed`] listing the
    /// violations of every failing schema (or only the first failing
    /// schema under [`ValidationMode::FailFast`]).
    pub fn validate(
        &self,
        instance: &Value,
        mode: ValidationMode,
    ) -> Result<(), SchemaValidationError> {
        let mut schema_names = Vec::new();
        let mut violations = Vec::new();

        for schema in &self.schemas {
            let before = violations.len();
            violations.extend(schema.validator.iter_errors(instance).map(|e| Violation {
                schema_name: schema.name.clone(),
                instance_path: e.instance_path.to_string(),
                schema_path: e.schema_path.to_string(),
                message: e.to_string(),
            }));

            if violations.len() == before {
                tracing::debug!(schema = %schema.name, "document is valid");
                continue;
            }
            tracing::debug!(
                schema = %schema.name,
                count = violations.len() - before,
                "document violates schema"
            );
            schema_names.push(schema.name.clone());
            if mode == ValidationMode::FailFast {
                break;
            }
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(SchemaValidationError::ValidationFailed {
                schema_names,
                violations: ValidationViolations { violations },
            })
        }
    }
}

/// Index the supplied schemas by `$id` and file name, and remember their
/// directories for sibling lookups.
fn build_retriever(documents: &[(PathBuf, Value)]) -> LocalSchemaRetriever {
    let mut retriever = LocalSchemaRetriever::default();
    for (path, value) in documents {
        if let Some(id) = value.get("$id").and_then(|v| v.as_str()) {
            retriever.schemas_by_uri.insert(id.to_string(), value.clone());
        }
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            retriever.schemas_by_uri.insert(name.to_string(), value.clone());
        }
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        if !retriever.search_dirs.contains(&dir) {
            retriever.search_dirs.push(dir);
        }
    }
    retriever
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn write_schema(dir: &Path, name: &str, schema: &Value) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, serde_json::to_string_pretty(schema).unwrap()).unwrap();
        path
    }

    fn workflow_schema() -> Value {
        json!({
            "$schema": "https://json-schema.org/draft/2020-12/schema",
            "type": "object",
            "required": ["name", "jobs"],
            "properties": {
                "name": {"type": "string"},
                "jobs": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "required": ["runs-on"],
                        "properties": {"runs-on": {"type": "string"}}
                    }
                }
            }
        })
    }

    #[test]
    fn valid_document_passes() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_schema(dir.path(), "workflow.schema.json", &workflow_schema());
        let set = SchemaSet::load(&[path]).unwrap();
        assert_eq!(set.len(), 1);

        let doc = json!({"name": "ci", "jobs": [{"runs-on": "ubuntu-latest"}]});
        set.validate(&doc, ValidationMode::AllSchemas).unwrap();
    }

    #[test]
    fn violations_carry_instance_pointer() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_schema(dir.path(), "workflow.schema.json", &workflow_schema());
        let set = SchemaSet::load(&[path]).unwrap();

        let doc = json!({"name": "ci", "jobs": [{"runs-on": 5}]});
        let err = set.validate(&doc, ValidationMode::AllSchemas).unwrap_err();
        assert!(err.is_validation_failure());
        match &err {
            SchemaValidationError::ValidationFailed { violations, schema_names } => {
                assert_eq!(schema_names.len(), 1);
                assert_eq!(violations.len(), 1);
                let v = &violations.violations()[0];
                assert_eq!(v.instance_path, "/jobs/0/runs-on");
                assert!(v.schema_path.ends_with("/type"), "got: {}", v.schema_path);
            }
            other => panic!("Expected ValidationFailed, got: {other}"),
        }
    }

    #[test]
    fn missing_required_field_is_reported_at_root() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_schema(dir.path(), "workflow.schema.json", &workflow_schema());
        let set = SchemaSet::load(&[path]).unwrap();

        let err = set
            .validate(&json!({"name": "ci"}), ValidationMode::AllSchemas)
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("(root)"), "got: {message}");
        assert!(message.contains("jobs"), "got: {message}");
    }

    #[test]
    fn all_schemas_are_checked_unless_fail_fast() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_schema(dir.path(), "a.json", &json!({"required": ["a"]}));
        let b = write_schema(dir.path(), "b.json", &json!({"required": ["b"]}));
        let set = SchemaSet::load(&[a, b]).unwrap();

        let all = set.validate(&json!({}), ValidationMode::AllSchemas).unwrap_err();
        match all {
            SchemaValidationError::ValidationFailed { schema_names, violations } => {
                assert_eq!(schema_names.len(), 2);
                assert_eq!(violations.len(), 2);
            }
            other => panic!("Expected ValidationFailed, got: {other}"),
        }

        let first = set.validate(&json!({}), ValidationMode::FailFast).unwrap_err();
        match first {
            SchemaValidationError::ValidationFailed { schema_names, .. } => {
                assert_eq!(schema_names.len(), 1);
                assert!(schema_names[0].ends_with("a.json"));
            }
            other => panic!("Expected ValidationFailed, got: {other}"),
        }
    }

    #[test]
    fn missing_schema_is_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = SchemaSet::load(&[dir.path().join("nope.schema.json")]).unwrap_err();
        match &err {
            SchemaValidationError::SchemaLoadError { reason, .. } => {
                assert_eq!(reason, "file not found");
            }
            other => panic!("Expected SchemaLoadError, got: {other}"),
        }
        assert!(!err.is_validation_failure());
    }

    #[test]
    fn non_json_schema_is_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();
        let err = SchemaSet::load(&[path]).unwrap_err();
        assert!(
            matches!(err, SchemaValidationError::SchemaLoadError { .. }),
            "Expected SchemaLoadError, got: {err}"
        );
    }

    #[test]
    fn invalid_schema_is_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_schema(dir.path(), "bad.json", &json!({"type": 12}));
        let err = SchemaSet::load(&[path]).unwrap_err();
        assert!(
            err.to_string().contains("invalid JSON Schema"),
            "got: {err}"
        );
    }

    #[test]
    fn sibling_ref_resolves_from_schema_directory() {
        let dir = tempfile::tempdir().unwrap();
        write_schema(
            dir.path(),
            "job.schema.json",
            &json!({"type": "object", "required": ["runs-on"]}),
        );
        let root = write_schema(
            dir.path(),
            "workflow.schema.json",
            &json!({
                "type": "object",
                "properties": {
                    "jobs": {"type": "array", "items": {"$ref": "job.schema.json"}}
                }
            }),
        );
        let set = SchemaSet::load(&[root]).unwrap();

        set.validate(&json!({"jobs": [{"runs-on": "x"}]}), ValidationMode::AllSchemas)
            .unwrap();
        let err = set
            .validate(&json!({"jobs": [{}]}), ValidationMode::AllSchemas)
            .unwrap_err();
        assert!(err.is_validation_failure());
    }

    #[test]
    fn ref_by_id_resolves_against_supplied_schema() {
        let dir = tempfile::tempdir().unwrap();
        let common = write_schema(
            dir.path(),
            "common.json",
            &json!({"$id": "https://example.test/common.json", "type": "string"}),
        );
        let root = write_schema(
            dir.path(),
            "root.json",
            &json!({"properties": {"name": {"$ref": "https://example.test/common.json"}}}),
        );
        let set = SchemaSet::load(&[root, common]).unwrap();
        assert!(set
            .validate(&json!({"name": 3}), ValidationMode::AllSchemas)
            .is_err());
    }

    #[test]
    fn unresolvable_ref_is_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let root = write_schema(
            dir.path(),
            "root.json",
            &json!({"properties": {"name": {"$ref": "https://example.test/elsewhere.json"}}}),
        );
        let err = SchemaSet::load(&[root]).unwrap_err();
        assert!(
            matches!(err, SchemaValidationError::SchemaLoadError { .. }),
            "Expected SchemaLoadError, got: {err}"
        );
    }

    #[test]
    fn yaml_schema_is_supported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schema.yaml");
        std::fs::write(&path, "type: object\nrequired: [name]\n").unwrap();
        let set = SchemaSet::load(&[path]).unwrap();
        assert!(set.validate(&json!({}), ValidationMode::AllSchemas).is_err());
        set.validate(&json!({"name": "x"}), ValidationMode::AllSchemas)
            .unwrap();
    }

    #[test]
    fn empty_set_accepts_anything() {
        let set = SchemaSet::empty();
        assert!(set.is_empty());
        set.validate(&json!([1, "two", null]), ValidationMode::AllSchemas)
            .unwrap();
    }

    #[test]
    fn violation_display_format() {
        let v = Violation {
            schema_name: "workflow.schema.json".to_string(),
            instance_path: "/jobs/0/runs-on".to_string(),
            schema_path: "/properties/jobs/items/properties/runs-on/type".to_string(),
            message: r#"5 is not of type "string""#.to_string(),
        };
        let display = v.to_string();
        assert!(display.contains("/jobs/0/runs-on"));
        assert!(display.contains("is not of type"));
        assert!(display.contains("workflow.schema.json#/properties/jobs"));
    }

    #[test]
    fn violation_display_root() {
        let v = Violation {
            schema_name: "s.json".to_string(),
            instance_path: String::new(),
            schema_path: "/required".to_string(),
            message: r#""jobs" is a required property"#.to_string(),
        };
        assert!(v.to_string().contains("(root)"));
    }
}
