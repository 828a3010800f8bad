//! # Document Loading
//!
//! Reads configuration and schema files from disk into `serde_json::Value`.
//! The format is chosen from the file extension: `.yaml`/`.yml` files are
//! deserialized from YAML straight into a JSON value tree, anything else is
//! parsed as JSON. YAML that has no JSON equivalent (sequence or mapping
//! keys) is a parse error.

use std::path::Path;

use serde_json::Value;

use crate::error::ConfigError;

/// On-disk encoding of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Json,
    Yaml,
}

impl DocumentFormat {
    /// Infer the format from a path's extension. Defaults to JSON.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
                DocumentFormat::Yaml
            }
            _ => DocumentFormat::Json,
        }
    }
}

/// Load a document from `path`.
///
/// # Errors
///
/// - [`ConfigError::Load`] if the file is missing or unreadable.
/// - [`ConfigError::JsonParse`] if a JSON file is malformed.
/// - [`ConfigError::YamlParse`] if a YAML file is malformed or cannot be
///   represented as JSON.
pub fn load_document(path: &Path) -> Result<Value, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Load {
        path: path.to_path_buf(),
        source,
    })?;

    let value = parse_document(&content, DocumentFormat::from_path(path), path)?;
    tracing::debug!(path = %path.display(), "loaded document");
    Ok(value)
}

/// Parse document text in the given format. `origin` is only used for
/// error messages.
pub fn parse_document(
    content: &str,
    format: DocumentFormat,
    origin: &Path,
) -> Result<Value, ConfigError> {
    match format {
        DocumentFormat::Json => {
            serde_json::from_str(content).map_err(|source| ConfigError::JsonParse {
                path: origin.to_path_buf(),
                source,
            })
        }
        DocumentFormat::Yaml => {
            serde_yaml::from_str::<Value>(content).map_err(|e| ConfigError::YamlParse {
                path: origin.to_path_buf(),
                reason: e.to_string(),
            })
        }
    }
}

/// Serialize a document as a single line of JSON.
///
/// `serde_json` escapes control characters inside strings, so the output
/// never contains a raw newline.
pub fn to_single_line(value: &Value) -> String {
    // Serializing a `Value` cannot fail: keys are always strings.
    value.to_string()
}
