//! # Runtime Overrides
//!
//! The caller passes a single override string. Two encodings are accepted:
//!
//! - A JSON object (`{"image": {"tag": "v2"}}`): a partial document merged
//!   into the configuration. Its top-level entries also become template
//!   variables.
//! - An assignment list (`env=prod;replicas=3`): template variables only.
//!   Values are typed by their text (see [`parse_assignment_value`]).
//!
//! An empty or whitespace-only string means no overrides.

use serde_json::{Map, Value};

use crate::error::ConfigError;

/// Parsed runtime overrides.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Overrides {
    /// No overrides supplied.
    #[default]
    None,
    /// A partial document to deep-merge into the configuration.
    Document(Map<String, Value>),
    /// `key=value` assignments feeding template variables.
    Assignments(Map<String, Value>),
}

impl Overrides {
    /// Parse the raw override string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::OverrideParse`] when a JSON override is
    /// malformed or is not an object, or when an assignment has no `=`,
    /// an empty key, or a malformed `{...}`/`[...]` value.
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Ok(Overrides::None);
        }

        if trimmed.starts_with('{') {
            let value: Value = serde_json::from_str(trimmed).map_err(|e| {
                ConfigError::OverrideParse(format!("invalid JSON override: {e}"))
            })?;
            return match value {
                Value::Object(map) => Ok(Overrides::Document(map)),
                other => Err(ConfigError::OverrideParse(format!(
                    "JSON override must be an object, got {}",
                    type_name(&other)
                ))),
            };
        }

        let mut assignments = Map::new();
        for pair in trimmed.split(';') {
            let pair = pair.trim();
            if pair.is_empty() {
                continue;
            }
            let (key, value) = pair.split_once('=').ok_or_else(|| {
                ConfigError::OverrideParse(format!("expected key=value, got '{pair}'"))
            })?;
            let key = key.trim();
            if key.is_empty() {
                return Err(ConfigError::OverrideParse(format!(
                    "empty key in assignment '{pair}'"
                )));
            }
            assignments.insert(key.to_string(), parse_assignment_value(key, value)?);
        }
        Ok(Overrides::Assignments(assignments))
    }

    /// True when no overrides were supplied.
    pub fn is_empty(&self) -> bool {
        match self {
            Overrides::None => true,
            Overrides::Document(map) | Overrides::Assignments(map) => map.is_empty(),
        }
    }

    /// The entries that act as template variables.
    pub fn variables(&self) -> Option<&Map<String, Value>> {
        match self {
            Overrides::None => None,
            Overrides::Document(map) | Overrides::Assignments(map) => Some(map),
        }
    }
}

/// Type the text on the right of an assignment.
///
/// `{...}` and `[...]` are parsed as JSON; `true`/`false` and `null`/`none`
/// match case-insensitively; then integer, then float; anything else is a
/// string with surrounding double quotes stripped.
pub fn parse_assignment_value(key: &str, raw: &str) -> Result<Value, ConfigError> {
    let raw = raw.trim();

    if (raw.starts_with('{') && raw.ends_with('}')) || (raw.starts_with('[') && raw.ends_with(']'))
    {
        return serde_json::from_str(raw).map_err(|e| {
            ConfigError::OverrideParse(format!("invalid structured value for '{key}': {e}"))
        });
    }

    match raw.to_ascii_lowercase().as_str() {
        "true" => return Ok(Value::Bool(true)),
        "false" => return Ok(Value::Bool(false)),
        "null" | "none" => return Ok(Value::Null),
        _ => {}
    }

    if let Ok(i) = raw.parse::<i64>() {
        return Ok(Value::from(i));
    }
    if let Ok(f) = raw.parse::<f64>() {
        if let Some(n) = serde_json::Number::from_f64(f) {
            return Ok(Value::Number(n));
        }
    }

    Ok(Value::String(raw.trim_matches('"').to_string()))
}

/// Apply overrides to a document.
///
/// Only [`Overrides::Document`] changes the document; assignments act
/// through template resolution.
///
/// # Errors
///
/// Returns [`ConfigError::OverrideParse`] when a JSON override meets a
/// document whose root is not an object.
pub fn apply_overrides(document: &mut Value, overrides: &Overrides) -> Result<(), ConfigError> {
    let Overrides::Document(patch) = overrides else {
        return Ok(());
    };
    let Value::Object(target) = document else {
        return Err(ConfigError::OverrideParse(format!(
            "cannot merge a JSON override into a configuration whose root is {}",
            type_name(document)
        )));
    };
    merge_object(target, patch);
    Ok(())
}

/// Deep-merge `patch` into `target`.
///
/// Where both sides hold objects the merge recurses; otherwise the patch
/// value replaces the target value. Arrays are replaced, not concatenated.
pub fn merge_object(target: &mut Map<String, Value>, patch: &Map<String, Value>) {
    for (key, patch_value) in patch {
        match (target.get_mut(key), patch_value) {
            (Some(Value::Object(existing)), Value::Object(nested)) => {
                merge_object(existing, nested);
            }
            _ => {
                target.insert(key.clone(), patch_value.clone());
            }
        }
    }
}

pub(crate) fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
