//! # Template Resolution
//!
//! String values in a configuration may reference variables with
//! `${name}` or pick a value with a conditional expression
//! (`${"a" if env == "prod" else "b"}`, see [`crate::expr`]).
//!
//! Variables come from the runtime overrides and, as fallbacks, from the
//! document's top-level `defaults` section:
//!
//! ```json
//! {
//!   "defaults": [{"env": "dev"}, {"replicas": 1}],
//!   "cluster": "${env}-cluster",
//!   "replicas": "${replicas}"
//! }
//! ```
//!
//! A string that is exactly one placeholder takes the variable's JSON type
//! (`"${replicas}"` becomes `1`, not `"1"`). Placeholders inside a longer
//! string are interpolated as text. Undefined variables, and conditionals
//! that evaluate to `None`, are left as written.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

use crate::error::{ConfigError, TemplateError};
use crate::expr::{self, ExprError};
use crate::overrides::{type_name, Overrides};

/// Top-level key holding variable defaults.
pub const DEFAULTS_KEY: &str = "defaults";

static PLACEHOLDER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{([^}]+)\}").expect("valid placeholder regex"));
static WHOLE_PLACEHOLDER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\$\{([^}]+)\}$").expect("valid whole placeholder regex"));
static CONDITIONAL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bif\b.*\belse\b").expect("valid conditional regex"));

/// The variable table used for substitution.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Variables {
    values: Map<String, Value>,
}

impl Variables {
    /// Build the table from override entries, then fill gaps from the
    /// defaults entries in order. The first default for a key wins.
    pub fn build(overrides: &Overrides, defaults: &[Map<String, Value>]) -> Self {
        let mut values = overrides.variables().cloned().unwrap_or_default();
        for entry in defaults {
            for (key, value) in entry {
                if !values.contains_key(key) {
                    values.insert(key.clone(), value.clone());
                }
            }
        }
        Self { values }
    }

    /// Look up a variable.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.values
    }
}

/// Merge `overrides` into `document`, strip the `defaults` section, and,
/// when `substitute` is set, resolve every placeholder.
///
/// With no overrides and no defaults the document is left as written,
/// placeholders included.
///
/// This is the full override step of the validator and runs before schema
/// validation, since substituted values can decide whether the document
/// is valid.
pub fn apply_runtime_overrides(
    document: &mut Value,
    overrides: &Overrides,
    substitute: bool,
) -> Result<(), ConfigError> {
    crate::overrides::apply_overrides(document, overrides)?;

    let defaults = take_defaults(document)?;
    if !substitute || (overrides.is_empty() && defaults.is_empty()) {
        return Ok(());
    }

    let variables = Variables::build(overrides, &defaults);
    if variables.is_empty() {
        tracing::debug!("no template variables defined");
    }
    let changed = resolve_templates(document, &variables)?;
    tracing::debug!(variables = variables.len(), changed, "resolved templates");
    Ok(())
}

/// Remove and return the `defaults` section of `document`.
///
/// The section must be an array of objects. Documents that are not
/// objects, or have no `defaults` key, yield an empty list.
///
/// # Errors
///
/// Returns [`ConfigError::OverrideParse`] if the section is malformed.
pub fn take_defaults(document: &mut Value) -> Result<Vec<Map<String, Value>>, ConfigError> {
    let Some(map) = document.as_object_mut() else {
        return Ok(Vec::new());
    };
    let Some(section) = map.shift_remove(DEFAULTS_KEY) else {
        return Ok(Vec::new());
    };

    let Value::Array(entries) = section else {
        return Err(ConfigError::OverrideParse(format!(
            "'{DEFAULTS_KEY}' must be an array of objects, got {}",
            type_name(&section)
        )));
    };

    entries
        .into_iter()
        .enumerate()
        .map(|(i, entry)| match entry {
            Value::Object(m) => Ok(m),
            other => Err(ConfigError::OverrideParse(format!(
                "'{DEFAULTS_KEY}[{i}]' must be an object, got {}",
                type_name(&other)
            ))),
        })
        .collect()
}

/// Replace placeholders throughout `document`. Returns the number of
/// string values that changed.
///
/// # Errors
///
/// Returns [`TemplateError`] when a conditional references an undefined
/// variable or compares values that cannot be ordered.
pub fn resolve_templates(document: &mut Value, variables: &Variables) -> Result<usize, TemplateError> {
    match document {
        Value::String(s) => match resolve_string(s, variables)? {
            Some(resolved) => {
                *document = resolved;
                Ok(1)
            }
            None => Ok(0),
        },
        Value::Array(items) => {
            let mut changed = 0;
            for item in items {
                changed += resolve_templates(item, variables)?;
            }
            Ok(changed)
        }
        Value::Object(map) => {
            let mut changed = 0;
            for item in map.values_mut() {
                changed += resolve_templates(item, variables)?;
            }
            Ok(changed)
        }
        _ => Ok(0),
    }
}

/// Resolve a single string. `None` means the string is unchanged.
fn resolve_string(s: &str, variables: &Variables) -> Result<Option<Value>, TemplateError> {
    if !s.contains("${") {
        return Ok(None);
    }

    if let Some(caps) = WHOLE_PLACEHOLDER_RE.captures(s) {
        return resolve_placeholder(&caps[1], variables);
    }

    let mut out = String::with_capacity(s.len());
    let mut last = 0;
    let mut changed = false;
    for caps in PLACEHOLDER_RE.captures_iter(s) {
        let Some(whole) = caps.get(0) else { continue };
        out.push_str(&s[last..whole.start()]);
        match resolve_placeholder(&caps[1], variables)? {
            Some(Value::String(text)) => {
                out.push_str(&text);
                changed = true;
            }
            Some(other) => {
                out.push_str(&other.to_string());
                changed = true;
            }
            None => out.push_str(whole.as_str()),
        }
        last = whole.end();
    }
    out.push_str(&s[last..]);

    Ok(changed.then_some(Value::String(out)))
}

fn resolve_placeholder(body: &str, variables: &Variables) -> Result<Option<Value>, TemplateError> {
    let body = body.trim();
    if !CONDITIONAL_RE.is_match(body) {
        return Ok(variables.get(body).cloned());
    }

    match expr::evaluate(body, variables.as_map()) {
        Ok(Value::Null) => Ok(None),
        Ok(value) => Ok(Some(value)),
        Err(ExprError::Syntax(reason)) => {
            tracing::warn!(expression = body, %reason, "leaving unsupported conditional unresolved");
            Ok(None)
        }
        Err(ExprError::UndefinedVariable(name)) => Err(TemplateError::UndefinedVariable {
            expression: body.to_string(),
            name,
        }),
        Err(ExprError::Incomparable { op, left, right }) => Err(TemplateError::IncomparableTypes {
            expression: body.to_string(),
            op: op.to_string(),
            left,
            right,
        }),
    }
}
