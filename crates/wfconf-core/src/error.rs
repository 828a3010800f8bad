//! # Error Types
//!
//! Errors raised while turning a configuration file and a runtime override
//! string into the final document. Schema errors live in `wfconf-schema`.
//!
//! Every variant is terminal for the invocation. Messages carry the file
//! path or the offending expression so a CI log shows the root cause
//! without re-running locally.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type for configuration processing.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file could not be found or read.
    #[error("cannot load '{}': {source}", path.display())]
    Load {
        /// Path that was requested.
        path: PathBuf,
        /// Underlying IO failure.
        #[source]
        source: std::io::Error,
    },

    /// The file was read but is not valid JSON.
    #[error("invalid JSON content in '{}': {source}", path.display())]
    JsonParse {
        /// Path of the malformed document.
        path: PathBuf,
        /// Parser error with line and column.
        #[source]
        source: serde_json::Error,
    },

    /// The file was read but is not valid YAML, or uses YAML features
    /// that have no JSON equivalent.
    #[error("invalid YAML content in '{}': {reason}", path.display())]
    YamlParse {
        /// Path of the malformed document.
        path: PathBuf,
        /// Parser or conversion failure.
        reason: String,
    },

    /// The runtime override string is malformed.
    #[error("override parse error: {0}")]
    OverrideParse(String),

    /// Template resolution failed.
    #[error(transparent)]
    Template(#[from] TemplateError),
}

impl ConfigError {
    /// True when the underlying cause is a missing file.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ConfigError::Load { source, .. } if source.kind() == std::io::ErrorKind::NotFound
        )
    }
}

/// Fatal errors while resolving `${...}` placeholders.
///
/// Syntax errors in a conditional are not fatal (the placeholder is left
/// untouched), but referencing a variable that does not exist is.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TemplateError {
    /// A conditional expression named a variable that is not defined.
    #[error("conditional error in '{expression}': variable '{name}' is not defined")]
    UndefinedVariable {
        /// The full placeholder body.
        expression: String,
        /// The missing variable.
        name: String,
    },

    /// An ordering comparison between values that cannot be ordered.
    #[error("conditional error in '{expression}': cannot compare {left} {op} {right}")]
    IncomparableTypes {
        /// The full placeholder body.
        expression: String,
        /// Comparison operator as written.
        op: String,
        /// Type name of the left operand.
        left: &'static str,
        /// Type name of the right operand.
        right: &'static str,
    },
}
