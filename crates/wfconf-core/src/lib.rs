//! # wfconf-core — Configuration Document Handling
//!
//! Turns a workflow configuration file and a runtime override string into
//! the document that gets validated and emitted:
//!
//! 1. [`document::load_document`] reads JSON (or YAML) from disk.
//! 2. [`Overrides::parse`] reads the override string, either a JSON
//!    object to deep-merge or a `key=value;...` assignment list.
//! 3. [`apply_runtime_overrides`] merges, strips the `defaults` section,
//!    and resolves `${...}` placeholders ([`template`], [`expr`]).
//! 4. [`prune_disabled`] optionally drops `"disabled": true` objects.
//!
//! Schema validation lives in `wfconf-schema`.
//!
//! ## Crate Policy
//!
//! - No `.unwrap()` outside tests.
//! - No I/O besides [`document::load_document`].

pub mod document;
pub mod error;
pub mod expr;
pub mod overrides;
pub mod prune;
pub mod template;

pub use document::{load_document, to_single_line, DocumentFormat};
pub use error::{ConfigError, TemplateError};
pub use overrides::{apply_overrides, merge_object, Overrides};
pub use prune::prune_disabled;
pub use template::{apply_runtime_overrides, resolve_templates, take_defaults, Variables};
