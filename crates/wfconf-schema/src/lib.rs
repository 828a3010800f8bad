//! # wfconf-schema — Schema Validation
//!
//! Validates the final configuration document against the JSON Schema
//! files named on the command line.
//!
//! - [`SchemaSet::load`] reads and compiles every schema up front, so a
//!   missing or broken schema fails before any document is checked.
//! - [`SchemaSet::validate`] checks a document against every schema and
//!   returns every violation with its JSON pointer and constraint.
//!
//! ## Crate Policy
//!
//! - Depends only on `wfconf-core` internally.
//! - Never fetches schemas over the network: `$ref`s resolve against the
//!   supplied schemas and files next to them, or fail.
//! - Validation is a pure read: documents are never mutated here.

pub mod validate;

pub use validate::{SchemaSet, SchemaValidationError, ValidationMode, ValidationViolations, Violation};
