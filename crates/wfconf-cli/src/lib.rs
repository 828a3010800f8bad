//! # wfconf-cli — Workflow Configuration Validator CLI
//!
//! The `wfconf` binary run by the CI composite action. It replaces the
//! interpreter bootstrap and validation script with one static binary.
//!
//! ## Subcommands
//!
//! - `validate` — load, override, template, validate, and emit a
//!   configuration document
//!
//! ## Crate Policy
//!
//! - Argument parsing is separated from the pipeline ([`validate::ValidateRequest`]).
//! - Document logic lives in `wfconf-core` and `wfconf-schema`.
//! - Standard output carries only the document; logs and diagnostics go
//!   to standard error.

pub mod output;
pub mod validate;
