//! # Validate Subcommand
//!
//! `wfconf validate <CONFIG> <OVERRIDES> [SCHEMA]...`
//!
//! Loads the configuration, applies the runtime overrides, resolves
//! template variables, validates against every schema, and prints the
//! result as one line of JSON. Positional arguments match the calling
//! action's `validate(config_path, overrides, *schema_paths)` contract;
//! each schema argument may hold several whitespace-separated paths.
//!
//! Nothing is written to stdout unless every step succeeds.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use serde_json::Value;

use wfconf_core::{apply_runtime_overrides, load_document, prune_disabled, Overrides};
use wfconf_schema::{SchemaSet, SchemaValidationError, ValidationMode};

use crate::output::{self, GithubOutput, OutputFormat};

/// Arguments for the `wfconf validate` subcommand.
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Configuration file to validate (.json, or .yaml/.yml).
    #[arg(value_name = "CONFIG")]
    pub config: PathBuf,

    /// Runtime overrides: a JSON object to merge, or `key=value;...`
    /// template variables. Pass "" for none.
    #[arg(value_name = "OVERRIDES")]
    pub overrides: String,

    /// JSON Schema files. Each argument may list several paths separated
    /// by spaces or newlines.
    #[arg(value_name = "SCHEMA")]
    pub schemas: Vec<String>,

    /// Encoding of the document written to stdout.
    #[arg(long, value_enum, default_value_t = OutputFormat::Json, env = "WFCONF_FORMAT")]
    pub format: OutputFormat,

    /// Indent JSON output (debugging only; breaks the single-line contract).
    #[arg(long)]
    pub pretty: bool,

    /// Leave `${...}` placeholders unresolved.
    #[arg(long, env = "WFCONF_NO_SUBSTITUTE")]
    pub no_substitute: bool,

    /// Drop objects marked `"disabled": true` after validation.
    #[arg(long, env = "WFCONF_PRUNE_DISABLED")]
    pub prune_disabled: bool,

    /// Stop at the first schema that reports violations.
    #[arg(long, env = "WFCONF_FAIL_FAST")]
    pub fail_fast: bool,

    /// Append `config=` and `config_base64=` lines to this file on success.
    #[arg(long, value_name = "FILE", env = "WFCONF_GITHUB_OUTPUT")]
    pub github_output: Option<PathBuf>,
}

/// Everything the pipeline needs, independent of argument parsing.
#[derive(Debug, Clone)]
pub struct ValidateRequest {
    pub config: PathBuf,
    pub overrides: String,
    pub schemas: Vec<PathBuf>,
    pub substitute: bool,
    pub prune_disabled: bool,
    pub mode: ValidationMode,
}

impl ValidateRequest {
    /// A request with default switches: substitute on, prune off, all schemas.
    pub fn new(config: impl Into<PathBuf>, overrides: impl Into<String>) -> Self {
        Self {
            config: config.into(),
            overrides: overrides.into(),
            schemas: Vec::new(),
            substitute: true,
            prune_disabled: false,
            mode: ValidationMode::AllSchemas,
        }
    }

    pub fn with_schemas<P: Into<PathBuf>>(mut self, schemas: impl IntoIterator<Item = P>) -> Self {
        self.schemas = schemas.into_iter().map(Into::into).collect();
        self
    }
}

impl From<&ValidateArgs> for ValidateRequest {
    fn from(args: &ValidateArgs) -> Self {
        Self {
            config: args.config.clone(),
            overrides: args.overrides.clone(),
            schemas: split_schema_args(&args.schemas),
            substitute: !args.no_substitute,
            prune_disabled: args.prune_disabled,
            mode: if args.fail_fast {
                ValidationMode::FailFast
            } else {
                ValidationMode::AllSchemas
            },
        }
    }
}

/// Result of a pipeline run that got as far as schema validation.
#[derive(Debug)]
pub enum Outcome {
    /// The final document.
    Valid(Value),
    /// The document violates at least one schema.
    Invalid(SchemaValidationError),
}

/// Execute the validate subcommand.
///
/// Returns exit code: 0 on success, 1 on validation failure. Load and
/// parse failures are returned as errors.
pub fn run_validate(args: &ValidateArgs) -> Result<u8> {
    let request = ValidateRequest::from(args);

    let document = match validate_config(&request)? {
        Outcome::Valid(document) => document,
        Outcome::Invalid(err) => {
            eprintln!("{err}");
            return Ok(1);
        }
    };

    let rendered = output::render(&document, args.format, args.pretty)?;
    let github_output = args
        .github_output
        .as_deref()
        .map(GithubOutput::open)
        .transpose()?;

    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{rendered}")
        .and_then(|()| stdout.flush())
        .context("failed to write to stdout")?;

    // Outputs are only published once the document reached stdout.
    if let Some(github_output) = github_output {
        github_output.publish(&document)?;
    }
    Ok(0)
}

/// Run the full pipeline for `request`.
///
/// # Errors
///
/// Configuration load, override, template, and schema load failures.
/// Schema violations are reported as [`Outcome::Invalid`] instead.
pub fn validate_config(request: &ValidateRequest) -> Result<Outcome> {
    let mut document = load_document(&request.config)?;
    tracing::info!(config = %request.config.display(), "loaded configuration");

    let overrides = Overrides::parse(&request.overrides)?;
    apply_runtime_overrides(&mut document, &overrides, request.substitute)?;
    tracing::debug!(overrides = !overrides.is_empty(), "applied runtime overrides");

    let schemas = SchemaSet::load(&request.schemas)?;
    if schemas.is_empty() {
        tracing::info!("no schemas supplied; skipping validation");
    } else {
        tracing::info!(schema_count = schemas.len(), "loaded schemas");
        match schemas.validate(&document, request.mode) {
            Ok(()) => {}
            Err(err) if err.is_validation_failure() => return Ok(Outcome::Invalid(err)),
            Err(err) => return Err(err.into()),
        }
    }

    if request.prune_disabled {
        document = prune_disabled(document);
    }

    Ok(Outcome::Valid(document))
}

/// Split schema arguments on whitespace. Empty arguments contribute nothing.
pub fn split_schema_args(args: &[String]) -> Vec<PathBuf> {
    args.iter()
        .flat_map(|arg| arg.split_whitespace())
        .map(PathBuf::from)
        .collect()
}
