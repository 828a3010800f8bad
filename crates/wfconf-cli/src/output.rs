//! # Output Encoding
//!
//! Renders the validated document for standard output and, when asked,
//! appends it to a GitHub Actions output file as both raw single-line
//! JSON and base64.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use clap::ValueEnum;
use serde_json::Value;

use wfconf_core::to_single_line;

/// Name of the raw JSON output in the GitHub output file.
pub const RAW_OUTPUT_NAME: &str = "config";
/// Name of the base64 output in the GitHub output file.
pub const BASE64_OUTPUT_NAME: &str = "config_base64";

/// Encoding of the document written to standard output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Single-line JSON.
    #[default]
    Json,
    /// Standard base64 of the single-line JSON.
    Base64,
}

/// Render `document` for standard output.
///
/// `pretty` only applies to [`OutputFormat::Json`] and is meant for local
/// debugging; the calling action expects a single line.
pub fn render(document: &Value, format: OutputFormat, pretty: bool) -> Result<String> {
    match format {
        OutputFormat::Json if pretty => {
            serde_json::to_string_pretty(document).context("failed to serialize document")
        }
        OutputFormat::Json => Ok(to_single_line(document)),
        OutputFormat::Base64 => Ok(encode_base64(&to_single_line(document))),
    }
}

/// Standard (padded) base64 of `line`.
pub fn encode_base64(line: &str) -> String {
    STANDARD.encode(line.as_bytes())
}

/// A GitHub Actions output file opened for appending.
///
/// Opening is separate from writing so an unusable path fails the run
/// before anything reaches standard output.
#[derive(Debug)]
pub struct GithubOutput {
    path: PathBuf,
    file: File,
}

impl GithubOutput {
    /// Open (creating if needed) the output file at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("cannot open GitHub output file {}", path.display()))?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    /// Append `config=<json>` and `config_base64=<b64>` for `document`.
    pub fn publish(mut self, document: &Value) -> Result<()> {
        let line = to_single_line(document);
        let entries = format!(
            "{RAW_OUTPUT_NAME}={line}\n{BASE64_OUTPUT_NAME}={}\n",
            encode_base64(&line)
        );
        self.file
            .write_all(entries.as_bytes())
            .with_context(|| format!("cannot write GitHub output file {}", self.path.display()))?;
        tracing::info!(path = %self.path.display(), "wrote GitHub outputs");
        Ok(())
    }
}
