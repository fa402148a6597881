//! # tcs-cli — command-line interface for Technology Carbon Standard documents
//!
//! Provides the `tcs` binary.
//!
//! ## Subcommands
//!
//! - `tcs validate` — structural and semantic validation of a document.
//! - `tcs totals` — per-category and overall emissions in kgCO2e.
//! - `tcs migrate` — forward migration to newer schema versions.
//! - `tcs fetch` — download a published document, optionally validating it.
//!
//! ```bash
//! tcs validate tech-carbon-standard.json --strict
//! tcs totals tech-carbon-standard.json
//! tcs migrate old.json --to-version latest --output new.json
//! tcs fetch https://example.com/tech-carbon-standard.json --validate
//! ```
//!
//! ## Exit codes
//!
//! `0` success, `1` the document failed validation or migration, `2` an
//! operational error (unreadable input, missing schemas, bad configuration,
//! network failure).

pub mod config;
pub mod fetch;
pub mod migrate;
pub mod totals;
pub mod validate;

use std::io::{Read, Write};
use std::path::Path;

use anyhow::{Context, Result};
use serde_json::Value;

/// Exit code for a successful command.
pub const EXIT_OK: u8 = 0;
/// Exit code when the document is rejected.
pub const EXIT_REJECTED: u8 = 1;
/// Exit code for operational failures.
pub const EXIT_OPERATIONAL: u8 = 2;

/// Read a document argument: `-` is standard input, anything else a file.
pub fn read_input(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read standard input")?;
        return Ok(buf);
    }
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

/// Parse document text read from `path`, as YAML for `.yaml`/`.yml`.
///
/// Parse failures belong to the document, not the environment, so they are
/// returned as the inner `Err` for the caller to report with exit code 1.
pub fn parse_input(path: &Path, content: &str) -> std::result::Result<Value, String> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    tcs_schema::parse_document_text(content, ext)
}

/// Write `content` to `output`, or standard output when absent.
pub fn write_output(output: Option<&Path>, content: &str) -> Result<()> {
    match output {
        Some(path) => std::fs::write(path, content)
            .with_context(|| format!("failed to write {}", path.display())),
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(content.as_bytes())?;
            if !content.ends_with('\n') {
                stdout.write_all(b"\n")?;
            }
            Ok(())
        }
    }
}
