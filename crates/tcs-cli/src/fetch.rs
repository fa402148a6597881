//! # Fetch Subcommand
//!
//! Downloads a published document over HTTP(S) and writes it out,
//! optionally validating it against the bundled schemas first.
//!
//! The request runs on a single-threaded tokio runtime created for the
//! command; the rest of the CLI is synchronous.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use url::Url;

use crate::config::CliConfig;
use crate::{EXIT_OK, EXIT_REJECTED};

/// Arguments for the `tcs fetch` subcommand.
#[derive(Args, Debug)]
pub struct FetchArgs {
    /// Location of the document.
    #[arg(value_name = "URL")]
    pub url: Url,

    /// Validate the fetched document; exit 1 if it is invalid.
    #[arg(long)]
    pub validate: bool,

    /// Treat validation warnings as failures (implies `--validate`).
    #[arg(long)]
    pub strict: bool,

    /// Directory holding the `*.schema.json` files.
    #[arg(long, value_name = "DIR")]
    pub schema_dir: Option<PathBuf>,

    /// Write the document here instead of standard output.
    #[arg(long, short, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

/// Execute the fetch subcommand.
pub fn run_fetch(args: &FetchArgs, config: &CliConfig) -> Result<u8> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    let body = runtime.block_on(download(&args.url, config.fetch_timeout_secs))?;

    let document = match tcs_schema::parse_document_text(&body, extension(&args.url)) {
        Ok(value) => value,
        Err(reason) => {
            eprintln!("FAIL: {}: {reason}", args.url);
            return Ok(EXIT_REJECTED);
        }
    };

    let mut code = EXIT_OK;
    if args.validate || args.strict {
        let schemas =
            crate::validate::load_schemas(&config.schema_dir_or(args.schema_dir.as_deref()))?;
        let report = crate::validate::validate_value(&document, &schemas, None)?;
        eprint!(
            "{}",
            crate::validate::render(std::path::Path::new(args.url.as_str()), &report)
        );
        code = crate::validate::exit_code(&report, args.strict);
    }

    crate::write_output(args.output.as_deref(), &serde_json::to_string_pretty(&document)?)?;
    Ok(code)
}

/// GET `url` and return the body. Non-success statuses are errors.
pub async fn download(url: &Url, timeout_secs: u64) -> Result<String> {
    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .user_agent(concat!("tcs/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("failed to build HTTP client")?;

    tracing::info!(%url, timeout_secs, "fetching document");
    let resp = http
        .get(url.clone())
        .send()
        .await
        .with_context(|| format!("GET {url} failed"))?;

    let status = resp.status();
    if !status.is_success() {
        anyhow::bail!("GET {url} returned {status}");
    }
    resp.text()
        .await
        .with_context(|| format!("failed to read body of {url}"))
}

/// File extension of the URL path, used to pick the parser.
fn extension(url: &Url) -> &str {
    url.path_segments()
        .and_then(|mut segments| segments.next_back())
        .and_then(|last| last.rsplit_once('.'))
        .map_or("", |(_, ext)| ext)
}
