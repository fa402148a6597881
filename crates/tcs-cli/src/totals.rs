//! # Totals Subcommand
//!
//! Prints per-category emissions (kgCO2e) for each report and for the whole
//! document. Extension fields are not counted.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use serde::Serialize;

use tcs_core::{Category, Document, EmissionsTotals};

use crate::{EXIT_OK, EXIT_REJECTED};

/// Arguments for the `tcs totals` subcommand.
#[derive(Args, Debug)]
pub struct TotalsArgs {
    /// Document to total (`.json`, `.yaml`, `.yml`, or `-` for stdin).
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Print totals as JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
struct ReportTotals {
    report: usize,
    from_date: String,
    to_date: String,
    #[serde(flatten)]
    totals: EmissionsTotals,
    total: f64,
}

#[derive(Debug, Serialize)]
struct DocumentTotals {
    reports: Vec<ReportTotals>,
    overall: EmissionsTotals,
    total: f64,
}

/// Execute the totals subcommand. A document that does not construct
/// yields exit code 1.
pub fn run_totals(args: &TotalsArgs) -> Result<u8> {
    let content = crate::read_input(&args.file)?;
    let document = match crate::parse_input(&args.file, &content)
        .and_then(|value| Document::from_value(value).map_err(|e| e.to_string()))
    {
        Ok(doc) => doc,
        Err(reason) => {
            println!("FAIL: {}: {reason}", args.file.display());
            return Ok(EXIT_REJECTED);
        }
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summarise(&document))?);
    } else {
        print!("{}", render(&document));
    }
    Ok(EXIT_OK)
}

fn summarise(document: &Document) -> DocumentTotals {
    let reports = document
        .reports()
        .iter()
        .enumerate()
        .map(|(i, report)| {
            let totals = report.totals();
            ReportTotals {
                report: i,
                from_date: report.period().from_date().to_string(),
                to_date: report.period().to_date().to_string(),
                total: totals.total(),
                totals,
            }
        })
        .collect();
    let overall = document.totals();
    DocumentTotals {
        reports,
        total: overall.total(),
        overall,
    }
}

fn render_line(out: &mut String, label: &str, totals: &EmissionsTotals) {
    out.push_str(label);
    out.push('\n');
    for category in Category::ALL {
        out.push_str(&format!(
            "  {:<22}{:>14.3}\n",
            category.as_str(),
            totals.by_category(*category)
        ));
    }
    out.push_str(&format!("  {:<22}{:>14.3}\n", "total", totals.total()));
}

/// Text table of the totals, in kgCO2e.
pub fn render(document: &Document) -> String {
    let mut out = String::new();
    for (i, report) in document.reports().iter().enumerate() {
        let period = report.period();
        let label = format!(
            "emissions_reports[{i}] {}..{} (kgCO2e)",
            period.from_date(),
            period.to_date()
        );
        render_line(&mut out, &label, &report.totals());
    }
    render_line(&mut out, "overall (kgCO2e)", &document.totals());
    out
}
