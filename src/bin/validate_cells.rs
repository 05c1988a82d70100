//! Validate the cell ids in a JSON record file.
//!
//! Reads the given file, or `./cells.json`, or falls back to a built-in
//! sample. Prints a one-line summary and the first issues found.

use clap::Parser;
use colored::Colorize;
use h3_heatmap::error::Result;
use h3_heatmap::json_parser::JsonParser;
use h3_heatmap::validation::{sample_records, validate_records};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_INPUT: &str = "cells.json";

#[derive(Debug, Parser)]
#[command(name = "validate-cells", about = "Check H3 cell ids and their boundaries")]
struct Cli {
    /// JSON array of records; defaults to ./cells.json, then a built-in sample
    path: Option<PathBuf>,

    /// Print the summary as JSON
    #[arg(long)]
    json: bool,

    /// Exit with status 1 when any record is bad
    #[arg(long)]
    strict: bool,
}

fn load_records(cli: &Cli) -> Result<Vec<Value>> {
    let path = match &cli.path {
        Some(path) => Some(path.clone()),
        None => Path::new(DEFAULT_INPUT)
            .exists()
            .then(|| PathBuf::from(DEFAULT_INPUT)),
    };
    let Some(path) = path else {
        info!("no input file, using built-in sample");
        return Ok(sample_records());
    };

    match JsonParser::load_json(&path)? {
        Value::Array(records) => Ok(records),
        other => {
            warn!(path = %path.display(), "input is not an array, validating it as one record");
            Ok(vec![other])
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let records = match load_records(&cli) {
        Ok(records) => records,
        Err(e) => {
            eprintln!("{} {e}", "error:".red().bold());
            return ExitCode::from(2);
        }
    };

    let summary = validate_records(&records);
    if cli.json {
        match serde_json::to_string_pretty(&summary) {
            Ok(text) => println!("{text}"),
            Err(e) => {
                eprintln!("{} {e}", "error:".red().bold());
                return ExitCode::from(2);
            }
        }
    } else {
        let headline = summary.headline();
        if summary.bad == 0 {
            println!("{}", headline.green());
        } else {
            println!("{}", headline.yellow());
            println!("Issues:");
            for issue in &summary.issues {
                println!(
                    "  #{:<4} {:<18} {}",
                    issue.index,
                    issue.cell.as_deref().unwrap_or("-"),
                    issue.reason.red()
                );
            }
        }
    }

    if cli.strict && summary.bad > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
