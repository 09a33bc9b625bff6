//! valuation-audit: validate a workbook snapshot from the command line.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;
use valuation_audit_core::display::format_report;
use valuation_audit_core::formula::{self, Reference};
use valuation_audit_core::{Category, ScenarioSet, Snapshot, ValidationConfig, Validator};

#[derive(Parser)]
#[command(name = "valuation-audit")]
#[command(author, version, about = "Static validation of spreadsheet valuation models")]
struct Cli {
    /// More log output on stderr (-v debug, -vv trace). RUST_LOG takes precedence.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a JSON workbook snapshot and print the report
    Validate {
        /// Snapshot file: {"cells": [{"sheet", "row", "column", "raw", "computed_value"}]}
        snapshot: PathBuf,

        /// TOML file with thresholds, selectors and severity overrides
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// JSON array of scenarios
        #[arg(short, long, conflicts_with = "standard_scenarios")]
        scenarios: Option<PathBuf>,

        /// Evaluate the Bull / Base / Bear scenarios
        #[arg(long)]
        standard_scenarios: bool,

        /// Only report these categories (repeatable)
        #[arg(long = "category", value_enum)]
        categories: Vec<CategoryArg>,

        #[arg(short, long, value_enum, default_value = "text")]
        format: Format,
    },

    /// Show how a single formula is parsed
    Parse {
        formula: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum CategoryArg {
    Sanity,
    Structural,
    BalanceSheet,
    Formula,
}

impl From<CategoryArg> for Category {
    fn from(arg: CategoryArg) -> Self {
        match arg {
            CategoryArg::Sanity => Category::Sanity,
            CategoryArg::Structural => Category::Structural,
            CategoryArg::BalanceSheet => Category::BalanceSheet,
            CategoryArg::Formula => Category::Formula,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Text,
    Json,
}

/// Exit status when the report contains Critical findings.
const EXIT_UNSOUND: u8 = 2;

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let outcome = match cli.command {
        Commands::Validate { snapshot, config, scenarios, standard_scenarios, categories, format } => {
            validate(&snapshot, config, scenarios, standard_scenarios, &categories, format)
        }
        Commands::Parse { formula } => parse(&formula).map(|()| true),
    };

    match outcome {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(EXIT_UNSOUND),
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

/// Returns whether the model is sound.
fn validate(
    snapshot_path: &Path,
    config_path: Option<PathBuf>,
    scenarios_path: Option<PathBuf>,
    standard_scenarios: bool,
    categories: &[CategoryArg],
    format: Format,
) -> Result<bool> {
    let snapshot = Snapshot::load(snapshot_path)
        .with_context(|| format!("Failed to read snapshot '{}'", snapshot_path.display()))?;

    let config = match &config_path {
        Some(path) => {
            ValidationConfig::load(path).with_context(|| format!("Failed to load config '{}'", path.display()))?
        }
        None => ValidationConfig::default(),
    };

    let scenarios = match (&scenarios_path, standard_scenarios) {
        (Some(path), _) => {
            ScenarioSet::load(path).with_context(|| format!("Failed to load scenarios '{}'", path.display()))?
        }
        (None, true) => ScenarioSet::standard(),
        (None, false) => ScenarioSet::empty(),
    };

    let mut validator = Validator::new(config);
    if !categories.is_empty() {
        validator = validator.with_categories(categories.iter().map(|&c| Category::from(c)));
    }
    let report = validator.run(&snapshot, &scenarios).context("Validation failed")?;

    match format {
        Format::Text => print!("{}", format_report(&report)),
        Format::Json => println!("{}", report.to_json().context("Failed to serialize report")?),
    }
    Ok(!report.has_critical())
}

fn parse(text: &str) -> Result<()> {
    let parsed = formula::parse(text);
    if let Some(err) = &parsed.error {
        anyhow::bail!("{text}: {err}");
    }
    match parsed.canonical() {
        Some(canonical) => println!("canonical: {canonical}"),
        None => println!("not a formula"),
    }
    if let Some(shape) = parsed.shape(1, 1) {
        println!("shape (from A1): {}", shape.text);
    }
    for reference in &parsed.references {
        let kind = match reference {
            Reference::Cell(_) => "cell",
            Reference::Range(_) => "range",
            Reference::OpaqueRange(_) => "range (not expanded)",
        };
        println!("  {kind}: {reference}");
    }
    Ok(())
}
