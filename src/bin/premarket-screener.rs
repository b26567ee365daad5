//! premarket-screener CLI - ranked pre-market shortlist from a configured universe
//!
//! ## Example Usage
//!
//! ```bash
//! # Screen the universe from ~/.premarket-screener/config.toml
//! premarket-screener
//!
//! # Replay a fixed instant against offline fixtures, as JSON
//! premarket-screener --config screener.toml --as-of 2024-03-08T13:00:00Z --format json
//!
//! # Ad-hoc symbols, sequential fetches, debug logging
//! premarket-screener --symbols ABCD,WXYZ --sequential -v
//!
//! # Show the scanner catalogue
//! premarket-screener --list-scanners
//! ```
//!
//! Exits 0 when at least one symbol passed every filter, 1 otherwise
//! (including fatal configuration or universe errors).

use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::{Parser, ValueEnum};
use colored::Colorize;
use premarket_screener::config::ScreenerConfig;
use premarket_screener::data::ProviderRegistry;
use premarket_screener::engine::{ExecutionMode, ScreeningEngine};
use premarket_screener::report::{self, Report};
use premarket_screener::scanners;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;

/// premarket-screener: gap, volume and float screen before the opening bell
#[derive(Parser)]
#[command(name = "premarket-screener")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Pre-market equity screener producing a ranked shortlist", long_about = None)]
struct Cli {
    /// Configuration file (.json, .yaml or .toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Evaluation instant (RFC 3339); defaults to the config value, then now
    #[arg(long, value_name = "RFC3339")]
    as_of: Option<String>,

    /// Symbols to screen instead of the configured universe
    #[arg(short, long, value_delimiter = ',')]
    symbols: Vec<String>,

    /// Data provider name, overriding the configuration
    #[arg(short, long)]
    provider: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,

    /// Write the report to a file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Fetch one symbol at a time
    #[arg(long)]
    sequential: bool,

    /// Print the scanner catalogue and exit
    #[arg(long)]
    list_scanners: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
    Csv,
}

fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".premarket-screener").join("config.toml"))
}

fn load_config(path: Option<&Path>) -> anyhow::Result<ScreenerConfig> {
    if let Some(path) = path {
        return ScreenerConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()));
    }

    match default_config_path() {
        Some(default) if default.exists() => {
            log::info!("Using config {}", default.display());
            ScreenerConfig::load(&default)
                .with_context(|| format!("Failed to load config {}", default.display()))
        }
        _ => Ok(ScreenerConfig::default()),
    }
}

fn parse_as_of(value: &str) -> anyhow::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("Invalid --as-of '{}' (expected RFC 3339)", value))
}

fn list_scanners() -> anyhow::Result<i32> {
    let catalogue = scanners::build_scanner_definitions()?;
    scanners::validate_scanners(&catalogue)?;

    let mut group = "";
    for scanner in &catalogue {
        if scanner.group != group {
            group = &scanner.group;
            println!("\n{}", group.cyan().bold());
        }
        let keys: Vec<&str> = scanner.baselines.iter().map(|b| b.key.as_str()).collect();
        println!("  {:<22} {}", scanner.name.bold(), keys.join(" + ").dimmed());
        if let Some(notes) = &scanner.notes {
            println!("  {:<22} {}", "", notes.italic());
        }
    }
    Ok(0)
}

fn run(cli: &Cli) -> anyhow::Result<i32> {
    if cli.list_scanners {
        return list_scanners();
    }

    let mut config = load_config(cli.config.as_deref())?;
    if !cli.symbols.is_empty() {
        config.universe.symbols = cli.symbols.clone();
    }
    if let Some(provider) = &cli.provider {
        config.data.provider = provider.clone();
    }
    let as_of = match &cli.as_of {
        Some(value) => parse_as_of(value)?,
        None => config.as_of_or_now(),
    };

    let registry = ProviderRegistry::with_defaults();
    let mut engine = ScreeningEngine::from_config(&config, &registry)?;
    if cli.sequential {
        engine = engine.with_mode(ExecutionMode::Sequential);
    }

    let universe = config.resolve_universe()?;
    let results = engine.run_universe(&universe, as_of)?;

    let rendered = match cli.format {
        OutputFormat::Table => report::render_table(&report::rows(&results)),
        OutputFormat::Json => Report::new(&results, as_of, config.data.provider.as_str()).to_json()?,
        OutputFormat::Csv => {
            let mut buffer = Vec::new();
            report::write_csv(&report::rows(&results), &mut buffer)?;
            String::from_utf8(buffer).context("CSV output was not UTF-8")?
        }
    };

    match &cli.output {
        Some(path) => {
            fs::write(path, &rendered).with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!("Report written to {}", path.display().to_string().dimmed());
        }
        None => println!("{}", rendered),
    }

    let passed = results.iter().filter(|r| r.passed_all()).count();
    let summary = format!("{}/{} symbols passed all filters", passed, results.len());
    if passed > 0 {
        eprintln!("{}", summary.green().bold());
    } else {
        eprintln!("{}", summary.yellow());
    }

    Ok(report::exit_code(&results))
}

fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter)).init();

    match run(&cli) {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            process::exit(1);
        }
    }
}
