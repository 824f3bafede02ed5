//! Covidash CLI - COVID-19 time series analysis
//!
//! # Main Commands
//!
//! ```bash
//! covidash serve                              # Start HTTP server (port 3000)
//! covidash analyze confirmed.csv             # Full analysis as JSON
//! covidash export summary --url -o out/      # Download, analyze, write CSV
//! ```
//!
//! # Stage Commands
//!
//! ```bash
//! covidash overview confirmed.csv            # Dataset facts
//! covidash long confirmed.csv --csv          # Wide to long records
//! covidash growth confirmed.csv --countries France,Italy
//! covidash summary confirmed.csv --start 2020-03-01 --end 2020-06-30
//! covidash weekly confirmed.csv
//! ```

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use covidash::{
    analyze_parsed, fetch_csv, overview, parse_dates, parse_wide_bytes, reshape, source_url,
    write_analysis_csv, AnalysisResult, ExportKind, ParseResult, PipelineOptions,
};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "covidash")]
#[command(about = "Reshape COVID-19 time series and compute growth metrics", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Where the CSV comes from and how to analyze it
#[derive(Args)]
struct Source {
    /// Input CSV file
    #[arg(required_unless_present = "url", conflicts_with = "url")]
    input: Option<PathBuf>,

    /// Download the CSV instead (default: COVIDASH_SOURCE_URL or the JHU series)
    #[arg(long, num_args = 0..=1, default_missing_value = "")]
    url: Option<String>,

    /// CSV delimiter (auto-detect if not specified)
    #[arg(short, long)]
    delimiter: Option<char>,

    /// Pipeline options JSON file
    #[arg(long)]
    options: Option<PathBuf>,

    /// Comma-separated entities to keep
    #[arg(long, value_delimiter = ',')]
    countries: Vec<String>,

    /// First date to report (YYYY-MM-DD)
    #[arg(long)]
    start: Option<NaiveDate>,

    /// Last date to report (YYYY-MM-DD)
    #[arg(long)]
    end: Option<NaiveDate>,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Entity count, rows and date span of the dataset
    Overview {
        #[command(flatten)]
        source: Source,
    },

    /// Reshape to long records (one per entity row and date)
    Long {
        #[command(flatten)]
        source: Source,

        /// Write CSV instead of JSON
        #[arg(long)]
        csv: bool,
    },

    /// Day-over-day absolute and percent change per entity
    Growth {
        #[command(flatten)]
        source: Source,
    },

    /// Latest totals and weekly/monthly new cases per entity
    Summary {
        #[command(flatten)]
        source: Source,
    },

    /// Week-level totals and growth per entity
    Weekly {
        #[command(flatten)]
        source: Source,
    },

    /// Full analysis as JSON
    Analyze {
        #[command(flatten)]
        source: Source,
    },

    /// Write one analysis table as CSV
    Export {
        /// time-series, summary, growth or weekly
        #[arg(value_parser = parse_export_kind)]
        kind: ExportKind,

        #[command(flatten)]
        source: Source,
    },

    /// Start HTTP server
    Serve {
        /// Port to listen on (default: COVIDASH_PORT or 3000)
        #[arg(short, long)]
        port: Option<u16>,
    },
}

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Overview { source } => cmd_overview(&source).await,
        Commands::Long { source, csv } => cmd_long(&source, csv).await,
        Commands::Growth { source } => {
            cmd_table(&source, |r| serde_json::to_string_pretty(&r.growth)).await
        }
        Commands::Summary { source } => {
            cmd_table(&source, |r| serde_json::to_string_pretty(&r.summary)).await
        }
        Commands::Weekly { source } => {
            cmd_table(&source, |r| serde_json::to_string_pretty(&r.weekly)).await
        }
        Commands::Analyze { source } => {
            cmd_table(&source, |r| serde_json::to_string_pretty(r)).await
        }
        Commands::Export { kind, source } => cmd_export(kind, &source).await,
        Commands::Serve { port } => cmd_serve(port).await,
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

fn parse_export_kind(name: &str) -> Result<ExportKind, String> {
    ExportKind::from_name(name)
        .ok_or_else(|| format!("unknown export kind '{}' (time-series, summary, growth, weekly)", name))
}

/// Options file overlaid with command line flags.
fn build_options(source: &Source) -> CliResult<PipelineOptions> {
    let mut options = match &source.options {
        Some(path) => PipelineOptions::from_file(path)?,
        None => PipelineOptions::default(),
    };

    if !source.countries.is_empty() {
        options.entities = source.countries.clone();
    }
    if source.start.is_some() {
        options.start_date = source.start;
    }
    if source.end.is_some() {
        options.end_date = source.end;
    }

    options.validate()?;
    Ok(options)
}

/// Read or download the CSV and parse it.
async fn load(source: &Source, options: &PipelineOptions) -> CliResult<ParseResult> {
    let bytes = match (&source.url, &source.input) {
        (Some(url), _) => {
            let url = if url.is_empty() { source_url() } else { url.clone() };
            eprintln!("🌐 Downloading: {}", url);
            fetch_csv(&url).await?
        }
        (None, Some(path)) => {
            eprintln!("📄 Reading: {}", path.display());
            fs::read(path)?
        }
        (None, None) => return Err("no input file or --url given".into()),
    };

    Ok(parse_wide_bytes(&bytes, source.delimiter, &options.layout)?)
}

async fn analyze(source: &Source) -> CliResult<AnalysisResult> {
    let options = build_options(source)?;
    let parsed = load(source, &options).await?;
    Ok(analyze_parsed(parsed, &options)?)
}

async fn cmd_overview(source: &Source) -> CliResult<()> {
    let options = build_options(source)?;
    let parsed = load(source, &options).await?;

    let dates = parse_dates(&parsed.table.columns, &options.date_formats);
    let overview = overview(&parsed.table, &dates.columns);

    write_json(&overview, source.output.as_deref())
}

async fn cmd_long(source: &Source, csv: bool) -> CliResult<()> {
    let options = build_options(source)?;
    let parsed = load(source, &options).await?;
    let reshaped = reshape(&parsed.table, &options)?;

    eprintln!(
        "✅ {} long records, {} date columns dropped",
        reshaped.records.len(),
        reshaped.dates.warnings.len()
    );

    if csv {
        let mut buf = Vec::new();
        covidash::export::write_long_csv(&mut buf, &reshaped.records)?;
        write_output(&String::from_utf8_lossy(&buf), source.output.as_deref())
    } else {
        write_json(&reshaped.records, source.output.as_deref())
    }
}

async fn cmd_table<F>(source: &Source, render: F) -> CliResult<()>
where
    F: FnOnce(&AnalysisResult) -> serde_json::Result<String>,
{
    let result = analyze(source).await?;
    let json = render(&result)?;
    write_output(&json, source.output.as_deref())
}

async fn cmd_export(kind: ExportKind, source: &Source) -> CliResult<()> {
    let result = analyze(source).await?;

    match source.output.as_deref() {
        Some(path) => {
            let path = if path.is_dir() {
                path.join(kind.file_name())
            } else {
                path.to_path_buf()
            };
            let file = fs::File::create(&path)?;
            write_analysis_csv(file, &result, kind)?;
            eprintln!("💾 Output written to: {}", path.display());
        }
        None => write_analysis_csv(std::io::stdout().lock(), &result, kind)?,
    }

    Ok(())
}

async fn cmd_serve(port: Option<u16>) -> CliResult<()> {
    let port = port.unwrap_or_else(covidash::server::port_from_env);
    covidash::server::start_server(port).await
}

fn write_json<T: Serialize + ?Sized>(value: &T, path: Option<&Path>) -> CliResult<()> {
    let json = serde_json::to_string_pretty(value)?;
    write_output(&json, path)
}

fn write_output(content: &str, path: Option<&Path>) -> CliResult<()> {
    match path {
        Some(p) => {
            fs::write(p, content)?;
            eprintln!("💾 Output written to: {}", p.display());
        }
        None => {
            println!("{}", content);
        }
    }
    Ok(())
}
