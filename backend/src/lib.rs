//! # Covidash - COVID-19 time series analysis
//!
//! Covidash reads wide-format case count CSV files (one row per region, one
//! column per date, as published by JHU CSSE), reshapes them into long
//! records and derives growth metrics, daily series and summary statistics.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │  CSV / URL  │────▶│   Parser    │────▶│  Transform  │────▶│ JSON / CSV  │
//! │  (wide)     │     │  (auto-enc) │     │ (long, agg) │     │  (export)   │
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use covidash::{analyze_csv, PipelineOptions};
//! use std::path::Path;
//!
//! let result = analyze_csv(Path::new("confirmed_global.csv"), &PipelineOptions::default())?;
//! for row in &result.summary {
//!     println!("{}: {} cases", row.entity, row.total_cases);
//! }
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`models`] - Domain models (WideTable, LongRecord, GrowthRecord, ...)
//! - [`parser`] - Wide CSV parsing with auto-detection
//! - [`transform`] - Reshape, growth, series and pipeline
//! - [`validation`] - Entity name and options validation
//! - [`export`] - CSV export of analysis tables
//! - [`fetch`] - Source download
//! - [`api`] - HTTP API server

// Core modules
pub mod error;
pub mod models;

// Parsing
pub mod parser;

// Transformation
pub mod transform;

// Validation
pub mod validation;

// Output
pub mod export;

// Download
pub mod fetch;

// HTTP API
pub mod api;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    CsvError, FetchError, ParseError, PipelineError, PipelineResult, ServerError,
    ValidationError,
};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{
    ColumnLabel, DatasetOverview, DateColumn, GrowthRecord, GrowthStats, LongRecord,
    SummaryRow, TimeSeriesPoint, WeeklyGrowth, WideRow, WideTable,
};

// =============================================================================
// Re-exports - CSV Parsing
// =============================================================================

pub use parser::{
    decode_content, detect_delimiter, detect_encoding, parse_wide_bytes,
    parse_wide_bytes_auto, parse_wide_file_auto, parse_wide_table, ParseResult, TableLayout,
};

// =============================================================================
// Re-exports - Transform
// =============================================================================

pub use transform::{
    aggregate_by_entity, build_time_series, compute_growth, filter_date_range, growth_stats,
    normalize_entities, overview, parse_dates, select_entities, summarize, to_long,
    weekly_growth,
};

// =============================================================================
// Re-exports - Pipeline
// =============================================================================

pub use transform::pipeline::{
    analyze_bytes, analyze_csv, analyze_parsed, analyze_table, analyze_url, reshape,
    AnalysisResult, CsvInfo, PipelineOptions, Reshaped,
};

// =============================================================================
// Re-exports - Validation / Export / Fetch
// =============================================================================

pub use validation::{is_valid_pipeline_options, validate_pipeline_options};

pub use export::{analysis_to_csv_string, write_analysis_csv, ExportKind};

pub use fetch::{fetch_csv, source_url};

// Server
pub mod server {
    pub use crate::api::server::{port_from_env, start_server};
}
