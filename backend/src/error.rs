//! Error types for the covidash transformation pipeline.
//!
//! - [`CsvError`] - Wide table parsing errors (line/column context)
//! - [`ParseError`] - A single date column that could not be parsed
//! - [`ValidationError`] - Entity names and pipeline options
//! - [`FetchError`] - Remote CSV download errors
//! - [`PipelineError`] - Top-level orchestration errors
//! - [`ServerError`] - HTTP API errors
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.
//!
//! [`ParseError`] is the only non-fatal error: the pipeline collects it
//! as a warning and keeps going without the offending column.

use thiserror::Error;

// =============================================================================
// CSV Parsing Errors
// =============================================================================

/// CSV parsing error with context.
#[derive(Debug, Clone, PartialEq)]
pub struct CsvError {
    pub line: usize,
    pub column: Option<String>,
    pub value: Option<String>,
    pub message: String,
}

impl std::fmt::Display for CsvError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.column, &self.value) {
            (Some(col), Some(val)) => {
                write!(f, "Line {}, column '{}' (value '{}'): {}", self.line, col, val, self.message)
            }
            (Some(col), None) => {
                write!(f, "Line {}, column '{}': {}", self.line, col, self.message)
            }
            _ => {
                write!(f, "Line {}: {}", self.line, self.message)
            }
        }
    }
}

impl std::error::Error for CsvError {}

impl CsvError {
    pub fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            column: None,
            value: None,
            message: message.into(),
        }
    }

    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }
}

// =============================================================================
// Date Column Errors
// =============================================================================

/// A date column label that matched none of the configured formats.
///
/// Reported per column. The column is dropped and processing continues.
#[derive(Debug, Clone, PartialEq, Error, serde::Serialize)]
#[error("Unrecognized date column '{label}' (column {column}): {reason}")]
pub struct ParseError {
    /// Zero-based index of the column in the source header.
    pub column: usize,
    /// Raw header label.
    pub label: String,
    /// Why the label was rejected.
    pub reason: String,
}

// =============================================================================
// Validation Errors
// =============================================================================

/// Errors for unrecoverable input or configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// Entity name is empty once whitespace is stripped.
    #[error("Empty entity name on line {line}")]
    EmptyEntity { line: usize },

    /// Options file does not match the embedded schema.
    #[error("Invalid pipeline options: {}", errors.join("; "))]
    InvalidOptions { errors: Vec<String> },

    /// Start of the date range is after its end.
    #[error("Invalid date range: start {start} is after end {end}")]
    InvalidDateRange {
        start: chrono::NaiveDate,
        end: chrono::NaiveDate,
    },
}

// =============================================================================
// Fetch Errors
// =============================================================================

/// Errors while downloading a source CSV.
#[derive(Debug, Error)]
pub enum FetchError {
    /// HTTP request failed before a response arrived.
    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    /// Server answered with a non-success status.
    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    /// Body could not be read.
    #[error("Failed to read response body: {0}")]
    Body(String),
}

// =============================================================================
// Pipeline Errors (top-level)
// =============================================================================

/// Top-level pipeline orchestration errors.
///
/// This is the main error type returned by [`crate::transform::pipeline::analyze_csv`].
#[derive(Debug, Error)]
pub enum PipelineError {
    /// CSV parsing error.
    #[error("CSV error: {0}")]
    Csv(#[from] CsvError),

    /// Validation error.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Download error.
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV export error.
    #[error("Export error: {0}")]
    Export(#[from] csv::Error),

    /// No data rows in the source table.
    #[error("No records to transform")]
    EmptyInput,
}

// =============================================================================
// Server Errors
// =============================================================================

/// HTTP server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Pipeline error.
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// Invalid request.
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Server internal error.
    #[error("Internal server error: {0}")]
    Internal(String),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for CSV operations.
pub type CsvResult<T> = Result<T, CsvError>;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Result type for fetch operations.
pub type FetchResult<T> = Result<T, FetchError>;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;
