//! High-level pipeline API for COVID-19 time series analysis.
//!
//! This module combines all steps: parsing, entity normalization, date
//! parsing, wide-to-long reshaping, aggregation, growth metrics, daily time
//! series, date-range filtering and summaries.
//!
//! # Example
//!
//! ```rust,ignore
//! use covidash::transform::pipeline::{analyze_csv, PipelineOptions};
//! use std::path::Path;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let result = analyze_csv(
//!         Path::new("time_series_covid19_confirmed_global.csv"),
//!         &PipelineOptions::default(),
//!     )?;
//!
//!     println!("{} entities, {} warnings", result.summary.len(), result.warnings.len());
//!     Ok(())
//! }
//! ```

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

use super::growth::{compute_growth, growth_stats, weekly_growth, MAX_PERCENT_PRECISION};
use super::reshape::{
    aggregate_by_entity, check_counts, normalize_entities, parse_dates, select_entities, to_long,
    DateParseOutcome, DEFAULT_DATE_FORMATS,
};
use super::series::{build_time_series, filter_date_range, overview, summarize};
use crate::api::logs::{log_info, log_success, log_warning};
use crate::error::{ParseError, PipelineError, PipelineResult, ValidationError, ValidationResult};
use crate::fetch::fetch_csv;
use crate::models::{
    DatasetOverview, GrowthRecord, GrowthStats, LongRecord, SummaryRow, TimeSeriesPoint,
    WeeklyGrowth, WideTable,
};
use crate::parser::{parse_wide_bytes_auto, parse_wide_file_auto, ParseResult, TableLayout};
use crate::validation::validate_pipeline_options;

/// Default trailing window of the new-cases moving average.
pub const DEFAULT_MOVING_AVERAGE_WINDOW: usize = 7;

/// Options for the analysis pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PipelineOptions {
    /// Identifier and metadata columns
    #[serde(flatten)]
    pub layout: TableLayout,

    /// chrono formats tried in order on each date-column label
    pub date_formats: Vec<String>,

    /// Decimal places of `percent_change`; `None` keeps full precision
    pub percent_precision: Option<u32>,

    /// Window of the new-cases moving average
    pub moving_average_window: usize,

    /// Entities to keep; empty keeps all
    pub entities: Vec<String>,

    /// Inclusive lower bound of the reported dates
    pub start_date: Option<NaiveDate>,

    /// Inclusive upper bound of the reported dates
    pub end_date: Option<NaiveDate>,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            layout: TableLayout::default(),
            date_formats: DEFAULT_DATE_FORMATS.iter().map(|f| f.to_string()).collect(),
            percent_precision: None,
            moving_average_window: DEFAULT_MOVING_AVERAGE_WINDOW,
            entities: Vec::new(),
            start_date: None,
            end_date: None,
        }
    }
}

impl PipelineOptions {
    /// Build options from JSON, checking it against the embedded schema first.
    pub fn from_json_value(value: Value) -> PipelineResult<Self> {
        validate_pipeline_options(&value)?;
        let options: Self = serde_json::from_value(value)?;
        options.validate()?;
        Ok(options)
    }

    /// Parse and validate options from a JSON string.
    pub fn from_json_str(json: &str) -> PipelineResult<Self> {
        Self::from_json_value(serde_json::from_str(json)?)
    }

    /// Load and validate options from a JSON file.
    pub fn from_file(path: &Path) -> PipelineResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// Check constraints the schema cannot express.
    pub fn validate(&self) -> ValidationResult<()> {
        if let Some(places) = self.percent_precision {
            if places > MAX_PERCENT_PRECISION {
                return Err(ValidationError::InvalidOptions {
                    errors: vec![format!(
                        "percentPrecision {} is above the maximum of {}",
                        places, MAX_PERCENT_PRECISION
                    )],
                });
            }
        }
        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            if start > end {
                return Err(ValidationError::InvalidDateRange { start, end });
            }
        }
        Ok(())
    }
}

/// CSV file information
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CsvInfo {
    pub encoding: String,
    pub delimiter: char,
    pub headers: Vec<String>,
    pub row_count: usize,
}

impl From<&ParseResult> for CsvInfo {
    fn from(parsed: &ParseResult) -> Self {
        Self {
            encoding: parsed.encoding.clone(),
            delimiter: parsed.delimiter,
            headers: parsed.table.headers.clone(),
            row_count: parsed.table.len(),
        }
    }
}

/// Long-format data before any analysis
#[derive(Debug, Clone)]
pub struct Reshaped {
    /// Table with trimmed entity names, restricted to the selected entities
    pub table: WideTable,

    /// Parsed date columns and per-column warnings
    pub dates: DateParseOutcome,

    /// One record per (row, valid date column)
    pub records: Vec<LongRecord>,
}

/// Result of a complete analysis
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    /// Source table facts, before entity selection
    pub overview: DatasetOverview,

    /// Number of long records produced by the reshape
    pub long_count: usize,

    /// Daily totals, new cases and moving average
    pub time_series: Vec<TimeSeriesPoint>,

    /// Period-over-period change
    pub growth: Vec<GrowthRecord>,

    /// Latest figures per entity
    pub summary: Vec<SummaryRow>,

    /// Week-level totals and growth
    pub weekly: Vec<WeeklyGrowth>,

    /// Average, peak and recent daily growth
    pub growth_stats: Vec<GrowthStats>,

    /// Date columns that were dropped
    pub warnings: Vec<ParseError>,

    /// CSV parsing metadata, when the input came from CSV
    #[serde(skip_serializing_if = "Option::is_none")]
    pub csv_info: Option<CsvInfo>,
}

/// Normalize entities, select, parse dates and reshape to long format.
///
/// Malformed date columns are dropped and reported in
/// [`DateParseOutcome::warnings`]; an empty entity name is fatal.
pub fn reshape(table: &WideTable, options: &PipelineOptions) -> PipelineResult<Reshaped> {
    let normalized = normalize_entities(table)?;
    let selected = select_entities(&normalized, &options.entities);

    let dates = parse_dates(&selected.columns, &options.date_formats);
    check_counts(&selected, &dates.columns)?;
    for warning in &dates.warnings {
        log_warning(format!("Dropped column: {}", warning));
    }

    let records: Vec<LongRecord> = to_long(&selected, &dates.columns).collect();

    Ok(Reshaped {
        table: selected,
        dates,
        records,
    })
}

/// Analyze an in-memory wide table.
pub fn analyze_table(table: &WideTable, options: &PipelineOptions) -> PipelineResult<AnalysisResult> {
    options.validate()?;

    if table.is_empty() {
        return Err(PipelineError::EmptyInput);
    }

    let source_dates = parse_dates(&table.columns, &options.date_formats);
    let overview = overview(table, &source_dates.columns);
    log_info(format!(
        "📋 {} rows, {} entities, {} days of data",
        overview.row_count, overview.entity_count, overview.days_of_data
    ));

    let reshaped = reshape(table, options)?;
    if !options.entities.is_empty() {
        log_info(format!(
            "Selected {} of {} rows for {} entities",
            reshaped.table.len(),
            table.len(),
            options.entities.len()
        ));
    }
    let long_count = reshaped.records.len();
    log_success(format!("Reshaped to {} long records", long_count));

    let aggregated = aggregate_by_entity(reshaped.records);

    let growth = compute_growth(&aggregated, options.percent_precision);
    let time_series = build_time_series(&aggregated, options.moving_average_window);

    let growth = filter_date_range(&growth, options.start_date, options.end_date);
    let time_series = filter_date_range(&time_series, options.start_date, options.end_date);

    let summary = summarize(&time_series);
    let weekly = weekly_growth(&time_series);
    let growth_stats = growth_stats(&growth);

    log_success(format!(
        "{} time series points, {} summary rows, {} weeks",
        time_series.len(),
        summary.len(),
        weekly.len()
    ));
    if !reshaped.dates.warnings.is_empty() {
        log_warning(format!("{} date columns dropped", reshaped.dates.warnings.len()));
    }

    Ok(AnalysisResult {
        overview,
        long_count,
        time_series,
        growth,
        summary,
        weekly,
        growth_stats,
        warnings: reshaped.dates.warnings,
        csv_info: None,
    })
}

/// Analyze a CSV file.
///
/// This is the main entry point for the pipeline. It:
/// 1. Parses the CSV with auto-detection
/// 2. Trims entity names and keeps the selected entities
/// 3. Parses date columns, dropping malformed ones with a warning
/// 4. Reshapes to long format and sums rows per entity
/// 5. Computes growth, daily series, summary and weekly figures
pub fn analyze_csv(path: &Path, options: &PipelineOptions) -> PipelineResult<AnalysisResult> {
    log_info(format!("📖 Reading {}", path.display()));
    let parsed = parse_wide_file_auto(path, &options.layout)?;
    analyze_parsed(parsed, options)
}

/// Analyze CSV bytes.
///
/// Same as `analyze_csv` but accepts raw bytes instead of a file path.
pub fn analyze_bytes(bytes: &[u8], options: &PipelineOptions) -> PipelineResult<AnalysisResult> {
    let parsed = parse_wide_bytes_auto(bytes, &options.layout)?;
    analyze_parsed(parsed, options)
}

/// Download a CSV and analyze it.
pub async fn analyze_url(url: &str, options: &PipelineOptions) -> PipelineResult<AnalysisResult> {
    let bytes = fetch_csv(url).await?;
    analyze_bytes(&bytes, options)
}

/// Analyze an already parsed CSV, keeping its metadata in `csv_info`.
pub fn analyze_parsed(parsed: ParseResult, options: &PipelineOptions) -> PipelineResult<AnalysisResult> {
    log_success(format!("Detected encoding: {}", parsed.encoding));
    log_success(format!("Detected separator: '{}'", format_delimiter(parsed.delimiter)));
    log_success(format!("Read {} rows", parsed.table.len()));

    let csv_info = CsvInfo::from(&parsed);
    let mut result = analyze_table(&parsed.table, options)?;
    result.csv_info = Some(csv_info);
    Ok(result)
}

/// Format delimiter for display
pub fn format_delimiter(d: char) -> String {
    match d {
        '\t' => "TAB".to_string(),
        c => c.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::{analysis_to_csv_string, ExportKind};
    use serde_json::json;

    const SAMPLE: &str = "Province/State,Country/Region,Lat,Long,3/1/20,3/2/20,bogus,3/3/20\n\
        ,  France  ,46.2,2.2,100,150,7,150\n\
        Ontario,Canada,51.2,-85.3,0,10,7,20\n\
        Quebec,Canada,52.9,-73.5,0,0,7,5\n";

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_default_options() {
        let opts = PipelineOptions::default();
        assert_eq!(opts.moving_average_window, 7);
        assert_eq!(opts.layout.entity_column, "Country/Region");
        assert_eq!(opts.date_formats[0], "%m/%d/%y");
        assert!(opts.percent_precision.is_none());
    }

    #[test]
    fn test_options_from_json() {
        let opts = PipelineOptions::from_json_value(json!({
            "entityColumn": "state",
            "entities": ["Texas"],
            "startDate": "2020-03-01"
        }))
        .unwrap();

        assert_eq!(opts.layout.entity_column, "state");
        assert_eq!(opts.layout.metadata_columns.len(), 4);
        assert_eq!(opts.entities, vec!["Texas"]);
        assert_eq!(opts.start_date, Some(date(2020, 3, 1)));
        assert_eq!(opts.moving_average_window, 7);
    }

    #[test]
    fn test_options_inverted_range() {
        let err = PipelineOptions::from_json_value(json!({
            "startDate": "2020-04-01",
            "endDate": "2020-03-01"
        }))
        .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Validation(ValidationError::InvalidDateRange { .. })
        ));
    }

    #[test]
    fn test_options_schema_violation() {
        let err = PipelineOptions::from_json_str(r#"{ "movingAverageWindow": 0 }"#).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Validation(ValidationError::InvalidOptions { .. })
        ));
    }

    #[test]
    fn test_options_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("options.json");
        std::fs::write(&path, r#"{ "percentPrecision": 3 }"#).unwrap();

        let opts = PipelineOptions::from_file(&path).unwrap();
        assert_eq!(opts.percent_precision, Some(3));
    }

    #[test]
    fn test_reshape_drops_bad_column_and_trims() {
        let parsed = parse_wide_bytes_auto(SAMPLE.as_bytes(), &TableLayout::default()).unwrap();
        let reshaped = reshape(&parsed.table, &PipelineOptions::default()).unwrap();

        assert_eq!(reshaped.dates.warnings.len(), 1);
        assert_eq!(reshaped.dates.warnings[0].label, "bogus");
        // 3 rows x 3 valid date columns
        assert_eq!(reshaped.records.len(), 9);
        assert_eq!(reshaped.records[0].entity, "France");
    }

    #[test]
    fn test_analyze_bytes() {
        let result = analyze_bytes(SAMPLE.as_bytes(), &PipelineOptions::default()).unwrap();

        assert_eq!(result.long_count, 9);
        assert_eq!(result.overview.entity_count, 2);
        assert_eq!(result.overview.days_of_data, 3);
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(result.csv_info.as_ref().unwrap().row_count, 3);

        // France first (input order), Canada provinces summed
        let france: Vec<_> = result.growth.iter().filter(|g| g.entity == "France").collect();
        assert_eq!(
            france.iter().map(|g| g.percent_change).collect::<Vec<_>>(),
            vec![None, Some(0.5), Some(0.0)]
        );
        let canada: Vec<_> = result.growth.iter().filter(|g| g.entity == "Canada").collect();
        assert_eq!(canada.iter().map(|g| g.value).collect::<Vec<_>>(), vec![0, 10, 25]);
        assert_eq!(canada[1].percent_change, None);
        assert_eq!(canada[2].percent_change, Some(1.5));

        assert_eq!(result.summary.len(), 2);
        assert_eq!(result.summary[0].entity, "Canada");
        assert_eq!(result.summary[0].total_cases, 25);
    }

    #[test]
    fn test_analyze_selection_and_range() {
        let options = PipelineOptions {
            entities: vec!["France".into()],
            start_date: Some(date(2020, 3, 2)),
            ..PipelineOptions::default()
        };
        let result = analyze_bytes(SAMPLE.as_bytes(), &options).unwrap();

        assert_eq!(result.long_count, 3);
        assert_eq!(result.time_series.len(), 2);
        assert_eq!(result.time_series[0].new_cases, 50);
        assert_eq!(result.growth[0].absolute_change, Some(50));
        assert!(result.time_series.iter().all(|p| p.entity == "France"));
    }

    #[test]
    fn test_analyze_is_idempotent() {
        let options = PipelineOptions::default();
        let first = analyze_bytes(SAMPLE.as_bytes(), &options).unwrap();
        let second = analyze_bytes(SAMPLE.as_bytes(), &options).unwrap();

        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );

        for kind in [
            ExportKind::TimeSeries,
            ExportKind::Summary,
            ExportKind::Growth,
            ExportKind::Weekly,
        ] {
            assert_eq!(
                analysis_to_csv_string(&first, kind).unwrap(),
                analysis_to_csv_string(&second, kind).unwrap()
            );
        }
    }

    #[test]
    fn test_text_column_dropped_with_warning() {
        let csv = "Country/Region,3/1/20,Notes,3/2/20\nFrance,100,see source,150\n";
        let result = analyze_bytes(csv.as_bytes(), &PipelineOptions::default()).unwrap();

        assert_eq!(result.long_count, 2);
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(result.warnings[0].label, "Notes");
        assert_eq!(result.growth[1].absolute_change, Some(50));
    }

    #[test]
    fn test_text_in_date_column_is_fatal() {
        let csv = "Country/Region,3/1/20,3/2/20\nFrance,100,lots\n";
        let err = analyze_bytes(csv.as_bytes(), &PipelineOptions::default()).unwrap_err();

        match err {
            PipelineError::Csv(e) => {
                assert_eq!(e.line, 2);
                assert_eq!(e.column.as_deref(), Some("3/2/20"));
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_huge_counts_do_not_overflow() {
        let csv = "Country/Region,3/1/20,3/2/20,3/3/20\nX,0,9223372036854775808,18446744073709551615\n";
        let result = analyze_bytes(csv.as_bytes(), &PipelineOptions::default()).unwrap();

        assert_eq!(result.time_series.len(), 3);
        assert!(result.time_series.iter().all(|p| p.moving_average.is_finite()));
        assert_eq!(result.summary[0].weekly_new_cases, i64::MAX);
        assert_eq!(result.weekly.iter().map(|w| w.new_cases).max(), Some(i64::MAX));
    }

    #[test]
    fn test_precision_above_limit_rejected() {
        let options = PipelineOptions {
            percent_precision: Some(400),
            ..PipelineOptions::default()
        };
        let err = analyze_bytes(SAMPLE.as_bytes(), &options).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Validation(ValidationError::InvalidOptions { .. })
        ));

        let options = PipelineOptions {
            percent_precision: Some(MAX_PERCENT_PRECISION),
            ..PipelineOptions::default()
        };
        let result = analyze_bytes(SAMPLE.as_bytes(), &options).unwrap();
        assert!(result
            .growth
            .iter()
            .filter_map(|g| g.percent_change)
            .all(f64::is_finite));
    }

    #[test]
    fn test_analyze_empty_table() {
        let table = WideTable::new("Country/Region", ["3/1/20"], Vec::new());
        let err = analyze_table(&table, &PipelineOptions::default()).unwrap_err();
        assert!(matches!(err, PipelineError::EmptyInput));
    }

    #[test]
    fn test_analyze_blank_entity_is_fatal() {
        let csv = "Country/Region,3/1/20\nFrance,1\n   ,2\n";
        let err = analyze_bytes(csv.as_bytes(), &PipelineOptions::default()).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Validation(ValidationError::EmptyEntity { line: 3 })
        ));
    }

    #[test]
    fn test_analyze_csv_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("confirmed.csv");
        std::fs::write(&path, SAMPLE).unwrap();

        let result = analyze_csv(&path, &PipelineOptions::default()).unwrap();
        assert_eq!(result.summary.len(), 2);
    }
}
