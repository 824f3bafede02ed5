//! Wide-format CSV parser with encoding and delimiter auto-detection.
//!
//! Reads a table with one identifier column, a few metadata columns and one
//! column per date, e.g. the JHU CSSE layout:
//!
//! ```text
//! Province/State,Country/Region,Lat,Long,1/22/20,1/23/20,...
//! ,Afghanistan,33.93911,67.709953,0,0,...
//! ,"Korea, South",35.907757,127.766922,1,1,...
//! ```
//!
//! Header labels are not interpreted as dates here; see
//! [`crate::transform::reshape::parse_dates`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

pub use crate::error::CsvError;
use crate::error::CsvResult;
use crate::models::{ColumnLabel, WideRow, WideTable};

/// Default identifier column of the JHU CSSE time series.
pub const DEFAULT_ENTITY_COLUMN: &str = "Country/Region";

/// Default metadata columns of the JHU CSSE time series.
pub const DEFAULT_METADATA_COLUMNS: [&str; 4] = ["Province/State", "Country/Region", "Lat", "Long"];

/// Which columns identify the entity and which carry no dates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableLayout {
    /// Identifier column.
    #[serde(default = "default_entity_column")]
    pub entity_column: String,
    /// Columns that are never treated as dates.
    #[serde(default = "default_metadata_columns")]
    pub metadata_columns: Vec<String>,
}

fn default_entity_column() -> String {
    DEFAULT_ENTITY_COLUMN.to_string()
}

fn default_metadata_columns() -> Vec<String> {
    DEFAULT_METADATA_COLUMNS.iter().map(|s| s.to_string()).collect()
}

impl Default for TableLayout {
    fn default() -> Self {
        Self {
            entity_column: default_entity_column(),
            metadata_columns: default_metadata_columns(),
        }
    }
}

impl TableLayout {
    fn is_metadata(&self, header: &str) -> bool {
        header == self.entity_column || self.metadata_columns.iter().any(|m| m == header)
    }
}

/// Result of parsing with metadata
#[derive(Debug, Clone)]
pub struct ParseResult {
    /// Parsed table
    pub table: WideTable,
    /// Detected or used encoding
    pub encoding: String,
    /// Detected or used delimiter
    pub delimiter: char,
}

/// Detect the encoding of raw bytes using chardet
pub fn detect_encoding(bytes: &[u8]) -> String {
    let result = chardet::detect(bytes);
    let charset = result.0;

    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" | "" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        _ => charset,
    }
}

/// Decode bytes to string using the specified encoding.
///
/// Unknown encodings fall back to lossy UTF-8.
pub fn decode_content(bytes: &[u8], encoding: &str) -> String {
    match encoding.to_lowercase().as_str() {
        "iso-8859-1" | "latin-1" | "latin1" => encoding_rs::ISO_8859_15.decode(bytes).0.into_owned(),
        "windows-1252" | "cp1252" => encoding_rs::WINDOWS_1252.decode(bytes).0.into_owned(),
        _ => String::from_utf8_lossy(bytes).into_owned(),
    }
}

/// Detect the delimiter by counting occurrences in the first line.
///
/// Quoted sections are skipped so that `"Korea, South"` does not count.
pub fn detect_delimiter(content: &str) -> char {
    let first_line = content.lines().next().unwrap_or("");

    let separators = [',', ';', '\t', '|'];
    let mut best_sep = ',';
    let mut best_count = 0;

    for &sep in &separators {
        let mut in_quotes = false;
        let count = first_line
            .chars()
            .filter(|&c| {
                if c == '"' {
                    in_quotes = !in_quotes;
                }
                !in_quotes && c == sep
            })
            .count();
        if count > best_count {
            best_count = count;
            best_sep = sep;
        }
    }

    best_sep
}

/// Parse a cumulative count cell.
///
/// Blank cells count as zero. `12.0` is accepted, `12.5` and `-1` are not.
fn parse_count(raw: &str) -> Option<u64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Some(0);
    }
    if let Ok(n) = trimmed.parse::<u64>() {
        return Some(n);
    }
    match trimmed.parse::<f64>() {
        Ok(f) if f.is_finite() && f >= 0.0 && f.fract() == 0.0 && f <= u64::MAX as f64 => {
            Some(f as u64)
        }
        _ => None,
    }
}

fn record_line(record: &csv::StringRecord, fallback: usize) -> usize {
    record
        .position()
        .map(|p| p.line() as usize)
        .unwrap_or(fallback)
}

/// Parse CSV text into a [`WideTable`] with an explicit delimiter.
///
/// A cell that is not a count reads as 0 and is kept in
/// [`WideTable::invalid_cells`]. Whether it is an error depends on whether its
/// column parses as a date, see [`crate::transform::reshape::check_counts`].
///
/// # Example
/// ```ignore
/// use covidash::parser::{parse_wide_table, TableLayout};
///
/// let csv = "Country/Region,1/22/20\nFrance,3";
/// let table = parse_wide_table(csv, ',', &TableLayout::default()).unwrap();
///
/// assert_eq!(table.rows[0].entity, "France");
/// assert_eq!(table.rows[0].values, vec![3]);
/// ```
pub fn parse_wide_table(content: &str, delimiter: char, layout: &TableLayout) -> CsvResult<WideTable> {
    if !delimiter.is_ascii() {
        return Err(CsvError::new(0, format!("Delimiter '{}' is not ASCII", delimiter)));
    }

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter as u8)
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut records = reader.records();

    let header = records
        .next()
        .ok_or_else(|| CsvError::new(1, "Empty CSV file"))?
        .map_err(|e| CsvError::new(1, format!("Cannot read header: {}", e)))?;

    let headers: Vec<String> = header
        .iter()
        .enumerate()
        .map(|(i, h)| {
            let h = if i == 0 { h.trim_start_matches('\u{feff}') } else { h };
            h.trim().to_string()
        })
        .collect();

    if headers.iter().all(|h| h.is_empty()) {
        return Err(CsvError::new(1, "No headers found"));
    }

    let entity_idx = headers
        .iter()
        .position(|h| *h == layout.entity_column)
        .or_else(|| {
            headers
                .iter()
                .position(|h| h.eq_ignore_ascii_case(&layout.entity_column))
        })
        .ok_or_else(|| {
            CsvError::new(1, "Missing entity column").with_column(layout.entity_column.clone())
        })?;

    let columns: Vec<ColumnLabel> = headers
        .iter()
        .enumerate()
        .filter(|(i, h)| *i != entity_idx && !layout.is_metadata(h))
        .map(|(index, label)| ColumnLabel { index, label: label.clone() })
        .collect();

    let mut rows = Vec::new();
    let mut invalid_cells: BTreeMap<usize, CsvError> = BTreeMap::new();

    for (row_idx, record_result) in records.enumerate() {
        let fallback_line = row_idx + 2;
        let record = record_result
            .map_err(|e| CsvError::new(fallback_line, format!("Cannot read line: {}", e)))?;
        let line = record_line(&record, fallback_line);

        if record.iter().all(|field| field.trim().is_empty()) {
            continue;
        }

        let entity = record.get(entity_idx).unwrap_or("").to_string();

        let mut values = Vec::with_capacity(columns.len());
        for column in &columns {
            let raw = record.get(column.index).unwrap_or("");
            let value = parse_count(raw).unwrap_or_else(|| {
                invalid_cells.entry(column.index).or_insert_with(|| {
                    CsvError::new(line, "Expected a non-negative integer count")
                        .with_column(column.label.clone())
                        .with_value(raw)
                });
                0
            });
            values.push(value);
        }

        rows.push(WideRow { line, entity, values });
    }

    Ok(WideTable {
        headers,
        entity_column: layout.entity_column.clone(),
        columns,
        rows,
        invalid_cells,
    })
}

/// Parse CSV bytes with auto-detection of encoding and delimiter.
pub fn parse_wide_bytes_auto(bytes: &[u8], layout: &TableLayout) -> CsvResult<ParseResult> {
    parse_wide_bytes(bytes, None, layout)
}

/// Parse CSV bytes, auto-detecting the delimiter unless one is given.
pub fn parse_wide_bytes(bytes: &[u8], delimiter: Option<char>, layout: &TableLayout) -> CsvResult<ParseResult> {
    let encoding = detect_encoding(bytes);
    let content = decode_content(bytes, &encoding);
    let delimiter = delimiter.unwrap_or_else(|| detect_delimiter(&content));
    let table = parse_wide_table(&content, delimiter, layout)?;

    Ok(ParseResult {
        table,
        encoding,
        delimiter,
    })
}

/// Parse a CSV file with auto-detection of encoding and delimiter.
///
/// # Example
/// ```ignore
/// let result = parse_wide_file_auto("confirmed_global.csv", &TableLayout::default())?;
/// println!("Encoding: {}, Delimiter: '{}'", result.encoding, result.delimiter);
/// println!("Rows: {}", result.table.len());
/// ```
pub fn parse_wide_file_auto<P: AsRef<Path>>(path: P, layout: &TableLayout) -> CsvResult<ParseResult> {
    let bytes = std::fs::read(path.as_ref()).map_err(|e| {
        CsvError::new(0, format!("Cannot read file '{}': {}", path.as_ref().display(), e))
    })?;

    parse_wide_bytes_auto(&bytes, layout)
}
