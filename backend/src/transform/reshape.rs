//! Wide to long reshaping.
//!
//! ```text
//! Wide (one column per date)            Long (one row per observation)
//! ┌─────────┬─────────┬─────────┐       ┌─────────┬────────────┬───────┐
//! │ Country │ 1/22/20 │ 1/23/20 │       │ France  │ 2020-01-22 │     0 │
//! │ France  │       0 │       3 │  →    │ France  │ 2020-01-23 │     3 │
//! │ Italy   │       1 │       2 │       │ Italy   │ 2020-01-22 │     1 │
//! └─────────┴─────────┴─────────┘       │ Italy   │ 2020-01-23 │     2 │
//!                                       └─────────┴────────────┴───────┘
//! ```

use chrono::NaiveDate;
use std::collections::{HashMap, HashSet};

use crate::error::{CsvResult, ParseError, ValidationResult};
use crate::models::{ColumnLabel, DateColumn, LongRecord, WideRow, WideTable};
use crate::validation::validate_entity_name;

/// Date formats tried, in order, when none are configured.
///
/// `%y` comes before `%Y` so that `1/22/20` is read as 2020, not year 20.
pub const DEFAULT_DATE_FORMATS: [&str; 4] = ["%m/%d/%y", "%m/%d/%Y", "%Y-%m-%d", "%d.%m.%Y"];

/// Trim whitespace from every entity name.
///
/// Fails on the first name that is empty once trimmed.
pub fn normalize_entities(table: &WideTable) -> ValidationResult<WideTable> {
    let rows = table
        .rows
        .iter()
        .map(|row| {
            Ok(WideRow {
                line: row.line,
                entity: validate_entity_name(&row.entity, row.line)?,
                values: row.values.clone(),
            })
        })
        .collect::<ValidationResult<Vec<_>>>()?;

    Ok(WideTable {
        headers: table.headers.clone(),
        entity_column: table.entity_column.clone(),
        columns: table.columns.clone(),
        rows,
        invalid_cells: table.invalid_cells.clone(),
    })
}

/// Keep only rows whose trimmed entity name is in `names`.
///
/// An empty `names` keeps every row.
pub fn select_entities(table: &WideTable, names: &[String]) -> WideTable {
    if names.is_empty() {
        return table.clone();
    }

    let wanted: HashSet<&str> = names.iter().map(|n| n.trim()).collect();

    WideTable {
        headers: table.headers.clone(),
        entity_column: table.entity_column.clone(),
        columns: table.columns.clone(),
        rows: table
            .rows
            .iter()
            .filter(|r| wanted.contains(r.entity.trim()))
            .cloned()
            .collect(),
        invalid_cells: table.invalid_cells.clone(),
    }
}

/// Parse a single label with the first format that matches.
pub fn parse_date_label<S: AsRef<str>>(label: &str, formats: &[S]) -> Option<NaiveDate> {
    let label = label.trim();
    formats
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(label, fmt.as_ref()).ok())
}

/// Date columns that parsed, plus one warning per column that did not.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DateParseOutcome {
    pub columns: Vec<DateColumn>,
    pub warnings: Vec<ParseError>,
}

/// Convert date-column labels to calendar dates.
///
/// A label that matches none of `formats` is dropped and reported in
/// [`DateParseOutcome::warnings`]; the remaining columns are unaffected.
pub fn parse_dates<S: AsRef<str>>(columns: &[ColumnLabel], formats: &[S]) -> DateParseOutcome {
    let mut outcome = DateParseOutcome::default();

    for (position, column) in columns.iter().enumerate() {
        match parse_date_label(&column.label, formats) {
            Some(date) => outcome.columns.push(DateColumn {
                position,
                index: column.index,
                label: column.label.clone(),
                date,
            }),
            None => outcome.warnings.push(ParseError {
                column: column.index,
                label: column.label.clone(),
                reason: if formats.is_empty() {
                    "no date formats configured".to_string()
                } else {
                    format!(
                        "matches none of {}",
                        formats.iter().map(|f| f.as_ref()).collect::<Vec<_>>().join(", ")
                    )
                },
            }),
        }
    }

    outcome
}

/// Fail on the first non-count cell that sits in a parsed date column.
///
/// Cells of dropped columns are never read, so text there is fine.
pub fn check_counts(table: &WideTable, dates: &[DateColumn]) -> CsvResult<()> {
    match dates.iter().find_map(|d| table.invalid_cells.get(&d.index)) {
        Some(err) => Err(err.clone()),
        None => Ok(()),
    }
}

/// Lazy iterator over the long form of a wide table.
///
/// Yields rows in input order and, within a row, dates in column order.
/// A clone resumes from the same position; call [`to_long`] again to start over.
#[derive(Debug, Clone)]
pub struct LongRecords<'a> {
    rows: &'a [WideRow],
    dates: &'a [DateColumn],
    row: usize,
    col: usize,
}

impl Iterator for LongRecords<'_> {
    type Item = LongRecord;

    fn next(&mut self) -> Option<LongRecord> {
        if self.dates.is_empty() {
            return None;
        }

        let row = self.rows.get(self.row)?;
        let column = &self.dates[self.col];

        let record = LongRecord {
            entity: row.entity.clone(),
            date: column.date,
            value: row.values.get(column.position).copied().unwrap_or(0),
        };

        self.col += 1;
        if self.col == self.dates.len() {
            self.col = 0;
            self.row += 1;
        }

        Some(record)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = if self.dates.is_empty() || self.row >= self.rows.len() {
            0
        } else {
            (self.rows.len() - self.row) * self.dates.len() - self.col
        };
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for LongRecords<'_> {}

/// Reshape a wide table into long records, one per (row, date column).
pub fn to_long<'a>(table: &'a WideTable, dates: &'a [DateColumn]) -> LongRecords<'a> {
    LongRecords {
        rows: &table.rows,
        dates,
        row: 0,
        col: 0,
    }
}

/// Sum records that share an entity and a date.
///
/// Entities keep their first-appearance order; dates within an entity too.
/// This is how province rows roll up into a single country series.
pub fn aggregate_by_entity<I>(records: I) -> Vec<LongRecord>
where
    I: IntoIterator<Item = LongRecord>,
{
    let mut entity_index: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<(Vec<LongRecord>, HashMap<NaiveDate, usize>)> = Vec::new();

    for record in records {
        let idx = match entity_index.get(&record.entity) {
            Some(&i) => i,
            None => {
                entity_index.insert(record.entity.clone(), groups.len());
                groups.push((Vec::new(), HashMap::new()));
                groups.len() - 1
            }
        };

        let (series, by_date) = &mut groups[idx];
        match by_date.get(&record.date) {
            Some(&pos) => {
                series[pos].value = series[pos].value.saturating_add(record.value);
            }
            None => {
                by_date.insert(record.date, series.len());
                series.push(record);
            }
        }
    }

    groups.into_iter().flat_map(|(series, _)| series).collect()
}
