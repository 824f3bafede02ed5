//! Domain models for the covidash pipeline.
//!
//! This module contains the core data structures used throughout the pipeline:
//!
//! - [`WideTable`] / [`WideRow`] - Source table, one column per date
//! - [`DateColumn`] - A header label that parsed into a calendar date
//! - [`LongRecord`] - One (entity, date, value) observation
//! - [`GrowthRecord`] - Period-over-period change for one observation
//! - [`TimeSeriesPoint`] - Daily totals, new cases and moving average
//! - [`SummaryRow`], [`WeeklyGrowth`], [`GrowthStats`], [`DatasetOverview`]
//!
//! Every record is a plain value: the pipeline builds fresh ones on each run
//! and never mutates them afterwards.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

use crate::error::CsvError;

// =============================================================================
// Wide Table
// =============================================================================

/// A date-candidate column of the wide table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnLabel {
    /// Zero-based index in the source header.
    pub index: usize,
    /// Raw header text.
    pub label: String,
}

/// One source row: an entity and one value per date-candidate column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WideRow {
    /// 1-based line number in the source (header is line 1).
    pub line: usize,
    /// Entity name as read; may carry whitespace until normalized.
    pub entity: String,
    /// Cumulative counts, aligned with [`WideTable::columns`].
    pub values: Vec<u64>,
}

/// Wide-format table: one row per entity, one column per time period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WideTable {
    /// All header labels, in source order.
    pub headers: Vec<String>,
    /// Name of the identifier column.
    pub entity_column: String,
    /// Columns that are not metadata, in source order.
    pub columns: Vec<ColumnLabel>,
    /// Data rows, in source order.
    pub rows: Vec<WideRow>,
    /// First cell that is not a count, per header index. Such cells read as 0
    /// and only matter if their column turns out to be a date.
    #[serde(skip)]
    pub invalid_cells: BTreeMap<usize, CsvError>,
}

impl WideTable {
    /// Build a table whose header is the entity column followed by `labels`.
    ///
    /// Rows are numbered from line 2, like a file with a header line.
    pub fn new<S: Into<String>>(
        entity_column: impl Into<String>,
        labels: impl IntoIterator<Item = S>,
        rows: impl IntoIterator<Item = (String, Vec<u64>)>,
    ) -> Self {
        let entity_column = entity_column.into();
        let columns: Vec<ColumnLabel> = labels
            .into_iter()
            .enumerate()
            .map(|(i, label)| ColumnLabel { index: i + 1, label: label.into() })
            .collect();

        let mut headers = vec![entity_column.clone()];
        headers.extend(columns.iter().map(|c| c.label.clone()));

        let rows = rows
            .into_iter()
            .enumerate()
            .map(|(i, (entity, values))| WideRow { line: i + 2, entity, values })
            .collect();

        Self {
            headers,
            entity_column,
            columns,
            rows,
            invalid_cells: BTreeMap::new(),
        }
    }

    /// Number of data rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of distinct entity names, compared after trimming.
    pub fn entity_count(&self) -> usize {
        self.rows
            .iter()
            .map(|r| r.entity.trim())
            .collect::<HashSet<_>>()
            .len()
    }
}

/// A date-candidate column whose label parsed successfully.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateColumn {
    /// Position in [`WideRow::values`].
    pub position: usize,
    /// Zero-based index in the source header.
    pub index: usize,
    /// Raw header text.
    pub label: String,
    /// Parsed calendar date.
    pub date: NaiveDate,
}

// =============================================================================
// Long Format
// =============================================================================

/// One (entity, date) observation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LongRecord {
    pub entity: String,
    pub date: NaiveDate,
    pub value: u64,
}

/// Period-over-period change for one observation.
///
/// Both changes are `None` on an entity's first date. `percent_change` is
/// also `None` when the prior value is zero. It is a fraction: 0.5 means +50%.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrowthRecord {
    pub entity: String,
    pub date: NaiveDate,
    pub value: u64,
    pub absolute_change: Option<i64>,
    pub percent_change: Option<f64>,
}

// =============================================================================
// Analysis Views
// =============================================================================

/// Daily figures for one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSeriesPoint {
    pub entity: String,
    pub date: NaiveDate,
    /// Cumulative confirmed cases.
    pub total_cases: u64,
    /// Difference from the previous day; negative on data corrections.
    pub new_cases: i64,
    /// Mean of `new_cases` over the trailing window.
    pub moving_average: f64,
}

/// Latest figures for one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryRow {
    pub entity: String,
    pub total_cases: u64,
    pub new_cases: i64,
    pub weekly_new_cases: i64,
    pub monthly_new_cases: i64,
    /// Weekly new cases as a percentage of the total, 2 decimals.
    pub weekly_growth_rate: f64,
}

/// Week-level totals for one entity. Weeks start on Monday.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyGrowth {
    pub entity: String,
    pub week_start: NaiveDate,
    /// Last cumulative total seen in the week.
    pub total_cases: u64,
    /// Sum of daily new cases in the week.
    pub new_cases: i64,
    /// Percent change of `total_cases` from the previous week.
    pub weekly_growth: Option<f64>,
}

/// Average, peak and most recent daily growth, in percent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrowthStats {
    pub entity: String,
    pub average: Option<f64>,
    pub peak: Option<f64>,
    pub recent: Option<f64>,
}

/// Headline numbers about the source table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetOverview {
    pub entity_count: usize,
    pub row_count: usize,
    pub days_of_data: usize,
    pub earliest_date: Option<NaiveDate>,
    pub latest_date: Option<NaiveDate>,
}

// =============================================================================
// Tests
// =============================================================================
