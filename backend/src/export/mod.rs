//! CSV export of analysis tables.
//!
//! Dates are written as `YYYY-MM-DD`. Undefined figures (`None`) become empty
//! cells, never `NaN`.

use serde::{Deserialize, Serialize};
use std::io::Write;

use crate::models::{GrowthRecord, LongRecord, SummaryRow, TimeSeriesPoint, WeeklyGrowth};
use crate::transform::pipeline::AnalysisResult;

/// Default file name of the time series export.
pub const TIME_SERIES_FILE_NAME: &str = "covid_time_series_data.csv";

/// Default file name of the summary export.
pub const SUMMARY_FILE_NAME: &str = "covid_summary_statistics.csv";

/// Which table of an analysis to export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExportKind {
    TimeSeries,
    Summary,
    Growth,
    Weekly,
}

impl ExportKind {
    /// Parse the kebab-case name used in URLs and on the command line.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "time-series" | "timeseries" => Some(Self::TimeSeries),
            "summary" => Some(Self::Summary),
            "growth" => Some(Self::Growth),
            "weekly" => Some(Self::Weekly),
            _ => None,
        }
    }

    /// Suggested download file name.
    pub fn file_name(&self) -> &'static str {
        match self {
            Self::TimeSeries => TIME_SERIES_FILE_NAME,
            Self::Summary => SUMMARY_FILE_NAME,
            Self::Growth => "covid_growth_data.csv",
            Self::Weekly => "covid_weekly_growth.csv",
        }
    }
}

fn opt<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// Write long records as `Country/Region,Date,Value`.
pub fn write_long_csv<W: Write>(writer: W, records: &[LongRecord]) -> csv::Result<()> {
    let mut w = csv::Writer::from_writer(writer);
    w.write_record(["Country/Region", "Date", "Value"])?;
    for r in records {
        w.write_record([r.entity.clone(), r.date.to_string(), r.value.to_string()])?;
    }
    w.flush()?;
    Ok(())
}

/// Write the daily time series.
pub fn write_time_series_csv<W: Write>(writer: W, points: &[TimeSeriesPoint]) -> csv::Result<()> {
    let mut w = csv::Writer::from_writer(writer);
    w.write_record(["Country/Region", "Date", "Total_Cases", "New_Cases", "MA_7_Days"])?;
    for p in points {
        w.write_record([
            p.entity.clone(),
            p.date.to_string(),
            p.total_cases.to_string(),
            p.new_cases.to_string(),
            p.moving_average.to_string(),
        ])?;
    }
    w.flush()?;
    Ok(())
}

/// Write growth records; undefined changes are empty cells.
pub fn write_growth_csv<W: Write>(writer: W, growth: &[GrowthRecord]) -> csv::Result<()> {
    let mut w = csv::Writer::from_writer(writer);
    w.write_record(["Country/Region", "Date", "Value", "Absolute_Change", "Percent_Change"])?;
    for g in growth {
        w.write_record([
            g.entity.clone(),
            g.date.to_string(),
            g.value.to_string(),
            opt(g.absolute_change),
            opt(g.percent_change),
        ])?;
    }
    w.flush()?;
    Ok(())
}

/// Write the per-entity summary.
pub fn write_summary_csv<W: Write>(writer: W, rows: &[SummaryRow]) -> csv::Result<()> {
    let mut w = csv::Writer::from_writer(writer);
    w.write_record([
        "Country/Region",
        "Total_Cases",
        "New_Cases",
        "Weekly_New_Cases",
        "Monthly_New_Cases",
        "Weekly_Growth_Rate",
    ])?;
    for r in rows {
        w.write_record([
            r.entity.clone(),
            r.total_cases.to_string(),
            r.new_cases.to_string(),
            r.weekly_new_cases.to_string(),
            r.monthly_new_cases.to_string(),
            format!("{:.2}", r.weekly_growth_rate),
        ])?;
    }
    w.flush()?;
    Ok(())
}

/// Write week-level growth.
pub fn write_weekly_csv<W: Write>(writer: W, weeks: &[WeeklyGrowth]) -> csv::Result<()> {
    let mut w = csv::Writer::from_writer(writer);
    w.write_record(["Country/Region", "Week_Start", "Total_Cases", "New_Cases", "Weekly_Growth"])?;
    for wk in weeks {
        w.write_record([
            wk.entity.clone(),
            wk.week_start.to_string(),
            wk.total_cases.to_string(),
            wk.new_cases.to_string(),
            opt(wk.weekly_growth),
        ])?;
    }
    w.flush()?;
    Ok(())
}

/// Write one table of an analysis.
pub fn write_analysis_csv<W: Write>(writer: W, result: &AnalysisResult, kind: ExportKind) -> csv::Result<()> {
    match kind {
        ExportKind::TimeSeries => write_time_series_csv(writer, &result.time_series),
        ExportKind::Summary => write_summary_csv(writer, &result.summary),
        ExportKind::Growth => write_growth_csv(writer, &result.growth),
        ExportKind::Weekly => write_weekly_csv(writer, &result.weekly),
    }
}

/// Render one table of an analysis to a CSV string.
pub fn analysis_to_csv_string(result: &AnalysisResult, kind: ExportKind) -> csv::Result<String> {
    let mut buf = Vec::new();
    write_analysis_csv(&mut buf, result, kind)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn to_string<F>(f: F) -> String
    where
        F: FnOnce(&mut Vec<u8>) -> csv::Result<()>,
    {
        let mut buf = Vec::new();
        f(&mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_growth_csv_undefined_cells_empty() {
        let growth = vec![
            GrowthRecord {
                entity: "Korea, South".into(),
                date: date(2020, 1, 22),
                value: 0,
                absolute_change: None,
                percent_change: None,
            },
            GrowthRecord {
                entity: "Korea, South".into(),
                date: date(2020, 1, 23),
                value: 10,
                absolute_change: Some(10),
                percent_change: None,
            },
        ];

        let out = to_string(|buf| write_growth_csv(buf, &growth));
        let lines: Vec<&str> = out.lines().collect();

        assert_eq!(lines[0], "Country/Region,Date,Value,Absolute_Change,Percent_Change");
        assert_eq!(lines[1], "\"Korea, South\",2020-01-22,0,,");
        assert_eq!(lines[2], "\"Korea, South\",2020-01-23,10,10,");
    }

    #[test]
    fn test_summary_csv_rate_two_decimals() {
        let rows = vec![SummaryRow {
            entity: "France".into(),
            total_cases: 390,
            new_cases: 10,
            weekly_new_cases: 80,
            monthly_new_cases: 310,
            weekly_growth_rate: 20.5,
        }];

        let out = to_string(|buf| write_summary_csv(buf, &rows));
        assert!(out.lines().nth(1).unwrap().ends_with(",20.50"));
    }

    #[test]
    fn test_time_series_csv() {
        let points = vec![TimeSeriesPoint {
            entity: "France".into(),
            date: date(2020, 3, 1),
            total_cases: 100,
            new_cases: 0,
            moving_average: 0.0,
        }];

        let out = to_string(|buf| write_time_series_csv(buf, &points));
        assert_eq!(out.lines().nth(1).unwrap(), "France,2020-03-01,100,0,0");
    }

    #[test]
    fn test_long_csv() {
        let records = vec![LongRecord {
            entity: "Italy".into(),
            date: date(2020, 3, 1),
            value: 7,
        }];
        let out = to_string(|buf| write_long_csv(buf, &records));
        assert_eq!(out, "Country/Region,Date,Value\nItaly,2020-03-01,7\n");
    }

    #[test]
    fn test_export_kind_names() {
        assert_eq!(ExportKind::from_name("time-series"), Some(ExportKind::TimeSeries));
        assert_eq!(ExportKind::from_name("Summary"), Some(ExportKind::Summary));
        assert_eq!(ExportKind::from_name("charts"), None);
        assert_eq!(ExportKind::TimeSeries.file_name(), TIME_SERIES_FILE_NAME);
    }
}
