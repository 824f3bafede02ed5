//! Daily time series, date-range filtering and summary statistics.

use chrono::{Duration, NaiveDate};

use super::group_by_entity;
use super::growth::{delta, round_to, saturating_sum};
use crate::models::{
    DatasetOverview, DateColumn, GrowthRecord, LongRecord, SummaryRow, TimeSeriesPoint, WideTable,
};

/// Records that carry an observation date.
pub trait Dated {
    fn date(&self) -> NaiveDate;
}

impl Dated for LongRecord {
    fn date(&self) -> NaiveDate {
        self.date
    }
}

impl Dated for GrowthRecord {
    fn date(&self) -> NaiveDate {
        self.date
    }
}

impl Dated for TimeSeriesPoint {
    fn date(&self) -> NaiveDate {
        self.date
    }
}

/// Build daily totals, new cases and a trailing moving average per entity.
///
/// `new_cases` is the difference from the previous date (0 on the first one).
/// `moving_average` is the mean of up to `window` most recent `new_cases`
/// values, so the first days average over what is available.
pub fn build_time_series(records: &[LongRecord], window: usize) -> Vec<TimeSeriesPoint> {
    let window = window.max(1);
    let mut points = Vec::with_capacity(records.len());

    for mut series in group_by_entity(records, |r| r.entity.as_str()) {
        series.sort_by_key(|r| r.date);

        let mut recent: Vec<i64> = Vec::with_capacity(series.len());
        let mut previous: Option<u64> = None;

        for record in series {
            let new_cases = previous.map_or(0, |prev| delta(record.value, prev));
            recent.push(new_cases);

            let tail = &recent[recent.len().saturating_sub(window)..];
            let moving_average = saturating_sum(tail.iter().copied()) as f64 / tail.len() as f64;

            points.push(TimeSeriesPoint {
                entity: record.entity.clone(),
                date: record.date,
                total_cases: record.value,
                new_cases,
                moving_average,
            });
            previous = Some(record.value);
        }
    }

    points
}

/// Keep items dated within `[start, end]`; a missing bound is open.
pub fn filter_date_range<T: Dated + Clone>(
    items: &[T],
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> Vec<T> {
    items
        .iter()
        .filter(|item| {
            let d = item.date();
            start.map_or(true, |s| d >= s) && end.map_or(true, |e| d <= e)
        })
        .cloned()
        .collect()
}

/// Per-entity figures as of the latest date in `points`.
///
/// Only entities with a point on that date appear. Weekly and monthly new
/// cases sum every point dated on or after 7 and 30 days before it.
/// `weekly_growth_rate` divides by the total, or by 1 when the total is 0.
/// Rows are sorted by entity name.
pub fn summarize(points: &[TimeSeriesPoint]) -> Vec<SummaryRow> {
    let Some(latest) = points.iter().map(|p| p.date).max() else {
        return Vec::new();
    };
    let week_ago = latest - Duration::days(7);
    let month_ago = latest - Duration::days(30);

    let mut rows: Vec<SummaryRow> = group_by_entity(points, |p| p.entity.as_str())
        .into_iter()
        .filter_map(|series| {
            let current = series.iter().find(|p| p.date == latest)?;

            let sum_since = |since: NaiveDate| -> i64 {
                saturating_sum(series.iter().filter(|p| p.date >= since).map(|p| p.new_cases))
            };
            let weekly_new_cases = sum_since(week_ago);
            let monthly_new_cases = sum_since(month_ago);

            let denominator = current.total_cases.max(1) as f64;

            Some(SummaryRow {
                entity: current.entity.clone(),
                total_cases: current.total_cases,
                new_cases: current.new_cases,
                weekly_new_cases,
                monthly_new_cases,
                weekly_growth_rate: round_to(weekly_new_cases as f64 / denominator * 100.0, 2),
            })
        })
        .collect();

    rows.sort_by(|a, b| a.entity.cmp(&b.entity));
    rows
}

/// Headline numbers about a table and its parsed date columns.
pub fn overview(table: &WideTable, dates: &[DateColumn]) -> DatasetOverview {
    DatasetOverview {
        entity_count: table.entity_count(),
        row_count: table.len(),
        days_of_data: dates.len(),
        earliest_date: dates.iter().map(|d| d.date).min(),
        latest_date: dates.iter().map(|d| d.date).max(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::reshape::{parse_dates, DEFAULT_DATE_FORMATS};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn series(entity: &str, start: NaiveDate, values: &[u64]) -> Vec<LongRecord> {
        values
            .iter()
            .enumerate()
            .map(|(i, &value)| LongRecord {
                entity: entity.into(),
                date: start + Duration::days(i as i64),
                value,
            })
            .collect()
    }

    #[test]
    fn test_new_cases_and_moving_average() {
        let records = series("A", date(2020, 3, 1), &[10, 12, 18, 18]);
        let points = build_time_series(&records, 2);

        let new_cases: Vec<_> = points.iter().map(|p| p.new_cases).collect();
        let averages: Vec<_> = points.iter().map(|p| p.moving_average).collect();
        assert_eq!(new_cases, vec![0, 2, 6, 0]);
        assert_eq!(averages, vec![0.0, 1.0, 4.0, 3.0]);
    }

    #[test]
    fn test_moving_average_min_one_period() {
        let records = series("A", date(2020, 3, 1), &[0, 7]);
        let points = build_time_series(&records, 7);
        assert_eq!(points[1].moving_average, 3.5);
    }

    #[test]
    fn test_new_cases_negative_on_correction() {
        let records = series("A", date(2020, 3, 1), &[10, 8]);
        let points = build_time_series(&records, 7);
        assert_eq!(points[1].new_cases, -2);
    }

    #[test]
    fn test_filter_date_range_inclusive() {
        let records = series("A", date(2020, 3, 1), &[1, 2, 3, 4, 5]);
        let points = build_time_series(&records, 7);

        let filtered = filter_date_range(&points, Some(date(2020, 3, 2)), Some(date(2020, 3, 4)));
        assert_eq!(filtered.len(), 3);
        // new cases were computed before filtering
        assert_eq!(filtered[0].new_cases, 1);

        assert_eq!(filter_date_range(&points, None, Some(date(2020, 3, 1))).len(), 1);
        assert_eq!(filter_date_range(&points, None, None).len(), 5);
    }

    #[test]
    fn test_summarize() {
        let start = date(2020, 1, 1);
        let mut values: Vec<u64> = (0..40).map(|i| i * 10).collect();
        values[0] = 0;
        let mut records = series("Zambia", start, &values);
        records.extend(series("Austria", start, &[0; 40]));
        // Belize stops reporting before the latest date
        records.extend(series("Belize", start, &[1, 2]));

        let summary = summarize(&build_time_series(&records, 7));

        assert_eq!(summary.len(), 2);
        assert_eq!(summary[0].entity, "Austria");
        assert_eq!(summary[0].weekly_growth_rate, 0.0);

        let zambia = &summary[1];
        assert_eq!(zambia.total_cases, 390);
        assert_eq!(zambia.new_cases, 10);
        // 8 days (latest - 7 ..= latest) of 10 new cases
        assert_eq!(zambia.weekly_new_cases, 80);
        assert_eq!(zambia.monthly_new_cases, 310);
        assert_eq!(zambia.weekly_growth_rate, 20.51);
    }

    #[test]
    fn test_summarize_empty() {
        assert!(summarize(&[]).is_empty());
    }

    #[test]
    fn test_overview() {
        let table = WideTable::new(
            "Country/Region",
            ["1/22/20", "bad", "1/24/20"],
            vec![
                ("France".to_string(), vec![0, 0, 0]),
                ("France ".to_string(), vec![0, 0, 0]),
                ("Chile".to_string(), vec![0, 0, 0]),
            ],
        );
        let dates = parse_dates(&table.columns, &DEFAULT_DATE_FORMATS).columns;
        let overview = overview(&table, &dates);

        assert_eq!(overview.entity_count, 2);
        assert_eq!(overview.row_count, 3);
        assert_eq!(overview.days_of_data, 2);
        assert_eq!(overview.earliest_date, Some(date(2020, 1, 22)));
        assert_eq!(overview.latest_date, Some(date(2020, 1, 24)));
    }
}
