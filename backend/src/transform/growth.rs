//! Growth metrics: period-over-period change, weekly growth and growth statistics.
//!
//! A zero denominator is never an error. The affected figure is `None`,
//! so no NaN or infinity ever reaches a consumer.

use chrono::{Datelike, Duration, NaiveDate};
use std::collections::BTreeMap;

use super::group_by_entity;
use crate::models::{GrowthRecord, GrowthStats, LongRecord, TimeSeriesPoint, WeeklyGrowth};

/// Most decimal places [`round_to`] honors; an `f64` carries no more.
pub const MAX_PERCENT_PRECISION: u32 = 15;

/// Round `value` to `places` decimal places.
///
/// `places` above [`MAX_PERCENT_PRECISION`] leave `value` unchanged.
pub fn round_to(value: f64, places: u32) -> f64 {
    if places > MAX_PERCENT_PRECISION {
        return value;
    }
    let factor = 10f64.powi(places as i32);
    (value * factor).round() / factor
}

/// Sum of new-case counts, saturating at the `i64` bounds.
pub(crate) fn saturating_sum<I: IntoIterator<Item = i64>>(values: I) -> i64 {
    values.into_iter().fold(0i64, i64::saturating_add)
}

/// `current - previous` as a signed change, clamped to the `i64` range.
pub(crate) fn delta(current: u64, previous: u64) -> i64 {
    let diff = current as i128 - previous as i128;
    diff.clamp(i64::MIN as i128, i64::MAX as i128) as i64
}

/// Compute absolute and percentage change for each entity's date-ordered values.
///
/// Records are grouped by entity (first-appearance order) and sorted by date
/// within each entity. The first date has no prior value, so both changes are
/// `None`. `percent_change` is a fraction of the prior value, `None` when that
/// value is zero, and rounded to `precision` decimals when given.
///
/// # Example
/// ```ignore
/// // values [100, 150, 150]
/// // absolute_change = [None, Some(50), Some(0)]
/// // percent_change  = [None, Some(0.5), Some(0.0)]
/// ```
pub fn compute_growth(records: &[LongRecord], precision: Option<u32>) -> Vec<GrowthRecord> {
    let mut growth = Vec::with_capacity(records.len());

    for mut series in group_by_entity(records, |r| r.entity.as_str()) {
        series.sort_by_key(|r| r.date);

        let mut previous: Option<u64> = None;
        for record in series {
            let (absolute_change, percent_change) = match previous {
                None => (None, None),
                Some(prev) => {
                    let change = delta(record.value, prev);
                    let percent = (prev != 0).then(|| {
                        let p = change as f64 / prev as f64;
                        precision.map_or(p, |places| round_to(p, places))
                    });
                    (Some(change), percent)
                }
            };

            growth.push(GrowthRecord {
                entity: record.entity.clone(),
                date: record.date,
                value: record.value,
                absolute_change,
                percent_change,
            });
            previous = Some(record.value);
        }
    }

    growth
}

/// Monday of the week containing `date`.
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.weekday().num_days_from_monday() as i64)
}

/// Roll daily points up into weeks starting on Monday.
///
/// `total_cases` is the last cumulative total of the week and `new_cases` the
/// sum of the week's daily new cases. `weekly_growth` is the percent change of
/// `total_cases` from the previous week, `None` for an entity's first week or
/// when the previous week's total is zero.
pub fn weekly_growth(points: &[TimeSeriesPoint]) -> Vec<WeeklyGrowth> {
    let mut weeks = Vec::new();

    for series in group_by_entity(points, |p| p.entity.as_str()) {
        let entity = series[0].entity.clone();

        // week start -> (latest date seen, total at that date, new cases sum)
        let mut by_week: BTreeMap<NaiveDate, (NaiveDate, u64, i64)> = BTreeMap::new();

        for point in series {
            let entry = by_week
                .entry(week_start(point.date))
                .or_insert((point.date, point.total_cases, 0));
            if point.date >= entry.0 {
                entry.0 = point.date;
                entry.1 = point.total_cases;
            }
            entry.2 = entry.2.saturating_add(point.new_cases);
        }

        let mut previous_total: Option<u64> = None;
        for (start, (_, total, new_cases)) in by_week {
            let growth = previous_total
                .filter(|&prev| prev != 0)
                .map(|prev| delta(total, prev) as f64 / prev as f64 * 100.0);

            weeks.push(WeeklyGrowth {
                entity: entity.clone(),
                week_start: start,
                total_cases: total,
                new_cases,
                weekly_growth: growth,
            });
            previous_total = Some(total);
        }
    }

    weeks
}

/// Average, peak and most recent daily growth per entity, in percent.
///
/// Only defined `percent_change` values count. An entity with none gets
/// `None` for all three.
pub fn growth_stats(growth: &[GrowthRecord]) -> Vec<GrowthStats> {
    group_by_entity(growth, |g| g.entity.as_str())
        .into_iter()
        .map(|mut series| {
            series.sort_by_key(|g| g.date);
            let entity = series[0].entity.clone();

            let rates: Vec<f64> = series
                .iter()
                .filter_map(|g| g.percent_change)
                .map(|p| p * 100.0)
                .collect();

            let average = (!rates.is_empty()).then(|| rates.iter().sum::<f64>() / rates.len() as f64);
            let peak = rates.iter().copied().reduce(f64::max);
            let recent = rates.last().copied();

            GrowthStats { entity, average, peak, recent }
        })
        .collect()
}
