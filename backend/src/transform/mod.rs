//! Transformation module.
//!
//! - Reshape: entity trimming, date parsing, wide to long, aggregation
//! - Growth: period-over-period change, weekly growth, growth statistics
//! - Series: daily new cases, moving average, date filter, summary
//! - Pipeline: end-to-end analysis with options

pub mod growth;
pub mod pipeline;
pub mod reshape;
pub mod series;

pub use growth::{compute_growth, growth_stats, weekly_growth};
pub use pipeline::*;
pub use reshape::{
    aggregate_by_entity, check_counts, normalize_entities, parse_dates, select_entities, to_long,
    DateParseOutcome, LongRecords,
};
pub use series::{build_time_series, filter_date_range, overview, summarize, Dated};

use std::collections::HashMap;

/// Split `items` into one group per entity, in first-appearance order.
///
/// Each group keeps the input order of its items and is never empty.
pub(crate) fn group_by_entity<'a, T, F>(items: &'a [T], entity: F) -> Vec<Vec<&'a T>>
where
    F: Fn(&'a T) -> &'a str,
{
    let mut index: HashMap<&'a str, usize> = HashMap::new();
    let mut groups: Vec<Vec<&'a T>> = Vec::new();

    for item in items {
        let key = entity(item);
        let idx = *index.entry(key).or_insert_with(|| {
            groups.push(Vec::new());
            groups.len() - 1
        });
        groups[idx].push(item);
    }

    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_by_entity_first_appearance() {
        let items = [("Italy", 1), ("France", 2), ("Italy", 3)];
        let groups = group_by_entity(&items, |i| i.0);

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0], vec![&("Italy", 1), &("Italy", 3)]);
        assert_eq!(groups[1], vec![&("France", 2)]);
    }
}
