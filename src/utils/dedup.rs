//! Caller-side deduplication of candidate records.
//!
//! The keyword fan-out never deduplicates; callers that want one candidate per
//! book use these helpers, which rely on loose title equality only.

use std::collections::{HashMap, HashSet};

use super::normalize::title_key;
use crate::models::BookRecord;

/// Which member of a duplicate group survives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateStrategy {
    /// Keep the first occurrence of each duplicate group
    First,
    /// Keep the last occurrence of each duplicate group
    Last,
}

/// Groups of record indices whose titles are loosely equal.
///
/// Only groups with more than one member are returned, in order of their first
/// member. Records without a usable title are never grouped.
pub fn find_duplicates(records: &[BookRecord]) -> Vec<Vec<usize>> {
    let mut by_key: HashMap<String, Vec<usize>> = HashMap::new();
    let mut order: Vec<String> = Vec::new();

    for (idx, record) in records.iter().enumerate() {
        let key = title_key(&record.title);
        if key.is_empty() {
            continue;
        }
        let group = by_key.entry(key.clone()).or_default();
        if group.is_empty() {
            order.push(key);
        }
        group.push(idx);
    }

    order
        .into_iter()
        .filter_map(|key| by_key.remove(&key))
        .filter(|group| group.len() > 1)
        .collect()
}

/// Remove loose-title duplicates from a list of candidates
pub fn deduplicate_records(records: Vec<BookRecord>, strategy: DuplicateStrategy) -> Vec<BookRecord> {
    let groups = find_duplicates(&records);
    if groups.is_empty() {
        return records;
    }

    let mut to_remove: HashSet<usize> = HashSet::new();
    for group in groups {
        match strategy {
            DuplicateStrategy::First => to_remove.extend(group.iter().skip(1)),
            DuplicateStrategy::Last => to_remove.extend(group.iter().take(group.len() - 1)),
        }
    }

    records
        .into_iter()
        .enumerate()
        .filter(|(i, _)| !to_remove.contains(i))
        .map(|(_, r)| r)
        .collect()
}

/// Whether a title already exists in a catalog, by loose title equality
pub fn is_in_catalog<'a, I>(title: &str, existing: I) -> bool
where
    I: IntoIterator<Item = &'a str>,
{
    let key = title_key(title);
    !key.is_empty() && existing.into_iter().any(|t| title_key(t) == key)
}
