use indexmap::IndexMap;

use crate::record::ComparisonRecord;

/// All comparison rows which share a first-sequence identifier, in input order.
#[derive(Debug)]
pub struct Group {
    pub key: String,
    pub records: Vec<ComparisonRecord>,
}

/// The input rows split into groups.
///
/// # Fields
///
/// * `groups` - Groups in the order their key was first seen
/// * `ungrouped` - Rows with a missing group key, which belong to no group
#[derive(Debug, Default)]
pub struct Partition {
    pub groups: Vec<Group>,
    pub ungrouped: Vec<ComparisonRecord>,
}

/// Splits records into disjoint groups keyed by `group_key`.
pub fn partition(records: Vec<ComparisonRecord>) -> Partition {
    let mut by_key: IndexMap<String, Vec<ComparisonRecord>> = IndexMap::new();
    let mut ungrouped = Vec::new();

    for rec in records {
        match rec.group_key.clone() {
            Some(key) => by_key.entry(key).or_default().push(rec),
            None => ungrouped.push(rec),
        }
    }

    let groups = by_key
        .into_iter()
        .map(|(key, records)| Group { key, records })
        .collect();

    Partition { groups, ungrouped }
}
