//! Depth aggregator: leaf outcomes folded into groups keyed by the first
//! `depth` display segments of their path.

use std::collections::BTreeMap;

use rollup_error::{Result, RollupError};
use rollup_types::{
    Counts, GROUP_KEY_SEPARATOR, Metadata, TestRecord, display_path, merge_disjoint,
    merge_override,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::hierarchy::TestTree;

/// Counters for one group of leaves, plus the metadata it inherits.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateGroup {
    pub path: Vec<String>,
    #[serde(flatten)]
    pub counts: Counts,
    #[serde(default, skip_serializing_if = "Metadata::is_empty")]
    pub meta: Metadata,
}

/// Group key for a display path truncated to `depth` segments.
#[must_use]
pub fn group_key(path: &[String], depth: usize) -> String {
    path[..depth.min(path.len())].join(GROUP_KEY_SEPARATOR)
}

/// Aggregate the leaves of `records` at `depth`.
///
/// Unknown outcomes count toward `total` only. A group inherits the metadata
/// of every record whose display path is a prefix of the group path, with
/// deeper paths overriding shallower ones; two records sharing a display path
/// must not declare the same key.
pub fn aggregate(
    records: &BTreeMap<String, TestRecord>,
    depth: usize,
) -> Result<BTreeMap<String, AggregateGroup>> {
    if depth == 0 {
        return Err(RollupError::InvalidDepth(depth));
    }

    let path_metadata = collect_path_metadata(records)?;
    let tree = TestTree::from_full_names(records.keys());

    let mut groups: BTreeMap<String, AggregateGroup> = BTreeMap::new();
    let mut leaf_count = 0_usize;
    for (full_name, record) in records {
        if !tree.is_leaf(full_name) {
            continue;
        }
        leaf_count += 1;

        let path = record_path(full_name, record);
        let truncated = &path[..depth.min(path.len())];
        let group = groups
            .entry(truncated.join(GROUP_KEY_SEPARATOR))
            .or_insert_with(|| AggregateGroup {
                path: truncated.to_vec(),
                ..AggregateGroup::default()
            });
        group.counts.record(record.outcome);
    }

    for group in groups.values_mut() {
        group.meta = inherited_metadata(&path_metadata, &group.path);
    }

    debug!(
        records = records.len(),
        leaves = leaf_count,
        groups = groups.len(),
        depth,
        "aggregated leaf outcomes"
    );
    Ok(groups)
}

fn record_path(full_name: &str, record: &TestRecord) -> Vec<String> {
    if record.path.is_empty() {
        display_path(full_name)
    } else {
        record.path.clone()
    }
}

/// Metadata of every record, merged per display path.
fn collect_path_metadata(
    records: &BTreeMap<String, TestRecord>,
) -> Result<BTreeMap<Vec<String>, Metadata>> {
    let mut by_path: BTreeMap<Vec<String>, Metadata> = BTreeMap::new();
    for (full_name, record) in records {
        if record.meta.is_empty() {
            continue;
        }
        let target = by_path.entry(record_path(full_name, record)).or_default();
        merge_disjoint(full_name, target, record.meta.clone())?;
    }
    Ok(by_path)
}

fn inherited_metadata(by_path: &BTreeMap<Vec<String>, Metadata>, path: &[String]) -> Metadata {
    let mut meta = Metadata::new();
    for len in 1..=path.len() {
        if let Some(found) = by_path.get(&path[..len]) {
            merge_override(&mut meta, found);
        }
    }
    meta
}
