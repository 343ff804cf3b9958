//! Rollup Query Engine: per-node subtree sums of leaf outcomes.
//!
//! The stored rows of a run are rebuilt into a [`TestTree`]; one post-order
//! walk sums leaf outcomes into every ancestor, so `A/B1` never counts toward
//! `A/B`.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use tracing::debug;

use rollup_core::slug::slugify_test_name;
use rollup_core::{NodeId, TestTree};
use rollup_error::Result;
use rollup_types::{Counts, Outcome};

use crate::query::ResultRow;
use crate::store::{RunKey, Store};

/// Leaf counts beneath one result row. `total` is `passed + failed +
/// skipped`; leaves without an outcome add nothing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rollup {
    pub full_name: String,
    pub name: String,
    pub parent_full_name: Option<String>,
    pub passed: u64,
    pub failed: u64,
    pub skipped: u64,
    pub total: u64,
    pub slug: String,
}

impl Rollup {
    #[must_use]
    pub const fn counts(&self) -> Counts {
        Counts {
            pass: self.passed,
            fail: self.failed,
            skip: self.skipped,
            total: self.total,
        }
    }
}

/// One rollup per row, keyed by full name.
#[must_use]
pub fn compute_rollups(rows: &[ResultRow]) -> BTreeMap<String, Rollup> {
    let tree = TestTree::from_full_names(rows.iter().map(|row| row.full_name.as_str()));
    let outcomes: HashMap<&str, Outcome> = rows
        .iter()
        .map(|row| (row.full_name.as_str(), row.outcome))
        .collect();

    let mut sums: HashMap<NodeId, Counts> = HashMap::with_capacity(tree.len());
    for id in tree.post_order() {
        let node = tree.node(id);
        let mut counts = Counts::default();
        if node.is_leaf() {
            if let Some(outcome) = outcomes
                .get(node.full_name.as_str())
                .copied()
                .filter(|outcome| outcome.is_known())
            {
                counts.record(outcome);
            }
        } else {
            for child in node.children() {
                if let Some(child_counts) = sums.get(&child) {
                    counts.add(child_counts);
                }
            }
        }
        sums.insert(id, counts);
    }

    rows.iter()
        .map(|row| {
            let counts = tree
                .get(&row.full_name)
                .and_then(|id| sums.get(&id))
                .copied()
                .unwrap_or_default();
            let rollup = Rollup {
                full_name: row.full_name.clone(),
                name: row.name.clone(),
                parent_full_name: row.parent_full_name.clone(),
                passed: counts.pass,
                failed: counts.fail,
                skipped: counts.skip,
                total: counts.total,
                slug: slugify_test_name(&row.full_name),
            };
            (row.full_name.clone(), rollup)
        })
        .collect()
}

impl Store {
    /// Rollups of every result row in a run. A run without rows, or one
    /// that was never stored, yields an empty map.
    pub fn rollups(&self, key: &RunKey) -> Result<BTreeMap<String, Rollup>> {
        let rows = self.results(key)?;
        let rollups = compute_rollups(&rows);
        debug!(run = %key, rows = rows.len(), "computed rollups");
        Ok(rollups)
    }
}
