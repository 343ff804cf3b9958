use std::collections::{BTreeMap, BTreeSet};

use proptest::prelude::*;
use rollup_core::TestTree;
use rollup_store::{RunKey, Store};
use rollup_types::{Outcome, RunInput, TestRecord, UNKNOWN_VERSION};

fn outcome() -> impl Strategy<Value = Outcome> {
    prop_oneof![
        Just(Outcome::Pass),
        Just(Outcome::Fail),
        Just(Outcome::Skip),
        Just(Outcome::Unknown),
    ]
}

fn run_input() -> impl Strategy<Value = RunInput> {
    let name = prop::collection::vec("[ab][ab1]?", 1..4).prop_map(|segments| segments.join("/"));
    prop::collection::btree_map(name, outcome(), 1..20).prop_map(|entries| {
        let records: BTreeMap<String, TestRecord> = entries
            .into_iter()
            .map(|(name, outcome)| {
                let record = TestRecord::with_outcome(&name, outcome);
                (name, record)
            })
            .collect();
        RunInput::from_records(records)
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn stored_rollups_agree_with_the_tree(input in run_input()) {
        let mut store = Store::open_in_memory().expect("open store");
        store.load_run("impl", &input, false).expect("load");
        let key = RunKey::new("impl", UNKNOWN_VERSION);

        let tree = TestTree::from_full_names(input.tests.keys());
        let expected: BTreeSet<String> = tree.leaves().into_iter().map(str::to_owned).collect();
        let leaves = store.leaf_names(&key).expect("leaf names");
        prop_assert_eq!(&leaves, &expected);

        let rollups = store.rollups(&key).expect("rollups");
        prop_assert_eq!(rollups.len(), tree.len());

        let known_leaves = leaves
            .iter()
            .filter(|leaf| input.tests[leaf.as_str()].outcome.is_known())
            .count() as u64;
        let root_total: u64 = rollups
            .values()
            .filter(|rollup| rollup.parent_full_name.is_none())
            .map(|rollup| rollup.total)
            .sum();
        prop_assert_eq!(root_total, known_leaves);

        for rollup in rollups.values() {
            prop_assert_eq!(rollup.total, rollup.passed + rollup.failed + rollup.skipped);
        }
    }
}
