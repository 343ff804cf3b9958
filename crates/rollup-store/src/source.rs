//! Matrix sources built from stored rollups.

use std::collections::BTreeMap;

use rollup_core::{MatrixSource, TestTree, group_key};
use rollup_error::{Result, RollupError};
use rollup_types::{Metadata, PATH_SEPARATOR, display_path, merge_override};

use crate::store::{RunKey, Store};

impl Store {
    /// One matrix column for a stored run.
    ///
    /// Rows match what the depth aggregator produces for the same input:
    /// nodes exactly `depth` segments deep, plus shallower leaves, keyed by
    /// their display path. Nodes that share a display path fold into one row.
    /// Metadata is inherited along the display path, deeper rows overriding
    /// shallower ones. Fails with `UnknownSource` when the run is not stored.
    pub fn matrix_source(
        &self,
        key: &RunKey,
        name: impl Into<String>,
        depth: usize,
    ) -> Result<MatrixSource> {
        if depth == 0 {
            return Err(RollupError::InvalidDepth(depth));
        }
        let Some(run) = self.run(key)? else {
            return Err(RollupError::UnknownSource(key.to_string()));
        };

        let rollups = self.rollups(key)?;
        let by_path = metadata_by_display_path(self.metadata(key)?);
        let tree = TestTree::from_full_names(rollups.keys());

        let mut source = MatrixSource::new(name, &run.info());
        for (full_name, rollup) in &rollups {
            let segments = full_name.split(PATH_SEPARATOR).count();
            let at_depth = segments == depth || (segments < depth && tree.is_leaf(full_name));
            if !at_depth {
                continue;
            }
            let path = display_path(full_name);
            source.accumulate(
                group_key(&path, depth),
                &rollup.counts(),
                &inherited_metadata(&by_path, &path),
            );
        }
        Ok(source)
    }
}

fn metadata_by_display_path(
    metadata: BTreeMap<String, Metadata>,
) -> BTreeMap<Vec<String>, Metadata> {
    let mut by_path: BTreeMap<Vec<String>, Metadata> = BTreeMap::new();
    for (full_name, meta) in metadata {
        merge_override(by_path.entry(display_path(&full_name)).or_default(), &meta);
    }
    by_path
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
