//! Hierarchy builder: an arena tree over path segments of full test names.
//!
//! Nodes are stored in a flat `Vec` and linked by [`NodeId`]; parent/child
//! relations never require string-prefix scanning. A node is a leaf iff it
//! has no children. Leafness depends only on the set of names inserted, never
//! on outcomes.

use std::collections::{BTreeMap, HashMap};

use rollup_types::{PATH_SEPARATOR, TestRecord};

/// Index of a node in a [`TestTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(usize);

#[derive(Debug, Clone)]
pub struct TestNode {
    /// Last path segment, verbatim (underscores kept).
    pub segment: String,
    pub full_name: String,
    pub parent: Option<NodeId>,
    children: BTreeMap<String, NodeId>,
    observed: bool,
}

impl TestNode {
    /// Children ordered by segment.
    pub fn children(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.children.values().copied()
    }

    #[must_use]
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// `true` when the full name was inserted itself, not only implied as an
    /// ancestor of another name.
    #[must_use]
    pub fn is_observed(&self) -> bool {
        self.observed
    }
}

#[derive(Debug, Clone, Default)]
pub struct TestTree {
    nodes: Vec<TestNode>,
    roots: BTreeMap<String, NodeId>,
    index: HashMap<String, NodeId>,
}

impl TestTree {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_full_names<I>(names: I) -> Self
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let mut tree = Self::new();
        for name in names {
            tree.insert(name.as_ref());
        }
        tree
    }

    /// Insert a full name and every implied ancestor; returns the name's node.
    ///
    /// A leading separator belongs to the root segment, so `/lead` is a root
    /// as [`rollup_types::parent_full_name`] reports.
    pub fn insert(&mut self, full_name: &str) -> NodeId {
        let boundaries = full_name
            .match_indices(PATH_SEPARATOR)
            .map(|(index, _)| index)
            .filter(|&index| index > 0)
            .chain(std::iter::once(full_name.len()));

        let mut current: Option<NodeId> = None;
        let mut start = 0;
        for end in boundaries {
            let node = self.node_for(&full_name[..end], &full_name[start..end], current);
            current = Some(node);
            start = end + PATH_SEPARATOR.len_utf8();
        }

        let id = current.unwrap_or_else(|| self.node_for(full_name, full_name, None));
        self.nodes[id.0].observed = true;
        id
    }

    fn node_for(&mut self, prefix: &str, segment: &str, parent: Option<NodeId>) -> NodeId {
        if let Some(&id) = self.index.get(prefix) {
            return id;
        }

        let id = NodeId(self.nodes.len());
        self.nodes.push(TestNode {
            segment: segment.to_owned(),
            full_name: prefix.to_owned(),
            parent,
            children: BTreeMap::new(),
            observed: false,
        });
        match parent {
            Some(parent) => {
                self.nodes[parent.0].children.insert(segment.to_owned(), id);
            }
            None => {
                self.roots.insert(segment.to_owned(), id);
            }
        }
        self.index.insert(prefix.to_owned(), id);
        id
    }

    #[must_use]
    pub fn get(&self, full_name: &str) -> Option<NodeId> {
        self.index.get(full_name).copied()
    }

    #[must_use]
    pub fn node(&self, id: NodeId) -> &TestNode {
        &self.nodes[id.0]
    }

    /// `true` when `full_name` is in the tree and has no children.
    #[must_use]
    pub fn is_leaf(&self, full_name: &str) -> bool {
        self.get(full_name)
            .is_some_and(|id| self.node(id).is_leaf())
    }

    /// Full names of every leaf, sorted.
    #[must_use]
    pub fn leaves(&self) -> Vec<&str> {
        let mut leaves: Vec<&str> = self
            .nodes
            .iter()
            .filter(|node| node.is_leaf())
            .map(|node| node.full_name.as_str())
            .collect();
        leaves.sort_unstable();
        leaves
    }

    pub fn roots(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.roots.values().copied()
    }

    /// Every node, children before their parent.
    #[must_use]
    pub fn post_order(&self) -> Vec<NodeId> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<(NodeId, bool)> =
            self.roots.values().rev().map(|&id| (id, false)).collect();
        while let Some((id, expanded)) = stack.pop() {
            if expanded {
                order.push(id);
                continue;
            }
            stack.push((id, true));
            stack.extend(
                self.node(id)
                    .children
                    .values()
                    .rev()
                    .map(|&child| (child, false)),
            );
        }
        order
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Keep only the records whose full name is a leaf of the batch.
///
/// An internal node's own record is dropped: its status is inferred from its
/// descendants.
#[must_use]
pub fn leaf_records(records: &BTreeMap<String, TestRecord>) -> BTreeMap<&str, &TestRecord> {
    let tree = TestTree::from_full_names(records.keys());
    records
        .iter()
        .filter(|(full_name, _)| tree.is_leaf(full_name))
        .map(|(full_name, record)| (full_name.as_str(), record))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rollup_types::Outcome;

    #[test]
    fn implied_ancestors_are_internal() {
        let tree = TestTree::from_full_names(["a/b/c", "a/d"]);
        assert_eq!(tree.len(), 4);
        assert!(!tree.is_leaf("a"));
        assert!(!tree.is_leaf("a/b"));
        assert!(tree.is_leaf("a/b/c"));
        assert!(tree.is_leaf("a/d"));
        assert!(!tree.node(tree.get("a/b").expect("a/b")).is_observed());
        assert!(tree.node(tree.get("a/d").expect("a/d")).is_observed());
    }

    #[test]
    fn unknown_name_is_not_a_leaf() {
        let tree = TestTree::from_full_names(["a"]);
        assert!(!tree.is_leaf("b"));
        assert!(tree.is_leaf("a"));
    }

    #[test]
    fn sibling_prefix_is_not_an_ancestor() {
        let tree = TestTree::from_full_names(["A/B", "A/B1"]);
        assert!(tree.is_leaf("A/B"));
        assert!(tree.is_leaf("A/B1"));
        assert_eq!(tree.leaves(), vec!["A/B", "A/B1"]);
    }

    #[test]
    fn insertion_order_does_not_matter() {
        let forward = TestTree::from_full_names(["x", "x/y", "x/y/z", "w"]);
        let backward = TestTree::from_full_names(["w", "x/y/z", "x/y", "x"]);
        assert_eq!(forward.leaves(), backward.leaves());
        assert_eq!(forward.leaves(), vec!["w", "x/y/z"]);
    }

    #[test]
    fn post_order_visits_children_first() {
        let tree = TestTree::from_full_names(["a/b/c", "a/d", "e"]);
        let order: Vec<&str> = tree
            .post_order()
            .into_iter()
            .map(|id| tree.node(id).full_name.as_str())
            .collect();
        assert_eq!(order, vec!["a/b/c", "a/b", "a/d", "a", "e"]);
    }

    #[test]
    fn leading_separator_stays_in_the_root_segment() {
        let tree = TestTree::from_full_names(["/lead", "/lead/x"]);
        assert_eq!(tree.len(), 2);
        assert!(tree.get("").is_none());
        let root = tree.node(tree.get("/lead").expect("/lead"));
        assert_eq!(root.parent, None);
        assert_eq!(root.segment, "/lead");
        assert_eq!(tree.leaves(), vec!["/lead/x"]);
        assert_eq!(
            tree.node(tree.get("/lead/x").expect("/lead/x")).parent,
            tree.get("/lead")
        );
    }

    #[test]
    fn leaf_records_drops_internal_records() {
        let records: BTreeMap<String, TestRecord> = ["TestA", "TestA/one", "TestA/two", "TestB"]
            .into_iter()
            .map(|name| (name.to_owned(), TestRecord::with_outcome(name, Outcome::Pass)))
            .collect();
        let leaves: Vec<&str> = leaf_records(&records).into_keys().collect();
        assert_eq!(leaves, vec!["TestA/one", "TestA/two", "TestB"]);
    }
}
