//! Lock Order Graph merged from all per-thread trees
//!
//! Each per-thread tree says "while holding A, this thread acquired B" for
//! every parent/child pair. The lock order graph keeps one node per lock id
//! and one edge per such ordered pair, regardless of which thread saw it or at
//! what depth. Unlike the trees it can, and is expected to, contain cycles.
//!
//! Nodes live in an arena and point at each other by index; an id index maps
//! lock ids to arena slots.

use crate::core::tree::{LockTree, TreeNode};
use crate::core::types::LockId;
use fxhash::{FxHashMap, FxHashSet};

/// One lock in the merged graph
#[derive(Debug, Clone)]
pub(crate) struct GraphNode {
    /// Lock this node stands for
    pub(crate) id: LockId,
    /// Arena slots of the locks acquired while this one was held, first seen first
    pub(crate) successors: Vec<usize>,
}

/// Directed graph of observed lock acquisition orders
///
/// An edge from lock A to lock B means some thread acquired B while holding A.
#[derive(Debug, Default)]
pub struct LockOrderGraph {
    /// Node arena, in order of first reference
    pub(crate) nodes: Vec<GraphNode>,
    /// Lock id to arena slot
    index: FxHashMap<LockId, usize>,
    /// All edges as (before, after) arena slots
    edges: FxHashSet<(usize, usize)>,
}

impl LockOrderGraph {
    /// Create a new empty lock order graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a sequence of per-thread trees into one graph
    pub fn from_trees<'a, I>(trees: I) -> Self
    where
        I: IntoIterator<Item = &'a LockTree>,
    {
        let mut graph = Self::new();
        for tree in trees {
            graph.merge_tree(tree);
        }
        graph
    }

    /// Add every node and parent/child edge of `tree`
    ///
    /// The synthetic root contributes no edges: top-level acquisitions were
    /// made without holding anything.
    pub fn merge_tree(&mut self, tree: &LockTree) {
        let mut stack: Vec<&TreeNode> = tree.children.iter().rev().collect();
        while let Some(node) = stack.pop() {
            let slot = self.node_for(node.id);
            for child in &node.children {
                let child_slot = self.node_for(child.id);
                self.add_edge(slot, child_slot);
            }
            stack.extend(node.children.iter().rev());
        }
    }

    /// Get the arena slot for `id`, creating the node on first reference
    fn node_for(&mut self, id: LockId) -> usize {
        if let Some(&slot) = self.index.get(&id) {
            return slot;
        }
        let slot = self.nodes.len();
        self.nodes.push(GraphNode {
            id,
            successors: Vec::new(),
        });
        self.index.insert(id, slot);
        slot
    }

    fn add_edge(&mut self, before: usize, after: usize) {
        if self.edges.insert((before, after)) {
            self.nodes[before].successors.push(after);
        }
    }

    /// Number of distinct locks in the graph
    pub fn lock_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of distinct ordered pairs
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Lock ids in order of first reference
    pub fn locks(&self) -> impl Iterator<Item = LockId> + '_ {
        self.nodes.iter().map(|node| node.id)
    }

    /// Check if some thread acquired `after` while holding `before`
    pub fn has_edge(&self, before: LockId, after: LockId) -> bool {
        match (self.index.get(&before), self.index.get(&after)) {
            (Some(&b), Some(&a)) => self.edges.contains(&(b, a)),
            _ => false,
        }
    }

    /// Get all edges as (before, after) lock id pairs
    pub fn edges(&self) -> FxHashSet<(LockId, LockId)> {
        self.edges
            .iter()
            .map(|&(b, a)| (self.nodes[b].id, self.nodes[a].id))
            .collect()
    }

    /// Locks acquired while holding `id`, first seen first
    pub fn successors(&self, id: LockId) -> Vec<LockId> {
        self.index
            .get(&id)
            .map(|&slot| {
                self.nodes[slot]
                    .successors
                    .iter()
                    .map(|&s| self.nodes[s].id)
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::seq::SliceRandom;

    fn node(id: LockId, children: Vec<TreeNode>) -> TreeNode {
        TreeNode {
            id,
            name: None,
            children,
        }
    }

    fn tree(children: Vec<TreeNode>) -> LockTree {
        let mut tree = LockTree::new(1, None);
        tree.children = children;
        tree
    }

    #[test]
    fn test_unions_edges_across_threads() {
        let t1 = tree(vec![node(1, vec![node(2, vec![])])]);
        let t2 = tree(vec![node(2, vec![node(3, vec![])]), node(1, vec![node(3, vec![])])]);

        let graph = LockOrderGraph::from_trees([&t1, &t2]);
        assert_eq!(graph.lock_count(), 3);
        assert_eq!(graph.edge_count(), 3);
        assert!(graph.has_edge(1, 2));
        assert!(graph.has_edge(2, 3));
        assert!(graph.has_edge(1, 3));
        assert!(!graph.has_edge(3, 1));
        assert_eq!(graph.successors(1), vec![2, 3]);
    }

    #[test]
    fn test_edges_ignore_depth_and_duplicates() {
        // 1 -> 2 seen at the top and again below 3
        let t = tree(vec![
            node(1, vec![node(2, vec![])]),
            node(3, vec![node(1, vec![node(2, vec![])])]),
        ]);
        let graph = LockOrderGraph::from_trees([&t, &t]);
        assert_eq!(graph.edge_count(), 2);
        assert_eq!(graph.locks().collect::<Vec<_>>(), vec![1, 2, 3]);
    }

    #[test]
    fn test_keeps_reentry_edges() {
        let t = tree(vec![node(4, vec![node(4, vec![node(5, vec![])])])]);
        let graph = LockOrderGraph::from_trees([&t]);
        assert!(graph.has_edge(4, 4));
        assert!(graph.has_edge(4, 5));
        assert_eq!(graph.edge_count(), 2);
        assert_eq!(graph.successors(4), vec![4, 5]);

        let reports: Vec<Vec<LockId>> = graph
            .potential_deadlocks()
            .into_iter()
            .map(|deadlock| deadlock.locks)
            .collect();
        assert_eq!(reports, vec![vec![4, 4]]);
    }

    #[test]
    fn test_pruned_reentry_leaves_no_edge() {
        let mut t = tree(vec![node(7, vec![node(7, vec![])])]);
        assert!(LockOrderGraph::from_trees([&t]).has_cycle());

        crate::core::prune::prune_tree(&mut t);
        let graph = LockOrderGraph::from_trees([&t]);
        assert_eq!(graph.edge_count(), 0);
        assert_eq!(graph.lock_count(), 1);
        assert!(graph.potential_deadlocks().is_empty());
    }

    #[test]
    fn test_merge_order_does_not_change_edges() {
        let mut trees = vec![
            tree(vec![node(1, vec![node(2, vec![node(3, vec![])])])]),
            tree(vec![node(3, vec![node(1, vec![])])]),
            tree(vec![node(4, vec![node(2, vec![]), node(5, vec![])])]),
            tree(vec![node(5, vec![node(4, vec![])]), node(6, vec![])]),
            tree(vec![node(2, vec![node(6, vec![node(1, vec![])])])]),
        ];
        let expected = LockOrderGraph::from_trees(&trees).edges();

        let mut rng = rand::rng();
        for _ in 0..20 {
            trees.shuffle(&mut rng);
            assert_eq!(LockOrderGraph::from_trees(&trees).edges(), expected);
        }
    }

    #[test]
    fn test_unknown_locks() {
        let graph = LockOrderGraph::new();
        assert!(!graph.has_edge(1, 2));
        assert!(graph.successors(1).is_empty());
        assert_eq!(graph.lock_count(), 0);
    }
}
