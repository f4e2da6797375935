//! Global forest of completed per-thread trees
//!
//! Threads hand their acquisition tree over when they exit. The forest is the
//! only state shared between threads and sits behind a single lock; it is
//! taken once per thread hand-off and for the whole duration of each
//! analysis.
//!
//! The forest only grows. A long-running program that keeps spawning short
//! lived threads accumulates one tree per thread that ever took an
//! instrumented lock; [`prune_forest`] compacts trees but never drops them.

use crate::core::graph::LockOrderGraph;
use crate::core::prune::prune_tree;
use crate::core::report::Report;
use crate::core::tree::{LockTree, TreeNode};
use crate::core::types::{LockId, LockLabel, PotentialDeadlock};
use fxhash::FxHashSet;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

/// Completed lock trees, in hand-off order
#[derive(Debug, Default, Clone)]
pub struct Forest {
    trees: Vec<LockTree>,
}

impl Forest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a thread's tree; empty trees are ignored
    pub fn push(&mut self, tree: LockTree) {
        if !tree.is_empty() {
            self.trees.push(tree);
        }
    }

    pub fn trees(&self) -> &[LockTree] {
        &self.trees
    }

    pub fn len(&self) -> usize {
        self.trees.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trees.is_empty()
    }

    /// Prune self-nested repeats from every tree
    pub fn prune(&mut self) {
        for tree in &mut self.trees {
            prune_tree(tree);
        }
    }

    /// Every named lock once, in the order it is first met walking the forest
    pub fn lock_names(&self) -> Vec<LockLabel> {
        let mut seen = FxHashSet::default();
        let mut labels = Vec::new();
        for tree in &self.trees {
            let mut stack: Vec<&TreeNode> = tree.children.iter().rev().collect();
            while let Some(node) = stack.pop() {
                if let Some(name) = &node.name
                    && seen.insert(node.id)
                {
                    labels.push(LockLabel {
                        id: node.id,
                        name: name.clone(),
                    });
                }
                stack.extend(node.children.iter().rev());
            }
        }
        labels
    }

    /// Merge all trees into a single lock order graph
    pub fn merged_graph(&self) -> LockOrderGraph {
        LockOrderGraph::from_trees(&self.trees)
    }

    /// Search the merged graph for lock ordering cycles
    pub fn potential_deadlocks(&self) -> Vec<PotentialDeadlock> {
        self.merged_graph().potential_deadlocks()
    }

    /// Locks that take part in at least one reported cycle
    pub fn locks_in_cycles(&self) -> Vec<LockId> {
        let mut ids: Vec<LockId> = self
            .potential_deadlocks()
            .iter()
            .flat_map(|deadlock| deadlock.cycle().iter().copied())
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }
}

// Global forest shared by all threads
lazy_static::lazy_static! {
    static ref GLOBAL_FOREST: Mutex<Forest> = Mutex::new(Forest::new());
}

/// Whether [`report`] prunes the forest before reading it
static PRUNE_REPORTS: AtomicBool = AtomicBool::new(true);

pub(crate) fn set_prune_reports(enabled: bool) {
    PRUNE_REPORTS.store(enabled, Ordering::SeqCst);
}

/// Hand a finished tree over to the global forest
pub(crate) fn submit(tree: LockTree) {
    GLOBAL_FOREST.lock().push(tree);
}

/// Prune self-nested repeats from every tree in the global forest
pub fn prune_forest() {
    GLOBAL_FOREST.lock().prune();
}

/// Snapshot of the global forest
pub fn forest() -> Forest {
    GLOBAL_FOREST.lock().clone()
}

/// Every named lock seen in the global forest
pub fn lock_names() -> Vec<LockLabel> {
    GLOBAL_FOREST.lock().lock_names()
}

/// Merge the global forest and search it for lock ordering cycles
///
/// The merged graph is rebuilt on every call.
pub fn potential_deadlocks() -> Vec<PotentialDeadlock> {
    GLOBAL_FOREST.lock().potential_deadlocks()
}

/// Build a full report from the global forest
///
/// Unless disabled with [`Locktree::prune_reports`](crate::Locktree::prune_reports),
/// the forest is pruned first, in place.
pub fn report() -> Report {
    let mut forest = GLOBAL_FOREST.lock();
    if PRUNE_REPORTS.load(Ordering::SeqCst) {
        forest.prune();
    }
    Report::from_forest(&forest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::LockName;

    fn named(id: LockId, name: Option<&str>, children: Vec<TreeNode>) -> TreeNode {
        TreeNode {
            id,
            name: name.map(LockName::from),
            children,
        }
    }

    fn tree(children: Vec<TreeNode>) -> LockTree {
        let mut tree = LockTree::new(1, None);
        tree.children = children;
        tree
    }

    #[test]
    fn test_empty_trees_are_not_added() {
        let mut forest = Forest::new();
        forest.push(LockTree::new(3, None));
        assert!(forest.is_empty());
        forest.push(tree(vec![named(1, None, vec![])]));
        assert_eq!(forest.len(), 1);
    }

    #[test]
    fn test_lock_names_first_seen_once() {
        let mut forest = Forest::new();
        forest.push(tree(vec![named(
            1,
            Some("db"),
            vec![named(2, None, vec![]), named(3, Some("cache"), vec![])],
        )]));
        forest.push(tree(vec![
            named(3, Some("cache"), vec![named(1, Some("db"), vec![])]),
            named(4, Some("queue"), vec![]),
        ]));

        let labels = forest.lock_names();
        let names: Vec<(LockId, &str)> = labels.iter().map(|l| (l.id, &*l.name)).collect();
        assert_eq!(names, vec![(1, "db"), (3, "cache"), (4, "queue")]);
    }

    #[test]
    fn test_prune_then_detect() {
        // One thread re-enters 1 below 2; pruning removes the 2 -> 1 edge
        let mut forest = Forest::new();
        forest.push(tree(vec![named(
            1,
            None,
            vec![named(2, None, vec![named(1, None, vec![])])],
        )]));
        assert_eq!(forest.locks_in_cycles(), vec![1, 2]);

        forest.prune();
        assert!(forest.potential_deadlocks().is_empty());
        assert!(forest.locks_in_cycles().is_empty());
    }

    #[test]
    fn test_merged_graph_spans_trees() {
        let mut forest = Forest::new();
        forest.push(tree(vec![named(1, None, vec![named(2, None, vec![])])]));
        forest.push(tree(vec![named(2, None, vec![named(1, None, vec![])])]));

        let graph = forest.merged_graph();
        assert!(graph.has_edge(1, 2));
        assert!(graph.has_edge(2, 1));
        assert_eq!(forest.locks_in_cycles(), vec![1, 2]);
    }
}
