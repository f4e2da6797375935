//! Per-thread lock acquisition trees
//!
//! A [`LockTree`] records the nesting in which one thread acquired locks. Each
//! [`TreeNode`] is one lock observed at one nesting position; its children are
//! the locks that were acquired while it was held, in first-observed order.
//! Siblings never share a lock id, so the size of a tree is bounded by the
//! number of distinct nesting contexts, not by the number of lock calls.

use crate::core::types::{LockId, LockName, ThreadId};
use serde::Serialize;

/// One observed acquisition position
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TreeNode {
    /// Lock acquired at this position
    pub id: LockId,
    /// Name of the lock the first time it was seen here
    pub name: Option<LockName>,
    /// Locks acquired while this one was held
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    pub fn new(id: LockId, name: Option<LockName>) -> Self {
        TreeNode {
            id,
            name,
            children: Vec::new(),
        }
    }

    /// Number of nodes in this subtree, this node included
    pub fn node_count(&self) -> usize {
        1 + count_nodes(&self.children)
    }

    /// Length of the longest chain from this node down to a leaf
    pub fn depth(&self) -> usize {
        1 + max_depth(&self.children)
    }
}

/// The acquisition tree of one thread
///
/// The tree itself is the synthetic root: it holds no lock, and its `children`
/// are the acquisitions made while the thread held no instrumented lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LockTree {
    /// Thread that recorded this tree
    pub thread_id: ThreadId,
    /// OS name of that thread, if it had one
    pub thread_name: Option<String>,
    /// Top-level acquisitions
    pub children: Vec<TreeNode>,
}

impl LockTree {
    pub fn new(thread_id: ThreadId, thread_name: Option<String>) -> Self {
        LockTree {
            thread_id,
            thread_name,
            children: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn node_count(&self) -> usize {
        count_nodes(&self.children)
    }

    /// Deepest nesting observed by the thread
    pub fn depth(&self) -> usize {
        max_depth(&self.children)
    }

    /// Follow a sequence of lock ids from the root
    ///
    /// Returns the node reached by the last id, or `None` if some step has no
    /// matching child.
    pub fn find(&self, ids: &[LockId]) -> Option<&TreeNode> {
        let (last, prefix) = ids.split_last()?;
        let mut level = &self.children;
        for id in prefix {
            level = &find_child(level, *id)?.children;
        }
        find_child(level, *last)
    }
}

fn find_child(children: &[TreeNode], id: LockId) -> Option<&TreeNode> {
    children.iter().find(|node| node.id == id)
}

fn count_nodes(children: &[TreeNode]) -> usize {
    children.iter().map(TreeNode::node_count).sum()
}

fn max_depth(children: &[TreeNode]) -> usize {
    children.iter().map(TreeNode::depth).max().unwrap_or(0)
}
