//! Pruning of self-nested repeats
//!
//! A reentrant lock entered again further down its own subtree shows up as a
//! descendant with the same id. Those descendants carry no ordering
//! information (the thread already owned the lock), so the pruner drops them
//! together with everything below them.

use crate::core::tree::{LockTree, TreeNode};
use crate::core::types::LockId;

/// Remove every node whose lock already appears among its ancestors
///
/// Works in place and is idempotent.
pub fn prune_tree(tree: &mut LockTree) {
    let mut ancestors = Vec::new();
    for child in &mut tree.children {
        prune_node(child, &mut ancestors);
    }
}

fn prune_node(node: &mut TreeNode, ancestors: &mut Vec<LockId>) {
    ancestors.push(node.id);
    node.children.retain(|child| !ancestors.contains(&child.id));
    for child in &mut node.children {
        prune_node(child, ancestors);
    }
    ancestors.pop();
}

#[cfg(test)]
mod tests {
    use super::*;

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
    fn test_drops_direct_reentry() {
        let mut t = tree(vec![node(10, vec![node(10, vec![])])]);
        prune_tree(&mut t);
        assert_eq!(t, tree(vec![node(10, vec![])]));
    }

    #[test]
    fn test_drops_deep_reentry_with_subtree() {
        // 1 -> 2 -> 1 -> 3: the inner 1 and its 3 go away
        let mut t = tree(vec![node(
            1,
            vec![node(2, vec![node(1, vec![node(3, vec![])]), node(4, vec![])])],
        )]);
        prune_tree(&mut t);
        assert_eq!(
            t,
            tree(vec![node(1, vec![node(2, vec![node(4, vec![])])])])
        );
    }

    #[test]
    fn test_keeps_same_lock_in_sibling_branches() {
        let original = tree(vec![
            node(1, vec![node(3, vec![])]),
            node(2, vec![node(3, vec![])]),
            node(3, vec![]),
        ]);
        let mut t = original.clone();
        prune_tree(&mut t);
        assert_eq!(t, original);
    }

    #[test]
    fn test_is_idempotent() {
        let mut t = tree(vec![
            node(5, vec![node(5, vec![node(6, vec![node(5, vec![])])]), node(6, vec![])]),
            node(6, vec![node(7, vec![node(6, vec![]), node(8, vec![])])]),
        ]);
        prune_tree(&mut t);
        let once = t.clone();
        prune_tree(&mut t);
        assert_eq!(t, once);
        assert_eq!(t.node_count(), 5);
    }
}
