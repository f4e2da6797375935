//! Thread-local lock order recorder
//!
//! Every thread owns one [`Recorder`]: the acquisition tree it has built so
//! far and the path of locks it currently holds. Both are only ever touched by
//! the owning thread from inside lock and unlock, so no synchronization is
//! involved. When the thread exits, its tree is handed over to the global
//! forest.

use crate::core::forest;
#[cfg(feature = "logging")]
use crate::core::logger;
use crate::core::tree::{LockTree, TreeNode};
#[cfg(feature = "logging")]
use crate::core::types::Events;
use crate::core::types::{LockId, LockName, ThreadId, get_current_thread_id};
use std::cell::RefCell;
use std::thread;

/// Whether lock and unlock feed the recorder in this build
pub(crate) const ENABLED: bool = cfg!(any(debug_assertions, feature = "release-instrumentation"));

/// Acquisition tree and held-lock path of one thread
#[derive(Debug)]
pub(crate) struct Recorder {
    tree: LockTree,
    /// Locks currently held, outermost first, repeated for recursive entries
    path: Vec<LockId>,
}

impl Recorder {
    pub(crate) fn new(thread_id: ThreadId, thread_name: Option<String>) -> Self {
        Recorder {
            tree: LockTree::new(thread_id, thread_name),
            path: Vec::new(),
        }
    }

    /// Record that `id` is about to be acquired
    ///
    /// Finds (or creates) the node for `id` below the innermost held lock and
    /// pushes `id` onto the held path.
    ///
    /// # Panics
    /// Panics if the held path no longer leads through the tree. The path is
    /// built by this function, so this only happens after locks were released
    /// out of nesting order and another lock is then taken.
    pub(crate) fn record_acquire(&mut self, id: LockId, name: Option<&LockName>) {
        let mut level: &mut Vec<TreeNode> = &mut self.tree.children;
        for &held in &self.path {
            level = match level.iter_mut().find(|node| node.id == held) {
                Some(node) => &mut node.children,
                None => panic!(
                    "lock order tree has no node for held lock {held} (held path: {:?}, acquiring {id})",
                    self.path
                ),
            };
        }

        // Reuse the existing node so its first name sticks
        if !level.iter().any(|node| node.id == id) {
            level.push(TreeNode::new(id, name.cloned()));
        }

        self.path.push(id);
    }

    /// Record that `id` was released
    ///
    /// Removes the most recent entry for `id` from the held path, wherever it
    /// is, and keeps the order of the remaining entries.
    ///
    /// # Panics
    /// Panics if the thread does not hold `id`.
    pub(crate) fn record_release(&mut self, id: LockId) {
        match self.path.iter().rposition(|&held| held == id) {
            Some(index) => {
                self.path.remove(index);
            }
            None => panic!(
                "released lock {id} which is not held by this thread (held path: {:?})",
                self.path
            ),
        }
    }

    pub(crate) fn held(&self) -> &[LockId] {
        &self.path
    }

    #[cfg(test)]
    pub(crate) fn tree(&self) -> &LockTree {
        &self.tree
    }

    /// Take the recorded tree, leaving an empty one behind
    ///
    /// Returns `None` if nothing was recorded.
    pub(crate) fn take_tree(&mut self) -> Option<LockTree> {
        if self.tree.is_empty() {
            return None;
        }
        let fresh = LockTree::new(self.tree.thread_id, self.tree.thread_name.clone());
        Some(std::mem::replace(&mut self.tree, fresh))
    }
}

/// Thread-local slot whose destruction hands the tree to the forest
struct ThreadRecorder {
    recorder: RefCell<Recorder>,
}

impl ThreadRecorder {
    fn new() -> Self {
        ThreadRecorder {
            recorder: RefCell::new(Recorder::new(
                get_current_thread_id(),
                thread::current().name().map(str::to_owned),
            )),
        }
    }
}

impl Drop for ThreadRecorder {
    fn drop(&mut self) {
        if let Some(tree) = self.recorder.get_mut().take_tree() {
            #[cfg(feature = "logging")]
            logger::log_thread_event(tree.thread_id, Events::Exit);

            forest::submit(tree);
        }
    }
}

thread_local! {
    static RECORDER: ThreadRecorder = ThreadRecorder::new();
}

// Once the thread-local slot is gone (a lock used from another thread-local
// destructor) acquire and release are both skipped, so the path stays balanced.

pub(crate) fn on_acquire(id: LockId, name: Option<&LockName>) {
    let _ = RECORDER.try_with(|slot| slot.recorder.borrow_mut().record_acquire(id, name));
}

pub(crate) fn on_release(id: LockId) {
    let _ = RECORDER.try_with(|slot| slot.recorder.borrow_mut().record_release(id));
}

/// Locks the current thread holds, outermost first
///
/// A lock entered recursively appears once per entry.
pub fn held_locks() -> Vec<LockId> {
    RECORDER
        .try_with(|slot| slot.recorder.borrow().held().to_vec())
        .unwrap_or_default()
}

/// Hand the current thread's tree to the forest without waiting for it to exit
///
/// The main thread's thread-local storage is not reliably destroyed at process
/// exit, so its tree would otherwise never reach the forest. Later
/// acquisitions on this thread start a new tree.
///
/// Returns `false`, and hands nothing over, while the thread holds an
/// instrumented lock or when it has recorded nothing.
pub fn submit_current_thread() -> bool {
    RECORDER
        .try_with(|slot| {
            let mut recorder = slot.recorder.borrow_mut();
            if !recorder.held().is_empty() {
                return false;
            }
            match recorder.take_tree() {
                Some(tree) => {
                    drop(recorder);
                    #[cfg(feature = "logging")]
                    logger::log_thread_event(tree.thread_id, Events::Exit);
                    forest::submit(tree);
                    true
                }
                None => false,
            }
        })
        .unwrap_or(false)
}
