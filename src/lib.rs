//! # Locktree
//!
//! A lock-order recorder for reentrant mutexes that reports potential deadlocks.
//!
//! Every [`Mutex`] acquisition is recorded in a per-thread tree that mirrors how
//! locks were nested. When a thread exits its tree joins a global forest. On
//! demand, the forest is merged into one lock-order graph and searched for
//! cycles: places where two threads took the same locks in opposite order and
//! could deadlock under a different interleaving.
//!
//! ## Features
//!
//! - Per-thread recording without shared state on the lock path
//! - Pruning of self-nested reentrant acquisitions
//! - Cycle search over the merged lock-order graph
//! - Text and JSON reports
//! - Optional JSON-lines event log (`logging` feature)
//!
//! Recording is active in debug builds, or in any build with the
//! `release-instrumentation` feature. It never blocks, denies or reorders a
//! lock request, and a reported cycle is a candidate, not a proven bug.
//!
//! ```rust
//! use locktree::Mutex;
//! use std::sync::Arc;
//! use std::thread;
//!
//! let a = Arc::new(Mutex::with_name((), "a"));
//! let b = Arc::new(Mutex::with_name((), "b"));
//!
//! let (a1, b1) = (Arc::clone(&a), Arc::clone(&b));
//! thread::spawn(move || {
//!     let _a = a1.lock();
//!     let _b = b1.lock();
//! })
//! .join()
//! .unwrap();
//!
//! let (a2, b2) = (Arc::clone(&a), Arc::clone(&b));
//! thread::spawn(move || {
//!     let _b = b2.lock();
//!     let _a = a2.lock();
//! })
//! .join()
//! .unwrap();
//!
//! # if cfg!(debug_assertions) {
//! let report = locktree::report();
//! assert!(report.has_potential_deadlocks());
//! println!("{report}");
//! # }
//! ```

mod core;
pub use crate::core::{
    Locktree,
    forest::{Forest, forest, lock_names, potential_deadlocks, prune_forest, report},
    graph::LockOrderGraph,
    locks::mutex::{Mutex, MutexGuard},
    prune::prune_tree,
    recorder::{held_locks, submit_current_thread},
    report::{Report, render_lock_names, render_potential_deadlocks, render_trees},
    tree::{LockTree, TreeNode},
    types::{LockId, LockLabel, LockName, PotentialDeadlock, ThreadId},
};

#[cfg(feature = "logging")]
pub use crate::core::logger::{current_log_file, flush_logs, is_logging_enabled};

const BANNER: &str = r#"
  locktree: recording lock order, reporting potential deadlocks
"#;
