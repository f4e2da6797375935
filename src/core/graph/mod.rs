//! Graph module for deadlock detection
//!
//! This module contains the cross-thread view of the recorded lock orders:
//! - Lock order graph: the union of every "acquired while held" edge seen in any thread
//! - Cycle search: walks the lock order graph for orderings that could deadlock

mod cycles;
pub(crate) mod lock_order_graph;

pub use lock_order_graph::LockOrderGraph;
