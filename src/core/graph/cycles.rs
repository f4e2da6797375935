//! Cycle search over the lock order graph
//!
//! A depth-first search is started from every lock. Whenever a successor is
//! already on the current path, the path plus that successor is reported as a
//! potential deadlock. Searches are independent of each other, so a cycle of
//! k locks is reported once from each of its k members, rotated, and a cycle
//! reachable from a lock outside it is also reported with that lead-in.

use super::LockOrderGraph;
use crate::core::types::PotentialDeadlock;

impl LockOrderGraph {
    /// Find every lock ordering cycle reachable from every lock
    ///
    /// # Returns
    /// The reported sequences in search order; empty if the graph is acyclic.
    /// The result is a multiset of candidate orderings, not a minimal cycle set.
    pub fn potential_deadlocks(&self) -> Vec<PotentialDeadlock> {
        let mut found = Vec::new();
        for start in 0..self.nodes.len() {
            self.search_from(start, &mut found);
        }
        found
    }

    /// Check if any lock ordering cycle exists
    pub fn has_cycle(&self) -> bool {
        let mut found = Vec::new();
        for start in 0..self.nodes.len() {
            self.search_from(start, &mut found);
            if !found.is_empty() {
                return true;
            }
        }
        false
    }

    fn search_from(&self, start: usize, found: &mut Vec<PotentialDeadlock>) {
        // Each frame is (arena slot, index of the next successor to visit);
        // the frames double as the current path.
        let mut frames: Vec<(usize, usize)> = vec![(start, 0)];

        while let Some(frame) = frames.last_mut() {
            let Some(&next) = self.nodes[frame.0].successors.get(frame.1) else {
                frames.pop();
                continue;
            };
            frame.1 += 1;

            if frames.iter().any(|&(slot, _)| slot == next) {
                let mut locks: Vec<_> = frames.iter().map(|&(slot, _)| self.nodes[slot].id).collect();
                locks.push(self.nodes[next].id);
                found.push(PotentialDeadlock { locks });
            } else {
                frames.push((next, 0));
            }
        }
    }
}
