use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Thread identifier type
///
/// Uniquely identifies a thread in the application.
pub type ThreadId = usize;

// Global counter for assigning unique thread IDs
static THREAD_ID_COUNTER: AtomicUsize = AtomicUsize::new(1);

// Thread-local storage for each thread's assigned ID
thread_local! {
    static THREAD_ID: ThreadId = {
        // Each thread gets a unique ID once, when this is first accessed
        THREAD_ID_COUNTER.fetch_add(1, Ordering::SeqCst)
    };
}

/// Get a unique identifier of the current thread
/// This will always return the same ID for the lifetime of the thread
pub fn get_current_thread_id() -> ThreadId {
    THREAD_ID.with(|&id| id)
}

/// Lock identifier type
///
/// Uniquely identifies a mutex in the application. Each [`Mutex`](crate::Mutex)
/// is assigned a unique ID when created, starting at 1.
pub type LockId = usize;

/// Display name attached to a lock at construction
pub type LockName = Arc<str>;

/// Represents the type of thread/lock event that occurred
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Events {
    /// A new lock was created
    Created,
    /// The thread handed its lock tree over to the forest
    Exit,
    /// Thread successfully acquired a lock
    Acquired,
    /// Thread released a lock
    Released,
}

/// One entry of the id to name mapping gathered from the forest
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LockLabel {
    /// Lock the name belongs to
    pub id: LockId,
    /// Name given to the lock at construction
    pub name: LockName,
}

/// A lock-order cycle found in the merged graph
///
/// The sequence starts at the node the search started from, follows observed
/// "acquired while held" edges and ends with the lock that closes the cycle,
/// so `[1, 2, 1]` means lock 2 was taken while holding 1 somewhere and lock 1
/// was taken while holding 2 somewhere else.
///
/// This is a necessary but not sufficient condition for a deadlock: the graph
/// forgets which thread contributed which edge and when.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct PotentialDeadlock {
    /// Lock ids along the cycle, first and last occurrence of the repeated lock included
    pub locks: Vec<LockId>,
}

impl PotentialDeadlock {
    /// The distinct locks taking part in the cycle, starting at the repeated one
    pub fn cycle(&self) -> &[LockId] {
        match self.locks.last() {
            Some(closing) => {
                let start = self.locks.iter().position(|id| id == closing).unwrap_or(0);
                &self.locks[start..self.locks.len() - 1]
            }
            None => &[],
        }
    }
}

impl fmt::Display for PotentialDeadlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for id in &self.locks {
            if !first {
                f.write_str(" -> ")?;
            }
            write!(f, "{id}")?;
            first = false;
        }
        Ok(())
    }
}
