use locktree::{LockId, LockTree, PotentialDeadlock};
use std::thread;

/// Run `f` on a fresh thread and wait for it, so its tree reaches the forest
#[allow(dead_code)]
pub fn run_thread<F>(name: &str, f: F)
where
    F: FnOnce() + Send + 'static,
{
    thread::Builder::new()
        .name(name.to_string())
        .spawn(f)
        .expect("Failed to spawn test thread")
        .join()
        .expect("Test thread panicked");
}

/// The tree recorded by the thread with the given name
#[allow(dead_code)]
pub fn tree_of(name: &str) -> LockTree {
    locktree::forest()
        .trees()
        .iter()
        .find(|tree| tree.thread_name.as_deref() == Some(name))
        .cloned()
        .unwrap_or_else(|| panic!("No tree recorded for thread {name}"))
}

/// Check whether some reported sequence is the given cycle, in any rotation
///
/// `cycle` lists the distinct locks once, e.g. `[a, b]` for `a -> b -> a`.
#[allow(dead_code)]
pub fn reports_cycle(reports: &[PotentialDeadlock], cycle: &[LockId]) -> bool {
    reports.iter().any(|report| is_rotation(report.cycle(), cycle))
}

#[allow(dead_code)]
fn is_rotation(found: &[LockId], cycle: &[LockId]) -> bool {
    found.len() == cycle.len()
        && (0..cycle.len()).any(|shift| {
            cycle
                .iter()
                .cycle()
                .skip(shift)
                .take(cycle.len())
                .eq(found.iter())
        })
}
