//! Human-readable and JSON reports over the forest
//!
//! Trees are rendered one block per thread. A lock is followed by ` -> ` and
//! its first child on the same line; the other children start new lines
//! indented to the column of that first child:
//!
//! ```text
//! Thread 1
//! 1 -> 2
//!      3 -> 4
//! 5
//! ```

use crate::core::forest::Forest;
use crate::core::tree::{LockTree, TreeNode};
use crate::core::types::{LockLabel, PotentialDeadlock};
use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use std::fmt::{self, Write};

/// Snapshot of everything the analysis knows
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    /// RFC 3339 time the report was built
    pub generated_at: String,
    /// Per-thread trees in hand-off order
    pub threads: Vec<LockTree>,
    /// Named locks, first seen first
    pub lock_names: Vec<LockLabel>,
    /// Lock ordering cycles found in the merged graph
    pub potential_deadlocks: Vec<PotentialDeadlock>,
}

impl Report {
    pub fn from_forest(forest: &Forest) -> Self {
        Report {
            generated_at: Utc::now().to_rfc3339(),
            threads: forest.trees().to_vec(),
            lock_names: forest.lock_names(),
            potential_deadlocks: forest.potential_deadlocks(),
        }
    }

    pub fn has_potential_deadlocks(&self) -> bool {
        !self.potential_deadlocks.is_empty()
    }

    /// Serialize the report as pretty-printed JSON
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize lock order report")
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Threads")?;
        f.write_str(&render_trees(&self.threads))?;
        writeln!(f, "Lock Names")?;
        f.write_str(&render_lock_names(&self.lock_names))?;
        writeln!(f)?;
        writeln!(f, "Potential Deadlocks")?;
        f.write_str(&render_potential_deadlocks(&self.potential_deadlocks))
    }
}

/// Render every tree, numbering threads in forest order
pub fn render_trees(trees: &[LockTree]) -> String {
    let mut out = String::new();
    for (number, tree) in trees.iter().enumerate() {
        match &tree.thread_name {
            Some(name) => {
                let _ = writeln!(out, "Thread {} ({name})", number + 1);
            }
            None => {
                let _ = writeln!(out, "Thread {}", number + 1);
            }
        }
        for node in &tree.children {
            render_node(node, "", true, &mut out);
        }
        out.push('\n');
    }
    out
}

fn render_node(node: &TreeNode, indent: &str, first: bool, out: &mut String) {
    if !first {
        out.push_str(indent);
    }
    let label = node.id.to_string();
    out.push_str(&label);
    if node.children.is_empty() {
        out.push('\n');
        return;
    }
    out.push_str(" -> ");

    let child_indent = format!("{indent}{}", " ".repeat(label.len() + 4));
    for (i, child) in node.children.iter().enumerate() {
        render_node(child, &child_indent, i == 0, out);
    }
}

/// One `id name` line per named lock
pub fn render_lock_names(labels: &[LockLabel]) -> String {
    let mut out = String::new();
    for label in labels {
        let _ = writeln!(out, "{} {}", label.id, label.name);
    }
    out
}

/// One line per reported sequence
pub fn render_potential_deadlocks(deadlocks: &[PotentialDeadlock]) -> String {
    let mut out = String::new();
    for deadlock in deadlocks {
        let _ = writeln!(out, "{deadlock}");
    }
    out
}
