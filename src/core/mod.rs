// Core types
pub mod types;
pub use types::*;

// Event log
#[cfg(feature = "logging")]
pub mod logger;

// Per-thread trees and their recorder
pub mod recorder;
pub mod tree;

// Shared forest and the analyses over it
pub mod forest;
pub mod graph;
pub mod prune;
pub mod report;

// Instrumented locks
pub mod locks;

use anyhow::Result;
#[cfg(feature = "logging")]
use anyhow::Context;

/// Locktree configuration struct
///
/// Starting is optional: without it, recording is still active in debug
/// builds, reports are pruned and nothing is logged.
pub struct Locktree {
    #[cfg(feature = "logging")]
    log_path: Option<String>,
    prune_reports: bool,
}

impl Default for Locktree {
    fn default() -> Self {
        Self::new()
    }
}

impl Locktree {
    /// Create a new Locktree with default settings
    ///
    /// By default:
    /// - Logging is disabled
    /// - Reports prune self-nested repeats before analysis
    pub fn new() -> Self {
        Locktree {
            #[cfg(feature = "logging")]
            log_path: None,
            prune_reports: true,
        }
    }

    /// Activate the event log and set the path for the log file
    ///
    /// # Arguments
    /// * `path` - Path to the log file. If the path contains "{timestamp}",
    ///   it will be replaced with the current timestamp.
    ///
    /// # Returns
    /// The builder for method chaining
    #[cfg(feature = "logging")]
    pub fn with_log<P: AsRef<std::path::Path>>(mut self, path: P) -> Self {
        self.log_path = Some(path.as_ref().to_string_lossy().into_owned());
        self
    }

    /// Choose whether [`report`](crate::report) prunes the forest first
    ///
    /// # Returns
    /// The builder for method chaining
    pub fn prune_reports(mut self, enabled: bool) -> Self {
        self.prune_reports = enabled;
        self
    }

    /// Apply the configuration
    ///
    /// # Errors
    /// Returns an error if logger initialization fails or a logger was
    /// already installed by an earlier start.
    pub fn start(self) -> Result<()> {
        #[cfg(feature = "logging")]
        if let Some(log_path) = self.log_path {
            logger::init_logger(log_path).context("Failed to initialize logger")?;
        }

        forest::set_prune_reports(self.prune_reports);

        if !recorder::ENABLED {
            eprintln!("locktree: lock order recording is disabled in this build");
        }

        // Print header
        println!("{}", crate::BANNER);

        Ok(())
    }
}
