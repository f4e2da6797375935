//! Event log of lock and thread activity
//!
//! When enabled, every lock creation, acquisition and release, and every
//! thread tree hand-off, is written as one JSON object per line. Writes happen
//! on a background thread fed through a channel, so logging never blocks the
//! instrumented lock path.
//!
//! The log is a trace of the current run only; nothing reads it back.

use crate::core::types::{Events, LockId, LockName, ThreadId};
use anyhow::{Context, Result, anyhow};
use chrono::Utc;
use crossbeam_channel::{Receiver, Sender, unbounded};
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::thread;
use std::time::Duration;

const FLUSH_TIMEOUT: Duration = Duration::from_secs(10);

/// Structure for a single log entry
#[derive(Debug, Serialize, Clone)]
pub struct LogEntry {
    /// Thread that performed the action (0 for lock-only events)
    pub thread_id: ThreadId,
    /// Lock that was involved (0 for thread-only events)
    pub lock_id: LockId,
    /// Type of event that occurred
    pub event: Events,
    /// Absolute timestamp of when the event occurred (seconds since Unix Epoch)
    pub timestamp: f64,
    /// Lock name, for lock creation events
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<LockName>,
}

/// Commands for controlling the writer thread
#[derive(Debug)]
pub enum LoggerCommand {
    /// Write a log entry to the file
    LogEntry(LogEntry),
    /// Flush all pending entries to disk and signal completion
    Flush(Sender<()>),
}

/// Event logger writing JSON lines from a background thread
pub struct EventLogger {
    sender: Sender<LoggerCommand>,
    path: PathBuf,
}

impl Drop for EventLogger {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            eprintln!("Warning: Failed to flush logs during EventLogger drop: {e:?}");
        }
    }
}

impl EventLogger {
    /// Create a new logger that writes to the specified file
    ///
    /// # Arguments
    /// * `path` - Path to the log file. If the path contains "{timestamp}",
    ///   it will be replaced with the current timestamp.
    ///
    /// # Errors
    /// Returns an error if the parent directory cannot be created, the file
    /// cannot be opened or the writer thread cannot be spawned.
    pub fn with_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = expand_timestamp(path.as_ref());

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create log directory {}", parent.display()))?;
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&path)
            .with_context(|| format!("Failed to open log file {}", path.display()))?;

        let (tx, rx) = unbounded::<LoggerCommand>();
        thread::Builder::new()
            .name("locktree-logger".to_string())
            .spawn(move || writer_thread(file, rx))
            .context("Failed to spawn logger thread")?;

        Ok(EventLogger { sender: tx, path })
    }

    /// Path of the file this logger writes to
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Queue an event for writing
    pub fn log_event(
        &self,
        thread_id: ThreadId,
        lock_id: LockId,
        event: Events,
        name: Option<LockName>,
    ) {
        let now = Utc::now();
        let timestamp = now.timestamp() as f64 + now.timestamp_subsec_micros() as f64 / 1_000_000.0;

        let entry = LogEntry {
            thread_id,
            lock_id,
            event,
            timestamp,
            name,
        };

        if let Err(e) = self.sender.send(LoggerCommand::LogEntry(entry)) {
            eprintln!("Failed to send log entry: {e:?}");
        }
    }

    /// Block until every queued entry is on disk
    ///
    /// # Errors
    /// Returns an error if the writer thread is gone or does not answer in time.
    pub fn flush(&self) -> Result<()> {
        let (done_tx, done_rx) = crossbeam_channel::bounded(1);
        self.sender
            .send(LoggerCommand::Flush(done_tx))
            .map_err(|_| anyhow!("Logger thread has stopped"))?;
        done_rx
            .recv_timeout(FLUSH_TIMEOUT)
            .map_err(|_| anyhow!("Flush operation timed out"))
    }
}

#[allow(clippy::literal_string_with_formatting_args)]
fn expand_timestamp(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    if raw.contains("{timestamp}") {
        let timestamp = Utc::now().format("%Y%m%d_%H%M%S").to_string();
        PathBuf::from(raw.replace("{timestamp}", &timestamp))
    } else {
        path.to_path_buf()
    }
}

fn writer_thread(file: File, rx: Receiver<LoggerCommand>) {
    let mut writer = BufWriter::new(file);

    while let Ok(cmd) = rx.recv() {
        match cmd {
            LoggerCommand::LogEntry(entry) => {
                if let Ok(json) = serde_json::to_string(&entry)
                    && let Err(e) = writeln!(writer, "{json}")
                {
                    eprintln!("Logger write error: {e:?}");
                }
            }
            LoggerCommand::Flush(responder) => {
                if let Err(e) = writer.flush() {
                    eprintln!("Logger flush error: {e:?}");
                }
                let _ = responder.send(());
            }
        }
    }

    if let Err(e) = writer.flush() {
        eprintln!("Logger final flush error: {e:?}");
    }
}

// Global logger, set at most once by `Locktree::start`
static GLOBAL_LOGGER: OnceLock<EventLogger> = OnceLock::new();

/// Install the global logger
///
/// # Errors
/// Returns an error if the file cannot be set up or a logger is already installed.
pub(crate) fn init_logger<P: AsRef<Path>>(path: P) -> Result<()> {
    if GLOBAL_LOGGER.get().is_some() {
        anyhow::bail!("Logger is already initialized");
    }
    let logger = EventLogger::with_file(path)?;
    GLOBAL_LOGGER
        .set(logger)
        .map_err(|_| anyhow!("Logger is already initialized"))
}

/// Check if the global logger is enabled
pub fn is_logging_enabled() -> bool {
    GLOBAL_LOGGER.get().is_some()
}

/// Path of the active log file, if logging is enabled
pub fn current_log_file() -> Option<PathBuf> {
    GLOBAL_LOGGER.get().map(|logger| logger.path().to_path_buf())
}

/// Flush the global logger, if one is installed
pub fn flush_logs() -> Result<()> {
    match GLOBAL_LOGGER.get() {
        Some(logger) => logger.flush(),
        None => Ok(()),
    }
}

pub(crate) fn log_lock_event(lock_id: LockId, name: Option<&LockName>) {
    if let Some(logger) = GLOBAL_LOGGER.get() {
        logger.log_event(0, lock_id, Events::Created, name.cloned());
    }
}

pub(crate) fn log_interaction_event(thread_id: ThreadId, lock_id: LockId, event: Events) {
    if let Some(logger) = GLOBAL_LOGGER.get() {
        logger.log_event(thread_id, lock_id, event, None);
    }
}

pub(crate) fn log_thread_event(thread_id: ThreadId, event: Events) {
    if let Some(logger) = GLOBAL_LOGGER.get() {
        logger.log_event(thread_id, 0, event, None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_basic_logging() {
        let temp_dir = TempDir::new().unwrap();
        let log_path = temp_dir.path().join("basic.log");

        let logger = EventLogger::with_file(&log_path).unwrap();
        logger.log_event(0, 10, Events::Created, Some(LockName::from("db")));
        logger.log_event(1, 10, Events::Acquired, None);
        logger.log_event(1, 10, Events::Released, None);
        logger.log_event(1, 0, Events::Exit, None);
        logger.flush().unwrap();

        let contents = std::fs::read_to_string(&log_path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 4);

        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["event"], "Created");
        assert_eq!(first["name"], "db");
        let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["thread_id"], 1);
        assert!(second.get("name").is_none());
    }

    #[test]
    fn test_flush_idempotence() {
        let temp_dir = TempDir::new().unwrap();
        let log_path = temp_dir.path().join("flush_test.log");

        let logger = EventLogger::with_file(&log_path).unwrap();
        for i in 0..10 {
            logger.log_event(i, 1, Events::Acquired, None);
        }

        logger.flush().unwrap();
        logger.flush().unwrap();

        let contents = std::fs::read_to_string(&log_path).unwrap();
        assert_eq!(contents.lines().count(), 10);
    }

    #[test]
    fn test_creates_directories_and_expands_timestamp() {
        let temp_dir = TempDir::new().unwrap();
        let log_path = temp_dir.path().join("nested/dir/run_{timestamp}.log");

        let logger = EventLogger::with_file(&log_path).unwrap();
        let actual = logger.path().to_path_buf();
        assert!(!actual.to_string_lossy().contains("{timestamp}"));
        assert!(actual.exists());
        assert!(actual.starts_with(temp_dir.path().join("nested/dir")));
    }

    #[test]
    fn test_logger_drop_flushes() {
        let temp_dir = TempDir::new().unwrap();
        let log_path = temp_dir.path().join("drop_test.log");

        {
            let logger = EventLogger::with_file(&log_path).unwrap();
            logger.log_event(1, 2, Events::Acquired, None);
        }

        let contents = std::fs::read_to_string(&log_path).unwrap();
        assert!(contents.contains("\"lock_id\":2"));
    }
}
