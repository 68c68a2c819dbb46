// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Injected logging capability.
//!
//! Components receive a [`SharedLogger`] at construction instead of reaching
//! for a process-wide logger. The default [`TracingLogger`] forwards to the
//! `tracing` macros, so a subscriber installed by the host process sees every
//! line. [`MemoryLogger`] keeps lines in memory, which is what an agent-side
//! log forwarder (or a test) wants.
//!
//! Implementations must be callable from any thread: the cloud client's
//! worker threads log through the same instance as the loop thread.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Severity of a log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Per-write chatter.
    Debug,
    /// Lifecycle events.
    #[default]
    Info,
    /// Recoverable problems.
    Warn,
    /// Failures.
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        };
        f.write_str(name)
    }
}

/// A sink for log lines.
pub trait Logger: Send + Sync {
    /// Records one line at the given level.
    fn log(&self, level: LogLevel, message: &str);
}

/// Reference-counted logger handle passed down to components.
pub type SharedLogger = Arc<dyn Logger>;

/// Forwards log lines to `tracing`, dropping those below a minimum level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger {
    min_level: LogLevel,
}

impl TracingLogger {
    /// Creates a logger that forwards lines at `min_level` and above.
    #[must_use]
    pub fn new(min_level: LogLevel) -> Self {
        Self { min_level }
    }

    /// Returns the minimum forwarded level.
    #[must_use]
    pub fn min_level(&self) -> LogLevel {
        self.min_level
    }
}

impl Logger for TracingLogger {
    fn log(&self, level: LogLevel, message: &str) {
        if level < self.min_level {
            return;
        }
        match level {
            LogLevel::Debug => tracing::debug!(target: "enebular_connector", "{message}"),
            LogLevel::Info => tracing::info!(target: "enebular_connector", "{message}"),
            LogLevel::Warn => tracing::warn!(target: "enebular_connector", "{message}"),
            LogLevel::Error => tracing::error!(target: "enebular_connector", "{message}"),
        }
    }
}

/// A recorded log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    /// Severity.
    pub level: LogLevel,
    /// The formatted message.
    pub message: String,
}

/// Keeps every log line in memory.
#[derive(Debug, Default)]
pub struct MemoryLogger {
    records: Mutex<Vec<LogRecord>>,
}

impl MemoryLogger {
    /// Creates an empty logger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of all recorded lines.
    #[must_use]
    pub fn records(&self) -> Vec<LogRecord> {
        self.records.lock().clone()
    }

    /// Removes and returns all recorded lines.
    pub fn take(&self) -> Vec<LogRecord> {
        std::mem::take(&mut *self.records.lock())
    }

    /// Returns `true` if any line at `level` contains `needle`.
    #[must_use]
    pub fn contains(&self, level: LogLevel, needle: &str) -> bool {
        self.records
            .lock()
            .iter()
            .any(|r| r.level == level && r.message.contains(needle))
    }
}

impl Logger for MemoryLogger {
    fn log(&self, level: LogLevel, message: &str) {
        self.records.lock().push(LogRecord {
            level,
            message: message.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_are_ordered() {
        assert!(LogLevel::Debug < LogLevel::Info);
        assert!(LogLevel::Info < LogLevel::Warn);
        assert!(LogLevel::Warn < LogLevel::Error);
    }

    #[test]
    fn level_deserializes_lowercase() {
        let level: LogLevel = serde_json::from_str("\"error\"").unwrap();
        assert_eq!(level, LogLevel::Error);
        assert_eq!(level.to_string(), "error");
    }

    #[test]
    fn memory_logger_records_in_order() {
        let logger = MemoryLogger::new();
        logger.log(LogLevel::Info, "first");
        logger.log(LogLevel::Error, "second");

        let records = logger.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].message, "first");
        assert_eq!(records[1].level, LogLevel::Error);

        assert!(logger.contains(LogLevel::Error, "sec"));
        assert!(!logger.contains(LogLevel::Info, "sec"));
    }

    #[test]
    fn memory_logger_take_clears() {
        let logger = MemoryLogger::new();
        logger.log(LogLevel::Debug, "line");
        assert_eq!(logger.take().len(), 1);
        assert!(logger.records().is_empty());
    }

    #[test]
    fn tracing_logger_keeps_min_level() {
        let logger = TracingLogger::new(LogLevel::Warn);
        assert_eq!(logger.min_level(), LogLevel::Warn);
        // Lines below the minimum are dropped without reaching tracing.
        logger.log(LogLevel::Debug, "ignored");
    }
}
