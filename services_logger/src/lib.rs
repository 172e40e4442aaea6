//! # Logger Service
//!
//! This crate implements structured logging for the simulator.
//!
//! ## Philosophy
//!
//! Logging is explicit and structured, not printf-style. Entries are built
//! as values and handed to a [`LogSink`]; the sink decides how a line looks.

use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Log level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Debug information
    Debug,
    /// Informational messages
    Info,
    /// Warnings
    Warn,
    /// Errors
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        };
        f.write_str(label)
    }
}

/// A structured log entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    /// Log level
    pub level: LogLevel,
    /// Source process name (if any)
    pub source: Option<String>,
    /// Log message
    pub message: String,
    /// Structured fields
    pub fields: Vec<(String, String)>,
}

impl LogEntry {
    /// Creates a new log entry
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            source: None,
            message: message.into(),
            fields: Vec::new(),
        }
    }

    /// Sets the source process
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Adds a field to the log entry
    pub fn with_field(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.fields.push((key.into(), value.to_string()));
        self
    }

    /// Looks up a field value by key
    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.level)?;
        if let Some(source) = &self.source {
            write!(f, " {}:", source)?;
        }
        write!(f, " {}", self.message)?;
        for (key, value) in &self.fields {
            write!(f, " {}={}", key, value)?;
        }
        Ok(())
    }
}

/// Destination for log entries
pub trait LogSink {
    fn log(&mut self, entry: LogEntry);
}

/// Writes one line per entry to standard output
#[derive(Debug, Clone)]
pub struct StdoutLogSink {
    min_level: LogLevel,
}

impl StdoutLogSink {
    pub fn new(min_level: LogLevel) -> Self {
        Self { min_level }
    }
}

impl Default for StdoutLogSink {
    fn default() -> Self {
        Self::new(LogLevel::Info)
    }
}

impl LogSink for StdoutLogSink {
    fn log(&mut self, entry: LogEntry) {
        if entry.level >= self.min_level {
            println!("{}", entry);
        }
    }
}

/// Keeps every entry in memory
///
/// Clones share the same buffer, so a test can hand one clone to the kernel
/// and inspect the other.
#[derive(Debug, Clone, Default)]
pub struct MemoryLogSink {
    entries: Rc<RefCell<Vec<LogEntry>>>,
}

impl MemoryLogSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of all recorded entries
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.borrow().clone()
    }

    /// Counts entries matching the predicate
    pub fn count<F>(&self, predicate: F) -> usize
    where
        F: Fn(&LogEntry) -> bool,
    {
        self.entries.borrow().iter().filter(|e| predicate(e)).count()
    }

    pub fn clear(&self) {
        self.entries.borrow_mut().clear();
    }
}

impl LogSink for MemoryLogSink {
    fn log(&mut self, entry: LogEntry) {
        self.entries.borrow_mut().push(entry);
    }
}

/// Discards everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NullLogSink;

impl LogSink for NullLogSink {
    fn log(&mut self, _entry: LogEntry) {}
}
