//! Execution observer surface

use crate::errors::EngineError;
use crate::types::ExecutionStats;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity of a log entry handed to observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogLevel::Info => "info",
            LogLevel::Success => "success",
            LogLevel::Warning => "warning",
            LogLevel::Error => "error",
        };
        f.write_str(name)
    }
}

/// One human-readable trace line emitted during a run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
}

impl LogEntry {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            level,
            message: message.into(),
        }
    }
}

/// Callbacks the engine invokes inline while a workflow runs.
///
/// All methods run synchronously on the execution task; an observer that
/// blocks stalls the interpreter. Default implementations drop the event, so
/// implementors override only what they consume.
pub trait ExecutionObserver: Send + Sync {
    /// Statistics changed: a step started or finished, a loop advanced.
    fn on_progress(&self, _stats: &ExecutionStats) {}

    /// A trace line was emitted.
    fn on_log(&self, _entry: &LogEntry) {}

    /// The run finished with no unhandled error.
    fn on_complete(&self, _stats: &ExecutionStats) {}

    /// The run ended with an unhandled error (including cancellation).
    fn on_error(&self, _error: &EngineError) {}
}

/// Observer that ignores every event.
pub struct NullObserver;

impl ExecutionObserver for NullObserver {}
