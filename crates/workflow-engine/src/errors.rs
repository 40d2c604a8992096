//! Engine error types

use dom_adapter::DomError;
use thiserror::Error;

/// Errors raised while executing a workflow.
#[derive(Debug, Error, Clone)]
pub enum EngineError {
    /// DOM resolution or mutation failed
    #[error(transparent)]
    Dom(#[from] DomError),

    /// A smart wait timed out before its locator resolved
    #[error("'{description}' not satisfied within {timeout_ms}ms")]
    Timeout { description: String, timeout_ms: u64 },

    /// The run was stopped externally; unwinds to the top-level executor
    #[error("execution cancelled")]
    Cancelled,

    /// `execute` called while a workflow is in flight
    #[error("a workflow is already running on this engine")]
    AlreadyRunning,

    /// An action type outside what the operation supports
    #[error("unsupported action type '{0}'")]
    UnsupportedActionType(String),

    /// A custom step named a handler nobody registered
    #[error("no custom handler registered under '{0}'")]
    UnknownHandler(String),

    /// Structural validation failed before execution
    #[error("invalid workflow: {0}")]
    InvalidWorkflow(String),

    /// A custom handler reported failure
    #[error("custom handler failed: {0}")]
    Handler(String),
}

impl EngineError {
    /// Cancellation bypasses every per-step error-handling policy.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, EngineError::Cancelled)
    }
}
