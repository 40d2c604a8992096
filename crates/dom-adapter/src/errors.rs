//! Error types for DOM backends

use thiserror::Error;

/// Errors surfaced by [`crate::DomBridge`] implementations.
#[derive(Debug, Error, Clone)]
pub enum DomError {
    /// A locator matched no element where exactly one was required
    #[error("no element matched {strategy}={value}")]
    NotFound { strategy: String, value: String },

    /// The backend cannot evaluate this locator strategy
    #[error("strategy {strategy} not supported: {reason}")]
    UnsupportedStrategy { strategy: String, reason: String },

    /// The locator value could not be parsed
    #[error("invalid selector '{0}'")]
    InvalidSelector(String),

    /// The element handle no longer refers to a live node
    #[error("stale element handle: {0}")]
    Stale(String),

    /// Backend-specific failure
    #[error("backend error: {0}")]
    Backend(String),
}

impl DomError {
    /// Build a `NotFound` naming the failed locator.
    pub fn not_found(locator: &crate::Locator) -> Self {
        DomError::NotFound {
            strategy: locator.strategy.name().to_string(),
            value: locator.value.clone(),
        }
    }

    /// Whether this error means "nothing matched" as opposed to a broken call.
    pub fn is_not_found(&self) -> bool {
        matches!(self, DomError::NotFound { .. })
    }
}
