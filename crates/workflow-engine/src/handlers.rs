//! Custom step handlers
//!
//! A `custom` step carries a handler *name*; the engine resolves it against a
//! registry of trait objects populated by the embedding application. Raw
//! callables cannot ride in workflow JSON.

use crate::errors::EngineError;
use crate::types::ExecutionStats;
use async_trait::async_trait;
use dom_adapter::DomBridge;
use std::collections::HashMap;
use std::sync::Arc;

/// Context handed to a custom handler for the duration of its step.
pub struct HandlerContext {
    /// The DOM surface the run executes against
    pub dom: Arc<dyn DomBridge>,

    /// Snapshot of run statistics at step start
    pub stats: ExecutionStats,
}

/// A named, application-provided step implementation.
#[async_trait]
pub trait CustomHandler: Send + Sync {
    async fn run(&self, ctx: &HandlerContext) -> Result<(), EngineError>;
}

/// Name-to-handler registry consulted by `custom` steps.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn CustomHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under a name, replacing any previous entry.
    pub fn register(&mut self, name: impl Into<String>, handler: Arc<dyn CustomHandler>) {
        self.handlers.insert(name.into(), handler);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn CustomHandler>> {
        self.handlers.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }
}
