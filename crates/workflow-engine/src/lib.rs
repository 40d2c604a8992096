//! Pageflow workflow execution engine.
//!
//! A cooperative, pausable interpreter over step programs: ordered sequences
//! of click/input/wait/smart-wait steps, loops over matched element sets, and
//! nested per-parent sub-operation sequences, replayed against a DOM through
//! the injectable [`dom_adapter::DomBridge`] capability surface.
//!
//! One workflow runs per engine at a time; `pause`/`resume`/`stop` are
//! honored at every suspension point, and an observer receives progress, log,
//! completion, and error callbacks inline.

pub mod config;
mod control;
pub mod engine;
pub mod errors;
pub mod events;
mod executor;
pub mod handlers;
pub mod types;

pub use config::EngineConfig;
pub use engine::WorkflowEngine;
pub use errors::EngineError;
pub use events::{ExecutionObserver, LogEntry, LogLevel, NullObserver};
pub use handlers::{CustomHandler, HandlerContext, HandlerRegistry};
pub use types::{
    AutoLoopOp, ElementAction, ErrorHandling, ExecutionStats, LoopMode, LoopStep, LoopType, Step,
    StepKind, SubOperation, SubOperationKind, Workflow,
};
