//! Engine facade: run lifecycle, control calls, observer plumbing

use crate::config::EngineConfig;
use crate::control::Controls;
use crate::errors::EngineError;
use crate::events::{ExecutionObserver, LogEntry, LogLevel, NullObserver};
use crate::handlers::{CustomHandler, HandlerRegistry};
use crate::types::{ExecutionStats, Step, StepKind, Workflow};
use chrono::Utc;
use dom_adapter::DomBridge;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Cooperative workflow interpreter.
///
/// One workflow runs at a time per engine; a second [`execute`] while busy
/// fails with [`EngineError::AlreadyRunning`] and leaves the running workflow
/// untouched. `pause`, `resume`, and `stop` are synchronous and may be called
/// from any task.
pub struct WorkflowEngine {
    pub(crate) dom: Arc<dyn DomBridge>,
    pub(crate) observer: Arc<dyn ExecutionObserver>,
    pub(crate) handlers: HandlerRegistry,
    pub(crate) config: EngineConfig,
    pub(crate) controls: Controls,
    stats: Mutex<ExecutionStats>,
}

impl WorkflowEngine {
    pub fn new(dom: Arc<dyn DomBridge>) -> Self {
        Self {
            dom,
            observer: Arc::new(NullObserver),
            handlers: HandlerRegistry::new(),
            config: EngineConfig::default(),
            controls: Controls::new(),
            stats: Mutex::new(ExecutionStats::default()),
        }
    }

    /// Set the observer receiving progress/log/completion/error callbacks.
    pub fn with_observer(mut self, observer: Arc<dyn ExecutionObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Override the default configuration.
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Register a custom-step handler under a name.
    pub fn with_handler(
        mut self,
        name: impl Into<String>,
        handler: Arc<dyn CustomHandler>,
    ) -> Self {
        self.handlers.register(name, handler);
        self
    }

    /// Register a custom-step handler on an existing engine.
    pub fn register_handler(&mut self, name: impl Into<String>, handler: Arc<dyn CustomHandler>) {
        self.handlers.register(name, handler);
    }

    pub fn is_running(&self) -> bool {
        self.controls.is_running()
    }

    pub fn is_paused(&self) -> bool {
        self.controls.is_paused()
    }

    /// Close the pause gate. No-op unless a run is active and not paused.
    pub fn pause(&self) {
        if self.controls.pause() {
            self.log(LogLevel::Warning, "execution paused");
        }
    }

    /// Open the pause gate, releasing the run at its suspension point.
    pub fn resume(&self) {
        if self.controls.resume() {
            self.log(LogLevel::Info, "execution resumed");
        }
    }

    /// Request a stop. The run unwinds at its next suspension point and the
    /// observer receives the cancellation through `on_error`.
    pub fn stop(&self) {
        if self.controls.stop() {
            self.log(LogLevel::Warning, "stop requested");
        }
    }

    /// Snapshot of the current run statistics.
    pub fn stats(&self) -> ExecutionStats {
        self.stats.lock().clone()
    }

    /// Structural pre-flight: rejects empty programs, incoherent loop
    /// configurations, and custom steps naming unregistered handlers.
    pub fn validate(&self, workflow: &Workflow) -> Result<(), EngineError> {
        if workflow.steps.is_empty() {
            return Err(EngineError::InvalidWorkflow(format!(
                "workflow '{}' has no steps",
                workflow.name
            )));
        }
        for step in &workflow.steps {
            match &step.kind {
                StepKind::Loop(loop_step) => {
                    loop_step.mode()?;
                }
                StepKind::Custom { handler } => {
                    if !self.handlers.contains(handler) {
                        return Err(EngineError::UnknownHandler(handler.clone()));
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Execute a workflow to completion.
    ///
    /// The observer sees `on_complete` or `on_error` before this returns, and
    /// a final `on_progress` fires on every exit path after the engine state
    /// is reset.
    pub async fn execute(&self, workflow: &Workflow) -> Result<ExecutionStats, EngineError> {
        self.controls.begin()?;

        let result = self.run(workflow).await;

        {
            let mut stats = self.stats.lock();
            stats.finished_at = Some(Utc::now());
            stats.current_operation = match &result {
                Ok(()) => "completed".to_string(),
                Err(err) => format!("failed: {err}"),
            };
        }

        match &result {
            Ok(()) => {
                let stats = self.stats();
                info!(
                    workflow = %workflow.name,
                    success = stats.success_count,
                    errors = stats.error_count,
                    "workflow completed"
                );
                self.log(
                    LogLevel::Success,
                    format!("workflow '{}' completed", workflow.name),
                );
                self.observer.on_complete(&stats);
            }
            Err(err) => {
                warn!(workflow = %workflow.name, error = %err, "workflow ended with error");
                self.log(
                    LogLevel::Error,
                    format!("workflow '{}' ended: {err}", workflow.name),
                );
                self.observer.on_error(err);
            }
        }

        // Every exit path releases the engine, then reports final state.
        self.controls.end();
        self.observer.on_progress(&self.stats());

        result.map(|()| self.stats())
    }

    /// Run a single step as a one-step workflow.
    pub async fn perform_action(&self, step: Step) -> Result<ExecutionStats, EngineError> {
        let name = format!("single {}", step.kind.label());
        let workflow = Workflow {
            name,
            steps: vec![step],
        };
        self.execute(&workflow).await
    }

    async fn run(&self, workflow: &Workflow) -> Result<(), EngineError> {
        self.validate(workflow)?;

        {
            let mut stats = self.stats.lock();
            stats.reset(Uuid::new_v4().to_string());
            stats.started_at = Some(Utc::now());
            stats.total_steps = workflow.estimated_total_steps();
            stats.current_operation = format!("running '{}'", workflow.name);
        }
        info!(workflow = %workflow.name, steps = workflow.steps.len(), "workflow started");
        self.emit_progress();
        self.log(
            LogLevel::Info,
            format!(
                "workflow '{}' started with {} steps",
                workflow.name,
                workflow.steps.len()
            ),
        );

        self.execute_steps(&workflow.steps).await
    }

    pub(crate) fn update_stats(&self, update: impl FnOnce(&mut ExecutionStats)) {
        update(&mut self.stats.lock());
    }

    pub(crate) fn emit_progress(&self) {
        self.observer.on_progress(&self.stats());
    }

    pub(crate) fn log(&self, level: LogLevel, message: impl Into<String>) {
        let entry = LogEntry::new(level, message);
        match level {
            LogLevel::Info | LogLevel::Success => info!("{}", entry.message),
            LogLevel::Warning => warn!("{}", entry.message),
            LogLevel::Error => error!("{}", entry.message),
        }
        self.observer.on_log(&entry);
    }
}
